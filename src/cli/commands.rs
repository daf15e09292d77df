//! CLI Command Implementations
//!
//! Each command drives the same engine a host application would: the render
//! command runs the control and audio halves in lock-step on one thread.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::automix::{
    self, AutoMixDriver, AutoMixPlan, Catalog, CatalogEntry, Energy, Genre, MixPreferences,
};
use crate::config::EngineConfig;
use crate::engine::buffer::{calculate_peak, calculate_rms, StereoFrame};
use crate::engine::deck::{DeckId, TrackInfo};
use crate::engine::io::decode_native;
use crate::engine::realtime::{engine_channel, EngineController};
use crate::engine::recorder::Recording;

/// Settings for an offline transition render
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub deck_a: PathBuf,
    pub deck_b: PathBuf,
    pub bpm_a: Option<f64>,
    pub bpm_b: Option<f64>,
    pub length: f64,
    pub sync: bool,
    pub config: Option<PathBuf>,
}

/// Build an auto-mix plan from the built-in catalog.
pub fn build_plan(
    genre: Genre,
    energy: Energy,
    length: f64,
    seed: Option<u64>,
) -> Result<AutoMixPlan> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let preferences = MixPreferences {
        genre,
        energy,
        length_seconds: length,
    };
    let plan = automix::plan(&Catalog::builtin(), preferences, &mut rng)?;
    Ok(plan)
}

/// Print an auto-mix plan as JSON.
pub fn plan(genre: Genre, energy: Energy, length: f64, seed: Option<u64>) -> Result<()> {
    let plan = build_plan(genre, energy, length, seed)?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

/// Render a bass-swap transition and return the recording.
///
/// Both decks start together; the driver moves the crossfader and EQs while
/// the recorder captures the master bus.
pub fn render_transition(options: &RenderOptions) -> Result<Recording> {
    let config = match &options.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let sample_rate = config.sample_rate;
    let block_frames = config.max_block_frames;
    let poll_frames = config.poll_interval_frames().max(1) as u64;

    let (mut controller, mut processor) = engine_channel(config)?;

    let entries = [
        load_deck(&mut controller, DeckId::A, &options.deck_a, options.bpm_a)?,
        load_deck(&mut controller, DeckId::B, &options.deck_b, options.bpm_b)?,
    ];
    let [entry_a, entry_b] = entries;
    let target_bpm = entry_a.bpm;

    let mut driver = AutoMixDriver::new(AutoMixPlan::transition(
        entry_a,
        entry_b,
        target_bpm,
        options.length,
    )?);
    if options.sync {
        driver.prepare(&mut controller)?;
        info!("Deck B synced to {:.1} BPM", target_bpm);
    }
    driver.apply(0.0, &mut controller)?;

    controller.play(DeckId::A)?;
    controller.play(DeckId::B)?;
    controller.start_recording()?;

    let total_frames = (options.length * sample_rate as f64).round() as u64;
    let mut block = vec![StereoFrame::SILENCE; block_frames];
    let mut rendered = 0u64;
    let mut since_poll = 0u64;
    while rendered < total_frames {
        let frames = (total_frames - rendered).min(block_frames as u64) as usize;
        driver.apply(rendered as f64 / sample_rate as f64, &mut controller)?;
        processor.process(&mut block[..frames]);
        rendered += frames as u64;

        // Poll on the same audio-time cadence a live host would
        since_poll += frames as u64;
        if since_poll >= poll_frames {
            controller.poll(Instant::now());
            since_poll = 0;
        }
    }

    let recording = controller.stop_recording()?;
    if !recording.gaps.is_empty() {
        warn!("Recording has {} capture gap(s)", recording.gaps.len());
    }
    Ok(recording)
}

/// Render a transition and write it to `output`.
pub fn render(options: &RenderOptions, output: &Path) -> Result<()> {
    info!(
        "Rendering {:.1}s transition {} -> {}",
        options.length,
        options.deck_a.display(),
        options.deck_b.display()
    );

    let recording = render_transition(options)?;
    fs::write(output, &recording.bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    println!("Recording written: {}", output.display());
    println!("Duration: {:.2}s", recording.duration_seconds());
    println!("SHA-256: {}", recording.checksum);

    Ok(())
}

/// Facts printed by `info`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackSummary {
    pub duration_seconds: f64,
    pub channels: usize,
    pub sample_rate: u32,
    pub peak_db: f32,
    pub rms_db: f32,
}

/// Decode a file at its native rate and measure it.
pub fn summarize(path: &Path) -> Result<TrackSummary> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let buffer = decode_native(&bytes)
        .with_context(|| format!("{} is not a supported audio file", path.display()))?;
    let frames = buffer.to_frames();
    Ok(TrackSummary {
        duration_seconds: buffer.duration_secs(),
        channels: buffer.num_channels(),
        sample_rate: buffer.sample_rate(),
        peak_db: calculate_peak(&frames),
        rms_db: calculate_rms(&frames),
    })
}

/// Print basic facts about an audio file.
pub fn info(path: &Path) -> Result<()> {
    let summary = summarize(path)?;

    println!("File: {}", path.display());
    println!("Duration: {:.3}s", summary.duration_seconds);
    println!("Channels: {}", summary.channels);
    println!("Sample rate: {} Hz", summary.sample_rate);
    println!("Peak: {:.1} dBFS", summary.peak_db);
    println!("RMS: {:.1} dBFS", summary.rms_db);

    Ok(())
}

fn load_deck(
    controller: &mut EngineController,
    deck: DeckId,
    path: &Path,
    bpm: Option<f64>,
) -> Result<CatalogEntry> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if let Some(bpm) = bpm {
        if !(bpm.is_finite() && bpm > 0.0) {
            bail!("BPM for deck {} must be a positive number, got {}", deck, bpm);
        }
    }

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let track = TrackInfo {
        filename: Some(name.clone()),
        bpm,
    };
    let loaded = controller
        .load_track(deck, &bytes, track)
        .with_context(|| format!("Failed to load {} on deck {}", path.display(), deck))?;
    info!("Deck {}: {} ({:.2}s)", deck, name, loaded.duration_seconds);

    Ok(CatalogEntry {
        name,
        path: path.display().to_string(),
        bpm: controller.deck_state(deck).bpm,
        // Not used when rendering arbitrary files
        genre: Genre::House,
        energy: Energy::Medium,
    })
}
