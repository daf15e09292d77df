//! CLI Module
//!
//! Command-line driver for planning and rendering transitions offline.

pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::automix::{Energy, Genre};

/// Mixdeck - dual-deck DJ mixing engine
#[derive(Parser, Debug)]
#[command(name = "mixdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pick two loops and print the auto-mix plan as JSON
    #[command(name = "plan")]
    Plan {
        /// Genre of the mix
        #[arg(short, long, default_value = "house")]
        genre: Genre,

        /// Energy of the mix
        #[arg(short, long, default_value = "medium")]
        energy: Energy,

        /// Transition length in seconds
        #[arg(short, long, default_value_t = 30.0)]
        length: f64,

        /// Seed for a reproducible selection
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Render a bass-swap transition between two WAV files
    #[command(name = "render")]
    Render {
        /// Outgoing track
        #[arg(long)]
        deck_a: PathBuf,

        /// Incoming track
        #[arg(long)]
        deck_b: PathBuf,

        /// Tempo of the outgoing track
        #[arg(long)]
        bpm_a: Option<f64>,

        /// Tempo of the incoming track
        #[arg(long)]
        bpm_b: Option<f64>,

        /// Transition length in seconds
        #[arg(short, long, default_value_t = 30.0)]
        length: f64,

        /// Pitch deck B to deck A's tempo
        #[arg(long)]
        sync: bool,

        /// Engine configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Where to write the recording
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Print duration, channels and sample rate of a WAV file
    #[command(name = "info")]
    Info {
        /// Path to the WAV file
        path: PathBuf,
    },
}
