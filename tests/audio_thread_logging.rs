//! Audio Thread Logging Tests
//!
//! Installs a process-wide logger, so these live in their own test binary.

use std::cell::Cell;

use log::{LevelFilter, Log, Metadata, Record};

use mixdeck::config::EngineConfig;
use mixdeck::engine::{encode_buffer, engine_channel, generate_constant, DeckId, StereoFrame};

thread_local! {
    static RECORDS: Cell<usize> = Cell::new(0);
}

/// Counts records emitted on the calling thread
struct CountingLogger;

impl Log for CountingLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, _record: &Record) {
        RECORDS.with(|count| count.set(count.get() + 1));
    }

    fn flush(&self) {}
}

static LOGGER: CountingLogger = CountingLogger;

fn records() -> usize {
    RECORDS.with(Cell::get)
}

#[test]
fn test_audio_callback_emits_no_log_records() {
    log::set_logger(&LOGGER).unwrap();
    log::set_max_level(LevelFilter::Trace);

    let (mut controller, mut processor) = engine_channel(EngineConfig::default()).unwrap();
    let track = encode_buffer(&generate_constant(0.1, 4.0, 48000)).unwrap();
    controller.load(DeckId::A, &track).unwrap();
    controller.play(DeckId::A).unwrap();
    controller.set_crossfader(0.5).unwrap();
    controller.set_hot_cue(DeckId::A, 1).unwrap();
    controller.toggle_loop(DeckId::A, 4).unwrap();
    controller.seek(DeckId::A, 3.0).unwrap();
    controller.start_recording().unwrap();

    // Every request above was logged by the controller
    let before = records();
    assert!(before >= 5);

    let mut block = vec![StereoFrame::SILENCE; 256];
    processor.process(&mut block);
    assert_eq!(records(), before);

    assert!(processor.mixer().deck(DeckId::A).is_playing());
    assert!(!processor.mixer().deck(DeckId::A).loop_state().active);
}
