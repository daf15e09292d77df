//! Audio Engine Module
//!
//! Core mixing engine including:
//! - Audio buffer management and WAV codec
//! - Deck transport, hot cues and loops
//! - Two-deck mixer with crossfader and master bus
//! - Mix recorder
//! - Realtime control/audio thread split

pub mod buffer;
pub mod deck;
pub mod hotcue;
pub mod io;
pub mod mixer;
pub mod realtime;
pub mod recorder;
pub mod tempo;
pub mod transport;

pub use buffer::{AudioBuffer, ChannelLayout, StereoFrame};
pub use deck::{
    CueColor, Deck, DeckId, DeckState, HotCue, HotCueAction, LoadInfo, LoopState, TrackInfo,
};
pub use hotcue::{HotCuePads, PadAction, PressToken, HOT_CUE_SLOTS};
pub use io::{decode_audio, decode_native, encode_buffer, encode_wav, generate_constant, generate_test_tone};
pub use mixer::{crossfade_gains, Mixer, MixerSnapshot, MixerState};
pub use realtime::{engine_channel, AudioProcessor, DeckAtomics, EngineCommand, EngineController};
pub use recorder::{capture_channel, CaptureGap, CaptureTap, Recorder, Recording, RecordingState};
pub use transport::{Transport, TransportState};
