// Stagebeat - Library exports for the CLI, tests and benchmarks

pub mod audio;
pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::engine::CpalClickSink;
pub use audio::export::{ExportSummary, OfflineRenderer};
pub use audio::sink::{ClickSink, ClickType};
pub use audio::virtual_sink::{ManualClock, VirtualSink};
pub use config::{ClickSettings, MetronomeConfig};
pub use error::{MetronomeError, Result};
pub use messaging::{BeatEvent, ListenerId, MetronomeEvent, StopReason};
pub use sequencer::{
    AccentModel, AccentPattern, LyricLine, Metronome, MetronomeRunner, MetronomeSnapshot,
    Polyrhythm, Tempo, TimeSignature, TransportState,
};
