// Sequencer module - beat scheduling, accents, lyrics and transport

pub mod accent;
pub mod lyrics;
pub mod metronome;
pub mod runner;
pub mod timeline;
pub mod transport;

pub use accent::{AccentConfig, AccentModel, AccentPattern, AccentValue, Polyrhythm};
pub use lyrics::{LyricLine, LyricTimeline};
pub use metronome::{Metronome, MetronomeSnapshot};
pub use runner::{MetronomeRunner, SharedMetronome};
pub use timeline::{Tempo, TimeSignature};
pub use transport::{Session, TransportState};
