// Timeline - Tempo and measure length
// Both types normalize out-of-range input instead of rejecting it: a live
// show must keep running when a preset carries a bad value.

use std::fmt;

/// Number of beats per measure
/// Opaque beat count: no denominator, every beat has the same length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct TimeSignature {
    beats: u32,
}

impl TimeSignature {
    /// Creates a new time signature (0 is normalized to 1)
    pub fn new(beats: u32) -> Self {
        Self { beats: beats.max(1) }
    }

    /// Common 4/4 time signature
    pub fn four_four() -> Self {
        Self::new(4)
    }

    /// Common 3/4 time signature (waltz)
    pub fn three_four() -> Self {
        Self::new(3)
    }

    /// Number of beats per measure, always >= 1
    pub fn beats_per_measure(&self) -> u32 {
        self.beats
    }

    /// Position of an absolute beat inside its measure (0-based)
    pub fn beat_in_measure(&self, beat_count: u64) -> u32 {
        (beat_count % self.beats as u64) as u32
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        Self::four_four()
    }
}

impl From<u32> for TimeSignature {
    fn from(beats: u32) -> Self {
        Self::new(beats)
    }
}

impl From<TimeSignature> for u32 {
    fn from(ts: TimeSignature) -> Self {
        ts.beats
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} beats", self.beats)
    }
}

/// Tempo in BPM (Beats Per Minute)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "u32", into = "u32")]
pub struct Tempo {
    bpm: u32,
}

impl Tempo {
    pub const MIN_BPM: u32 = 40;
    pub const MAX_BPM: u32 = 300;

    /// Creates a new tempo, clamped to [MIN_BPM, MAX_BPM]
    pub fn new(bpm: u32) -> Self {
        Self {
            bpm: bpm.clamp(Self::MIN_BPM, Self::MAX_BPM),
        }
    }

    /// Get BPM value
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// Duration of one beat in seconds
    pub fn beat_duration_seconds(&self) -> f64 {
        60.0 / self.bpm as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::new(120)
    }
}

impl From<u32> for Tempo {
    fn from(bpm: u32) -> Self {
        Self::new(bpm)
    }
}

impl From<Tempo> for u32 {
    fn from(tempo: Tempo) -> Self {
        tempo.bpm
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.bpm)
    }
}
