// Events - Scheduler → host notifications

/// Why a session ended without the host asking for it
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum StopReason {
    /// The sink became unusable and could not be resumed
    SinkLost,
}

/// One scheduled beat
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BeatEvent {
    /// Absolute beat count at scheduling time (before wrap reduction)
    pub beat_number: u64,
    /// 0-based position in the measure
    pub beat_in_measure: u32,
    pub accent: bool,
    /// Sink clock time the tone plays at
    pub time: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum MetronomeEvent {
    /// Fired once per beat, aligned with the audible click
    Beat(BeatEvent),
    /// Fired on every slow poll
    TimeUpdate { elapsed: f64 },
    /// Lyric cursor moved (or first evaluation after play)
    LyricChanged {
        index: usize,
        time: f64,
        text: String,
    },
    Stopped { reason: StopReason },
}

impl MetronomeEvent {
    pub fn as_beat(&self) -> Option<&BeatEvent> {
        match self {
            MetronomeEvent::Beat(beat) => Some(beat),
            _ => None,
        }
    }
}
