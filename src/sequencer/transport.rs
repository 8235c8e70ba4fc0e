// Transport - Play/stop state machine of a metronome session
// A session carries the clock epoch; stopping discards it entirely, and
// playing always builds a new one, so nothing leaks from one run to the next.

/// Clock-domain timestamps of one play session (seconds, sink clock)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Session {
    pub start_time: f64,
    pub next_beat_time: f64,
    pub elapsed: f64,
}

impl Session {
    /// Fresh session whose first beat is due at `now`
    pub fn start(now: f64) -> Self {
        Self {
            start_time: now,
            next_beat_time: now,
            elapsed: 0.0,
        }
    }
}

/// Transport state
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing(Session),
    /// Stopped, with a re-play due at clock time `at`
    PendingRestart { at: f64 },
}

impl TransportState {
    pub fn is_playing(&self) -> bool {
        matches!(self, TransportState::Playing(_))
    }

    /// Playing, or about to play again
    pub fn is_active(&self) -> bool {
        !matches!(self, TransportState::Stopped)
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            TransportState::Playing(session) => Some(session),
            _ => None,
        }
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        match self {
            TransportState::Playing(session) => Some(session),
            _ => None,
        }
    }

    /// Clock time of a pending restart
    pub fn restart_due(&self) -> Option<f64> {
        match self {
            TransportState::PendingRestart { at } => Some(*at),
            _ => None,
        }
    }

    /// Begin a new session at `now`
    pub fn play(&mut self, now: f64) -> Session {
        let session = Session::start(now);
        *self = TransportState::Playing(session);
        session
    }

    /// Stop and forget any pending restart
    /// Returns true if a session was running
    pub fn stop(&mut self) -> bool {
        let was_playing = self.is_playing();
        *self = TransportState::Stopped;
        was_playing
    }

    /// Stop, then ask for a re-play at `at`, only if a session was running
    pub fn stop_and_restart_at(&mut self, at: f64) -> bool {
        let was_playing = self.stop();
        if was_playing {
            *self = TransportState::PendingRestart { at };
        }
        was_playing
    }
}
