// Click sink - the clock and tone scheduler the metronome runs against
//
// Timing precision comes from the sink: `schedule_tone` must play the click
// at exactly `at` on the sink's own clock, however late or early the call
// itself happens.

/// Metronome click type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ClickType {
    /// Louder, higher click
    Accent,
    Regular,
}

impl ClickType {
    pub fn from_accent(accent: bool) -> Self {
        if accent {
            ClickType::Accent
        } else {
            ClickType::Regular
        }
    }

    pub fn is_accent(&self) -> bool {
        matches!(self, ClickType::Accent)
    }
}

pub trait ClickSink: Send {
    /// Monotonic clock in seconds, arbitrary epoch
    fn now(&self) -> f64;

    /// Play one click at sink time `at`
    fn schedule_tone(&mut self, at: f64, click: ClickType);

    /// True while the sink can accept tones
    fn is_available(&self) -> bool;

    /// Create or resume the underlying output; false if it cannot be done now
    fn acquire(&mut self) -> bool;

    /// Drop every scheduled tone that has not started playing yet
    fn cancel_pending(&mut self) {}

    /// Give the output back; the next `acquire` may reopen it
    fn release(&mut self) {}
}

impl<S: ClickSink + ?Sized> ClickSink for Box<S> {
    fn now(&self) -> f64 {
        (**self).now()
    }

    fn schedule_tone(&mut self, at: f64, click: ClickType) {
        (**self).schedule_tone(at, click)
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }

    fn acquire(&mut self) -> bool {
        (**self).acquire()
    }

    fn cancel_pending(&mut self) {
        (**self).cancel_pending()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
