// Virtual sink - records scheduled clicks instead of playing them
// Used by tests and benches; the clock is either driven by hand
// (`ManualClock`) or follows real monotonic time.

use super::parameters::AtomicF64;
use super::sink::{ClickSink, ClickType};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Clock that only moves when told to; clones share the same time
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    time: AtomicF64,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self {
            time: AtomicF64::new(start),
        }
    }

    pub fn now(&self) -> f64 {
        self.time.get()
    }

    pub fn set(&self, time: f64) {
        self.time.set(time);
    }

    /// Move forward by `delta` seconds, returning the new time
    pub fn advance(&self, delta: f64) -> f64 {
        self.time.add(delta)
    }
}

/// One tone handed to the sink
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledClick {
    /// Requested play time
    pub at: f64,
    pub click: ClickType,
    /// Clock time when `schedule_tone` was called
    pub scheduled_at: f64,
}

#[derive(Debug, Clone)]
enum ClockSource {
    Manual(ManualClock),
    Realtime(Instant),
}

/// Recording sink; clones share state so a test can keep one for inspection
#[derive(Debug, Clone)]
pub struct VirtualSink {
    clock: ClockSource,
    available: Arc<AtomicBool>,
    acquirable: Arc<AtomicBool>,
    acquire_calls: Arc<AtomicUsize>,
    cancel_calls: Arc<AtomicUsize>,
    scheduled: Arc<Mutex<Vec<ScheduledClick>>>,
}

impl VirtualSink {
    fn with_clock(clock: ClockSource) -> Self {
        Self {
            clock,
            available: Arc::new(AtomicBool::new(false)),
            acquirable: Arc::new(AtomicBool::new(true)),
            acquire_calls: Arc::new(AtomicUsize::new(0)),
            cancel_calls: Arc::new(AtomicUsize::new(0)),
            scheduled: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Sink on a hand-driven clock
    pub fn manual(clock: ManualClock) -> Self {
        Self::with_clock(ClockSource::Manual(clock))
    }

    /// Sink on real monotonic time, epoch = creation
    pub fn realtime() -> Self {
        Self::with_clock(ClockSource::Realtime(Instant::now()))
    }

    /// Simulate the host suspending (false) or restoring (true) the output
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    /// Whether the next `acquire` calls succeed
    pub fn set_acquirable(&self, acquirable: bool) {
        self.acquirable.store(acquirable, Ordering::Release);
    }

    pub fn acquire_count(&self) -> usize {
        self.acquire_calls.load(Ordering::Acquire)
    }

    /// Number of `cancel_pending` calls; recorded tones are kept
    pub fn cancel_count(&self) -> usize {
        self.cancel_calls.load(Ordering::Acquire)
    }

    pub fn scheduled(&self) -> Vec<ScheduledClick> {
        self.scheduled
            .lock()
            .map(|clicks| clicks.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut clicks) = self.scheduled.lock() {
            clicks.clear();
        }
    }
}

impl ClickSink for VirtualSink {
    fn now(&self) -> f64 {
        match &self.clock {
            ClockSource::Manual(clock) => clock.now(),
            ClockSource::Realtime(epoch) => epoch.elapsed().as_secs_f64(),
        }
    }

    fn schedule_tone(&mut self, at: f64, click: ClickType) {
        let scheduled_at = self.now();
        if let Ok(mut clicks) = self.scheduled.lock() {
            clicks.push(ScheduledClick {
                at,
                click,
                scheduled_at,
            });
        }
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    fn acquire(&mut self) -> bool {
        self.acquire_calls.fetch_add(1, Ordering::AcqRel);
        let ok = self.acquirable.load(Ordering::Acquire);
        if ok {
            self.available.store(true, Ordering::Release);
        }
        ok
    }

    fn cancel_pending(&mut self) {
        self.cancel_calls.fetch_add(1, Ordering::AcqRel);
    }

    fn release(&mut self) {
        self.available.store(false, Ordering::Release);
    }
}
