// Metronome runner - drives the two poll loops on worker threads
//
// The scheduler core is shared behind a mutex; setters and poll ticks are
// serialized by it. Listeners run while the lock is held, so they must not
// call back into the runner (use `Metronome::subscribe_channel` to hand
// events to another thread instead).

use super::metronome::Metronome;
use crate::audio::sink::ClickSink;
use crate::error::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

pub type SharedMetronome<S> = Arc<Mutex<Metronome<S>>>;

pub struct MetronomeRunner<S: ClickSink + 'static> {
    metronome: SharedMetronome<S>,
    cancel: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

/// A listener that panicked under the lock must not take the transport down with it
fn lock<S: ClickSink>(metronome: &Mutex<Metronome<S>>) -> MutexGuard<'_, Metronome<S>> {
    metronome
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<S: ClickSink + 'static> MetronomeRunner<S> {
    pub fn new(metronome: Metronome<S>) -> Self {
        Self {
            metronome: Arc::new(Mutex::new(metronome)),
            cancel: Arc::new(AtomicBool::new(false)),
            threads: Vec::new(),
        }
    }

    /// Shared handle, e.g. for a UI thread reading snapshots
    pub fn shared(&self) -> SharedMetronome<S> {
        Arc::clone(&self.metronome)
    }

    /// Run `f` with the scheduler locked
    pub fn with<R>(&self, f: impl FnOnce(&mut Metronome<S>) -> R) -> R {
        let mut metronome = lock(&self.metronome);
        f(&mut metronome)
    }

    /// Start playback and the poll threads
    pub fn play(&mut self) -> Result<()> {
        self.cancel.store(true, Ordering::Release);
        self.join_threads();

        self.with(|m| m.play())?;
        self.spawn_threads();
        Ok(())
    }

    /// Stop playback; returns once both poll threads have exited
    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Release);
        self.with(|m| m.stop());
        self.join_threads();
    }

    /// Scheduled restart; the poll threads keep running through it
    pub fn restart(&mut self) -> bool {
        self.with(|m| m.restart())
    }

    pub fn set_bpm(&mut self, bpm: u32) {
        self.with(|m| m.set_bpm(bpm));
    }

    /// Stop and release the audio output
    pub fn shutdown(&mut self) {
        self.stop();
        self.with(|m| m.shutdown());
    }

    /// True while at least one poll thread is alive
    pub fn is_running(&self) -> bool {
        self.threads.iter().any(|handle| !handle.is_finished())
    }

    pub fn is_playing(&self) -> bool {
        self.with(|m| m.is_playing())
    }

    fn spawn_threads(&mut self) {
        let cancel = Arc::new(AtomicBool::new(false));
        self.cancel = Arc::clone(&cancel);

        let (lookahead, time_update) = self.with(|m| {
            (
                m.config().lookahead_interval(),
                m.config().time_update_interval(),
            )
        });

        let metronome = Arc::clone(&self.metronome);
        let schedule_cancel = Arc::clone(&cancel);
        let schedule = thread::Builder::new()
            .name("stagebeat-scheduler".to_string())
            .spawn(move || schedule_loop(metronome, schedule_cancel, lookahead));

        let metronome = Arc::clone(&self.metronome);
        let elapsed = thread::Builder::new()
            .name("stagebeat-elapsed".to_string())
            .spawn(move || elapsed_loop(metronome, cancel, time_update));

        for spawned in [schedule, elapsed] {
            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(e) => log::error!("Failed to spawn poll thread: {}", e),
            }
        }
    }

    fn join_threads(&mut self) {
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("Poll thread panicked");
            }
        }
    }
}

impl<S: ClickSink + 'static> Drop for MetronomeRunner<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn schedule_loop<S: ClickSink>(
    metronome: SharedMetronome<S>,
    cancel: Arc<AtomicBool>,
    interval: Duration,
) {
    log::debug!("Scheduler thread started");
    loop {
        if cancel.load(Ordering::Acquire) {
            break;
        }

        let sleep_for = {
            let mut m = lock(&metronome);
            m.poll_schedule();
            if !m.is_active() {
                break;
            }
            // Wake early for a queued beat notification or a pending restart
            match m.next_wakeup() {
                Some(at) => {
                    let until = at - m.sink().now();
                    Duration::try_from_secs_f64(until.max(0.0))
                        .map_or(interval, |d| d.min(interval))
                }
                None => interval,
            }
        };

        thread::sleep(sleep_for);
    }
    log::debug!("Scheduler thread exited");
}

fn elapsed_loop<S: ClickSink>(
    metronome: SharedMetronome<S>,
    cancel: Arc<AtomicBool>,
    interval: Duration,
) {
    loop {
        if cancel.load(Ordering::Acquire) {
            break;
        }
        {
            let mut m = lock(&metronome);
            m.poll_elapsed();
            if !m.is_active() {
                break;
            }
        }
        thread::sleep(interval);
    }
}
