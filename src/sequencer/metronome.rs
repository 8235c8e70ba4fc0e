// Metronome - lookahead beat scheduler
//
// Two poll bodies, driven by the host at different rates:
// - `poll_schedule` (fast): hands every beat due within the scheduling
//   horizon to the sink with its exact play time
// - `poll_elapsed` (slow): elapsed time and lyric cursor
//
// The sink plays each click at the requested clock time, so poll jitter
// never reaches the audio. Beat notifications are queued until the click is
// actually heard; the queue belongs to the session and is cleared on stop.

use super::accent::{AccentConfig, AccentModel, AccentPattern, AccentValue, Polyrhythm};
use super::lyrics::{LyricLine, LyricTimeline};
use super::timeline::{Tempo, TimeSignature};
use super::transport::TransportState;
use crate::audio::sink::{ClickSink, ClickType};
use crate::config::MetronomeConfig;
use crate::error::{MetronomeError, Result};
use crate::messaging::channels::{EventConsumer, create_event_channel};
use crate::messaging::event::{BeatEvent, MetronomeEvent, StopReason};
use crate::messaging::listeners::{ListenerId, Listeners};
use std::collections::VecDeque;

/// Tolerance for clock comparisons; a poll woken exactly at `next_wakeup`
/// must see its beat as due despite rounding
const CLOCK_EPSILON: f64 = 1e-9;

/// Read-only view of the scheduler state
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct MetronomeSnapshot {
    pub bpm: u32,
    pub beats_per_measure: u32,
    pub beat_count: u64,
    pub beat_in_measure: u32,
    pub accents: AccentConfig,
    pub accent_model: AccentModel,
    pub playing: bool,
    pub restart_pending: bool,
    pub elapsed: f64,
    pub lyric_index: usize,
    pub sound_enabled: bool,
}

pub struct Metronome<S: ClickSink> {
    sink: S,
    config: MetronomeConfig,
    tempo: Tempo,
    time_signature: TimeSignature,
    accents: AccentConfig,
    /// Beats scheduled since play, reduced modulo the measure length
    /// once it reaches `beats * beat_wrap_measures`
    beat_count: u64,
    transport: TransportState,
    lyrics: LyricTimeline,
    sound_enabled: bool,
    listeners: Listeners,
    /// Scheduled beats whose notification waits for the audible click
    pending_beats: VecDeque<BeatEvent>,
}

impl<S: ClickSink> Metronome<S> {
    pub fn new(sink: S) -> Self {
        Self::with_config(sink, MetronomeConfig::default())
    }

    pub fn with_config(sink: S, config: MetronomeConfig) -> Self {
        let config = config.validated();
        let time_signature = TimeSignature::new(config.default_beats);
        let mut accents = AccentConfig::default();
        accents.set_accent_beat(config.default_accent_beat);
        accents.fit_to(&time_signature);

        Self {
            sink,
            tempo: Tempo::new(config.default_bpm),
            time_signature,
            accents,
            beat_count: 0,
            transport: TransportState::Stopped,
            lyrics: LyricTimeline::default(),
            sound_enabled: true,
            listeners: Listeners::new(),
            pending_beats: VecDeque::new(),
            config,
        }
    }

    // ---------------------------------------------------------------------
    // Configuration
    // ---------------------------------------------------------------------

    /// Clamp to [40, 300]; a change while playing restarts from a clean beat
    pub fn set_bpm(&mut self, bpm: u32) {
        let tempo = Tempo::new(bpm);
        if tempo == self.tempo {
            return;
        }
        self.tempo = tempo;

        if self.transport.is_playing() {
            log::info!("Tempo changed to {}, restarting", tempo);
            let at = self.sink.now() + self.config.tempo_change_delay_secs();
            self.clear_session();
            self.transport.stop_and_restart_at(at);
        }
    }

    /// Set beats per measure, realign to beat 1 and re-fit the accent models
    pub fn set_time_signature(&mut self, beats: u32) {
        self.time_signature = TimeSignature::new(beats);
        self.beat_count = 0;
        self.accents.fit_to(&self.time_signature);
    }

    /// 1-indexed accented beat; 0 = uniform clicks
    pub fn set_accent_beat(&mut self, beat: u32) {
        self.accents.set_accent_beat(beat);
    }

    /// Explicit accent mask; an all-false mask clears the pattern
    pub fn set_accent_pattern<I>(&mut self, values: I)
    where
        I: IntoIterator,
        I::Item: AccentValue,
    {
        self.accents.pattern = AccentPattern::from_values(values);
    }

    pub fn clear_accent_pattern(&mut self) {
        self.accents.pattern = None;
    }

    /// Polyrhythm overlay; an empty pattern clears it. Realigns the phase.
    pub fn set_polyrhythm<I>(&mut self, pattern: I, name: impl Into<String>)
    where
        I: IntoIterator,
        I::Item: AccentValue,
    {
        self.apply_polyrhythm(Polyrhythm::new(pattern, name));
    }

    pub fn apply_polyrhythm(&mut self, polyrhythm: Option<Polyrhythm>) {
        self.accents.polyrhythm = polyrhythm;
        self.beat_count = 0;
    }

    pub fn clear_polyrhythm(&mut self) {
        self.accents.polyrhythm = None;
    }

    /// Replace the lyric timeline (lines must be sorted by time)
    pub fn set_lyrics(&mut self, lines: Vec<LyricLine>) {
        self.lyrics.replace(lines);
    }

    /// When disabled, beats are still scheduled and notified but not heard
    pub fn set_sound_enabled(&mut self, enabled: bool) {
        self.sound_enabled = enabled;
    }

    // ---------------------------------------------------------------------
    // Notifications
    // ---------------------------------------------------------------------

    /// Single-slot beat callback `(beat_in_measure, accent)`; replaces the previous one
    pub fn set_on_beat_callback<F>(&mut self, callback: F)
    where
        F: FnMut(u32, bool) + Send + 'static,
    {
        self.listeners.set_on_beat(Box::new(callback));
    }

    /// Single-slot elapsed-time callback; replaces the previous one
    pub fn set_on_time_update_callback<F>(&mut self, callback: F)
    where
        F: FnMut(f64) + Send + 'static,
    {
        self.listeners.set_on_time_update(Box::new(callback));
    }

    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&MetronomeEvent) + Send + 'static,
    {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    /// Events delivered through a lock-free ring buffer
    /// A full buffer drops the event rather than blocking the scheduler
    pub fn subscribe_channel(&mut self, capacity: usize) -> (ListenerId, EventConsumer) {
        let (mut tx, rx) = create_event_channel(capacity);
        let id = self.subscribe(move |event| {
            if ringbuf::traits::Producer::try_push(&mut tx, event.clone()).is_err() {
                log::warn!("Event channel full, dropping {:?}", event);
            }
        });
        (id, rx)
    }

    fn emit(&mut self, event: MetronomeEvent) {
        self.listeners.emit(&event);
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// Start a new session at the sink's current time
    ///
    /// If the sink cannot be acquired nothing changes and the call can be
    /// retried later. Calling while playing restarts the clocks.
    pub fn play(&mut self) -> Result<()> {
        if !self.sink.is_available() && !self.sink.acquire() {
            log::warn!("Audio sink unavailable, metronome stays stopped");
            return Err(MetronomeError::SinkUnavailable(
                "the audio output could not be acquired".to_string(),
            ));
        }

        let now = self.sink.now();
        self.clear_session();
        self.transport.play(now);
        log::info!(
            "Metronome playing: {}, {}",
            self.tempo,
            self.time_signature
        );

        self.schedule_pass(now);
        Ok(())
    }

    /// Halt, dropping queued notifications and any pending restart. Idempotent.
    pub fn stop(&mut self) {
        let was_active = self.transport.is_active();
        self.transport.stop();
        self.clear_session();
        if was_active {
            log::info!("Metronome stopped");
        }
    }

    /// Stop, then play again after the restart delay if it was playing
    /// Returns false (and does nothing) when not playing
    pub fn restart(&mut self) -> bool {
        if !self.transport.is_playing() {
            return false;
        }
        let at = self.sink.now() + self.config.restart_delay_secs();
        self.clear_session();
        self.transport.stop_and_restart_at(at);
        log::info!("Metronome restarting");
        true
    }

    /// Stop and hand the output back to the host
    pub fn shutdown(&mut self) {
        self.stop();
        self.sink.release();
    }

    fn clear_session(&mut self) {
        self.beat_count = 0;
        self.pending_beats.clear();
        self.lyrics.reset();
        self.sink.cancel_pending();
    }

    fn stop_on_sink_loss(&mut self) {
        self.stop();
        self.emit(MetronomeEvent::Stopped {
            reason: StopReason::SinkLost,
        });
    }

    // ---------------------------------------------------------------------
    // Poll bodies
    // ---------------------------------------------------------------------

    /// Fast loop body: pending restart, sink health, scheduling pass
    pub fn poll_schedule(&mut self) {
        let now = self.sink.now();

        if let Some(at) = self.transport.restart_due() {
            if now >= at {
                if let Err(e) = self.play() {
                    log::error!("Restart failed: {}", e);
                    self.stop_on_sink_loss();
                }
            }
            return;
        }

        if !self.transport.is_playing() {
            return;
        }

        if !self.sink.is_available() {
            log::warn!("Audio sink suspended, trying to resume");
            if !self.sink.acquire() {
                log::error!("Audio sink could not be resumed, stopping");
                self.stop_on_sink_loss();
                return;
            }
            log::info!("Audio sink resumed");
        }

        self.schedule_pass(now);
    }

    fn schedule_pass(&mut self, now: f64) {
        self.flush_due_beats(now);

        let Some(mut next_beat_time) = self.transport.session().map(|s| s.next_beat_time) else {
            return;
        };
        let schedule_ahead = self.config.schedule_ahead_secs;
        let beat_duration = self.tempo.beat_duration_seconds();

        // The host stalled for longer than the horizon: those beats can no
        // longer be played on time. Skip them while keeping measure phase.
        if next_beat_time < now - schedule_ahead {
            let missed = ((now - next_beat_time) / beat_duration).ceil() as u64;
            log::warn!(
                "Scheduler polled {:.3}s late, skipping {} beat(s)",
                now - next_beat_time,
                missed
            );
            next_beat_time += missed as f64 * beat_duration;
            self.advance_beat_count(missed);
        }

        while next_beat_time < now + schedule_ahead {
            let beat_number = self.beat_count;
            let beat = BeatEvent {
                beat_number,
                beat_in_measure: self.time_signature.beat_in_measure(beat_number),
                accent: self.accents.resolve(beat_number, &self.time_signature),
                time: next_beat_time,
            };

            if self.sound_enabled {
                self.sink
                    .schedule_tone(next_beat_time, ClickType::from_accent(beat.accent));
            }
            log::debug!(
                "Beat {} (measure pos {}, accent {}) at {:.4}",
                beat.beat_number,
                beat.beat_in_measure,
                beat.accent,
                beat.time
            );

            if next_beat_time - now <= self.config.immediate_callback_secs + CLOCK_EPSILON {
                self.emit(MetronomeEvent::Beat(beat));
            } else {
                self.pending_beats.push_back(beat);
            }

            self.advance_beat_count(1);
            next_beat_time += beat_duration;
        }

        if let Some(session) = self.transport.session_mut() {
            session.next_beat_time = next_beat_time;
        }
    }

    fn advance_beat_count(&mut self, beats: u64) {
        let per_measure = self.time_signature.beats_per_measure() as u64;
        self.beat_count += beats;
        if self.beat_count >= per_measure * self.config.beat_wrap_measures {
            self.beat_count %= per_measure;
        }
    }

    /// Emit queued beat notifications whose click is about to be heard
    fn flush_due_beats(&mut self, now: f64) {
        while let Some(beat) = self.pending_beats.front().copied() {
            if beat.time - now > self.config.immediate_callback_secs + CLOCK_EPSILON {
                break;
            }
            self.pending_beats.pop_front();
            self.emit(MetronomeEvent::Beat(beat));
        }
    }

    /// Slow loop body: elapsed time and lyric cursor
    pub fn poll_elapsed(&mut self) {
        let now = self.sink.now();
        let Some(session) = self.transport.session_mut() else {
            return;
        };
        session.elapsed = (now - session.start_time).max(0.0);
        let elapsed = session.elapsed;

        self.emit(MetronomeEvent::TimeUpdate { elapsed });

        if let Some(index) = self.lyrics.update(elapsed) {
            if let Some(line) = self.lyrics.current().cloned() {
                self.emit(MetronomeEvent::LyricChanged {
                    index,
                    time: line.time,
                    text: line.text,
                });
            }
        }
    }

    /// Sink clock time at which the next poll has work to do
    /// (queued notification or pending restart); `None` when idle
    pub fn next_wakeup(&self) -> Option<f64> {
        match &self.transport {
            TransportState::PendingRestart { at } => Some(*at),
            TransportState::Playing(_) => self
                .pending_beats
                .front()
                .map(|beat| beat.time - self.config.immediate_callback_secs),
            TransportState::Stopped => None,
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Preview query: accent pattern (wrapping by its length), else accent beat
    pub fn is_beat_accented(&self, beat_index: u64) -> bool {
        self.accents.is_beat_accented(beat_index, &self.time_signature)
    }

    pub fn current_lyric(&self) -> Option<&LyricLine> {
        self.lyrics.current()
    }

    pub fn current_lyric_index(&self) -> usize {
        self.lyrics.cursor()
    }

    pub fn lyrics(&self) -> &[LyricLine] {
        self.lyrics.lines()
    }

    /// Seconds since play as of the last slow poll; 0 when stopped
    pub fn elapsed_time(&self) -> f64 {
        self.transport.session().map_or(0.0, |s| s.elapsed)
    }

    pub fn start_time(&self) -> Option<f64> {
        self.transport.session().map(|s| s.start_time)
    }

    pub fn next_beat_time(&self) -> Option<f64> {
        self.transport.session().map(|s| s.next_beat_time)
    }

    pub fn bpm(&self) -> u32 {
        self.tempo.bpm()
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    pub fn time_signature(&self) -> TimeSignature {
        self.time_signature
    }

    pub fn beat_count(&self) -> u64 {
        self.beat_count
    }

    pub fn beat_in_measure(&self) -> u32 {
        self.time_signature.beat_in_measure(self.beat_count)
    }

    pub fn accent_beat(&self) -> Option<u32> {
        self.accents.accent_beat
    }

    pub fn accent_pattern(&self) -> Option<&[bool]> {
        self.accents.pattern.as_ref().map(|p| p.flags())
    }

    pub fn polyrhythm(&self) -> Option<&Polyrhythm> {
        self.accents.polyrhythm.as_ref()
    }

    pub fn accents(&self) -> &AccentConfig {
        &self.accents
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    /// Playing or waiting for a restart; the poll loops must keep running
    pub fn is_active(&self) -> bool {
        self.transport.is_active()
    }

    pub fn transport_state(&self) -> TransportState {
        self.transport
    }

    pub fn sound_enabled(&self) -> bool {
        self.sound_enabled
    }

    pub fn pending_notifications(&self) -> usize {
        self.pending_beats.len()
    }

    pub fn config(&self) -> &MetronomeConfig {
        &self.config
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn snapshot(&self) -> MetronomeSnapshot {
        MetronomeSnapshot {
            bpm: self.bpm(),
            beats_per_measure: self.time_signature.beats_per_measure(),
            beat_count: self.beat_count,
            beat_in_measure: self.beat_in_measure(),
            accents: self.accents.clone(),
            accent_model: self.accents.active_model(),
            playing: self.transport.is_playing(),
            restart_pending: self.transport.restart_due().is_some(),
            elapsed: self.elapsed_time(),
            lyric_index: self.lyrics.cursor(),
            sound_enabled: self.sound_enabled,
        }
    }
}

impl<S: ClickSink> std::fmt::Debug for Metronome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metronome")
            .field("tempo", &self.tempo)
            .field("time_signature", &self.time_signature)
            .field("accents", &self.accents)
            .field("beat_count", &self.beat_count)
            .field("transport", &self.transport)
            .field("listeners", &self.listeners)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::virtual_sink::{ManualClock, VirtualSink};
    use std::sync::{Arc, Mutex};

    fn setup() -> (Metronome<VirtualSink>, ManualClock, VirtualSink) {
        let clock = ManualClock::new(0.0);
        let sink = VirtualSink::manual(clock.clone());
        let observer = sink.clone();
        (Metronome::new(sink), clock, observer)
    }

    fn record_beats(metronome: &mut Metronome<VirtualSink>) -> Arc<Mutex<Vec<BeatEvent>>> {
        let beats = Arc::new(Mutex::new(Vec::new()));
        let sink = beats.clone();
        metronome.subscribe(move |event| {
            if let Some(beat) = event.as_beat() {
                sink.lock().unwrap().push(*beat);
            }
        });
        beats
    }

    /// Advance the clock in poll-sized steps, polling each time
    fn run_for(metronome: &mut Metronome<VirtualSink>, clock: &ManualClock, seconds: f64) {
        let steps = (seconds / 0.025).round() as usize;
        for _ in 0..steps {
            clock.advance(0.025);
            metronome.poll_schedule();
        }
    }

    #[test]
    fn test_defaults() {
        let (metronome, _, _) = setup();
        assert_eq!(metronome.bpm(), 120);
        assert_eq!(metronome.time_signature().beats_per_measure(), 4);
        assert_eq!(metronome.accent_beat(), Some(1));
        assert!(!metronome.is_playing());
        assert_eq!(metronome.elapsed_time(), 0.0);
    }

    #[test]
    fn test_play_schedules_downbeat_immediately() {
        let (mut metronome, clock, sink) = setup();
        clock.set(5.0);
        let beats = record_beats(&mut metronome);

        metronome.play().unwrap();

        assert!(metronome.is_playing());
        assert_eq!(metronome.start_time(), Some(5.0));
        let tones = sink.scheduled();
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].at, 5.0);
        assert_eq!(tones[0].click, ClickType::Accent);

        let beats = beats.lock().unwrap();
        assert_eq!(beats.len(), 1);
        assert_eq!(beats[0].beat_in_measure, 0);
        assert!(beats[0].accent);
    }

    #[test]
    fn test_beat_spacing_matches_tempo() {
        let (mut metronome, clock, sink) = setup();
        metronome.set_bpm(100);
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 6.0);

        let tones = sink.scheduled();
        assert!(tones.len() >= 10);
        for pair in tones.windows(2) {
            assert!((pair[1].at - pair[0].at - 0.6).abs() < 1e-9);
        }
        // Nothing was scheduled in the past or beyond the horizon
        for tone in &tones {
            assert!(tone.at >= tone.scheduled_at - 1e-9);
            assert!(tone.at < tone.scheduled_at + 0.1 + 1e-9);
        }
    }

    #[test]
    fn test_delayed_notification_waits_for_click() {
        let (mut metronome, clock, _) = setup();
        let beats = record_beats(&mut metronome);
        metronome.play().unwrap();

        // Beat 2 (t = 0.5) enters the horizon at 0.45 but must not be notified yet
        clock.set(0.45);
        metronome.poll_schedule();
        assert_eq!(beats.lock().unwrap().len(), 1);
        assert_eq!(metronome.pending_notifications(), 1);
        let wakeup = metronome.next_wakeup().unwrap();
        assert!((wakeup - 0.49).abs() < 1e-9);

        clock.set(0.495);
        metronome.poll_schedule();
        let beats = beats.lock().unwrap();
        assert_eq!(beats.len(), 2);
        assert_eq!(beats[1].time, 0.5);
        assert_eq!(beats[1].beat_in_measure, 1);
        assert!(!beats[1].accent);
    }

    #[test]
    fn test_stop_cancels_pending_notifications() {
        let (mut metronome, clock, _) = setup();
        let beats = record_beats(&mut metronome);
        metronome.play().unwrap();

        clock.set(0.45);
        metronome.poll_schedule();
        assert_eq!(metronome.pending_notifications(), 1);

        metronome.stop();
        assert_eq!(metronome.pending_notifications(), 0);
        assert!(metronome.next_wakeup().is_none());

        clock.set(0.6);
        metronome.poll_schedule();
        assert_eq!(beats.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_play_fails_without_sink() {
        let (mut metronome, _, sink) = setup();
        sink.set_acquirable(false);

        let result = metronome.play();
        assert!(matches!(result, Err(MetronomeError::SinkUnavailable(_))));
        assert!(!metronome.is_playing());
        assert!(sink.scheduled().is_empty());

        // Retry once the device is back
        sink.set_acquirable(true);
        metronome.play().unwrap();
        assert!(metronome.is_playing());
    }

    #[test]
    fn test_set_bpm_while_playing_restarts() {
        let (mut metronome, clock, sink) = setup();
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 1.0);
        assert!(metronome.beat_count() > 0);

        metronome.set_bpm(1000);
        assert_eq!(metronome.bpm(), 300);
        assert!(!metronome.is_playing());
        assert!(metronome.is_active());
        assert_eq!(metronome.beat_count(), 0);

        let before_restart = sink.scheduled().len();
        clock.advance(0.005);
        metronome.poll_schedule();
        assert!(!metronome.is_playing());
        assert_eq!(sink.scheduled().len(), before_restart);

        clock.advance(0.01);
        metronome.poll_schedule();
        assert!(metronome.is_playing());
        let restart_time = metronome.start_time().unwrap();

        run_for(&mut metronome, &clock, 1.0);
        let tones: Vec<_> = sink
            .scheduled()
            .into_iter()
            .filter(|t| t.at >= restart_time)
            .collect();
        assert_eq!(tones[0].at, restart_time);
        assert_eq!(tones[0].click, ClickType::Accent);
        for pair in tones.windows(2) {
            assert!((pair[1].at - pair[0].at - 0.2).abs() < 1e-9);
        }
    }

    #[test]
    fn test_session_changes_cancel_queued_tones() {
        let (mut metronome, clock, sink) = setup();
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 0.5);
        let after_play = sink.cancel_count();

        metronome.set_bpm(90);
        assert_eq!(sink.cancel_count(), after_play + 1);

        // Same tempo: the queued clicks stay
        metronome.set_bpm(90);
        assert_eq!(sink.cancel_count(), after_play + 1);

        run_for(&mut metronome, &clock, 0.1);
        assert!(metronome.is_playing());
        let playing = sink.cancel_count();

        assert!(metronome.restart());
        assert_eq!(sink.cancel_count(), playing + 1);

        metronome.stop();
        assert_eq!(sink.cancel_count(), playing + 2);
    }

    #[test]
    fn test_set_bpm_clamps_while_stopped() {
        let (mut metronome, _, _) = setup();
        metronome.set_bpm(10);
        assert_eq!(metronome.bpm(), 40);
        assert!(!metronome.is_active());
        metronome.set_bpm(1000);
        assert_eq!(metronome.bpm(), 300);
    }

    #[test]
    fn test_beat_count_wraps_preserving_measure_position() {
        let (mut metronome, _, _) = setup();
        metronome.set_time_signature(3);
        let wrap_at = 3 * metronome.config().beat_wrap_measures;

        metronome.beat_count = wrap_at - 2;
        let expected: Vec<u32> = (wrap_at - 2..wrap_at + 4)
            .map(|b| (b % 3) as u32)
            .collect();

        let mut observed = Vec::new();
        for _ in 0..6 {
            observed.push(metronome.beat_in_measure());
            metronome.advance_beat_count(1);
        }
        assert_eq!(observed, expected);
        assert!(metronome.beat_count() < wrap_at);
    }

    #[test]
    fn test_late_poll_skips_missed_beats() {
        let (mut metronome, clock, sink) = setup();
        let beats = record_beats(&mut metronome);
        metronome.play().unwrap();

        // The host stalls for 2.45s (4.9 beats at 120 BPM)
        clock.set(2.45);
        metronome.poll_schedule();

        let tones = sink.scheduled();
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[1].at, 2.5);
        assert!(metronome.next_beat_time().unwrap() >= 2.45 - 0.1);

        // Phase preserved: the beat at 2.5s is beat 5 = measure position 1
        let beats_snapshot = beats.lock().unwrap().clone();
        assert_eq!(beats_snapshot.len(), 1);
        clock.set(2.495);
        metronome.poll_schedule();
        let beats = beats.lock().unwrap();
        assert_eq!(beats[1].beat_in_measure, 1);
        assert_eq!(beats[1].beat_number, 5);
    }

    #[test]
    fn test_sink_suspension_resumes() {
        let (mut metronome, clock, sink) = setup();
        metronome.play().unwrap();

        sink.set_available(false);
        run_for(&mut metronome, &clock, 0.5);

        assert!(metronome.is_playing());
        assert!(sink.is_available());
        assert_eq!(sink.acquire_count(), 2);
    }

    #[test]
    fn test_sink_loss_stops_cleanly() {
        let (mut metronome, clock, sink) = setup();
        let stopped = Arc::new(Mutex::new(Vec::new()));
        let s = stopped.clone();
        metronome.subscribe(move |event| {
            if let MetronomeEvent::Stopped { reason } = event {
                s.lock().unwrap().push(*reason);
            }
        });
        metronome.play().unwrap();

        sink.set_available(false);
        sink.set_acquirable(false);
        clock.advance(0.025);
        metronome.poll_schedule();

        assert!(!metronome.is_playing());
        assert!(!metronome.is_active());
        assert_eq!(*stopped.lock().unwrap(), vec![StopReason::SinkLost]);
    }

    #[test]
    fn test_sound_disabled_still_notifies() {
        let (mut metronome, clock, sink) = setup();
        let beats = record_beats(&mut metronome);
        metronome.set_sound_enabled(false);
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 1.0);

        assert!(sink.scheduled().is_empty());
        assert!(beats.lock().unwrap().len() >= 2);
    }

    #[test]
    fn test_time_signature_change() {
        let (mut metronome, clock, _) = setup();
        metronome.set_accent_pattern([true, false, true]);
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 1.0);

        metronome.set_time_signature(5);
        assert_eq!(metronome.beat_count(), 0);
        assert_eq!(
            metronome.accent_pattern(),
            Some(&[true, false, true, false, false][..])
        );

        metronome.set_time_signature(2);
        assert_eq!(metronome.accent_pattern(), Some(&[true, false][..]));
    }

    #[test]
    fn test_polyrhythm_resets_phase() {
        let (mut metronome, clock, _) = setup();
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 1.0);
        assert!(metronome.beat_count() > 0);

        metronome.set_polyrhythm([1, 0, 0], "3:4");
        assert_eq!(metronome.beat_count(), 0);
        assert_eq!(metronome.polyrhythm().map(|p| p.name()), Some("3:4"));

        metronome.set_polyrhythm(Vec::<u8>::new(), "none");
        assert!(metronome.polyrhythm().is_none());
    }

    #[test]
    fn test_polyrhythm_drives_scheduled_accents() {
        let (mut metronome, clock, sink) = setup();
        metronome.set_polyrhythm([1, 0, 0], "3 over 4");
        metronome.play().unwrap();
        run_for(&mut metronome, &clock, 3.0);

        let accents: Vec<bool> = sink
            .scheduled()
            .iter()
            .take(6)
            .map(|t| t.click.is_accent())
            .collect();
        assert_eq!(accents, vec![true, false, false, true, false, false]);
    }

    #[test]
    fn test_elapsed_and_lyrics() {
        let (mut metronome, clock, _) = setup();
        metronome.set_lyrics(vec![
            LyricLine::new(10.0, "verse"),
            LyricLine::new(20.0, "chorus"),
            LyricLine::new(30.0, "bridge"),
        ]);

        let changes = Arc::new(Mutex::new(Vec::new()));
        let c = changes.clone();
        metronome.subscribe(move |event| {
            if let MetronomeEvent::LyricChanged { index, .. } = event {
                c.lock().unwrap().push(*index);
            }
        });

        metronome.play().unwrap();
        metronome.poll_elapsed();
        clock.set(25.0);
        metronome.poll_elapsed();
        metronome.poll_elapsed();

        assert_eq!(metronome.elapsed_time(), 25.0);
        assert_eq!(metronome.current_lyric().map(|l| l.text.as_str()), Some("chorus"));
        assert_eq!(*changes.lock().unwrap(), vec![0, 1]);

        metronome.stop();
        assert_eq!(metronome.elapsed_time(), 0.0);
        assert_eq!(metronome.current_lyric_index(), 0);
        assert_eq!(metronome.beat_count(), 0);
    }

    #[test]
    fn test_restart() {
        let (mut metronome, clock, _) = setup();
        assert!(!metronome.restart());
        assert!(!metronome.is_active());

        metronome.play().unwrap();
        assert!(metronome.restart());
        assert!(!metronome.is_playing());
        assert_eq!(metronome.next_wakeup(), Some(0.1));

        clock.set(0.1);
        metronome.poll_schedule();
        assert!(metronome.is_playing());
        assert_eq!(metronome.start_time(), Some(0.1));
    }

    #[test]
    fn test_stop_cancels_pending_restart() {
        let (mut metronome, clock, _) = setup();
        metronome.play().unwrap();
        metronome.restart();
        metronome.stop();

        clock.set(1.0);
        metronome.poll_schedule();
        assert!(!metronome.is_playing());
    }

    #[test]
    fn test_single_slot_callbacks() {
        let (mut metronome, clock, _) = setup();
        let beats = Arc::new(Mutex::new(Vec::new()));
        let times = Arc::new(Mutex::new(Vec::new()));

        let b = beats.clone();
        metronome.set_on_beat_callback(move |beat, accent| b.lock().unwrap().push((beat, accent)));
        let t = times.clone();
        metronome.set_on_time_update_callback(move |elapsed| t.lock().unwrap().push(elapsed));

        metronome.play().unwrap();
        clock.set(0.05);
        metronome.poll_elapsed();

        assert_eq!(*beats.lock().unwrap(), vec![(0, true)]);
        assert_eq!(*times.lock().unwrap(), vec![0.05]);
    }

    #[test]
    fn test_channel_subscriber() {
        let (mut metronome, _, _) = setup();
        let (_, mut rx) = metronome.subscribe_channel(16);
        metronome.play().unwrap();
        metronome.poll_elapsed();

        let events = crate::messaging::channels::drain_events(&mut rx);
        assert!(matches!(events[0], MetronomeEvent::Beat(_)));
        assert!(matches!(events[1], MetronomeEvent::TimeUpdate { .. }));
    }

    #[test]
    fn test_snapshot() {
        let (mut metronome, _, _) = setup();
        metronome.set_accent_pattern(["0", "1"]);
        let snapshot = metronome.snapshot();
        assert_eq!(snapshot.accent_model, AccentModel::Pattern);
        assert!(!snapshot.playing);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }
}
