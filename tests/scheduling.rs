//! Scheduling precision under irregular polling
//!
//! The host's poll timer is never exact. These tests drive the scheduler
//! from a jittered virtual clock and check that the clicks handed to the
//! sink stay on a perfect grid and that beat notifications line up with them.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stagebeat::{ClickSink, ManualClock, Metronome, MetronomeEvent, VirtualSink};
use std::sync::{Arc, Mutex};

/// Drive `metronome` like the runner does, with each fast-loop sleep
/// stretched by up to 15 ms of random jitter
fn drive_jittered(
    metronome: &mut Metronome<VirtualSink>,
    clock: &ManualClock,
    rng: &mut StdRng,
    seconds: f64,
) {
    let end = clock.now() + seconds;
    while clock.now() < end {
        let interval = 0.025 + rng.gen_range(0.0..0.015);
        let next = match metronome.next_wakeup() {
            Some(at) if at > clock.now() => (clock.now() + interval).min(at),
            _ => clock.now() + interval,
        };
        clock.set(next);
        metronome.poll_schedule();
    }
}

#[test]
fn test_beat_spacing_across_tempo_range() {
    let mut rng = StdRng::seed_from_u64(42);

    for bpm in [40, 60, 97, 120, 176, 240, 300] {
        let clock = ManualClock::new(3.0);
        let sink = VirtualSink::manual(clock.clone());
        let observer = sink.clone();
        let mut metronome = Metronome::new(sink);
        metronome.set_bpm(bpm);

        metronome.play().unwrap();
        drive_jittered(&mut metronome, &clock, &mut rng, 12.0);

        let expected = 60.0 / bpm as f64;
        let tones = observer.scheduled();
        assert!(tones.len() >= 8, "bpm {}: only {} tones", bpm, tones.len());
        assert_eq!(tones[0].at, 3.0);

        for (i, pair) in tones.windows(2).enumerate() {
            let spacing = pair[1].at - pair[0].at;
            assert!(
                (spacing - expected).abs() < 1e-9,
                "bpm {}: beat {} spacing {} != {}",
                bpm,
                i,
                spacing,
                expected
            );
        }

        for tone in &tones {
            // Never in the past, never beyond the horizon
            assert!(tone.at >= tone.scheduled_at - 1e-9);
            assert!(tone.at < tone.scheduled_at + 0.1 + 1e-9);
        }
    }
}

#[test]
fn test_notifications_line_up_with_clicks() {
    let mut rng = StdRng::seed_from_u64(7);
    let clock = ManualClock::new(0.0);
    let mut metronome = Metronome::new(VirtualSink::manual(clock.clone()));
    metronome.set_bpm(137);

    let emitted = Arc::new(Mutex::new(Vec::new()));
    let sink = emitted.clone();
    let event_clock = clock.clone();
    metronome.subscribe(move |event| {
        if let MetronomeEvent::Beat(beat) = event {
            sink.lock().unwrap().push((beat.time, event_clock.now()));
        }
    });

    metronome.play().unwrap();
    drive_jittered(&mut metronome, &clock, &mut rng, 8.0);

    let emitted = emitted.lock().unwrap();
    assert!(emitted.len() >= 17);
    for (beat_time, emitted_at) in emitted.iter() {
        let early = beat_time - emitted_at;
        assert!(early <= 0.01 + 1e-9, "notified {}s before the click", early);
        assert!(early >= -1e-9, "notified {}s after the click", -early);
    }
}

#[test]
fn test_beat_numbers_are_contiguous() {
    let mut rng = StdRng::seed_from_u64(3);
    let clock = ManualClock::new(0.0);
    let mut metronome = Metronome::new(VirtualSink::manual(clock.clone()));
    metronome.set_time_signature(7);

    let numbers = Arc::new(Mutex::new(Vec::new()));
    let sink = numbers.clone();
    metronome.subscribe(move |event| {
        if let Some(beat) = event.as_beat() {
            sink.lock().unwrap().push((beat.beat_number, beat.beat_in_measure));
        }
    });

    metronome.play().unwrap();
    drive_jittered(&mut metronome, &clock, &mut rng, 10.0);

    let numbers = numbers.lock().unwrap();
    for (i, (number, in_measure)) in numbers.iter().enumerate() {
        assert_eq!(*number, i as u64);
        assert_eq!(*in_measure, (i % 7) as u32);
    }
}

#[test]
fn test_stall_skips_beats_without_scheduling_in_the_past() {
    let clock = ManualClock::new(0.0);
    let sink = VirtualSink::manual(clock.clone());
    let observer = sink.clone();
    let mut metronome = Metronome::new(sink);
    metronome.set_bpm(120);
    metronome.play().unwrap();

    clock.set(0.3);
    metronome.poll_schedule();

    // The host freezes for several seconds
    clock.set(3.72);
    metronome.poll_schedule();
    let stalled_at = clock.now();

    for tone in observer.scheduled().iter().filter(|t| t.scheduled_at >= stalled_at) {
        assert!(tone.at >= stalled_at);
    }
    let next = metronome.next_beat_time().unwrap();
    assert!(next >= stalled_at - 0.1);

    // The grid is preserved: every click is still a multiple of the beat
    clock.set(6.0);
    metronome.poll_schedule();
    for tone in observer.scheduled() {
        let beats = tone.at / 0.5;
        assert!((beats - beats.round()).abs() < 1e-9);
    }
}

#[test]
fn test_virtual_sink_clock_is_the_scheduling_clock() {
    let clock = ManualClock::new(12.5);
    let sink = VirtualSink::manual(clock.clone());
    assert_eq!(sink.now(), 12.5);

    let mut metronome = Metronome::new(sink);
    metronome.play().unwrap();
    assert_eq!(metronome.start_time(), Some(12.5));
    assert_eq!(metronome.next_beat_time(), Some(13.0));
}
