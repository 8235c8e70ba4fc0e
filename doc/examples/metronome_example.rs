// Example: driving the metronome by hand
// Shows the two poll bodies a host calls, against a virtual clock, so the
// lookahead behaviour can be followed tick by tick.

use stagebeat::{LyricLine, ManualClock, Metronome, MetronomeEvent, VirtualSink};

fn main() {
    let clock = ManualClock::new(0.0);
    let sink = VirtualSink::manual(clock.clone());
    let recorder = sink.clone();

    let mut metronome = Metronome::new(sink);
    metronome.set_bpm(120);
    metronome.set_time_signature(3);
    metronome.set_accent_pattern([1, 0, 1]);
    metronome.set_lyrics(vec![
        LyricLine::new(0.0, "count in"),
        LyricLine::new(1.5, "first line"),
    ]);

    metronome.subscribe(|event| match event {
        MetronomeEvent::Beat(beat) => println!(
            "  beat {} of 3{} (click at {:.3}s)",
            beat.beat_in_measure + 1,
            if beat.accent { " ACCENT" } else { "" },
            beat.time
        ),
        MetronomeEvent::LyricChanged { text, .. } => println!("  lyric: {}", text),
        _ => {}
    });

    println!("Simulating 3 seconds at 120 BPM, 3 beats per measure");
    metronome.play().expect("virtual sink is always available");

    // Fast loop every 25 ms, slow loop every 50 ms
    for tick in 1..=120 {
        clock.advance(0.025);
        metronome.poll_schedule();
        if tick % 2 == 0 {
            metronome.poll_elapsed();
        }
    }
    metronome.stop();

    println!("\nTones handed to the sink:");
    for tone in recorder.scheduled() {
        println!(
            "  {:?} at {:.3}s (scheduled {:.0} ms ahead)",
            tone.click,
            tone.at,
            (tone.at - tone.scheduled_at) * 1000.0
        );
    }
}
