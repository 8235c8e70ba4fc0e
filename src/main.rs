// Stagebeat CLI - play a click track live or render it to WAV

use clap::{Args, Parser, Subcommand};
use stagebeat::connection::ReconnectionStrategy;
use stagebeat::messaging::drain_events;
use stagebeat::sequencer::Polyrhythm;
use stagebeat::{
    ClickSink, CpalClickSink, LyricLine, Metronome, MetronomeConfig, MetronomeError,
    MetronomeEvent, MetronomeRunner, OfflineRenderer, Result,
};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

/// Drain interval of the event channel in the play loop
const EVENT_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Parser)]
#[command(name = "stagebeat")]
#[command(about = "Lookahead metronome with accents, polyrhythms and lyric cues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play through the default audio output
    Play {
        #[command(flatten)]
        session: SessionArgs,

        /// Stop after this many seconds (default: until interrupted)
        #[arg(short, long)]
        duration: Option<f64>,
    },

    /// Render the click track to a WAV file
    Export {
        /// Output WAV file path
        output: PathBuf,

        #[command(flatten)]
        session: SessionArgs,

        /// Duration in seconds (default: 10.0)
        #[arg(short, long, default_value = "10.0")]
        duration: f64,

        /// Sample rate in Hz (default: 44100)
        #[arg(short, long, default_value = "44100")]
        sample_rate: u32,
    },
}

#[derive(Args)]
struct SessionArgs {
    /// Tempo, clamped to 40-300
    #[arg(short, long)]
    bpm: Option<u32>,

    /// Beats per measure
    #[arg(long)]
    beats: Option<u32>,

    /// Accented beat, 1-indexed (0 = no accent)
    #[arg(short, long)]
    accent_beat: Option<u32>,

    /// Accent pattern, e.g. 1,0,0,1
    #[arg(short, long, value_delimiter = ',')]
    pattern: Option<Vec<u8>>,

    /// Polyrhythm overlay, e.g. 1,0,0
    #[arg(long, value_delimiter = ',', conflicts_with = "euclid")]
    polyrhythm: Option<Vec<u8>>,

    /// Euclidean polyrhythm as HITS,STEPS, e.g. 3,8
    #[arg(long, value_delimiter = ',', num_args = 2)]
    euclid: Option<Vec<usize>>,

    /// Display name of the polyrhythm
    #[arg(long, default_value = "custom")]
    poly_name: String,

    /// Lyric cues, JSON array of {"time": seconds, "text": "..."}
    #[arg(short, long)]
    lyrics: Option<PathBuf>,

    /// Configuration file (.ron or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Schedule beats without sound
    #[arg(long)]
    mute: bool,
}

impl SessionArgs {
    fn load_config(&self) -> Result<MetronomeConfig> {
        match &self.config {
            Some(path) => MetronomeConfig::load(path),
            None => match MetronomeConfig::default_path() {
                Some(path) => MetronomeConfig::load_or_default(&path),
                None => Ok(MetronomeConfig::default()),
            },
        }
    }

    fn apply<S: ClickSink>(&self, metronome: &mut Metronome<S>) -> Result<()> {
        if let Some(bpm) = self.bpm {
            metronome.set_bpm(bpm);
        }
        if let Some(beats) = self.beats {
            metronome.set_time_signature(beats);
        }
        if let Some(beat) = self.accent_beat {
            metronome.set_accent_beat(beat);
        }
        if let Some(pattern) = &self.pattern {
            metronome.set_accent_pattern(pattern);
        }
        if let Some(polyrhythm) = &self.polyrhythm {
            metronome.set_polyrhythm(polyrhythm, self.poly_name.as_str());
        }
        if let Some([hits, steps]) = self.euclid.as_deref() {
            metronome.apply_polyrhythm(Polyrhythm::euclidean(*hits, *steps, self.poly_name.as_str()));
        }
        if let Some(path) = &self.lyrics {
            metronome.set_lyrics(load_lyrics(path)?);
        }
        metronome.set_sound_enabled(!self.mute);
        Ok(())
    }
}

fn load_lyrics(path: &Path) -> Result<Vec<LyricLine>> {
    let data = std::fs::read_to_string(path)?;
    let lines: Vec<LyricLine> = serde_json::from_str(&data)?;
    log::info!("Loaded {} lyric lines from {}", lines.len(), path.display());
    Ok(lines)
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Play { session, duration } => play(&session, duration),
        Commands::Export {
            output,
            session,
            duration,
            sample_rate,
        } => export(&output, &session, duration, sample_rate),
    };

    if let Err(e) = result {
        eprintln!("ERROR: {}", e);
        std::process::exit(1);
    }
}

fn play(session: &SessionArgs, duration: Option<f64>) -> Result<()> {
    let config = session.load_config()?;
    let channel_capacity = config.event_channel_capacity;

    let mut metronome = Metronome::with_config(CpalClickSink::new(config.click.clone()), config);
    session.apply(&mut metronome)?;
    let (_, mut events) = metronome.subscribe_channel(channel_capacity);

    let snapshot = metronome.snapshot();
    println!(
        "Playing at {} BPM, {} beats per measure ({:?} accents)",
        snapshot.bpm, snapshot.beats_per_measure, snapshot.accent_model
    );

    let mut runner = MetronomeRunner::new(metronome);
    start_with_retry(&mut runner)?;

    let started = Instant::now();
    let deadline = duration.and_then(|d| Duration::try_from_secs_f64(d).ok());

    loop {
        for event in drain_events(&mut events) {
            print_event(&event);
        }
        if !runner.is_running() {
            println!("Playback ended");
            break;
        }
        if deadline.is_some_and(|d| started.elapsed() >= d) {
            break;
        }
        thread::sleep(EVENT_POLL_INTERVAL);
    }

    runner.shutdown();
    Ok(())
}

/// Retry `play` with backoff while the audio device cannot be opened
fn start_with_retry(runner: &mut MetronomeRunner<CpalClickSink>) -> Result<()> {
    ReconnectionStrategy::new().retry(
        || runner.play(),
        |e| matches!(e, MetronomeError::SinkUnavailable(_)),
    )
}

fn print_event(event: &MetronomeEvent) {
    match event {
        MetronomeEvent::Beat(beat) => {
            let marker = if beat.accent { "ACCENT" } else { "tick" };
            println!("[{:>8.3}s] beat {} {}", beat.time, beat.beat_in_measure + 1, marker);
        }
        MetronomeEvent::LyricChanged { time, text, .. } => {
            println!("[{:>8.3}s] >> {}", time, text);
        }
        MetronomeEvent::Stopped { reason } => {
            println!("Stopped: {:?}", reason);
        }
        MetronomeEvent::TimeUpdate { .. } => {}
    }
}

fn export(output: &Path, session: &SessionArgs, duration: f64, sample_rate: u32) -> Result<()> {
    let config = session.load_config()?;
    let mut renderer = OfflineRenderer::new(config, sample_rate);
    session.apply(renderer.metronome_mut())?;

    let summary = renderer.export_wav(output, duration)?;
    println!(
        "Exported {:.2}s, {} beats, {} frames at {} Hz to {}",
        summary.duration,
        summary.beats,
        summary.frames,
        sample_rate,
        output.display()
    );
    Ok(())
}
