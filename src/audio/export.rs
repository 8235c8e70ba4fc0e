// Audio Export - Offline rendering of a metronome session to WAV
//
// The same scheduler that drives the live output runs here against a sink
// whose clock is the number of frames rendered so far. Polls happen every
// lookahead interval of rendered audio, so the file contains exactly what a
// live session with a perfectly punctual host would have played.

use crate::audio::click::{
    ClickRenderer, ClickVoice, ScheduledTone, TONE_QUEUE_CAPACITY, ToneProducer,
    create_tone_queue,
};
use crate::audio::sink::{ClickSink, ClickType};
use crate::audio::timing::AudioTiming;
use crate::config::MetronomeConfig;
use crate::error::{MetronomeError, Result};
use crate::sequencer::metronome::Metronome;
use hound::{WavSpec, WavWriter};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Sink whose clock is the offline render position
pub struct OfflineSink {
    timing: AudioTiming,
    tones: ToneProducer,
    available: bool,
}

impl ClickSink for OfflineSink {
    fn now(&self) -> f64 {
        self.timing.now_seconds()
    }

    fn schedule_tone(&mut self, at: f64, click: ClickType) {
        let tone = ScheduledTone {
            sample: self.timing.seconds_to_samples(at),
            click,
        };
        if self.tones.try_push(tone).is_err() {
            log::warn!("Offline tone queue full, dropping click at {:.3}s", at);
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn acquire(&mut self) -> bool {
        self.available = true;
        true
    }

    fn cancel_pending(&mut self) {
        self.tones.cancel_pending();
    }

    fn release(&mut self) {
        self.available = false;
    }
}

/// Result of a finished export
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSummary {
    pub frames: u64,
    pub beats: usize,
    pub duration: f64,
}

pub struct OfflineRenderer {
    metronome: Metronome<OfflineSink>,
    renderer: ClickRenderer,
    timing: AudioTiming,
    sample_rate: u32,
    beats: Arc<AtomicUsize>,
}

impl OfflineRenderer {
    pub fn new(config: MetronomeConfig, sample_rate: u32) -> Self {
        let sample_rate = sample_rate.max(1);
        let timing = AudioTiming::new(sample_rate as f64);
        let (producer, consumer) = create_tone_queue(TONE_QUEUE_CAPACITY);
        let voice = ClickVoice::new(sample_rate as f32, &config.click);

        let sink = OfflineSink {
            timing: timing.clone(),
            tones: producer,
            available: false,
        };
        let mut metronome = Metronome::with_config(sink, config);

        let beats = Arc::new(AtomicUsize::new(0));
        let counter = beats.clone();
        metronome.subscribe(move |event| {
            if event.as_beat().is_some() {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });

        Self {
            metronome,
            renderer: ClickRenderer::new(consumer, voice),
            timing,
            sample_rate,
            beats,
        }
    }

    /// Configure tempo, accents, lyrics and listeners before rendering
    pub fn metronome_mut(&mut self) -> &mut Metronome<OfflineSink> {
        &mut self.metronome
    }

    pub fn metronome(&self) -> &Metronome<OfflineSink> {
        &self.metronome
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Play for `seconds` and return the mono samples
    pub fn render(&mut self, seconds: f64) -> Result<Vec<f32>> {
        let mut samples = Vec::new();
        self.render_with(seconds, |block| {
            samples.extend_from_slice(block);
            Ok(())
        })?;
        Ok(samples)
    }

    /// Render `seconds` into a 16-bit mono WAV file
    pub fn export_wav(&mut self, path: &Path, seconds: f64) -> Result<ExportSummary> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: self.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec)?;

        let summary = self.render_with(seconds, |block| {
            for sample in block {
                let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(value)?;
            }
            Ok(())
        })?;
        writer.finalize()?;

        log::info!(
            "Exported {:.2}s ({} beats) to {}",
            summary.duration,
            summary.beats,
            path.display()
        );
        Ok(summary)
    }

    fn render_with<F>(&mut self, seconds: f64, mut write: F) -> Result<ExportSummary>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        if !seconds.is_finite() || seconds <= 0.0 {
            return Err(MetronomeError::Config(format!(
                "render duration must be positive, got {}",
                seconds
            )));
        }

        let config = self.metronome.config();
        let total = self.timing.seconds_to_samples(seconds);
        let block = self
            .timing
            .seconds_to_samples(config.lookahead_interval().as_secs_f64())
            .max(1);
        let time_update = self
            .timing
            .seconds_to_samples(config.time_update_interval().as_secs_f64())
            .max(1);

        let start = self.timing.current_sample();
        let beats_before = self.beats.load(Ordering::Relaxed);

        // Clicks left over from a previous render must not leak into this one
        self.renderer.reset();
        self.metronome.play()?;
        let rendered = self.render_blocks(start, start + total, block, time_update, &mut write);
        self.metronome.stop();
        rendered?;

        Ok(ExportSummary {
            frames: total,
            beats: self.beats.load(Ordering::Relaxed) - beats_before,
            duration: total as f64 / self.sample_rate as f64,
        })
    }

    fn render_blocks<F>(
        &mut self,
        start: u64,
        end: u64,
        block: u64,
        time_update: u64,
        write: &mut F,
    ) -> Result<()>
    where
        F: FnMut(&[f32]) -> Result<()>,
    {
        let mut buffer = vec![0.0f32; block as usize];
        let mut next_time_update = start;
        let mut position = start;

        while position < end {
            self.metronome.poll_schedule();
            if position >= next_time_update {
                self.metronome.poll_elapsed();
                next_time_update += time_update;
            }

            let frames = block.min(end - position) as usize;
            let out = &mut buffer[..frames];
            self.renderer.render(position, out);
            write(out)?;

            self.timing.advance(frames);
            position += frames as u64;
        }
        Ok(())
    }
}
