// Click sound - pre-rendered accent/regular clicks and their playback

use super::sink::ClickType;
use crate::config::ClickSettings;
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::f32::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Pre-generates short click samples for low CPU overhead
#[derive(Debug, Clone)]
pub struct ClickSound {
    accent_samples: Vec<f32>,
    regular_samples: Vec<f32>,
}

impl ClickSound {
    pub fn new(sample_rate: f32, settings: &ClickSettings) -> Self {
        let click_samples = ((settings.duration_ms / 1000.0) * sample_rate) as usize;

        Self {
            accent_samples: Self::generate_click(
                sample_rate,
                click_samples,
                settings.accent_frequency,
                settings.accent_amplitude,
            ),
            regular_samples: Self::generate_click(
                sample_rate,
                click_samples,
                settings.regular_frequency,
                settings.regular_amplitude,
            ),
        }
    }

    /// Sine wave with a fast exponential decay
    fn generate_click(
        sample_rate: f32,
        num_samples: usize,
        frequency: f32,
        amplitude: f32,
    ) -> Vec<f32> {
        let phase_increment = 2.0 * PI * frequency / sample_rate;

        (0..num_samples)
            .map(|i| {
                let t = i as f32 / num_samples as f32;
                let envelope = (-t * 8.0).exp();
                (i as f32 * phase_increment).sin() * envelope * amplitude
            })
            .collect()
    }

    pub fn get_click(&self, click_type: ClickType) -> &[f32] {
        match click_type {
            ClickType::Accent => &self.accent_samples,
            ClickType::Regular => &self.regular_samples,
        }
    }

    /// Duration of a click in samples
    pub fn click_duration(&self) -> usize {
        self.accent_samples.len()
    }
}

#[derive(Debug, Clone, Copy)]
struct ClickPlayback {
    click_type: ClickType,
    position: usize,
}

/// Plays one click at a time; a new trigger cuts the previous one
#[derive(Debug, Clone)]
pub struct ClickVoice {
    sound: ClickSound,
    volume: f32,
    current: Option<ClickPlayback>,
}

impl ClickVoice {
    pub fn new(sample_rate: f32, settings: &ClickSettings) -> Self {
        Self {
            sound: ClickSound::new(sample_rate, settings),
            volume: settings.volume.clamp(0.0, 1.0),
            current: None,
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn trigger(&mut self, click_type: ClickType) {
        self.current = Some(ClickPlayback {
            click_type,
            position: 0,
        });
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    /// Next output sample, 0.0 when idle
    pub fn next_sample(&mut self) -> f32 {
        let Some(playback) = self.current.as_mut() else {
            return 0.0;
        };

        let samples = self.sound.get_click(playback.click_type);
        if let Some(&sample) = samples.get(playback.position) {
            playback.position += 1;
            sample * self.volume
        } else {
            self.current = None;
            0.0
        }
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// A click pinned to an absolute sample position of the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTone {
    pub sample: u64,
    pub click: ClickType,
}

/// A tone tagged with the queue generation it was pushed in
#[derive(Debug, Clone, Copy)]
struct QueuedTone {
    tone: ScheduledTone,
    generation: u64,
}

/// Sending half of the tone queue, owned by the sink
///
/// `cancel_pending` starts a new generation: every tone pushed before it is
/// dropped by the renderer, whether still queued or already peeked.
pub struct ToneProducer {
    queue: HeapProd<QueuedTone>,
    generation: Arc<AtomicU64>,
    current: u64,
}

impl ToneProducer {
    /// Returns the tone back if the queue is full
    pub fn try_push(&mut self, tone: ScheduledTone) -> Result<(), ScheduledTone> {
        self.queue
            .try_push(QueuedTone {
                tone,
                generation: self.current,
            })
            .map_err(|queued| queued.tone)
    }

    pub fn cancel_pending(&mut self) {
        self.current += 1;
        self.generation.store(self.current, Ordering::Release);
    }
}

/// Receiving half of the tone queue, owned by the renderer
pub struct ToneConsumer {
    queue: HeapCons<QueuedTone>,
    generation: Arc<AtomicU64>,
}

impl ToneConsumer {
    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Next tone of at least `generation`, discarding cancelled ones
    fn pop_current(&mut self, generation: u64) -> Option<QueuedTone> {
        while let Some(queued) = self.queue.try_pop() {
            if queued.generation >= generation {
                return Some(queued);
            }
        }
        None
    }

    fn clear(&mut self) {
        while self.queue.try_pop().is_some() {}
    }
}

/// Capacity of the tone queue; the lookahead never holds more than a few beats
pub const TONE_QUEUE_CAPACITY: usize = 64;

pub fn create_tone_queue(capacity: usize) -> (ToneProducer, ToneConsumer) {
    let (queue_tx, queue_rx) = HeapRb::<QueuedTone>::new(capacity.max(1)).split();
    let generation = Arc::new(AtomicU64::new(0));
    (
        ToneProducer {
            queue: queue_tx,
            generation: Arc::clone(&generation),
            current: 0,
        },
        ToneConsumer {
            queue: queue_rx,
            generation,
        },
    )
}

/// Renders queued tones sample-accurately
///
/// Tones of one generation must arrive in non-decreasing sample order. A tone
/// whose position is already behind the render head starts on the next
/// rendered frame. Allocation-free once constructed, safe to run inside the
/// audio callback.
pub struct ClickRenderer {
    tones: ToneConsumer,
    upcoming: Option<QueuedTone>,
    generation: u64,
    voice: ClickVoice,
}

impl ClickRenderer {
    pub fn new(tones: ToneConsumer, voice: ClickVoice) -> Self {
        Self {
            tones,
            upcoming: None,
            generation: 0,
            voice,
        }
    }

    /// Render the frame at absolute sample `position`
    #[inline]
    pub fn render_frame(&mut self, position: u64) -> f32 {
        let generation = self.tones.generation();
        if generation != self.generation {
            self.generation = generation;
            if self.upcoming.is_some_and(|queued| queued.generation < generation) {
                self.upcoming = None;
            }
        }

        loop {
            if self.upcoming.is_none() {
                self.upcoming = self.tones.pop_current(self.generation);
            }
            match self.upcoming {
                Some(queued) if queued.tone.sample <= position => {
                    self.voice.trigger(queued.tone.click);
                    self.upcoming = None;
                }
                _ => break,
            }
        }
        self.voice.next_sample()
    }

    /// Fill `out` with consecutive frames starting at `start`
    pub fn render(&mut self, start: u64, out: &mut [f32]) {
        for (offset, sample) in out.iter_mut().enumerate() {
            *sample = self.render_frame(start + offset as u64);
        }
    }

    /// Silence the voice and forget every queued tone
    /// Only for a renderer that is not running concurrently with its sink
    pub fn reset(&mut self) {
        self.tones.clear();
        self.upcoming = None;
        self.generation = self.tones.generation();
        self.voice.reset();
    }
}
