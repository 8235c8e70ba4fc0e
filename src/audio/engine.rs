// Audio engine - CPAL click output
//
// # Threading
//
// On macOS (CoreAudio) the cpal `Stream` is neither Send nor Sync, so the
// stream lives on a dedicated audio-owner thread for its whole life. The sink
// itself only holds Send handles:
// - the producer side of the tone queue (scheduled clicks, sample positions)
// - the stream's `AudioTiming` (frames rendered, the sink clock)
// - an `AtomicDeviceStatus` set to `Error` by the stream error callback
//
// # Format Support
//
// F32, I16 and U16 output formats are handled through cpal's
// `FromSample<f32>`; clicks are rendered in f32 and converted per frame.
//
// # Clock
//
// `now()` counts rendered frames, so it is exactly the clock the clicks are
// placed on. It stays monotonic across release/acquire cycles: a reopened
// stream continues from the time the previous one stopped at.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::click::{
    ClickRenderer, ClickVoice, ScheduledTone, TONE_QUEUE_CAPACITY, ToneConsumer, ToneProducer,
    create_tone_queue,
};
use crate::audio::parameters::AtomicF32;
use crate::audio::sink::{ClickSink, ClickType};
use crate::audio::timing::AudioTiming;
use crate::config::ClickSettings;
use crate::connection::status::{AtomicDeviceStatus, DeviceStatus};
use crate::error::{MetronomeError, Result};

/// How long `acquire` waits for the audio thread to open the device
const STREAM_OPEN_TIMEOUT: Duration = Duration::from_secs(3);

struct AudioThread {
    shutdown: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Stream handles the audio thread reports back once the device is running
struct StreamInfo {
    timing: AudioTiming,
    device_name: String,
    channels: usize,
}

pub struct CpalClickSink {
    settings: ClickSettings,
    pub volume: AtomicF32,
    pub status: AtomicDeviceStatus,
    tones: Option<ToneProducer>,
    timing: Option<AudioTiming>,
    /// Sink time at which the current stream's frame 0 was rendered
    clock_offset: f64,
    audio_thread: Option<AudioThread>,
    device_name: Option<String>,
}

impl CpalClickSink {
    /// The device is opened lazily by the first `acquire`
    pub fn new(settings: ClickSettings) -> Self {
        let volume = AtomicF32::new(settings.volume.clamp(0.0, 1.0));
        Self {
            settings,
            volume,
            status: AtomicDeviceStatus::new(DeviceStatus::Disconnected),
            tones: None,
            timing: None,
            clock_offset: 0.0,
            audio_thread: None,
            device_name: None,
        }
    }

    pub fn device_name(&self) -> Option<&str> {
        self.device_name.as_deref()
    }

    pub fn sample_rate(&self) -> Option<f64> {
        self.timing.as_ref().map(|t| t.sample_rate())
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.set(volume.clamp(0.0, 1.0));
    }

    fn open_stream(&mut self) -> Result<()> {
        let (producer, consumer) = create_tone_queue(TONE_QUEUE_CAPACITY);
        let (ready_tx, ready_rx) = mpsc::channel::<std::result::Result<StreamInfo, String>>();
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let settings = self.settings.clone();
        let volume = self.volume.clone();
        let status = self.status.clone();
        let base_time = self.now();

        let handle = thread::Builder::new()
            .name("stagebeat-audio".to_string())
            .spawn(move || match open_default_output(consumer, &settings, volume, status) {
                Ok((stream, info)) => {
                    if ready_tx.send(Ok(info)).is_err() {
                        return;
                    }
                    // Block until the sink releases the stream (or is dropped)
                    let _ = shutdown_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })?;

        match ready_rx.recv_timeout(STREAM_OPEN_TIMEOUT) {
            Ok(Ok(info)) => {
                log::info!(
                    "Audio output started on '{}': {} Hz, {} channels",
                    info.device_name,
                    info.timing.sample_rate(),
                    info.channels
                );
                self.clock_offset = base_time;
                self.timing = Some(info.timing);
                self.device_name = Some(info.device_name);
                self.tones = Some(producer);
                self.audio_thread = Some(AudioThread {
                    shutdown: shutdown_tx,
                    handle,
                });
                Ok(())
            }
            Ok(Err(message)) => {
                let _ = handle.join();
                Err(MetronomeError::AudioDevice(message))
            }
            Err(_) => {
                // Dropping the shutdown sender lets the thread exit if it ever gets there
                drop(shutdown_tx);
                Err(MetronomeError::AudioDevice(
                    "timed out opening the audio stream".to_string(),
                ))
            }
        }
    }

    fn close_stream(&mut self) {
        let now = self.now();
        self.tones = None;
        self.timing = None;
        self.clock_offset = now;

        if let Some(thread) = self.audio_thread.take() {
            let _ = thread.shutdown.send(());
            if thread.handle.join().is_err() {
                log::error!("Audio thread panicked");
            }
            log::info!("Audio output closed");
        }
    }
}

impl ClickSink for CpalClickSink {
    fn now(&self) -> f64 {
        self.clock_offset + self.timing.as_ref().map_or(0.0, |t| t.now_seconds())
    }

    fn schedule_tone(&mut self, at: f64, click: ClickType) {
        let (Some(tones), Some(timing)) = (self.tones.as_mut(), self.timing.as_ref()) else {
            return;
        };
        let tone = ScheduledTone {
            sample: timing.seconds_to_samples(at - self.clock_offset),
            click,
        };
        if tones.try_push(tone).is_err() {
            log::warn!("Tone queue full, dropping click at {:.3}s", at);
        }
    }

    fn is_available(&self) -> bool {
        self.tones.is_some() && self.status.get().is_usable()
    }

    fn acquire(&mut self) -> bool {
        if self.is_available() {
            return true;
        }

        // A stream that reported an error is torn down before reopening
        self.close_stream();
        self.status.set(DeviceStatus::Connecting);

        match self.open_stream() {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Could not open audio output: {}", e);
                self.status.set(DeviceStatus::Disconnected);
                false
            }
        }
    }

    fn cancel_pending(&mut self) {
        if let Some(tones) = self.tones.as_mut() {
            tones.cancel_pending();
        }
    }

    fn release(&mut self) {
        self.close_stream();
        self.status.set(DeviceStatus::Disconnected);
    }
}

impl Drop for CpalClickSink {
    fn drop(&mut self) {
        self.close_stream();
    }
}

impl std::fmt::Debug for CpalClickSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalClickSink")
            .field("device", &self.device_name)
            .field("status", &self.status.get())
            .field("clock", &self.now())
            .finish()
    }
}

/// Open the default output device and start rendering clicks
/// Runs on the audio-owner thread
fn open_default_output(
    tones: ToneConsumer,
    settings: &ClickSettings,
    volume: AtomicF32,
    status: AtomicDeviceStatus,
) -> std::result::Result<(Stream, StreamInfo), String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("No audio device found")?;
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());

    let supported_config = device
        .default_output_config()
        .map_err(|e| format!("Configuration error: {}", e))?;
    let sample_format = supported_config.sample_format();
    log::debug!("Output config: {:?}", supported_config);

    let sample_rate = supported_config.sample_rate().0;
    let channels = supported_config.channels() as usize;
    let config: StreamConfig = supported_config.into();

    let timing = AudioTiming::new(sample_rate as f64);
    let renderer = ClickRenderer::new(tones, ClickVoice::new(sample_rate as f32, settings));

    let stream = match sample_format {
        SampleFormat::F32 => build_stream::<f32>(
            &device,
            &config,
            channels,
            renderer,
            volume,
            timing.clone(),
            status.clone(),
        ),
        SampleFormat::I16 => build_stream::<i16>(
            &device,
            &config,
            channels,
            renderer,
            volume,
            timing.clone(),
            status.clone(),
        ),
        SampleFormat::U16 => build_stream::<u16>(
            &device,
            &config,
            channels,
            renderer,
            volume,
            timing.clone(),
            status.clone(),
        ),
        _ => {
            return Err(format!(
                "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                sample_format
            ));
        }
    }?;

    start_connected(&status, || {
        stream
            .play()
            .map_err(|e| format!("Error starting the stream: {}", e))
    })?;

    Ok((
        stream,
        StreamInfo {
            timing,
            device_name,
            channels,
        },
    ))
}

/// Mark the device connected, then start it
/// An error the stream reports from `start` onwards is kept
fn start_connected<F>(status: &AtomicDeviceStatus, start: F) -> std::result::Result<(), String>
where
    F: FnOnce() -> std::result::Result<(), String>,
{
    status.set(DeviceStatus::Connected);
    start()
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    channels: usize,
    mut renderer: ClickRenderer,
    volume: AtomicF32,
    timing: AudioTiming,
    status: AtomicDeviceStatus,
) -> std::result::Result<Stream, String>
where
    T: SizedSample + FromSample<f32> + Send + 'static,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // No allocations, no I/O, no locks
                let start = timing.current_sample();
                let gain = volume.get();
                let mut frames = 0;

                for (offset, frame) in data.chunks_mut(channels).enumerate() {
                    let sample = renderer.render_frame(start + offset as u64) * gain;
                    let value = T::from_sample(sample.clamp(-1.0, 1.0));
                    for out in frame.iter_mut() {
                        *out = value;
                    }
                    frames += 1;
                }

                timing.advance(frames);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
                // A stream being torn down must not mark its successor as failed
                status.transition(DeviceStatus::Connected, DeviceStatus::Error);
            },
            None,
        )
        .map_err(|e| format!("Error creating the stream: {}", e))
}
