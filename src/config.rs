// Configuration - scheduler timing constants and click sound settings
// Stored as RON (default) or JSON, selected by file extension.

use crate::error::{MetronomeError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Click sound settings
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClickSettings {
    pub accent_frequency: f32,
    pub regular_frequency: f32,
    pub accent_amplitude: f32,
    pub regular_amplitude: f32,
    pub duration_ms: f32,
    /// Master volume (0.0 to 1.0)
    pub volume: f32,
}

impl Default for ClickSettings {
    fn default() -> Self {
        Self {
            accent_frequency: 1200.0,
            regular_frequency: 800.0,
            accent_amplitude: 0.6,
            regular_amplitude: 0.4,
            duration_ms: 10.0,
            volume: 0.8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MetronomeConfig {
    /// Period of the scheduling poll
    pub lookahead_interval_ms: u64,
    /// Horizon of the scheduling pass: beats due before now + this are scheduled
    pub schedule_ahead_secs: f64,
    /// Period of the elapsed-time / lyric poll
    pub time_update_interval_ms: u64,
    /// Beats closer than this are notified immediately instead of queued
    pub immediate_callback_secs: f64,
    /// Delay between stop and re-play after a tempo change
    pub tempo_change_delay_ms: u64,
    /// Delay between stop and re-play on `restart()`
    pub restart_delay_ms: u64,
    /// Beat counter is reduced after this many measures
    pub beat_wrap_measures: u64,
    pub default_bpm: u32,
    pub default_beats: u32,
    /// 0 = no accent
    pub default_accent_beat: u32,
    pub event_channel_capacity: usize,
    pub click: ClickSettings,
}

impl Default for MetronomeConfig {
    fn default() -> Self {
        Self {
            lookahead_interval_ms: 25,
            schedule_ahead_secs: 0.1,
            time_update_interval_ms: 50,
            immediate_callback_secs: 0.01,
            tempo_change_delay_ms: 10,
            restart_delay_ms: 100,
            beat_wrap_measures: 1000,
            default_bpm: 120,
            default_beats: 4,
            default_accent_beat: 1,
            event_channel_capacity: 256,
            click: ClickSettings::default(),
        }
    }
}

impl MetronomeConfig {
    pub fn lookahead_interval(&self) -> Duration {
        Duration::from_millis(self.lookahead_interval_ms)
    }

    pub fn time_update_interval(&self) -> Duration {
        Duration::from_millis(self.time_update_interval_ms)
    }

    pub fn tempo_change_delay_secs(&self) -> f64 {
        self.tempo_change_delay_ms as f64 / 1000.0
    }

    pub fn restart_delay_secs(&self) -> f64 {
        self.restart_delay_ms as f64 / 1000.0
    }

    /// Clamp every field into a usable range
    ///
    /// The scheduling horizon must cover at least one poll period, otherwise
    /// a poll arriving on time could already be too late for the next beat.
    pub fn validated(mut self) -> Self {
        self.lookahead_interval_ms = self.lookahead_interval_ms.clamp(1, 1000);
        let min_horizon = self.lookahead_interval_ms as f64 / 1000.0;
        if !self.schedule_ahead_secs.is_finite() || self.schedule_ahead_secs < min_horizon {
            self.schedule_ahead_secs = min_horizon.max(Self::default().schedule_ahead_secs);
        }
        self.schedule_ahead_secs = self.schedule_ahead_secs.min(2.0);
        self.time_update_interval_ms = self.time_update_interval_ms.clamp(1, 10_000);
        if !self.immediate_callback_secs.is_finite() || self.immediate_callback_secs < 0.0 {
            self.immediate_callback_secs = 0.0;
        }
        self.beat_wrap_measures = self.beat_wrap_measures.max(1);
        self.default_beats = self.default_beats.max(1);
        self.event_channel_capacity = self.event_channel_capacity.max(1);

        let click = &mut self.click;
        click.volume = click.volume.clamp(0.0, 1.0);
        click.accent_amplitude = click.accent_amplitude.clamp(0.0, 1.0);
        click.regular_amplitude = click.regular_amplitude.clamp(0.0, 1.0);
        click.duration_ms = click.duration_ms.clamp(1.0, 500.0);
        click.accent_frequency = click.accent_frequency.clamp(20.0, 20_000.0);
        click.regular_frequency = click.regular_frequency.clamp(20.0, 20_000.0);
        self
    }

    pub fn from_ron_str(data: &str) -> Result<Self> {
        let config: Self = ron::from_str(data)?;
        Ok(config.validated())
    }

    pub fn to_ron_string(&self) -> Result<String> {
        Ok(ron::ser::to_string_pretty(
            self,
            ron::ser::PrettyConfig::default(),
        )?)
    }

    pub fn from_json_str(data: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(data)?;
        Ok(config.validated())
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Load from a `.ron` or `.json` file
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        match ConfigFormat::from_path(path)? {
            ConfigFormat::Ron => Self::from_ron_str(&data),
            ConfigFormat::Json => Self::from_json_str(&data),
        }
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            log::debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = match ConfigFormat::from_path(path)? {
            ConfigFormat::Ron => self.to_ron_string()?,
            ConfigFormat::Json => self.to_json_string()?,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, data)?;
        Ok(())
    }

    /// `<config dir>/stagebeat/metronome.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("stagebeat").join("metronome.ron"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Ron,
    Json,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ron") => Ok(ConfigFormat::Ron),
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(ConfigFormat::Json),
            _ => Err(MetronomeError::Config(format!(
                "unsupported config file extension: {}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MetronomeConfig::default();
        assert_eq!(config.lookahead_interval(), Duration::from_millis(25));
        assert_eq!(config.time_update_interval(), Duration::from_millis(50));
        assert_eq!(config.schedule_ahead_secs, 0.1);
        assert_eq!(config.beat_wrap_measures, 1000);
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = MetronomeConfig::from_ron_str("(default_bpm: 90, click: (volume: 0.5))").unwrap();
        assert_eq!(config.default_bpm, 90);
        assert_eq!(config.click.volume, 0.5);
        assert_eq!(config.click.accent_frequency, 1200.0);
        assert_eq!(config.lookahead_interval_ms, 25);
    }

    #[test]
    fn test_validation_clamps() {
        let config = MetronomeConfig {
            lookahead_interval_ms: 0,
            schedule_ahead_secs: -1.0,
            beat_wrap_measures: 0,
            default_beats: 0,
            click: ClickSettings {
                volume: 3.0,
                ..ClickSettings::default()
            },
            ..MetronomeConfig::default()
        }
        .validated();

        assert_eq!(config.lookahead_interval_ms, 1);
        assert_eq!(config.schedule_ahead_secs, 0.1);
        assert_eq!(config.beat_wrap_measures, 1);
        assert_eq!(config.default_beats, 1);
        assert_eq!(config.click.volume, 1.0);
    }

    #[test]
    fn test_horizon_covers_poll_period() {
        let config = MetronomeConfig {
            lookahead_interval_ms: 500,
            schedule_ahead_secs: 0.1,
            ..MetronomeConfig::default()
        }
        .validated();
        assert!(config.schedule_ahead_secs >= 0.5);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = MetronomeConfig {
            default_bpm: 140,
            ..MetronomeConfig::default()
        };
        let json = config.to_json_string().unwrap();
        assert_eq!(MetronomeConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_unknown_extension() {
        let err = MetronomeConfig::load(Path::new("metronome.yaml")).unwrap_err();
        assert!(matches!(err, MetronomeError::Io(_) | MetronomeError::Config(_)));
    }
}
