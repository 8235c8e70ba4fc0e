// Accent resolution
// Three competing accent models, consulted in strict priority order:
// polyrhythm > accent pattern > accent beat > none

use super::timeline::TimeSignature;

/// A value that can be read as an accent flag
///
/// Presets coming from older song files store accents as booleans,
/// as 0/1 numbers or as "0"/"1" strings. Numbers and strings count as an
/// accent only when they are exactly 1.
pub trait AccentValue {
    fn is_accent(&self) -> bool;
}

impl AccentValue for bool {
    fn is_accent(&self) -> bool {
        *self
    }
}

macro_rules! impl_accent_value_for_int {
    ($($t:ty),*) => {
        $(
            impl AccentValue for $t {
                fn is_accent(&self) -> bool {
                    *self == 1
                }
            }
        )*
    };
}

impl_accent_value_for_int!(u8, u16, u32, u64, usize, i8, i16, i32, i64);

impl AccentValue for str {
    fn is_accent(&self) -> bool {
        let s = self.trim();
        s == "1" || s.eq_ignore_ascii_case("true")
    }
}

impl AccentValue for String {
    fn is_accent(&self) -> bool {
        self.as_str().is_accent()
    }
}

impl<T: AccentValue + ?Sized> AccentValue for &T {
    fn is_accent(&self) -> bool {
        (**self).is_accent()
    }
}

/// Which accent model decided a beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AccentModel {
    Polyrhythm,
    Pattern,
    AccentBeat,
    None,
}

/// Explicit accent mask, one flag per beat of the measure
///
/// Never empty and never all-false: an all-false mask is the same thing as
/// no mask at all, so constructors return `None` for it.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AccentPattern {
    flags: Vec<bool>,
}

impl AccentPattern {
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: AccentValue,
    {
        let flags: Vec<bool> = values.into_iter().map(|v| v.is_accent()).collect();
        if flags.iter().any(|&f| f) {
            Some(Self { flags })
        } else {
            None
        }
    }

    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    /// Accent flag for a beat index, wrapping by the pattern length
    pub fn is_accented(&self, index: u64) -> bool {
        index
            .checked_rem(self.flags.len() as u64)
            .is_some_and(|i| self.flags[i as usize])
    }

    /// Truncate or pad with `false` to `len` beats, keeping flags by index
    pub fn resized(&self, len: usize) -> Option<Self> {
        let mut flags = self.flags.clone();
        flags.resize(len, false);
        Self::from_values(flags)
    }
}

/// Polyrhythm overlay
/// Indexed by the absolute beat count, its length is independent of the measure
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Polyrhythm {
    pattern: Vec<bool>,
    name: String,
}

impl Polyrhythm {
    /// Returns `None` for an empty pattern
    pub fn new<I>(pattern: I, name: impl Into<String>) -> Option<Self>
    where
        I: IntoIterator,
        I::Item: AccentValue,
    {
        let pattern: Vec<bool> = pattern.into_iter().map(|v| v.is_accent()).collect();
        if pattern.is_empty() {
            return None;
        }
        Some(Self {
            pattern,
            name: name.into(),
        })
    }

    /// Evenly spread `hits` accents over `steps` beats
    /// A hit lands on step i when (i * hits) % steps < hits
    pub fn euclidean(hits: usize, steps: usize, name: impl Into<String>) -> Option<Self> {
        if steps == 0 {
            return None;
        }
        let hits = hits.min(steps);
        Self::new((0..steps).map(|i| (i * hits) % steps < hits), name)
    }

    pub fn pattern(&self) -> &[bool] {
        &self.pattern
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pattern.is_empty()
    }

    pub fn is_accented(&self, beat_count: u64) -> bool {
        beat_count
            .checked_rem(self.pattern.len() as u64)
            .is_some_and(|i| self.pattern[i as usize])
    }
}

/// The full accent configuration of a metronome
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AccentConfig {
    /// 1-indexed beat that gets the accent, `None` = uniform clicks
    pub accent_beat: Option<u32>,
    pub pattern: Option<AccentPattern>,
    pub polyrhythm: Option<Polyrhythm>,
}

impl AccentConfig {
    /// 0 disables the accent, which is not the same as accenting beat 1
    pub fn set_accent_beat(&mut self, beat: u32) {
        self.accent_beat = (beat > 0).then_some(beat);
    }

    /// The model that will decide accents, following the priority order
    pub fn active_model(&self) -> AccentModel {
        if self.polyrhythm.is_some() {
            AccentModel::Polyrhythm
        } else if self.pattern.is_some() {
            AccentModel::Pattern
        } else if self.accent_beat.is_some() {
            AccentModel::AccentBeat
        } else {
            AccentModel::None
        }
    }

    /// Accent of the beat at absolute position `beat_count`
    pub fn resolve(&self, beat_count: u64, time_signature: &TimeSignature) -> bool {
        let beat_in_measure = time_signature.beat_in_measure(beat_count) as u64;
        match self.active_model() {
            AccentModel::Polyrhythm => self
                .polyrhythm
                .as_ref()
                .is_some_and(|p| p.is_accented(beat_count)),
            AccentModel::Pattern => self
                .pattern
                .as_ref()
                .is_some_and(|p| p.is_accented(beat_in_measure)),
            AccentModel::AccentBeat => self.accent_beat == Some(beat_in_measure as u32 + 1),
            AccentModel::None => false,
        }
    }

    /// Preview query that ignores the polyrhythm overlay
    pub fn is_beat_accented(&self, beat_index: u64, time_signature: &TimeSignature) -> bool {
        if let Some(pattern) = &self.pattern {
            return pattern.is_accented(beat_index);
        }
        match self.accent_beat {
            Some(beat) => time_signature.beat_in_measure(beat_index) + 1 == beat,
            None => false,
        }
    }

    /// Re-fit the per-measure models to a new measure length
    /// The accent beat is only clamped while no pattern overrides it
    pub fn fit_to(&mut self, time_signature: &TimeSignature) {
        let beats = time_signature.beats_per_measure();
        self.pattern = self
            .pattern
            .take()
            .and_then(|p| p.resized(beats as usize));
        if self.pattern.is_none() {
            if let Some(beat) = self.accent_beat {
                self.accent_beat = Some(beat.min(beats));
            }
        }
    }
}
