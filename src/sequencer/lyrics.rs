// Lyric timeline - cursor synchronized to elapsed playback time

/// One timed lyric line
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LyricLine {
    /// Seconds from playback start
    pub time: f64,
    pub text: String,
}

impl LyricLine {
    pub fn new(time: f64, text: impl Into<String>) -> Self {
        Self {
            time,
            text: text.into(),
        }
    }
}

/// Lyric lines plus a derived cursor
///
/// Lines must already be sorted by ascending time; the timeline does not
/// reorder them.
#[derive(Debug, Clone, Default)]
pub struct LyricTimeline {
    lines: Vec<LyricLine>,
    cursor: usize,
    evaluated: bool,
}

impl LyricTimeline {
    pub fn new(lines: Vec<LyricLine>) -> Self {
        Self {
            lines,
            cursor: 0,
            evaluated: false,
        }
    }

    /// Replace every line and move the cursor back to the start
    pub fn replace(&mut self, lines: Vec<LyricLine>) {
        self.lines = lines;
        self.reset();
    }

    /// Cursor back to 0, next `update` reports unconditionally
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.evaluated = false;
    }

    pub fn lines(&self) -> &[LyricLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current(&self) -> Option<&LyricLine> {
        self.lines.get(self.cursor)
    }

    /// Index of the latest line whose time has been reached
    /// Scans backwards from the end; 0 when no line has been reached yet
    pub fn index_at(&self, elapsed: f64) -> usize {
        self.lines
            .iter()
            .rposition(|line| line.time <= elapsed)
            .unwrap_or(0)
    }

    /// Move the cursor to `elapsed`
    /// Returns the new index when it changed, or on the first call after a reset
    pub fn update(&mut self, elapsed: f64) -> Option<usize> {
        let index = self.index_at(elapsed);
        let first = !self.evaluated;
        self.evaluated = true;

        if first || index != self.cursor {
            self.cursor = index;
            Some(index)
        } else {
            None
        }
    }
}
