//! Scan-position state machine.
//!
//! Horizontal, Diagonal and Spiral traversals are expressed as an ordered list
//! of straight segments that the scanner walks at `speed` units per call.
//! Overshooting a segment's end jumps to the start of the next segment; after
//! the last segment the scanner either wraps to the origin or freezes and
//! reports completion. Vertical uses its own column stepping.

use serde::{Deserialize, Serialize};

use crate::Dimensions;

/// Tolerance used when comparing positions.
pub const POSITION_TOLERANCE: f32 = 0.001;

/// Sub-pixel sampling location in image space.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const ORIGIN: Position = Position::new(0.0, 0.0);

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl PartialEq for Position {
    fn eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < POSITION_TOLERANCE
            && (self.y - other.y).abs() < POSITION_TOLERANCE
    }
}

/// Order in which image positions are visited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPattern {
    /// Alternating left-to-right / right-to-left scanlines.
    #[default]
    Horizontal,
    /// Top-to-bottom columns, advancing one column per wrap.
    Vertical,
    /// Zig-zag across anti-diagonals starting at the top-left corner.
    Diagonal,
    /// Clockwise rings from the outer edge towards the centre.
    Spiral,
}

impl ScanPattern {
    pub const ALL: [ScanPattern; 4] = [
        ScanPattern::Horizontal,
        ScanPattern::Vertical,
        ScanPattern::Diagonal,
        ScanPattern::Spiral,
    ];

    /// Resolves a host choice index, falling back to Horizontal.
    pub fn from_index(index: u32) -> Self {
        Self::ALL
            .get(index as usize)
            .copied()
            .unwrap_or_default()
    }

    pub fn index(self) -> u32 {
        self as u32
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Horizontal => "Horizontal",
            Self::Vertical => "Vertical",
            Self::Diagonal => "Diagonal",
            Self::Spiral => "Spiral",
        }
    }
}

/// Coarse lifecycle of a [`Scanner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Uninitialized,
    Scanning,
    Complete,
}

/// Straight run between two grid points.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: (f32, f32),
    step: (f32, f32),
    length: f32,
}

impl Segment {
    fn between(from: (u32, u32), to: (u32, u32)) -> Self {
        let dx = i64::from(to.0) - i64::from(from.0);
        let dy = i64::from(to.1) - i64::from(from.1);
        Self {
            start: (from.0 as f32, from.1 as f32),
            step: (dx.signum() as f32, dy.signum() as f32),
            length: dx.abs().max(dy.abs()) as f32,
        }
    }

    fn at(&self, progress: f32) -> Position {
        Position::new(
            self.start.0 + self.step.0 * progress,
            self.start.1 + self.step.1 * progress,
        )
    }

    /// Progress at which the segment passes through `(x, y)`, within
    /// [`POSITION_TOLERANCE`].
    fn locate(&self, x: f32, y: f32) -> Option<f32> {
        let progress = if self.step.0 != 0.0 {
            (x - self.start.0) * self.step.0
        } else if self.step.1 != 0.0 {
            (y - self.start.1) * self.step.1
        } else {
            0.0
        };

        if progress < -POSITION_TOLERANCE || progress > self.length + POSITION_TOLERANCE {
            return None;
        }
        let progress = progress.clamp(0.0, self.length);
        (self.at(progress) == Position::new(x, y)).then_some(progress)
    }
}

fn segment_count(pattern: ScanPattern, bounds: Dimensions) -> usize {
    let (w, h) = (bounds.width as usize, bounds.height as usize);
    match pattern {
        ScanPattern::Horizontal => h,
        ScanPattern::Diagonal => w + h - 1,
        ScanPattern::Spiral => 4 * ((w.min(h) + 1) / 2),
        ScanPattern::Vertical => 0,
    }
}

fn segment(pattern: ScanPattern, bounds: Dimensions, index: usize) -> Option<Segment> {
    if index >= segment_count(pattern, bounds) {
        return None;
    }

    let last_x = bounds.width - 1;
    let last_y = bounds.height - 1;
    let index = index as u32;

    match pattern {
        ScanPattern::Horizontal => {
            let row = index;
            Some(if row % 2 == 0 {
                Segment::between((0, row), (last_x, row))
            } else {
                Segment::between((last_x, row), (0, row))
            })
        }
        ScanPattern::Diagonal => {
            let k = index;
            let low_x = k.saturating_sub(last_y);
            let high_x = k.min(last_x);
            let bottom_left = (low_x, k - low_x);
            let top_right = (high_x, k - high_x);
            Some(if k % 2 == 0 {
                Segment::between(bottom_left, top_right)
            } else {
                Segment::between(top_right, bottom_left)
            })
        }
        ScanPattern::Spiral => {
            let ring = index / 4;
            let (left, top) = (ring, ring);
            let (right, bottom) = (last_x - ring, last_y - ring);
            match index % 4 {
                0 => Some(Segment::between((left, top), (right, top))),
                1 if bottom > top => Some(Segment::between((right, top + 1), (right, bottom))),
                2 if bottom > top && right > left => {
                    Some(Segment::between((right - 1, bottom), (left, bottom)))
                }
                3 if right > left && bottom > top + 1 => {
                    Some(Segment::between((left, bottom - 1), (left, top + 1)))
                }
                _ => None,
            }
        }
        ScanPattern::Vertical => None,
    }
}

fn first_segment_from(
    pattern: ScanPattern,
    bounds: Dimensions,
    start: usize,
) -> Option<(usize, Segment)> {
    (start..segment_count(pattern, bounds))
        .find_map(|index| segment(pattern, bounds, index).map(|seg| (index, seg)))
}

/// Traces a path across an image one call at a time.
#[derive(Debug, Clone)]
pub struct Scanner {
    bounds: Option<Dimensions>,
    pattern: ScanPattern,
    looping: bool,
    complete: bool,
    position: Position,
    segment_index: usize,
    progress: f32,
}

impl Default for Scanner {
    fn default() -> Self {
        Self {
            bounds: None,
            pattern: ScanPattern::Horizontal,
            looping: true,
            complete: false,
            position: Position::ORIGIN,
            segment_index: 0,
            progress: 0.0,
        }
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds the scanner to an image size and rewinds to the origin.
    /// Zero-sized dimensions are ignored.
    pub fn initialize(&mut self, width: u32, height: u32) {
        let bounds = Dimensions::new(width, height);
        if !bounds.is_valid() {
            return;
        }
        self.bounds = Some(bounds);
        self.reset_position();
    }

    /// Returns the scanner to the uninitialized state, keeping its settings.
    pub fn clear(&mut self) {
        self.bounds = None;
        self.reset_position();
    }

    pub fn state(&self) -> ScanState {
        match (self.bounds, self.complete) {
            (None, _) => ScanState::Uninitialized,
            (Some(_), true) => ScanState::Complete,
            (Some(_), false) => ScanState::Scanning,
        }
    }

    pub fn bounds(&self) -> Option<Dimensions> {
        self.bounds
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn pattern(&self) -> ScanPattern {
        self.pattern
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Moves the position `speed` units along the active pattern.
    /// Negative or non-finite speeds leave the position unchanged.
    pub fn advance(&mut self, speed: f32) -> Position {
        let Some(bounds) = self.bounds else {
            return self.position;
        };
        if self.complete {
            return self.position;
        }

        let speed = if speed.is_finite() { speed.max(0.0) } else { 0.0 };
        match self.pattern {
            ScanPattern::Vertical => self.advance_vertical(bounds, speed),
            _ => self.advance_along_path(bounds, speed),
        }
        self.position
    }

    /// Selects a pattern. Re-selecting the current pattern is a no-op;
    /// otherwise an initialized scanner rewinds to the origin.
    pub fn set_pattern(&mut self, pattern: ScanPattern) {
        if pattern == self.pattern {
            return;
        }
        self.pattern = pattern;
        if self.bounds.is_some() {
            self.reset_position();
        }
    }

    /// Enabling looping clears a completed scan immediately.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
        if looping {
            self.complete = false;
        }
    }

    pub fn reset_position(&mut self) {
        self.position = Position::ORIGIN;
        self.segment_index = 0;
        self.progress = 0.0;
        self.complete = false;
    }

    /// Moves the scanner onto `position` along the active pattern, keeping
    /// any fractional progress. Points off the path snap to the nearest grid
    /// point first. Returns false (and rewinds) when the point cannot be
    /// placed, e.g. before initialization.
    pub fn restore_position(&mut self, position: Position) -> bool {
        let Some(bounds) = self.bounds else {
            return false;
        };
        self.reset_position();

        let last_x = (bounds.width - 1) as f32;
        let last_y = (bounds.height - 1) as f32;
        let x = if position.x.is_finite() { position.x.clamp(0.0, last_x) } else { 0.0 };
        let y = if position.y.is_finite() { position.y.clamp(0.0, last_y) } else { 0.0 };

        if self.pattern == ScanPattern::Vertical {
            self.position = Position::new(x.round(), y);
            return true;
        }

        let pattern = self.pattern;
        let find = |x: f32, y: f32| {
            (0..segment_count(pattern, bounds)).find_map(|index| {
                let seg = segment(pattern, bounds, index)?;
                seg.locate(x, y).map(|progress| (index, seg, progress))
            })
        };
        let found = find(x, y).or_else(|| find(x.round(), y.round()));

        match found {
            Some((index, seg, progress)) => {
                self.segment_index = index;
                self.progress = progress;
                self.position = seg.at(progress);
                true
            }
            None => false,
        }
    }

    fn advance_along_path(&mut self, bounds: Dimensions, speed: f32) {
        let Some(current) = segment(self.pattern, bounds, self.segment_index) else {
            self.reset_position();
            return;
        };

        let progress = self.progress + speed;
        if progress <= current.length {
            self.progress = progress;
            self.position = current.at(progress);
            return;
        }

        let next = first_segment_from(self.pattern, bounds, self.segment_index + 1);
        if let Some((index, next)) = next {
            self.segment_index = index;
            self.progress = 0.0;
            self.position = next.at(0.0);
        } else if self.looping {
            self.reset_position();
        } else {
            self.progress = current.length;
            self.position = current.at(current.length);
            self.complete = true;
        }
    }

    fn advance_vertical(&mut self, bounds: Dimensions, speed: f32) {
        let last_x = (bounds.width - 1) as f32;
        let last_y = (bounds.height - 1) as f32;

        let y = self.position.y + speed;
        if y <= last_y {
            self.position.y = y;
            return;
        }

        if self.looping {
            let x = self.position.x + 1.0;
            self.position = Position::new(if x > last_x { 0.0 } else { x }, 0.0);
        } else {
            self.position.y = last_y;
            self.complete = true;
        }
    }
}
