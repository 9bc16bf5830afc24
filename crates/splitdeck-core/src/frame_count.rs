//! Frame-accurate durations and the dashboard's rendering rules for them.
//!
//! The timing instrument counts in frames: 60 frames equal one second of
//! game or real clock. Durations render as `SS'FF` below one displayed
//! minute and `MM:SS'FF` above it, with the frame remainder always
//! zero-padded to two digits.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Neg, Sub};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

pub const FRAMES_PER_SECOND: i64 = 60;

/// Signed count of timing frames.
///
/// Source data is never negative, but deltas between two counts are, so
/// the full signed range is supported everywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameCount(i64);

impl FrameCount {
    pub const ZERO: FrameCount = FrameCount(0);

    pub fn new(frames: i64) -> Self {
        Self(frames)
    }

    pub fn frames(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn to_seconds(self) -> f64 {
        self.0 as f64 / FRAMES_PER_SECOND as f64
    }

    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * FRAMES_PER_SECOND as f64).round() as i64)
    }

    /// Parses the display form back into a frame count: `SS'FF` or
    /// `MM:SS'FF`, with an optional leading `-`.
    pub fn parse(raw: &str) -> Result<Self, FrameCountParseError> {
        let trimmed = raw.trim();
        let (negative, rest) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed),
        };

        let (seconds_part, frames_part) = rest
            .split_once('\'')
            .ok_or_else(|| FrameCountParseError::new(raw))?;
        let (minutes, seconds_digits) = match seconds_part.split_once(':') {
            Some((minutes, seconds)) => (parse_field(raw, minutes)?, seconds),
            None => (0, seconds_part),
        };
        let seconds = parse_field(raw, seconds_digits)?;
        let frames = parse_field(raw, frames_part)?;

        let total = (minutes * 60 + seconds) * FRAMES_PER_SECOND + frames;
        Ok(Self(if negative { -total } else { total }))
    }
}

fn parse_field(raw: &str, digits: &str) -> Result<i64, FrameCountParseError> {
    digits
        .parse::<i64>()
        .map_err(|_| FrameCountParseError::new(raw))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid frame count literal '{literal}'; expected SS'FF or MM:SS'FF")]
pub struct FrameCountParseError {
    literal: String,
}

impl FrameCountParseError {
    fn new(literal: &str) -> Self {
        Self {
            literal: literal.to_string(),
        }
    }
}

impl fmt::Display for FrameCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let magnitude = self.0.unsigned_abs();
        let frames = magnitude % 60;
        if magnitude < 3600 {
            write!(f, "{sign}{}'{frames:02}", magnitude / 60)
        } else {
            let minutes = magnitude / 3600;
            let seconds = (magnitude / 60) % 60;
            write!(f, "{sign}{minutes}:{seconds:02}'{frames:02}")
        }
    }
}

impl Add for FrameCount {
    type Output = FrameCount;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for FrameCount {
    type Output = FrameCount;

    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl Neg for FrameCount {
    type Output = FrameCount;

    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for FrameCount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<i64> for FrameCount {
    fn from(frames: i64) -> Self {
        Self(frames)
    }
}

impl Serialize for FrameCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.0)
    }
}

// The server emits most counts as integers but percentiles as floats;
// both round to the nearest whole frame on the way in.
impl<'de> Deserialize<'de> for FrameCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = f64::deserialize(deserializer)?;
        Ok(Self(raw.round() as i64))
    }
}

/// Renders an optional frame count; a missing value renders as nothing.
pub fn format(count: Option<FrameCount>) -> String {
    match count {
        Some(count) => count.to_string(),
        None => String::new(),
    }
}

/// Renders the signed delta of `count` against `comparison`.
///
/// A comparison of exactly zero is the "no baseline" sentinel, not a real
/// baseline: the delta degenerates to the negation of `count`. Non-negative
/// deltas carry a `+` prefix; negative ones rely on the formatter's own sign.
pub fn format_delta(count: Option<FrameCount>, comparison: Option<FrameCount>) -> String {
    let Some(count) = count else {
        return String::new();
    };
    let delta = match comparison {
        Some(comparison) if !comparison.is_zero() => count - comparison,
        _ => -count,
    };
    let prefix = if delta.frames() >= 0 { "+" } else { "" };
    format!("{prefix}{delta}")
}

/// Renders a 0..1 success rate as a whole percentage.
pub fn format_percent(rate: Option<f64>) -> Option<String> {
    rate.map(|rate| format!("{}%", (rate * 100.0).round() as i64))
}
