//! Percentile-tier and trend classification for timing values.

use serde::{Deserialize, Serialize};

use crate::frame_count::FrameCount;

/// Performance tier of a single time against its own historical
/// percentile bounds. Variant names double as the CSS class names the
/// dashboard computes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Gold,
    Green,
    LightGreen,
    LightRed,
    Red,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Green => "green",
            Self::LightGreen => "lightgreen",
            Self::LightRed => "lightred",
            Self::Red => "red",
        }
    }
}

/// Direction of a statistic relative to its previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trend {
    Improved,
    Worsened,
}

/// Classifies `current` against its historical bounds.
///
/// A missing current value yields no tier (the caller renders no color).
/// `best == 0` is the sentinel for "no completions yet" and classifies as
/// gold, as does matching or beating the best. Every boundary comparison
/// is inclusive, so ties land on the better tier. A missing bound fails
/// its comparison and falls through to the next one.
pub fn time_tier(
    current: Option<FrameCount>,
    best: Option<FrameCount>,
    p25: Option<FrameCount>,
    median: Option<FrameCount>,
    p75: Option<FrameCount>,
) -> Option<Tier> {
    let current = current?;
    let within = |bound: Option<FrameCount>| bound.is_some_and(|bound| current <= bound);

    let tier = if best == Some(FrameCount::ZERO) || within(best) {
        Tier::Gold
    } else if within(p25) {
        Tier::Green
    } else if within(median) {
        Tier::LightGreen
    } else if within(p75) {
        Tier::LightRed
    } else {
        Tier::Red
    };
    Some(tier)
}

/// Compares a statistic against its previous snapshot.
///
/// Strict comparison: equal values produce no trend. Without a previous
/// snapshot there is nothing to compare against.
pub fn trend(current: FrameCount, previous: Option<FrameCount>) -> Option<Trend> {
    let previous = previous?;
    if current < previous {
        Some(Trend::Improved)
    } else if current > previous {
        Some(Trend::Worsened)
    } else {
        None
    }
}
