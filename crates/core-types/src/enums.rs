use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// Which pair of prices a period-over-period return is measured between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnTimeline {
    /// close / previous close - 1
    #[default]
    Interday,
    /// close / open - 1, within the same row
    Intraday,
    /// open / previous close - 1
    Overnight,
    /// (high - low) / low, within the same row
    DailyRange,
}

/// The symbolic window a request is evaluated over.
///
/// Every variant counts rows, never calendar units, so a weekly series and a
/// daily series are treated identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindowSelector {
    Latest,
    Last3,
    Last6,
    #[default]
    Last12,
    Last24,
    Last60,
    FullHistory,
}

impl WindowSelector {
    pub const ALL: [WindowSelector; 7] = [
        WindowSelector::Latest,
        WindowSelector::Last3,
        WindowSelector::Last6,
        WindowSelector::Last12,
        WindowSelector::Last24,
        WindowSelector::Last60,
        WindowSelector::FullHistory,
    ];

    /// Number of trailing rows requested, `None` for the full history.
    pub fn rows(&self) -> Option<usize> {
        match self {
            WindowSelector::Latest => Some(1),
            WindowSelector::Last3 => Some(3),
            WindowSelector::Last6 => Some(6),
            WindowSelector::Last12 => Some(12),
            WindowSelector::Last24 => Some(24),
            WindowSelector::Last60 => Some(60),
            WindowSelector::FullHistory => None,
        }
    }

    /// True when this window holds at least as many rows as `other`.
    pub fn covers(&self, other: WindowSelector) -> bool {
        match (self.rows(), other.rows()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => mine >= theirs,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowSelector::Latest => "Latest",
            WindowSelector::Last3 => "3P",
            WindowSelector::Last6 => "6P",
            WindowSelector::Last12 => "12P",
            WindowSelector::Last24 => "24P",
            WindowSelector::Last60 => "60P",
            WindowSelector::FullHistory => "Full",
        }
    }
}

impl fmt::Display for WindowSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WindowSelector {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WindowSelector::ALL
            .into_iter()
            .find(|selector| selector.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CoreError::InvalidInput(
                    "window selector".to_string(),
                    format!("unknown selector '{s}', expected one of Latest, 3P, 6P, 12P, 24P, 60P, Full"),
                )
            })
    }
}

impl TryFrom<String> for WindowSelector {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindowSelector> for String {
    fn from(selector: WindowSelector) -> Self {
        selector.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_parse_from_their_labels() {
        for selector in WindowSelector::ALL {
            assert_eq!(selector.as_str().parse::<WindowSelector>().unwrap(), selector);
        }
        assert_eq!("full".parse::<WindowSelector>().unwrap(), WindowSelector::FullHistory);
    }

    #[test]
    fn unknown_selector_is_rejected() {
        assert!("7P".parse::<WindowSelector>().is_err());
        assert!("1M".parse::<WindowSelector>().is_err());
    }

    #[test]
    fn longer_windows_cover_shorter_ones() {
        assert!(WindowSelector::FullHistory.covers(WindowSelector::FullHistory));
        assert!(WindowSelector::Last24.covers(WindowSelector::Last12));
        assert!(WindowSelector::Last12.covers(WindowSelector::Last12));
        assert!(!WindowSelector::Last3.covers(WindowSelector::FullHistory));
        assert!(!WindowSelector::Latest.covers(WindowSelector::Last3));
    }
}
