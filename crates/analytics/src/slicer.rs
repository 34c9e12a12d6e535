//! Row-count based selection of the working window.
//!
//! This is the only place in the engine that decides which rows of a series are
//! analysed. Every other component receives a [`WorkingWindow`] and reads it as is.

use chrono::{DateTime, Utc};
use core_types::{PriceBar, PriceSeries, ReturnSeries, ReturnTimeline};
use serde::Serialize;

pub use core_types::WindowSelector;

/// A read-only suffix of a [`PriceSeries`].
#[derive(Debug, Clone, Copy)]
pub struct WorkingWindow<'a> {
    symbol: &'a str,
    bars: &'a [PriceBar],
    /// Every row of the source series up to and including the window.
    history: &'a [PriceBar],
    selector: WindowSelector,
    truncated: bool,
}

/// Returns the trailing rows named by `selector`.
///
/// A series shorter than the request comes back whole, tagged as truncated.
pub fn slice(series: &PriceSeries, selector: WindowSelector) -> WorkingWindow<'_> {
    let all = series.bars();
    let (bars, truncated) = match selector.rows() {
        Some(rows) if rows <= all.len() => (&all[all.len() - rows..], false),
        Some(_) => (all, true),
        None => (all, false),
    };

    if truncated {
        tracing::debug!(
            symbol = series.symbol(),
            %selector,
            available = all.len(),
            "Series shorter than the requested window, using all rows."
        );
    }

    WorkingWindow {
        symbol: series.symbol(),
        bars,
        history: all,
        selector,
        truncated,
    }
}

impl<'a> WorkingWindow<'a> {
    pub fn symbol(&self) -> &'a str {
        self.symbol
    }

    pub fn bars(&self) -> &'a [PriceBar] {
        self.bars
    }

    /// Rows before the window are lookback for rolling measures only.
    pub fn history(&self) -> &'a [PriceBar] {
        self.history
    }

    /// Keeps the points of a series built from [`history`](Self::history)
    /// that fall on or after the first row of the window.
    pub fn restrict(&self, series: &ReturnSeries) -> ReturnSeries {
        let Some(start) = self.bars.first().map(|b| b.timestamp) else {
            return ReturnSeries::default();
        };
        let points = series
            .points()
            .iter()
            .filter(|p| p.timestamp >= start)
            .copied()
            .collect();
        ReturnSeries::from_points(points)
    }

    pub fn selector(&self) -> WindowSelector {
        self.selector
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Interday returns of the window; one fewer than the number of rows.
    pub fn returns(&self) -> ReturnSeries {
        ReturnSeries::interday(self.bars)
    }

    pub fn returns_for(&self, timeline: ReturnTimeline) -> ReturnSeries {
        ReturnSeries::from_bars(self.bars, timeline)
    }

    pub fn summary(&self) -> WindowSummary {
        WindowSummary {
            selector: self.selector,
            rows: self.bars.len(),
            truncated: self.truncated,
            first_timestamp: self.bars.first().map(|b| b.timestamp),
            last_timestamp: self.bars.last().map(|b| b.timestamp),
        }
    }
}

/// What a result was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowSummary {
    pub selector: WindowSelector,
    pub rows: usize,
    pub truncated: bool,
    pub first_timestamp: Option<DateTime<Utc>>,
    pub last_timestamp: Option<DateTime<Utc>>,
}
