use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::ReturnTimeline;
use crate::error::CoreError;

/// One OHLCV record of a cleaned price history.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl PriceBar {
    /// (high - low) / low for this row.
    pub fn range_ratio(&self) -> f64 {
        (self.high - self.low) / self.low
    }

    fn validate(&self, symbol: &str, row: usize) -> Result<(), CoreError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(CoreError::InvalidInput(
                format!("{symbol}[{row}]"),
                "prices must be finite and positive".to_string(),
            ));
        }
        if self.high < self.low {
            return Err(CoreError::InvalidInput(
                format!("{symbol}[{row}]"),
                format!("high {} is below low {}", self.high, self.low),
            ));
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(CoreError::InvalidInput(
                format!("{symbol}[{row}]"),
                "volume must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// The full, immutable price history of one instrument.
///
/// Rows are strictly ascending by timestamp. Nothing downstream relies on the
/// spacing between timestamps; the series is only ever addressed by row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPriceSeries")]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

#[derive(Deserialize)]
struct RawPriceSeries {
    symbol: String,
    bars: Vec<PriceBar>,
}

impl TryFrom<RawPriceSeries> for PriceSeries {
    type Error = CoreError;

    fn try_from(raw: RawPriceSeries) -> Result<Self, Self::Error> {
        PriceSeries::new(raw.symbol, raw.bars)
    }
}

impl PriceSeries {
    /// Validates and wraps a cleaned history.
    pub fn new(symbol: impl Into<String>, bars: Vec<PriceBar>) -> Result<Self, CoreError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "symbol".to_string(),
                "must not be empty".to_string(),
            ));
        }

        for (row, bar) in bars.iter().enumerate() {
            bar.validate(&symbol, row)?;
        }

        if let Some(row) = bars
            .windows(2)
            .position(|w| w[1].timestamp <= w[0].timestamp)
        {
            return Err(CoreError::UnorderedTimestamps { symbol, row: row + 1 });
        }

        Ok(Self { symbol, bars })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }
}

/// A single period-over-period return, stamped with the row it ends on.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReturnPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Fractional price changes derived from a run of bars.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnSeries {
    points: Vec<ReturnPoint>,
}

impl ReturnSeries {
    /// Derives returns for the requested timeline.
    ///
    /// Timelines that compare against the previous row yield `bars.len() - 1`
    /// points; the others yield one point per row.
    pub fn from_bars(bars: &[PriceBar], timeline: ReturnTimeline) -> Self {
        let points = match timeline {
            ReturnTimeline::Interday => bars
                .windows(2)
                .map(|w| ReturnPoint {
                    timestamp: w[1].timestamp,
                    value: w[1].close / w[0].close - 1.0,
                })
                .collect(),
            ReturnTimeline::Overnight => bars
                .windows(2)
                .map(|w| ReturnPoint {
                    timestamp: w[1].timestamp,
                    value: w[1].open / w[0].close - 1.0,
                })
                .collect(),
            ReturnTimeline::Intraday => bars
                .iter()
                .map(|b| ReturnPoint {
                    timestamp: b.timestamp,
                    value: b.close / b.open - 1.0,
                })
                .collect(),
            ReturnTimeline::DailyRange => bars
                .iter()
                .map(|b| ReturnPoint {
                    timestamp: b.timestamp,
                    value: b.range_ratio(),
                })
                .collect(),
        };
        Self { points }
    }

    /// Interday close-to-close returns, the default return definition.
    pub fn interday(bars: &[PriceBar]) -> Self {
        Self::from_bars(bars, ReturnTimeline::Interday)
    }

    pub fn from_points(points: Vec<ReturnPoint>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[ReturnPoint] {
        &self.points
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn rejects_duplicate_timestamps() {
        let err = PriceSeries::new("TSLA", vec![bar(1, 10.0), bar(1, 11.0)]).unwrap_err();
        assert_eq!(
            err,
            CoreError::UnorderedTimestamps {
                symbol: "TSLA".to_string(),
                row: 1
            }
        );
    }

    #[test]
    fn rejects_non_positive_prices() {
        let mut bad = bar(2, 10.0);
        bad.low = 0.0;
        assert!(PriceSeries::new("TSLA", vec![bar(1, 10.0), bad]).is_err());
    }

    #[test]
    fn interday_returns_drop_the_first_row() {
        let bars = vec![bar(1, 100.0), bar(2, 110.0), bar(3, 99.0)];
        let returns = ReturnSeries::interday(&bars);
        assert_eq!(returns.len(), 2);
        assert!((returns.points()[0].value - 0.10).abs() < 1e-12);
        assert!((returns.points()[1].value + 0.10).abs() < 1e-12);
        assert_eq!(returns.points()[0].timestamp, bars[1].timestamp);
    }

    #[test]
    fn intraday_returns_keep_every_row() {
        let mut first = bar(1, 100.0);
        first.open = 50.0;
        let bars = vec![first, bar(2, 110.0)];
        let returns = ReturnSeries::from_bars(&bars, ReturnTimeline::Intraday);
        assert_eq!(returns.values(), vec![1.0, 0.0]);
    }

    #[test]
    fn deserializing_validates_the_series() {
        let json = r#"{"symbol":"AAPL","bars":[
            {"timestamp":"2024-01-02T00:00:00Z","open":1.0,"high":2.0,"low":1.0,"close":1.5},
            {"timestamp":"2024-01-01T00:00:00Z","open":1.0,"high":2.0,"low":1.0,"close":1.5}
        ]}"#;
        assert!(serde_json::from_str::<PriceSeries>(json).is_err());
    }
}
