use chrono::{Duration, TimeZone, Utc};
use core_types::{PriceBar, PriceSeries};

/// One bar per day from 2024-01-01, high/low one unit around the close.
pub fn series_from_closes(symbol: &str, closes: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: start + Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0 + i as f64,
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}

pub fn linear_series(symbol: &str, len: usize, start: f64, step: f64) -> PriceSeries {
    let closes: Vec<f64> = (0..len).map(|i| start + step * i as f64).collect();
    series_from_closes(symbol, &closes)
}

/// Same timestamps as [`series_from_closes`], shifted by `offset_days`.
pub fn shifted_series(symbol: &str, closes: &[f64], offset_days: i64) -> PriceSeries {
    let base = series_from_closes(symbol, closes);
    let bars = base
        .bars()
        .iter()
        .map(|b| PriceBar {
            timestamp: b.timestamp + Duration::days(offset_days),
            ..*b
        })
        .collect();
    PriceSeries::new(symbol, bars).unwrap()
}
