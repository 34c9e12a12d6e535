//! Range-based volatility measures: short versus long range ratio, average true
//! range, and related ratings.

use crate::correlation::{self, CorrelationEstimate};
use crate::error::{AnalyticsError, InsufficientData, Outcome, finite, require};
use crate::slicer::WorkingWindow;
use crate::stats::{self, MIN_STD};
use configuration::{AtrSmoothing, CorrelationKind, DynamicsParams};
use core_types::{PriceBar, ReturnSeries};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityRegime {
    Expanding,
    Stable,
    Contracting,
}

/// Low up to 2 %, Medium up to 5 %, High above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityRating {
    Low,
    Medium,
    High,
}

impl VolatilityRating {
    pub fn from_percent(percent: f64) -> Self {
        if percent <= 2.0 {
            VolatilityRating::Low
        } else if percent <= 5.0 {
            VolatilityRating::Medium
        } else {
            VolatilityRating::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VolatilityRatioReport {
    pub short: Outcome<f64>,
    pub long: Outcome<f64>,
    pub relative: Outcome<f64>,
    pub regime: Outcome<VolatilityRegime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AtrReading {
    pub value: f64,
    pub period: usize,
    pub smoothing: AtrSmoothing,
    /// Fewer true ranges than the period were available.
    pub partial: bool,
    pub true_ranges: usize,
    pub percent_of_price: f64,
    pub rating: VolatilityRating,
}

/// Per-row `(high - low) / low` statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RangeStatistics {
    pub mean: f64,
    pub max: f64,
}

/// A percentage together with its rating band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatedPercent {
    pub percent: f64,
    pub rating: VolatilityRating,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketDynamics {
    pub volatility_ratio: VolatilityRatioReport,
    pub atr: Outcome<AtrReading>,
    pub range: Outcome<RangeStatistics>,
    /// Latest rolling standard deviation of returns, in percent.
    pub return_volatility: Outcome<RatedPercent>,
    pub volume_atr_correlation: Outcome<CorrelationEstimate>,
}

/// Runs every dynamics measure on `window`, comparing its range to `reference`.
pub fn market_dynamics(
    window: &WorkingWindow<'_>,
    reference: &WorkingWindow<'_>,
    params: &DynamicsParams,
    volatility_window: usize,
) -> Result<MarketDynamics, AnalyticsError> {
    let dynamics = MarketDynamics {
        volatility_ratio: volatility_ratio(window, reference, params),
        atr: atr(window, params.atr_period, params.atr_smoothing)?,
        range: range_statistics(window),
        return_volatility: return_volatility(window, volatility_window),
        volume_atr_correlation: volume_atr_correlation(
            window,
            params.atr_period,
            params.atr_smoothing,
        )?,
    };

    tracing::debug!(
        symbol = window.symbol(),
        relative = ?dynamics.volatility_ratio.relative,
        regime = ?dynamics.volatility_ratio.regime,
        atr = ?dynamics.atr.map(|a| a.value),
        "Market dynamics computed."
    );

    Ok(dynamics)
}

/// `(max high - min low) / min low` over the window.
pub fn price_range_ratio(window: &WorkingWindow<'_>) -> Outcome<f64> {
    let bars = window.bars();
    require(1, bars.len())?;

    let high = bars.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let low = bars.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);
    if low.abs() <= MIN_STD {
        return Err(InsufficientData::zero_denominator());
    }
    finite((high - low) / low)
}

/// Compares the window's price range with the range of a longer reference window.
pub fn volatility_ratio(
    window: &WorkingWindow<'_>,
    reference: &WorkingWindow<'_>,
    params: &DynamicsParams,
) -> VolatilityRatioReport {
    let short = price_range_ratio(window);
    let long = price_range_ratio(reference);

    let relative = short.and_then(|s| {
        long.and_then(|l| {
            if l.abs() <= MIN_STD {
                Err(InsufficientData::zero_denominator())
            } else {
                finite(s / l)
            }
        })
    });
    let regime = relative.map(|r| {
        if r > params.expanding_threshold {
            VolatilityRegime::Expanding
        } else if r < params.contracting_threshold {
            VolatilityRegime::Contracting
        } else {
            VolatilityRegime::Stable
        }
    });

    VolatilityRatioReport {
        short,
        long,
        relative,
        regime,
    }
}

/// True range of every row after the first.
pub fn true_ranges(bars: &[PriceBar]) -> Vec<f64> {
    bars.windows(2)
        .map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect()
}

fn check_period(period: usize) -> Result<(), AnalyticsError> {
    if period == 0 {
        return Err(AnalyticsError::invalid("atr_period", "must be positive"));
    }
    Ok(())
}

/// Average true range of the window.
///
/// With fewer true ranges than `period` the reading averages all of them and
/// is flagged `partial`.
pub fn atr(
    window: &WorkingWindow<'_>,
    period: usize,
    smoothing: AtrSmoothing,
) -> Result<Outcome<AtrReading>, AnalyticsError> {
    check_period(period)?;

    let ranges = true_ranges(window.bars());
    if ranges.is_empty() {
        return Ok(Err(InsufficientData::too_few(2, window.len())));
    }

    let partial = ranges.len() < period;
    let value = if partial {
        stats::mean(&ranges).unwrap_or(0.0)
    } else {
        match smoothing {
            AtrSmoothing::Simple => stats::mean(&ranges[ranges.len() - period..]).unwrap_or(0.0),
            AtrSmoothing::Exponential => exponential_atr(&ranges, period)
                .last()
                .copied()
                .unwrap_or(0.0),
        }
    };

    let reading = finite(value).and_then(|value| {
        let close = window
            .last_close()
            .ok_or_else(|| InsufficientData::too_few(1, 0))?;
        let percent_of_price = finite(value / close * 100.0)?;
        Ok(AtrReading {
            value,
            period,
            smoothing,
            partial,
            true_ranges: ranges.len(),
            percent_of_price,
            rating: VolatilityRating::from_percent(percent_of_price),
        })
    });
    Ok(reading)
}

/// ATR after each true range from index `period - 1` onward.
pub fn atr_series(ranges: &[f64], period: usize, smoothing: AtrSmoothing) -> Vec<f64> {
    if period == 0 || ranges.len() < period {
        return Vec::new();
    }
    match smoothing {
        AtrSmoothing::Simple => ranges
            .windows(period)
            .map(|w| w.iter().sum::<f64>() / period as f64)
            .collect(),
        AtrSmoothing::Exponential => exponential_atr(ranges, period),
    }
}

/// Seeded with the simple mean of the first `period` ranges, then smoothed
/// with `alpha = 2 / (period + 1)`.
fn exponential_atr(ranges: &[f64], period: usize) -> Vec<f64> {
    let Some(seed) = stats::mean(&ranges[..period]) else {
        return Vec::new();
    };
    let alpha = 2.0 / (period as f64 + 1.0);
    let mut out = Vec::with_capacity(ranges.len() - period + 1);
    out.push(seed);
    let mut current = seed;
    for tr in &ranges[period..] {
        current = alpha * tr + (1.0 - alpha) * current;
        out.push(current);
    }
    out
}

pub fn range_statistics(window: &WorkingWindow<'_>) -> Outcome<RangeStatistics> {
    let ratios: Vec<f64> = window.bars().iter().map(PriceBar::range_ratio).collect();
    require(1, ratios.len())?;
    Ok(RangeStatistics {
        mean: finite(stats::mean(&ratios).unwrap_or(0.0))?,
        max: finite(ratios.iter().copied().fold(f64::NEG_INFINITY, f64::max))?,
    })
}

/// Most recent rolling standard deviation of returns, rated by the ATR bands.
///
/// The rolling runs may reach back before the window; the reading itself must
/// fall inside it.
pub fn return_volatility(
    window: &WorkingWindow<'_>,
    volatility_window: usize,
) -> Outcome<RatedPercent> {
    let returns = ReturnSeries::interday(window.history());
    let rolled = window.restrict(&correlation::rolling_volatility(&returns, volatility_window));
    let latest = rolled
        .points()
        .last()
        .ok_or_else(|| InsufficientData::too_few(volatility_window.max(2), returns.len()))?;
    let percent = finite(latest.value * 100.0)?;
    Ok(RatedPercent {
        percent,
        rating: VolatilityRating::from_percent(percent),
    })
}

/// Pearson correlation between rolling ATR and traded volume on the window's rows.
///
/// The ATR series is built over the full history so that it covers every row
/// of a window shorter than the ATR period.
pub fn volume_atr_correlation(
    window: &WorkingWindow<'_>,
    period: usize,
    smoothing: AtrSmoothing,
) -> Result<Outcome<CorrelationEstimate>, AnalyticsError> {
    check_period(period)?;

    let bars = window.bars();
    if bars.iter().all(|b| b.volume == 0.0) {
        return Ok(Err(InsufficientData::zero_variance()));
    }
    let Some(start) = bars.first().map(|b| b.timestamp) else {
        return Ok(Err(InsufficientData::empty_alignment()));
    };

    let history = window.history();
    let series = atr_series(&true_ranges(history), period, smoothing);
    // The ATR after true range `i` belongs to row `i + 1`.
    let (atrs, volumes): (Vec<f64>, Vec<f64>) = series
        .iter()
        .zip(history.iter().skip(period))
        .filter(|(_, bar)| bar.timestamp >= start)
        .map(|(atr, bar)| (*atr, bar.volume))
        .unzip();
    Ok(correlation::estimate(&atrs, &volumes, CorrelationKind::Pearson))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slicer::{WindowSelector, slice};
    use crate::test_support::{linear_series, series_from_closes};
    use approx::assert_relative_eq;
    use chrono::{Duration, TimeZone, Utc};
    use core_types::PriceSeries;

    fn flat_bars(len: usize, price: f64) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..len)
            .map(|i| PriceBar {
                timestamp: start + Duration::days(i as i64),
                open: price,
                high: price,
                low: price,
                close: price,
                volume: 0.0,
            })
            .collect();
        PriceSeries::new("FLAT", bars).unwrap()
    }

    #[test]
    fn flat_prices_have_zero_atr_and_no_ratio() {
        let series = flat_bars(20, 42.0);
        let window = slice(&series, WindowSelector::Last12);
        let full = slice(&series, WindowSelector::FullHistory);

        let reading = atr(&window, 14, AtrSmoothing::Simple).unwrap().unwrap();
        assert_eq!(reading.value, 0.0);
        assert_eq!(reading.rating, VolatilityRating::Low);

        let ratio = volatility_ratio(&window, &full, &DynamicsParams::default());
        assert_eq!(ratio.short, Ok(0.0));
        assert_eq!(ratio.relative, Err(InsufficientData::zero_denominator()));
        assert!(ratio.regime.is_err());
        assert!(volume_atr_correlation(&window, 3, AtrSmoothing::Simple).unwrap().is_err());
    }

    #[test]
    fn short_window_is_a_partial_atr() {
        let series = linear_series("SPY", 6, 100.0, 1.0);
        let window = slice(&series, WindowSelector::FullHistory);
        let reading = atr(&window, 14, AtrSmoothing::Simple).unwrap().unwrap();
        assert!(reading.partial);
        assert_eq!(reading.true_ranges, 5);
        assert_relative_eq!(reading.value, 2.0);
    }

    #[test]
    fn single_row_has_no_true_range() {
        let series = linear_series("SPY", 6, 100.0, 1.0);
        let window = slice(&series, WindowSelector::Latest);
        assert!(atr(&window, 14, AtrSmoothing::Simple).unwrap().is_err());
        assert!(matches!(
            atr(&window, 0, AtrSmoothing::Simple),
            Err(AnalyticsError::InvalidParameter { name: "atr_period", .. })
        ));
    }

    #[test]
    fn true_range_uses_the_previous_close() {
        let series = series_from_closes("GAP", &[100.0, 110.0]);
        // Second row: high 111, low 109, previous close 100.
        assert_eq!(true_ranges(series.bars()), vec![11.0]);
    }

    #[test]
    fn exponential_atr_weights_recent_ranges() {
        let ranges = [1.0, 1.0, 1.0, 4.0];
        let series = exponential_atr(&ranges, 3);
        assert_eq!(series.len(), 2);
        assert_relative_eq!(series[0], 1.0);
        assert_relative_eq!(series[1], 0.5 * 4.0 + 0.5 * 1.0);
        assert_eq!(atr_series(&ranges, 3, AtrSmoothing::Simple), vec![1.0, 2.0]);
    }

    #[test]
    fn regimes_follow_the_thresholds() {
        let series = linear_series("SPY", 20, 100.0, 1.0);
        let params = DynamicsParams::default();
        let full = slice(&series, WindowSelector::FullHistory);

        let last12 = slice(&series, WindowSelector::Last12);
        let contracting = volatility_ratio(&last12, &full, &params);
        assert_relative_eq!(contracting.short.unwrap(), 13.0 / 107.0, epsilon = 1e-12);
        assert_relative_eq!(contracting.long.unwrap(), 21.0 / 99.0, epsilon = 1e-12);
        assert_eq!(contracting.regime, Ok(VolatilityRegime::Contracting));

        let stable = volatility_ratio(&full, &full, &params);
        assert_eq!(stable.regime, Ok(VolatilityRegime::Stable));

        let last3 = slice(&series, WindowSelector::Last3);
        let expanding = volatility_ratio(&full, &last3, &params);
        assert_eq!(expanding.regime, Ok(VolatilityRegime::Expanding));
    }

    #[test]
    fn ratings_use_percent_bands() {
        assert_eq!(VolatilityRating::from_percent(2.0), VolatilityRating::Low);
        assert_eq!(VolatilityRating::from_percent(4.9), VolatilityRating::Medium);
        assert_eq!(VolatilityRating::from_percent(5.1), VolatilityRating::High);
    }

    #[test]
    fn range_statistics_cover_every_row() {
        let series = series_from_closes("X", &[11.0, 21.0]);
        let stats = range_statistics(&slice(&series, WindowSelector::FullHistory)).unwrap();
        assert_relative_eq!(stats.max, 0.2);
        assert_relative_eq!(stats.mean, (0.2 + 0.1) / 2.0);
    }

    fn wavy_series(len: usize) -> PriceSeries {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let bars = (0..len)
            .map(|i| {
                let x = i as f64;
                let close = 100.0 + (x * 0.9).sin() * 4.0 + (x * 0.31).cos() * 2.0;
                let spread = 1.0 + (x * 0.5).sin().abs() * 2.0;
                PriceBar {
                    timestamp: start + Duration::days(i as i64),
                    open: close,
                    high: close + spread,
                    low: close - spread,
                    close,
                    volume: 1_000.0 + (x * 0.7).cos() * 400.0,
                }
            })
            .collect();
        PriceSeries::new("WAVE", bars).unwrap()
    }

    #[test]
    fn rolling_measures_use_lookback_before_a_short_window() {
        let series = wavy_series(200);
        let window = slice(&series, WindowSelector::Last12);

        let volatility = return_volatility(&window, 14).unwrap();
        let full = slice(&series, WindowSelector::FullHistory);
        assert_eq!(volatility, return_volatility(&full, 14).unwrap());

        let estimate = volume_atr_correlation(&window, 14, AtrSmoothing::Simple)
            .unwrap()
            .unwrap();
        assert_eq!(estimate.observations, 12);
    }

    #[test]
    fn rolling_measures_need_enough_history() {
        let series = wavy_series(10);
        let window = slice(&series, WindowSelector::Last6);
        assert_eq!(
            return_volatility(&window, 14),
            Err(InsufficientData::too_few(14, 9))
        );
        assert_eq!(
            volume_atr_correlation(&window, 14, AtrSmoothing::Simple).unwrap(),
            Err(InsufficientData::empty_alignment())
        );
    }

    #[test]
    fn empty_series_has_no_atr() {
        let series = PriceSeries::new("EMPTY", Vec::new()).unwrap();
        let window = slice(&series, WindowSelector::FullHistory);
        assert_eq!(
            atr(&window, 14, AtrSmoothing::Simple).unwrap(),
            Err(InsufficientData::too_few(2, 0))
        );
        assert!(return_volatility(&window, 14).is_err());
    }
}
