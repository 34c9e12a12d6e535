//! Co-movement of the target window against every member of an asset group.
//!
//! Series are matched on exact timestamps (inner join). Pairs that cannot
//! produce a coefficient are reported per member and never stop the scan.

use crate::error::{AnalyticsError, InsufficientData, Outcome, finite, require};
use crate::groups::AssetGroup;
use crate::slicer::WorkingWindow;
use crate::stats::{self, MIN_STD};
use configuration::CorrelationKind;
use core_types::{PriceSeries, ReturnPoint, ReturnSeries};
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Aligned observations needed before a coefficient is reported.
pub const MIN_ALIGNED_OBSERVATIONS: usize = 3;

/// Per-member results keyed by the member's symbol.
pub type CorrelationMap = BTreeMap<String, Outcome<CorrelationEstimate>>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationEstimate {
    pub kind: CorrelationKind,
    pub coefficient: f64,
    /// Two-sided p-value of the t-test against zero correlation.
    pub p_value: f64,
    pub observations: usize,
    pub strength: CorrelationStrength,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationStrength {
    PerfectPositive,
    StrongPositive,
    ModeratePositive,
    WeakPositive,
    None,
    WeakNegative,
    ModerateNegative,
    StrongNegative,
    PerfectNegative,
}

impl CorrelationStrength {
    pub fn classify(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        let positive = coefficient > 0.0;
        match magnitude {
            m if m >= 1.0 - 1e-12 => pick(positive, Self::PerfectPositive, Self::PerfectNegative),
            m if m >= 0.7 => pick(positive, Self::StrongPositive, Self::StrongNegative),
            m if m >= 0.3 => pick(positive, Self::ModeratePositive, Self::ModerateNegative),
            m if m > 0.0 => pick(positive, Self::WeakPositive, Self::WeakNegative),
            _ => Self::None,
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::PerfectPositive => "Perfect positive",
            Self::StrongPositive => "Strong positive",
            Self::ModeratePositive => "Moderate positive",
            Self::WeakPositive => "Weak positive",
            Self::None => "No correlation",
            Self::WeakNegative => "Weak negative",
            Self::ModerateNegative => "Moderate negative",
            Self::StrongNegative => "Strong negative",
            Self::PerfectNegative => "Perfect negative",
        }
    }
}

fn pick<T>(positive: bool, up: T, down: T) -> T {
    if positive { up } else { down }
}

/// Inner join of two timestamp-ordered series.
pub fn align(left: &[ReturnPoint], right: &[ReturnPoint]) -> (Vec<f64>, Vec<f64>) {
    let (mut xs, mut ys) = (Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < left.len() && j < right.len() {
        match left[i].timestamp.cmp(&right[j].timestamp) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                xs.push(left[i].value);
                ys.push(right[j].value);
                i += 1;
                j += 1;
            }
        }
    }
    (xs, ys)
}

/// Coefficient and significance of two equally long samples.
pub fn estimate(xs: &[f64], ys: &[f64], kind: CorrelationKind) -> Outcome<CorrelationEstimate> {
    let n = xs.len().min(ys.len());
    if n == 0 {
        return Err(InsufficientData::empty_alignment());
    }
    require(MIN_ALIGNED_OBSERVATIONS, n)?;
    let (xs, ys) = (&xs[..n], &ys[..n]);

    let coefficient = match kind {
        CorrelationKind::Pearson => pearson(xs, ys)?,
        CorrelationKind::Spearman => {
            pearson(&stats::average_ranks(xs), &stats::average_ranks(ys))?
        }
    };

    Ok(CorrelationEstimate {
        kind,
        coefficient,
        p_value: p_value(coefficient, n)?,
        observations: n,
        strength: CorrelationStrength::classify(coefficient),
    })
}

fn pearson(xs: &[f64], ys: &[f64]) -> Outcome<f64> {
    let mx = stats::mean(xs).ok_or_else(InsufficientData::empty_alignment)?;
    let my = stats::mean(ys).ok_or_else(InsufficientData::empty_alignment)?;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        let (dx, dy) = (x - mx, y - my);
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    if sxx.sqrt() <= MIN_STD || syy.sqrt() <= MIN_STD {
        return Err(InsufficientData::zero_variance());
    }
    finite((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

fn p_value(r: f64, n: usize) -> Outcome<f64> {
    let df = (n - 2) as f64;
    let residual = 1.0 - r * r;
    if residual <= MIN_STD {
        return Ok(0.0);
    }
    let t = r * (df / residual).sqrt();
    let dist = StudentsT::new(0.0, 1.0, df).map_err(|_| InsufficientData::non_finite())?;
    finite((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

/// Return correlation of the window against each member's full history.
pub fn correlate(
    window: &WorkingWindow<'_>,
    group: &AssetGroup,
    kind: CorrelationKind,
) -> CorrelationMap {
    let target = window.returns();
    scan(window.symbol(), &target, group, kind, |member| {
        ReturnSeries::interday(member.bars())
    })
}

/// Correlation of rolling return volatility, same alignment rules as [`correlate`].
///
/// The target's rolling series is built over its full history and then restricted
/// to the window, so windows shorter than `volatility_window` still get a reading.
pub fn correlate_volatility(
    window: &WorkingWindow<'_>,
    group: &AssetGroup,
    kind: CorrelationKind,
    volatility_window: usize,
) -> Result<CorrelationMap, AnalyticsError> {
    if volatility_window < 2 {
        return Err(AnalyticsError::invalid(
            "volatility_window",
            format!("{volatility_window} rows cannot hold a standard deviation"),
        ));
    }

    // Runs may start before the window; only readings inside it are compared.
    let history = ReturnSeries::interday(window.history());
    let target = window.restrict(&rolling_volatility(&history, volatility_window));
    Ok(scan(window.symbol(), &target, group, kind, |member| {
        rolling_volatility(&ReturnSeries::interday(member.bars()), volatility_window)
    }))
}

fn scan(
    symbol: &str,
    target: &ReturnSeries,
    group: &AssetGroup,
    kind: CorrelationKind,
    reference: impl Fn(&PriceSeries) -> ReturnSeries,
) -> CorrelationMap {
    group
        .members()
        .iter()
        .map(|member| {
            let (xs, ys) = align(target.points(), reference(member).points());
            let outcome = estimate(&xs, &ys, kind);
            if let Err(missing) = &outcome {
                tracing::debug!(
                    symbol,
                    member = member.symbol(),
                    group = group.label(),
                    %missing,
                    "Correlation unavailable."
                );
            }
            (member.symbol().to_string(), outcome)
        })
        .collect()
}

/// Sample standard deviation over each trailing run of `window` returns,
/// stamped with the last return of the run.
pub fn rolling_volatility(returns: &ReturnSeries, window: usize) -> ReturnSeries {
    if window < 2 || returns.len() < window {
        return ReturnSeries::default();
    }
    let points = returns.points();
    let values = returns.values();
    let rolled = values
        .windows(window)
        .zip(&points[window - 1..])
        .filter_map(|(run, point)| {
            stats::sample_std(run).map(|value| ReturnPoint {
                timestamp: point.timestamp,
                value,
            })
        })
        .collect();
    ReturnSeries::from_points(rolled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Shortfall;
    use crate::slicer::{WindowSelector, slice};
    use crate::test_support::{series_from_closes, shifted_series};
    use approx::assert_relative_eq;

    fn wavy(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 100.0 + (i as f64 * 0.9).sin() * 4.0 + (i as f64 * 0.31).cos() * 2.0)
            .collect()
    }

    fn group(members: Vec<PriceSeries>) -> AssetGroup {
        AssetGroup::new("Test", members).unwrap()
    }

    #[test]
    fn series_correlates_perfectly_with_itself() {
        let closes = wavy(30);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![series_from_closes("COPY", &closes)]);
        let window = slice(&target, WindowSelector::FullHistory);

        for kind in [CorrelationKind::Pearson, CorrelationKind::Spearman] {
            let map = correlate(&window, &group, kind);
            let est = map["COPY"].unwrap();
            assert_relative_eq!(est.coefficient, 1.0, epsilon = 1e-9);
            assert_eq!(est.strength, CorrelationStrength::PerfectPositive);
            assert_eq!(est.p_value, 0.0);
            assert_eq!(est.observations, 29);
        }
    }

    #[test]
    fn negated_returns_correlate_at_minus_one() {
        let xs: Vec<f64> = wavy(20).windows(2).map(|w| w[1] / w[0] - 1.0).collect();
        let ys: Vec<f64> = xs.iter().map(|x| -x).collect();
        let est = estimate(&xs, &ys, CorrelationKind::Pearson).unwrap();
        assert_relative_eq!(est.coefficient, -1.0, epsilon = 1e-9);
        assert_eq!(est.strength, CorrelationStrength::PerfectNegative);
    }

    #[test]
    fn spearman_ignores_monotone_transforms() {
        let xs: Vec<f64> = (1..=10).map(f64::from).collect();
        let ys: Vec<f64> = xs.iter().map(|x| x.powi(3)).collect();
        let spearman = estimate(&xs, &ys, CorrelationKind::Spearman).unwrap();
        let pearson = estimate(&xs, &ys, CorrelationKind::Pearson).unwrap();
        assert_relative_eq!(spearman.coefficient, 1.0, epsilon = 1e-12);
        assert!(pearson.coefficient < 1.0);
    }

    #[test]
    fn p_value_matches_student_t_reference() {
        // r = 0.5 with n = 12 gives t = 1.8257 on 10 degrees of freedom.
        let p = p_value(0.5, 12).unwrap();
        assert_relative_eq!(p, 0.0978, epsilon = 1e-3);
    }

    #[test]
    fn fewer_than_three_overlaps_is_insufficient() {
        let closes = wavy(10);
        let target = series_from_closes("AAA", &closes);
        // Shifted by 7 days: only 2 shared return timestamps remain.
        let group = group(vec![shifted_series("LATE", &closes, 7)]);
        let window = slice(&target, WindowSelector::FullHistory);
        let map = correlate(&window, &group, CorrelationKind::Pearson);
        assert_eq!(
            map["LATE"].unwrap_err().reason,
            Shortfall::TooFewObservations { required: 3, actual: 2 }
        );
    }

    #[test]
    fn disjoint_history_is_an_empty_alignment() {
        let closes = wavy(10);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![shifted_series("FAR", &closes, 365)]);
        let window = slice(&target, WindowSelector::FullHistory);
        let map = correlate(&window, &group, CorrelationKind::Pearson);
        assert_eq!(map["FAR"], Err(InsufficientData::empty_alignment()));
    }

    #[test]
    fn flat_member_has_zero_variance() {
        let target = series_from_closes("AAA", &wavy(10));
        let group = group(vec![series_from_closes("FLAT", &[5.0; 10])]);
        let window = slice(&target, WindowSelector::FullHistory);
        let map = correlate(&window, &group, CorrelationKind::Pearson);
        assert_eq!(map["FLAT"], Err(InsufficientData::zero_variance()));
    }

    #[test]
    fn one_bad_member_does_not_hide_the_others() {
        let closes = wavy(30);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![
            series_from_closes("COPY", &closes),
            series_from_closes("FLAT", &[5.0; 30]),
        ]);
        let window = slice(&target, WindowSelector::FullHistory);
        let map = correlate(&window, &group, CorrelationKind::Pearson);
        assert_eq!(map.len(), 2);
        assert!(map["COPY"].is_ok());
        assert!(map["FLAT"].is_err());
    }

    #[test]
    fn window_limits_target_but_not_references() {
        let closes = wavy(40);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![series_from_closes("COPY", &closes)]);
        let window = slice(&target, WindowSelector::Last12);
        let map = correlate(&window, &group, CorrelationKind::Pearson);
        assert_eq!(map["COPY"].unwrap().observations, 11);
    }

    #[test]
    fn rolling_volatility_has_one_point_per_full_run() {
        let series = series_from_closes("AAA", &wavy(20));
        let returns = ReturnSeries::interday(series.bars());
        let rolled = rolling_volatility(&returns, 5);
        assert_eq!(rolled.len(), returns.len() - 4);
        assert_eq!(rolled.points()[0].timestamp, returns.points()[4].timestamp);
        assert_relative_eq!(
            rolled.points()[0].value,
            stats::sample_std(&returns.values()[..5]).unwrap()
        );
    }

    #[test]
    fn volatility_correlation_of_a_copy_is_one() {
        let closes = wavy(40);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![series_from_closes("COPY", &closes)]);
        let window = slice(&target, WindowSelector::FullHistory);
        let map = correlate_volatility(&window, &group, CorrelationKind::Pearson, 14).unwrap();
        assert_relative_eq!(map["COPY"].unwrap().coefficient, 1.0, epsilon = 1e-9);
        assert!(correlate_volatility(&window, &group, CorrelationKind::Pearson, 1).is_err());
    }

    #[test]
    fn short_window_volatility_correlation_uses_lookback() {
        let closes = wavy(200);
        let target = series_from_closes("AAA", &closes);
        let group = group(vec![series_from_closes("COPY", &closes)]);
        let window = slice(&target, WindowSelector::Last12);
        let map = correlate_volatility(&window, &group, CorrelationKind::Pearson, 14).unwrap();
        let est = map["COPY"].unwrap();
        assert_eq!(est.observations, 12);
        assert_relative_eq!(est.coefficient, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn strength_bands() {
        assert_eq!(CorrelationStrength::classify(0.75), CorrelationStrength::StrongPositive);
        assert_eq!(CorrelationStrength::classify(0.3), CorrelationStrength::ModeratePositive);
        assert_eq!(CorrelationStrength::classify(-0.1), CorrelationStrength::WeakNegative);
        assert_eq!(CorrelationStrength::classify(0.0), CorrelationStrength::None);
    }
}
