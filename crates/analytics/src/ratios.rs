use crate::error::{AnalyticsError, InsufficientData, Outcome, finite, require};
use crate::slicer::WorkingWindow;
use crate::stats::{self, MIN_STD};
use configuration::RiskParams;
use serde::Serialize;

/// Annualised risk-adjusted returns of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RiskRatios {
    pub sharpe: Outcome<f64>,
    pub sortino: Outcome<f64>,
}

/// Computes both ratios with the configured rates and annualisation factor.
pub fn risk_ratios(
    window: &WorkingWindow<'_>,
    params: &RiskParams,
) -> Result<RiskRatios, AnalyticsError> {
    let risk_free_rate = params.risk_free_rate()?;
    let target_return = params.target_return()?;

    Ok(RiskRatios {
        sharpe: sharpe(window, risk_free_rate, params.periods_per_year),
        sortino: sortino(window, target_return, params.periods_per_year),
    })
}

/// `(mean * P - rf) / (std * sqrt(P))` over interday returns.
pub fn sharpe(
    window: &WorkingWindow<'_>,
    risk_free_rate: f64,
    periods_per_year: u32,
) -> Outcome<f64> {
    let returns = window.returns().values();
    require(2, returns.len())?;

    let mean = stats::mean(&returns).ok_or_else(|| InsufficientData::too_few(1, 0))?;
    let std_dev = stats::sample_std(&returns)
        .ok_or_else(|| InsufficientData::too_few(2, returns.len()))?;
    if std_dev <= MIN_STD {
        return Err(InsufficientData::zero_variance());
    }

    let periods = f64::from(periods_per_year);
    finite((mean * periods - risk_free_rate) / (std_dev * periods.sqrt()))
}

/// Like [`sharpe`], penalising only returns below the per-row share of `target_return`.
pub fn sortino(
    window: &WorkingWindow<'_>,
    target_return: f64,
    periods_per_year: u32,
) -> Outcome<f64> {
    let returns = window.returns().values();
    require(2, returns.len())?;

    let periods = f64::from(periods_per_year);
    let threshold = target_return / periods;
    let downside: Vec<f64> = returns.iter().copied().filter(|r| *r < threshold).collect();
    require(2, downside.len())?;

    let downside_dev = stats::sample_std(&downside)
        .ok_or_else(|| InsufficientData::too_few(2, downside.len()))?;
    if downside_dev <= MIN_STD {
        return Err(InsufficientData::zero_denominator());
    }

    let mean = stats::mean(&returns).ok_or_else(|| InsufficientData::too_few(1, 0))?;
    finite((mean * periods - target_return) / (downside_dev * periods.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Shortfall;
    use crate::slicer::{WindowSelector, slice};
    use crate::test_support::{linear_series, series_from_closes};
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_prices_have_no_ratios() {
        let series = series_from_closes("FLAT", &[10.0; 8]);
        let window = slice(&series, WindowSelector::FullHistory);
        let ratios = risk_ratios(&window, &RiskParams::default()).unwrap();
        assert_eq!(ratios.sharpe, Err(InsufficientData::zero_variance()));
        assert!(ratios.sortino.is_err());
    }

    #[test]
    fn sharpe_matches_hand_computation() {
        let series = series_from_closes("X", &[100.0, 110.0, 99.0, 108.9]);
        let window = slice(&series, WindowSelector::FullHistory);
        // returns: 0.10, -0.10, 0.10
        let mean: f64 = 0.1 / 3.0;
        let std = ((2.0 * (0.1 - mean).powi(2) + (-0.1 - mean).powi(2)) / 2.0).sqrt();
        let expected = (mean * 252.0) / (std * 252f64.sqrt());
        assert_relative_eq!(sharpe(&window, 0.0, 252).unwrap(), expected, epsilon = 1e-9);
    }

    #[test]
    fn risk_free_rate_lowers_sharpe() {
        let series = series_from_closes("X", &[100.0, 103.0, 101.0, 106.0, 104.0, 109.0]);
        let window = slice(&series, WindowSelector::FullHistory);
        let base = sharpe(&window, 0.0, 252).unwrap();
        let with_rate = risk_ratios(
            &window,
            &RiskParams {
                risk_free_rate_pct: dec!(5),
                ..RiskParams::default()
            },
        )
        .unwrap()
        .sharpe
        .unwrap();
        assert!(with_rate < base);
    }

    #[test]
    fn rising_series_without_losses_has_no_sortino() {
        let series = linear_series("UP", 20, 100.0, 1.0);
        let window = slice(&series, WindowSelector::FullHistory);
        assert_eq!(
            sortino(&window, 0.0, 252).unwrap_err().reason,
            Shortfall::TooFewObservations { required: 2, actual: 0 }
        );
        assert!(sharpe(&window, 0.0, 252).unwrap() > 0.0);
    }

    #[test]
    fn sortino_uses_downside_deviation() {
        let series = series_from_closes("X", &[100.0, 110.0, 99.0, 108.9, 98.01]);
        let window = slice(&series, WindowSelector::FullHistory);
        // returns: 0.10, -0.10, 0.10, -0.10; downside deviation of [-0.1, -0.1] is zero
        assert_eq!(
            sortino(&window, 0.0, 252),
            Err(InsufficientData::zero_denominator())
        );

        let series = series_from_closes("Y", &[100.0, 110.0, 99.0, 108.9, 103.455]);
        let window = slice(&series, WindowSelector::FullHistory);
        // returns: 0.10, -0.10, 0.10, -0.05
        let returns = [0.1, -0.1, 0.1, -0.05];
        let mean = returns.iter().sum::<f64>() / 4.0;
        let downside_dev = stats::sample_std(&[-0.1, -0.05]).unwrap();
        let expected = (mean * 252.0) / (downside_dev * 252f64.sqrt());
        assert_relative_eq!(sortino(&window, 0.0, 252).unwrap(), expected, epsilon = 1e-6);
    }
}
