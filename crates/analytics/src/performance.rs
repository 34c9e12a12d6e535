use crate::error::{InsufficientData, Outcome, finite, require};
use crate::slicer::WorkingWindow;
use crate::stats::{self, MIN_STD};
use serde::Serialize;

/// Buy-and-hold performance over the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    /// `last close / first close - 1`.
    pub return_on_investment: Outcome<f64>,
    /// Compounded growth per year, with each row counted as `1 / periods_per_year`
    /// of a year.
    pub annualised_return: Outcome<f64>,
    /// Largest decline from a running peak close, as a positive fraction.
    pub max_drawdown: Outcome<f64>,
    /// Mean interday return per unit of its standard deviation.
    pub volatility_adjusted_return: Outcome<f64>,
}

pub fn performance(window: &WorkingWindow<'_>, periods_per_year: u32) -> PerformanceMetrics {
    let closes = window.closes();
    let metrics = PerformanceMetrics {
        return_on_investment: return_on_investment(&closes),
        annualised_return: annualised_return(&closes, periods_per_year),
        max_drawdown: max_drawdown(&closes),
        volatility_adjusted_return: volatility_adjusted_return(&window.returns().values()),
    };

    tracing::debug!(
        symbol = window.symbol(),
        roi = ?metrics.return_on_investment,
        max_drawdown = ?metrics.max_drawdown,
        "Performance metrics computed."
    );
    metrics
}

fn return_on_investment(closes: &[f64]) -> Outcome<f64> {
    require(2, closes.len())?;
    let (first, last) = (closes[0], closes[closes.len() - 1]);
    if first.abs() <= MIN_STD {
        return Err(InsufficientData::zero_denominator());
    }
    finite(last / first - 1.0)
}

fn annualised_return(closes: &[f64], periods_per_year: u32) -> Outcome<f64> {
    let growth = return_on_investment(closes)? + 1.0;
    if periods_per_year == 0 {
        return Err(InsufficientData::zero_denominator());
    }
    let years = (closes.len() - 1) as f64 / f64::from(periods_per_year);
    finite(growth.powf(1.0 / years) - 1.0)
}

fn max_drawdown(closes: &[f64]) -> Outcome<f64> {
    require(2, closes.len())?;

    let mut peak = closes[0];
    let mut worst: f64 = 0.0;
    for &close in closes {
        peak = peak.max(close);
        if peak > MIN_STD {
            worst = worst.max((peak - close) / peak);
        }
    }
    finite(worst)
}

fn volatility_adjusted_return(returns: &[f64]) -> Outcome<f64> {
    require(2, returns.len())?;
    let mean = stats::mean(returns).ok_or_else(|| InsufficientData::too_few(1, 0))?;
    let std_dev = stats::sample_std(returns)
        .ok_or_else(|| InsufficientData::too_few(2, returns.len()))?;
    if std_dev <= MIN_STD {
        return Err(InsufficientData::zero_variance());
    }
    finite(mean / std_dev)
}
