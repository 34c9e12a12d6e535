use core_types::{ReturnTimeline, WindowSelector};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisParams,
    /// Reference groups used for cross-asset correlation.
    #[serde(default)]
    pub groups: Vec<GroupDefinition>,
}

/// Parameters for every component of the analytics engine.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub descriptive: DescriptiveParams,
    pub simulation: SimulationParams,
    pub risk: RiskParams,
    pub dynamics: DynamicsParams,
    pub correlation: CorrelationParams,
}

/// Parameters for descriptive statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DescriptiveParams {
    /// Number of equal-width buckets in the frequency distribution.
    pub bucket_count: usize,
    /// Drop values outside 1.5 x IQR before building the distribution.
    pub exclude_outliers: bool,
    pub timeline: ReturnTimeline,
}

/// Parameters for the Monte Carlo price-path projection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    pub paths: usize,
    /// Forward steps, counted in window rows.
    pub steps: usize,
    /// Fixes the random source for reproducible runs.
    pub seed: Option<u64>,
    pub drift: DriftModel,
}

/// Parameters for the risk-adjusted return ratios.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RiskParams {
    /// Annual risk-free rate in percent (e.g. 4.5 for 4.5%).
    pub risk_free_rate_pct: Decimal,
    /// Annual Sortino target return in percent.
    pub target_return_pct: Decimal,
    /// Rows treated as one year when annualising.
    pub periods_per_year: u32,
}

/// Parameters for volatility ratio and ATR.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DynamicsParams {
    pub atr_period: usize,
    pub atr_smoothing: AtrSmoothing,
    /// Short/long range ratio above which volatility is flagged as expanding.
    pub expanding_threshold: f64,
    /// Short/long range ratio below which volatility is flagged as contracting.
    pub contracting_threshold: f64,
    /// Longer window the short-window range is compared against.
    pub reference_window: WindowSelector,
}

/// Parameters for the cross-asset correlation scan.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CorrelationParams {
    pub kind: CorrelationKind,
    /// Rows in the rolling standard deviation used for volatility correlation.
    pub volatility_window: usize,
}

/// A named set of reference instruments.
#[derive(Debug, Clone, Deserialize)]
pub struct GroupDefinition {
    pub label: String,
    pub members: Vec<ReferenceDefinition>,
}

/// One reference instrument and where its cleaned series lives.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceDefinition {
    pub name: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum CorrelationKind {
    #[default]
    Pearson,
    Spearman,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum AtrSmoothing {
    #[default]
    Simple,
    Exponential,
}

/// How the simulation estimates the per-step drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum DriftModel {
    /// Mean return of the window.
    #[default]
    Historical,
    /// A driftless walk.
    Zero,
}

impl fmt::Display for CorrelationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrelationKind::Pearson => f.write_str("pearson"),
            CorrelationKind::Spearman => f.write_str("spearman"),
        }
    }
}

impl FromStr for CorrelationKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pearson" => Ok(CorrelationKind::Pearson),
            "spearman" => Ok(CorrelationKind::Spearman),
            _ => Err(ConfigError::UnknownVariant {
                kind: "correlation kind",
                value: s.to_string(),
            }),
        }
    }
}

impl FromStr for AtrSmoothing {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "sma" => Ok(AtrSmoothing::Simple),
            "exponential" | "ema" => Ok(AtrSmoothing::Exponential),
            _ => Err(ConfigError::UnknownVariant {
                kind: "ATR smoothing",
                value: s.to_string(),
            }),
        }
    }
}

// --- Default Implementations ---
// A missing section in config.toml falls back to these.

impl Default for DescriptiveParams {
    fn default() -> Self {
        Self {
            bucket_count: 20,
            exclude_outliers: false,
            timeline: ReturnTimeline::Interday,
        }
    }
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            paths: 1_000,
            steps: 252,
            seed: None,
            drift: DriftModel::Historical,
        }
    }
}

impl Default for RiskParams {
    fn default() -> Self {
        Self {
            risk_free_rate_pct: Decimal::ZERO,
            target_return_pct: Decimal::ZERO,
            periods_per_year: 252,
        }
    }
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self {
            atr_period: 14,
            atr_smoothing: AtrSmoothing::Simple,
            expanding_threshold: 1.5,
            contracting_threshold: 0.67,
            reference_window: WindowSelector::FullHistory,
        }
    }
}

impl Default for CorrelationParams {
    fn default() -> Self {
        Self {
            kind: CorrelationKind::Pearson,
            volatility_window: 14,
        }
    }
}

impl RiskParams {
    /// The annual risk-free rate as a fraction.
    pub fn risk_free_rate(&self) -> Result<f64, ConfigError> {
        pct_to_fraction("risk_free_rate_pct", self.risk_free_rate_pct)
    }

    /// The annual Sortino target as a fraction.
    pub fn target_return(&self) -> Result<f64, ConfigError> {
        pct_to_fraction("target_return_pct", self.target_return_pct)
    }
}

fn pct_to_fraction(name: &str, pct: Decimal) -> Result<f64, ConfigError> {
    (pct / dec!(100)).to_f64().ok_or_else(|| {
        ConfigError::ValidationError(format!("{name} ({pct}) cannot be represented as f64"))
    })
}

impl Config {
    /// Rejects parameter combinations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;

        let mut seen = HashSet::new();
        for group in &self.groups {
            if group.label.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "group label must not be empty".to_string(),
                ));
            }
            if !seen.insert(group.label.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate group label '{}'",
                    group.label
                )));
            }
        }
        Ok(())
    }
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.descriptive.bucket_count == 0 {
            return Err(ConfigError::ValidationError(
                "descriptive.bucket_count must be positive".to_string(),
            ));
        }
        if self.simulation.paths == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.paths must be positive".to_string(),
            ));
        }
        if self.simulation.steps == 0 {
            return Err(ConfigError::ValidationError(
                "simulation.steps must be positive".to_string(),
            ));
        }
        if self.risk.periods_per_year == 0 {
            return Err(ConfigError::ValidationError(
                "risk.periods_per_year must be positive".to_string(),
            ));
        }
        self.risk.risk_free_rate()?;
        self.risk.target_return()?;

        let dynamics = &self.dynamics;
        if dynamics.atr_period == 0 {
            return Err(ConfigError::ValidationError(
                "dynamics.atr_period must be positive".to_string(),
            ));
        }
        if !(dynamics.contracting_threshold > 0.0
            && dynamics.contracting_threshold < dynamics.expanding_threshold
            && dynamics.expanding_threshold.is_finite())
        {
            return Err(ConfigError::ValidationError(format!(
                "dynamics thresholds must satisfy 0 < contracting ({}) < expanding ({})",
                dynamics.contracting_threshold, dynamics.expanding_threshold
            )));
        }
        if self.correlation.volatility_window < 2 {
            return Err(ConfigError::ValidationError(
                "correlation.volatility_window must be at least 2".to_string(),
            ));
        }
        Ok(())
    }
}
