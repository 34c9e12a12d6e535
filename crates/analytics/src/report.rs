use crate::correlation::CorrelationMap;
use crate::descriptive::DescriptiveStats;
use crate::dynamics::MarketDynamics;
use crate::error::Outcome;
use crate::performance::PerformanceMetrics;
use crate::ratios::RiskRatios;
use crate::simulation::{HitRatio, SimulationSummary, TargetProbability};
use crate::slicer::WindowSummary;
use configuration::CorrelationKind;
use core_types::WindowSelector;
use serde::Serialize;

/// The complete analysis of one asset over one window.
///
/// This struct is the final output of the `AnalyticsEngine` and the data
/// transfer object handed to presentation and export. Every sub-result stands
/// on its own: a missing statistic is carried as an `InsufficientData` value
/// and never hides the others.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub symbol: String,
    pub window: WindowSummary,

    // I. Distribution of returns
    pub descriptive: DescriptiveStats,

    // II. Risk and projection
    pub risk: RiskRatios,
    pub simulation: Outcome<SimulationSummary>,
    pub target: Option<Outcome<TargetProbability>>,
    pub historical_target: Option<Outcome<HitRatio>>,

    // III. Price behaviour
    pub dynamics: MarketDynamics,
    pub performance: PerformanceMetrics,

    // IV. Relationships
    pub correlations: Vec<GroupCorrelation>,
}

/// Return and volatility correlation of the asset against one group.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCorrelation {
    pub group: String,
    pub kind: CorrelationKind,
    pub returns: CorrelationMap,
    pub volatility: CorrelationMap,
}

/// Everything the components produced for one window, before assembly.
#[derive(Debug, Clone)]
pub struct SubResults {
    pub descriptive: DescriptiveStats,
    pub risk: RiskRatios,
    pub simulation: Outcome<SimulationSummary>,
    pub target: Option<Outcome<TargetProbability>>,
    pub historical_target: Option<Outcome<HitRatio>>,
    pub dynamics: MarketDynamics,
    pub performance: PerformanceMetrics,
    pub correlations: Vec<GroupCorrelation>,
}

/// Combines independent sub-results into one immutable [`AnalysisResult`].
pub fn assemble(symbol: &str, window: WindowSummary, parts: SubResults) -> AnalysisResult {
    let result = AnalysisResult {
        symbol: symbol.to_string(),
        window,
        descriptive: parts.descriptive,
        risk: parts.risk,
        simulation: parts.simulation,
        target: parts.target,
        historical_target: parts.historical_target,
        dynamics: parts.dynamics,
        performance: parts.performance,
        correlations: parts.correlations,
    };

    tracing::info!(
        symbol,
        selector = %window.selector,
        rows = window.rows,
        truncated = window.truncated,
        missing = result.missing_headline_metrics(),
        "Analysis assembled."
    );
    result
}

impl AnalysisResult {
    /// Results are keyed by asset and window selector.
    pub fn key(&self) -> (&str, WindowSelector) {
        (&self.symbol, self.window.selector)
    }

    /// How many of the headline metrics came back as `InsufficientData`.
    pub fn missing_headline_metrics(&self) -> usize {
        [
            self.descriptive.mean.is_err(),
            self.descriptive.std_dev.is_err(),
            self.risk.sharpe.is_err(),
            self.risk.sortino.is_err(),
            self.simulation.is_err(),
            self.dynamics.volatility_ratio.relative.is_err(),
            self.dynamics.atr.is_err(),
            self.performance.return_on_investment.is_err(),
        ]
        .into_iter()
        .filter(|missing| *missing)
        .count()
    }
}
