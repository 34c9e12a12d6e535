//! # MarketLens Analytics Engine
//!
//! This crate turns a cleaned OHLCV history into a structural and risk profile of
//! one asset over one window of rows.
//!
//! ## Architectural Principles
//!
//! - **Pure logic:** No I/O and no global state. Price data, parameters and the
//!   reference group registry are all handed in by the caller.
//! - **One place selects rows:** `slicer::slice` produces the `WorkingWindow`; every
//!   other component reads that window as is and never re-slices it. Rolling
//!   measures may look back before the window through `WorkingWindow::history`,
//!   but only report readings that fall inside it.
//! - **Missing is not failure:** A statistic that cannot be computed from the window
//!   is an `InsufficientData` value inside the result. Only invalid parameters and
//!   unknown group labels surface as `AnalyticsError`.
//!
//! ## Public API
//!
//! - `AnalyticsEngine`: Runs every component for an `AnalysisRequest`.
//! - `AnalysisResult`: The assembled, serializable output.
//! - The component functions (`describe`, `simulate`, `sharpe`, `atr`, `correlate`, ...)
//!   for callers that need a single measure.

// Declare the modules that constitute this crate.
pub mod correlation;
pub mod descriptive;
pub mod dynamics;
pub mod engine;
pub mod error;
pub mod groups;
pub mod performance;
pub mod ratios;
pub mod report;
pub mod simulation;
pub mod slicer;
pub mod stats;

#[cfg(test)]
mod test_support;

// Re-export the key components to create a clean, public-facing API.
pub use correlation::{
    CorrelationEstimate, CorrelationMap, CorrelationStrength, correlate, correlate_volatility,
};
pub use descriptive::{DescriptiveStats, describe};
pub use dynamics::{
    AtrReading, MarketDynamics, VolatilityRating, VolatilityRatioReport, VolatilityRegime, atr,
    volatility_ratio,
};
pub use engine::{AnalysisRequest, AnalyticsEngine, MoveTarget, PriceTarget};
pub use error::{AnalyticsError, InsufficientData, Outcome, Shortfall};
pub use groups::{AssetGroup, AssetGroupRegistry, BUILT_IN_GROUPS};
pub use performance::{PerformanceMetrics, performance};
pub use ratios::{RiskRatios, sharpe, sortino};
pub use report::{AnalysisResult, GroupCorrelation, assemble};
pub use simulation::{
    Direction, HitRatio, SimulationSummary, TargetProbability, historical_hit_ratio,
    probability_of_target, simulate,
};
pub use slicer::{WindowSelector, WindowSummary, WorkingWindow, slice};
