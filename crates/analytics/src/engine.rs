use crate::correlation::{correlate, correlate_volatility};
use crate::descriptive::describe;
use crate::dynamics::market_dynamics;
use crate::error::{AnalyticsError, Outcome};
use crate::groups::{AssetGroup, AssetGroupRegistry};
use crate::performance::performance;
use crate::ratios::risk_ratios;
use crate::report::{AnalysisResult, GroupCorrelation, SubResults, assemble};
use crate::simulation::{
    Direction, SimulationSummary, TargetProbability, historical_hit_ratio, probability_of_target,
    simulate,
};
use crate::slicer::{WorkingWindow, slice};
use configuration::AnalysisParams;
use core_types::{PriceSeries, WindowSelector};

/// A price the caller wants the probability of reaching within `horizon` rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceTarget {
    pub price: f64,
    pub horizon: usize,
}

/// A percentage move whose historical frequency the caller wants to know.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveTarget {
    pub percent: f64,
    pub direction: Direction,
}

/// One asset, one window, and the optional extras to compute for it.
#[derive(Debug, Clone)]
pub struct AnalysisRequest<'a> {
    pub series: &'a PriceSeries,
    pub selector: WindowSelector,
    /// Labels of registry groups to correlate against.
    pub groups: Vec<String>,
    pub target: Option<PriceTarget>,
    /// Counted on the configured descriptive return timeline.
    pub move_target: Option<MoveTarget>,
}

impl<'a> AnalysisRequest<'a> {
    pub fn new(series: &'a PriceSeries, selector: WindowSelector) -> Self {
        Self {
            series,
            selector,
            groups: Vec::new(),
            target: None,
            move_target: None,
        }
    }
}

/// A stateless calculator that runs every analysis component over a window.
///
/// The engine owns only its parameters. The price data and the group registry
/// are handed in on every call.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    params: AnalysisParams,
}

impl AnalyticsEngine {
    pub fn new(params: AnalysisParams) -> Result<Self, AnalyticsError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    /// The main entry point for analysing one asset.
    ///
    /// # Arguments
    ///
    /// * `request` - The series, window selector, groups and optional price target.
    /// * `registry` - The reference groups correlations are computed against.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AnalysisResult`, or an `AnalyticsError` when a
    /// parameter or group label is invalid. Statistics that cannot be computed
    /// from the window are reported inside the result, not as errors.
    #[tracing::instrument(
        skip(self, request, registry),
        fields(symbol = request.series.symbol(), selector = %request.selector)
    )]
    pub fn analyze(
        &self,
        request: &AnalysisRequest<'_>,
        registry: &AssetGroupRegistry,
    ) -> Result<AnalysisResult, AnalyticsError> {
        // Unknown labels are caller errors and fail before any work is done.
        let groups = request
            .groups
            .iter()
            .map(|label| registry.get(label))
            .collect::<Result<Vec<_>, _>>()?;

        let reference_selector = self.params.dynamics.reference_window;
        if !reference_selector.covers(request.selector) {
            return Err(AnalyticsError::invalid(
                "reference_window",
                format!(
                    "{reference_selector} is shorter than the requested {} window",
                    request.selector
                ),
            ));
        }

        let window = slice(request.series, request.selector);
        let reference = slice(request.series, reference_selector);
        if window.is_truncated() {
            tracing::warn!(
                rows = window.len(),
                "Window is shorter than requested; results use every available row."
            );
        }

        let risk = risk_ratios(&window, &self.params.risk)?;
        let historical_target = request
            .move_target
            .map(|m| {
                historical_hit_ratio(
                    &window,
                    m.percent,
                    m.direction,
                    self.params.descriptive.timeline,
                )
            })
            .transpose()?;
        let ((descriptive, performance), (projection, (dynamics, correlations))) = rayon::join(
            || {
                (
                    describe(&window, &self.params.descriptive),
                    performance(&window, self.params.risk.periods_per_year),
                )
            },
            || {
                rayon::join(
                    || self.project(&window, request.target),
                    || {
                        rayon::join(
                            || {
                                market_dynamics(
                                    &window,
                                    &reference,
                                    &self.params.dynamics,
                                    self.params.correlation.volatility_window,
                                )
                            },
                            || self.correlate_groups(&window, &groups),
                        )
                    },
                )
            },
        );
        let (simulation, target) = projection?;

        let parts = SubResults {
            descriptive,
            risk,
            simulation,
            target,
            historical_target,
            dynamics: dynamics?,
            performance,
            correlations: correlations?,
        };
        Ok(assemble(request.series.symbol(), window.summary(), parts))
    }

    /// Monte Carlo summary plus the optional price-target probability.
    fn project(
        &self,
        window: &WorkingWindow<'_>,
        target: Option<PriceTarget>,
    ) -> Result<
        (
            Outcome<SimulationSummary>,
            Option<Outcome<TargetProbability>>,
        ),
        AnalyticsError,
    > {
        let summary = simulate(window, &self.params.simulation)?;
        let target = target
            .map(|t| probability_of_target(window, t.price, t.horizon, &self.params.simulation))
            .transpose()?;
        Ok((summary, target))
    }

    fn correlate_groups(
        &self,
        window: &WorkingWindow<'_>,
        groups: &[&AssetGroup],
    ) -> Result<Vec<GroupCorrelation>, AnalyticsError> {
        let kind = self.params.correlation.kind;
        groups
            .iter()
            .map(|group| {
                Ok(GroupCorrelation {
                    group: group.label().to_string(),
                    kind,
                    returns: correlate(window, group, kind),
                    volatility: correlate_volatility(
                        window,
                        group,
                        kind,
                        self.params.correlation.volatility_window,
                    )?,
                })
            })
            .collect()
    }
}
