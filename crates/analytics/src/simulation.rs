//! Monte Carlo projection of future prices from the window's own returns, and
//! the empirical rate at which past moves reached a given size.
//!
//! Each path runs on its own `StdRng`, seeded from a single master generator
//! before any path starts. Paths are then free to run on the rayon pool in any
//! order and the collected results are identical to a sequential run.

use crate::error::{AnalyticsError, InsufficientData, Outcome, finite, require};
use crate::slicer::WorkingWindow;
use crate::stats;
use configuration::{DriftModel, SimulationParams};
use core_types::ReturnTimeline;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::Serialize;

/// Distribution of simulated final prices.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub start_price: f64,
    /// Per-row drift and volatility the walk was driven with.
    pub drift: f64,
    pub volatility: f64,
    pub paths: usize,
    pub steps: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub p10: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Up,
    Down,
}

/// Share of simulated paths that touch a price target within the horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TargetProbability {
    pub target: f64,
    pub horizon: usize,
    pub direction: Direction,
    pub probability: f64,
}

/// How often past returns on one timeline moved at least `threshold_pct`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HitRatio {
    pub threshold_pct: f64,
    pub direction: Direction,
    pub timeline: ReturnTimeline,
    pub occurrences: usize,
    pub observations: usize,
    pub probability: f64,
    /// Rounded "1 in N" reading; `None` when the move never happened.
    pub one_in: Option<u64>,
}

/// Per-row parameters of the geometric walk.
#[derive(Debug, Clone, Copy)]
struct WalkModel {
    start: f64,
    drift: f64,
    volatility: f64,
}

impl WalkModel {
    fn estimate(window: &WorkingWindow<'_>, drift_model: DriftModel) -> Outcome<Self> {
        let returns = window.returns().values();
        require(2, returns.len())?;

        let start = window
            .last_close()
            .ok_or_else(|| InsufficientData::too_few(1, 0))?;
        let volatility = stats::sample_std(&returns)
            .ok_or_else(|| InsufficientData::too_few(2, returns.len()))
            .and_then(finite)?;
        let drift = match drift_model {
            DriftModel::Historical => stats::mean(&returns)
                .ok_or_else(|| InsufficientData::too_few(1, 0))
                .and_then(finite)?,
            DriftModel::Zero => 0.0,
        };

        Ok(Self {
            start,
            drift,
            volatility,
        })
    }

    /// Log-price increment per step, before the random shock.
    fn log_drift(&self) -> f64 {
        self.drift - 0.5 * self.volatility * self.volatility
    }

    fn step(&self, price: f64, rng: &mut StdRng) -> f64 {
        let z: f64 = StandardNormal.sample(rng);
        price * (self.log_drift() + self.volatility * z).exp()
    }

    fn final_price(&self, steps: usize, seed: u64) -> f64 {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..steps).fold(self.start, |price, _| self.step(price, &mut rng))
    }

    fn touches(&self, target: f64, direction: Direction, horizon: usize, seed: u64) -> bool {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut price = self.start;
        for _ in 0..horizon {
            price = self.step(price, &mut rng);
            let hit = match direction {
                Direction::Up => price >= target,
                Direction::Down => price <= target,
            };
            if hit {
                return true;
            }
        }
        false
    }
}

fn master_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

fn path_seeds<R: Rng + ?Sized>(rng: &mut R, paths: usize) -> Vec<u64> {
    (0..paths).map(|_| rng.random()).collect()
}

fn check_params(params: &SimulationParams) -> Result<(), AnalyticsError> {
    if params.paths == 0 {
        return Err(AnalyticsError::invalid("paths", "must be positive"));
    }
    if params.steps == 0 {
        return Err(AnalyticsError::invalid("steps", "must be positive"));
    }
    Ok(())
}

/// Projects `params.steps` rows ahead, seeded from `params.seed` when set.
pub fn simulate(
    window: &WorkingWindow<'_>,
    params: &SimulationParams,
) -> Result<Outcome<SimulationSummary>, AnalyticsError> {
    simulate_with_rng(window, params, &mut master_rng(params.seed))
}

/// Same as [`simulate`] with the master random source supplied by the caller.
pub fn simulate_with_rng<R: Rng + ?Sized>(
    window: &WorkingWindow<'_>,
    params: &SimulationParams,
    rng: &mut R,
) -> Result<Outcome<SimulationSummary>, AnalyticsError> {
    check_params(params)?;

    let model = match WalkModel::estimate(window, params.drift) {
        Ok(model) => model,
        Err(missing) => return Ok(Err(missing)),
    };

    let seeds = path_seeds(rng, params.paths);
    let finals: Vec<f64> = seeds
        .par_iter()
        .map(|&seed| model.final_price(params.steps, seed))
        .collect();

    Ok(summarize(&model, params, &finals))
}

fn summarize(
    model: &WalkModel,
    params: &SimulationParams,
    finals: &[f64],
) -> Outcome<SimulationSummary> {
    let sorted = stats::sorted(finals);
    let mean = stats::mean(finals)
        .ok_or_else(|| InsufficientData::too_few(1, 0))
        .and_then(finite)?;
    let std_dev = finite(stats::sample_std(finals).unwrap_or(0.0))?;
    let p10 = stats::percentile(&sorted, 10.0)
        .ok_or_else(|| InsufficientData::too_few(1, 0))
        .and_then(finite)?;
    let p90 = stats::percentile(&sorted, 90.0)
        .ok_or_else(|| InsufficientData::too_few(1, 0))
        .and_then(finite)?;

    let summary = SimulationSummary {
        start_price: model.start,
        drift: model.drift,
        volatility: model.volatility,
        paths: params.paths,
        steps: params.steps,
        mean,
        std_dev,
        p10,
        p90,
    };

    tracing::debug!(
        paths = summary.paths,
        steps = summary.steps,
        mean = summary.mean,
        p10 = summary.p10,
        p90 = summary.p90,
        "Monte Carlo simulation complete."
    );

    Ok(summary)
}

/// Probability that the price touches `target` within `horizon` rows.
///
/// The direction is upward when the target is at or above the last close.
pub fn probability_of_target(
    window: &WorkingWindow<'_>,
    target: f64,
    horizon: usize,
    params: &SimulationParams,
) -> Result<Outcome<TargetProbability>, AnalyticsError> {
    probability_of_target_with_rng(window, target, horizon, params, &mut master_rng(params.seed))
}

pub fn probability_of_target_with_rng<R: Rng + ?Sized>(
    window: &WorkingWindow<'_>,
    target: f64,
    horizon: usize,
    params: &SimulationParams,
    rng: &mut R,
) -> Result<Outcome<TargetProbability>, AnalyticsError> {
    if horizon == 0 {
        return Err(AnalyticsError::invalid("horizon", "must be at least one row"));
    }
    if !target.is_finite() || target <= 0.0 {
        return Err(AnalyticsError::invalid(
            "target",
            format!("{target} is not a positive price"),
        ));
    }
    check_params(params)?;

    let model = match WalkModel::estimate(window, params.drift) {
        Ok(model) => model,
        Err(missing) => return Ok(Err(missing)),
    };
    let direction = if target >= model.start {
        Direction::Up
    } else {
        Direction::Down
    };

    let seeds = path_seeds(rng, params.paths);
    let hits = seeds
        .par_iter()
        .filter(|&&seed| model.touches(target, direction, horizon, seed))
        .count();
    let probability = hits as f64 / params.paths as f64;

    tracing::debug!(
        symbol = window.symbol(),
        target,
        horizon,
        ?direction,
        probability,
        "Target probability computed."
    );

    Ok(Ok(TargetProbability {
        target,
        horizon,
        direction,
        probability,
    }))
}

/// Share of the window's returns at or beyond `threshold_pct` percent in `direction`.
///
/// Upward moves count returns `>= threshold`, downward moves count returns
/// `<= -threshold`.
pub fn historical_hit_ratio(
    window: &WorkingWindow<'_>,
    threshold_pct: f64,
    direction: Direction,
    timeline: ReturnTimeline,
) -> Result<Outcome<HitRatio>, AnalyticsError> {
    if !threshold_pct.is_finite() || threshold_pct <= 0.0 {
        return Err(AnalyticsError::invalid(
            "threshold_pct",
            format!("{threshold_pct} is not a positive percentage"),
        ));
    }

    let returns = window.returns_for(timeline).values();
    if let Err(missing) = require(1, returns.len()) {
        return Ok(Err(missing));
    }

    let threshold = threshold_pct / 100.0;
    let occurrences = returns
        .iter()
        .filter(|&&r| match direction {
            Direction::Up => r >= threshold,
            Direction::Down => r <= -threshold,
        })
        .count();
    let observations = returns.len();
    let probability = occurrences as f64 / observations as f64;
    let one_in =
        (occurrences > 0).then(|| (observations as f64 / occurrences as f64).round() as u64);

    tracing::debug!(
        symbol = window.symbol(),
        threshold_pct,
        ?direction,
        ?timeline,
        occurrences,
        observations,
        "Historical hit ratio computed."
    );

    Ok(Ok(HitRatio {
        threshold_pct,
        direction,
        timeline,
        occurrences,
        observations,
        probability,
        one_in,
    }))
}
