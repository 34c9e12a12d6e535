use configuration::error::ConfigError;
use core_types::CoreError;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Hard failures surfaced to the caller. Only invalid parameters end up here;
/// a statistic that cannot be computed is reported as [`InsufficientData`].
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Core(#[from] CoreError),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("Unknown asset group '{0}'")]
    UnknownGroup(String),

    #[error("Asset group error: {0}")]
    Group(String),
}

impl AnalyticsError {
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

/// Why a statistic could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Shortfall {
    TooFewObservations { required: usize, actual: usize },
    ZeroVariance,
    ZeroDenominator,
    EmptyAlignment,
    NonFinite,
}

impl fmt::Display for Shortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shortfall::TooFewObservations { required, actual } => {
                write!(f, "needs {required} observations, got {actual}")
            }
            Shortfall::ZeroVariance => f.write_str("zero variance"),
            Shortfall::ZeroDenominator => f.write_str("zero denominator"),
            Shortfall::EmptyAlignment => f.write_str("no shared timestamps"),
            Shortfall::NonFinite => f.write_str("non-finite result"),
        }
    }
}

/// The typed "Insufficient Data" sentinel.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[error("Insufficient Data ({reason})")]
pub struct InsufficientData {
    pub reason: Shortfall,
}

impl InsufficientData {
    /// The label every consumer must show in place of a missing value.
    pub const LABEL: &'static str = "Insufficient Data";

    pub fn too_few(required: usize, actual: usize) -> Self {
        Self {
            reason: Shortfall::TooFewObservations { required, actual },
        }
    }

    pub fn zero_variance() -> Self {
        Self {
            reason: Shortfall::ZeroVariance,
        }
    }

    pub fn zero_denominator() -> Self {
        Self {
            reason: Shortfall::ZeroDenominator,
        }
    }

    pub fn empty_alignment() -> Self {
        Self {
            reason: Shortfall::EmptyAlignment,
        }
    }

    pub fn non_finite() -> Self {
        Self {
            reason: Shortfall::NonFinite,
        }
    }
}

/// A statistic, or the reason it is missing.
pub type Outcome<T> = Result<T, InsufficientData>;

/// Fails with [`Shortfall::TooFewObservations`] when `actual < required`.
pub fn require(required: usize, actual: usize) -> Outcome<()> {
    if actual < required {
        Err(InsufficientData::too_few(required, actual))
    } else {
        Ok(())
    }
}

/// Converts NaN or infinite values into the sentinel.
pub fn finite(value: f64) -> Outcome<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(InsufficientData::non_finite())
    }
}
