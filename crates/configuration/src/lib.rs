use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use settings::{
    AnalysisParams, AtrSmoothing, Config, CorrelationKind, CorrelationParams, DescriptiveParams,
    DriftModel, DynamicsParams, GroupDefinition, ReferenceDefinition, RiskParams,
    SimulationParams,
};

/// Loads the application configuration from the `config.toml` file.
///
/// This function is the primary entry point for this crate. It reads the configuration file,
/// deserializes it into our strongly-typed `Config` struct, validates it, and returns it.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Loads and validates the configuration from an explicit path.
///
/// `MARKETLENS__` prefixed environment variables override file values, using `__` as the
/// section separator (e.g. `MARKETLENS__ANALYSIS__SIMULATION__PATHS=5000`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix("MARKETLENS")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Config` struct
    let config = builder.try_deserialize::<Config>()?;
    config.validate()?;

    tracing::info!(
        path = %path.display(),
        groups = config.groups.len(),
        "Configuration loaded."
    );

    Ok(config)
}
