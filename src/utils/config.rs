use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::algorithms::engine::EngineConfig;
use crate::algorithms::solver::SolverConfig;
use crate::core::{MIN_RECEIVERS, SPEED_OF_LIGHT};

/// Locator configuration, loadable from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Signal propagation speed (m/s)
    pub signal_speed_m_s: f64,
    /// Minimum distinct receivers per emission, used for grouping and solving
    pub min_receivers: usize,
    /// Report non-convergence as an error instead of a flagged estimate
    pub strict_convergence: bool,
    /// Levenberg-Marquardt tolerances and limits
    pub solver: SolverConfig,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            signal_speed_m_s: SPEED_OF_LIGHT,
            min_receivers: MIN_RECEIVERS,
            strict_convergence: false,
            solver: SolverConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid parameter `{parameter}` = {value}: {reason}")]
    InvalidParameter { parameter: &'static str, value: String, reason: &'static str },
    #[error("configuration file I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("configuration file is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LocatorConfig {
    /// Load and validate a configuration file. Missing keys take defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: LocatorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Check every parameter against its valid range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.signal_speed_m_s.is_finite() && self.signal_speed_m_s > 0.0) {
            return Err(invalid("signal_speed_m_s", self.signal_speed_m_s, "must be a positive finite speed"));
        }
        if self.min_receivers < MIN_RECEIVERS {
            return Err(invalid("min_receivers", self.min_receivers, "at least 3 receivers are needed for a 2D fix"));
        }

        let solver = &self.solver;
        if solver.max_iterations == 0 {
            return Err(invalid("solver.max_iterations", solver.max_iterations, "must be positive"));
        }
        if solver.max_singular_iterations == 0 {
            return Err(invalid("solver.max_singular_iterations", solver.max_singular_iterations, "must be positive"));
        }
        let tolerances = [
            ("solver.gradient_tolerance", solver.gradient_tolerance),
            ("solver.step_tolerance", solver.step_tolerance),
            ("solver.cost_tolerance", solver.cost_tolerance),
            ("solver.residual_tolerance", solver.residual_tolerance),
            ("solver.rank_tolerance", solver.rank_tolerance),
            ("solver.collinearity_tolerance", solver.collinearity_tolerance),
        ];
        for (parameter, value) in tolerances {
            if !(value.is_finite() && value >= 0.0) {
                return Err(invalid(parameter, value, "must be a non-negative finite number"));
            }
        }
        if !(solver.initial_damping.is_finite() && solver.initial_damping > 0.0) {
            return Err(invalid("solver.initial_damping", solver.initial_damping, "must be positive"));
        }

        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            min_receivers: self.min_receivers,
            strict_convergence: self.strict_convergence,
            solver: self.solver.clone(),
        }
    }
}

fn invalid<T: ToString>(parameter: &'static str, value: T, reason: &'static str) -> ConfigError {
    ConfigError::InvalidParameter { parameter, value: value.to_string(), reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LocatorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.signal_speed_m_s, SPEED_OF_LIGHT);
        assert_eq!(config.engine_config().solver.max_iterations, 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: LocatorConfig =
            serde_json::from_str(r#"{ "min_receivers": 4, "solver": { "max_iterations": 25 } }"#).unwrap();
        assert_eq!(config.min_receivers, 4);
        assert_eq!(config.solver.max_iterations, 25);
        assert_eq!(config.solver.rank_tolerance, SolverConfig::default().rank_tolerance);
        assert_eq!(config.signal_speed_m_s, SPEED_OF_LIGHT);
    }

    #[test]
    fn test_invalid_parameters() {
        let slow = LocatorConfig { signal_speed_m_s: 0.0, ..LocatorConfig::default() };
        assert!(matches!(slow.validate(), Err(ConfigError::InvalidParameter { parameter: "signal_speed_m_s", .. })));

        let few = LocatorConfig { min_receivers: 2, ..LocatorConfig::default() };
        assert!(few.validate().is_err());

        let mut bad_solver = LocatorConfig::default();
        bad_solver.solver.step_tolerance = f64::NAN;
        assert!(matches!(
            bad_solver.validate(),
            Err(ConfigError::InvalidParameter { parameter: "solver.step_tolerance", .. })
        ));
    }

    #[test]
    fn test_config_file_round_trip() {
        let path = std::env::temp_dir().join(format!("tdoa-locator-config-{}.json", std::process::id()));
        let config = LocatorConfig {
            min_receivers: 5,
            strict_convergence: true,
            ..LocatorConfig::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = LocatorConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file() {
        let result = LocatorConfig::load_from_file("/nonexistent/tdoa-locator.json");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
