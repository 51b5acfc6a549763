use std::env;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{info, warn};

use mtx_tox_data::{repository::loader::load_store, MeasurementStore, RepositoryError};
use mtx_tox_domain::{DiagnosisEngine, DiagnosisError, EngineConfig, RuleParameters, WindowEndPolicy};

/// Server startup errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a number between 1 and 65535, got '{0}'")]
    InvalidPort(String),

    #[error("Unknown MTX_WINDOW_END '{0}', expected 'next_observation' or 'last_true_observation'")]
    InvalidWindowEnd(String),

    #[error("MTX_PARALLEL must be 'true', 'false', '1' or '0', got '{0}'")]
    InvalidParallel(String),

    #[error("Failed to load dataset: {0}")]
    Dataset(#[from] RepositoryError),

    #[error("Failed to read rule parameters from {path}: {message}")]
    Rules { path: String, message: String },

    #[error("Failed to build diagnosis engine: {0}")]
    Engine(#[from] DiagnosisError),
}

/// Runtime configuration, read from the environment
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,

    /// JSON array of measurement rows
    pub dataset_path: Option<PathBuf>,

    /// JSON `RuleParameters`; defaults are used when unset
    pub rules_path: Option<PathBuf>,

    pub environment: String,
    pub engine: EngineConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            dataset_path: None,
            rules_path: None,
            environment: "development".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read `PORT`, `MTX_DATASET_PATH`, `MTX_RULES_PATH`, `MTX_WINDOW_END`,
    /// `MTX_PARALLEL` and `APP_ENV`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|port| *port != 0)
                .ok_or(ConfigError::InvalidPort(raw))?,
            None => defaults.port,
        };

        let window_end = match lookup("MTX_WINDOW_END") {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "next_observation" => WindowEndPolicy::NextObservation,
                "last_true_observation" => WindowEndPolicy::LastTrueObservation,
                _ => return Err(ConfigError::InvalidWindowEnd(raw)),
            },
            None => defaults.engine.window_end,
        };

        let parallel = match lookup("MTX_PARALLEL") {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(ConfigError::InvalidParallel(raw)),
            },
            None => defaults.engine.parallel,
        };

        Ok(Self {
            port,
            dataset_path: lookup("MTX_DATASET_PATH").map(PathBuf::from),
            rules_path: lookup("MTX_RULES_PATH").map(PathBuf::from),
            environment: lookup("APP_ENV").unwrap_or(defaults.environment),
            engine: EngineConfig { window_end, parallel },
        })
    }

    /// Rule parameters from `rules_path`, or the defaults
    pub fn load_parameters(&self) -> Result<RuleParameters, ConfigError> {
        let Some(path) = &self.rules_path else {
            return Ok(RuleParameters::default());
        };

        let rules_error = |message: String| ConfigError::Rules {
            path: path.display().to_string(),
            message,
        };
        let raw = fs::read_to_string(path).map_err(|e| rules_error(e.to_string()))?;
        let parameters: RuleParameters = serde_json::from_str(&raw).map_err(|e| rules_error(e.to_string()))?;

        info!("Loaded rule parameters from {}", path.display());
        Ok(parameters)
    }

    /// Measurement store from `dataset_path`, or an empty one
    pub fn load_store(&self) -> Result<MeasurementStore, ConfigError> {
        match &self.dataset_path {
            Some(path) => Ok(load_store(path)?),
            None => {
                warn!("MTX_DATASET_PATH not set, starting with an empty dataset");
                Ok(MeasurementStore::new())
            }
        }
    }

    /// Load the dataset and parameters and run the first evaluation pass
    pub fn build_engine(&self) -> Result<DiagnosisEngine<MeasurementStore>, ConfigError> {
        let store = self.load_store()?;
        let parameters = self.load_parameters()?;
        Ok(DiagnosisEngine::new(store, parameters, self.engine)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn from_vars(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_unset_variables_use_defaults() {
        assert_eq!(from_vars(&[]).unwrap(), ServerConfig::default());
    }

    #[test]
    fn test_variables_are_parsed() {
        let config = from_vars(&[
            ("PORT", "8080"),
            ("MTX_WINDOW_END", "Last_True_Observation"),
            ("MTX_PARALLEL", "0"),
            ("MTX_DATASET_PATH", "/data/labs.json"),
            ("APP_ENV", "production"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.engine.window_end, WindowEndPolicy::LastTrueObservation);
        assert!(!config.engine.parallel);
        assert_eq!(config.dataset_path, Some(PathBuf::from("/data/labs.json")));
        assert_eq!(config.rules_path, None);
        assert_eq!(config.environment, "production");

        let config = from_vars(&[("MTX_PARALLEL", " TRUE "), ("MTX_WINDOW_END", "next_observation")]).unwrap();
        assert!(config.engine.parallel);
        assert_eq!(config.engine.window_end, WindowEndPolicy::NextObservation);
    }

    #[test]
    fn test_invalid_port_rejected() {
        for raw in ["abc", "0", "70000"] {
            assert!(
                matches!(from_vars(&[("PORT", raw)]), Err(ConfigError::InvalidPort(_))),
                "{}",
                raw
            );
        }
    }

    #[test]
    fn test_invalid_window_end_rejected() {
        assert!(matches!(
            from_vars(&[("MTX_WINDOW_END", "midpoint")]),
            Err(ConfigError::InvalidWindowEnd(_))
        ));
    }

    #[test]
    fn test_invalid_parallel_rejected() {
        for raw in ["yes", "ture", ""] {
            assert!(
                matches!(from_vars(&[("MTX_PARALLEL", raw)]), Err(ConfigError::InvalidParallel(_))),
                "{:?}",
                raw
            );
        }
    }

    #[test]
    fn test_default_config_builds_empty_engine() {
        let engine = ServerConfig::default().build_engine().unwrap();
        assert!(engine.repository().is_empty());
        assert_eq!(engine.catalog().len(), 7);
    }

    #[test]
    fn test_rules_file_is_loaded() {
        let path = env::temp_dir().join(format!("mtx_rules_{}.json", std::process::id()));
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(br#"{"neutropenia": {"concentration_bound": 1.0, "min_days": 5}}"#)
            .unwrap();

        let config = ServerConfig {
            rules_path: Some(path.clone()),
            ..ServerConfig::default()
        };
        let parameters = config.load_parameters().unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(parameters.neutropenia.concentration_bound, 1.0);
        assert_eq!(parameters.neutropenia.min_days, 5);
        assert_eq!(parameters.renal, RuleParameters::default().renal);
    }

    #[test]
    fn test_missing_rules_file_is_reported() {
        let config = ServerConfig {
            rules_path: Some(PathBuf::from("/nonexistent/mtx_rules.json")),
            ..ServerConfig::default()
        };
        assert!(matches!(config.load_parameters(), Err(ConfigError::Rules { .. })));
    }

    #[test]
    fn test_out_of_range_rules_rejected_at_build() {
        let path = env::temp_dir().join(format!("mtx_bad_rules_{}.json", std::process::id()));
        fs::write(&path, r#"{"renal": {"creatinine_bound": 5000.0}}"#).unwrap();

        let config = ServerConfig {
            rules_path: Some(path.clone()),
            ..ServerConfig::default()
        };
        let result = config.build_engine();
        fs::remove_file(&path).ok();

        assert!(matches!(
            result,
            Err(ConfigError::Engine(DiagnosisError::InvalidParameter(_)))
        ));
    }
}
