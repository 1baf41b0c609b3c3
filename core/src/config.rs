//! Configuration Management Module
//!
//! Settings are assembled once at process start from built-in defaults, an
//! optional TOML file, and the process environment (in that order of
//! precedence, lowest first). The resulting [`Settings`] value is passed by
//! reference to the training workflow, the inference service and the client.

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File, Map};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::SettingsError;
use crate::ml_integration::trainer::ForestParams;

pub const DEFAULT_MODEL_NAME: &str = "titanic-classifier";
pub const DEFAULT_DATA_URL: &str =
    "https://raw.githubusercontent.com/datasciencedojo/datasets/master/titanic.csv";
pub const DEFAULT_REGISTRY_URL: &str = "sqlite://mlruns/registry.db";
pub const DEFAULT_ARTIFACT_ROOT: &str = "mlruns/artifacts";
pub const DEFAULT_EXPERIMENT_NAME: &str = "Titanic-Survival";
pub const DEFAULT_API_BASE_URL: &str = "http://api:8086";

/// Environment variables read as configuration keys. Anything else in the
/// process environment is ignored.
pub const ENV_KEYS: [&str; 12] = [
    "MODEL_NAME",
    "TITANIC_DATA_URL",
    "REGISTRY_URL",
    "ARTIFACT_ROOT",
    "EXPERIMENT_NAME",
    "API_HOST",
    "API_PORT",
    "API_BASE_URL",
    "MODEL_CACHE_TTL_SECS",
    "RANDOM_SEED",
    "TEST_SIZE",
    "N_ESTIMATORS",
];

/// Process-wide settings shared by training, serving and the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Registered model name used by training and inference
    pub model_name: String,
    /// Dataset source, an http(s) URL or a local path
    pub titanic_data_url: String,
    /// Registry location (`sqlite://...` or `memory://`)
    pub registry_url: String,
    /// Root directory for run artifacts
    pub artifact_root: PathBuf,
    /// Experiment recorded on every run
    pub experiment_name: String,
    pub api_host: String,
    pub api_port: u16,
    /// Inference service location used by the client
    pub api_base_url: String,
    /// Lifetime of a resolved model in the inference cache; 0 disables caching
    pub model_cache_ttl_secs: u64,
    pub random_seed: u64,
    /// Fraction of rows held out for the test partition
    pub test_size: f64,
    /// Number of trees in the forest
    pub n_estimators: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_name: DEFAULT_MODEL_NAME.to_string(),
            titanic_data_url: DEFAULT_DATA_URL.to_string(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            artifact_root: PathBuf::from(DEFAULT_ARTIFACT_ROOT),
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            api_host: "0.0.0.0".to_string(),
            api_port: 8086,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            model_cache_ttl_secs: 30,
            random_seed: 42,
            test_size: 0.2,
            n_estimators: 200,
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional file and the environment.
    pub fn load(file: Option<&Path>) -> Result<Self, SettingsError> {
        let mut builder = Self::defaults_builder()?;
        if let Some(path) = file {
            debug!("Loading configuration file: {}", path.display());
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(environment_source(std::env::vars()));
        Self::from_builder(builder)
    }

    /// A builder pre-populated with the default value of every key.
    pub fn defaults_builder() -> Result<ConfigBuilder<DefaultState>, SettingsError> {
        let defaults = Self::default();
        let builder = Config::builder()
            .set_default("model_name", defaults.model_name)?
            .set_default("titanic_data_url", defaults.titanic_data_url)?
            .set_default("registry_url", defaults.registry_url)?
            .set_default(
                "artifact_root",
                defaults.artifact_root.to_string_lossy().into_owned(),
            )?
            .set_default("experiment_name", defaults.experiment_name)?
            .set_default("api_host", defaults.api_host)?
            .set_default("api_port", i64::from(defaults.api_port))?
            .set_default("api_base_url", defaults.api_base_url)?
            .set_default("model_cache_ttl_secs", defaults.model_cache_ttl_secs as i64)?
            .set_default("random_seed", defaults.random_seed as i64)?
            .set_default("test_size", defaults.test_size)?
            .set_default("n_estimators", defaults.n_estimators as i64)?;
        Ok(builder)
    }

    /// Build and validate settings from an assembled builder.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, SettingsError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.model_name.trim().is_empty() {
            return Err(SettingsError::Invalid("model_name must not be empty".into()));
        }
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(SettingsError::Invalid(format!(
                "test_size must lie strictly between 0 and 1, got {}",
                self.test_size
            )));
        }
        if self.n_estimators == 0 {
            return Err(SettingsError::Invalid(
                "n_estimators must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn model_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.model_cache_ttl_secs)
    }

    pub fn forest_params(&self) -> ForestParams {
        ForestParams {
            n_estimators: self.n_estimators,
            max_depth: None,
            seed: self.random_seed,
        }
    }
}

/// Environment source restricted to [`ENV_KEYS`].
///
/// Orchestrator service links (`API_PORT=tcp://10.0.0.1:8086` for a service
/// named `api`) share key names with ours and are skipped.
pub fn environment_source<I>(vars: I) -> Environment
where
    I: IntoIterator<Item = (String, String)>,
{
    let accepted: Map<String, String> = vars
        .into_iter()
        .filter(|(key, _)| ENV_KEYS.contains(&key.as_str()))
        .filter(|(key, value)| {
            let service_link = value.contains("://") && (key == "API_PORT" || key == "API_HOST");
            if service_link {
                warn!("Ignoring {}={}: looks like a service link", key, value);
            }
            !service_link
        })
        .collect();
    Environment::default().source(Some(accepted))
}
