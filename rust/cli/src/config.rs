use descrint::EngineConfig;
use descrint_tracing::LogFilter;
use figment::providers::{Env, Format, Yaml};
use serde::Deserialize;

use crate::error::CliError;

pub const DEFAULT_CONFIG_PATH: &str = "./descrint.yaml";
const ENV_PREFIX: &str = "DESCRINT_";

#[derive(Debug, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub log_filters: Vec<LogFilter>,
}

impl CliConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Loads `path` if it exists, with `DESCRINT_` environment variables on
    /// top. `__` separates nesting levels, e.g. `DESCRINT_ENGINE__BATCH__STRATEGY`.
    pub fn load_from_path(path: &str) -> Result<Self, CliError> {
        // Unfortunately, figment doesn't support environment variables with underscores. So we have to map and replace them.
        let mut f = figment::Figment::from(
            Env::prefixed(ENV_PREFIX).map(|k| k.as_str().replace("__", ".").into()),
        );
        if std::path::Path::new(path).exists() {
            f = figment::Figment::from(Yaml::file(path)).merge(f);
        }
        let config = f.extract().map_err(Box::new)?;
        tracing::debug!(path, "Loaded configuration");
        Ok(config)
    }
}
