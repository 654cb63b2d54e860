use std::path::Path;

use clap::ValueEnum;
use config::{Config, File};
use relay_txstore::TxStoreConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CliConfig {
    #[serde(default)]
    pub store: TxStoreConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Deployment whose overrides are layered over the base file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Environment {
    #[default]
    Local,
    Development,
    Production,
}

impl Environment {
    fn config_filename(self) -> String {
        let name = self
            .to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_else(|| "local".to_string());
        format!("txstore_{name}.yaml")
    }
}

/// Layered configuration: `txstore_base.yaml`, then `txstore_<environment>.yaml`, then
/// `APP__`-prefixed environment variables. Missing files fall back to defaults.
pub fn get_config(
    configuration_directory: &Path,
    environment: Environment,
) -> anyhow::Result<CliConfig> {
    let config = Config::builder()
        .add_source(File::from(configuration_directory.join("txstore_base.yaml")).required(false))
        .add_source(
            File::from(configuration_directory.join(environment.config_filename()))
                .required(false),
        )
        .add_source(config::Environment::with_prefix("app").separator("__"))
        .build()?;

    Ok(config.try_deserialize::<CliConfig>()?)
}
