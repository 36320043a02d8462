use std::path::Path;

use clap::{Arg, Command};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};

use super::{Config, ConfigRaw, defaults, env::apply_env_overrides};
use crate::config::ConfigError;

pub(crate) fn initialize_configuration() -> Result<Config, ConfigError> {
    // Parse CLI arguments for custom config file
    let matches = Command::new("Keyserver Export Server")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file (.toml format)"),
        )
        .get_matches();

    let custom_config_path = matches.get_one::<String>("config").map(String::as_str);
    load_configuration(custom_config_path, |name| std::env::var(name).ok())
}

pub(crate) fn load_configuration(
    custom_config_path: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    // Build configuration with layered sources (priority: lowest to highest)
    let mut figment = Figment::from(Serialized::defaults(defaults::config()));

    // User overrides from config.toml
    if Path::new("config.toml").exists() {
        figment = figment.merge(Toml::file("config.toml"));
    }

    // If custom config file is provided, merge it with highest priority
    if let Some(config_path) = custom_config_path {
        if !Path::new(config_path).exists() {
            return Err(ConfigError::InvalidConfig(format!(
                "config file {} does not exist",
                config_path
            )));
        }
        figment = figment.merge(Toml::file(config_path));
    }

    let mut config: ConfigRaw = figment.extract().map_err(Box::new)?;
    apply_env_overrides(&mut config, lookup)?;

    config.resolve()
}
