use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] Box<figment::Error>),

    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<keyserver_repository::ConfigError> for ConfigError {
    fn from(error: keyserver_repository::ConfigError) -> Self {
        match error {
            keyserver_repository::ConfigError::MissingSecret(message) => {
                Self::MissingSecret(message)
            }
            keyserver_repository::ConfigError::InvalidConfig(message) => {
                Self::InvalidConfig(message)
            }
        }
    }
}
