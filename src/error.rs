use thiserror::Error;

/// Top-level application error that composes all subsystem errors
#[derive(Error, Debug)]
pub(crate) enum AppError {
    /// Configuration could not be loaded or is invalid
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Database/repository errors
    #[error("Repository error: {0}")]
    Repository(#[from] keyserver_repository::RepositoryError),
}
