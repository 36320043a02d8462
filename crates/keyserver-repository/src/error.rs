use thiserror::Error;

/// Error types for repository/database operations
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database error - wraps all SeaORM errors
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),

    /// Database error annotated with the statement that failed
    #[error("{context}: {source}")]
    Query {
        context: String,
        #[source]
        source: sea_orm::DbErr,
    },

    /// Record not found error
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Named lock is held by someone else and has not expired
    #[error("Lock already in use: {0}")]
    AlreadyLocked(String),

    /// A stored row could not be mapped to its domain type
    #[error("Invalid stored data: {0}")]
    InvalidData(String),
}

impl RepositoryError {
    /// Short label used for metrics.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Database(_) | Self::Query { .. } => "error",
            Self::NotFound(_) => "not_found",
            Self::AlreadyLocked(_) => "locked",
            Self::InvalidData(_) => "invalid_data",
        }
    }
}

/// Convenient Result type alias for RepositoryError
pub type Result<T> = std::result::Result<T, RepositoryError>;

pub(crate) trait DbResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> DbResultExt<T> for std::result::Result<T, sea_orm::DbErr> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| RepositoryError::Query {
            context: context.into(),
            source,
        })
    }
}
