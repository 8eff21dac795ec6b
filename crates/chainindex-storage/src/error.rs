use chainindex_errors::IndexerError;

/// Error taxonomy local to the storage layer (spec §7), rolled up into
/// [`IndexerError`] at the point a worker consumes the result. A bare
/// `sqlx::Error` is treated as transient (connection drop, pool
/// exhaustion, statement timeout) unless it's a constraint violation,
/// which is a logic bug and therefore fatal.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("transient storage error: {0}")]
    Transient(#[source] sqlx::Error),
    #[error("storage invariant violated: {0}")]
    Fatal(String),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_check_violation() || db_err.is_unique_violation() => {
                StoreError::Fatal(format!("constraint violation: {db_err}"))
            }
            _ => StoreError::Transient(err),
        }
    }
}

impl From<StoreError> for IndexerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transient(source) => IndexerError::with_source(
                chainindex_errors::ErrorKind::Transient,
                "storage call failed",
                source,
            ),
            StoreError::Fatal(context) => IndexerError::fatal(context),
            StoreError::Migration(source) => {
                IndexerError::with_source(chainindex_errors::ErrorKind::Fatal, "migration failed", source)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
