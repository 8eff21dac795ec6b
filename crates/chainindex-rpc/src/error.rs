use chainindex_errors::IndexerError;

/// Error taxonomy local to the RPC layer (spec §7), rolled up into
/// [`IndexerError`] at the point a worker consumes the result.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    #[error("transient RPC error: {0}")]
    Transient(String),
    #[error("no healthy endpoint available: {0}")]
    Exhausted(String),
    #[error("permanent RPC data error: {0}")]
    PermanentData(String),
}

impl From<RpcError> for IndexerError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Transient(msg) => IndexerError::transient(msg),
            RpcError::Exhausted(msg) => IndexerError::exhausted(msg),
            RpcError::PermanentData(msg) => IndexerError::permanent_data(msg),
        }
    }
}
