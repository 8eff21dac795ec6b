//! Shared error taxonomy for the indexer (see spec §7).
//!
//! Every fallible operation in the core — RPC calls, store writes, worker
//! iterations — eventually reports one of four kinds. The kind, not the
//! underlying cause, is what callers branch on: it determines whether to
//! retry immediately, back off, abandon the unit of work, or restart the
//! worker loop.

use std::fmt;

/// The four error kinds from spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Timeouts, 5xx, connection resets, DB serialization failures. Retry
    /// with a short back-off; the worker stays `running`.
    Transient,
    /// All endpoints are down, or rate-limited. Caller sleeps (CL: 5 min,
    /// EL: 1 s) before trying again.
    Exhausted,
    /// Wrong chain id, malformed response, or an invariant violation.
    /// The endpoint or gap is marked accordingly; the worker continues.
    PermanentData,
    /// DB connectivity lost, required config missing. The worker
    /// transitions to `error` and restarts its loop after a delay; the
    /// process never crashes.
    Fatal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Transient => "transient",
            ErrorKind::Exhausted => "exhausted",
            ErrorKind::PermanentData => "permanent_data",
            ErrorKind::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// The indexer's top-level error type. Every crate-local error type
/// (`RpcError`, `StoreError`, ...) converts into this one at the boundary
/// where a worker decides how to react.
#[derive(Debug, thiserror::Error)]
#[error("{kind}: {context}")]
pub struct IndexerError {
    kind: ErrorKind,
    context: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl IndexerError {
    pub fn new(kind: ErrorKind, context: impl Into<String>) -> Self {
        Self { kind, context: context.into(), source: None }
    }

    pub fn with_source(
        kind: ErrorKind,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self { kind, context: context.into(), source: Some(Box::new(source)) }
    }

    pub fn transient(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, context)
    }

    pub fn exhausted(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exhausted, context)
    }

    pub fn permanent_data(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermanentData, context)
    }

    pub fn fatal(context: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, context)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_transient(&self) -> bool {
        self.kind == ErrorKind::Transient
    }

    pub fn is_exhausted(&self) -> bool {
        self.kind == ErrorKind::Exhausted
    }

    pub fn is_permanent_data(&self) -> bool {
        self.kind == ErrorKind::PermanentData
    }

    pub fn is_fatal(&self) -> bool {
        self.kind == ErrorKind::Fatal
    }
}

pub type Result<T, E = IndexerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = IndexerError::exhausted("all EL endpoints down");
        assert_eq!(err.kind(), ErrorKind::Exhausted);
        assert_eq!(err.to_string(), "exhausted: all EL endpoints down");
    }

    #[test]
    fn with_source_preserves_cause() {
        let cause = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = IndexerError::with_source(ErrorKind::Transient, "rpc call", cause);
        assert!(err.is_transient());
        assert!(std::error::Error::source(&err).is_some());
    }
}
