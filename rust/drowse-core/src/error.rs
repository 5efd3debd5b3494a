//! Engine fault type shared by every crate in the workspace.

use crate::value::Scalar;
use strum::{AsRefStr, Display};
use thiserror::Error;

/// Closed set of categories a native fault is classified into when it is
/// caught at a block boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum FaultKind {
    #[strum(serialize = "bad index")]
    BadIndex,
    #[strum(serialize = "bad cast")]
    BadCast,
    #[strum(serialize = "null dereference")]
    NullDereference,
    #[strum(serialize = "concurrent modification")]
    ConcurrentModification,
    #[strum(serialize = "runtime")]
    Runtime,
    #[strum(serialize = "fatal")]
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum EngineError {
    #[error("index out of bounds: {0}")]
    BadIndex(String),
    #[error("bad cast: {0}")]
    BadCast(String),
    #[error("null dereference: {0}")]
    NullDereference(String),
    #[error("concurrent modification: {0}")]
    ConcurrentModification(String),
    #[error("{0}")]
    Runtime(String),
    #[error("fatal: {0}")]
    Fatal(String),
    #[error("taint violation: {0}")]
    TaintViolation(String),
    #[error("operation timed out after {0} ms")]
    Timeout(u64),
    /// A script-level throw travelling through a native call boundary.
    #[error("uncaught exception: {0}")]
    Thrown(Scalar),
}

impl EngineError {
    pub fn runtime(message: impl Into<String>) -> Self {
        EngineError::Runtime(message.into())
    }

    pub fn bad_cast(message: impl Into<String>) -> Self {
        EngineError::BadCast(message.into())
    }

    /// Category of a native fault. `None` for a script throw.
    pub fn kind(&self) -> Option<FaultKind> {
        match self {
            EngineError::BadIndex(_) => Some(FaultKind::BadIndex),
            EngineError::BadCast(_) => Some(FaultKind::BadCast),
            EngineError::NullDereference(_) => Some(FaultKind::NullDereference),
            EngineError::ConcurrentModification(_) => Some(FaultKind::ConcurrentModification),
            EngineError::Runtime(_) | EngineError::Timeout(_) => Some(FaultKind::Runtime),
            EngineError::Fatal(_) | EngineError::TaintViolation(_) => Some(FaultKind::Fatal),
            EngineError::Thrown(_) => None,
        }
    }

    /// Fatal faults and taint violations are never converted into script
    /// throws; they are re-raised after cleanup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Fatal(_) | EngineError::TaintViolation(_))
    }

    /// The value a script `catch` receives for this fault.
    pub fn to_scalar(&self) -> Scalar {
        match self {
            EngineError::Thrown(value) => value.clone(),
            other => Scalar::string(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fault_kind_display() {
        assert_eq!(FaultKind::BadIndex.to_string(), "bad index");
        assert_eq!(FaultKind::ConcurrentModification.as_ref(), "concurrent modification");
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Fatal("boom".into()).is_fatal());
        assert!(EngineError::TaintViolation("exec".into()).is_fatal());
        assert!(!EngineError::runtime("oops").is_fatal());
        assert_eq!(EngineError::Timeout(10).kind(), Some(FaultKind::Runtime));
        assert_eq!(EngineError::Thrown(Scalar::int(1)).kind(), None);
    }

    #[test]
    fn test_thrown_scalar_round_trips() {
        let err = EngineError::Thrown(Scalar::int(5));
        assert_eq!(err.to_scalar().as_int(), 5);
        let err = EngineError::BadCast("not a number".into());
        assert_eq!(err.to_scalar().as_string(), "bad cast: not a number");
    }
}
