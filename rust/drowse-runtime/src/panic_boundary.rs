//! Panic boundary around host code.
//!
//! Host methods, proxies and background work are foreign to the engine. A
//! panic in any of them must not unwind through the evaluator, so each call
//! site wraps the foreign call in [`catch_panic`] (or [`with_panic_boundary`]
//! when the caller picks a policy) and turns the payload into a fatal
//! engine fault.
//!
//! ```rust
//! use drowse_runtime::panic_boundary::{catch_panic, with_panic_boundary, PanicPolicy};
//!
//! assert!(catch_panic(|| panic!("host bug")).is_err());
//! assert_eq!(with_panic_boundary(PanicPolicy::CatchAndReturn, || 5).unwrap(), 5);
//! ```

use drowse_core::EngineError;
use std::any::Any;
use std::fmt;
use std::panic::UnwindSafe;

/// A caught panic with its message extracted from the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    message: String,
}

impl PanicError {
    pub fn from_payload(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        PanicError { message }
    }

    pub fn new(message: impl Into<String>) -> Self {
        PanicError {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

impl From<PanicError> for EngineError {
    fn from(err: PanicError) -> Self {
        EngineError::Fatal(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PanicPolicy {
    /// Return the panic as `Err`.
    #[default]
    CatchAndReturn,
    /// Return the panic as `Err` and log it.
    LogAndContinue,
    /// Let the panic unwind. Useful when debugging a host class.
    Propagate,
}

pub fn catch_panic<T>(f: impl FnOnce() -> T + UnwindSafe) -> Result<T, PanicError> {
    std::panic::catch_unwind(f).map_err(PanicError::from_payload)
}

pub fn with_panic_boundary<T>(
    policy: PanicPolicy,
    f: impl FnOnce() -> T + UnwindSafe,
) -> Result<T, PanicError> {
    match policy {
        PanicPolicy::CatchAndReturn => catch_panic(f),
        PanicPolicy::LogAndContinue => catch_panic(f).map_err(|e| {
            tracing::error!(panic = e.message(), "caught panic in host code");
            e
        }),
        PanicPolicy::Propagate => Ok(f()),
    }
}

/// Run a fallible host call, folding a panic into [`EngineError::Fatal`].
pub fn guard_host_call<T>(
    f: impl FnOnce() -> Result<T, EngineError> + UnwindSafe,
) -> Result<T, EngineError> {
    catch_panic(f)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn str_and_string_payloads() {
        let err = catch_panic(|| -> i32 { panic!("boom") }).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "host panic: boom");
        let err = catch_panic(|| -> i32 { panic!("{}", String::from("formatted")) }).unwrap_err();
        assert_eq!(err.message(), "formatted");
    }

    #[test]
    fn unknown_payload() {
        let err = catch_panic(|| -> i32 { std::panic::panic_any(42_i32) }).unwrap_err();
        assert_eq!(err.message(), "unknown panic payload");
    }

    #[test]
    fn log_policy_still_returns_err() {
        let result = with_panic_boundary(PanicPolicy::LogAndContinue, || -> u8 { panic!("logged") });
        assert!(result.is_err());
    }

    #[test]
    fn host_panic_becomes_fatal() {
        let result: Result<(), EngineError> = guard_host_call(|| panic!("host exploded"));
        match result {
            Err(err) => {
                assert!(err.is_fatal());
                assert!(err.to_string().contains("host exploded"));
            }
            Ok(_) => panic!("expected a fatal fault"),
        }
    }

    #[test]
    fn host_errors_pass_through() {
        let result: Result<i32, EngineError> =
            guard_host_call(|| Err(EngineError::runtime("no such method")));
        assert!(!result.unwrap_err().is_fatal());
    }
}
