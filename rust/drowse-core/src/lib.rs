//! Drowse Core
//!
//! Shared value model, instruction tree and error types used by the runtime,
//! the VM and the command-line front end.

pub mod build;
pub mod error;
pub mod program;
pub mod tree;
pub mod value;

pub use error::{EngineError, FaultKind};
pub use program::Program;
pub use tree::{Block, Check, FlowKind, Fragment, Literal, Step, StepKind};
pub use value::{ArrayRef, ClosureRef, MapRef, ObjectRef, Scalar, ScalarValue};
