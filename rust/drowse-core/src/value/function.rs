use super::Scalar;
use crate::error::EngineError;
use std::any::Any;
use std::sync::Arc;

/// Something a script can call: a closure, a bound function wrapper or a
/// host-side callback. `message` is the name a caller sends along with the
/// call (for example an interface method name); plain calls pass `None`.
pub trait ScriptFunction: Send + Sync {
    fn call(&self, message: Option<&str>, args: Vec<Scalar>) -> Result<Scalar, EngineError>;

    fn describe(&self) -> String {
        "&closure".to_string()
    }

    fn as_any(&self) -> &dyn Any;
}

pub type ClosureRef = Arc<dyn ScriptFunction>;
