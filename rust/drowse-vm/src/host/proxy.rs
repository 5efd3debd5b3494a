use super::marshal::{from_host, to_host};
use super::registry::HostRegistry;
use super::types::{HostFault, HostType, HostValue};
use drowse_core::value::HostObject;
use drowse_core::{ClosureRef, EngineError};
use std::any::Any;
use std::sync::{Arc, Weak};

/// A script closure standing in for a host interface. Every interface
/// method call reaches the closure with the method name as its message.
pub struct ClosureProxy {
    closure: ClosureRef,
    interface: String,
    registry: Weak<HostRegistry>,
}

impl ClosureProxy {
    pub fn new(closure: ClosureRef, interface: &str, registry: &Arc<HostRegistry>) -> Self {
        ClosureProxy {
            closure,
            interface: interface.to_string(),
            registry: Arc::downgrade(registry),
        }
    }

    pub fn closure(&self) -> &ClosureRef {
        &self.closure
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn invoke(&self, method: &str, args: Vec<HostValue>) -> Result<HostValue, HostFault> {
        let registry = self
            .registry
            .upgrade()
            .ok_or_else(|| HostFault::Fatal("host registry was dropped".into()))?;
        let returns = registry
            .lookup(&self.interface)
            .and_then(|class| {
                class
                    .methods()
                    .iter()
                    .find(|m| m.name == method && m.params.len() == args.len())
                    .map(|m| m.returns.clone())
            })
            .unwrap_or(HostType::Object);

        let args = args.into_iter().map(from_host).collect();
        let result = self.closure.call(Some(method), args).map_err(|err| match err {
            EngineError::Thrown(value) => HostFault::Thrown(value.as_string()),
            EngineError::TaintViolation(message) => HostFault::TaintViolation(message),
            err if err.is_fatal() => HostFault::Fatal(err.to_string()),
            err => HostFault::Thrown(err.to_string()),
        })?;
        to_host(&result, &returns, &registry)
    }
}

impl HostObject for ClosureProxy {
    fn type_name(&self) -> &str {
        &self.interface
    }

    fn describe(&self) -> String {
        format!("{} proxy for {}", self.interface, self.closure.describe())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
