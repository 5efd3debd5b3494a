use super::Scalar;
use std::any::Any;
use std::sync::Arc;

/// An opaque value owned by the host. The bridge downcasts through
/// [`HostObject::as_any`] to reach the concrete type.
pub trait HostObject: Send + Sync {
    fn type_name(&self) -> &str;

    fn describe(&self) -> String {
        self.type_name().to_string()
    }

    fn as_any(&self) -> &dyn Any;
}

pub type ObjectRef = Arc<dyn HostObject>;

/// The pair produced by the `=>` operator.
#[derive(Debug, Clone)]
pub struct KeyValuePair {
    pub key: Scalar,
    pub value: Scalar,
}

impl KeyValuePair {
    pub fn new(key: Scalar, value: Scalar) -> Self {
        KeyValuePair { key, value }
    }

    pub fn into_object(self) -> ObjectRef {
        Arc::new(self)
    }
}

impl HostObject for KeyValuePair {
    fn type_name(&self) -> &str {
        "KeyValuePair"
    }

    fn describe(&self) -> String {
        format!("{}={}", self.key.as_string(), self.value.as_string())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
