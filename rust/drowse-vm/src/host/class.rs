//! Host class descriptors and their builder.

use super::proxy::ClosureProxy;
use super::types::{HostFault, HostType, HostValue};
use drowse_core::ObjectRef;
use std::fmt;
use std::sync::Arc;

pub type Invoker =
    Arc<dyn Fn(Option<&ObjectRef>, Vec<HostValue>) -> Result<HostValue, HostFault> + Send + Sync>;

pub type FieldGetter = Arc<dyn Fn(Option<&ObjectRef>) -> Result<HostValue, HostFault> + Send + Sync>;

#[derive(Clone)]
pub struct HostMethod {
    pub name: String,
    pub params: Vec<HostType>,
    pub returns: HostType,
    pub is_static: bool,
    pub invoker: Invoker,
}

impl HostMethod {
    /// `name(type, type)`
    pub fn signature(&self) -> String {
        format!(
            "{}({})",
            self.name,
            self.params
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl fmt::Debug for HostMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} -> {}", if self.is_static { "static " } else { "" }, self.signature(), self.returns)
    }
}

#[derive(Clone)]
pub struct HostField {
    pub name: String,
    pub ty: HostType,
    pub is_static: bool,
    pub getter: FieldGetter,
}

#[derive(Clone, Default)]
pub struct HostClass {
    name: String,
    superclass: Option<String>,
    interfaces: Vec<String>,
    is_interface: bool,
    constructors: Vec<HostMethod>,
    methods: Vec<HostMethod>,
    fields: Vec<HostField>,
}

impl HostClass {
    pub fn new(name: impl Into<String>) -> Self {
        HostClass {
            name: name.into(),
            ..Default::default()
        }
    }

    /// An interface: abstract methods only, implemented by closure proxies.
    pub fn interface(name: impl Into<String>) -> Self {
        HostClass {
            is_interface: true,
            ..HostClass::new(name)
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.superclass = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn constructor<F>(mut self, params: Vec<HostType>, build: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<HostValue, HostFault> + Send + Sync + 'static,
    {
        let name = self.name.clone();
        self.constructors.push(HostMethod {
            name,
            params,
            returns: HostType::Class(self.name.clone()),
            is_static: true,
            invoker: Arc::new(move |_, args| build(args)),
        });
        self
    }

    pub fn method<F>(mut self, name: &str, params: Vec<HostType>, returns: HostType, body: F) -> Self
    where
        F: Fn(&ObjectRef, Vec<HostValue>) -> Result<HostValue, HostFault> + Send + Sync + 'static,
    {
        let method = name.to_string();
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            returns,
            is_static: false,
            invoker: Arc::new(move |receiver, args| match receiver {
                Some(receiver) => body(receiver, args),
                None => Err(HostFault::IllegalArgument(format!(
                    "instance method {} called without a receiver",
                    method
                ))),
            }),
        });
        self
    }

    pub fn static_method<F>(mut self, name: &str, params: Vec<HostType>, returns: HostType, body: F) -> Self
    where
        F: Fn(Vec<HostValue>) -> Result<HostValue, HostFault> + Send + Sync + 'static,
    {
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            returns,
            is_static: true,
            invoker: Arc::new(move |_, args| body(args)),
        });
        self
    }

    /// Declare an interface method. Calls reach the proxied closure.
    pub fn abstract_method(mut self, name: &str, params: Vec<HostType>, returns: HostType) -> Self {
        let method = name.to_string();
        self.methods.push(HostMethod {
            name: name.to_string(),
            params,
            returns,
            is_static: false,
            invoker: Arc::new(move |receiver, args| {
                match receiver.and_then(|r| r.as_any().downcast_ref::<ClosureProxy>()) {
                    Some(proxy) => proxy.invoke(&method, args),
                    None => Err(HostFault::Inaccessible(format!("abstract method {}", method))),
                }
            }),
        });
        self
    }

    pub fn field<F>(mut self, name: &str, ty: HostType, get: F) -> Self
    where
        F: Fn(&ObjectRef) -> Result<HostValue, HostFault> + Send + Sync + 'static,
    {
        let field = name.to_string();
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            is_static: false,
            getter: Arc::new(move |receiver| match receiver {
                Some(receiver) => get(receiver),
                None => Err(HostFault::IllegalArgument(format!(
                    "field {} needs a receiver",
                    field
                ))),
            }),
        });
        self
    }

    pub fn static_field(mut self, name: &str, ty: HostType, value: HostValue) -> Self {
        self.fields.push(HostField {
            name: name.to_string(),
            ty,
            is_static: true,
            getter: Arc::new(move |_| Ok(value.clone())),
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn superclass(&self) -> Option<&str> {
        self.superclass.as_deref()
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn constructors(&self) -> &[HostMethod] {
        &self.constructors
    }

    pub fn methods(&self) -> &[HostMethod] {
        &self.methods
    }

    /// Declared methods named `name` taking `arity` arguments.
    pub fn methods_named(&self, name: &str, arity: usize, is_static: bool) -> Vec<HostMethod> {
        self.methods
            .iter()
            .filter(|m| m.name == name && m.params.len() == arity && m.is_static == is_static)
            .cloned()
            .collect()
    }

    pub fn field_named(&self, name: &str) -> Option<&HostField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl fmt::Debug for HostClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostClass")
            .field("name", &self.name)
            .field("superclass", &self.superclass)
            .field("interfaces", &self.interfaces)
            .field("methods", &self.methods)
            .finish()
    }
}
