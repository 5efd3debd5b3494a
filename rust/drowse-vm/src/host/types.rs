use drowse_core::{ClosureRef, ObjectRef};
use std::fmt;
use thiserror::Error;

/// Declared type of a host parameter, field or return value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    Void,
    Boolean,
    Char,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Str,
    Object,
    Array(Box<HostType>),
    Collection,
    Map,
    /// A registered class or interface, by name.
    Class(String),
}

impl HostType {
    pub fn class(name: impl Into<String>) -> Self {
        HostType::Class(name.into())
    }

    pub fn array_of(element: HostType) -> Self {
        HostType::Array(Box::new(element))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            HostType::Boolean
                | HostType::Char
                | HostType::Byte
                | HostType::Short
                | HostType::Int
                | HostType::Long
                | HostType::Float
                | HostType::Double
        )
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            HostType::Byte
                | HostType::Short
                | HostType::Int
                | HostType::Long
                | HostType::Float
                | HostType::Double
        )
    }

    /// Rank used to break overload ties: exact value types beat named
    /// classes, which beat `Object`.
    pub fn specificity(&self) -> u32 {
        match self {
            HostType::Object | HostType::Void => 0,
            HostType::Class(_) | HostType::Collection | HostType::Map => 1,
            _ => 2,
        }
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostType::Void => write!(f, "void"),
            HostType::Boolean => write!(f, "boolean"),
            HostType::Char => write!(f, "char"),
            HostType::Byte => write!(f, "byte"),
            HostType::Short => write!(f, "short"),
            HostType::Int => write!(f, "int"),
            HostType::Long => write!(f, "long"),
            HostType::Float => write!(f, "float"),
            HostType::Double => write!(f, "double"),
            HostType::Str => write!(f, "String"),
            HostType::Object => write!(f, "Object"),
            HostType::Array(element) => write!(f, "{}[]", element),
            HostType::Collection => write!(f, "Collection"),
            HostType::Map => write!(f, "Map"),
            HostType::Class(name) => write!(f, "{}", name),
        }
    }
}

/// A value on the host side of the bridge.
#[derive(Clone)]
pub enum HostValue {
    Null,
    Bool(bool),
    Char(char),
    Int(i64),
    Float(f64),
    Str(String),
    Array(Vec<HostValue>),
    List(Vec<HostValue>),
    Map(Vec<(String, HostValue)>),
    Object(ObjectRef),
    Function(ClosureRef),
}

impl HostValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(n) => Some(*n),
            HostValue::Float(f) => Some(*f as i64),
            HostValue::Bool(b) => Some(*b as i64),
            HostValue::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Int(n) => Some(*n as f64),
            HostValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            HostValue::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Text form the way host code would print the value.
    pub fn render(&self) -> String {
        match self {
            HostValue::Null => "null".to_string(),
            HostValue::Bool(b) => b.to_string(),
            HostValue::Char(c) => c.to_string(),
            HostValue::Int(n) => n.to_string(),
            HostValue::Float(f) => drowse_core::value::format_float(*f),
            HostValue::Str(s) => s.clone(),
            HostValue::Array(items) | HostValue::List(items) => format!(
                "[{}]",
                items.iter().map(HostValue::render).collect::<Vec<_>>().join(", ")
            ),
            HostValue::Map(entries) => format!(
                "{{{}}}",
                entries
                    .iter()
                    .map(|(k, v)| format!("{}={}", k, v.render()))
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            HostValue::Object(o) => o.describe(),
            HostValue::Function(c) => c.describe(),
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Object(o) => write!(f, "Object({})", o.type_name()),
            HostValue::Function(c) => write!(f, "Function({})", c.describe()),
            other => write!(f, "{}", other.render()),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostFault {
    #[error("no such member: {0}")]
    NoSuchMember(String),
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
    #[error("inaccessible member: {0}")]
    Inaccessible(String),
    #[error("cannot instantiate {0}")]
    Instantiation(String),
    /// An exception raised by host code; it becomes a script throw.
    #[error("{0}")]
    Thrown(String),
    #[error("{0}")]
    Fatal(String),
    /// A script callback handed tainted data to a sensitive function.
    #[error("{0}")]
    TaintViolation(String),
}
