//! Scalar cells and the values they hold.
//!
//! A [`Scalar`] is a shared, mutable cell. Assigning to a Scalar replaces
//! the value it holds while keeping the cell identity, which is how variables
//! get pass-by-reference semantics. Value types (numbers, strings) are copied
//! on read; containers, host objects and closures are shared by reference.

mod function;
mod map;
mod object;
mod sequence;
pub mod taint;

pub use function::{ClosureRef, ScriptFunction};
pub use map::{ClosurePolicy, MapOrder, MapRef, MissPolicy, RemovalPolicy, ScalarHash};
pub use object::{HostObject, KeyValuePair, ObjectRef};
pub use sequence::{ArrayRef, ScalarArray};

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

/// Tagged value held by a [`Scalar`] cell.
#[derive(Clone)]
pub enum ScalarValue {
    Null,
    Int(i64),
    Float(f64),
    Str(String),
    Object(ObjectRef),
    Array(ArrayRef),
    Hash(MapRef),
    Closure(ClosureRef),
    /// Taint decorator. Never wraps another `Tainted`.
    Tainted(Box<ScalarValue>),
}

impl ScalarValue {
    pub fn string(s: impl Into<String>) -> Self {
        ScalarValue::Str(s.into())
    }

    /// The decorated value with any taint wrapper removed.
    pub fn inner(&self) -> &ScalarValue {
        match self {
            ScalarValue::Tainted(inner) => inner,
            other => other,
        }
    }

    pub fn is_tainted(&self) -> bool {
        matches!(self, ScalarValue::Tainted(_))
    }

    /// Wrap in the taint decorator. Tainting a tainted value is a no-op.
    pub fn tainted(self) -> ScalarValue {
        match self {
            ScalarValue::Tainted(_) => self,
            other => ScalarValue::Tainted(Box::new(other)),
        }
    }

    /// Strip the taint decorator. Sanitizing an untainted value is a no-op.
    pub fn untainted(self) -> ScalarValue {
        match self {
            ScalarValue::Tainted(inner) => *inner,
            other => other,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.inner(), ScalarValue::Null)
    }

    pub fn type_name(&self) -> &'static str {
        match self.inner() {
            ScalarValue::Null => "null",
            ScalarValue::Int(_) => "int",
            ScalarValue::Float(_) => "double",
            ScalarValue::Str(_) => "string",
            ScalarValue::Object(_) => "object",
            ScalarValue::Array(_) => "array",
            ScalarValue::Hash(_) => "hash",
            ScalarValue::Closure(_) => "function",
            ScalarValue::Tainted(inner) => inner.type_name(),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self.inner(), ScalarValue::Int(_) | ScalarValue::Float(_))
    }

    pub fn as_int(&self) -> i64 {
        match self.inner() {
            ScalarValue::Null => 0,
            ScalarValue::Int(n) => *n,
            ScalarValue::Float(f) => *f as i64,
            ScalarValue::Str(s) => parse_int(s),
            ScalarValue::Array(a) => a.len().unwrap_or(0) as i64,
            ScalarValue::Hash(h) => h.len() as i64,
            _ => 0,
        }
    }

    pub fn as_float(&self) -> f64 {
        match self.inner() {
            ScalarValue::Int(n) => *n as f64,
            ScalarValue::Float(f) => *f,
            ScalarValue::Str(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            other => other.as_int() as f64,
        }
    }

    /// String form used by concatenation and printing.
    pub fn as_string(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, false, &mut Vec::new());
        out
    }

    /// Quoted form used in call traces and container listings.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, true, &mut Vec::new());
        out
    }

    pub fn is_truthy(&self) -> bool {
        match self.inner() {
            ScalarValue::Null => false,
            ScalarValue::Int(n) => *n != 0,
            ScalarValue::Float(f) => *f != 0.0,
            ScalarValue::Str(s) => !s.is_empty() && s != "0",
            _ => true,
        }
    }

    fn render(&self, out: &mut String, quoted: bool, seen: &mut Vec<usize>) {
        match self.inner() {
            ScalarValue::Null => {
                if quoted {
                    out.push_str("$null");
                }
            }
            ScalarValue::Int(n) => out.push_str(&n.to_string()),
            ScalarValue::Float(f) => out.push_str(&format_float(*f)),
            ScalarValue::Str(s) => {
                if quoted {
                    out.push('\'');
                    out.push_str(s);
                    out.push('\'');
                } else {
                    out.push_str(s);
                }
            }
            ScalarValue::Object(o) => out.push_str(&o.describe()),
            ScalarValue::Closure(c) => out.push_str(&c.describe()),
            ScalarValue::Array(a) => {
                let id = Arc::as_ptr(a) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("@(...)");
                    return;
                }
                seen.push(id);
                out.push_str("@(");
                let items = a.snapshot().unwrap_or_default();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.get().render(out, true, seen);
                }
                out.push(')');
                seen.pop();
            }
            ScalarValue::Hash(h) => {
                let id = Arc::as_ptr(h) as *const () as usize;
                if seen.contains(&id) {
                    out.push_str("%(...)");
                    return;
                }
                seen.push(id);
                out.push_str("%(");
                for (i, (key, value)) in h.entries().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(key);
                    out.push_str(" => ");
                    value.get().render(out, true, seen);
                }
                out.push(')');
                seen.pop();
            }
            ScalarValue::Tainted(inner) => inner.render(out, quoted, seen),
        }
    }
}

/// Integral floats keep one decimal place so they stay distinguishable from ints.
pub fn format_float(f: f64) -> String {
    if f == f.floor() && f.abs() < 1e15 {
        format!("{:.1}", f)
    } else {
        format!("{}", f)
    }
}

fn parse_int(s: &str) -> i64 {
    let t = s.trim();
    t.parse::<i64>()
        .ok()
        .or_else(|| t.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self.inner(), other.inner()) {
            (ScalarValue::Null, ScalarValue::Null) => true,
            (ScalarValue::Int(a), ScalarValue::Int(b)) => a == b,
            (ScalarValue::Float(a), ScalarValue::Float(b)) => a == b,
            (ScalarValue::Int(a), ScalarValue::Float(b)) => (*a as f64) == *b,
            (ScalarValue::Float(a), ScalarValue::Int(b)) => *a == (*b as f64),
            (ScalarValue::Str(a), ScalarValue::Str(b)) => a == b,
            (ScalarValue::Array(a), ScalarValue::Array(b)) => Arc::ptr_eq(a, b),
            (ScalarValue::Hash(a), ScalarValue::Hash(b)) => Arc::ptr_eq(a, b),
            (ScalarValue::Object(a), ScalarValue::Object(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            (ScalarValue::Closure(a), ScalarValue::Closure(b)) => {
                Arc::as_ptr(a) as *const () == Arc::as_ptr(b) as *const ()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tainted() {
            write!(f, "Tainted({})", self.describe())
        } else {
            write!(f, "{}", self.describe())
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<i64> for ScalarValue {
    fn from(n: i64) -> Self {
        ScalarValue::Int(n)
    }
}

impl From<f64> for ScalarValue {
    fn from(f: f64) -> Self {
        ScalarValue::Float(f)
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Str(s.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(s: String) -> Self {
        ScalarValue::Str(s)
    }
}

// ---------------------------------------------------------------------------
// Scalar
// ---------------------------------------------------------------------------

/// A shared mutable value cell. Cloning a `Scalar` clones the handle, not
/// the cell; use [`Scalar::copy`] for a fresh cell holding the same value.
#[derive(Clone)]
pub struct Scalar(Arc<Mutex<ScalarValue>>);

impl Scalar {
    pub fn new(value: ScalarValue) -> Self {
        Scalar(Arc::new(Mutex::new(value)))
    }

    pub fn null() -> Self {
        Scalar::new(ScalarValue::Null)
    }

    pub fn int(n: i64) -> Self {
        Scalar::new(ScalarValue::Int(n))
    }

    pub fn float(f: f64) -> Self {
        Scalar::new(ScalarValue::Float(f))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Scalar::new(ScalarValue::Str(s.into()))
    }

    pub fn array(array: ArrayRef) -> Self {
        Scalar::new(ScalarValue::Array(array))
    }

    pub fn new_array() -> Self {
        Scalar::array(ScalarArray::new())
    }

    pub fn array_of(items: Vec<Scalar>) -> Self {
        Scalar::array(ScalarArray::from_vec(items))
    }

    pub fn hash(map: MapRef) -> Self {
        Scalar::new(ScalarValue::Hash(map))
    }

    pub fn new_hash() -> Self {
        Scalar::hash(ScalarHash::new())
    }

    pub fn object(object: ObjectRef) -> Self {
        Scalar::new(ScalarValue::Object(object))
    }

    pub fn closure(closure: ClosureRef) -> Self {
        Scalar::new(ScalarValue::Closure(closure))
    }

    /// Snapshot of the held value.
    pub fn get(&self) -> ScalarValue {
        self.0.lock().clone()
    }

    /// Replace the held value in place.
    pub fn set(&self, value: ScalarValue) {
        *self.0.lock() = value;
    }

    /// Copy another cell's value into this one.
    pub fn assign_from(&self, other: &Scalar) {
        if self.same_cell(other) {
            return;
        }
        let value = other.get();
        self.set(value);
    }

    /// A fresh cell holding this cell's current value.
    pub fn copy(&self) -> Scalar {
        Scalar::new(self.get())
    }

    pub fn same_cell(&self, other: &Scalar) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable identity of the cell for diagnostics and cycle checks.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn is_null(&self) -> bool {
        self.0.lock().is_null()
    }

    pub fn type_name(&self) -> &'static str {
        self.0.lock().type_name()
    }

    pub fn as_int(&self) -> i64 {
        self.get().as_int()
    }

    pub fn as_float(&self) -> f64 {
        self.get().as_float()
    }

    pub fn as_string(&self) -> String {
        self.get().as_string()
    }

    pub fn describe(&self) -> String {
        self.get().describe()
    }

    pub fn is_truthy(&self) -> bool {
        self.get().is_truthy()
    }

    pub fn is_number(&self) -> bool {
        self.0.lock().is_number()
    }

    pub fn as_array(&self) -> Option<ArrayRef> {
        match self.0.lock().inner() {
            ScalarValue::Array(a) => Some(a.clone()),
            _ => None,
        }
    }

    pub fn as_hash(&self) -> Option<MapRef> {
        match self.0.lock().inner() {
            ScalarValue::Hash(h) => Some(h.clone()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match self.0.lock().inner() {
            ScalarValue::Object(o) => Some(o.clone()),
            _ => None,
        }
    }

    pub fn as_closure(&self) -> Option<ClosureRef> {
        match self.0.lock().inner() {
            ScalarValue::Closure(c) => Some(c.clone()),
            _ => None,
        }
    }

    pub fn is_tainted(&self) -> bool {
        self.0.lock().is_tainted()
    }

    /// Mark the held value tainted in place.
    pub fn taint(&self) {
        let mut guard = self.0.lock();
        if !guard.is_tainted() {
            let value = std::mem::replace(&mut *guard, ScalarValue::Null);
            *guard = value.tainted();
        }
    }

    /// Remove the taint decorator in place.
    pub fn untaint(&self) {
        let mut guard = self.0.lock();
        if guard.is_tainted() {
            let value = std::mem::replace(&mut *guard, ScalarValue::Null);
            *guard = value.untainted();
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Scalar::null()
    }
}

impl fmt::Debug for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scalar({:?})", self.get())
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_string())
    }
}

impl From<ScalarValue> for Scalar {
    fn from(value: ScalarValue) -> Self {
        Scalar::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_preserves_cell_identity() {
        let a = Scalar::int(1);
        let alias = a.clone();
        a.set(ScalarValue::string("two"));
        assert!(alias.same_cell(&a));
        assert_eq!(alias.as_string(), "two");
    }

    #[test]
    fn test_copy_makes_independent_cell() {
        let a = Scalar::int(1);
        let b = a.copy();
        b.set(ScalarValue::Int(9));
        assert_eq!(a.as_int(), 1);
        assert_eq!(b.as_int(), 9);
    }

    #[test]
    fn test_numeric_conversions() {
        assert_eq!(Scalar::string("42").as_int(), 42);
        assert_eq!(Scalar::string("3.7").as_int(), 3);
        assert_eq!(Scalar::string("nope").as_int(), 0);
        assert_eq!(Scalar::float(2.0).as_string(), "2.0");
        assert_eq!(Scalar::int(7).as_float(), 7.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Scalar::null().is_truthy());
        assert!(!Scalar::int(0).is_truthy());
        assert!(!Scalar::string("").is_truthy());
        assert!(!Scalar::string("0").is_truthy());
        assert!(Scalar::string("a").is_truthy());
        assert!(Scalar::new_array().is_truthy());
    }

    #[test]
    fn test_describe_containers() {
        let arr = Scalar::array_of(vec![Scalar::int(1), Scalar::string("two")]);
        assert_eq!(arr.as_string(), "@(1, 'two')");
        let hash = Scalar::new_hash();
        let map = hash.as_hash().unwrap();
        map.put("a", Scalar::int(1)).unwrap();
        assert_eq!(hash.as_string(), "%(a => 1)");
    }

    #[test]
    fn test_self_referential_array_renders() {
        let arr = Scalar::new_array();
        let inner = arr.as_array().unwrap();
        inner.push(arr.clone()).unwrap();
        assert_eq!(arr.as_string(), "@(@(...))");
    }

    #[test]
    fn test_taint_is_idempotent_and_removable() {
        let s = Scalar::string("input");
        s.taint();
        s.taint();
        assert!(s.is_tainted());
        assert_eq!(s.as_string(), "input");
        assert!(matches!(s.get(), ScalarValue::Tainted(ref inner) if !inner.is_tainted()));
        s.untaint();
        assert!(!s.is_tainted());
        assert_eq!(s.get(), ScalarValue::string("input"));
        s.untaint();
        assert_eq!(s.as_string(), "input");
    }

    #[test]
    fn test_tainted_container_still_indexes() {
        let arr = Scalar::array_of(vec![Scalar::int(3)]);
        arr.taint();
        let inner = arr.as_array().expect("tainted array is still an array");
        assert_eq!(inner.len().unwrap(), 1);
        assert_eq!(arr.type_name(), "array");
    }
}
