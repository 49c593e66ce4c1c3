//! The data values a compiled template is rendered against.
//!
//! Host applications rarely construct [`Value`] by hand: they implement
//! [`ToValue`] for their own structs (the way callers implement
//! `serde::Serialize` to opt into a wire format) and hand the result to
//! the tree builder.

use std::sync::Arc;

/// A dynamically-typed value from the host application's data model.
///
/// This is the "tagged variant type" the design notes recommend for
/// statically-typed targets, in place of reflection-like traversal.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Str(Arc<str>),
    List(Arc<Vec<Value>>),
    /// Order-preserving map: iterated in insertion order rather than
    /// hashed order.
    Map(Arc<Vec<(String, Value)>>),
}

impl Value {
    pub fn str(s: impl Into<String>) -> Self {
        Value::Str(Arc::from(s.into()))
    }

    pub fn number(n: impl Into<f64>) -> Self {
        Value::Number(n.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Arc::new(items))
    }

    pub fn map(entries: Vec<(String, Value)>) -> Self {
        Value::Map(Arc::new(entries))
    }

    /// Nil, empty string, zero numeric, `false`, empty sequence, empty
    /// mapping are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Map(entries) => !entries.is_empty(),
        }
    }

    /// Canonical text form used when interpolating a scalar: integers as
    /// decimal, booleans as "true"/"false", nil as "".
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::List(_) | Value::Map(_) => String::new(),
        }
    }

    /// Look up a field by name. Missing fields resolve to `Value::Null`
    /// (a zero-value fallback) rather than erroring; indexing a scalar is
    /// the one case that is structurally invalid and is signalled to the
    /// caller via `None` so it can raise `EvalError`.
    pub fn field(&self, name: &str) -> Option<Value> {
        match self {
            Value::Map(entries) => Some(
                entries
                    .iter()
                    .find(|(k, _)| k == name)
                    .map(|(_, v)| v.clone())
                    .unwrap_or(Value::Null),
            ),
            Value::Null => Some(Value::Null),
            _ => None,
        }
    }

    /// Index into a list or map by the `index` built-in.
    pub fn index(&self, idx: &Value) -> Option<Value> {
        match self {
            Value::List(items) => {
                let i = match idx {
                    Value::Number(n) => *n as usize,
                    _ => return None,
                };
                Some(items.get(i).cloned().unwrap_or(Value::Null))
            }
            Value::Map(entries) => {
                let key = idx.to_display_string();
                Some(
                    entries
                        .iter()
                        .find(|(k, _)| *k == key)
                        .map(|(_, v)| v.clone())
                        .unwrap_or(Value::Null),
                )
            }
            Value::Null => Some(Value::Null),
            _ => None,
        }
    }

    /// The `len` built-in.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Str(s) => Some(s.chars().count()),
            Value::List(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            Value::Null => Some(0),
            _ => None,
        }
    }

    /// Iterate a range expression's target as an ordered sequence of
    /// (optional key, value) pairs. Lists yield `None` keys; maps yield
    /// `Some(key)`. Returns `None` (empty) for anything non-iterable.
    pub fn iter_entries(&self) -> Vec<(Option<String>, Value)> {
        match self {
            Value::List(items) => items.iter().cloned().map(|v| (None, v)).collect(),
            Value::Map(entries) => entries
                .iter()
                .map(|(k, v)| (Some(k.clone()), v.clone()))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Implemented by host types that can be converted into the engine's
/// [`Value`] representation, analogous to `serde::Serialize`.
pub trait ToValue {
    fn to_value(&self) -> Value;
}

impl ToValue for Value {
    fn to_value(&self) -> Value {
        self.clone()
    }
}

impl ToValue for str {
    fn to_value(&self) -> Value {
        Value::str(self)
    }
}

impl ToValue for String {
    fn to_value(&self) -> Value {
        Value::str(self.as_str())
    }
}

impl ToValue for bool {
    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }
}

macro_rules! impl_to_value_number {
    ($($ty:ty),*) => {
        $(
            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Number(*self as f64)
                }
            }
        )*
    };
}

impl_to_value_number!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }
}

impl<T: ToValue> ToValue for Vec<T> {
    fn to_value(&self) -> Value {
        Value::list(self.iter().map(ToValue::to_value).collect())
    }
}

impl<T: ToValue> ToValue for &T {
    fn to_value(&self) -> Value {
        (*self).to_value()
    }
}
