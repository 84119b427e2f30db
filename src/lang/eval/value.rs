use std::fmt;
use std::sync::Arc;

use super::collection::{CollectionInstance, Element};
use crate::lang::ast::{Literal, ValueKind};

/// Runtime value. Scalars are stored inline, strings and collections are
/// shared through an `Arc` so a cached value handed out twice is the very same
/// allocation. Values are never mutated after construction, only growable
/// collections may receive new elements.
#[derive(Clone)]
pub enum Value {
    Void,
    Boolean(bool),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(f64),
    Char(char),
    String(Arc<str>),
    Collection(Arc<CollectionInstance>),
}

macro_rules! impl_value_unpack {
    ($func_name:ident, $variant_name:path, $return_type:ty) => {
        impl Value {
            pub fn $func_name(&self) -> Option<$return_type> {
                match self {
                    $variant_name(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }
    };
}

impl_value_unpack!(as_bool,       Value::Boolean,    bool);
impl_value_unpack!(as_byte,       Value::Byte,       u8);
impl_value_unpack!(as_int,        Value::Int,        i32);
impl_value_unpack!(as_long,       Value::Long,       i64);
impl_value_unpack!(as_double,     Value::Double,     f64);
impl_value_unpack!(as_char,       Value::Char,       char);
impl_value_unpack!(as_collection, Value::Collection, Arc<CollectionInstance>);

impl Value {
    pub fn string<S: AsRef<str>>(s: S) -> Value {
        Value::String(Arc::from(s.as_ref()))
    }

    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Void => Value::Void,
            Literal::Boolean(v) => Value::Boolean(*v),
            Literal::Byte(v) => Value::Byte(*v),
            Literal::Int(v) => Value::Int(*v),
            Literal::Long(v) => Value::Long(*v),
            Literal::Double(v) => Value::Double(*v),
            Literal::Char(v) => Value::Char(*v),
            Literal::String(v) => Value::string(v),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Void => ValueKind::Void,
            Value::Boolean(_) => ValueKind::Boolean,
            Value::Byte(_) => ValueKind::Byte,
            Value::Int(_) => ValueKind::Int,
            Value::Long(_) => ValueKind::Long,
            Value::Double(_) => ValueKind::Double,
            Value::Char(_) => ValueKind::Char,
            Value::String(_) => ValueKind::String,
            Value::Collection(_) => ValueKind::Collection,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(&**v),
            _ => None,
        }
    }

    pub fn is_void(&self) -> bool {
        match self {
            Value::Void => true,
            _ => false,
        }
    }

    pub fn is_collection(&self) -> bool {
        match self {
            Value::Collection(_) => true,
            _ => false,
        }
    }

    /// Numeric view of integral scalars, used for shift amounts, indexes and
    /// exit statuses.
    pub fn integral(&self) -> Option<i64> {
        match self {
            Value::Boolean(v) => Some(*v as i64),
            Value::Byte(v) => Some(*v as i64),
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            Value::Double(v) => Some(*v as i64),
            Value::Char(v) => Some(*v as u32 as i64),
            Value::String(v) => v.trim().parse().ok(),
            Value::Void | Value::Collection(_) => None,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Void => false,
            Value::Boolean(v) => *v,
            Value::Byte(v) => *v != 0,
            Value::Int(v) => *v != 0,
            Value::Long(v) => *v != 0,
            Value::Double(v) => *v != 0.0,
            Value::Char(v) => *v != '\0',
            Value::String(v) => !v.is_empty(),
            Value::Collection(v) => v.len() != 0,
        }
    }

    /// Identity comparison: true if both values are the same allocation (for
    /// strings and collections) or equal scalars.
    pub fn ptr_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => Arc::ptr_eq(a, b),
            (Value::Collection(a), Value::Collection(b)) => Arc::ptr_eq(a, b),
            (Value::String(_), _) | (Value::Collection(_), _) => false,
            _ => self == other,
        }
    }

    pub fn key(&self) -> ValueKey {
        match self {
            Value::Void => ValueKey::Void,
            Value::Boolean(v) => ValueKey::Boolean(*v),
            Value::Byte(v) => ValueKey::Byte(*v),
            Value::Int(v) => ValueKey::Int(*v),
            Value::Long(v) => ValueKey::Long(*v),
            Value::Double(v) => ValueKey::Double(v.to_bits()),
            Value::Char(v) => ValueKey::Char(*v),
            Value::String(v) => ValueKey::String(v.clone()),
            Value::Collection(v) => ValueKey::Collection(Arc::as_ptr(v) as usize),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Void, Value::Void) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Byte(a), Value::Byte(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Collection(a), Value::Collection(b)) => {
                Arc::ptr_eq(a, b) || a.same_elements(b)
            },
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "Void"),
            Value::Boolean(v) => write!(f, "Boolean({})", v),
            Value::Byte(v) => write!(f, "Byte({})", v),
            Value::Int(v) => write!(f, "Int({})", v),
            Value::Long(v) => write!(f, "Long({})", v),
            Value::Double(v) => write!(f, "Double({})", v),
            Value::Char(v) => write!(f, "Char({:?})", v),
            Value::String(v) => write!(f, "String({:?})", v),
            Value::Collection(v) => write!(f, "Collection({:?})", v),
        }
    }
}

/// Text rendering as emitted into generated output.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => Ok(()),
            Value::Boolean(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Double(v) => {
                if v.is_finite() && v.fract() == 0.0 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            },
            Value::Char(v) => write!(f, "{}", v),
            Value::String(v) => f.write_str(v),
            Value::Collection(v) => {
                let is_table = v.is_table();
                f.write_str(if is_table { "{" } else { "[" })?;
                for (idx, (key, element)) in v.entries().into_iter().enumerate() {
                    if idx != 0 {
                        f.write_str(", ")?;
                    }
                    if let Some(key) = key {
                        write!(f, "{}: ", key)?;
                    }
                    match element {
                        Element::Value(value) => write!(f, "{}", value)?,
                        Element::Construction(_) => f.write_str("?")?,
                    }
                }
                f.write_str(if is_table { "}" } else { "]" })
            },
        }
    }
}

macro_rules! impl_value_from {
    ($from_type:ty, $variant_name:path) => {
        impl From<$from_type> for Value {
            fn from(v: $from_type) -> Value {
                $variant_name(v)
            }
        }
    };
}

impl_value_from!(bool, Value::Boolean);
impl_value_from!(u8,   Value::Byte);
impl_value_from!(i32,  Value::Int);
impl_value_from!(i64,  Value::Long);
impl_value_from!(f64,  Value::Double);
impl_value_from!(char, Value::Char);

impl From<&str> for Value {
    fn from(v: &str) -> Value {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Value {
        Value::String(Arc::from(v))
    }
}

impl From<CollectionInstance> for Value {
    fn from(v: CollectionInstance) -> Value {
        Value::Collection(Arc::new(v))
    }
}

/// Hashable projection of a `Value`. Doubles hash by bit pattern and
/// collections by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueKey {
    Void,
    Boolean(bool),
    Byte(u8),
    Int(i32),
    Long(i64),
    Double(u64),
    Char(char),
    String(Arc<str>),
    Collection(usize),
}

/// Resolved argument signature of one instantiation, used as the contextual
/// cache key together with the definition id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgKey(Vec<ValueKey>);

impl ArgKey {
    pub fn new(args: &[Value]) -> Self {
        ArgKey(args.iter().map(Value::key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_rendering() {
        assert_eq!(Value::Void.to_string(), "");
        assert_eq!(Value::Double(5.0).to_string(), "5.0");
        assert_eq!(Value::Double(5.5).to_string(), "5.5");
        assert_eq!(Value::Char('x').to_string(), "x");
        assert_eq!(Value::from("foo").to_string(), "foo");
    }

    #[test]
    fn test_identity() {
        let a = Value::from("same text");
        let b = Value::from("same text");
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
        assert!(Value::Int(3).ptr_eq(&Value::Int(3)));
        assert_eq!(ArgKey::new(&[a.clone(), Value::Int(1)]), ArgKey::new(&[b, Value::Int(1)]));
    }
}
