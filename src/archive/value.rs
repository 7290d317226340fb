//! Values stored in and read back from an archive.

use std::collections::BTreeMap;

use half::f16;
use num_complex::{Complex32, Complex64};

use super::protocol::Persist;
use super::ArchiveGroup;
use crate::core::{Array, Dataset, Key, Scalar};

/// Anything that can be written under a key.
///
/// Reading returns the same shapes: leaves come back as `Scalar` / `Array`,
/// reconstructed composites as `List`, `Tuple`, `Dict` or `Object`, and
/// untagged (or unrecognized) groups as `Group` views.
#[derive(Clone, Debug)]
pub enum Value {
    Scalar(Scalar),
    Array(Array),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Dict(BTreeMap<Key, Value>),
    Object(Box<dyn Persist>),
    Group(ArchiveGroup),
}

impl Value {
    /// Wrap a user value.
    pub fn object<T: Persist>(value: T) -> Self {
        Value::Object(Box::new(value))
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Scalar(_) => "scalar",
            Value::Array(_) => "array",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Dict(_) => "dict",
            Value::Object(_) => "object",
            Value::Group(_) => "group",
        }
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Elements of a list or tuple.
    pub fn as_slice(&self) -> Option<&[Value]> {
        match self {
            Value::List(v) | Value::Tuple(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&BTreeMap<Key, Value>> {
        match self {
            Value::Dict(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_group(&self) -> Option<&ArchiveGroup> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    pub fn into_group(self) -> Option<ArchiveGroup> {
        match self {
            Value::Group(g) => Some(g),
            _ => None,
        }
    }

    /// Integer scalars widened to i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self.as_scalar()? {
            Scalar::U8(v) => Some(*v as i64),
            Scalar::I8(v) => Some(*v as i64),
            Scalar::U16(v) => Some(*v as i64),
            Scalar::I16(v) => Some(*v as i64),
            Scalar::U32(v) => Some(*v as i64),
            Scalar::I32(v) => Some(*v as i64),
            Scalar::U64(v) => i64::try_from(*v).ok(),
            Scalar::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// Float scalars widened to f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self.as_scalar()? {
            Scalar::F16(v) => Some(v.to_f64()),
            Scalar::F32(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            _ => None,
        }
    }

    /// Complex scalars widened to `Complex64`; real floats get a zero imaginary part.
    pub fn as_complex(&self) -> Option<Complex64> {
        match self.as_scalar()? {
            Scalar::C32(v) => Some(Complex64::new(v.re as f64, v.im as f64)),
            Scalar::C64(v) => Some(*v),
            _ => self.as_f64().map(|re| Complex64::new(re, 0.0)),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self.as_scalar()? {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self.as_scalar()? {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the wrapped user value as `T`.
    pub fn downcast_ref<T: Persist>(&self) -> Option<&T> {
        match self {
            Value::Object(o) => o.as_any().downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Take the wrapped user value as `T`.
    pub fn downcast<T: Persist>(self) -> Option<T> {
        match self {
            Value::Object(o) => o.into_any().downcast::<T>().ok().map(|b| *b),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Tuple(a), Value::Tuple(b)) => a == b,
            (Value::Dict(a), Value::Dict(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.eq_dyn(b.as_any()),
            (Value::Group(a), Value::Group(b)) => a.same_node(b),
            _ => false,
        }
    }
}

impl From<Dataset> for Value {
    fn from(d: Dataset) -> Self {
        match d {
            Dataset::Scalar(s) => Value::Scalar(s),
            Dataset::Array(a) => Value::Array(a),
        }
    }
}

macro_rules! value_from_scalar {
    ($($t:ty),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Scalar(Scalar::from(v))
            }
        })*
    };
}

value_from_scalar!(bool, u8, i8, u16, i16, u32, i32, u64, i64, f16, f32, f64, Complex32, Complex64, String, &str);

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

impl From<Array> for Value {
    fn from(a: Array) -> Self {
        Value::Array(a)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<Key>, V: Into<Value>> From<BTreeMap<K, V>> for Value {
    fn from(m: BTreeMap<K, V>) -> Self {
        Value::Dict(m.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<ArchiveGroup> for Value {
    fn from(g: ArchiveGroup) -> Self {
        Value::Group(g)
    }
}

impl From<&ArchiveGroup> for Value {
    fn from(g: &ArchiveGroup) -> Self {
        Value::Group(g.clone())
    }
}

impl From<Box<dyn Persist>> for Value {
    fn from(o: Box<dyn Persist>) -> Self {
        Value::Object(o)
    }
}

impl<A: Into<Value>, B: Into<Value>> From<(A, B)> for Value {
    fn from((a, b): (A, B)) -> Self {
        Value::Tuple(vec![a.into(), b.into()])
    }
}

impl<A: Into<Value>, B: Into<Value>, C: Into<Value>> From<(A, B, C)> for Value {
    fn from((a, b, c): (A, B, C)) -> Self {
        Value::Tuple(vec![a.into(), b.into(), c.into()])
    }
}
