use std::cmp::Ordering;
use std::fmt::Display;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};

use crate::affinity::Affinity;
use crate::error::{Error, Result};
use crate::storage_class::StorageClass;

/// A raw value handed to the engine by its host.
///
/// This is the input side of every coercion: rows, keys, defaults and query
/// literals all start as a `HostValue` and are canonicalized into a [Value]
/// on their way in.
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize, Deserialize)]
pub enum HostValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// A value already tagged with the affinity it should be stored under.
    Typed(Affinity, Box<HostValue>),
    /// A host object with no scalar representation, already serialized.
    Opaque(Vec<u8>),
}

impl HostValue {
    /// Serializes any host object so it can be stored as an opaque blob.
    pub fn opaque<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Opaque(serde_json::to_vec(value)?))
    }

    /// Tags `value` with an affinity, so the canonical dispatcher stores it
    /// under that affinity's storage class.
    pub fn typed(affinity: Affinity, value: impl Into<HostValue>) -> Self {
        Self::Typed(affinity, Box::new(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self.untyped(), Self::Null)
    }

    /// Strips any affinity tags and returns the underlying raw value.
    pub fn untyped(&self) -> &HostValue {
        match self {
            Self::Typed(_, inner) => inner.untyped(),
            other => other,
        }
    }

    /// Name of the host type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Typed(_, inner) => inner.type_name(),
            Self::Opaque(_) => "object",
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for HostValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<u8>> for HostValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<&[u8]> for HostValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<T: Into<HostValue>> From<Option<T>> for HostValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<&Value> for HostValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Integer(i) => Self::Int(*i),
            Value::Real(f) => Self::Float(*f),
            Value::Text(s) => Self::Str(s.to_string()),
            Value::Blob(b) => Self::Bytes(b.to_vec()),
            Value::SerializedBlob(b) => Self::Opaque(b.to_vec()),
        }
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

/// A cell value in its canonical storage class.
///
/// Values are immutable once created. Text and blob payloads are wrapped in
/// [Arc] so that broadcasting and projecting a column stays cheap.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    /// A 64-bit signed integer.
    Integer(i64),
    /// A 64-bit floating-point value.
    Real(f64),
    /// A UTF-8 string.
    Text(Arc<str>),
    /// Raw bytes, stored as given.
    Blob(Arc<[u8]>),
    /// A host object serialized into a blob. Not comparable by value.
    SerializedBlob(Arc<[u8]>),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Self::Text(Arc::from(s))
    }

    pub fn blob(bytes: &[u8]) -> Self {
        Self::Blob(Arc::from(bytes))
    }

    /// Returns `true` if the value is [Value::Null].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) | Self::SerializedBlob(b) => Some(b),
            _ => None,
        }
    }

    /// Numeric view used by arithmetic and aggregates.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Real(f) => Some(*f),
            _ => None,
        }
    }

    /// Returns the storage class this value is stored under.
    pub fn storage_class(&self) -> StorageClass {
        match self {
            Self::Null => StorageClass::Null,
            Self::Integer(_) => StorageClass::Integer,
            Self::Real(_) => StorageClass::Real,
            Self::Text(_) => StorageClass::Text,
            Self::Blob(_) | Self::SerializedBlob(_) => StorageClass::Blob,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SerializedBlob(_) => "SERIALIZED BLOB",
            other => other.storage_class().name(),
        }
    }

    /// Recovers the host object stored in a [Value::SerializedBlob].
    pub fn deserialize_blob<T: DeserializeOwned>(&self) -> Result<T> {
        match self {
            Self::SerializedBlob(bytes) => Ok(serde_json::from_slice(bytes)?),
            other => Err(Error::type_mismatch(format!(
                "{} is not a serialized blob",
                other.type_name()
            ))),
        }
    }

    /// Orders two values of compatible kinds.
    ///
    /// INTEGER and REAL compare numerically with each other; every other
    /// kind only compares with itself. Serialized blobs never compare.
    pub fn try_cmp(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            (Self::Null, Self::Null) => Ok(Ordering::Equal),
            (Self::Integer(a), Self::Integer(b)) => Ok(a.cmp(b)),
            (Self::Integer(a), Self::Real(b)) => Ok((*a as f64).total_cmp(b)),
            (Self::Real(a), Self::Integer(b)) => Ok(a.total_cmp(&(*b as f64))),
            (Self::Real(a), Self::Real(b)) => Ok(a.total_cmp(b)),
            (Self::Text(a), Self::Text(b)) => Ok(a.cmp(b)),
            (Self::Blob(a), Self::Blob(b)) => Ok(a.cmp(b)),
            _ => Err(Error::type_mismatch(format!(
                "cannot order {} against {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    /// Value equality as seen by conditions: numeric kinds compare by value,
    /// other kinds must share a tag. Never fails.
    pub fn sql_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Real(b)) | (Self::Real(b), Self::Integer(a)) => {
                (*a as f64) == *b
            }
            (Self::Real(a), Self::Real(b)) => a == b,
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Real(a), Self::Real(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::SerializedBlob(a), Self::SerializedBlob(b)) => a == b,
            _ => false,
        }
    }
}

// Reals hash and compare by bit pattern so values can key a map.
impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Integer(i) => i.hash(state),
            Self::Real(f) => f.to_bits().hash(state),
            Self::Text(s) => s.hash(state),
            Self::Blob(b) | Self::SerializedBlob(b) => b.hash(state),
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "{v}"),
            Value::Blob(v) => write!(f, "<blob {} bytes>", v.len()),
            Value::SerializedBlob(v) => write!(f, "<serialized {} bytes>", v.len()),
        }
    }
}

/// Values serialize as their host equivalents; serialized blobs surface the
/// object they were made from.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(v) => serializer.serialize_i64(*v),
            Value::Real(v) => serializer.serialize_f64(*v),
            Value::Text(v) => serializer.serialize_str(v),
            Value::Blob(v) => serializer.serialize_bytes(v),
            Value::SerializedBlob(v) => match serde_json::from_slice::<serde_json::Value>(v) {
                Ok(object) => object.serialize(serializer),
                Err(_) => serializer.serialize_bytes(v),
            },
        }
    }
}
