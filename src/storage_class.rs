use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value::{HostValue, Value};

/// The five physical representations a cell can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    pub fn name(&self) -> &'static str {
        match self {
            StorageClass::Null => "NULL",
            StorageClass::Integer => "INTEGER",
            StorageClass::Real => "REAL",
            StorageClass::Text => "TEXT",
            StorageClass::Blob => "BLOB",
        }
    }

    /// Checks that `raw` is natively representable in this class.
    pub fn validate(&self, raw: &HostValue) -> Result<()> {
        let raw = raw.untyped();
        let native = match self {
            StorageClass::Null => matches!(raw, HostValue::Null),
            StorageClass::Integer => matches!(raw, HostValue::Int(_) | HostValue::Bool(_)),
            StorageClass::Real => {
                matches!(raw, HostValue::Float(_) | HostValue::Int(_) | HostValue::Bool(_))
            }
            StorageClass::Text => matches!(raw, HostValue::Str(_) | HostValue::Bytes(_)),
            StorageClass::Blob => matches!(raw, HostValue::Bytes(_)),
        };
        if native {
            Ok(())
        } else {
            Err(self.rejects(raw))
        }
    }

    /// Converts `raw` into a value of this class, or fails with
    /// [Error::TypeMismatch]. Coercing an already-coerced value yields the
    /// same value.
    pub fn coerce(&self, raw: &HostValue) -> Result<Value> {
        let raw = raw.untyped();
        match self {
            StorageClass::Null => match raw {
                HostValue::Null => Ok(Value::Null),
                HostValue::Str(s) if is_null_literal(s) => Ok(Value::Null),
                other => Err(self.rejects(other)),
            },
            StorageClass::Integer => match raw {
                HostValue::Bool(b) => Ok(Value::Integer(i64::from(*b))),
                HostValue::Int(i) => Ok(Value::Integer(*i)),
                HostValue::Float(f) => integral(*f)
                    .map(Value::Integer)
                    .ok_or_else(|| self.rejects(raw)),
                HostValue::Str(s) => parse_integer(s)
                    .map(Value::Integer)
                    .ok_or_else(|| self.rejects(raw)),
                other => Err(self.rejects(other)),
            },
            StorageClass::Real => match raw {
                HostValue::Bool(b) => Ok(Value::Real(if *b { 1.0 } else { 0.0 })),
                HostValue::Int(i) => Ok(Value::Real(*i as f64)),
                HostValue::Float(f) => Ok(Value::Real(*f)),
                HostValue::Str(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::Real)
                    .map_err(|_| self.rejects(raw)),
                other => Err(self.rejects(other)),
            },
            StorageClass::Text => match raw {
                HostValue::Str(s) => Ok(Value::text(s)),
                HostValue::Bytes(b) => Ok(Value::text(&String::from_utf8_lossy(b))),
                other => Err(self.rejects(other)),
            },
            StorageClass::Blob => match raw {
                HostValue::Bytes(b) => Ok(Value::blob(b)),
                HostValue::Opaque(b) => Ok(Value::SerializedBlob(Arc::from(b.as_slice()))),
                other => {
                    let bytes = serde_json::to_vec(other)?;
                    Ok(Value::SerializedBlob(Arc::from(bytes)))
                }
            },
        }
    }

    fn rejects(&self, raw: &HostValue) -> Error {
        Error::type_mismatch(format!(
            "{} value {:?} cannot be stored as {}",
            raw.type_name(),
            raw,
            self.name()
        ))
    }
}

/// Stores a host value in the storage class its own type implies.
///
/// This is the one canonical path into storage: booleans become INTEGER,
/// typed values go through their affinity, and opaque objects become
/// serialized blobs.
pub fn store_as_storage_class(raw: &HostValue) -> Result<Value> {
    match raw {
        HostValue::Null => Ok(Value::Null),
        HostValue::Bool(_) | HostValue::Int(_) => StorageClass::Integer.coerce(raw),
        HostValue::Float(_) => StorageClass::Real.coerce(raw),
        HostValue::Str(_) => StorageClass::Text.coerce(raw),
        HostValue::Bytes(_) | HostValue::Opaque(_) => StorageClass::Blob.coerce(raw),
        HostValue::Typed(affinity, inner) => affinity.coerce(inner),
    }
}

pub(crate) fn is_null_literal(s: &str) -> bool {
    matches!(s.trim().to_ascii_lowercase().as_str(), "null" | "none" | "")
}

/// Integral floats within the i64 range map to integers.
pub(crate) fn integral(f: f64) -> Option<i64> {
    const LIMIT: f64 = 9_223_372_036_854_775_808.0;
    if f.is_finite() && f.fract() == 0.0 && (-LIMIT..LIMIT).contains(&f) {
        Some(f as i64)
    } else {
        None
    }
}

pub(crate) fn parse_integer(s: &str) -> Option<i64> {
    let s = s.trim();
    s.parse::<i64>()
        .ok()
        .or_else(|| s.parse::<f64>().ok().and_then(integral))
}
