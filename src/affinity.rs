use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::storage_class::{StorageClass, is_null_literal, store_as_storage_class};
use crate::value::{HostValue, Value};

/// The preferred storage class of a column.
///
/// An affinity decides which host types a strict column accepts as-is and
/// how a lax column converts everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Affinity {
    Integer,
    Real,
    Text,
    Blob,
    /// Stores numbers as numbers and leaves anything else as text.
    Numeric,
    /// No preference: every value keeps the class its own type implies.
    Any,
}

/// Declared type names and the affinity each one maps to.
const TYPE_ALIASES: &[(&str, Affinity)] = &[
    ("TEXT", Affinity::Text),
    ("CHAR", Affinity::Text),
    ("VARCHAR", Affinity::Text),
    ("TINYTEXT", Affinity::Text),
    ("MEDIUMTEXT", Affinity::Text),
    ("LONGTEXT", Affinity::Text),
    ("NCHAR", Affinity::Text),
    ("NVARCHAR", Affinity::Text),
    ("CLOB", Affinity::Text),
    ("INTEGER", Affinity::Integer),
    ("INT", Affinity::Integer),
    ("TINYINT", Affinity::Integer),
    ("SMALLINT", Affinity::Integer),
    ("MEDIUMINT", Affinity::Integer),
    ("BIGINT", Affinity::Integer),
    ("INT2", Affinity::Integer),
    ("INT4", Affinity::Integer),
    ("INT8", Affinity::Integer),
    ("REAL", Affinity::Real),
    ("DOUBLE", Affinity::Real),
    ("DOUBLE PRECISION", Affinity::Real),
    ("FLOAT", Affinity::Real),
    ("NUMERIC", Affinity::Numeric),
    ("DECIMAL", Affinity::Numeric),
    ("BOOLEAN", Affinity::Numeric),
    ("DATE", Affinity::Numeric),
    ("DATETIME", Affinity::Numeric),
    ("TIMESTAMP", Affinity::Numeric),
    ("TIME", Affinity::Numeric),
    ("BLOB", Affinity::Blob),
    ("ANY", Affinity::Any),
    ("NONE", Affinity::Any),
];

impl Affinity {
    /// Resolves a declared column type such as `varchar(255)`.
    ///
    /// Matching ignores case, extra whitespace and any size suffix.
    pub fn from_type_name(name: &str) -> Result<Self> {
        let base = name.split('(').next().unwrap_or_default();
        let normalized = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();

        TYPE_ALIASES
            .iter()
            .find(|(alias, _)| *alias == normalized)
            .map(|(_, affinity)| *affinity)
            .ok_or_else(|| Error::type_mismatch(format!("unknown column type {name:?}")))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Affinity::Integer => "INTEGER",
            Affinity::Real => "REAL",
            Affinity::Text => "TEXT",
            Affinity::Blob => "BLOB",
            Affinity::Numeric => "NUMERIC",
            Affinity::Any => "ANY",
        }
    }

    /// Returns `true` if `raw` is one of the host types this affinity
    /// stores without conversion. Strict columns accept nothing else.
    pub fn accepts(&self, raw: &HostValue) -> bool {
        let raw = raw.untyped();
        match self {
            Affinity::Integer => matches!(raw, HostValue::Int(_) | HostValue::Bool(_)),
            Affinity::Real => matches!(
                raw,
                HostValue::Float(_) | HostValue::Int(_) | HostValue::Bool(_)
            ),
            Affinity::Text => matches!(raw, HostValue::Str(_)),
            Affinity::Blob => matches!(raw, HostValue::Bytes(_)),
            Affinity::Numeric => matches!(
                raw,
                HostValue::Int(_)
                    | HostValue::Float(_)
                    | HostValue::Str(_)
                    | HostValue::Bool(_)
                    | HostValue::Null
            ),
            Affinity::Any => true,
        }
    }

    /// Converts `raw` into the storage class this affinity prefers.
    pub fn coerce(&self, raw: &HostValue) -> Result<Value> {
        match self {
            Affinity::Integer => StorageClass::Integer.coerce(raw),
            Affinity::Real => StorageClass::Real.coerce(raw),
            Affinity::Text => StorageClass::Text.coerce(raw),
            Affinity::Blob => StorageClass::Blob.coerce(raw),
            Affinity::Numeric => self.coerce_numeric(raw.untyped()),
            Affinity::Any => store_as_storage_class(raw),
        }
    }

    fn coerce_numeric(&self, raw: &HostValue) -> Result<Value> {
        if !self.accepts(raw) {
            return Err(Error::type_mismatch(format!(
                "{} value {:?} has no NUMERIC representation",
                raw.type_name(),
                raw
            )));
        }
        match raw {
            HostValue::Str(s) => Ok(classify_numeric_text(s)),
            HostValue::Float(_) => StorageClass::Real.coerce(raw),
            HostValue::Null => Ok(Value::Null),
            _ => StorageClass::Integer.coerce(raw),
        }
    }
}

fn classify_numeric_text(s: &str) -> Value {
    let lowered = s.trim().to_ascii_lowercase();
    if is_null_literal(&lowered) {
        return Value::Null;
    }
    match lowered.as_str() {
        "true" => return Value::Integer(1),
        "false" => return Value::Integer(0),
        _ => {}
    }
    if !lowered.contains(['.', 'e']) {
        if let Ok(i) = lowered.parse::<i64>() {
            return Value::Integer(i);
        }
    }
    match lowered.parse::<f64>() {
        Ok(f) => Value::Real(f),
        Err(_) => Value::text(s),
    }
}
