use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::affinity::Affinity;
use crate::error::{Error, Result};
use crate::storage_class::store_as_storage_class;
use crate::value::{HostValue, Value};

/// Schema of a single column.
///
/// A column is lax by default: values outside its affinity's native types
/// are coerced. A strict column rejects them instead. Columns are
/// non-nullable unless declared otherwise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnType {
    name: String,
    affinity: Affinity,
    strict: bool,
    nullable: bool,
    default: Option<HostValue>,
    autoincrement: bool,
}

impl ColumnType {
    /// Creates a lax, non-nullable column with no default.
    pub fn new(name: impl Into<String>, affinity: Affinity) -> Self {
        Self {
            name: name.into(),
            affinity,
            strict: false,
            nullable: false,
            default: None,
            autoincrement: false,
        }
    }

    /// Creates a column from a declared type name such as `VARCHAR(40)`.
    pub fn declare(name: impl Into<String>, type_name: &str) -> Result<Self> {
        Ok(Self::new(name, Affinity::from_type_name(type_name)?))
    }

    /// The implicit primary key given to tables that declare none.
    pub(crate) fn rowid(name: &str) -> Self {
        Self {
            autoincrement: true,
            ..Self::new(name, Affinity::Integer)
        }
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Value used when a row supplies NULL for this column.
    pub fn default_value(mut self, value: impl Into<HostValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Marks the column as generated on insert.
    ///
    /// # Errors
    /// Returns [Error::TypeMismatch] unless the affinity is INTEGER.
    pub fn autoincrement(mut self) -> Result<Self> {
        if self.affinity != Affinity::Integer {
            return Err(Error::type_mismatch(format!(
                "autoincrement column {} must be INTEGER, not {}",
                self.name,
                self.affinity.name()
            )));
        }
        self.autoincrement = true;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> Option<&HostValue> {
        self.default.as_ref()
    }

    pub fn is_autoincrement(&self) -> bool {
        self.autoincrement
    }

    /// Renames the column in place. The name must not be blank.
    pub fn rename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::schema_mismatch("column name cannot be empty"));
        }
        self.name = name;
        Ok(())
    }

    /// Turns one raw cell into its stored value.
    ///
    /// # Behavior
    /// - NULL is replaced by the default, if any.
    /// - A NULL that remains is rejected on non-nullable columns, unless
    ///   `deferred` is set because the value is generated later.
    /// - Anything else goes through [ColumnType::store].
    pub(crate) fn resolve(&self, raw: HostValue, deferred: bool) -> Result<Value> {
        let raw = match (raw.is_null(), &self.default) {
            (true, Some(default)) => default.clone(),
            _ => raw,
        };

        if raw.is_null() && !self.nullable && !deferred {
            return Err(Error::NullConstraintViolation {
                column: self.name.clone(),
            });
        }
        self.store(raw)
    }

    /// Stores a value in this column without the NULL or default checks.
    ///
    /// A strict column takes only the affinity's native types and stores
    /// them as they are. A lax column coerces through its affinity.
    pub(crate) fn store(&self, raw: HostValue) -> Result<Value> {
        if raw.is_null() {
            return Ok(Value::Null);
        }
        if !self.strict {
            return store_as_storage_class(&HostValue::Typed(self.affinity, Box::new(raw)));
        }
        if !self.affinity.accepts(&raw) {
            return Err(Error::type_mismatch(format!(
                "column {} is strict {} and rejects {} value {:?}",
                self.name,
                self.affinity.name(),
                raw.type_name(),
                raw
            )));
        }
        store_as_storage_class(&raw)
    }

    fn sort_key(&self) -> (&str, Affinity, bool, Option<&HostValue>, bool) {
        (
            &self.name,
            self.affinity,
            self.strict,
            self.default.as_ref(),
            self.nullable,
        )
    }
}

/// Columns compare by name, affinity, strictness, default and nullability.
impl PartialEq for ColumnType {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl PartialOrd for ColumnType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.sort_key().partial_cmp(&other.sort_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─────────────────────────────────────────────────────────────
    // Test 1 : Creation
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_column_new() {
        let col = ColumnType::new("age", Affinity::Integer);

        assert_eq!(col.name(), "age");
        assert_eq!(col.affinity(), Affinity::Integer);
        assert!(!col.is_strict());
        assert!(!col.is_nullable());
        assert!(col.default().is_none());
        assert!(!col.is_autoincrement());
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : declared type names
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_declare() {
        let col = ColumnType::declare("name", "varchar(40)").unwrap();
        assert_eq!(col.affinity(), Affinity::Text);

        assert!(ColumnType::declare("shape", "POLYGON").is_err());
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : autoincrement only on INTEGER
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_autoincrement() {
        let col = ColumnType::new("id", Affinity::Integer).autoincrement().unwrap();
        assert!(col.is_autoincrement());

        let err = ColumnType::new("id", Affinity::Text).autoincrement();
        assert!(matches!(err, Err(Error::TypeMismatch(_))));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : equality and ordering
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_compare() {
        let a = ColumnType::new("a", Affinity::Integer);
        let b = ColumnType::new("b", Affinity::Integer);

        assert_eq!(a, ColumnType::new("a", Affinity::Integer));
        assert_ne!(a, a.clone().nullable(true));
        assert_ne!(a, a.clone().default_value(1));
        assert!(a < b);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 5 : rename
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_rename() {
        let mut col = ColumnType::new("a", Affinity::Text);
        col.rename("b").unwrap();
        assert_eq!(col.name(), "b");

        assert!(col.rename("  ").is_err());
        assert_eq!(col.name(), "b");
    }

    // ─────────────────────────────────────────────────────────────
    // Test 6 : resolving cells
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_resolve() {
        let lax = ColumnType::new("age", Affinity::Integer);
        assert_eq!(lax.resolve("30".into(), false).unwrap(), Value::Integer(30));
        assert!(matches!(
            lax.resolve(HostValue::Null, false),
            Err(Error::NullConstraintViolation { .. })
        ));
        assert_eq!(lax.resolve(HostValue::Null, true).unwrap(), Value::Null);

        let strict = lax.clone().strict(true);
        assert!(matches!(
            strict.resolve("30".into(), false),
            Err(Error::TypeMismatch(_))
        ));
        assert_eq!(strict.resolve(HostValue::Bool(true), false).unwrap(), Value::Integer(1));

        let real = ColumnType::new("x", Affinity::Real).strict(true);
        assert_eq!(real.resolve(5.into(), false).unwrap(), Value::Integer(5));
        assert_eq!(real.resolve(2.5.into(), false).unwrap(), Value::Real(2.5));

        let defaulted = lax.clone().default_value(18);
        assert_eq!(defaulted.resolve(HostValue::Null, false).unwrap(), Value::Integer(18));

        let nullable = lax.nullable(true);
        assert_eq!(nullable.resolve(HostValue::Null, false).unwrap(), Value::Null);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 7 : strict columns store accepted values unchanged
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_strict_store_keeps_native_type() {
        let numeric = ColumnType::new("x", Affinity::Numeric).strict(true);
        assert_eq!(numeric.store("12".into()).unwrap(), Value::text("12"));
        assert_eq!(numeric.store(HostValue::Float(1.5)).unwrap(), Value::Real(1.5));

        let real = ColumnType::new("x", Affinity::Real).strict(true);
        assert_eq!(real.store(HostValue::Bool(true)).unwrap(), Value::Integer(1));
        assert!(matches!(real.store("1.5".into()), Err(Error::TypeMismatch(_))));

        // Lax columns still coerce through the affinity.
        let lax = ColumnType::new("x", Affinity::Numeric);
        assert_eq!(lax.store("12".into()).unwrap(), Value::Integer(12));
        assert_eq!(lax.store(HostValue::Null).unwrap(), Value::Null);
    }
}
