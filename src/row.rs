use std::collections::HashMap;
use std::sync::Arc;

use crate::column::ColumnType;
use crate::error::{Error, Result};
use crate::value::{HostValue, Value};

/// A validated row: one stored value per schema column, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowType {
    columns: Arc<[ColumnType]>,
    data: Vec<Value>,
}

impl RowType {
    /// Validates `data` against `columns` and builds the row.
    ///
    /// Every column must be present in `data` (possibly as NULL) and `data`
    /// may not name columns outside the schema. Autoincrement columns may be
    /// NULL; their value is generated when the row is inserted.
    ///
    /// # Errors
    /// - [Error::SchemaMismatch] for a missing or unknown column.
    /// - [Error::NullConstraintViolation] when a non-nullable column is NULL
    ///   after its default is applied.
    /// - [Error::TypeMismatch] when a value does not fit the column.
    ///
    /// # Example
    /// ```
    /// # use sqlito::{Affinity, ColumnType, RowType, Value};
    /// let columns = vec![ColumnType::new("age", Affinity::Integer)];
    /// let row = RowType::new(columns, [("age", "30")]).unwrap();
    /// assert_eq!(row.get("age"), Some(&Value::Integer(30)));
    /// ```
    pub fn new<K, V>(
        columns: impl Into<Arc<[ColumnType]>>,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self>
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        let data = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::build(columns.into(), data, None)
    }

    /// Shared constructor. `deferred_key` names a key column whose value is
    /// filled in on insert, so it may be NULL here.
    pub(crate) fn build(
        columns: Arc<[ColumnType]>,
        mut data: HashMap<String, HostValue>,
        deferred_key: Option<&str>,
    ) -> Result<Self> {
        if let Some(extra) = data
            .keys()
            .find(|name| !columns.iter().any(|c| c.name() == name.as_str()))
        {
            return Err(Error::schema_mismatch(format!(
                "column {extra} is not part of the schema"
            )));
        }

        let mut values = Vec::with_capacity(columns.len());
        for column in columns.iter() {
            let raw = data.remove(column.name()).ok_or_else(|| {
                Error::schema_mismatch(format!("missing value for column {}", column.name()))
            })?;
            let deferred = column.is_autoincrement() || deferred_key == Some(column.name());
            values.push(column.resolve(raw, deferred)?);
        }

        Ok(Self {
            columns,
            data: values,
        })
    }

    pub fn columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub(crate) fn schema(&self) -> &Arc<[ColumnType]> {
        &self.columns
    }

    /// Values in schema order.
    pub fn values(&self) -> &[Value] {
        &self.data
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.position(column).map(|i| &self.data[i])
    }

    /// Iterates over `(column name, value)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .iter()
            .map(ColumnType::name)
            .zip(self.data.iter())
    }

    pub(crate) fn set(&mut self, column: &str, value: Value) -> Result<()> {
        let index = self
            .position(column)
            .ok_or_else(|| Error::FieldNotFound(column.to_string()))?;
        self.data[index] = value;
        Ok(())
    }

    fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::Affinity;

    fn people() -> Vec<ColumnType> {
        vec![
            ColumnType::new("name", Affinity::Text),
            ColumnType::new("age", Affinity::Integer).nullable(true),
            ColumnType::new("score", Affinity::Real).default_value(0.0),
        ]
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : valid row keeps schema order
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_row_new() {
        let row = RowType::new(
            people(),
            [
                ("score", HostValue::from(1.5)),
                ("name", "Ann".into()),
                ("age", 30.into()),
            ],
        )
        .unwrap();

        let names: Vec<_> = row.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["name", "age", "score"]);
        assert_eq!(
            row.values(),
            &[Value::text("Ann"), Value::Integer(30), Value::Real(1.5)]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : missing and extra columns
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_schema_mismatch() {
        let missing = RowType::new(people(), [("name", "Ann")]);
        assert!(matches!(missing, Err(Error::SchemaMismatch(_))));

        let extra = RowType::new(
            people(),
            [
                ("name", HostValue::from("Ann")),
                ("age", HostValue::Null),
                ("score", HostValue::Null),
                ("height", 180.into()),
            ],
        );
        assert!(matches!(extra, Err(Error::SchemaMismatch(_))));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : defaults and nullability
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_defaults_and_nulls() {
        let row = RowType::new(
            people(),
            [
                ("name", HostValue::from("Ann")),
                ("age", HostValue::Null),
                ("score", HostValue::Null),
            ],
        )
        .unwrap();
        assert_eq!(row.get("age"), Some(&Value::Null));
        assert_eq!(row.get("score"), Some(&Value::Real(0.0)));

        let err = RowType::new(
            people(),
            [
                ("name", HostValue::Null),
                ("age", HostValue::Null),
                ("score", HostValue::Null),
            ],
        );
        assert_eq!(
            err,
            Err(Error::NullConstraintViolation {
                column: "name".into()
            })
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : strict columns refuse coercion
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_strict_column() {
        let columns = vec![ColumnType::new("n", Affinity::Integer).strict(true)];

        assert!(matches!(
            RowType::new(columns.clone(), [("n", "5")]),
            Err(Error::TypeMismatch(_))
        ));
        let row = RowType::new(columns, [("n", 5)]).unwrap();
        assert_eq!(row.get("n"), Some(&Value::Integer(5)));

        let columns = vec![
            ColumnType::new("r", Affinity::Real).strict(true),
            ColumnType::new("m", Affinity::Numeric).strict(true),
        ];
        let row = RowType::new(columns, [("r", HostValue::Int(5)), ("m", "12".into())]).unwrap();
        assert_eq!(row.get("r"), Some(&Value::Integer(5)));
        assert_eq!(row.get("m"), Some(&Value::text("12")));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 5 : lax cells land in their affinity's storage class
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_lax_cells_follow_affinity() {
        let row = RowType::new(
            people(),
            [
                ("name", HostValue::Bytes(b"Bo".to_vec())),
                ("age", "41".into()),
                ("score", 7.into()),
            ],
        )
        .unwrap();

        for (column, value) in row.columns().iter().zip(row.values()) {
            assert_eq!(
                value.storage_class().name(),
                column.affinity().name(),
                "column {}",
                column.name()
            );
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Test 6 : autoincrement columns may stay NULL until insert
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_autoincrement_deferred() {
        let columns = vec![
            ColumnType::new("id", Affinity::Integer).autoincrement().unwrap(),
            ColumnType::new("name", Affinity::Text),
        ];
        let mut row = RowType::new(
            columns,
            [("id", HostValue::Null), ("name", "x".into())],
        )
        .unwrap();
        assert_eq!(row.get("id"), Some(&Value::Null));

        row.set("id", Value::Integer(1)).unwrap();
        assert_eq!(row.get("id"), Some(&Value::Integer(1)));
        assert!(matches!(
            row.set("nope", Value::Null),
            Err(Error::FieldNotFound(_))
        ));
    }
}
