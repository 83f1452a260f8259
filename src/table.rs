use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::affinity::Affinity;
use crate::column::ColumnType;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::row::RowType;
use crate::storage_class::store_as_storage_class;
use crate::value::{HostValue, Value};

/// A named collection of rows keyed by primary key.
///
/// Rows are kept in insertion order. Tables without a declared primary key
/// get an implicit INTEGER autoincrement key column (`rowid` by default).
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    columns: Arc<[ColumnType]>,
    primary_key: String,
    synthetic_key: bool,
    /// Insertion slot -> (primary key, row).
    rows: BTreeMap<u64, (Value, RowType)>,
    /// Primary key -> insertion slot.
    keys: HashMap<Value, u64>,
    next_slot: u64,
    /// Every key ever issued or accepted, including deleted ones.
    used_keys: HashSet<Value>,
    cursor: i64,
    config: Config,
}

impl Table {
    /// Creates an empty table with the default configuration.
    ///
    /// # Errors
    /// Returns [Error::SchemaMismatch] if the name is blank, the schema is
    /// empty, column names repeat, the primary key is not a column, or the
    /// implicit key column would clash with a declared one.
    pub fn new(
        name: impl Into<String>,
        columns: Vec<ColumnType>,
        primary_key: Option<&str>,
    ) -> Result<Self> {
        Self::with_config(name, columns, primary_key, Config::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        mut columns: Vec<ColumnType>,
        primary_key: Option<&str>,
        config: Config,
    ) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::schema_mismatch("table name cannot be empty"));
        }
        if columns.is_empty() {
            return Err(Error::schema_mismatch(format!(
                "table {name} must declare at least one column"
            )));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = columns.iter().find(|c| !seen.insert(c.name())) {
            return Err(Error::schema_mismatch(format!(
                "column {} declared twice in table {name}",
                dup.name()
            )));
        }

        let (primary_key, synthetic_key) = match primary_key {
            Some(key) => {
                if !columns.iter().any(|c| c.name() == key) {
                    return Err(Error::schema_mismatch(format!(
                        "primary key {key} is not a column of table {name}"
                    )));
                }
                (key.to_string(), false)
            }
            None => {
                let rowid = config.rowid_column.clone();
                if columns.iter().any(|c| c.name() == rowid) {
                    return Err(Error::schema_mismatch(format!(
                        "column {rowid} clashes with the implicit primary key of table {name}"
                    )));
                }
                columns.insert(0, ColumnType::rowid(&rowid));
                (rowid, true)
            }
        };

        debug!(table = %name, columns = columns.len(), primary_key = %primary_key, "table created");

        Ok(Self {
            name,
            columns: columns.into(),
            primary_key,
            synthetic_key,
            rows: BTreeMap::new(),
            keys: HashMap::new(),
            next_slot: 0,
            used_keys: HashSet::new(),
            cursor: config.autoincrement_start,
            config,
        })
    }

    /// Creates a table and inserts `rows` in order.
    pub fn with_rows(
        name: impl Into<String>,
        columns: Vec<ColumnType>,
        primary_key: Option<&str>,
        rows: impl IntoIterator<Item = RowType>,
    ) -> Result<Self> {
        let mut table = Self::new(name, columns, primary_key)?;
        table.insert_rows(rows)?;
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rename(&mut self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::schema_mismatch("table name cannot be empty"));
        }
        debug!(from = %self.name, to = %name, "table renamed");
        self.name = name;
        Ok(())
    }

    /// The full schema, including the implicit key column if any.
    pub fn get_columns(&self) -> &[ColumnType] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnType> {
        self.columns.iter().find(|c| c.name() == name)
    }

    pub(crate) fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name() == name)
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Whether the primary key column was generated rather than declared.
    pub fn has_implicit_key(&self) -> bool {
        self.synthetic_key
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn key_column(&self) -> &ColumnType {
        // The primary key always names a schema column.
        self.columns
            .iter()
            .find(|c| c.name() == self.primary_key)
            .unwrap_or(&self.columns[0])
    }

    fn generates_keys(&self) -> bool {
        self.key_column().affinity() == Affinity::Integer
    }

    /// Builds a row against this table's schema.
    ///
    /// Columns missing from `data` are treated as NULL, so defaults apply.
    /// The primary key may be left out; it is resolved on insert.
    pub fn row<K, V>(&self, data: impl IntoIterator<Item = (K, V)>) -> Result<RowType>
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        let mut data: HashMap<String, HostValue> = data
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        for column in self.columns.iter() {
            data.entry(column.name().to_string())
                .or_insert(HostValue::Null);
        }
        RowType::build(Arc::clone(&self.columns), data, Some(&self.primary_key))
    }

    /// Builds a row from `data` and inserts it under a resolved key.
    pub fn insert<K, V>(&mut self, data: impl IntoIterator<Item = (K, V)>) -> Result<Value>
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        let row = self.row(data)?;
        self.insert_row(row, None)
    }

    /// Inserts a validated row and returns its primary key.
    ///
    /// The key is the explicit `key` if given, else the row's own key cell,
    /// else a generated one when the key column is INTEGER.
    ///
    /// # Errors
    /// - [Error::SchemaMismatch] if the row was built for another schema.
    /// - [Error::NullConstraintViolation] if `key` is explicitly NULL.
    /// - [Error::DuplicateKey] if the key is live, or is an INTEGER key that
    ///   was issued before.
    /// - [Error::PrimaryKeyRequired] if no key is available for a
    ///   non-INTEGER key column.
    pub fn insert_row(&mut self, mut row: RowType, key: Option<HostValue>) -> Result<Value> {
        if row.columns() != &self.columns[..] {
            return Err(Error::schema_mismatch(format!(
                "row columns do not match the schema of table {}",
                self.name
            )));
        }
        if key.as_ref().is_some_and(HostValue::is_null) {
            return Err(Error::NullConstraintViolation {
                column: self.primary_key.clone(),
            });
        }

        let explicit = key.or_else(|| {
            row.get(&self.primary_key)
                .filter(|v| !v.is_null())
                .map(HostValue::from)
        });

        let key = match explicit {
            Some(raw) => self.accept_key(raw)?,
            None if self.generates_keys() => self.autoincrement_integer_primary_key()?,
            None => {
                return Err(Error::PrimaryKeyRequired {
                    column: self.primary_key.clone(),
                });
            }
        };

        row.set(&self.primary_key, key.clone())?;
        self.used_keys.insert(key.clone());

        let slot = self.next_slot;
        self.next_slot += 1;
        self.keys.insert(key.clone(), slot);
        self.rows.insert(slot, (key.clone(), row));

        debug!(table = %self.name, key = %key, "row inserted");
        Ok(key)
    }

    fn accept_key(&mut self, raw: HostValue) -> Result<Value> {
        let key = self.key_column().resolve(raw, true)?;
        let reused = self.generates_keys() && self.used_keys.contains(&key);
        if self.keys.contains_key(&key) || reused {
            return Err(Error::DuplicateKey {
                table: self.name.clone(),
                key: key.to_string(),
            });
        }
        if let Value::Integer(i) = key {
            self.cursor = self.cursor.max(i.saturating_add(1));
        }
        Ok(key)
    }

    /// Inserts rows one at a time. Rows inserted before a failure stay.
    pub fn insert_rows(&mut self, rows: impl IntoIterator<Item = RowType>) -> Result<Vec<Value>> {
        rows.into_iter()
            .map(|row| self.insert_row(row, None))
            .collect()
    }

    /// Issues the next unused INTEGER key and advances the cursor past it.
    ///
    /// Keys are never reused, even after the row holding them is deleted.
    pub fn autoincrement_integer_primary_key(&mut self) -> Result<Value> {
        let mut candidate = self.cursor;
        loop {
            let key = Value::Integer(candidate);
            if !self.used_keys.contains(&key) && !self.keys.contains_key(&key) {
                self.cursor = candidate.saturating_add(1);
                trace!(table = %self.name, key = candidate, "autoincrement key issued");
                return Ok(key);
            }
            candidate = candidate.checked_add(1).ok_or_else(|| {
                Error::type_mismatch(format!(
                    "autoincrement keys exhausted for table {}",
                    self.name
                ))
            })?;
        }
    }

    /// Maps a lookup key onto the stored key, if it can be one. Strict key
    /// columns store keys in their host type, so that form is tried too.
    fn lookup(&self, key: &HostValue) -> Option<u64> {
        let coerced = self.key_column().affinity().coerce(key).ok();
        let native = store_as_storage_class(key).ok();
        [coerced, native]
            .into_iter()
            .flatten()
            .find_map(|k| self.keys.get(&k).copied())
    }

    fn not_found(&self, key: &HostValue) -> Error {
        Error::RowNotFound {
            table: self.name.clone(),
            key: format!("{key:?}"),
        }
    }

    pub fn contains_key(&self, key: impl Into<HostValue>) -> bool {
        self.lookup(&key.into()).is_some()
    }

    pub fn get_row(&self, key: impl Into<HostValue>) -> Option<&RowType> {
        let slot = self.lookup(&key.into())?;
        self.rows.get(&slot).map(|(_, row)| row)
    }

    /// Iterates over `(key, row)` pairs in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = (&Value, &RowType)> {
        self.rows.values().map(|(key, row)| (key, row))
    }

    /// Replaces the given fields of one row.
    ///
    /// New values are stored the way the column stores them (coerced when
    /// lax, checked when strict) but skip the NULL and default checks of row
    /// construction. The primary key cannot change.
    pub fn update_row<K, V>(
        &mut self,
        key: impl Into<HostValue>,
        updates: impl IntoIterator<Item = (K, V)>,
    ) -> Result<()>
    where
        K: Into<String>,
        V: Into<HostValue>,
    {
        let key = key.into();
        let slot = self.lookup(&key).ok_or_else(|| self.not_found(&key))?;

        let mut changes = Vec::new();
        for (field, value) in updates {
            let field = field.into();
            let column = self
                .column(&field)
                .ok_or_else(|| Error::FieldNotFound(field.clone()))?;
            if field == self.primary_key {
                return Err(Error::schema_mismatch(format!(
                    "primary key {field} of table {} cannot be updated",
                    self.name
                )));
            }
            let stored = column.store(value.into())?;
            changes.push((field, stored));
        }

        let missing = self.not_found(&key);
        let (_, row) = self.rows.get_mut(&slot).ok_or(missing)?;
        if row.schema() != &self.columns {
            return Err(Error::schema_mismatch(format!(
                "row no longer matches the schema of table {}",
                self.name
            )));
        }
        for (field, value) in changes {
            row.set(&field, value)?;
        }

        debug!(table = %self.name, key = ?key, "row updated");
        Ok(())
    }

    /// Removes a row and returns it. Its key stays reserved.
    pub fn delete_row(&mut self, key: impl Into<HostValue>) -> Result<RowType> {
        let key = key.into();
        let slot = self.lookup(&key).ok_or_else(|| self.not_found(&key))?;
        let (stored, row) = self.rows.remove(&slot).ok_or_else(|| self.not_found(&key))?;
        self.keys.remove(&stored);

        debug!(table = %self.name, key = %stored, "row deleted");
        Ok(row)
    }

    /// Values of one column across all rows, in insertion order.
    pub fn get_column_data(&self, column: &str) -> Result<Vec<Value>> {
        let index = self.column_index(column).ok_or_else(|| {
            Error::schema_mismatch(format!("table {} has no column {column}", self.name))
        })?;
        Ok(self
            .rows
            .values()
            .map(|(_, row)| row.values()[index].clone())
            .collect())
    }
}
