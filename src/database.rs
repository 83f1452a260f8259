use std::collections::HashMap;

use tracing::debug;

use crate::column::ColumnType;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::table::Table;

/// A named collection of tables, the root every query is executed against.
#[derive(Debug, Clone, Default)]
pub struct Database {
    name: String,
    /// A map of table names to their respective [Table] structures.
    tables: HashMap<String, Table>,
    config: Config,
}

impl Database {
    /// Creates a new, empty database with the default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, Config::default())
    }

    pub fn with_config(name: impl Into<String>, config: Config) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
            config,
        }
    }

    /// Creates a database holding `tables`.
    ///
    /// # Errors
    /// Returns [Error::DuplicateTable] if two tables share a name.
    pub fn with_tables(name: impl Into<String>, tables: Vec<Table>) -> Result<Self> {
        let mut db = Self::new(name);
        for table in tables {
            db.add_table(table)?;
        }
        Ok(db)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Creates a new table using this database's configuration.
    ///
    /// # Errors
    /// Returns [Error::DuplicateTable] if the name is taken, or any schema
    /// error from [Table::with_config].
    pub fn create_table(
        &mut self,
        name: &str,
        columns: Vec<ColumnType>,
        primary_key: Option<&str>,
    ) -> Result<&mut Table> {
        if self.tables.contains_key(name) {
            return Err(Error::DuplicateTable(name.to_string()));
        }
        let table = Table::with_config(name, columns, primary_key, self.config.clone())?;
        self.add_table(table)?;
        self.get_table_mut(name)
    }

    /// Adds an existing table under its own name.
    pub fn add_table(&mut self, table: Table) -> Result<()> {
        if self.tables.contains_key(table.name()) {
            return Err(Error::DuplicateTable(table.name().to_string()));
        }
        debug!(database = %self.name, table = %table.name(), "table added");
        self.tables.insert(table.name().to_string(), table);
        Ok(())
    }

    /// Retrieves a reference to a table by name.
    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Retrieves a mutable reference to a table by name.
    pub fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))
    }

    /// Removes a table and returns it.
    ///
    /// Creating a table with the same name afterwards starts from a fresh
    /// autoincrement history.
    pub fn delete_table(&mut self, name: &str) -> Result<Table> {
        let table = self
            .tables
            .remove(name)
            .ok_or_else(|| Error::TableNotFound(name.to_string()))?;
        debug!(database = %self.name, table = %name, "table removed");
        Ok(table)
    }

    /// Swaps in `table` for the existing table `name` and returns the old one.
    ///
    /// # Errors
    /// - [Error::TableNotFound] if no table is called `name`.
    /// - [Error::SchemaMismatch] if `table` carries a different name.
    pub fn replace_table(&mut self, name: &str, table: Table) -> Result<Table> {
        if table.name() != name {
            return Err(Error::schema_mismatch(format!(
                "cannot store table {} under the name {name}",
                table.name()
            )));
        }
        let slot = self.get_table_mut(name)?;
        let old = std::mem::replace(slot, table);
        debug!(database = %self.name, table = %name, "table replaced");
        Ok(old)
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Returns the names of all tables, sorted.
    pub fn list_tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn table_count(&self) -> usize {
        self.tables.len()
    }
}
