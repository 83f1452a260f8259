use thiserror::Error;

/// Result type used across the engine.
pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the engine can surface.
///
/// All errors are raised synchronously at the call that caused them: schema
/// and builder errors when the structure is built, missing tables and fields
/// when a query is executed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A value does not fit an affinity or storage class.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// A row or table does not have the expected set of columns.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A non-nullable column ended up NULL after defaults were applied.
    #[error("NOT NULL constraint failed: {column}")]
    NullConstraintViolation { column: String },

    /// The primary key is live or was already issued.
    #[error("duplicate primary key {key} in table {table}")]
    DuplicateKey { table: String, key: String },

    /// A table with this name already exists in the database.
    #[error("table {0} already exists")]
    DuplicateTable(String),

    /// No key was supplied and the primary key column cannot autoincrement.
    #[error("primary key {column} is required: only INTEGER keys are generated")]
    PrimaryKeyRequired { column: String },

    #[error("no row with primary key {key} in table {table}")]
    RowNotFound { table: String, key: String },

    #[error("no such field: {0}")]
    FieldNotFound(String),

    #[error("no such table: {0}")]
    TableNotFound(String),

    /// SELECT mixes `*`, plain fields or aggregates.
    #[error("ambiguous select: {0}")]
    AmbiguousSelect(String),

    /// A keyword operator targets a predicate that already has an operator.
    #[error("ambiguous operator: {0}")]
    AmbiguousOperator(String),

    /// A keyword operator has no bare predicate to attach to.
    #[error("dangling operator: {0}")]
    DanglingOperator(String),

    /// Two evaluated vectors cannot be broadcast against each other.
    #[error("arity mismatch: left has {left} values, right has {right}")]
    ArityMismatch { left: usize, right: usize },

    #[error("unknown function: {0}")]
    UnknownFunction(String),

    /// Malformed builder argument (predicate text, aggregate call, pattern).
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    pub(crate) fn type_mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }

    pub(crate) fn schema_mismatch(msg: impl Into<String>) -> Self {
        Error::SchemaMismatch(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::TypeMismatch(format!("serialization failed: {value}"))
    }
}
