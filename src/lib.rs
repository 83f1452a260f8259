//! An embeddable, in-memory query engine with SQLite-style typing.
//!
//! Tables live in a [Database]. Every cell is stored as one of five storage
//! classes ([Value]) after passing through its column's [Affinity]. Queries
//! are built with the fluent [Query] builder or with typed [Field]
//! conditions, and run as a full scan: FILTER, ORDER, LIMIT, PROJECT.

pub mod affinity;
pub mod aggregate;
pub mod ast;
pub mod column;
pub mod config;
pub mod database;
pub mod error;
pub mod eval;
pub mod parser;
pub mod query;
pub mod row;
pub mod storage_class;
pub mod table;
pub mod tokenizer;
pub mod value;

pub use affinity::Affinity;
pub use aggregate::{Aggregate, AggregateArg, AggregateFunction};
pub use ast::{
    ArithOp, Compare, Condition, ConditionOp, Expression, Field, Operand, Term, VirtualColumn,
};
pub use column::ColumnType;
pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};
pub use query::{Direction, Query, QueryResult, SelectItem, SelectPlan, Where};
pub use row::RowType;
pub use storage_class::{StorageClass, store_as_storage_class};
pub use table::Table;
pub use value::{HostValue, Value};
