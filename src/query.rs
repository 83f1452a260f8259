//! The SELECT pipeline and its fluent builder.
//!
//! A query runs as one full-table scan through four stages, always in this
//! order: FILTER, ORDER, LIMIT, PROJECT.
//!
//! The builder is a typestate: each clause moves the query into a new state
//! type, so `from` before `select` or a second `where_` do not compile.
//!
//! ```
//! use sqlito::{Affinity, ColumnType, Database, Direction, HostValue, Query, Value};
//!
//! let mut db = Database::new("main");
//! let table = db
//!     .create_table(
//!         "people",
//!         vec![
//!             ColumnType::new("name", Affinity::Text),
//!             ColumnType::new("age", Affinity::Integer),
//!         ],
//!         None,
//!     )
//!     .unwrap();
//! table.insert([("name", HostValue::from("Ann")), ("age", 31.into())]).unwrap();
//! table.insert([("name", HostValue::from("Bob")), ("age", 25.into())]).unwrap();
//!
//! let result = Query::new()
//!     .select(["name"])
//!     .unwrap()
//!     .from("people")
//!     .where_("age > 26")
//!     .unwrap()
//!     .order_by("name", Direction::Asc)
//!     .execute(&db)
//!     .unwrap();
//!
//! assert_eq!(result.rows().unwrap(), &[vec![Value::text("Ann")]]);
//! ```

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::str::FromStr;

use bitvec::prelude::*;
use tracing::{debug, trace, warn};

use crate::aggregate::{Aggregate, AggregateArg};
use crate::ast::{Compare, Condition, ConditionOp, Expression, Field, Operand};
use crate::column::ColumnType;
use crate::database::Database;
use crate::error::{Error, Result};
use crate::eval::fit_mask;
use crate::parser::Predicate;
use crate::table::Table;
use crate::value::{HostValue, Value};

/// Sort direction for ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "ASC" => Ok(Direction::Asc),
            "DESC" => Ok(Direction::Desc),
            _ => Err(Error::Syntax(format!("invalid sort direction {s:?}"))),
        }
    }
}

/// One entry of the SELECT list.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectItem {
    /// Every declared column.
    Star,
    Column(String),
    Aggregate(Aggregate),
    /// An expression projected under its name.
    Computed(Expression),
}

impl SelectItem {
    /// Reads `*`, an aggregate call such as `COUNT(age)`, or a column name.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text == "*" {
            Ok(SelectItem::Star)
        } else if Aggregate::looks_like_call(text) {
            Aggregate::parse(text).map(SelectItem::Aggregate)
        } else if text.is_empty() {
            Err(Error::Syntax("empty select item".into()))
        } else {
            Ok(SelectItem::Column(text.to_string()))
        }
    }
}

/// Conversion into a [SelectItem], which may fail for text.
pub trait IntoSelectItem {
    fn into_select_item(self) -> Result<SelectItem>;
}

impl IntoSelectItem for SelectItem {
    fn into_select_item(self) -> Result<SelectItem> {
        Ok(self)
    }
}

impl IntoSelectItem for &str {
    fn into_select_item(self) -> Result<SelectItem> {
        SelectItem::parse(self)
    }
}

impl IntoSelectItem for String {
    fn into_select_item(self) -> Result<SelectItem> {
        SelectItem::parse(&self)
    }
}

impl IntoSelectItem for Aggregate {
    fn into_select_item(self) -> Result<SelectItem> {
        Ok(SelectItem::Aggregate(self))
    }
}

impl IntoSelectItem for Expression {
    fn into_select_item(self) -> Result<SelectItem> {
        Ok(SelectItem::Computed(self))
    }
}

/// A predicate given to WHERE, AND or OR.
#[derive(Debug, Clone, PartialEq)]
pub enum Where {
    /// `field op value`, or a bare `field` awaiting a keyword operator.
    Text(String),
    Condition(Condition),
}

impl From<&str> for Where {
    fn from(value: &str) -> Self {
        Where::Text(value.to_string())
    }
}

impl From<String> for Where {
    fn from(value: String) -> Self {
        Where::Text(value)
    }
}

impl From<Condition> for Where {
    fn from(value: Condition) -> Self {
        Where::Condition(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Logic {
    And,
    Or,
}

/// Operators attached to a bare field after the fact.
#[derive(Debug, Clone, PartialEq)]
enum KeywordOp {
    Like(String),
    NotLike(String),
    In(Vec<HostValue>),
    NotIn(Vec<HostValue>),
    InQuery(Box<SelectPlan>),
    NotInQuery(Box<SelectPlan>),
    Between(HostValue, HostValue),
    IsNull,
    IsNotNull,
}

#[derive(Debug, Clone, PartialEq)]
enum PredicateOp {
    Compare(ConditionOp, HostValue),
    Keyword(KeywordOp),
}

#[derive(Debug, Clone, PartialEq)]
struct Leaf {
    field: String,
    op: Option<PredicateOp>,
}

/// The WHERE tree. Groups are flat and left-associative.
#[derive(Debug, Clone, PartialEq)]
enum PredicateNode {
    Leaf(Leaf),
    Prebuilt(Condition),
    Group {
        logic: Logic,
        children: Vec<PredicateNode>,
    },
}

impl PredicateNode {
    fn from_where(predicate: Where) -> Result<Self> {
        Ok(match predicate {
            Where::Text(text) => {
                let parsed = Predicate::parse(&text)?;
                PredicateNode::Leaf(Leaf {
                    field: parsed.field,
                    op: parsed
                        .comparison
                        .map(|(op, value)| PredicateOp::Compare(op, value)),
                })
            }
            Where::Condition(condition) => PredicateNode::Prebuilt(condition),
        })
    }
}

/// A fully described SELECT, independent of the builder state it came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectPlan {
    items: Vec<SelectItem>,
    table: String,
    filter: Option<PredicateNode>,
    order: Option<(String, Direction)>,
    limit: Option<usize>,
}

impl SelectPlan {
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn items(&self) -> &[SelectItem] {
        &self.items
    }

    fn push_predicate(&mut self, logic: Logic, node: PredicateNode) {
        self.filter = Some(match self.filter.take() {
            None => node,
            Some(PredicateNode::Group {
                logic: current,
                mut children,
            }) if current == logic => {
                children.push(node);
                PredicateNode::Group { logic, children }
            }
            Some(root) => PredicateNode::Group {
                logic,
                children: vec![root, node],
            },
        });
    }

    /// The most recently added predicate.
    fn last_predicate(&mut self) -> Option<&mut PredicateNode> {
        match self.filter.as_mut()? {
            PredicateNode::Group { children, .. } => children.last_mut(),
            node => Some(node),
        }
    }

    fn attach(&mut self, keyword: &str, op: KeywordOp) -> Result<()> {
        match self.last_predicate() {
            Some(PredicateNode::Leaf(leaf)) => {
                if leaf.op.is_some() {
                    return Err(Error::AmbiguousOperator(format!(
                        "{keyword} cannot apply to {}: it already has an operator",
                        leaf.field
                    )));
                }
                leaf.op = Some(PredicateOp::Keyword(op));
                Ok(())
            }
            Some(_) => Err(Error::DanglingOperator(format!(
                "{keyword} cannot apply to a prebuilt condition"
            ))),
            None => Err(Error::DanglingOperator(format!(
                "{keyword} has no predicate to apply to"
            ))),
        }
    }

    /// Runs the pipeline against `db`.
    ///
    /// # Errors
    /// - [Error::TableNotFound] if the source table does not exist.
    /// - [Error::FieldNotFound] for an unknown field in any clause.
    /// - [Error::TypeMismatch] for incomparable values in WHERE or ORDER BY.
    pub fn execute(&self, db: &Database) -> Result<QueryResult> {
        let table = db.get_table(&self.table)?;
        let n = table.len();

        let mut indices: Vec<usize> = match &self.filter {
            Some(node) => {
                let mask = fit_mask(self.mask(node, table, db)?, n)?;
                mask.iter_ones().collect()
            }
            None => (0..n).collect(),
        };
        trace!(table = %self.table, scanned = n, matched = indices.len(), "filter applied");

        if let Some((field, direction)) = &self.order {
            let keys = column_data(table, field)?;
            sort_indices(&mut indices, &keys, *direction)?;
        }

        if let Some(limit) = self.limit {
            indices.truncate(limit);
        }

        let result = self.project(table, db, &indices)?;
        debug!(table = %self.table, rows = result.len(), "query executed");
        Ok(result)
    }

    /// Runs the query and returns its first projected column, the form a
    /// nested query takes on the right of IN.
    pub fn materialize_column(&self, db: &Database) -> Result<Vec<Value>> {
        Ok(match self.execute(db)? {
            QueryResult::Rows { rows, .. } => rows
                .into_iter()
                .filter_map(|row| row.into_iter().next())
                .collect(),
            QueryResult::Aggregates(values) => values.into_iter().map(|(_, v)| v).collect(),
        })
    }

    fn mask(&self, node: &PredicateNode, table: &Table, db: &Database) -> Result<BitVec> {
        let n = table.len();
        match node {
            PredicateNode::Leaf(leaf) => match self.lower(leaf, table)? {
                Some(condition) => fit_mask(condition.evaluate(db)?, n),
                None => {
                    warn!(field = %leaf.field, "predicate has no operator and matches no rows");
                    Ok(BitVec::repeat(false, n))
                }
            },
            PredicateNode::Prebuilt(condition) => fit_mask(condition.evaluate(db)?, n),
            PredicateNode::Group { logic, children } => {
                let mut acc = BitVec::repeat(*logic == Logic::And, n);
                for child in children {
                    let mask = self.mask(child, table, db)?;
                    match logic {
                        Logic::And => acc &= mask.as_bitslice(),
                        Logic::Or => acc |= mask.as_bitslice(),
                    }
                }
                Ok(acc)
            }
        }
    }

    /// Turns a textual predicate into a condition on the source table.
    /// Returns `None` for a bare field with no operator.
    fn lower(&self, leaf: &Leaf, table: &Table) -> Result<Option<Condition>> {
        let column = table
            .column(&leaf.field)
            .ok_or_else(|| Error::FieldNotFound(leaf.field.clone()))?;
        let field = Field::new(self.table.as_str(), leaf.field.as_str());
        let literal = |raw: &HostValue| Operand::Literal(coerce_literal(column, raw));
        let list = |raw: &[HostValue]| {
            Operand::List(raw.iter().map(|v| coerce_literal(column, v)).collect())
        };

        let Some(op) = &leaf.op else {
            return Ok(None);
        };
        let condition = match op {
            PredicateOp::Compare(op, raw) => field.compare(*op, literal(raw)),
            PredicateOp::Keyword(keyword) => match keyword {
                KeywordOp::Like(pattern) => field.like(pattern),
                KeywordOp::NotLike(pattern) => field.not_like(pattern),
                KeywordOp::In(values) => field.compare(ConditionOp::In, list(values.as_slice())),
                KeywordOp::NotIn(values) => {
                    field.compare(ConditionOp::NotIn, list(values.as_slice()))
                }
                KeywordOp::InQuery(plan) => field.in_query((**plan).clone()),
                KeywordOp::NotInQuery(plan) => field.not_in_query((**plan).clone()),
                KeywordOp::Between(low, high) => field.between(literal(low), literal(high)),
                KeywordOp::IsNull => field.is_null(),
                KeywordOp::IsNotNull => field.is_not_null(),
            },
        };
        Ok(Some(condition))
    }

    fn project(&self, table: &Table, db: &Database, indices: &[usize]) -> Result<QueryResult> {
        if self
            .items
            .iter()
            .all(|item| matches!(item, SelectItem::Aggregate(_)))
        {
            let mut values = Vec::with_capacity(self.items.len());
            for item in &self.items {
                if let SelectItem::Aggregate(aggregate) = item {
                    let source = match &aggregate.argument {
                        AggregateArg::Column(column) => column_data(table, column)?,
                        AggregateArg::Star => column_data(table, table.primary_key())?,
                    };
                    let column = gather(&source, indices);
                    values.push((aggregate.to_string(), aggregate.apply(&column)?));
                }
            }
            return Ok(QueryResult::Aggregates(values));
        }

        let mut names = Vec::new();
        let mut columns = Vec::new();
        for item in &self.items {
            match item {
                SelectItem::Star => {
                    for column in table.get_columns() {
                        if table.has_implicit_key() && column.name() == table.primary_key() {
                            continue;
                        }
                        names.push(column.name().to_string());
                        columns.push(gather(&column_data(table, column.name())?, indices));
                    }
                }
                SelectItem::Column(name) => {
                    names.push(name.clone());
                    columns.push(gather(&column_data(table, name)?, indices));
                }
                SelectItem::Computed(expression) => {
                    let data = expression.evaluate(db)?.into_data();
                    let data = match data.len() {
                        1 => vec![data[0].clone(); indices.len()],
                        len if len == table.len() => gather(&data, indices),
                        len => {
                            return Err(Error::ArityMismatch {
                                left: len,
                                right: table.len(),
                            });
                        }
                    };
                    names.push(expression.name());
                    columns.push(data);
                }
                SelectItem::Aggregate(_) => {
                    return Err(Error::AmbiguousSelect(
                        "aggregates cannot be mixed with plain fields".into(),
                    ));
                }
            }
        }

        let rows = (0..indices.len())
            .map(|r| columns.iter().map(|c| c[r].clone()).collect())
            .collect();
        Ok(QueryResult::Rows {
            columns: names,
            rows,
        })
    }
}

/// Coerces a predicate literal through the column's affinity, keeping the
/// raw literal when it does not fit.
fn coerce_literal(column: &ColumnType, raw: &HostValue) -> HostValue {
    if raw.is_null() {
        return HostValue::Null;
    }
    match column.affinity().coerce(raw) {
        Ok(value) => HostValue::from(&value),
        Err(_) => raw.clone(),
    }
}

fn column_data(table: &Table, column: &str) -> Result<Vec<Value>> {
    if table.column(column).is_none() {
        return Err(Error::FieldNotFound(column.to_string()));
    }
    table.get_column_data(column)
}

fn gather(values: &[Value], indices: &[usize]) -> Vec<Value> {
    indices.iter().map(|&i| values[i].clone()).collect()
}

/// Stable single-key sort. NULLs sort first; the remaining keys must be
/// mutually comparable.
fn sort_indices(indices: &mut [usize], keys: &[Value], direction: Direction) -> Result<()> {
    let mut anchor: Option<&Value> = None;
    for &i in indices.iter() {
        let key = &keys[i];
        if key.is_null() {
            continue;
        }
        match anchor {
            Some(first) => {
                first.try_cmp(key)?;
            }
            None => anchor = Some(key),
        }
    }

    indices.sort_by(|&a, &b| {
        let ord = match (keys[a].is_null(), keys[b].is_null()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => keys[a].try_cmp(&keys[b]).unwrap_or(Ordering::Equal),
        };
        match direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
    Ok(())
}

fn check_selection(items: &[SelectItem]) -> Result<()> {
    if items.is_empty() {
        return Err(Error::Syntax("SELECT needs at least one item".into()));
    }
    let has_star = items.iter().any(|i| matches!(i, SelectItem::Star));
    if has_star && items.len() > 1 {
        return Err(Error::AmbiguousSelect(
            "* cannot be combined with other fields".into(),
        ));
    }
    let aggregates = items
        .iter()
        .filter(|i| matches!(i, SelectItem::Aggregate(_)))
        .count();
    if aggregates > 0 && aggregates < items.len() {
        return Err(Error::AmbiguousSelect(
            "aggregates cannot be mixed with plain fields".into(),
        ));
    }
    Ok(())
}

/// Result of a query: projected rows, or one value per aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    Aggregates(Vec<(String, Value)>),
}

impl QueryResult {
    pub fn columns(&self) -> Vec<&str> {
        match self {
            QueryResult::Rows { columns, .. } => columns.iter().map(String::as_str).collect(),
            QueryResult::Aggregates(values) => values.iter().map(|(k, _)| k.as_str()).collect(),
        }
    }

    pub fn rows(&self) -> Option<&[Vec<Value>]> {
        match self {
            QueryResult::Rows { rows, .. } => Some(rows),
            QueryResult::Aggregates(_) => None,
        }
    }

    /// Value of an aggregate by its expression, e.g. `COUNT(age)`.
    pub fn aggregate(&self, expression: &str) -> Option<&Value> {
        match self {
            QueryResult::Aggregates(values) => values
                .iter()
                .find(|(k, _)| k == expression)
                .map(|(_, v)| v),
            QueryResult::Rows { .. } => None,
        }
    }

    /// Number of result rows; an aggregate result is one row.
    pub fn len(&self) -> usize {
        match self {
            QueryResult::Rows { rows, .. } => rows.len(),
            QueryResult::Aggregates(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Each row as a column name -> value map.
    pub fn rows_as_maps(&self) -> Vec<BTreeMap<String, Value>> {
        match self {
            QueryResult::Rows { columns, rows } => rows
                .iter()
                .map(|row| columns.iter().cloned().zip(row.iter().cloned()).collect())
                .collect(),
            QueryResult::Aggregates(values) => vec![values.iter().cloned().collect()],
        }
    }

    /// Renders rows as an array of objects, aggregates as one object.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        let object = |pairs: Vec<(String, &Value)>| -> Result<serde_json::Value> {
            let mut map = serde_json::Map::new();
            for (k, v) in pairs {
                map.insert(k, serde_json::to_value(v)?);
            }
            Ok(serde_json::Value::Object(map))
        };
        match self {
            QueryResult::Rows { columns, rows } => rows
                .iter()
                .map(|row| object(columns.iter().cloned().zip(row.iter()).collect()))
                .collect::<Result<Vec<_>>>()
                .map(serde_json::Value::Array),
            QueryResult::Aggregates(values) => {
                object(values.iter().map(|(k, v)| (k.clone(), v)).collect())
            }
        }
    }
}

// --- Builder states ---

pub struct Init;
pub struct Selected;
pub struct Sourced;
pub struct Filtered;
pub struct Ordered;
pub struct Limited;

/// States that accept ORDER BY.
pub trait CanOrder {}
impl CanOrder for Sourced {}
impl CanOrder for Filtered {}

/// States that accept LIMIT.
pub trait CanLimit {}
impl CanLimit for Sourced {}
impl CanLimit for Filtered {}
impl CanLimit for Ordered {}

/// States that can run.
pub trait Executable {}
impl Executable for Sourced {}
impl Executable for Filtered {}
impl Executable for Ordered {}
impl Executable for Limited {}

/// Fluent SELECT builder.
pub struct Query<S = Init> {
    plan: SelectPlan,
    _state: PhantomData<S>,
}

impl<S> Query<S> {
    fn into_state<T>(self) -> Query<T> {
        Query {
            plan: self.plan,
            _state: PhantomData,
        }
    }
}

impl Default for Query<Init> {
    fn default() -> Self {
        Self::new()
    }
}

impl Query<Init> {
    pub fn new() -> Self {
        Self {
            plan: SelectPlan::default(),
            _state: PhantomData,
        }
    }

    /// Sets the projection.
    ///
    /// # Errors
    /// - [Error::AmbiguousSelect] if `*` is combined with anything, or
    ///   aggregates with plain fields.
    /// - [Error::UnknownFunction] or [Error::Syntax] for a bad aggregate.
    pub fn select<I>(mut self, items: I) -> Result<Query<Selected>>
    where
        I: IntoIterator,
        I::Item: IntoSelectItem,
    {
        let items = items
            .into_iter()
            .map(IntoSelectItem::into_select_item)
            .collect::<Result<Vec<_>>>()?;
        check_selection(&items)?;
        self.plan.items = items;
        Ok(self.into_state())
    }
}

impl Query<Selected> {
    /// Names the source table. It is resolved when the query executes.
    pub fn from(mut self, table: &str) -> Query<Sourced> {
        self.plan.table = table.to_string();
        self.into_state()
    }
}

impl Query<Sourced> {
    /// Sets the first predicate.
    ///
    /// # Errors
    /// [Error::Syntax] if predicate text does not parse.
    pub fn where_(mut self, predicate: impl Into<Where>) -> Result<Query<Filtered>> {
        let node = PredicateNode::from_where(predicate.into())?;
        self.plan.filter = Some(node);
        Ok(self.into_state())
    }
}

impl Query<Filtered> {
    pub fn and(mut self, predicate: impl Into<Where>) -> Result<Self> {
        let node = PredicateNode::from_where(predicate.into())?;
        self.plan.push_predicate(Logic::And, node);
        Ok(self)
    }

    pub fn or(mut self, predicate: impl Into<Where>) -> Result<Self> {
        let node = PredicateNode::from_where(predicate.into())?;
        self.plan.push_predicate(Logic::Or, node);
        Ok(self)
    }

    fn keyword(mut self, keyword: &str, op: KeywordOp) -> Result<Self> {
        self.plan.attach(keyword, op)?;
        Ok(self)
    }

    pub fn like(self, pattern: &str) -> Result<Self> {
        self.keyword("LIKE", KeywordOp::Like(pattern.to_string()))
    }

    pub fn not_like(self, pattern: &str) -> Result<Self> {
        self.keyword("NOT LIKE", KeywordOp::NotLike(pattern.to_string()))
    }

    pub fn in_<V: Into<HostValue>>(self, values: impl IntoIterator<Item = V>) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.keyword("IN", KeywordOp::In(values))
    }

    pub fn not_in<V: Into<HostValue>>(self, values: impl IntoIterator<Item = V>) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.keyword("NOT IN", KeywordOp::NotIn(values))
    }

    pub fn in_query(self, query: impl Into<SelectPlan>) -> Result<Self> {
        self.keyword("IN", KeywordOp::InQuery(Box::new(query.into())))
    }

    pub fn not_in_query(self, query: impl Into<SelectPlan>) -> Result<Self> {
        self.keyword("NOT IN", KeywordOp::NotInQuery(Box::new(query.into())))
    }

    pub fn between(self, low: impl Into<HostValue>, high: impl Into<HostValue>) -> Result<Self> {
        self.keyword("BETWEEN", KeywordOp::Between(low.into(), high.into()))
    }

    pub fn is_null(self) -> Result<Self> {
        self.keyword("IS NULL", KeywordOp::IsNull)
    }

    pub fn is_not_null(self) -> Result<Self> {
        self.keyword("IS NOT NULL", KeywordOp::IsNotNull)
    }
}

impl<S: CanOrder> Query<S> {
    pub fn order_by(mut self, field: &str, direction: Direction) -> Query<Ordered> {
        self.plan.order = Some((field.to_string(), direction));
        self.into_state()
    }
}

impl<S: CanLimit> Query<S> {
    /// Keeps at most `count` rows. `0` yields an empty result.
    pub fn limit(mut self, count: usize) -> Query<Limited> {
        self.plan.limit = Some(count);
        self.into_state()
    }
}

impl<S: Executable> Query<S> {
    pub fn plan(&self) -> &SelectPlan {
        &self.plan
    }

    pub fn execute(self, db: &Database) -> Result<QueryResult> {
        self.plan.execute(db)
    }
}

impl<S: Executable> From<Query<S>> for SelectPlan {
    fn from(query: Query<S>) -> Self {
        query.plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::Affinity;

    fn people_db() -> Database {
        let mut db = Database::new("main");
        let table = db
            .create_table(
                "people",
                vec![
                    ColumnType::new("id", Affinity::Integer),
                    ColumnType::new("name", Affinity::Text),
                    ColumnType::new("age", Affinity::Integer).nullable(true),
                ],
                Some("id"),
            )
            .unwrap();
        for (name, age) in [("John", 30), ("Jane", 25), ("Alice", 35)] {
            table
                .insert([("name", HostValue::from(name)), ("age", age.into())])
                .unwrap();
        }
        db
    }

    fn select(items: &[&str]) -> Query<Sourced> {
        Query::new()
            .select(items.iter().copied())
            .unwrap()
            .from("people")
    }

    // ─────────────────────────────────────────────────────────────
    // Test 1 : filter and project
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_select_where() {
        let db = people_db();
        let result = select(&["id", "age"])
            .where_("age > 30")
            .unwrap()
            .execute(&db)
            .unwrap();

        let expected: BTreeMap<String, Value> = [
            ("id".to_string(), Value::Integer(3)),
            ("age".to_string(), Value::Integer(35)),
        ]
        .into_iter()
        .collect();
        assert_eq!(result.rows_as_maps(), vec![expected]);
        assert_eq!(result.columns(), vec!["id", "age"]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 2 : star, order and limit
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_star_order_limit() {
        let db = people_db();
        let result = select(&["*"])
            .order_by("age", Direction::Desc)
            .limit(2)
            .execute(&db)
            .unwrap();

        assert_eq!(result.columns(), vec!["id", "name", "age"]);
        assert_eq!(
            result.rows().unwrap(),
            &[
                vec![Value::Integer(3), Value::text("Alice"), Value::Integer(35)],
                vec![Value::Integer(1), Value::text("John"), Value::Integer(30)],
            ]
        );

        let empty = select(&["name"]).limit(0).execute(&db).unwrap();
        assert!(empty.is_empty());
    }

    // ─────────────────────────────────────────────────────────────
    // Test 3 : literals follow the column affinity
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_literal_coercion() {
        let db = people_db();
        let result = select(&["name"])
            .where_("age = '25'")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(result.rows().unwrap(), &[vec![Value::text("Jane")]]);

        let result = select(&["name"])
            .where_("name = Jane")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 4 : left-associative AND / OR
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_and_or_chain() {
        let db = people_db();
        // (age > 26 AND age < 34) OR name = 'Jane'
        let result = select(&["name"])
            .where_("age > 26")
            .unwrap()
            .and("age < 34")
            .unwrap()
            .or("name = 'Jane'")
            .unwrap()
            .order_by("name", Direction::Asc)
            .execute(&db)
            .unwrap();

        assert_eq!(
            result.rows().unwrap(),
            &[vec![Value::text("Jane")], vec![Value::text("John")]]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 5 : keyword operators
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_keyword_operators() {
        let db = people_db();

        let like = select(&["name"]).where_("name").unwrap().like("J%").unwrap();
        assert_eq!(like.execute(&db).unwrap().len(), 2);

        let between = select(&["name"])
            .where_("age")
            .unwrap()
            .between(26, 35)
            .unwrap();
        assert_eq!(between.execute(&db).unwrap().len(), 2);

        let in_list = select(&["name"])
            .where_("id")
            .unwrap()
            .in_([1, 3])
            .unwrap()
            .and("age")
            .unwrap()
            .is_not_null()
            .unwrap();
        assert_eq!(in_list.execute(&db).unwrap().len(), 2);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 6 : builder sequencing errors
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_operator_errors() {
        let err = select(&["name"]).where_("age > 3").unwrap().like("x");
        assert!(matches!(err, Err(Error::AmbiguousOperator(_))));

        let prebuilt = Field::new("people", "age").greater(3);
        let err = select(&["name"]).where_(prebuilt).unwrap().is_null();
        assert!(matches!(err, Err(Error::DanglingOperator(_))));

        assert!(matches!(
            select(&["name"]).where_("age >"),
            Err(Error::Syntax(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 7 : selection validation
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_ambiguous_select() {
        assert!(matches!(
            Query::new().select(["*", "name"]),
            Err(Error::AmbiguousSelect(_))
        ));
        assert!(matches!(
            Query::new().select(["COUNT(age)", "name"]),
            Err(Error::AmbiguousSelect(_))
        ));
        assert!(matches!(
            Query::new().select(["MEDIAN(age)"]),
            Err(Error::UnknownFunction(_))
        ));
        assert!(matches!(
            Query::new().select(Vec::<&str>::new()),
            Err(Error::Syntax(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 8 : execution-time lookups
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_missing_table_and_field() {
        let db = people_db();

        let missing_table = Query::new().select(["name"]).unwrap().from("ghosts");
        assert!(matches!(
            missing_table.execute(&db),
            Err(Error::TableNotFound(_))
        ));

        assert!(matches!(
            select(&["height"]).execute(&db),
            Err(Error::FieldNotFound(_))
        ));
        assert!(matches!(
            select(&["name"]).where_("height > 1").unwrap().execute(&db),
            Err(Error::FieldNotFound(_))
        ));
        assert!(matches!(
            select(&["name"]).order_by("height", Direction::Asc).execute(&db),
            Err(Error::FieldNotFound(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 9 : aggregates
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_aggregates() {
        let db = people_db();
        let result = select(&["COUNT(*)", "SUM(age)", "AVG(age)", "max(age)", "MIN(name)"])
            .execute(&db)
            .unwrap();

        assert_eq!(result.aggregate("COUNT(*)"), Some(&Value::Integer(3)));
        assert_eq!(result.aggregate("SUM(age)"), Some(&Value::Integer(90)));
        assert_eq!(result.aggregate("AVG(age)"), Some(&Value::Real(30.0)));
        assert_eq!(result.aggregate("MAX(age)"), Some(&Value::Integer(35)));
        assert_eq!(result.aggregate("MIN(name)"), Some(&Value::text("Alice")));

        assert!(matches!(
            select(&["SUM(height)"]).execute(&db),
            Err(Error::FieldNotFound(_))
        ));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 10 : COUNT over rows filtered by IS NULL
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_count_where_is_null() {
        let mut db = Database::new("main");
        let table = db
            .create_table(
                "films",
                vec![
                    ColumnType::new("age", Affinity::Integer),
                    ColumnType::new("warnings", Affinity::Text).nullable(true),
                ],
                None,
            )
            .unwrap();
        for i in 0..10 {
            let warning = if i % 5 == 0 { Some("violence") } else { None };
            table
                .insert([("age", HostValue::Int(10 + i)), ("warnings", warning.into())])
                .unwrap();
        }

        let result = Query::new()
            .select(["COUNT(age)"])
            .unwrap()
            .from("films")
            .where_("warnings")
            .unwrap()
            .is_null()
            .unwrap()
            .execute(&db)
            .unwrap();

        assert_eq!(result.aggregate("COUNT(age)"), Some(&Value::Integer(8)));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 11 : LIKE is case-sensitive
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_like_case_sensitive() {
        let mut db = Database::new("main");
        let table = db
            .create_table("films", vec![ColumnType::new("title", Affinity::Text)], None)
            .unwrap();
        table.insert([("title", "Titanic Returns")]).unwrap();
        table.insert([("title", "titanic")]).unwrap();

        let result = Query::new()
            .select(["title"])
            .unwrap()
            .from("films")
            .where_("title")
            .unwrap()
            .like("%Tita%")
            .unwrap()
            .execute(&db)
            .unwrap();

        assert_eq!(result.rows().unwrap(), &[vec![Value::text("Titanic Returns")]]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 12 : prebuilt conditions and computed columns
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_prebuilt_and_computed() {
        let db = people_db();
        let age = || Field::new("people", "age");

        let result = Query::new()
            .select([SelectItem::Computed((age() + 1).alias("next_age"))])
            .unwrap()
            .from("people")
            .where_(age().greater_equal(30) & age().lower(35))
            .unwrap()
            .execute(&db)
            .unwrap();

        assert_eq!(result.columns(), vec!["next_age"]);
        assert_eq!(result.rows().unwrap(), &[vec![Value::Integer(31)]]);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 13 : subqueries on the right of IN
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_in_query() {
        let db = people_db();
        let older = Query::new()
            .select(["id"])
            .unwrap()
            .from("people")
            .where_("age >= 30")
            .unwrap();

        let result = select(&["name"])
            .where_("id")
            .unwrap()
            .in_query(older)
            .unwrap()
            .order_by("name", Direction::Asc)
            .execute(&db)
            .unwrap();

        assert_eq!(
            result.rows().unwrap(),
            &[vec![Value::text("Alice")], vec![Value::text("John")]]
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 14 : bare predicate matches nothing
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_bare_predicate() {
        let db = people_db();
        let result = select(&["name"]).where_("age").unwrap().execute(&db).unwrap();
        assert!(result.is_empty());

        let result = select(&["name"])
            .where_("age")
            .unwrap()
            .or("age < 26")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(result.len(), 1);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 15 : ORDER BY is stable, NULL first, and type-checked
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_order_by_rules() {
        let mut db = Database::new("main");
        let table = db
            .create_table(
                "t",
                vec![
                    ColumnType::new("k", Affinity::Any).nullable(true),
                    ColumnType::new("tag", Affinity::Text),
                ],
                None,
            )
            .unwrap();
        for (k, tag) in [
            (HostValue::Int(2), "a"),
            (HostValue::Null, "b"),
            (HostValue::Float(1.5), "c"),
            (HostValue::Int(2), "d"),
        ] {
            table.insert([("k", k), ("tag", tag.into())]).unwrap();
        }

        let tags = |direction| {
            Query::new()
                .select(["tag"])
                .unwrap()
                .from("t")
                .order_by("k", direction)
                .execute(&db)
                .unwrap()
                .rows()
                .unwrap()
                .iter()
                .map(|r| r[0].to_string())
                .collect::<Vec<_>>()
        };
        assert_eq!(tags(Direction::Asc), vec!["b", "c", "a", "d"]);
        assert_eq!(tags(Direction::Desc), vec!["a", "d", "c", "b"]);

        db.get_table_mut("t")
            .unwrap()
            .insert([("k", HostValue::from("x")), ("tag", "e".into())])
            .unwrap();
        let err = Query::new()
            .select(["tag"])
            .unwrap()
            .from("t")
            .order_by("k", Direction::Asc)
            .execute(&db);
        assert!(matches!(err, Err(Error::TypeMismatch(_))));
    }

    // ─────────────────────────────────────────────────────────────
    // Test 16 : output depends only on the query, not on insert order
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_order_independence() {
        let build = |names: &[(&str, i64)]| {
            let mut db = Database::new("main");
            let table = db
                .create_table(
                    "p",
                    vec![
                        ColumnType::new("name", Affinity::Text),
                        ColumnType::new("age", Affinity::Integer),
                    ],
                    None,
                )
                .unwrap();
            for (name, age) in names {
                table
                    .insert([("name", HostValue::from(*name)), ("age", (*age).into())])
                    .unwrap();
            }
            Query::new()
                .select(["name"])
                .unwrap()
                .from("p")
                .where_("age > 20")
                .unwrap()
                .order_by("name", Direction::Asc)
                .limit(2)
                .execute(&db)
                .unwrap()
        };

        let forward = build(&[("c", 30), ("a", 40), ("b", 10), ("d", 50)]);
        let backward = build(&[("d", 50), ("b", 10), ("a", 40), ("c", 30)]);
        assert_eq!(forward, backward);
    }

    // ─────────────────────────────────────────────────────────────
    // Test 17 : JSON rendering
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_to_json() {
        let db = people_db();
        let rows = select(&["name", "age"])
            .where_("id = 2")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(
            rows.to_json().unwrap(),
            serde_json::json!([{ "name": "Jane", "age": 25 }])
        );

        let aggregates = select(&["COUNT(id)"]).execute(&db).unwrap();
        assert_eq!(
            aggregates.to_json().unwrap(),
            serde_json::json!({ "COUNT(id)": 3 })
        );
    }

    // ─────────────────────────────────────────────────────────────
    // Test 18 : unquoted multi-word and dated values
    // ─────────────────────────────────────────────────────────────
    #[test]
    fn test_where_unquoted_text() {
        let mut db = Database::new("main");
        let table = db
            .create_table(
                "films",
                vec![
                    ColumnType::new("title", Affinity::Text),
                    ColumnType::new("released", Affinity::Text),
                ],
                None,
            )
            .unwrap();
        table
            .insert([("title", "Titanic Returns"), ("released", "2024-01-01")])
            .unwrap();
        table
            .insert([("title", "Titanic"), ("released", "1997-12-19")])
            .unwrap();

        let result = Query::new()
            .select(["title"])
            .unwrap()
            .from("films")
            .where_("title = Titanic Returns")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(result.rows().unwrap(), &[vec![Value::text("Titanic Returns")]]);

        let result = Query::new()
            .select(["title"])
            .unwrap()
            .from("films")
            .where_("released < 2000-01-01")
            .unwrap()
            .execute(&db)
            .unwrap();
        assert_eq!(result.rows().unwrap(), &[vec![Value::text("Titanic")]]);
    }

    #[test]
    fn test_direction_from_str() {
        assert_eq!("desc".parse::<Direction>().unwrap(), Direction::Desc);
        assert!("sideways".parse::<Direction>().is_err());
    }
}
