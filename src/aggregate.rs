use std::cmp::Ordering;
use std::fmt::Display;

use crate::error::{Error, Result};
use crate::value::Value;

/// Supported aggregate functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl AggregateFunction {
    /// Looks a function up by name, ignoring case.
    pub fn from_name(name: &str) -> Result<Self> {
        Ok(match name.to_uppercase().as_str() {
            "COUNT" => Self::Count,
            "SUM" => Self::Sum,
            "AVG" => Self::Avg,
            "MAX" => Self::Max,
            "MIN" => Self::Min,
            _ => return Err(Error::UnknownFunction(name.to_string())),
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Max => "MAX",
            Self::Min => "MIN",
        }
    }
}

/// What an aggregate reads: one column, or every row for `COUNT(*)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateArg {
    Column(String),
    Star,
}

/// An aggregate call such as `SUM(salary)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub function: AggregateFunction,
    pub argument: AggregateArg,
}

impl Aggregate {
    pub fn new(function: AggregateFunction, argument: AggregateArg) -> Self {
        Self { function, argument }
    }

    /// Returns `true` if `text` has the shape of a call, `NAME(arg)`.
    pub fn looks_like_call(text: &str) -> bool {
        let text = text.trim();
        text.contains('(') && text.ends_with(')')
    }

    /// Parses `NAME(arg)`.
    ///
    /// # Errors
    /// - [Error::UnknownFunction] if `NAME` is not an aggregate.
    /// - [Error::Syntax] if the call is malformed, or `*` is given to
    ///   anything but COUNT.
    pub fn parse(text: &str) -> Result<Self> {
        let malformed = || Error::Syntax(format!("malformed aggregate call {text:?}"));

        let body = text.trim().strip_suffix(')').ok_or_else(malformed)?;
        let (name, arg) = body.split_once('(').ok_or_else(malformed)?;
        let (name, arg) = (name.trim(), arg.trim());
        if name.is_empty() || arg.is_empty() || arg.contains(['(', ')']) {
            return Err(malformed());
        }

        let function = AggregateFunction::from_name(name)?;
        let argument = match arg {
            "*" if function == AggregateFunction::Count => AggregateArg::Star,
            "*" => {
                return Err(Error::Syntax(format!(
                    "{}(*) is not supported",
                    function.name()
                )));
            }
            column => AggregateArg::Column(column.to_string()),
        };
        Ok(Self::new(function, argument))
    }

    /// Applies the function to `values`. NULLs are ignored.
    pub fn apply(&self, values: &[Value]) -> Result<Value> {
        let present: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
        <dyn Calculator>::build(self.function).calc(&present)
    }
}

impl Display for Aggregate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.argument {
            AggregateArg::Column(column) => write!(f, "{}({column})", self.function.name()),
            AggregateArg::Star => write!(f, "{}(*)", self.function.name()),
        }
    }
}

/// Computes one aggregate over non-NULL values.
pub trait Calculator {
    fn calc(&self, values: &[&Value]) -> Result<Value>;
}

impl dyn Calculator {
    pub fn build(function: AggregateFunction) -> Box<dyn Calculator> {
        match function {
            AggregateFunction::Count => Box::new(Count),
            AggregateFunction::Sum => Box::new(Sum),
            AggregateFunction::Avg => Box::new(Avg),
            AggregateFunction::Max => Box::new(Extreme(Ordering::Greater)),
            AggregateFunction::Min => Box::new(Extreme(Ordering::Less)),
        }
    }
}

struct Count;

impl Calculator for Count {
    fn calc(&self, values: &[&Value]) -> Result<Value> {
        Ok(Value::Integer(values.len() as i64))
    }
}

struct Sum;

impl Calculator for Sum {
    /// INTEGER while every value is an INTEGER and the total fits, REAL
    /// otherwise. An empty input sums to 0.
    fn calc(&self, values: &[&Value]) -> Result<Value> {
        let mut exact: Option<i64> = Some(0);
        let mut total = 0.0;
        for value in values {
            let x = numeric(value, "SUM")?;
            total += x;
            exact = match (exact, value) {
                (Some(acc), Value::Integer(i)) => acc.checked_add(*i),
                _ => None,
            };
        }
        Ok(exact.map_or(Value::Real(total), Value::Integer))
    }
}

struct Avg;

impl Calculator for Avg {
    fn calc(&self, values: &[&Value]) -> Result<Value> {
        if values.is_empty() {
            return Ok(Value::Null);
        }
        let mut total = 0.0;
        for value in values {
            total += numeric(value, "AVG")?;
        }
        Ok(Value::Real(total / values.len() as f64))
    }
}

/// MAX keeps the greatest value, MIN the least.
struct Extreme(Ordering);

impl Calculator for Extreme {
    fn calc(&self, values: &[&Value]) -> Result<Value> {
        let mut best: Option<&Value> = None;
        for value in values {
            best = match best {
                Some(current) if value.try_cmp(current)? != self.0 => Some(current),
                _ => Some(value),
            };
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }
}

fn numeric(value: &Value, function: &str) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        Error::type_mismatch(format!(
            "{function} needs numeric values, got {}",
            value.type_name()
        ))
    })
}
