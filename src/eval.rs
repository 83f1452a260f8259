//! Columnar evaluation of operands against a [Database].
//!
//! Every operand evaluates to a vector of values, one per row of the table
//! it reads from. A vector of length one is a scalar and is broadcast to the
//! length of the other side.

use std::cmp::Ordering;

use bitvec::prelude::*;
use regex::Regex;
use tracing::trace;

use crate::ast::{ArithOp, Condition, ConditionOp, Expression, Field, Operand, VirtualColumn};
use crate::database::Database;
use crate::error::{Error, Result};
use crate::storage_class::store_as_storage_class;
use crate::value::Value;

impl Field {
    /// Reads the column this field names.
    ///
    /// # Errors
    /// [Error::TableNotFound] or [Error::SchemaMismatch] when the table or
    /// column does not exist.
    pub fn evaluate(&self, db: &Database) -> Result<Vec<Value>> {
        db.get_table(&self.table)?.get_column_data(&self.column)
    }
}

impl Expression {
    pub fn evaluate(&self, db: &Database) -> Result<VirtualColumn> {
        let left = self.left.evaluate(db)?;
        let right = self.right.evaluate(db)?;
        let data = paired(&left, &right)?
            .map(|(l, r)| arithmetic(self.op, l, r))
            .collect::<Result<Vec<_>>>()?;
        Ok(VirtualColumn::new(data).alias(self.name()))
    }
}

impl Condition {
    /// Evaluates the condition into one bit per row.
    pub fn evaluate(&self, db: &Database) -> Result<BitVec> {
        match self.op {
            ConditionOp::And | ConditionOp::Or => {
                let left = mask_of(&self.left, db)?;
                let right = mask_of(&self.right, db)?;
                combine(left, right, self.op)
            }
            ConditionOp::Between | ConditionOp::NotBetween => self.evaluate_between(db),
            ConditionOp::Like | ConditionOp::NotLike => self.evaluate_like(db),
            ConditionOp::In | ConditionOp::NotIn => self.evaluate_in(db),
            op => {
                let left = self.left.evaluate(db)?;
                let right = self.right.evaluate(db)?;
                paired(&left, &right)?
                    .map(|(l, r)| compare(op, l, r))
                    .collect()
            }
        }
    }

    /// Evaluates the condition as INTEGER 1/0 values.
    pub fn evaluate_column(&self, db: &Database) -> Result<VirtualColumn> {
        let mask = self.evaluate(db)?;
        let data = mask
            .iter()
            .map(|bit| Value::Integer(i64::from(*bit)))
            .collect();
        Ok(VirtualColumn::new(data).alias(self.name()))
    }

    fn evaluate_between(&self, db: &Database) -> Result<BitVec> {
        let Operand::Condition(range) = &self.right else {
            return Err(Error::type_mismatch("BETWEEN needs a low AND high range"));
        };
        let values = self.left.evaluate(db)?;
        let low = range.left.evaluate(db)?;
        let high = range.right.evaluate(db)?;

        let n = broadcast_len(broadcast_len(values.len(), low.len())?, high.len())?;
        let negate = self.op == ConditionOp::NotBetween;
        (0..n)
            .map(|i| {
                let (v, lo, hi) = (at(&values, i), at(&low, i), at(&high, i));
                if v.is_null() || lo.is_null() || hi.is_null() {
                    return Ok(false);
                }
                let inside = compare(ConditionOp::Ge, v, lo)? && compare(ConditionOp::Le, v, hi)?;
                Ok(inside != negate)
            })
            .collect()
    }

    fn evaluate_like(&self, db: &Database) -> Result<BitVec> {
        let pattern = match &self.right {
            Operand::Literal(raw) => match store_as_storage_class(raw)? {
                Value::Text(p) => p,
                other => {
                    return Err(Error::type_mismatch(format!(
                        "LIKE pattern must be TEXT, got {}",
                        other.type_name()
                    )));
                }
            },
            other => {
                return Err(Error::type_mismatch(format!(
                    "LIKE pattern must be a literal, got {other}"
                )));
            }
        };
        let regex = like_regex(&pattern)?;
        let negate = self.op == ConditionOp::NotLike;

        let values = self.left.evaluate(db)?;
        Ok(values
            .iter()
            .map(|value| match like_text(value) {
                Some(text) => regex.is_match(&text) != negate,
                None => {
                    trace!(value = %value, "LIKE on non-text value evaluates to false");
                    false
                }
            })
            .collect())
    }

    fn evaluate_in(&self, db: &Database) -> Result<BitVec> {
        let values = self.left.evaluate(db)?;
        let set = self.right.evaluate(db)?;
        let negate = self.op == ConditionOp::NotIn;
        Ok(values
            .iter()
            .map(|value| {
                if value.is_null() {
                    return false;
                }
                set.iter().any(|candidate| value.sql_eq(candidate)) != negate
            })
            .collect())
    }
}

impl Operand {
    /// Evaluates the operand into a vector of values.
    ///
    /// Literals evaluate to a single value, conditions to INTEGER 1/0 and
    /// subqueries to their first projected column.
    pub fn evaluate(&self, db: &Database) -> Result<Vec<Value>> {
        match self {
            Operand::Field(field) => field.evaluate(db),
            Operand::Expression(expr) => Ok(expr.evaluate(db)?.into_data()),
            Operand::Condition(cond) => Ok(cond.evaluate_column(db)?.into_data()),
            Operand::Column(column) => Ok(column.data().to_vec()),
            Operand::Literal(raw) => Ok(vec![store_as_storage_class(raw)?]),
            Operand::List(values) => values.iter().map(store_as_storage_class).collect(),
            Operand::Subquery(plan) => plan.materialize_column(db),
        }
    }
}

fn mask_of(operand: &Operand, db: &Database) -> Result<BitVec> {
    match operand {
        Operand::Condition(cond) => cond.evaluate(db),
        other => Err(Error::type_mismatch(format!(
            "{other} is not a condition"
        ))),
    }
}

/// Resolves the common length of two vectors, broadcasting length one.
pub(crate) fn broadcast_len(left: usize, right: usize) -> Result<usize> {
    match (left, right) {
        (l, r) if l == r => Ok(l),
        (1, r) => Ok(r),
        (l, 1) => Ok(l),
        (left, right) => Err(Error::ArityMismatch { left, right }),
    }
}

fn at(values: &[Value], i: usize) -> &Value {
    if values.len() == 1 { &values[0] } else { &values[i] }
}

fn paired<'a>(
    left: &'a [Value],
    right: &'a [Value],
) -> Result<impl Iterator<Item = (&'a Value, &'a Value)>> {
    let n = broadcast_len(left.len(), right.len())?;
    Ok((0..n).map(move |i| (at(left, i), at(right, i))))
}

/// Stretches a mask to `n` rows if it is a scalar.
pub(crate) fn fit_mask(mask: BitVec, n: usize) -> Result<BitVec> {
    match mask.len() {
        len if len == n => Ok(mask),
        1 => Ok(BitVec::repeat(mask[0], n)),
        len => Err(Error::ArityMismatch { left: len, right: n }),
    }
}

fn combine(left: BitVec, right: BitVec, op: ConditionOp) -> Result<BitVec> {
    let n = broadcast_len(left.len(), right.len())?;
    let mut left = fit_mask(left, n)?;
    let right = fit_mask(right, n)?;
    match op {
        ConditionOp::Or => left |= right.as_bitslice(),
        _ => left &= right.as_bitslice(),
    }
    Ok(left)
}

/// Compares two cells. NULL never matches an ordering or equality test.
fn compare(op: ConditionOp, left: &Value, right: &Value) -> Result<bool> {
    match op {
        ConditionOp::Is => return Ok(left.sql_eq(right)),
        ConditionOp::IsNot => return Ok(!left.sql_eq(right)),
        _ => {}
    }
    if left.is_null() || right.is_null() {
        return Ok(false);
    }
    Ok(match op {
        ConditionOp::Eq => left.sql_eq(right),
        ConditionOp::Ne => !left.sql_eq(right),
        ConditionOp::Lt => left.try_cmp(right)? == Ordering::Less,
        ConditionOp::Gt => left.try_cmp(right)? == Ordering::Greater,
        ConditionOp::Le => left.try_cmp(right)? != Ordering::Greater,
        ConditionOp::Ge => left.try_cmp(right)? != Ordering::Less,
        other => {
            return Err(Error::type_mismatch(format!(
                "{} is not a comparison",
                other.symbol()
            )));
        }
    })
}

fn arithmetic(op: ArithOp, left: &Value, right: &Value) -> Result<Value> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Integer(a), Value::Integer(b)) = (left, right) {
        let (a, b) = (*a, *b);
        let exact = match op {
            ArithOp::Add => a.checked_add(b),
            ArithOp::Sub => a.checked_sub(b),
            ArithOp::Mul => a.checked_mul(b),
            ArithOp::Div if b == 0 => return Ok(Value::Null),
            ArithOp::Div => return Ok(Value::Real(a as f64 / b as f64)),
            ArithOp::Rem if b == 0 => return Ok(Value::Null),
            // i64::MIN % -1 overflows but is mathematically zero.
            ArithOp::Rem => Some(a.checked_rem(b).unwrap_or(0)),
        };
        if let Some(v) = exact {
            return Ok(Value::Integer(v));
        }
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(Error::type_mismatch(format!(
            "cannot apply {} to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };
    Ok(match op {
        ArithOp::Add => Value::Real(a + b),
        ArithOp::Sub => Value::Real(a - b),
        ArithOp::Mul => Value::Real(a * b),
        ArithOp::Div | ArithOp::Rem if b == 0.0 => Value::Null,
        ArithOp::Div => Value::Real(a / b),
        ArithOp::Rem => Value::Real(a % b),
    })
}

/// Compiles a LIKE pattern: `%` matches any run, `_` any single character.
pub(crate) fn like_regex(pattern: &str) -> Result<Regex> {
    let mut re = String::from("(?s)^");
    for ch in pattern.chars() {
        match ch {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            c => re.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| Error::Syntax(format!("bad LIKE pattern {pattern:?}: {e}")))
}

fn like_text(value: &Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s.to_string()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        _ => None,
    }
}
