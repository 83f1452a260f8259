use std::fmt::Display;
use std::ops::{Add, BitAnd, BitOr, Div, Mul, Rem, Sub};

use crate::error::{Error, Result};
use crate::query::SelectPlan;
use crate::value::{HostValue, Value};

/// A reference to a column of a table, resolved when evaluated.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub table: String,
    pub column: String,
}

impl Field {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Arithmetic operators usable in an [Expression].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl ArithOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
            ArithOp::Rem => "%",
        }
    }
}

/// Comparison, logical and keyword operators usable in a [Condition].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Is,
    IsNot,
    Like,
    NotLike,
    In,
    NotIn,
    Between,
    NotBetween,
}

impl ConditionOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            ConditionOp::Eq => "=",
            ConditionOp::Ne => "!=",
            ConditionOp::Lt => "<",
            ConditionOp::Gt => ">",
            ConditionOp::Le => "<=",
            ConditionOp::Ge => ">=",
            ConditionOp::And => "AND",
            ConditionOp::Or => "OR",
            ConditionOp::Is => "IS",
            ConditionOp::IsNot => "IS NOT",
            ConditionOp::Like => "LIKE",
            ConditionOp::NotLike => "NOT LIKE",
            ConditionOp::In => "IN",
            ConditionOp::NotIn => "NOT IN",
            ConditionOp::Between => "BETWEEN",
            ConditionOp::NotBetween => "NOT BETWEEN",
        }
    }
}

/// A materialized, possibly aliased vector of values.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualColumn {
    data: Vec<Value>,
    alias: Option<String>,
}

impl VirtualColumn {
    pub fn new(data: Vec<Value>) -> Self {
        Self { data, alias: None }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn data(&self) -> &[Value] {
        &self.data
    }

    pub fn into_data(self) -> Vec<Value> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.data.get(index)
    }
}

/// Anything that can sit on either side of an operator.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(Field),
    Expression(Box<Expression>),
    Condition(Box<Condition>),
    Column(VirtualColumn),
    Literal(HostValue),
    /// A literal collection, the right side of IN.
    List(Vec<HostValue>),
    /// A nested query whose first projected column is materialized.
    Subquery(Box<SelectPlan>),
}

impl Display for Operand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Field(field) => write!(f, "{}", field.column),
            Operand::Expression(expr) => write!(f, "{}", expr.name()),
            Operand::Condition(cond) => write!(f, "{}", cond.name()),
            Operand::Column(column) => write!(f, "{}", column.name().unwrap_or("column")),
            Operand::Literal(value) => write_literal(f, value),
            Operand::List(values) => {
                write!(f, "(")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write_literal(f, value)?;
                }
                write!(f, ")")
            }
            Operand::Subquery(_) => write!(f, "(subquery)"),
        }
    }
}

fn write_literal(f: &mut std::fmt::Formatter<'_>, value: &HostValue) -> std::fmt::Result {
    match value.untyped() {
        HostValue::Null => write!(f, "NULL"),
        HostValue::Bool(b) => write!(f, "{b}"),
        HostValue::Int(i) => write!(f, "{i}"),
        HostValue::Float(x) => write!(f, "{x}"),
        HostValue::Str(s) => write!(f, "'{s}'"),
        other => write!(f, "<{}>", other.type_name()),
    }
}

/// An arithmetic node. Evaluates to a [VirtualColumn].
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub(crate) left: Operand,
    pub(crate) op: ArithOp,
    pub(crate) right: Operand,
    alias: Option<String>,
}

impl Expression {
    /// # Errors
    /// Returns [Error::TypeMismatch] if either side is a [Condition].
    pub fn new(left: impl Into<Operand>, op: ArithOp, right: impl Into<Operand>) -> Result<Self> {
        let (left, right) = (left.into(), right.into());
        if let Some(cond) = [&left, &right]
            .into_iter()
            .find(|o| matches!(o, Operand::Condition(_)))
        {
            return Err(Error::type_mismatch(format!(
                "condition {cond} cannot be used in arithmetic"
            )));
        }
        Ok(Self::arith(left, op, right))
    }

    fn arith(left: Operand, op: ArithOp, right: Operand) -> Self {
        Self {
            left,
            op,
            right,
            alias: None,
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// The alias, or `(left op right)` when none was given.
    pub fn name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("({} {} {})", self.left, self.op.symbol(), self.right))
    }
}

/// A boolean node. Evaluates to a row mask.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub(crate) left: Operand,
    pub(crate) op: ConditionOp,
    pub(crate) right: Operand,
    alias: Option<String>,
}

impl Condition {
    /// Builds a condition after checking its operands fit the operator.
    ///
    /// # Errors
    /// Returns [Error::TypeMismatch] when:
    /// - AND/OR are given an operand that is not a condition,
    /// - BETWEEN is not given a `low AND high` range on its right,
    /// - LIKE is not given a text pattern,
    /// - IN is not given a list, a column or a subquery.
    pub fn new(left: impl Into<Operand>, op: ConditionOp, right: impl Into<Operand>) -> Result<Self> {
        let (left, right) = (left.into(), right.into());
        let valid = match op {
            ConditionOp::And | ConditionOp::Or => {
                matches!(left, Operand::Condition(_)) && matches!(right, Operand::Condition(_))
            }
            ConditionOp::Between | ConditionOp::NotBetween => {
                matches!(&right, Operand::Condition(c) if c.op == ConditionOp::And)
            }
            ConditionOp::Like | ConditionOp::NotLike => {
                matches!(&right, Operand::Literal(v) if matches!(v.untyped(), HostValue::Str(_)))
            }
            ConditionOp::In | ConditionOp::NotIn => matches!(
                right,
                Operand::List(_) | Operand::Column(_) | Operand::Subquery(_)
            ),
            _ => true,
        };
        if !valid {
            return Err(Error::type_mismatch(format!(
                "invalid operands for {}: {left} and {right}",
                op.symbol()
            )));
        }
        Ok(Self::unchecked(left, op, right))
    }

    fn unchecked(left: Operand, op: ConditionOp, right: Operand) -> Self {
        Self {
            left,
            op,
            right,
            alias: None,
        }
    }

    /// The `low AND high` pair BETWEEN expects on its right.
    pub(crate) fn range(low: Operand, high: Operand) -> Self {
        Self::unchecked(low, ConditionOp::And, high)
    }

    pub fn op(&self) -> ConditionOp {
        self.op
    }

    pub fn and(self, other: Condition) -> Condition {
        Self::unchecked(self.into(), ConditionOp::And, other.into())
    }

    pub fn or(self, other: Condition) -> Condition {
        Self::unchecked(self.into(), ConditionOp::Or, other.into())
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn name(&self) -> String {
        self.alias
            .clone()
            .unwrap_or_else(|| format!("({} {} {})", self.left, self.op.symbol(), self.right))
    }
}

impl BitAnd for Condition {
    type Output = Condition;

    fn bitand(self, rhs: Condition) -> Condition {
        self.and(rhs)
    }
}

impl BitOr for Condition {
    type Output = Condition;

    fn bitor(self, rhs: Condition) -> Condition {
        self.or(rhs)
    }
}

/// Operands that take part in arithmetic. Conditions are not terms.
pub trait Term: Into<Operand> {}

impl Term for Field {}
impl Term for Expression {}
impl Term for VirtualColumn {}
impl Term for HostValue {}
impl Term for i64 {}
impl Term for i32 {}
impl Term for f64 {}

macro_rules! arith_ops {
    ($($ty:ty),*) => {
        $(
            impl<R: Term> Add<R> for $ty {
                type Output = Expression;
                fn add(self, rhs: R) -> Expression {
                    Expression::arith(self.into(), ArithOp::Add, rhs.into())
                }
            }

            impl<R: Term> Sub<R> for $ty {
                type Output = Expression;
                fn sub(self, rhs: R) -> Expression {
                    Expression::arith(self.into(), ArithOp::Sub, rhs.into())
                }
            }

            impl<R: Term> Mul<R> for $ty {
                type Output = Expression;
                fn mul(self, rhs: R) -> Expression {
                    Expression::arith(self.into(), ArithOp::Mul, rhs.into())
                }
            }

            impl<R: Term> Div<R> for $ty {
                type Output = Expression;
                fn div(self, rhs: R) -> Expression {
                    Expression::arith(self.into(), ArithOp::Div, rhs.into())
                }
            }

            impl<R: Term> Rem<R> for $ty {
                type Output = Expression;
                fn rem(self, rhs: R) -> Expression {
                    Expression::arith(self.into(), ArithOp::Rem, rhs.into())
                }
            }
        )*
    };
}

arith_ops!(Field, Expression, VirtualColumn);

/// Condition constructors shared by every value-producing operand.
pub trait Compare: Into<Operand> + Sized {
    fn compare(self, op: ConditionOp, other: impl Into<Operand>) -> Condition {
        Condition::unchecked(self.into(), op, other.into())
    }

    fn equal(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Eq, other)
    }

    fn not_equal(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Ne, other)
    }

    fn lower(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Lt, other)
    }

    fn greater(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Gt, other)
    }

    fn lower_equal(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Le, other)
    }

    fn greater_equal(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Ge, other)
    }

    fn is(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::Is, other)
    }

    fn is_not(self, other: impl Into<Operand>) -> Condition {
        self.compare(ConditionOp::IsNot, other)
    }

    fn is_null(self) -> Condition {
        self.is(HostValue::Null)
    }

    fn is_not_null(self) -> Condition {
        self.is_not(HostValue::Null)
    }

    fn like(self, pattern: &str) -> Condition {
        self.compare(ConditionOp::Like, pattern)
    }

    fn not_like(self, pattern: &str) -> Condition {
        self.compare(ConditionOp::NotLike, pattern)
    }

    fn in_list<V: Into<HostValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        let values: Vec<HostValue> = values.into_iter().map(Into::into).collect();
        self.compare(ConditionOp::In, values)
    }

    fn not_in_list<V: Into<HostValue>>(self, values: impl IntoIterator<Item = V>) -> Condition {
        let values: Vec<HostValue> = values.into_iter().map(Into::into).collect();
        self.compare(ConditionOp::NotIn, values)
    }

    fn in_query(self, query: impl Into<SelectPlan>) -> Condition {
        self.compare(ConditionOp::In, query.into())
    }

    fn not_in_query(self, query: impl Into<SelectPlan>) -> Condition {
        self.compare(ConditionOp::NotIn, query.into())
    }

    fn between(self, low: impl Into<Operand>, high: impl Into<Operand>) -> Condition {
        self.compare(
            ConditionOp::Between,
            Condition::range(low.into(), high.into()),
        )
    }

    fn not_between(self, low: impl Into<Operand>, high: impl Into<Operand>) -> Condition {
        self.compare(
            ConditionOp::NotBetween,
            Condition::range(low.into(), high.into()),
        )
    }
}

impl Compare for Field {}
impl Compare for Expression {}
impl Compare for VirtualColumn {}

impl From<Field> for Operand {
    fn from(value: Field) -> Self {
        Operand::Field(value)
    }
}

impl From<Expression> for Operand {
    fn from(value: Expression) -> Self {
        Operand::Expression(Box::new(value))
    }
}

impl From<Condition> for Operand {
    fn from(value: Condition) -> Self {
        Operand::Condition(Box::new(value))
    }
}

impl From<VirtualColumn> for Operand {
    fn from(value: VirtualColumn) -> Self {
        Operand::Column(value)
    }
}

impl From<SelectPlan> for Operand {
    fn from(value: SelectPlan) -> Self {
        Operand::Subquery(Box::new(value))
    }
}

impl From<Vec<HostValue>> for Operand {
    fn from(value: Vec<HostValue>) -> Self {
        Operand::List(value)
    }
}

impl From<HostValue> for Operand {
    fn from(value: HostValue) -> Self {
        Operand::Literal(value)
    }
}

macro_rules! literal_operands {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Literal(value.into())
                }
            }
        )*
    };
}

literal_operands!(bool, i32, i64, f64, &str, String);

#[cfg(test)]
mod tests {
    use super::*;

    fn age() -> Field {
        Field::new("people", "age")
    }

    #[test]
    fn test_expression_name() {
        let expr = age() + 1;
        assert_eq!(expr.name(), "(age + 1)");
        assert_eq!(expr.clone().alias("next").name(), "next");

        let nested = (age() * 2) - Field::new("people", "bonus");
        assert_eq!(nested.name(), "((age * 2) - bonus)");
    }

    #[test]
    fn test_expression_rejects_conditions() {
        let cond = age().greater(30);
        let err = Expression::new(cond, ArithOp::Add, 1);
        assert!(matches!(err, Err(Error::TypeMismatch(_))));

        assert!(Expression::new(age(), ArithOp::Mul, 2.5).is_ok());
    }

    #[test]
    fn test_condition_validation() {
        assert!(Condition::new(age(), ConditionOp::And, 1).is_err());
        assert!(Condition::new(age().greater(1), ConditionOp::And, age().lower(9)).is_ok());

        assert!(Condition::new(age(), ConditionOp::Between, 5).is_err());
        assert!(Condition::new(age(), ConditionOp::Between, age().greater(1)).is_err());
        assert!(
            Condition::new(
                age(),
                ConditionOp::Between,
                Condition::range(1.into(), 9.into())
            )
            .is_ok()
        );

        assert!(Condition::new(age(), ConditionOp::Like, 5).is_err());
        assert!(Condition::new(age(), ConditionOp::Like, "3%").is_ok());

        assert!(Condition::new(age(), ConditionOp::In, 5).is_err());
        assert!(Condition::new(age(), ConditionOp::In, vec![HostValue::Int(5)]).is_ok());
    }

    #[test]
    fn test_condition_combinators() {
        let both = age().greater(18) & age().lower(65);
        assert_eq!(both.op(), ConditionOp::And);
        assert_eq!(both.name(), "((age > 18) AND (age < 65))");

        let either = age().is_null() | age().equal(0);
        assert_eq!(either.op(), ConditionOp::Or);
        assert_eq!(either.name(), "((age IS NULL) OR (age = 0))");
    }

    #[test]
    fn test_comparison_constructors() {
        let cases = [
            (age().equal(1), ConditionOp::Eq),
            (age().not_equal(1), ConditionOp::Ne),
            (age().lower(1), ConditionOp::Lt),
            (age().greater(1), ConditionOp::Gt),
            (age().lower_equal(1), ConditionOp::Le),
            (age().greater_equal(1), ConditionOp::Ge),
        ];
        for (condition, op) in cases {
            assert_eq!(condition.op(), op, "{}", condition.name());
        }
        assert_eq!(age().greater_equal(30).name(), "(age >= 30)");
    }

    #[test]
    fn test_keyword_constructors() {
        assert_eq!(age().between(1, 9).name(), "(age BETWEEN (1 AND 9))");
        assert_eq!(age().in_list([1, 2]).name(), "(age IN (1, 2))");
        assert_eq!(
            Field::new("people", "name").not_like("A%").name(),
            "(name NOT LIKE 'A%')"
        );
    }

    #[test]
    fn test_virtual_column() {
        let column = VirtualColumn::new(vec![Value::Integer(1), Value::Null]).alias("v");
        assert_eq!(column.len(), 2);
        assert_eq!(column.name(), Some("v"));
        assert_eq!(column.get(1), Some(&Value::Null));
        assert_eq!((column * 2).name(), "(v * 2)");
    }
}
