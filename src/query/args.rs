use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

use crate::{
    error::{QueryError, Result},
    query::{Builder, ColumnRef, Expression, Operand},
};

/// A closure that receives a fresh builder and returns it with clauses added.
pub type NestedFn<'a> = Box<dyn FnOnce(Builder) -> Result<Builder> + 'a>;

/// Anything that can stand in for a subquery.
pub enum SubQuery<'a> {
    Builder(Box<Builder>),
    Closure(NestedFn<'a>),
    Sql(String),
}

impl<'a> SubQuery<'a> {
    pub fn closure<F>(f: F) -> Self
    where
        F: FnOnce(Builder) -> Result<Builder> + 'a,
    {
        SubQuery::Closure(Box::new(f))
    }
}

impl fmt::Debug for SubQuery<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubQuery::Builder(builder) => f.debug_tuple("Builder").field(builder).finish(),
            SubQuery::Closure(_) => f.write_str("Closure(..)"),
            SubQuery::Sql(sql) => f.debug_tuple("Sql").field(sql).finish(),
        }
    }
}

impl From<Builder> for SubQuery<'_> {
    fn from(value: Builder) -> Self {
        SubQuery::Builder(Box::new(value))
    }
}

impl From<&str> for SubQuery<'_> {
    fn from(value: &str) -> Self {
        SubQuery::Sql(value.to_string())
    }
}

impl From<String> for SubQuery<'_> {
    fn from(value: String) -> Self {
        SubQuery::Sql(value)
    }
}

/// The value side of a `where`: a bindable operand or a subquery.
#[derive(Debug)]
pub enum WhereValue<'a> {
    Operand(Operand),
    Query(SubQuery<'a>),
}

impl<'a> WhereValue<'a> {
    pub fn nested<F>(f: F) -> Self
    where
        F: FnOnce(Builder) -> Result<Builder> + 'a,
    {
        WhereValue::Query(SubQuery::closure(f))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, WhereValue::Operand(operand) if operand.is_null())
    }
}

macro_rules! where_value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for WhereValue<'_> {
                fn from(value: $ty) -> Self {
                    WhereValue::Operand(Operand::from(value))
                }
            }
        )*
    };
}

where_value_from!(
    i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, &str, Value, Expression, NaiveDate, NaiveTime,
    NaiveDateTime,
);

impl<T: Into<Operand>> From<Option<T>> for WhereValue<'_> {
    fn from(value: Option<T>) -> Self {
        WhereValue::Operand(Operand::from(value))
    }
}

impl From<Operand> for WhereValue<'_> {
    fn from(value: Operand) -> Self {
        WhereValue::Operand(value)
    }
}

impl From<Builder> for WhereValue<'_> {
    fn from(value: Builder) -> Self {
        WhereValue::Query(SubQuery::from(value))
    }
}

/// The column side of a `where`, covering every accepted call shape.
#[derive(Debug)]
pub enum WhereColumn<'a> {
    Column(ColumnRef),
    Query(SubQuery<'a>),
    /// Rows of `[column, value]`, `[column, operator, value]`,
    /// `[column, operator, value, boolean]` or `[closure]`.
    List(Vec<Vec<WhereValue<'a>>>),
    /// Column to value pairs, each compared with `=`.
    Map(Vec<(String, WhereValue<'a>)>),
}

impl<'a> WhereColumn<'a> {
    pub fn nested<F>(f: F) -> Self
    where
        F: FnOnce(Builder) -> Result<Builder> + 'a,
    {
        WhereColumn::Query(SubQuery::closure(f))
    }

    pub fn map<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<WhereValue<'a>>,
    {
        WhereColumn::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Reads the leading element of a list-shorthand row.
    pub(crate) fn from_row_head(value: WhereValue<'a>) -> Result<Self> {
        match value {
            WhereValue::Operand(Operand::Value(Value::String(name))) => Ok(WhereColumn::Column(ColumnRef::Name(name))),
            WhereValue::Operand(Operand::Raw(expression)) => Ok(WhereColumn::Column(ColumnRef::Raw(expression))),
            WhereValue::Query(query) => Ok(WhereColumn::Query(query)),
            WhereValue::Operand(other) => Err(QueryError::invalid(format!("{other:?} cannot be used as a column."))),
        }
    }
}

impl From<&str> for WhereColumn<'_> {
    fn from(value: &str) -> Self {
        WhereColumn::Column(value.into())
    }
}

impl From<String> for WhereColumn<'_> {
    fn from(value: String) -> Self {
        WhereColumn::Column(value.into())
    }
}

impl From<Expression> for WhereColumn<'_> {
    fn from(value: Expression) -> Self {
        WhereColumn::Column(value.into())
    }
}

impl From<ColumnRef> for WhereColumn<'_> {
    fn from(value: ColumnRef) -> Self {
        WhereColumn::Column(value)
    }
}

impl From<Builder> for WhereColumn<'_> {
    fn from(value: Builder) -> Self {
        WhereColumn::Query(SubQuery::from(value))
    }
}

impl<'a> From<Vec<Vec<WhereValue<'a>>>> for WhereColumn<'a> {
    fn from(value: Vec<Vec<WhereValue<'a>>>) -> Self {
        WhereColumn::List(value)
    }
}

/// The candidate set of an `in` predicate.
#[derive(Debug)]
pub enum InValues<'a> {
    List(Vec<Operand>),
    Query(SubQuery<'a>),
}

impl<T: Into<Operand>> From<Vec<T>> for InValues<'_> {
    fn from(value: Vec<T>) -> Self {
        InValues::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Operand>, const N: usize> From<[T; N]> for InValues<'_> {
    fn from(value: [T; N]) -> Self {
        InValues::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<Builder> for InValues<'_> {
    fn from(value: Builder) -> Self {
        InValues::Query(SubQuery::from(value))
    }
}

impl<'a> From<SubQuery<'a>> for InValues<'a> {
    fn from(value: SubQuery<'a>) -> Self {
        InValues::Query(value)
    }
}
