use std::fmt;

use crate::{
    error::Result,
    executor::Connection,
    query::{Builder, ColumnRef, Connector, InValues, Predicate, Source, Where, WhereValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
    Cross,
}

impl JoinKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
            JoinKind::Cross => "cross",
        }
    }
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One join: its kind, its target and a condition list compiled with `on`.
///
/// The conditions live in an inner [`Builder`] that shares the parent's
/// connection, so value conditions bind and nest exactly like `where`s.
#[derive(Debug, Clone)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: Source,
    pub(crate) query: Builder,
}

impl JoinClause {
    pub(crate) fn new(connection: &Connection, kind: JoinKind, table: Source) -> Self {
        Self { kind, table, query: Builder::with_connection(connection.clone()) }
    }

    /// An empty join of the same kind and target, used for nested `on` groups.
    pub fn new_join(&self) -> JoinClause {
        Self { kind: self.kind, table: self.table.clone(), query: self.query.new_query() }
    }

    pub fn get_wheres(&self) -> &[Where] {
        self.query.get_wheres()
    }

    pub fn get_joins(&self) -> &[JoinClause] {
        self.query.get_joins()
    }

    /// `first <operator> second`, both sides being columns.
    pub fn on(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.query = self.query.push_where(Connector::And, column_predicate(first, operator, second));
        self
    }

    pub fn or_on(mut self, first: &str, operator: &str, second: &str) -> Self {
        self.query = self.query.push_where(Connector::Or, column_predicate(first, operator, second));
        self
    }

    /// Parenthesized group of conditions built by `f`.
    pub fn on_nested<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(JoinClause) -> Result<JoinClause>,
    {
        self.push_nested(f, Connector::And)
    }

    pub fn or_on_nested<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(JoinClause) -> Result<JoinClause>,
    {
        self.push_nested(f, Connector::Or)
    }

    fn push_nested<F>(mut self, f: F, boolean: Connector) -> Result<Self>
    where
        F: FnOnce(JoinClause) -> Result<JoinClause>,
    {
        let nested = f(self.new_join())?;
        if nested.query.wheres.is_empty() {
            return Ok(self);
        }
        self.query = self.query.merge_bindings(&nested.query);
        self.query = self.query.push_where(boolean, Predicate::Nested { wheres: nested.query.wheres });
        Ok(self)
    }

    /// `column <operator> ?` with a bound value.
    pub fn where_<'a>(mut self, column: &str, operator: &str, value: impl Into<WhereValue<'a>>) -> Result<Self> {
        self.query = self.query.where_(column, operator, value)?;
        Ok(self)
    }

    pub fn or_where<'a>(mut self, column: &str, operator: &str, value: impl Into<WhereValue<'a>>) -> Result<Self> {
        self.query = self.query.or_where(column, operator, value)?;
        Ok(self)
    }

    pub fn where_null(mut self, column: &str) -> Self {
        self.query = self.query.where_null(column);
        self
    }

    pub fn where_not_null(mut self, column: &str) -> Self {
        self.query = self.query.where_not_null(column);
        self
    }

    pub fn where_in<'a>(mut self, column: &str, values: impl Into<InValues<'a>>) -> Result<Self> {
        self.query = self.query.where_in(column, values)?;
        Ok(self)
    }

    /// A join nested inside this one: `(table inner join other on ...) on ...`.
    pub fn join(mut self, table: impl Into<Source>, first: &str, operator: &str, second: &str) -> Self {
        self.query = self.query.join(table, first, operator, second);
        self
    }
}

fn column_predicate(first: &str, operator: &str, second: &str) -> Predicate {
    Predicate::Column {
        first: ColumnRef::from(first),
        operator: operator.to_string(),
        second: ColumnRef::from(second),
    }
}
