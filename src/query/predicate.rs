use std::{fmt, str::FromStr};

use crate::{
    error::QueryError,
    query::{Builder, ColumnRef, Operand},
};

/// How a predicate is joined to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connector {
    And,
    AndNot,
    Or,
    OrNot,
}

impl Connector {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connector::And => "and",
            Connector::AndNot => "and not",
            Connector::Or => "or",
            Connector::OrNot => "or not",
        }
    }

    /// `and` becomes `and not`, `or` becomes `or not`; negated connectors are kept.
    pub fn negated(self) -> Self {
        match self {
            Connector::And | Connector::AndNot => Connector::AndNot,
            Connector::Or | Connector::OrNot => Connector::OrNot,
        }
    }
}

impl fmt::Display for Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Connector {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Connector::And),
            "and not" => Ok(Connector::AndNot),
            "or" => Ok(Connector::Or),
            "or not" => Ok(Connector::OrNot),
            other => Err(QueryError::invalid(format!("Unknown boolean connector '{other}'."))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Date,
    Time,
    Day,
    Month,
    Year,
}

impl DatePart {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatePart::Date => "date",
            DatePart::Time => "time",
            DatePart::Day => "day",
            DatePart::Month => "month",
            DatePart::Year => "year",
        }
    }
}

/// One condition node. Nested groups and subqueries own their own clause lists.
#[derive(Debug, Clone)]
pub enum Predicate {
    Basic {
        column: ColumnRef,
        operator: String,
        value: Operand,
    },
    Column {
        first: ColumnRef,
        operator: String,
        second: ColumnRef,
    },
    Null {
        column: ColumnRef,
        negated: bool,
    },
    Raw {
        sql: String,
    },
    In {
        column: ColumnRef,
        values: Vec<Operand>,
        negated: bool,
    },
    Between {
        column: ColumnRef,
        low: Operand,
        high: Operand,
        negated: bool,
    },
    BetweenColumns {
        column: ColumnRef,
        low: ColumnRef,
        high: ColumnRef,
        negated: bool,
    },
    DatePart {
        part: DatePart,
        column: ColumnRef,
        operator: String,
        value: Operand,
    },
    Nested {
        wheres: Vec<Where>,
    },
    Sub {
        column: ColumnRef,
        operator: String,
        query: Box<Builder>,
    },
    Exists {
        query: Box<Builder>,
        negated: bool,
    },
}

/// A predicate together with its connector.
#[derive(Debug, Clone)]
pub struct Where {
    pub boolean: Connector,
    pub predicate: Predicate,
}

impl Where {
    pub fn new(boolean: Connector, predicate: Predicate) -> Self {
        Self { boolean, predicate }
    }

    pub fn and(predicate: Predicate) -> Self {
        Self::new(Connector::And, predicate)
    }
}
