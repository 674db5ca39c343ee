//! A fluent, dialect-aware SQL query builder.
//!
//! Queries are assembled on a [`Builder`], compiled by a [`Grammar`] into
//! parameterized SQL plus an ordered binding list, and handed to a
//! [`StatementExecutor`] supplied by the caller.

pub mod config;
pub use config::Config;

pub mod error;
pub use error::{QueryError, Result};

pub mod query;
pub use query::{Builder, ColumnRef, Expression, JoinClause, JoinKind, Operand, Row, SubQuery, raw};

pub mod grammar;
pub use grammar::{Grammar, MySqlGrammar, SqliteGrammar};

pub mod executor;
pub use executor::{Connection, Meta, Page, Record, StatementExecutor};

pub mod relations;
pub use relations::Relation;

pub mod repository;
pub use repository::Repository;
