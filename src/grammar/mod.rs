use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::{
    error::{QueryError, Result},
    query::{
        Aggregate, BindingCategory, Bindings, Builder, ColumnRef, Component, DatePart, JoinClause, Operand, Order,
        Predicate, Row, Source, Union, Where,
    },
};

pub mod mysql;
pub use mysql::*;

pub mod sqlite;
pub use sqlite::*;


/// Comparison operators every dialect accepts.
pub const OPERATORS: &[&str] = &[
    "=", "<", ">", "<=", ">=", "<>", "!=", "<=>",
    "like", "like binary", "not like", "ilike",
    "&", "|", "^", "<<", ">>",
    "rlike", "not rlike", "regexp", "not regexp",
    "~", "~*", "!~", "!~*", "similar to",
    "not similar to", "not ilike", "~~*", "!~~*",
];

static ALIAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s+as\s+").expect("alias pattern"));
static LEADING_BOOLEAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^(and|or) ").expect("boolean pattern"));

/// Drops the connector of the first condition in a joined list.
pub fn remove_leading_boolean(sql: &str) -> String {
    LEADING_BOOLEAN.replace(sql, "").into_owned()
}

/// Compiles a [`Builder`] into SQL text for one dialect.
///
/// Every fragment has its own method with a default rendering, so a dialect
/// only overrides what it writes differently. Placeholders are emitted in the
/// same order as [`Builder::get_flatten_bindings`] returns values.
pub trait Grammar: Send + Sync {
    fn name(&self) -> &'static str;

    /// Operators this dialect accepts on top of [`OPERATORS`].
    fn operators(&self) -> &[&'static str] {
        &[]
    }

    fn is_valid_operator(&self, operator: &str) -> bool {
        OPERATORS.contains(&operator) || self.operators().contains(&operator)
    }

    // ---- quoting ----

    fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_string();
        }
        format!("`{}`", value.replace('`', "``"))
    }

    fn wrap_str(&self, value: &str) -> String {
        if ALIAS.is_match(value) {
            return self.wrap_aliased_value(value);
        }
        let segments: Vec<&str> = value.split('.').collect();
        self.wrap_segments(&segments)
    }

    fn wrap_aliased_value(&self, value: &str) -> String {
        let mut parts = ALIAS.splitn(value, 2);
        let name = parts.next().unwrap_or_default();
        let alias = parts.next().unwrap_or_default();
        format!("{} as {}", self.wrap_str(name), self.wrap_value(alias))
    }

    fn wrap_segments(&self, segments: &[&str]) -> String {
        segments
            .iter()
            .enumerate()
            .map(|(index, segment)| {
                if index == 0 && segments.len() > 1 {
                    self.wrap_table(segment)
                } else {
                    self.wrap_value(segment)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    fn wrap(&self, column: &ColumnRef) -> String {
        match column {
            ColumnRef::Name(name) => self.wrap_str(name),
            ColumnRef::Raw(expression) => expression.as_str().to_string(),
        }
    }

    fn wrap_table(&self, table: &str) -> String {
        self.wrap_str(table)
    }

    fn wrap_source(&self, source: &Source) -> String {
        match source {
            Source::Table(table) => self.wrap_table(table),
            Source::Raw(expression) => expression.as_str().to_string(),
        }
    }

    fn columnize(&self, columns: &[ColumnRef]) -> String {
        columns.iter().map(|column| self.wrap(column)).collect::<Vec<_>>().join(", ")
    }

    fn parameter(&self, value: &Operand) -> String {
        match value {
            Operand::Raw(expression) => expression.as_str().to_string(),
            Operand::Value(_) => "?".to_string(),
        }
    }

    fn parameterize(&self, values: &[Operand]) -> String {
        values.iter().map(|value| self.parameter(value)).collect::<Vec<_>>().join(", ")
    }

    // ---- select ----

    fn compile_select(&self, query: &Builder) -> String {
        if !query.get_unions().is_empty() && query.get_aggregate().is_some() {
            return self.compile_union_aggregate(query);
        }
        let mut sql = self.concatenate(&self.compile_components(query));
        if !query.get_unions().is_empty() {
            sql = format!("{} {}", self.wrap_union(&sql), self.compile_unions(query));
        }
        sql
    }

    /// Fragments in the order: aggregate, columns, from, joins, wheres,
    /// groups, havings, orders, limit, offset.
    fn compile_components(&self, query: &Builder) -> Vec<String> {
        let mut parts = Vec::new();
        if let Some(aggregate) = query.get_aggregate() {
            parts.push(self.compile_aggregate(query, aggregate));
        }
        let star = [ColumnRef::star()];
        let columns = if query.get_columns().is_empty() { &star[..] } else { query.get_columns() };
        parts.push(self.compile_columns(query, columns));
        if let Some(source) = query.get_from() {
            parts.push(self.compile_from(query, source));
        }
        if !query.get_joins().is_empty() {
            parts.push(self.compile_joins(query, query.get_joins()));
        }
        if !query.get_wheres().is_empty() {
            parts.push(self.compile_wheres(query));
        }
        if !query.get_groups().is_empty() {
            parts.push(self.compile_groups(query, query.get_groups()));
        }
        if !query.get_havings().is_empty() {
            parts.push(self.compile_havings(query, query.get_havings()));
        }
        if !query.get_orders().is_empty() {
            parts.push(self.compile_orders(query, query.get_orders()));
        }
        if let Some(limit) = query.get_limit() {
            parts.push(self.compile_limit(query, limit));
        }
        if let Some(offset) = query.get_offset() {
            parts.push(self.compile_offset(query, offset));
        }
        parts
    }

    fn concatenate(&self, segments: &[String]) -> String {
        segments.iter().filter(|s| !s.is_empty()).cloned().collect::<Vec<_>>().join(" ")
    }

    fn compile_aggregate(&self, query: &Builder, aggregate: &Aggregate) -> String {
        let mut column = self.columnize(&aggregate.columns);
        if query.is_distinct() && column != "*" {
            column = format!("distinct {column}");
        }
        format!("select {}({column}) as aggregate", aggregate.function)
    }

    fn compile_columns(&self, query: &Builder, columns: &[ColumnRef]) -> String {
        if query.get_aggregate().is_some() {
            return String::new();
        }
        let select = if query.is_distinct() { "select distinct " } else { "select " };
        format!("{select}{}", self.columnize(columns))
    }

    fn compile_from(&self, _query: &Builder, source: &Source) -> String {
        format!("from {}", self.wrap_source(source))
    }

    fn compile_joins(&self, query: &Builder, joins: &[JoinClause]) -> String {
        joins
            .iter()
            .map(|join| {
                let table = self.wrap_source(&join.table);
                let table = if join.get_joins().is_empty() {
                    table
                } else {
                    format!("({table} {})", self.compile_joins(query, join.get_joins()))
                };
                let ons = self.compile_conditions(join.get_wheres(), "on");
                format!("{} join {table} {ons}", join.kind).trim().to_string()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn compile_wheres(&self, query: &Builder) -> String {
        self.compile_conditions(query.get_wheres(), "where")
    }

    /// `conjunction` followed by the joined conditions, or nothing when there are none.
    fn compile_conditions(&self, wheres: &[Where], conjunction: &str) -> String {
        let sql = self.compile_where_list(wheres);
        if sql.is_empty() { sql } else { format!("{conjunction} {sql}") }
    }

    fn compile_where_list(&self, wheres: &[Where]) -> String {
        let sql = wheres
            .iter()
            .map(|w| format!("{} {}", w.boolean, self.compile_predicate(&w.predicate)))
            .collect::<Vec<_>>()
            .join(" ");
        remove_leading_boolean(&sql)
    }

    fn compile_predicate(&self, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Basic { column, operator, value } => self.where_basic(column, operator, value),
            Predicate::Column { first, operator, second } => self.where_column(first, operator, second),
            Predicate::Null { column, negated: false } => self.where_null(column),
            Predicate::Null { column, negated: true } => self.where_not_null(column),
            Predicate::Raw { sql } => sql.clone(),
            Predicate::In { column, values, negated: false } => self.where_in(column, values),
            Predicate::In { column, values, negated: true } => self.where_not_in(column, values),
            Predicate::Between { column, low, high, negated } => self.where_between(column, low, high, *negated),
            Predicate::BetweenColumns { column, low, high, negated } => {
                self.where_between_columns(column, low, high, *negated)
            }
            Predicate::DatePart { part, column, operator, value } => {
                self.where_date_based(*part, column, operator, value)
            }
            Predicate::Nested { wheres } => self.where_nested(wheres),
            Predicate::Sub { column, operator, query } => self.where_sub(column, operator, query),
            Predicate::Exists { query, negated } => self.where_exists(query, *negated),
        }
    }

    fn where_basic(&self, column: &ColumnRef, operator: &str, value: &Operand) -> String {
        format!("{} {operator} {}", self.wrap(column), self.parameter(value))
    }

    fn where_column(&self, first: &ColumnRef, operator: &str, second: &ColumnRef) -> String {
        format!("{} {operator} {}", self.wrap(first), self.wrap(second))
    }

    fn where_null(&self, column: &ColumnRef) -> String {
        format!("{} is null", self.wrap(column))
    }

    fn where_not_null(&self, column: &ColumnRef) -> String {
        format!("{} is not null", self.wrap(column))
    }

    fn where_in(&self, column: &ColumnRef, values: &[Operand]) -> String {
        if values.is_empty() {
            return "0 = 1".to_string();
        }
        format!("{} in ({})", self.wrap(column), self.parameterize(values))
    }

    fn where_not_in(&self, column: &ColumnRef, values: &[Operand]) -> String {
        if values.is_empty() {
            return "1 = 1".to_string();
        }
        format!("{} not in ({})", self.wrap(column), self.parameterize(values))
    }

    fn where_between(&self, column: &ColumnRef, low: &Operand, high: &Operand, negated: bool) -> String {
        let between = if negated { "not between" } else { "between" };
        format!("{} {between} {} and {}", self.wrap(column), self.parameter(low), self.parameter(high))
    }

    fn where_between_columns(&self, column: &ColumnRef, low: &ColumnRef, high: &ColumnRef, negated: bool) -> String {
        let between = if negated { "not between" } else { "between" };
        format!("{} {between} {} and {}", self.wrap(column), self.wrap(low), self.wrap(high))
    }

    fn where_date_based(&self, part: DatePart, column: &ColumnRef, operator: &str, value: &Operand) -> String {
        format!("{}({}) {operator} {}", part.as_str(), self.wrap(column), self.parameter(value))
    }

    fn where_nested(&self, wheres: &[Where]) -> String {
        format!("({})", self.compile_where_list(wheres))
    }

    fn where_sub(&self, column: &ColumnRef, operator: &str, query: &Builder) -> String {
        format!("{} {operator} ({})", self.wrap(column), self.compile_select(query))
    }

    fn where_exists(&self, query: &Builder, negated: bool) -> String {
        let exists = format!("exists ({})", self.compile_select(query));
        if negated { format!("not {exists}") } else { exists }
    }

    fn compile_groups(&self, _query: &Builder, groups: &[ColumnRef]) -> String {
        format!("group by {}", self.columnize(groups))
    }

    fn compile_havings(&self, _query: &Builder, havings: &[Where]) -> String {
        self.compile_conditions(havings, "having")
    }

    fn compile_orders(&self, _query: &Builder, orders: &[Order]) -> String {
        if orders.is_empty() {
            return String::new();
        }
        let orders = orders
            .iter()
            .map(|order| match order {
                Order::Column { column, direction } => format!("{} {direction}", self.wrap(column)),
                Order::Raw(sql) => sql.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("order by {orders}")
    }

    fn compile_limit(&self, _query: &Builder, limit: u64) -> String {
        format!("limit {limit}")
    }

    fn compile_offset(&self, _query: &Builder, offset: u64) -> String {
        format!("offset {offset}")
    }

    fn wrap_union(&self, sql: &str) -> String {
        format!("({sql})")
    }

    fn compile_unions(&self, query: &Builder) -> String {
        let mut sql: String = query.get_unions().iter().map(|union| self.compile_union(union)).collect();
        if !query.get_union_orders().is_empty() {
            sql.push(' ');
            sql.push_str(&self.compile_orders(query, query.get_union_orders()));
        }
        if let Some(limit) = query.get_union_limit() {
            sql.push(' ');
            sql.push_str(&self.compile_limit(query, limit));
        }
        if let Some(offset) = query.get_union_offset() {
            sql.push(' ');
            sql.push_str(&self.compile_offset(query, offset));
        }
        sql.trim_start().to_string()
    }

    fn compile_union(&self, union: &Union) -> String {
        let conjunction = if union.all { " union all " } else { " union " };
        format!("{conjunction}{}", self.wrap_union(&self.compile_select(&union.query)))
    }

    /// Aggregates over the whole union by selecting from it as a derived table.
    fn compile_union_aggregate(&self, query: &Builder) -> String {
        let Some(aggregate) = query.get_aggregate() else {
            return self.compile_select(query);
        };
        let sql = self.compile_aggregate(query, aggregate);
        let inner = query.clone_without(&[Component::Aggregate]);
        format!("{sql} from ({}) as {}", self.compile_select(&inner), self.wrap_table("temp_table"))
    }

    // ---- helpers ----

    fn compile_random(&self, _seed: &str) -> String {
        "RANDOM()".to_string()
    }

    /// `expression`, or `default` when it is null.
    fn compile_ifnull(&self, expression: &str, default: &str) -> String {
        format!("coalesce({expression}, {default})")
    }

    fn compile_exists(&self, query: &Builder) -> String {
        format!("select exists({}) as {}", self.compile_select(query), self.wrap_value("exists"))
    }

    // ---- writes ----

    fn compile_insert(&self, query: &Builder, rows: &[Row]) -> Result<String> {
        let table = self.require_table(query)?;
        let Some(first) = rows.first() else {
            return Ok(format!("insert into {table} default values"));
        };
        let columns: Vec<&str> = first.columns().collect();
        let null = Operand::null();
        let parameters = rows
            .iter()
            .map(|row| {
                let values: Vec<String> =
                    columns.iter().map(|column| self.parameter(row.get(column).unwrap_or(&null))).collect();
                format!("({})", values.join(", "))
            })
            .collect::<Vec<_>>()
            .join(", ");
        let columns: Vec<ColumnRef> = columns.into_iter().map(ColumnRef::from).collect();
        Ok(format!("insert into {table} ({}) values {parameters}", self.columnize(&columns)))
    }

    /// One value per placeholder of [`Grammar::compile_insert`], row by row.
    fn prepare_bindings_for_insert(&self, rows: &[Row]) -> Vec<Value> {
        let Some(first) = rows.first() else {
            return Vec::new();
        };
        let columns: Vec<&str> = first.columns().collect();
        rows.iter()
            .flat_map(|row| {
                columns.iter().filter_map(move |column| match row.get(column) {
                    Some(operand) => operand.binding().cloned(),
                    None => Some(Value::Null),
                })
            })
            .collect()
    }

    fn compile_insert_get_id(&self, query: &Builder, row: &Row, _sequence: &str) -> Result<String> {
        self.compile_insert(query, std::slice::from_ref(row))
    }

    fn compile_insert_or_ignore(&self, _query: &Builder, _rows: &[Row]) -> Result<String> {
        Err(QueryError::NotImplemented("insert or ignore"))
    }

    /// Insert that updates `update` columns when a row collides on `unique_by`.
    fn compile_upsert(&self, _query: &Builder, _rows: &[Row], _unique_by: &[String], _update: &[String]) -> Result<String> {
        Err(QueryError::NotImplemented("upsert"))
    }

    fn compile_update(&self, query: &Builder, row: &Row) -> Result<String> {
        let table = self.require_table(query)?;
        let columns = self.compile_update_columns(row);
        let wheres = self.compile_wheres(query);
        let sql = if query.get_joins().is_empty() {
            self.compile_update_without_joins(query, &table, &columns, &wheres)
        } else {
            self.compile_update_with_joins(query, &table, &columns, &wheres)
        };
        Ok(sql.trim().to_string())
    }

    fn compile_update_columns(&self, row: &Row) -> String {
        row.iter()
            .map(|(column, value)| format!("{} = {}", self.wrap_str(column), self.parameter(value)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn compile_update_without_joins(&self, _query: &Builder, table: &str, columns: &str, wheres: &str) -> String {
        format!("update {table} set {columns} {wheres}")
    }

    fn compile_update_with_joins(&self, query: &Builder, table: &str, columns: &str, wheres: &str) -> String {
        let joins = self.compile_joins(query, query.get_joins());
        format!("update {table} {joins} set {columns} {wheres}")
    }

    /// Join values, then assignments, then every remaining bucket except select.
    fn prepare_bindings_for_update(&self, bindings: &Bindings, row: &Row) -> Vec<Value> {
        let mut values = bindings.get(BindingCategory::Join).to_vec();
        values.extend(row.bindings());
        values.extend(bindings.flatten_except(&[BindingCategory::Select, BindingCategory::Join]));
        values
    }

    fn compile_delete(&self, query: &Builder) -> Result<String> {
        let table = self.require_table(query)?;
        let wheres = self.compile_wheres(query);
        let sql = if query.get_joins().is_empty() {
            self.compile_delete_without_joins(query, &table, &wheres)
        } else {
            self.compile_delete_with_joins(query, &table, &wheres)
        };
        Ok(sql.trim().to_string())
    }

    fn compile_delete_without_joins(&self, _query: &Builder, table: &str, wheres: &str) -> String {
        format!("delete from {table} {wheres}")
    }

    fn compile_delete_with_joins(&self, query: &Builder, table: &str, wheres: &str) -> String {
        let alias = table.rsplit(" as ").next().unwrap_or(table);
        let joins = self.compile_joins(query, query.get_joins());
        format!("delete {alias} from {table} {joins} {wheres}")
    }

    fn prepare_bindings_for_delete(&self, bindings: &Bindings) -> Vec<Value> {
        bindings.flatten_except(&[BindingCategory::Select])
    }

    /// Statements that empty the table, each with its own bindings.
    fn compile_truncate(&self, query: &Builder) -> Result<Vec<(String, Vec<Value>)>> {
        Ok(vec![(format!("truncate table {}", self.require_table(query)?), Vec::new())])
    }

    fn require_table(&self, query: &Builder) -> Result<String> {
        query
            .get_from()
            .map(|source| self.wrap_source(source))
            .ok_or_else(|| QueryError::invalid("The query has no table to write to."))
    }
}
