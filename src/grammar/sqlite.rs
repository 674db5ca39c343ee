use serde_json::Value;

use crate::{
    error::Result,
    grammar::Grammar,
    query::{BindingCategory, Bindings, Builder, ColumnRef, DatePart, Operand, Row},
};

/// SQLite: double-quote quoting, `strftime` date parts, and joined
/// updates/deletes rewritten as `rowid in (...)` subqueries.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteGrammar;

impl SqliteGrammar {
    fn rowid_subquery(&self, query: &Builder, table: &str, wheres: &str) -> String {
        let joins = self.compile_joins(query, query.get_joins());
        let alias = table.rsplit(" as ").next().unwrap_or(table);
        format!("select {alias}.rowid from {table} {joins} {wheres}").trim().to_string()
    }
}

impl Grammar for SqliteGrammar {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn wrap_value(&self, value: &str) -> String {
        if value == "*" {
            return value.to_string();
        }
        format!("\"{}\"", value.replace('"', "\"\""))
    }

    fn compile_random(&self, _seed: &str) -> String {
        "random()".to_string()
    }

    fn where_date_based(&self, part: DatePart, column: &ColumnRef, operator: &str, value: &Operand) -> String {
        let format = match part {
            DatePart::Date => "%Y-%m-%d",
            DatePart::Time => "%H:%M:%S",
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        format!("strftime('{format}', {}) {operator} cast({} as text)", self.wrap(column), self.parameter(value))
    }

    fn compile_insert_or_ignore(&self, query: &Builder, rows: &[Row]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        Ok(sql.replacen("insert", "insert or ignore", 1))
    }

    fn compile_upsert(&self, query: &Builder, rows: &[Row], unique_by: &[String], update: &[String]) -> Result<String> {
        let sql = self.compile_insert(query, rows)?;
        let unique: Vec<ColumnRef> = unique_by.iter().map(ColumnRef::from).collect();
        let columns = update
            .iter()
            .map(|column| {
                let wrapped = self.wrap(&ColumnRef::from(column));
                format!("{wrapped} = {}.{wrapped}", self.wrap_value("excluded"))
            })
            .collect::<Vec<_>>()
            .join(", ");
        Ok(format!("{sql} on conflict ({}) do update set {columns}", self.columnize(&unique)))
    }

    fn compile_update_with_joins(&self, query: &Builder, table: &str, columns: &str, wheres: &str) -> String {
        let selection = self.rowid_subquery(query, table, wheres);
        format!("update {table} set {columns} where {} in ({selection})", self.wrap_value("rowid"))
    }

    /// Assignments come first because joins and conditions move into the trailing subquery.
    fn prepare_bindings_for_update(&self, bindings: &Bindings, row: &Row) -> Vec<Value> {
        let mut values = row.bindings();
        values.extend(bindings.flatten_except(&[BindingCategory::Select]));
        values
    }

    fn compile_delete_with_joins(&self, query: &Builder, table: &str, wheres: &str) -> String {
        let selection = self.rowid_subquery(query, table, wheres);
        format!("delete from {table} where {} in ({selection})", self.wrap_value("rowid"))
    }

    fn compile_truncate(&self, query: &Builder) -> Result<Vec<(String, Vec<Value>)>> {
        let table = self.require_table(query)?;
        let name = query.get_from().map(|source| source.as_str().to_string()).unwrap_or_default();
        Ok(vec![
            ("delete from sqlite_sequence where name = ?".to_string(), vec![Value::String(name)]),
            (format!("delete from {table}"), Vec::new()),
        ])
    }
}
