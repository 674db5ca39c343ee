use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{QueryError, Result},
    executor::{Record, as_bool, as_i64, key_string, result_key},
    query::{BindingCategory, Builder, ColumnRef, Component, Expression, Operand, Row},
    relations::resolver,
};

impl Builder {
    fn run_select(&self) -> Result<Vec<Record>> {
        let executor = self.connection.executor()?;
        let sql = self.to_sql();
        let bindings = self.get_flatten_bindings();
        debug!(sql = %sql, bindings = ?bindings, "select");
        executor.query(&sql, &bindings)
    }

    fn run_write(&self, kind: &str, sql: &str, bindings: &[Value]) -> Result<u64> {
        let executor = self.connection.executor()?;
        debug!(sql = %sql, bindings = ?bindings, "{kind}");
        let affected = executor.update(sql, bindings)?;
        debug!(affected, "{kind} done");
        Ok(affected)
    }

    /// Runs the query and loads every registered relation onto the rows.
    pub fn get(&self) -> Result<Vec<Record>> {
        let mut rows = self.run_select()?;
        for (name, relation) in &self.eager_loads {
            rows = resolver::load(&self.connection, rows, name, relation)?;
        }
        Ok(rows)
    }

    pub fn first(&self) -> Result<Option<Record>> {
        Ok(self.clone().take(1).get()?.into_iter().next())
    }

    /// The row whose primary key equals `id`.
    pub fn find(&self, id: impl Into<Operand>) -> Result<Option<Record>> {
        let key = self.connection.config().primary_key.clone();
        self.clone().where_(key.as_str(), "=", id.into())?.first()
    }

    pub fn first_where(&self, column: &str, operator: &str, value: impl Into<Operand>) -> Result<Option<Record>> {
        self.clone().where_(column, operator, value.into())?.first()
    }

    /// Exactly one row, or [`QueryError::RecordNotFound`] / [`QueryError::MultipleRecordsFound`].
    pub fn sole(&self) -> Result<Record> {
        let mut rows = self.clone().take(2).get()?;
        match rows.len() {
            0 => Err(QueryError::RecordNotFound),
            1 => Ok(rows.remove(0)),
            count => Err(QueryError::MultipleRecordsFound(count)),
        }
    }

    /// One column of the first row.
    pub fn value(&self, column: &str) -> Result<Option<Value>> {
        let row = self.clone().select([column]).first()?;
        Ok(row.and_then(|mut row| row.remove(result_key(column))))
    }

    pub fn sole_value(&self, column: &str) -> Result<Value> {
        let mut row = self.clone().select([column]).sole()?;
        Ok(row.remove(result_key(column)).unwrap_or(Value::Null))
    }

    fn with_columns_if_empty(&self, columns: &[&str]) -> Builder {
        if self.columns.is_empty() { self.clone().select(columns.iter().copied()) } else { self.clone() }
    }

    /// The values of one column.
    pub fn pluck(&self, column: &str) -> Result<Vec<Value>> {
        let rows = self.with_columns_if_empty(&[column]).get()?;
        let key = result_key(column);
        Ok(rows.into_iter().map(|mut row| row.remove(key).unwrap_or(Value::Null)).collect())
    }

    /// The values of `column` keyed by the string form of `key`. Later rows win on duplicate keys.
    pub fn pluck_keyed(&self, column: &str, key: &str) -> Result<IndexMap<String, Value>> {
        let rows = self.with_columns_if_empty(&[column, key]).get()?;
        let (value_key, index_key) = (result_key(column), result_key(key));
        let mut out = IndexMap::new();
        for mut row in rows {
            let index = row.get(index_key).and_then(key_string).unwrap_or_default();
            out.insert(index, row.remove(value_key).unwrap_or(Value::Null));
        }
        Ok(out)
    }

    /// The values of one column joined with `glue`.
    pub fn implode(&self, column: &str, glue: &str) -> Result<String> {
        let values = self.pluck(column)?;
        Ok(values
            .iter()
            .map(|value| match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(glue))
    }

    pub fn exists(&self) -> Result<bool> {
        let executor = self.connection.executor()?;
        let sql = self.grammar().compile_exists(self);
        let bindings = self.get_flatten_bindings();
        debug!(sql = %sql, bindings = ?bindings, "exists");
        let row = executor.query_map(&sql, &bindings)?;
        Ok(row.get("exists").is_some_and(as_bool))
    }

    pub fn doesnt_exist(&self) -> Result<bool> {
        Ok(!self.exists()?)
    }

    // ---- aggregates ----

    /// Runs `function(columns)` over the query; `None` when the database returns null.
    pub fn aggregate(&self, function: &str, columns: &[&str]) -> Result<Option<Value>> {
        let columns: Vec<ColumnRef> = columns.iter().map(|c| ColumnRef::from(*c)).collect();
        let mut query = if self.unions.is_empty() {
            self.clone_without(&[Component::Columns, Component::EagerLoads])
                .clone_without_bindings(&[BindingCategory::Select])
        } else {
            self.clone_without(&[Component::EagerLoads])
        };
        if query.columns.is_empty() {
            query.columns = columns.clone();
        }
        let rows = query.set_aggregate(function, columns).get()?;
        Ok(rows.into_iter().next().and_then(|mut row| row.remove("aggregate")).filter(|value| !value.is_null()))
    }

    pub fn count(&self, column: &str) -> Result<i64> {
        Ok(self.aggregate("count", &[column])?.as_ref().and_then(as_i64).unwrap_or(0))
    }

    pub fn min(&self, column: &str) -> Result<Option<Value>> {
        self.aggregate("min", &[column])
    }

    pub fn max(&self, column: &str) -> Result<Option<Value>> {
        self.aggregate("max", &[column])
    }

    /// Sum of `column`, zero over an empty set.
    pub fn sum(&self, column: &str) -> Result<Value> {
        Ok(self.aggregate("sum", &[column])?.unwrap_or_else(|| Value::from(0)))
    }

    pub fn avg(&self, column: &str) -> Result<Option<Value>> {
        self.aggregate("avg", &[column])
    }

    // ---- writes ----

    pub fn insert(&self, row: Row) -> Result<u64> {
        self.insert_many(vec![row])
    }

    pub fn insert_many(&self, rows: Vec<Row>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = self.grammar().compile_insert(self, &rows)?;
        let bindings = self.grammar().prepare_bindings_for_insert(&rows);
        self.run_write("insert", &sql, &bindings)
    }

    /// Inserts in statements of at most `batch_size` rows each.
    pub fn insert_batch(&self, rows: Vec<Row>, batch_size: usize) -> Result<u64> {
        let mut affected = 0;
        for batch in rows.chunks(batch_size.max(1)) {
            affected += self.insert_many(batch.to_vec())?;
        }
        Ok(affected)
    }

    /// Inserts one row and returns its generated key. `sequence` defaults to the primary key.
    pub fn insert_get_id(&self, row: Row, sequence: Option<&str>) -> Result<i64> {
        let executor = self.connection.executor()?;
        let sequence = sequence.unwrap_or(&self.connection.config().primary_key);
        let sql = self.grammar().compile_insert_get_id(self, &row, sequence)?;
        let bindings = self.grammar().prepare_bindings_for_insert(std::slice::from_ref(&row));
        debug!(sql = %sql, bindings = ?bindings, sequence, "insert get id");
        executor.insert_get_id(&sql, &bindings, sequence)
    }

    pub fn insert_or_ignore(&self, rows: Vec<Row>) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let sql = self.grammar().compile_insert_or_ignore(self, &rows)?;
        let bindings = self.grammar().prepare_bindings_for_insert(&rows);
        self.run_write("insert or ignore", &sql, &bindings)
    }

    /// Inserts rows, updating `update` columns (all inserted columns when `None`)
    /// of rows that collide on `unique_by`.
    pub fn upsert(&self, rows: Vec<Row>, unique_by: &[&str], update: Option<&[&str]>) -> Result<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let update: Vec<String> = match update {
            Some(columns) => columns.iter().map(|c| c.to_string()).collect(),
            None => first.columns().map(str::to_string).collect(),
        };
        let unique_by: Vec<String> = unique_by.iter().map(|c| c.to_string()).collect();
        let sql = self.grammar().compile_upsert(self, &rows, &unique_by, &update)?;
        let bindings = self.grammar().prepare_bindings_for_insert(&rows);
        self.run_write("upsert", &sql, &bindings)
    }

    pub fn update(&self, row: Row) -> Result<u64> {
        let sql = self.grammar().compile_update(self, &row)?;
        let bindings = self.grammar().prepare_bindings_for_update(&self.bindings, &row);
        self.run_write("update", &sql, &bindings)
    }

    /// `column = column + amount`, plus any `extra` assignments.
    pub fn increment(&self, column: &str, amount: impl Into<Value>, extra: Row) -> Result<u64> {
        self.step(column, "+", amount.into(), extra)
    }

    pub fn decrement(&self, column: &str, amount: impl Into<Value>, extra: Row) -> Result<u64> {
        self.step(column, "-", amount.into(), extra)
    }

    fn step(&self, column: &str, sign: &str, amount: Value, mut extra: Row) -> Result<u64> {
        let Value::Number(amount) = amount else {
            return Err(QueryError::invalid("Non-numeric value passed to increment method."));
        };
        let wrapped = self.grammar().wrap_str(column);
        extra.insert(column, Expression::new(format!("{wrapped} {sign} {amount}")));
        self.update(extra)
    }

    pub fn delete(&self) -> Result<u64> {
        let sql = self.grammar().compile_delete(self)?;
        let bindings = self.grammar().prepare_bindings_for_delete(&self.bindings);
        self.run_write("delete", &sql, &bindings)
    }

    /// Deletes the row whose primary key equals `id`.
    pub fn delete_by_id(&self, id: impl Into<Operand>) -> Result<u64> {
        let key = self.qualify(&self.connection.config().primary_key);
        self.clone().where_(key, "=", id.into())?.delete()
    }

    pub fn truncate(&self) -> Result<()> {
        for (sql, bindings) in self.grammar().compile_truncate(self)? {
            self.run_write("truncate", &sql, &bindings)?;
        }
        Ok(())
    }
}
