use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::{
    error::Result,
    executor::{Connection, Record},
    query::{Builder, Operand, Row},
};

/// A table-bound facade over [`Builder`] with optional timestamps and write hooks.
///
/// Implementors supply the connection and table name; everything else has a
/// default that can be overridden.
pub trait Repository {
    fn connection(&self) -> &Connection;

    fn table(&self) -> &str;

    /// When true, inserts fill both timestamp columns and updates refresh the updated column.
    fn timestamps(&self) -> bool {
        false
    }

    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn query(&self) -> Builder {
        self.connection().table(self.table())
    }

    fn query_as(&self, alias: &str) -> Builder {
        self.connection().query().from_as(self.table(), alias)
    }

    /// Inserts `row` and returns the generated key.
    fn insert(&self, row: Row) -> Result<i64> {
        let row = self.before_insert(row);
        let id = self.query().insert_get_id(row.clone(), None)?;
        debug!(table = self.table(), id, "repository insert");
        self.after_insert(id, &row);
        Ok(id)
    }

    fn find<I: Into<Operand>>(&self, id: I) -> Result<Option<Record>> {
        self.query().find(id)
    }

    /// Updates the row whose primary key equals `id`.
    fn update<I: Into<Operand>>(&self, id: I, row: Row) -> Result<u64> {
        let id = id.into();
        let row = self.before_update(row);
        let key = self.connection().config().primary_key.clone();
        let affected = self.query().where_(key.as_str(), "=", id.clone())?.update(row.clone())?;
        self.after_update(&id, affected, &row);
        Ok(affected)
    }

    /// Deletes the row whose primary key equals `id`, unless [`Repository::before_delete`] vetoes it.
    fn delete<I: Into<Operand>>(&self, id: I) -> Result<u64> {
        let id = id.into();
        if !self.before_delete(&id) {
            debug!(table = self.table(), id = ?id, "repository delete skipped");
            return Ok(0);
        }
        let affected = self.query().delete_by_id(id.clone())?;
        self.after_delete(&id, affected);
        Ok(affected)
    }

    fn before_insert(&self, mut row: Row) -> Row {
        if self.timestamps() {
            let now = self.now();
            let config = self.connection().config();
            row.insert(&config.created_column, now);
            row.insert(&config.updated_column, now);
        }
        row
    }

    fn after_insert(&self, _id: i64, _row: &Row) {}

    fn before_update(&self, mut row: Row) -> Row {
        if self.timestamps() {
            let now = self.now();
            row.insert(&self.connection().config().updated_column, now);
        }
        row
    }

    fn after_update(&self, _id: &Operand, _affected: u64, _row: &Row) {}

    fn before_delete(&self, _id: &Operand) -> bool {
        true
    }

    fn after_delete(&self, _id: &Operand, _affected: u64) {}
}
