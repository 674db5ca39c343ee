use serde::Serialize;
use serde_json::Value;
use tracing::trace;

use crate::{
    error::{QueryError, Result},
    executor::{Record, as_i64, result_key},
    query::{BindingCategory, Builder, ColumnRef, Component},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Meta {
    pub current: u64,
    pub size: u64,
    pub total: u64,
    pub pages: u64,
}

/// One page of rows plus its position in the full result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page {
    pub data: Vec<Record>,
    pub meta: Meta,
}

impl Page {
    pub fn new(data: Vec<Record>, current: u64, size: u64, total: u64) -> Self {
        let pages = if size == 0 { 0 } else { total.div_ceil(size) };
        Self { data, meta: Meta { current, size, total, pages } }
    }
}

impl Builder {
    /// Counts the full result, then fetches the window for `page` (1-based).
    /// `page_size` defaults to the configured page size. No window is fetched when the count is zero.
    pub fn paginate(&self, page: u64, page_size: Option<u64>) -> Result<Page> {
        let page = page.max(1);
        let size = page_size.unwrap_or(self.connection.config().page_size).max(1);
        let total = self.get_count_for_pagination()?;
        let data = if total > 0 { self.clone().for_page(page, size).get()? } else { Vec::new() };
        Ok(Page::new(data, page, size, total))
    }

    /// Row count of the query with its ordering and window removed. Grouped
    /// queries are counted over a derived table so each group counts once.
    pub fn get_count_for_pagination(&self) -> Result<u64> {
        let rows = self.run_pagination_count_query()?;
        let total = rows.first().and_then(|row| row.get("aggregate")).and_then(as_i64).unwrap_or(0);
        Ok(total.max(0) as u64)
    }

    fn run_pagination_count_query(&self) -> Result<Vec<Record>> {
        if !self.groups.is_empty() || !self.havings.is_empty() {
            let mut inner = self
                .clone_without(&[Component::Orders, Component::Limit, Component::Offset, Component::EagerLoads])
                .clone_without_bindings(&[BindingCategory::Order]);
            if inner.columns.is_empty() && !inner.joins.is_empty() {
                inner.columns = vec![ColumnRef::from(format!("{}.*", inner.table_or_alias()))];
            }
            return self
                .new_query()
                .from_sub(inner, "aggregate_table")?
                .set_aggregate("count", vec![ColumnRef::star()])
                .get();
        }
        let without: &[Component] = if self.unions.is_empty() {
            &[Component::Columns, Component::Orders, Component::Limit, Component::Offset, Component::EagerLoads]
        } else {
            &[Component::UnionOrders, Component::UnionLimit, Component::UnionOffset, Component::EagerLoads]
        };
        let bindings: &[BindingCategory] = if self.unions.is_empty() {
            &[BindingCategory::Select, BindingCategory::Order]
        } else {
            &[BindingCategory::UnionOrder]
        };
        let mut query = self.clone_without(without).clone_without_bindings(bindings);
        if !query.unions.is_empty() && query.columns.is_empty() {
            query.columns = vec![ColumnRef::star()];
        }
        query.set_aggregate("count", vec![ColumnRef::star()]).get()
    }

    fn ensure_order_for_chunk(&self) -> Result<()> {
        if self.orders.is_empty() && self.union_orders.is_empty() {
            return Err(QueryError::OrderRequired);
        }
        Ok(())
    }

    /// Feeds the result to `callback` in windows of `count` rows, with the 1-based page number.
    /// Stops when a window comes back short or the callback returns `false`; returns `false` in the latter case.
    pub fn chunk<F>(&self, count: u64, mut callback: F) -> Result<bool>
    where
        F: FnMut(Vec<Record>, u64) -> Result<bool>,
    {
        self.ensure_order_for_chunk()?;
        let count = count.max(1);
        let mut page = 1;
        loop {
            let results = self.clone().for_page(page, count).get()?;
            let fetched = results.len() as u64;
            trace!(page, fetched, "chunk");
            if fetched == 0 {
                break;
            }
            if !callback(results, page)? {
                return Ok(false);
            }
            if fetched != count {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    /// Visits every row with its 0-based position, reading `count` rows at a time
    /// (the configured chunk size when `None`).
    pub fn each<F>(&self, mut callback: F, count: Option<u64>) -> Result<bool>
    where
        F: FnMut(Record, u64) -> Result<bool>,
    {
        let count = count.unwrap_or(self.connection.config().chunk_size);
        let mut index = 0;
        self.chunk(count, |rows, _| {
            for row in rows {
                if !callback(row, index)? {
                    return Ok(false);
                }
                index += 1;
            }
            Ok(true)
        })
    }

    /// Like [`Builder::chunk`], but pages by `column > last seen value` instead of offsets,
    /// so rows changed between windows are neither skipped nor repeated.
    /// `column` defaults to the primary key.
    pub fn chunk_by_id<F>(&self, count: u64, mut callback: F, column: Option<&str>) -> Result<bool>
    where
        F: FnMut(Vec<Record>, u64) -> Result<bool>,
    {
        let column = column.unwrap_or(&self.connection.config().primary_key).to_string();
        let key = result_key(&column).to_string();
        let count = count.max(1);
        let mut last_id: Option<Value> = None;
        let mut page = 1;
        loop {
            let results = self.clone().for_page_after_id(count, last_id.clone(), &column)?.get()?;
            let fetched = results.len() as u64;
            trace!(page, fetched, last_id = ?last_id, "chunk by id");
            if fetched == 0 {
                break;
            }
            let next_id = results.last().and_then(|row| row.get(&key)).filter(|value| !value.is_null()).cloned();
            if !callback(results, page)? {
                return Ok(false);
            }
            match next_id {
                Some(value) => last_id = Some(value),
                None => return Err(QueryError::MissingCursorColumn(key)),
            }
            if fetched != count {
                break;
            }
            page += 1;
        }
        Ok(true)
    }

    pub fn each_by_id<F>(&self, mut callback: F, count: Option<u64>, column: Option<&str>) -> Result<bool>
    where
        F: FnMut(Record, u64) -> Result<bool>,
    {
        let count = count.unwrap_or(self.connection.config().chunk_size);
        let mut index = 0;
        self.chunk_by_id(
            count,
            |rows, _| {
                for row in rows {
                    if !callback(row, index)? {
                        return Ok(false);
                    }
                    index += 1;
                }
                Ok(true)
            },
            column,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_count_rounds_up() {
        assert_eq!(Page::new(Vec::new(), 1, 10, 0).meta.pages, 0);
        assert_eq!(Page::new(Vec::new(), 1, 10, 10).meta.pages, 1);
        assert_eq!(Page::new(Vec::new(), 2, 10, 11).meta.pages, 2);
    }

    #[test]
    fn test_page_serializes_meta() {
        let page = Page::new(Vec::new(), 3, 5, 12);
        let value = serde_json::to_value(&page).unwrap();
        assert_eq!(value["meta"], serde_json::json!({ "current": 3, "size": 5, "total": 12, "pages": 3 }));
    }
}
