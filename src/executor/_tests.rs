#[cfg(test)]
pub mod fixtures {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use serde_json::Value;

    use crate::{
        error::Result,
        executor::{Connection, Record, StatementExecutor},
    };

    /// Hands back scripted result sets in order and records every statement it receives.
    #[derive(Default)]
    pub struct MockExecutor {
        responses: Mutex<VecDeque<Vec<Record>>>,
        statements: Mutex<Vec<(String, Vec<Value>)>>,
        affected: u64,
        next_id: i64,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self { affected: 1, next_id: 1, ..Self::default() }
        }

        /// Queues the result of the next `query` call. `rows` is a JSON array of objects.
        pub fn respond(self, rows: Value) -> Self {
            self.responses.lock().unwrap().push_back(records(rows));
            self
        }

        pub fn affected(mut self, affected: u64) -> Self {
            self.affected = affected;
            self
        }

        pub fn next_id(mut self, id: i64) -> Self {
            self.next_id = id;
            self
        }

        pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
            self.statements.lock().unwrap().clone()
        }

        pub fn sql(&self) -> Vec<String> {
            self.statements().into_iter().map(|(sql, _)| sql).collect()
        }

        fn record(&self, sql: &str, bindings: &[Value]) {
            self.statements.lock().unwrap().push((sql.to_string(), bindings.to_vec()));
        }
    }

    impl StatementExecutor for MockExecutor {
        fn query(&self, sql: &str, bindings: &[Value]) -> Result<Vec<Record>> {
            self.record(sql, bindings);
            Ok(self.responses.lock().unwrap().pop_front().unwrap_or_default())
        }

        fn update(&self, sql: &str, bindings: &[Value]) -> Result<u64> {
            self.record(sql, bindings);
            Ok(self.affected)
        }

        fn insert_get_id(&self, sql: &str, bindings: &[Value], _key_column: &str) -> Result<i64> {
            self.record(sql, bindings);
            Ok(self.next_id)
        }
    }

    pub fn records(rows: Value) -> Vec<Record> {
        match rows {
            Value::Array(items) => items.into_iter().filter_map(|item| item.as_object().cloned()).collect(),
            _ => Vec::new(),
        }
    }

    /// A MySQL connection backed by `mock`.
    pub fn connect(mock: &Arc<MockExecutor>) -> Connection {
        Connection::mysql().with_shared_executor(mock.clone())
    }

    /// `count` rows of `{ "id": n, "name": "user n" }` starting at `from`.
    pub fn people(from: i64, count: i64) -> Value {
        Value::Array(
            (from..from + count)
                .map(|id| serde_json::json!({ "id": id, "name": format!("user {id}") }))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::fixtures::{MockExecutor, connect, people};
    use crate::{
        error::QueryError,
        executor::Connection,
        query::{Builder, Direction, Row, raw},
    };

    #[test]
    fn test_terminal_operation_without_executor() {
        let err = Builder::new().from("users").get().unwrap_err();
        assert!(matches!(err, QueryError::MissingExecutor));
    }

    #[test]
    fn test_get_sends_sql_and_bindings() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "id": 1 }])));
        let rows = connect(&mock).table("users").where_("age", ">=", 18).unwrap().get().unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(mock.statements(), vec![("select * from `users` where `age` >= ?".to_string(), vec![json!(18)])]);
    }

    #[test]
    fn test_first_and_find() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "id": 5 }])).respond(json!([])));
        let users = connect(&mock).table("users");

        let found = users.find(5).unwrap().unwrap();
        assert_eq!(found["id"], json!(5));
        assert!(users.first().unwrap().is_none());
        assert_eq!(
            mock.statements(),
            vec![
                ("select * from `users` where `id` = ? limit 1".to_string(), vec![json!(5)]),
                ("select * from `users` limit 1".to_string(), vec![]),
            ]
        );
    }

    #[test]
    fn test_sole() {
        let mock = Arc::new(
            MockExecutor::new()
                .respond(json!([]))
                .respond(json!([{ "id": 1 }, { "id": 2 }]))
                .respond(json!([{ "id": 1 }])),
        );
        let users = connect(&mock).table("users");

        assert!(matches!(users.sole(), Err(QueryError::RecordNotFound)));
        assert!(matches!(users.sole(), Err(QueryError::MultipleRecordsFound(2))));
        assert_eq!(users.sole().unwrap()["id"], json!(1));
        assert_eq!(mock.sql()[0], "select * from `users` limit 2");
    }

    #[test]
    fn test_value_and_pluck() {
        let mock = Arc::new(
            MockExecutor::new()
                .respond(json!([{ "email": "a@x.io" }]))
                .respond(json!([{ "name": "Ann" }, { "name": "Bob" }]))
                .respond(json!([{ "name": "Ann", "id": 7 }, { "name": "Bob", "id": 9 }]))
                .respond(json!([{ "name": "Ann" }, { "name": null }, { "name": "Cy" }])),
        );
        let users = connect(&mock).table("users");

        assert_eq!(users.value("email").unwrap(), Some(json!("a@x.io")));
        assert_eq!(users.pluck("users.name").unwrap(), vec![json!("Ann"), json!("Bob")]);
        let keyed = users.pluck_keyed("name", "id").unwrap();
        assert_eq!(keyed.get("7"), Some(&json!("Ann")));
        assert_eq!(keyed.keys().collect::<Vec<_>>(), vec!["7", "9"]);
        assert_eq!(users.implode("name", ", ").unwrap(), "Ann, , Cy");

        let sql = mock.sql();
        assert_eq!(sql[0], "select `email` from `users` limit 1");
        assert_eq!(sql[1], "select `users`.`name` from `users`");
        assert_eq!(sql[2], "select `name`, `id` from `users`");
    }

    #[test]
    fn test_exists() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "exists": 1 }])).respond(json!([{ "exists": 0 }])));
        let query = connect(&mock).table("users").where_("id", "=", 3).unwrap();

        assert!(query.exists().unwrap());
        assert!(query.doesnt_exist().unwrap());
        assert_eq!(
            mock.statements()[0],
            ("select exists(select * from `users` where `id` = ?) as `exists`".to_string(), vec![json!(3)])
        );
    }

    #[test]
    fn test_aggregates_drop_columns_and_orders() {
        let mock = Arc::new(
            MockExecutor::new()
                .respond(json!([{ "aggregate": 3 }]))
                .respond(json!([{ "aggregate": null }]))
                .respond(json!([{ "aggregate": "12.5" }])),
        );
        let query = connect(&mock)
            .table("users")
            .select(["id", "name"])
            .where_("age", ">", 30)
            .unwrap()
            .order_by("name", Direction::Asc);

        assert_eq!(query.count("*").unwrap(), 3);
        assert_eq!(query.sum("balance").unwrap(), json!(0));
        assert_eq!(query.avg("balance").unwrap(), Some(json!("12.5")));
        assert_eq!(
            mock.statements(),
            vec![
                ("select count(*) as aggregate from `users` where `age` > ?".to_string(), vec![json!(30)]),
                ("select sum(`balance`) as aggregate from `users` where `age` > ?".to_string(), vec![json!(30)]),
                ("select avg(`balance`) as aggregate from `users` where `age` > ?".to_string(), vec![json!(30)]),
            ]
        );
    }

    #[test]
    fn test_paginate_without_rows_skips_window() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "aggregate": 0 }])));
        let page = connect(&mock).table("users").paginate(1, Some(10)).unwrap();

        assert!(page.data.is_empty());
        assert_eq!(page.meta.total, 0);
        assert_eq!(page.meta.pages, 0);
        assert_eq!(mock.sql(), vec!["select count(*) as aggregate from `users`"]);
    }

    #[test]
    fn test_paginate_counts_then_fetches_window() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "aggregate": 11 }])).respond(people(6, 5)));
        let page = connect(&mock).table("users").order_by("id", Direction::Asc).paginate(2, Some(5)).unwrap();

        assert_eq!(page.data.len(), 5);
        assert_eq!(page.meta.current, 2);
        assert_eq!(page.meta.pages, 3);
        assert_eq!(
            mock.sql(),
            vec!["select count(*) as aggregate from `users`", "select * from `users` order by `id` asc limit 5 offset 5"]
        );
    }

    #[test]
    fn test_paginate_uses_configured_page_size() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "aggregate": 40 }])).respond(json!([])));
        let page = connect(&mock).table("users").paginate(1, None).unwrap();
        assert_eq!(page.meta.size, 15);
        assert_eq!(page.meta.pages, 3);
        assert_eq!(mock.sql()[1], "select * from `users` limit 15 offset 0");
    }

    #[test]
    fn test_grouped_count_uses_derived_table() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "aggregate": 4 }])));
        let total = connect(&mock)
            .table("orders")
            .group_by(["account_id"])
            .having("account_id", ">", 2)
            .unwrap()
            .get_count_for_pagination()
            .unwrap();

        assert_eq!(total, 4);
        assert_eq!(
            mock.statements(),
            vec![(
                "select count(*) as aggregate from (select * from `orders` group by `account_id` having `account_id` > ?) as `aggregate_table`"
                    .to_string(),
                vec![json!(2)]
            )]
        );
    }

    #[test]
    fn test_union_count_keeps_union_parts() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "aggregate": 9 }])));
        let conn = connect(&mock);
        let total = conn
            .table("users")
            .union(conn.table("admins"))
            .unwrap()
            .order_by("id", Direction::Asc)
            .limit(3)
            .get_count_for_pagination()
            .unwrap();

        assert_eq!(total, 9);
        assert_eq!(
            mock.sql(),
            vec!["select count(*) as aggregate from ((select * from `users`) union (select * from `admins`)) as `temp_table`"]
        );
    }

    #[test]
    fn test_chunk_visits_every_row_once() {
        let mock = Arc::new(MockExecutor::new().respond(people(1, 3)).respond(people(4, 3)).respond(people(7, 1)));
        let mut seen = Vec::new();
        let mut pages = Vec::new();
        let completed = connect(&mock)
            .table("users")
            .order_by("id", Direction::Asc)
            .chunk(3, |rows, page| {
                pages.push(page);
                seen.extend(rows.into_iter().map(|row| row["id"].clone()));
                Ok(true)
            })
            .unwrap();

        assert!(completed);
        assert_eq!(pages, vec![1, 2, 3]);
        assert_eq!(seen, (1..=7).map(Value::from).collect::<Vec<_>>());
        assert_eq!(
            mock.sql(),
            vec![
                "select * from `users` order by `id` asc limit 3 offset 0",
                "select * from `users` order by `id` asc limit 3 offset 3",
                "select * from `users` order by `id` asc limit 3 offset 6",
            ]
        );
    }

    #[test]
    fn test_chunk_over_exact_multiple_probes_once_more() {
        let mock = Arc::new(MockExecutor::new().respond(people(1, 3)).respond(people(4, 3)));
        let mut calls = 0;
        connect(&mock).table("users").order_by("id", Direction::Asc).chunk(3, |_, _| {
            calls += 1;
            Ok(true)
        })
        .unwrap();

        assert_eq!(calls, 2);
        assert_eq!(mock.sql().len(), 3);
    }

    #[test]
    fn test_chunk_stops_when_callback_declines() {
        let mock = Arc::new(MockExecutor::new().respond(people(1, 2)).respond(people(3, 2)));
        let completed = connect(&mock)
            .table("users")
            .order_by("id", Direction::Asc)
            .chunk(2, |_, _| Ok(false))
            .unwrap();

        assert!(!completed);
        assert_eq!(mock.sql().len(), 1);
    }

    #[test]
    fn test_chunk_requires_order() {
        let mock = Arc::new(MockExecutor::new());
        let err = connect(&mock).table("users").chunk(10, |_, _| Ok(true)).unwrap_err();
        assert!(matches!(err, QueryError::OrderRequired));
        assert!(mock.sql().is_empty());
    }

    #[test]
    fn test_each_numbers_rows_across_chunks() {
        let mock = Arc::new(MockExecutor::new().respond(people(1, 2)).respond(people(3, 1)));
        let mut indexes = Vec::new();
        connect(&mock)
            .table("users")
            .order_by("id", Direction::Asc)
            .each(
                |row, index| {
                    indexes.push((index, row["id"].clone()));
                    Ok(true)
                },
                Some(2),
            )
            .unwrap();
        assert_eq!(indexes, vec![(0, json!(1)), (1, json!(2)), (2, json!(3))]);
    }

    #[test]
    fn test_chunk_by_id_pages_on_last_key() {
        let mock = Arc::new(MockExecutor::new().respond(people(1, 2)).respond(people(3, 1)));
        let mut total = 0;
        connect(&mock)
            .table("users")
            .where_("active", "=", true)
            .unwrap()
            .chunk_by_id(
                2,
                |rows, _| {
                    total += rows.len();
                    Ok(true)
                },
                None,
            )
            .unwrap();

        assert_eq!(total, 3);
        assert_eq!(
            mock.statements(),
            vec![
                ("select * from `users` where `active` = ? order by `id` asc limit 2".to_string(), vec![json!(true)]),
                (
                    "select * from `users` where `active` = ? and `id` > ? order by `id` asc limit 2".to_string(),
                    vec![json!(true), json!(2)]
                ),
            ]
        );
    }

    #[test]
    fn test_chunk_by_id_needs_cursor_column() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "name": "a" }, { "name": "b" }])));
        let err = connect(&mock)
            .table("users")
            .select(["name"])
            .chunk_by_id(2, |_, _| Ok(true), Some("users.id"))
            .unwrap_err();
        assert!(matches!(err, QueryError::MissingCursorColumn(column) if column == "id"));
    }

    #[test]
    fn test_each_by_id_with_alias_column() {
        let mock = Arc::new(MockExecutor::new().respond(json!([{ "uid": 4 }, { "uid": 8 }])).respond(json!([])));
        let mut seen = Vec::new();
        connect(&mock)
            .table("users")
            .each_by_id(
                |row, _| {
                    seen.push(row["uid"].clone());
                    Ok(true)
                },
                Some(2),
                Some("uid"),
            )
            .unwrap();
        assert_eq!(seen, vec![json!(4), json!(8)]);
        assert_eq!(mock.statements()[1].1, vec![json!(8)]);
    }

    #[test]
    fn test_insert_variants() {
        let mock = Arc::new(MockExecutor::new().affected(2).next_id(42));
        let users = connect(&mock).table("users");

        let affected = users.insert(Row::new().set("name", "Jim").set("age", 30)).unwrap();
        assert_eq!(affected, 2);
        assert_eq!(users.insert_get_id(Row::new().set("name", "Ann"), None).unwrap(), 42);
        assert_eq!(users.insert_many(Vec::new()).unwrap(), 0);

        assert_eq!(
            mock.statements(),
            vec![
                ("insert into `users` (`age`, `name`) values (?, ?)".to_string(), vec![json!(30), json!("Jim")]),
                ("insert into `users` (`name`) values (?)".to_string(), vec![json!("Ann")]),
            ]
        );
    }

    #[test]
    fn test_insert_batch_splits_statements() {
        let mock = Arc::new(MockExecutor::new());
        let rows: Vec<Row> = (1..=5).map(|id| Row::new().set("id", id)).collect();
        let affected = connect(&mock).table("users").insert_batch(rows, 2).unwrap();

        assert_eq!(affected, 3);
        assert_eq!(mock.sql()[0], "insert into `users` (`id`) values (?), (?)");
        assert_eq!(mock.sql()[2], "insert into `users` (`id`) values (?)");
    }

    #[test]
    fn test_upsert_defaults_to_every_column() {
        let mock = Arc::new(MockExecutor::new());
        connect(&mock)
            .table("users")
            .upsert(vec![Row::new().set("email", "a@x.io").set("name", "A")], &["email"], None)
            .unwrap();
        assert_eq!(
            mock.sql(),
            vec!["insert into `users` (`email`, `name`) values (?, ?) on duplicate key update `email` = values(`email`), `name` = values(`name`)"]
        );
    }

    #[test]
    fn test_update_and_increment() {
        let mock = Arc::new(MockExecutor::new());
        let query = connect(&mock).table("users").where_("id", "=", 1).unwrap();

        query.update(Row::new().set("name", "x")).unwrap();
        query.increment("votes", 5, Row::new().set("touched", raw("now()"))).unwrap();
        query.decrement("credits", 1.5, Row::new()).unwrap();

        assert_eq!(
            mock.statements(),
            vec![
                ("update `users` set `name` = ? where `id` = ?".to_string(), vec![json!("x"), json!(1)]),
                ("update `users` set `touched` = now(), `votes` = `votes` + 5 where `id` = ?".to_string(), vec![json!(1)]),
                ("update `users` set `credits` = `credits` - 1.5 where `id` = ?".to_string(), vec![json!(1)]),
            ]
        );
    }

    #[test]
    fn test_increment_rejects_non_numeric() {
        let mock = Arc::new(MockExecutor::new());
        let err = connect(&mock).table("users").increment("votes", "many", Row::new()).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
        assert!(mock.sql().is_empty());
    }

    #[test]
    fn test_delete_and_truncate() {
        let mock = Arc::new(MockExecutor::new());
        let conn = connect(&mock);
        conn.table("users").delete_by_id(3).unwrap();
        conn.table("users").where_("votes", "<", 1).unwrap().delete().unwrap();

        let sqlite = Connection::sqlite().with_shared_executor(mock.clone());
        sqlite.table("users").truncate().unwrap();

        assert_eq!(
            mock.statements(),
            vec![
                ("delete from `users` where `users`.`id` = ?".to_string(), vec![json!(3)]),
                ("delete from `users` where `votes` < ?".to_string(), vec![json!(1)]),
                ("delete from sqlite_sequence where name = ?".to_string(), vec![json!("users")]),
                ("delete from \"users\"".to_string(), vec![]),
            ]
        );
    }
}
