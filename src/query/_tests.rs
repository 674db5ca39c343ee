use pretty_assertions::assert_eq;
use serde_json::{Value, json};

use crate::{
    error::QueryError,
    executor::Connection,
    query::{
        BindingCategory, Builder, Component, Connector, Direction, JoinKind, SubQuery, WhereColumn, WhereValue, raw,
    },
};

fn users() -> Builder {
    Builder::new().from("users")
}

fn placeholders(sql: &str) -> usize {
    sql.matches('?').count()
}

#[test]
fn test_basic_select_compiles_with_single_binding() {
    let query = Builder::new()
        .select(["*"])
        .from("users")
        .where_("age", ">=", 18)
        .unwrap()
        .order_by("id", Direction::Asc)
        .limit(10);

    assert_eq!(query.to_sql(), "select * from `users` where `age` >= ? order by `id` asc limit 10");
    assert_eq!(query.get_flatten_bindings(), vec![json!(18)]);
}

#[test]
fn test_bindings_follow_clause_order() {
    let query = Builder::new()
        .select_raw("price * ? as taxed", vec![json!(1.2)])
        .from("orders")
        .join_where("customers", "customers.id", "=", 7)
        .unwrap()
        .where_("status", "=", "paid")
        .unwrap()
        .group_by(["customer_id"])
        .having("total", ">", 100)
        .unwrap()
        .order_by_raw("field(status, ?)", vec![json!("paid")]);

    let sql = query.to_sql();
    assert_eq!(
        sql,
        "select price * ? as taxed from `orders` inner join `customers` on `customers`.`id` = ? \
         where `status` = ? group by `customer_id` having `total` > ? order by field(status, ?)"
    );
    let bindings = query.get_flatten_bindings();
    assert_eq!(bindings, vec![json!(1.2), json!(7), json!("paid"), json!(100), json!("paid")]);
    assert_eq!(placeholders(&sql), bindings.len());
}

#[test]
fn test_null_values_compile_to_null_checks() {
    let eq = users().where_eq("deleted_at", None::<i64>).unwrap();
    let explicit = users().where_("deleted_at", "=", Value::Null).unwrap();
    let helper = users().where_null("deleted_at");
    assert_eq!(eq.to_sql(), helper.to_sql());
    assert_eq!(explicit.to_sql(), helper.to_sql());
    assert_eq!(helper.to_sql(), "select * from `users` where `deleted_at` is null");
    assert!(eq.get_flatten_bindings().is_empty());

    let not_eq = users().where_("deleted_at", "!=", None::<i64>).unwrap();
    assert_eq!(not_eq.to_sql(), users().where_not_null("deleted_at").to_sql());
}

#[test]
fn test_where_eq_binds_like_explicit_equals() {
    let short = users().where_eq("name", "John").unwrap();
    let long = users().where_("name", "=", "John").unwrap();
    assert_eq!(short.to_sql(), long.to_sql());
    assert_eq!(short.get_flatten_bindings(), long.get_flatten_bindings());
}

#[test]
fn test_empty_in_lists() {
    let none = users().where_in("id", Vec::<i64>::new()).unwrap();
    assert_eq!(none.to_sql(), "select * from `users` where 0 = 1");
    assert!(none.get_flatten_bindings().is_empty());

    let all = users().where_not_in("id", Vec::<i64>::new()).unwrap();
    assert_eq!(all.to_sql(), "select * from `users` where 1 = 1");

    let some = users().where_in("id", [1, 2, 3]).unwrap();
    assert_eq!(some.to_sql(), "select * from `users` where `id` in (?, ?, ?)");
    assert_eq!(some.get_flatten_bindings(), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_where_in_subquery() {
    let posts = Builder::new().select(["user_id"]).from("posts").where_("votes", ">", 100).unwrap();
    let query = users().where_in("id", posts).unwrap().where_("active", "=", true).unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` where `id` in (select `user_id` from `posts` where `votes` > ?) and `active` = ?"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(100), json!(true)]);
}

#[test]
fn test_list_shorthand_matches_nested_chain() {
    let rows: Vec<Vec<WhereValue>> = vec![
        vec!["name".into(), "John".into()],
        vec!["age".into(), ">".into(), 18.into()],
        vec!["role".into(), "=".into(), "admin".into(), "or".into()],
    ];
    let listed = users().where_list(rows).unwrap();
    let chained = users()
        .where_nested(|q| q.where_("name", "=", "John")?.where_("age", ">", 18)?.or_where("role", "=", "admin"))
        .unwrap();

    assert_eq!(listed.to_sql(), chained.to_sql());
    assert_eq!(listed.to_sql(), "select * from `users` where (`name` = ? and `age` > ? or `role` = ?)");
    assert_eq!(listed.get_flatten_bindings(), chained.get_flatten_bindings());
}

#[test]
fn test_list_shorthand_rejects_bad_arity() {
    let rows: Vec<Vec<WhereValue>> = vec![vec!["a".into(), "=".into(), 1.into(), "and".into(), 2.into()]];
    let err = users().where_list(rows).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(msg) if msg == "Invalid where parameters count 5."));
}

#[test]
fn test_list_shorthand_closure_row() {
    let rows: Vec<Vec<WhereValue>> = vec![
        vec!["a".into(), 1.into()],
        vec![WhereValue::nested(|q| q.where_("b", "=", 2)?.or_where("c", "=", 3))],
    ];
    let query = users().where_list(rows).unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where (`a` = ? and (`b` = ? or `c` = ?))");
    assert_eq!(query.get_flatten_bindings(), vec![json!(1), json!(2), json!(3)]);
}

#[test]
fn test_where_map_groups_equalities() {
    let query = users().where_map([("name", "John"), ("role", "admin")]).unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where (`name` = ? and `role` = ?)");
    assert_eq!(query.get_flatten_bindings(), vec![json!("John"), json!("admin")]);
}

#[test]
fn test_nested_groups_and_connectors() {
    let query = users()
        .where_("a", "=", 1)
        .unwrap()
        .or_where_nested(|q| q.where_("b", "=", 2)?.where_("c", "=", 3))
        .unwrap()
        .where_not("d", "=", 4)
        .unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where `a` = ? or (`b` = ? and `c` = ?) and not `d` = ?");
    assert_eq!(query.get_flatten_bindings(), vec![json!(1), json!(2), json!(3), json!(4)]);
}

#[test]
fn test_closure_column_without_operator_nests() {
    let query = users()
        .add_where(WhereColumn::nested(|q| q.where_("x", "=", 1)), None, None::<i64>, Connector::And)
        .unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where (`x` = ?)");
}

#[test]
fn test_builder_column_without_operator_nests() {
    let nested = Builder::new().where_("a", "=", 1).unwrap();
    let query = users().add_where(nested, None, None::<i64>, Connector::And).unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where (`a` = ?)");
    assert_eq!(query.get_flatten_bindings(), vec![json!(1)]);
}

#[test]
fn test_subquery_column_with_value_compares_equal() {
    let query = users()
        .where_eq(WhereColumn::nested(|q| Ok(q.select(["x"]).from("t").limit(1))), 5)
        .unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where (select `x` from `t` limit 1) = ?");
    assert_eq!(query.get_flatten_bindings(), vec![json!(5)]);
}

#[test]
fn test_raw_sql_column_cannot_nest() {
    let err = users()
        .add_where(WhereColumn::Query(SubQuery::Sql("a = 1".into())), None, None::<i64>, Connector::And)
        .unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedSubqueryType));
}

#[test]
fn test_empty_nested_group_is_dropped() {
    let query = users().where_nested(Ok).unwrap();
    assert_eq!(query.to_sql(), "select * from `users`");
}

#[test]
fn test_subquery_value() {
    let query = users()
        .where_("email", "=", WhereValue::nested(|q| Ok(q.select(["email"]).from("admins").limit(1))))
        .unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where `email` = (select `email` from `admins` limit 1)");
}

#[test]
fn test_composite_value_binds_one_scalar() {
    let query = users().where_("tags", "=", json!(["a", "b"])).unwrap();
    let sql = query.to_sql();
    assert_eq!(placeholders(&sql), 1);
    assert_eq!(query.get_flatten_bindings(), vec![json!("a")]);
}

#[test]
fn test_illegal_operator_is_rejected() {
    let err = users().where_("age", "=>", 18).unwrap_err();
    assert!(matches!(err, QueryError::InvalidArgument(_)));
    assert!(users().where_("name", "LIKE", "J%").is_ok());
    assert!(users().where_("name", "sounds like", "jon").is_ok());
    assert!(Connection::sqlite().table("users").where_("name", "sounds like", "jon").is_err());
}

#[test]
fn test_raw_sql_subquery_rejected_where_builder_required() {
    let err = users().where_exists("select 1").unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedSubqueryType));
    let err = users().union("select * from admins").unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedSubqueryType));
}

#[test]
fn test_where_column_and_between() {
    let query = users()
        .where_column("updated_at", ">", "created_at")
        .unwrap()
        .where_between("votes", 1, 100)
        .where_not_between_columns("age", "min_age", "max_age");
    assert_eq!(
        query.to_sql(),
        "select * from `users` where `updated_at` > `created_at` and `votes` between ? and ? \
         and `age` not between `min_age` and `max_age`"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(1), json!(100)]);
}

#[test]
fn test_where_column_list() {
    let rows: Vec<Vec<WhereValue>> =
        vec![vec!["first_name".into(), "last_name".into()], vec!["updated_at".into(), ">".into(), "created_at".into()]];
    let query = users().where_column_list(rows).unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` where (`first_name` = `last_name` and `updated_at` > `created_at`)"
    );
    assert!(query.get_flatten_bindings().is_empty());
}

#[test]
fn test_date_parts() {
    let query = users()
        .where_date("created_at", "=", chrono::NaiveDate::from_ymd_opt(2024, 3, 9).unwrap())
        .unwrap()
        .where_day("created_at", "=", 5)
        .unwrap()
        .where_month("created_at", "=", "3")
        .unwrap()
        .where_year("created_at", ">", 2020)
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` where date(`created_at`) = ? and day(`created_at`) = ? \
         and month(`created_at`) = ? and year(`created_at`) > ?"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!("2024-03-09"), json!("05"), json!("03"), json!(2020)]);
}

#[test]
fn test_exists_predicates() {
    let posts = Builder::new().from("posts").where_column("posts.user_id", "=", "users.id").unwrap();
    let query = users().where_exists(posts.clone()).unwrap().or_where_not_exists(posts).unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` where exists (select * from `posts` where `posts`.`user_id` = `users`.`id`) \
         or not exists (select * from `posts` where `posts`.`user_id` = `users`.`id`)"
    );
}

#[test]
fn test_aliases_and_distinct() {
    let query = Builder::new().from_as("users", "u").select(["u.id", "u.name as full_name"]).distinct();
    assert_eq!(query.to_sql(), "select distinct `u`.`id`, `u`.`name` as `full_name` from `users` as `u`");
    assert_eq!(query.table_or_alias(), "u");
}

#[test]
fn test_select_sub_and_from_sub() {
    let latest = Builder::new().select([raw("max(created_at)")]).from("posts").where_("draft", "=", false).unwrap();
    let query = users().select(["name"]).select_sub(latest, "last_post").unwrap();
    assert_eq!(
        query.to_sql(),
        "select `name`, (select max(created_at) from `posts` where `draft` = ?) as `last_post` from `users`"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(false)]);

    let derived = Builder::new()
        .from_sub(SubQuery::closure(|q| q.from("orders").where_("total", ">", 10)), "big")
        .unwrap();
    assert_eq!(derived.to_sql(), "select * from (select * from `orders` where `total` > ?) as `big`");
    assert_eq!(derived.get_flatten_bindings(), vec![json!(10)]);
}

#[test]
fn test_join_variants() {
    let query = users()
        .join("contacts", "users.id", "=", "contacts.user_id")
        .left_join("orders", "users.id", "=", "orders.user_id")
        .join_with("phones", JoinKind::Left, |j| {
            Ok(j.on("users.id", "=", "phones.user_id").or_on("users.alt_id", "=", "phones.user_id"))
        })
        .unwrap()
        .cross_join("colors");
    assert_eq!(
        query.to_sql(),
        "select * from `users` inner join `contacts` on `users`.`id` = `contacts`.`user_id` \
         left join `orders` on `users`.`id` = `orders`.`user_id` \
         left join `phones` on `users`.`id` = `phones`.`user_id` or `users`.`alt_id` = `phones`.`user_id` \
         cross join `colors`"
    );
}

#[test]
fn test_join_where_kinds() {
    let query = users()
        .left_join_where("badges", "badges.kind", "=", "gold")
        .unwrap()
        .right_join_where("teams", "teams.active", "=", true)
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` left join `badges` on `badges`.`kind` = ? right join `teams` on `teams`.`active` = ?"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!("gold"), json!(true)]);
}

#[test]
fn test_join_conditions_bind_into_join_bucket() {
    let query = users()
        .where_("active", "=", true)
        .unwrap()
        .join_with("posts", JoinKind::Inner, |j| {
            j.on("users.id", "=", "posts.user_id").where_("posts.published", "=", 1)?.on_nested(|n| {
                Ok(n.on("posts.a", "=", "users.a").or_on("posts.b", "=", "users.b"))
            })
        })
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` inner join `posts` on `users`.`id` = `posts`.`user_id` and `posts`.`published` = ? \
         and (`posts`.`a` = `users`.`a` or `posts`.`b` = `users`.`b`) where `active` = ?"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(1), json!(true)]);
    assert_eq!(query.get_raw_bindings().get(BindingCategory::Join), &[json!(1)]);
}

#[test]
fn test_join_sub() {
    let latest = Builder::new().select(["user_id"]).from("posts").where_("published", "=", true).unwrap();
    let query = users().join_sub(latest, "latest", JoinKind::Inner, "users.id", "=", "latest.user_id").unwrap();
    assert_eq!(
        query.to_sql(),
        "select * from `users` inner join (select `user_id` from `posts` where `published` = ?) as `latest` \
         on `users`.`id` = `latest`.`user_id`"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(true)]);
}

#[test]
fn test_unions_take_trailing_orders_and_limit() {
    let admins = Builder::new().from("admins").where_("level", "=", 2).unwrap();
    let query = users()
        .where_("active", "=", 1)
        .unwrap()
        .union_all(admins)
        .unwrap()
        .order_by("id", Direction::Desc)
        .limit(5);
    assert_eq!(
        query.to_sql(),
        "(select * from `users` where `active` = ?) union all (select * from `admins` where `level` = ?) \
         order by `id` desc limit 5"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(1), json!(2)]);
    assert!(query.get_orders().is_empty());
    assert_eq!(query.get_union_limit(), Some(5));
}

#[test]
fn test_windows() {
    assert_eq!(users().for_page(3, 15).to_sql(), "select * from `users` limit 15 offset 30");
    assert_eq!(users().for_page(0, 15).to_sql(), "select * from `users` limit 15 offset 0");

    let after = users().order_by_desc("id").for_page_after_id(10, Some(json!(5)), "id").unwrap();
    assert_eq!(after.to_sql(), "select * from `users` where `id` > ? order by `id` asc limit 10");
    assert_eq!(after.get_flatten_bindings(), vec![json!(5)]);

    let before = users().for_page_before_id(10, None, "id").unwrap();
    assert_eq!(before.to_sql(), "select * from `users` order by `id` desc limit 10");
}

#[test]
fn test_ordering_helpers() {
    assert_eq!(users().latest(None).to_sql(), "select * from `users` order by `created_at` desc");
    assert_eq!(users().oldest(Some("joined")).to_sql(), "select * from `users` order by `joined` asc");
    assert_eq!(users().in_random_order("").to_sql(), "select * from `users` order by rand()");

    let query = users().order_by_raw("field(id, ?)", vec![json!(3)]).reorder_by("name", Direction::Asc);
    assert_eq!(query.to_sql(), "select * from `users` order by `name` asc");
    assert!(query.get_flatten_bindings().is_empty());
}

#[test]
fn test_group_by_and_having() {
    let query = Builder::new()
        .select(["account_id"])
        .add_select([raw("count(*) as total")])
        .from("orders")
        .group_by(["account_id"])
        .having("total", ">", 5)
        .unwrap()
        .or_having_raw("sum(amount) > ?", vec![json!(1000)])
        .having_between("total", 1, 10);
    assert_eq!(
        query.to_sql(),
        "select `account_id`, count(*) as total from `orders` group by `account_id` \
         having `total` > ? or sum(amount) > ? and `total` between ? and ?"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!(5), json!(1000), json!(1), json!(10)]);
}

#[test]
fn test_clone_without_drops_only_named_parts() {
    let full = users()
        .select(["id"])
        .where_("age", ">", 18)
        .unwrap()
        .order_by_raw("field(id, ?)", vec![json!(7)])
        .limit(10)
        .offset(20);
    let trimmed = full.clone_without(&[Component::Orders, Component::Limit, Component::Offset]);
    let expected = users().select(["id"]).where_("age", ">", 18).unwrap();
    assert_eq!(trimmed.to_sql(), expected.to_sql());

    let unbound = full.clone_without_bindings(&[BindingCategory::Order]);
    assert_eq!(unbound.to_sql(), full.to_sql());
    assert_eq!(unbound.get_flatten_bindings(), vec![json!(18)]);

    let copy = full.clone();
    assert_eq!(copy.to_sql(), full.to_sql());
    assert_eq!(copy.get_flatten_bindings(), full.get_flatten_bindings());
}

#[test]
fn test_add_binding_by_category_name() {
    let query = users().where_raw("id = ?", vec![]).add_binding(json!(4), "where").unwrap();
    assert_eq!(query.get_flatten_bindings(), vec![json!(4)]);
    let spread = users().add_binding(json!([1, 2]), "groupBy").unwrap();
    assert_eq!(spread.get_raw_bindings().get(BindingCategory::GroupBy), &[json!(1), json!(2)]);

    let err = users().add_binding(json!(1), "nowhere").unwrap_err();
    assert!(matches!(err, QueryError::InvalidBindingCategory(name) if name == "nowhere"));
}

#[test]
fn test_conditional_composition() {
    let filter: Option<&str> = Some("admin");
    let query = users()
        .when(filter.is_some(), |q| q.where_("role", "=", filter.unwrap_or_default()))
        .unwrap()
        .unless(true, |q| Ok(q.limit(1)))
        .unwrap()
        .tap(|q| Ok(q.order_by("id", Direction::Asc)))
        .unwrap();
    assert_eq!(query.to_sql(), "select * from `users` where `role` = ? order by `id` asc");
}

#[test]
fn test_sqlite_quoting() {
    let query = Connection::sqlite()
        .table("users")
        .select(["users.id"])
        .where_("name", "=", "x")
        .unwrap()
        .where_day("created_at", "=", 7)
        .unwrap();
    assert_eq!(
        query.to_sql(),
        "select \"users\".\"id\" from \"users\" where \"name\" = ? and strftime('%d', \"created_at\") = cast(? as text)"
    );
    assert_eq!(query.get_flatten_bindings(), vec![json!("x"), json!("07")]);
}
