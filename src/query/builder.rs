use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::{
    error::{QueryError, Result},
    executor::Connection,
    grammar::Grammar,
    query::{
        BindingCategory, Bindings, ColumnRef, Connector, Direction, Expression, JoinClause, JoinKind, Order, Predicate,
        Source, SubQuery, Where, WhereValue,
    },
    relations::Relation,
};

/// An aggregate request: `function(columns)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    pub function: String,
    pub columns: Vec<ColumnRef>,
}

#[derive(Debug, Clone)]
pub struct Union {
    pub query: Box<Builder>,
    pub all: bool,
}

/// Clause lists that [`Builder::clone_without`] can reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Aggregate,
    Columns,
    From,
    Joins,
    Wheres,
    Groups,
    Havings,
    Orders,
    Limit,
    Offset,
    Unions,
    UnionOrders,
    UnionLimit,
    UnionOffset,
    EagerLoads,
}

/// The fluent query builder. Each method consumes the builder and hands it back,
/// so clauses chain: `Builder::new().from("users").where_("age", ">=", 18)?.limit(10)`.
pub struct Builder {
    pub(crate) connection: Connection,
    pub(crate) aggregate: Option<Aggregate>,
    pub(crate) columns: Vec<ColumnRef>,
    pub(crate) distinct: bool,
    pub(crate) from: Option<Source>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) wheres: Vec<Where>,
    pub(crate) groups: Vec<ColumnRef>,
    pub(crate) havings: Vec<Where>,
    pub(crate) orders: Vec<Order>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) unions: Vec<Union>,
    pub(crate) union_orders: Vec<Order>,
    pub(crate) union_limit: Option<u64>,
    pub(crate) union_offset: Option<u64>,
    pub(crate) eager_loads: IndexMap<String, Relation>,
    pub(crate) bindings: Bindings,
}

impl Clone for Builder {
    fn clone(&self) -> Self {
        // Exhaustive destructuring: a new field fails to compile until it is cloned here.
        let Builder {
            connection,
            aggregate,
            columns,
            distinct,
            from,
            joins,
            wheres,
            groups,
            havings,
            orders,
            limit,
            offset,
            unions,
            union_orders,
            union_limit,
            union_offset,
            eager_loads,
            bindings,
        } = self;
        Builder {
            connection: connection.clone(),
            aggregate: aggregate.clone(),
            columns: columns.clone(),
            distinct: *distinct,
            from: from.clone(),
            joins: joins.clone(),
            wheres: wheres.clone(),
            groups: groups.clone(),
            havings: havings.clone(),
            orders: orders.clone(),
            limit: *limit,
            offset: *offset,
            unions: unions.clone(),
            union_orders: union_orders.clone(),
            union_limit: *union_limit,
            union_offset: *union_offset,
            eager_loads: eager_loads.clone(),
            bindings: bindings.clone(),
        }
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("sql", &self.to_sql())
            .field("bindings", &self.bindings)
            .field("eager_loads", &self.eager_loads.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// A compile-only builder on the default dialect.
    pub fn new() -> Self {
        Self::with_connection(Connection::default())
    }

    pub fn with_connection(connection: Connection) -> Self {
        Self {
            connection,
            aggregate: None,
            columns: Vec::new(),
            distinct: false,
            from: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            groups: Vec::new(),
            havings: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            unions: Vec::new(),
            union_orders: Vec::new(),
            union_limit: None,
            union_offset: None,
            eager_loads: IndexMap::new(),
            bindings: Bindings::new(),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn grammar(&self) -> &dyn Grammar {
        self.connection.grammar()
    }

    /// An empty builder sharing this one's dialect, executor and config.
    pub fn new_query(&self) -> Builder {
        Builder::with_connection(self.connection.clone())
    }

    /// The name that qualifies this query's columns: the alias when one is given.
    pub fn table_or_alias(&self) -> String {
        let Some(source) = &self.from else {
            return String::new();
        };
        let text = source.as_str();
        let name = match text.to_ascii_lowercase().rfind(" as ") {
            Some(position) => &text[position + 4..],
            None => text,
        };
        name.trim().trim_matches(|c| c == '`' || c == '"').to_string()
    }

    /// `table.column` unless the column is already qualified.
    pub(crate) fn qualify(&self, column: &str) -> String {
        if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{column}", self.table_or_alias())
        }
    }

    pub(crate) fn for_nested_where(&self) -> Builder {
        let mut query = self.new_query();
        query.from = self.from.clone();
        query
    }

    // ---- projection ----

    /// Replaces the selected columns.
    pub fn select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self.bindings.clear(BindingCategory::Select);
        self
    }

    pub fn add_select<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.columns.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn select_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.columns.push(ColumnRef::Raw(Expression::new(sql)));
        self.bindings.extend(BindingCategory::Select, bindings);
        self
    }

    /// Adds `(subquery) as alias` to the selected columns.
    pub fn select_sub<'a>(self, query: impl Into<SubQuery<'a>>, alias: &str) -> Result<Self> {
        let (sql, bindings) = self.create_sub(query.into())?;
        let alias = self.grammar().wrap_value(alias);
        Ok(self.select_raw(&format!("({sql}) as {alias}"), bindings))
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ---- source ----

    pub fn from(mut self, table: impl Into<Source>) -> Self {
        self.from = Some(table.into());
        self
    }

    pub fn table(self, table: impl Into<Source>) -> Self {
        self.from(table)
    }

    pub fn from_as(self, table: &str, alias: &str) -> Self {
        self.from(format!("{table} as {alias}"))
    }

    pub fn from_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.from = Some(Source::Raw(Expression::new(sql)));
        self.bindings.extend(BindingCategory::From, bindings);
        self
    }

    /// Uses `(subquery) as alias` as the source.
    pub fn from_sub<'a>(self, query: impl Into<SubQuery<'a>>, alias: &str) -> Result<Self> {
        let (sql, bindings) = self.create_sub(query.into())?;
        let alias = self.grammar().wrap_table(alias);
        Ok(self.from_raw(&format!("({sql}) as {alias}"), bindings))
    }

    /// Resolves a subquery to its SQL and flattened bindings.
    pub(crate) fn create_sub(&self, query: SubQuery<'_>) -> Result<(String, Vec<Value>)> {
        match query {
            SubQuery::Sql(sql) => Ok((sql, Vec::new())),
            other => {
                let query = self.sub_builder(other)?;
                Ok((query.to_sql(), query.get_flatten_bindings()))
            }
        }
    }

    /// Resolves a subquery that must be a builder; raw SQL is rejected.
    pub(crate) fn sub_builder(&self, query: SubQuery<'_>) -> Result<Builder> {
        match query {
            SubQuery::Builder(builder) => Ok(*builder),
            SubQuery::Closure(f) => f(self.new_query()),
            SubQuery::Sql(_) => Err(QueryError::UnsupportedSubqueryType),
        }
    }

    // ---- joins ----

    pub fn join(self, table: impl Into<Source>, first: &str, operator: &str, second: &str) -> Self {
        let join = JoinClause::new(&self.connection, JoinKind::Inner, table.into()).on(first, operator, second);
        self.push_join(join)
    }

    pub fn left_join(self, table: impl Into<Source>, first: &str, operator: &str, second: &str) -> Self {
        let join = JoinClause::new(&self.connection, JoinKind::Left, table.into()).on(first, operator, second);
        self.push_join(join)
    }

    pub fn right_join(self, table: impl Into<Source>, first: &str, operator: &str, second: &str) -> Self {
        let join = JoinClause::new(&self.connection, JoinKind::Right, table.into()).on(first, operator, second);
        self.push_join(join)
    }

    pub fn cross_join(self, table: impl Into<Source>) -> Self {
        let join = JoinClause::new(&self.connection, JoinKind::Cross, table.into());
        self.push_join(join)
    }

    /// Joins with the `on` conditions built by `f`.
    pub fn join_with<F>(self, table: impl Into<Source>, kind: JoinKind, f: F) -> Result<Self>
    where
        F: FnOnce(JoinClause) -> Result<JoinClause>,
    {
        let join = f(JoinClause::new(&self.connection, kind, table.into()))?;
        Ok(self.push_join(join))
    }

    /// Joins on a bound value: `join table on first <operator> ?`.
    pub fn join_where<'a>(
        self,
        table: impl Into<Source>,
        first: &str,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.join_where_kind(table.into(), JoinKind::Inner, first, operator, value.into())
    }

    pub fn left_join_where<'a>(
        self,
        table: impl Into<Source>,
        first: &str,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.join_where_kind(table.into(), JoinKind::Left, first, operator, value.into())
    }

    pub fn right_join_where<'a>(
        self,
        table: impl Into<Source>,
        first: &str,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.join_where_kind(table.into(), JoinKind::Right, first, operator, value.into())
    }

    fn join_where_kind(
        self,
        table: Source,
        kind: JoinKind,
        first: &str,
        operator: &str,
        value: WhereValue<'_>,
    ) -> Result<Self> {
        let join = JoinClause::new(&self.connection, kind, table).where_(first, operator, value)?;
        Ok(self.push_join(join))
    }

    pub fn join_sub<'a>(
        self,
        query: impl Into<SubQuery<'a>>,
        alias: &str,
        kind: JoinKind,
        first: &str,
        operator: &str,
        second: &str,
    ) -> Result<Self> {
        let (sql, bindings) = self.create_sub(query.into())?;
        let table = Source::Raw(Expression::new(format!("({sql}) as {}", self.grammar().wrap_table(alias))));
        let join = JoinClause::new(&self.connection, kind, table).on(first, operator, second);
        let mut query = self;
        query.bindings.extend(BindingCategory::Join, bindings);
        Ok(query.push_join(join))
    }

    pub(crate) fn push_join(mut self, join: JoinClause) -> Self {
        self.bindings.extend(BindingCategory::Join, join.query.get_flatten_bindings());
        self.joins.push(join);
        self
    }

    // ---- grouping ----

    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ColumnRef>,
    {
        self.groups.extend(columns.into_iter().map(Into::into));
        self
    }

    pub fn group_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.groups.push(ColumnRef::Raw(Expression::new(sql)));
        self.bindings.extend(BindingCategory::GroupBy, bindings);
        self
    }

    // ---- ordering ----

    pub fn order_by(mut self, column: impl Into<ColumnRef>, direction: Direction) -> Self {
        let order = Order::Column { column: column.into(), direction };
        if self.unions.is_empty() {
            self.orders.push(order);
        } else {
            self.union_orders.push(order);
        }
        self
    }

    pub fn order_by_desc(self, column: impl Into<ColumnRef>) -> Self {
        self.order_by(column, Direction::Desc)
    }

    /// Orders by the result of a scalar subquery.
    pub fn order_by_sub<'a>(self, query: impl Into<SubQuery<'a>>, direction: Direction) -> Result<Self> {
        let (sql, bindings) = self.create_sub(query.into())?;
        let mut query = self;
        let category = query.order_category();
        query.bindings.extend(category, bindings);
        Ok(query.order_by(Expression::new(format!("({sql})")), direction))
    }

    pub fn order_by_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        let category = self.order_category();
        if self.unions.is_empty() {
            self.orders.push(Order::Raw(sql.to_string()));
        } else {
            self.union_orders.push(Order::Raw(sql.to_string()));
        }
        self.bindings.extend(category, bindings);
        self
    }

    fn order_category(&self) -> BindingCategory {
        if self.unions.is_empty() {
            BindingCategory::Order
        } else {
            BindingCategory::UnionOrder
        }
    }

    /// Newest first, on `column` or the configured creation column.
    pub fn latest(self, column: Option<&str>) -> Self {
        let column = column.map(str::to_string).unwrap_or_else(|| self.connection.config().created_column.clone());
        self.order_by(column, Direction::Desc)
    }

    pub fn oldest(self, column: Option<&str>) -> Self {
        let column = column.map(str::to_string).unwrap_or_else(|| self.connection.config().created_column.clone());
        self.order_by(column, Direction::Asc)
    }

    pub fn in_random_order(self, seed: &str) -> Self {
        let sql = self.grammar().compile_random(seed);
        self.order_by_raw(&sql, Vec::new())
    }

    /// Drops every ordering together with its bindings.
    pub fn reorder(mut self) -> Self {
        self.orders.clear();
        self.union_orders.clear();
        self.bindings.clear(BindingCategory::Order);
        self.bindings.clear(BindingCategory::UnionOrder);
        self
    }

    pub fn reorder_by(self, column: impl Into<ColumnRef>, direction: Direction) -> Self {
        self.reorder().order_by(column, direction)
    }

    pub(crate) fn remove_existing_orders_for(mut self, column: &str) -> Self {
        self.orders.retain(|order| !order.targets(column));
        self
    }

    // ---- window ----

    pub fn limit(mut self, value: u64) -> Self {
        if self.unions.is_empty() {
            self.limit = Some(value);
        } else {
            self.union_limit = Some(value);
        }
        self
    }

    pub fn take(self, value: u64) -> Self {
        self.limit(value)
    }

    pub fn offset(mut self, value: u64) -> Self {
        if self.unions.is_empty() {
            self.offset = Some(value);
        } else {
            self.union_offset = Some(value);
        }
        self
    }

    pub fn skip(self, value: u64) -> Self {
        self.offset(value)
    }

    /// Window for a 1-based page.
    pub fn for_page(self, page: u64, per_page: u64) -> Self {
        let offset = page.max(1).saturating_sub(1).saturating_mul(per_page);
        self.offset(offset).limit(per_page)
    }

    /// Cursor window: rows with `column` greater than `last_id`, ascending.
    pub fn for_page_after_id(self, per_page: u64, last_id: Option<Value>, column: &str) -> Result<Self> {
        let mut query = self.remove_existing_orders_for(column);
        if let Some(last_id) = last_id {
            query = query.where_(column, ">", last_id)?;
        }
        Ok(query.order_by(column, Direction::Asc).limit(per_page))
    }

    /// Cursor window: rows with `column` lower than `last_id`, descending.
    pub fn for_page_before_id(self, per_page: u64, last_id: Option<Value>, column: &str) -> Result<Self> {
        let mut query = self.remove_existing_orders_for(column);
        if let Some(last_id) = last_id {
            query = query.where_(column, "<", last_id)?;
        }
        Ok(query.order_by(column, Direction::Desc).limit(per_page))
    }

    // ---- unions ----

    pub fn union<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        self.push_union(query.into(), false)
    }

    pub fn union_all<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        self.push_union(query.into(), true)
    }

    fn push_union(mut self, query: SubQuery<'_>, all: bool) -> Result<Self> {
        let query = self.sub_builder(query)?;
        self.bindings.extend(BindingCategory::Union, query.get_flatten_bindings());
        self.unions.push(Union { query: Box::new(query), all });
        Ok(self)
    }

    // ---- conditional composition ----

    /// Applies `f` only when `condition` holds.
    pub fn when<F>(self, condition: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        if condition { f(self) } else { Ok(self) }
    }

    pub fn unless<F>(self, condition: bool, f: F) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        self.when(!condition, f)
    }

    pub fn tap<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        f(self)
    }

    // ---- eager loading ----

    /// Registers a relation to load after the base rows are fetched.
    pub fn with(mut self, name: &str, relation: impl Into<Relation>) -> Self {
        self.eager_loads.insert(name.to_string(), relation.into());
        self
    }

    pub fn without(mut self, name: &str) -> Self {
        self.eager_loads.shift_remove(name);
        self
    }

    // ---- bindings ----

    /// Adds a value to the bucket named by `category`. Arrays are spread.
    pub fn add_binding(mut self, value: Value, category: &str) -> Result<Self> {
        let category: BindingCategory = category.parse()?;
        self.bindings.add(category, value);
        Ok(self)
    }

    /// Appends every bucket of `other` onto this builder's buckets.
    pub fn merge_bindings(mut self, other: &Builder) -> Self {
        self.bindings.merge(&other.bindings);
        self
    }

    pub fn get_raw_bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// All parameter values in placeholder order.
    pub fn get_flatten_bindings(&self) -> Vec<Value> {
        self.bindings.flatten()
    }

    // ---- cloning ----

    pub fn clone_without(&self, components: &[Component]) -> Builder {
        let mut query = self.clone();
        for component in components {
            match component {
                Component::Aggregate => query.aggregate = None,
                Component::Columns => query.columns.clear(),
                Component::From => query.from = None,
                Component::Joins => query.joins.clear(),
                Component::Wheres => query.wheres.clear(),
                Component::Groups => query.groups.clear(),
                Component::Havings => query.havings.clear(),
                Component::Orders => query.orders.clear(),
                Component::Limit => query.limit = None,
                Component::Offset => query.offset = None,
                Component::Unions => query.unions.clear(),
                Component::UnionOrders => query.union_orders.clear(),
                Component::UnionLimit => query.union_limit = None,
                Component::UnionOffset => query.union_offset = None,
                Component::EagerLoads => query.eager_loads.clear(),
            }
        }
        query
    }

    pub fn clone_without_bindings(&self, categories: &[BindingCategory]) -> Builder {
        let mut query = self.clone();
        for category in categories {
            query.bindings.clear(*category);
        }
        query
    }

    pub(crate) fn set_aggregate(mut self, function: &str, columns: Vec<ColumnRef>) -> Self {
        self.aggregate = Some(Aggregate { function: function.to_string(), columns });
        if self.groups.is_empty() {
            self.orders.clear();
            self.bindings.clear(BindingCategory::Order);
        }
        self
    }

    // ---- compiled output ----

    pub fn to_sql(&self) -> String {
        self.grammar().compile_select(self)
    }

    // ---- read access for dialects ----

    pub fn get_aggregate(&self) -> Option<&Aggregate> {
        self.aggregate.as_ref()
    }

    pub fn get_columns(&self) -> &[ColumnRef] {
        &self.columns
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub fn get_from(&self) -> Option<&Source> {
        self.from.as_ref()
    }

    pub fn get_joins(&self) -> &[JoinClause] {
        &self.joins
    }

    pub fn get_wheres(&self) -> &[Where] {
        &self.wheres
    }

    pub fn get_groups(&self) -> &[ColumnRef] {
        &self.groups
    }

    pub fn get_havings(&self) -> &[Where] {
        &self.havings
    }

    pub fn get_orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get_limit(&self) -> Option<u64> {
        self.limit
    }

    pub fn get_offset(&self) -> Option<u64> {
        self.offset
    }

    pub fn get_unions(&self) -> &[Union] {
        &self.unions
    }

    pub fn get_union_orders(&self) -> &[Order] {
        &self.union_orders
    }

    pub fn get_union_limit(&self) -> Option<u64> {
        self.union_limit
    }

    pub fn get_union_offset(&self) -> Option<u64> {
        self.union_offset
    }

    pub fn get_eager_loads(&self) -> &IndexMap<String, Relation> {
        &self.eager_loads
    }

    pub(crate) fn push_where(mut self, boolean: Connector, predicate: Predicate) -> Self {
        self.wheres.push(Where::new(boolean, predicate));
        self
    }
}
