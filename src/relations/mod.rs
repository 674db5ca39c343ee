use std::{fmt, sync::Arc};

use serde_json::Value;

use crate::{
    error::Result,
    executor::Connection,
    query::{Builder, Direction, Operand},
};

pub mod resolver;

pub mod subquery;


/// Extra constraints applied to every query a relation issues.
#[derive(Clone)]
pub struct Scope(Arc<dyn Fn(Builder) -> Result<Builder> + Send + Sync>);

impl Scope {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(Builder) -> Result<Builder> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, query: Builder) -> Result<Builder> {
        (self.0)(query)
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Scope(..)")
    }
}

fn apply_scope(scope: &Option<Scope>, query: Builder) -> Result<Builder> {
    match scope {
        Some(scope) => scope.apply(query),
        None => Ok(query),
    }
}

/// The related rows hold a key pointing back at the parent: `related.foreign_key = parent.local_key`.
#[derive(Debug, Clone)]
pub struct HasOne {
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub scope: Option<Scope>,
}

impl HasOne {
    pub fn new(table: &str, foreign_key: &str) -> Self {
        Self { table: table.to_string(), foreign_key: foreign_key.to_string(), local_key: "id".to_string(), scope: None }
    }

    pub fn local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    pub fn scope<F>(mut self, f: F) -> Self
    where
        F: Fn(Builder) -> Result<Builder> + Send + Sync + 'static,
    {
        self.scope = Some(Scope::new(f));
        self
    }
}

/// Same keys as [`HasOne`], many related rows per parent.
#[derive(Debug, Clone)]
pub struct HasMany {
    pub table: String,
    pub foreign_key: String,
    pub local_key: String,
    pub scope: Option<Scope>,
}

impl HasMany {
    pub fn new(table: &str, foreign_key: &str) -> Self {
        Self { table: table.to_string(), foreign_key: foreign_key.to_string(), local_key: "id".to_string(), scope: None }
    }

    pub fn local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    pub fn scope<F>(mut self, f: F) -> Self
    where
        F: Fn(Builder) -> Result<Builder> + Send + Sync + 'static,
    {
        self.scope = Some(Scope::new(f));
        self
    }
}

/// The parent row holds the key: `parent.foreign_key = related.owner_key`.
#[derive(Debug, Clone)]
pub struct BelongsTo {
    pub table: String,
    pub foreign_key: String,
    pub owner_key: String,
    pub scope: Option<Scope>,
}

impl BelongsTo {
    pub fn new(table: &str, foreign_key: &str) -> Self {
        Self { table: table.to_string(), foreign_key: foreign_key.to_string(), owner_key: "id".to_string(), scope: None }
    }

    pub fn owner_key(mut self, owner_key: &str) -> Self {
        self.owner_key = owner_key.to_string();
        self
    }

    pub fn scope<F>(mut self, f: F) -> Self
    where
        F: Fn(Builder) -> Result<Builder> + Send + Sync + 'static,
    {
        self.scope = Some(Scope::new(f));
        self
    }
}

/// A condition on a pivot table column.
#[derive(Debug, Clone)]
pub enum PivotConstraint {
    Basic { column: String, operator: String, value: Operand },
    In { column: String, values: Vec<Operand>, negated: bool },
    Between { column: String, low: Operand, high: Operand, negated: bool },
    Null { column: String, negated: bool },
}

/// Many-to-many through a pivot table:
/// `pivot.foreign_pivot_key = parent.local_key` and `pivot.related_pivot_key = related.related_key`.
#[derive(Debug, Clone)]
pub struct BelongsToMany {
    pub table: String,
    pub pivot_table: String,
    pub foreign_pivot_key: String,
    pub related_pivot_key: String,
    pub local_key: String,
    pub related_key: String,
    pub pivot_wheres: Vec<PivotConstraint>,
    pub pivot_orders: Vec<(String, Direction)>,
    pub scope: Option<Scope>,
}

impl BelongsToMany {
    pub fn new(table: &str, pivot_table: &str, foreign_pivot_key: &str, related_pivot_key: &str) -> Self {
        Self {
            table: table.to_string(),
            pivot_table: pivot_table.to_string(),
            foreign_pivot_key: foreign_pivot_key.to_string(),
            related_pivot_key: related_pivot_key.to_string(),
            local_key: "id".to_string(),
            related_key: "id".to_string(),
            pivot_wheres: Vec::new(),
            pivot_orders: Vec::new(),
            scope: None,
        }
    }

    pub fn local_key(mut self, local_key: &str) -> Self {
        self.local_key = local_key.to_string();
        self
    }

    pub fn related_key(mut self, related_key: &str) -> Self {
        self.related_key = related_key.to_string();
        self
    }

    pub fn scope<F>(mut self, f: F) -> Self
    where
        F: Fn(Builder) -> Result<Builder> + Send + Sync + 'static,
    {
        self.scope = Some(Scope::new(f));
        self
    }

    pub fn where_pivot(mut self, column: &str, operator: &str, value: impl Into<Operand>) -> Self {
        self.pivot_wheres.push(PivotConstraint::Basic {
            column: column.to_string(),
            operator: operator.to_string(),
            value: value.into(),
        });
        self
    }

    pub fn where_pivot_in<T: Into<Operand>>(mut self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.pivot_wheres.push(PivotConstraint::In { column: column.to_string(), values, negated: false });
        self
    }

    pub fn where_pivot_not_in<T: Into<Operand>>(mut self, column: &str, values: Vec<T>) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.pivot_wheres.push(PivotConstraint::In { column: column.to_string(), values, negated: true });
        self
    }

    pub fn where_pivot_between(mut self, column: &str, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.pivot_wheres.push(PivotConstraint::Between {
            column: column.to_string(),
            low: low.into(),
            high: high.into(),
            negated: false,
        });
        self
    }

    pub fn where_pivot_null(mut self, column: &str) -> Self {
        self.pivot_wheres.push(PivotConstraint::Null { column: column.to_string(), negated: false });
        self
    }

    pub fn where_pivot_not_null(mut self, column: &str) -> Self {
        self.pivot_wheres.push(PivotConstraint::Null { column: column.to_string(), negated: true });
        self
    }

    pub fn order_by_pivot(mut self, column: &str, direction: Direction) -> Self {
        self.pivot_orders.push((column.to_string(), direction));
        self
    }

    fn pivot_column(&self, column: &str, qualified: bool) -> String {
        if qualified { format!("{}.{column}", self.pivot_table) } else { column.to_string() }
    }

    /// Applies the pivot conditions to `query`, qualifying columns with the pivot table when asked.
    pub(crate) fn apply_pivot_wheres(&self, mut query: Builder, qualified: bool) -> Result<Builder> {
        for constraint in &self.pivot_wheres {
            query = match constraint {
                PivotConstraint::Basic { column, operator, value } => {
                    query.where_(self.pivot_column(column, qualified), operator, value.clone())?
                }
                PivotConstraint::In { column, values, negated: false } => {
                    query.where_in(self.pivot_column(column, qualified), values.clone())?
                }
                PivotConstraint::In { column, values, negated: true } => {
                    query.where_not_in(self.pivot_column(column, qualified), values.clone())?
                }
                PivotConstraint::Between { column, low, high, negated: false } => {
                    query.where_between(self.pivot_column(column, qualified), low.clone(), high.clone())
                }
                PivotConstraint::Between { column, low, high, negated: true } => {
                    query.where_not_between(self.pivot_column(column, qualified), low.clone(), high.clone())
                }
                PivotConstraint::Null { column, negated: false } => {
                    query.where_null(self.pivot_column(column, qualified))
                }
                PivotConstraint::Null { column, negated: true } => {
                    query.where_not_null(self.pivot_column(column, qualified))
                }
            };
        }
        Ok(query)
    }

    pub(crate) fn apply_pivot_orders(&self, mut query: Builder, qualified: bool) -> Builder {
        for (column, direction) in &self.pivot_orders {
            query = query.order_by(self.pivot_column(column, qualified), *direction);
        }
        query
    }
}

/// How rows of one table relate to rows of another.
#[derive(Debug, Clone)]
pub enum Relation {
    HasOne(HasOne),
    HasMany(HasMany),
    BelongsTo(BelongsTo),
    BelongsToMany(BelongsToMany),
}

impl Relation {
    pub fn has_one(table: &str, foreign_key: &str) -> HasOne {
        HasOne::new(table, foreign_key)
    }

    pub fn has_many(table: &str, foreign_key: &str) -> HasMany {
        HasMany::new(table, foreign_key)
    }

    pub fn belongs_to(table: &str, foreign_key: &str) -> BelongsTo {
        BelongsTo::new(table, foreign_key)
    }

    pub fn belongs_to_many(table: &str, pivot_table: &str, foreign_pivot_key: &str, related_pivot_key: &str) -> BelongsToMany {
        BelongsToMany::new(table, pivot_table, foreign_pivot_key, related_pivot_key)
    }

    pub fn table(&self) -> &str {
        match self {
            Relation::HasOne(r) => &r.table,
            Relation::HasMany(r) => &r.table,
            Relation::BelongsTo(r) => &r.table,
            Relation::BelongsToMany(r) => &r.table,
        }
    }

    /// Singular relations attach one row (or null); plural ones attach a list.
    pub fn is_singular(&self) -> bool {
        matches!(self, Relation::HasOne(_) | Relation::BelongsTo(_))
    }

    pub(crate) fn scope(&self) -> &Option<Scope> {
        match self {
            Relation::HasOne(r) => &r.scope,
            Relation::HasMany(r) => &r.scope,
            Relation::BelongsTo(r) => &r.scope,
            Relation::BelongsToMany(r) => &r.scope,
        }
    }

    /// The field of the parent row whose values identify related rows.
    pub(crate) fn parent_key(&self) -> &str {
        match self {
            Relation::HasOne(r) => &r.local_key,
            Relation::HasMany(r) => &r.local_key,
            Relation::BelongsTo(r) => &r.foreign_key,
            Relation::BelongsToMany(r) => &r.local_key,
        }
    }

    /// A builder on the related table with the relation's scope applied.
    pub(crate) fn related_query(&self, connection: &Connection) -> Result<Builder> {
        apply_scope(self.scope(), connection.table(self.table()))
    }

    pub(crate) fn empty_value(&self) -> Value {
        if self.is_singular() { Value::Null } else { Value::Array(Vec::new()) }
    }
}

impl From<HasOne> for Relation {
    fn from(value: HasOne) -> Self {
        Relation::HasOne(value)
    }
}

impl From<HasMany> for Relation {
    fn from(value: HasMany) -> Self {
        Relation::HasMany(value)
    }
}

impl From<BelongsTo> for Relation {
    fn from(value: BelongsTo) -> Self {
        Relation::BelongsTo(value)
    }
}

impl From<BelongsToMany> for Relation {
    fn from(value: BelongsToMany) -> Self {
        Relation::BelongsToMany(value)
    }
}
