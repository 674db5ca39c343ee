use crate::{
    error::{QueryError, Result},
    query::{Builder, ColumnRef, Connector, Expression},
    relations::Relation,
};

impl Relation {
    /// A query on the related table whose rows are tied to the current row of `parent`.
    pub(crate) fn correlated_query(&self, parent: &Builder) -> Result<Builder> {
        let outer = parent.table_or_alias();
        let query = self.related_query(parent.connection())?;
        match self {
            Relation::HasOne(r) => {
                query.where_column(format!("{}.{}", r.table, r.foreign_key), "=", format!("{outer}.{}", r.local_key))
            }
            Relation::HasMany(r) => {
                query.where_column(format!("{}.{}", r.table, r.foreign_key), "=", format!("{outer}.{}", r.local_key))
            }
            Relation::BelongsTo(r) => {
                query.where_column(format!("{}.{}", r.table, r.owner_key), "=", format!("{outer}.{}", r.foreign_key))
            }
            Relation::BelongsToMany(r) => {
                let query = query.join(
                    r.pivot_table.as_str(),
                    &format!("{}.{}", r.pivot_table, r.related_pivot_key),
                    "=",
                    &format!("{}.{}", r.table, r.related_key),
                );
                r.apply_pivot_wheres(query, true)?.where_column(
                    format!("{}.{}", r.pivot_table, r.foreign_pivot_key),
                    "=",
                    format!("{outer}.{}", r.local_key),
                )
            }
        }
    }
}

/// `Some(false)` when the comparison reads "at least one", `Some(true)` when it reads "none".
fn exists_form(operator: &str, count: i64) -> Option<bool> {
    match (operator, count) {
        (">=", 1) | (">", 0) => Some(false),
        ("<", 1) | ("<=", 0) | ("=", 0) => Some(true),
        _ => None,
    }
}

/// The operator whose result is the complement of `operator`.
pub fn inverse_operator(operator: &str) -> Result<&'static str> {
    match operator {
        ">=" => Ok("<"),
        "<" => Ok(">="),
        ">" => Ok("<="),
        "<=" => Ok(">"),
        "=" => Ok("!="),
        "!=" | "<>" => Ok("="),
        other => Err(QueryError::UnsupportedOperator(other.to_string())),
    }
}

impl Builder {
    /// Adds `(select function(column) from related where <correlation>) as name` to the selection.
    /// Null results read as 0.
    pub fn with_aggregate(self, name: &str, relation: impl Into<Relation>, function: &str, column: &str) -> Result<Self> {
        let relation = relation.into();
        let column = if column == "*" || column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{column}", relation.table())
        };
        let expression = format!("{function}({})", self.grammar().wrap_str(&column));
        let expression = self.grammar().compile_ifnull(&expression, "0");
        let sub = relation.correlated_query(&self)?.select([Expression::new(expression)]);
        let mut query = self;
        if query.columns.is_empty() {
            query.columns.push(ColumnRef::from(format!("{}.*", query.table_or_alias())));
        }
        query.select_sub(sub, name)
    }

    pub fn with_count(self, name: &str, relation: impl Into<Relation>) -> Result<Self> {
        self.with_aggregate(name, relation, "count", "*")
    }

    pub fn with_sum(self, name: &str, relation: impl Into<Relation>, column: &str) -> Result<Self> {
        self.with_aggregate(name, relation, "sum", column)
    }

    pub fn with_min(self, name: &str, relation: impl Into<Relation>, column: &str) -> Result<Self> {
        self.with_aggregate(name, relation, "min", column)
    }

    pub fn with_max(self, name: &str, relation: impl Into<Relation>, column: &str) -> Result<Self> {
        self.with_aggregate(name, relation, "max", column)
    }

    pub fn with_avg(self, name: &str, relation: impl Into<Relation>, column: &str) -> Result<Self> {
        self.with_aggregate(name, relation, "avg", column)
    }

    fn has(self, relation: Relation, operator: &str, count: i64, boolean: Connector) -> Result<Self> {
        let operator = self.checked_operator(operator)?;
        let related = relation.correlated_query(&self)?;
        match exists_form(&operator, count) {
            Some(negated) => Ok(self.add_where_exists(related, negated, boolean)),
            None => {
                let counted = related.select([Expression::new("count(*)")]);
                self.add_where(counted, Some(&operator), count, boolean)
            }
        }
    }

    /// Keeps rows with `count(related) <operator> count`. "At least one" and "none"
    /// comparisons compile to `exists`/`not exists`, others to a correlated count.
    pub fn where_has(self, relation: impl Into<Relation>, operator: &str, count: i64) -> Result<Self> {
        self.has(relation.into(), operator, count, Connector::And)
    }

    pub fn or_where_has(self, relation: impl Into<Relation>, operator: &str, count: i64) -> Result<Self> {
        self.has(relation.into(), operator, count, Connector::Or)
    }

    /// Keeps rows without any related row.
    pub fn where_doesnt_have(self, relation: impl Into<Relation>) -> Result<Self> {
        self.has(relation.into(), "<", 1, Connector::And)
    }

    pub fn or_where_doesnt_have(self, relation: impl Into<Relation>) -> Result<Self> {
        self.has(relation.into(), "<", 1, Connector::Or)
    }

    /// The complement of [`Builder::where_has`] with the same operator and count.
    pub fn where_doesnt_have_count(self, relation: impl Into<Relation>, operator: &str, count: i64) -> Result<Self> {
        let operator = inverse_operator(operator)?;
        self.has(relation.into(), operator, count, Connector::And)
    }
}
