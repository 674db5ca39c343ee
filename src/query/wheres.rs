use serde_json::Value;

use crate::{
    error::{QueryError, Result},
    query::{
        BindingCategory, Builder, ColumnRef, Connector, DatePart, Expression, InValues, Operand, Predicate, SubQuery,
        Where, WhereColumn, WhereValue, binding::flatten,
    },
};

/// Which family a list or map shorthand expands into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shorthand {
    Value,
    Column,
}

/// One placeholder always carries exactly one value.
fn scalar(value: &Value) -> Value {
    flatten(value).into_iter().next().unwrap_or(Value::Null)
}

fn next_item<'a>(items: &mut impl Iterator<Item = WhereValue<'a>>) -> Result<WhereValue<'a>> {
    items.next().ok_or_else(|| QueryError::invalid("Missing where row element."))
}

fn row_string(value: WhereValue<'_>, position: &str) -> Result<String> {
    match value {
        WhereValue::Operand(Operand::Value(Value::String(s))) => Ok(s),
        other => Err(QueryError::invalid(format!("The {position} of a where row must be a string, got {other:?}."))),
    }
}

impl Builder {
    /// Resolves every `where` call shape into predicates.
    ///
    /// - a list or map column becomes a parenthesized group of `and`ed conditions;
    /// - a closure or builder column with neither operator nor value becomes a nested group;
    /// - any other subquery column compares the subquery's result, with `=` when no operator is given;
    /// - a subquery value produces `column <operator> (subquery)`;
    /// - a null value produces `is null`, or `is not null` for non-equality operators;
    /// - a missing operator means `=`.
    pub fn add_where<'a>(
        self,
        column: impl Into<WhereColumn<'a>>,
        operator: Option<&str>,
        value: impl Into<WhereValue<'a>>,
        boolean: Connector,
    ) -> Result<Self> {
        let value = value.into();
        match column.into() {
            WhereColumn::List(rows) => self.add_list_of_wheres(rows, boolean, Shorthand::Value),
            WhereColumn::Map(pairs) => self.add_map_of_wheres(pairs, boolean),
            WhereColumn::Query(query) if operator.is_none() && value.is_null() => match query {
                SubQuery::Closure(f) => self.where_nested_with(f, boolean),
                SubQuery::Builder(nested) => Ok(self.add_nested_where_query(*nested, boolean)),
                SubQuery::Sql(_) => Err(QueryError::UnsupportedSubqueryType),
            },
            WhereColumn::Query(query) => {
                let (sql, bindings) = self.create_sub(query)?;
                let mut builder = self;
                builder.bindings.extend(BindingCategory::Where, bindings);
                let column = ColumnRef::Raw(Expression::new(format!("({sql})")));
                builder.add_column_where(column, operator, value, boolean)
            }
            WhereColumn::Column(column) => self.add_column_where(column, operator, value, boolean),
        }
    }

    fn add_column_where(
        mut self,
        column: ColumnRef,
        operator: Option<&str>,
        value: WhereValue<'_>,
        boolean: Connector,
    ) -> Result<Self> {
        if operator.is_none() && value.is_null() {
            return Ok(self.push_where(boolean, Predicate::Null { column, negated: false }));
        }
        let operator = self.checked_operator(operator.unwrap_or("="))?;
        match value {
            WhereValue::Query(query) => {
                let query = self.sub_builder(query)?;
                self.bindings.extend(BindingCategory::Where, query.get_flatten_bindings());
                Ok(self.push_where(boolean, Predicate::Sub { column, operator, query: Box::new(query) }))
            }
            WhereValue::Operand(value) if value.is_null() => {
                let negated = operator != "=";
                Ok(self.push_where(boolean, Predicate::Null { column, negated }))
            }
            WhereValue::Operand(value) => {
                if let Some(binding) = value.binding() {
                    let binding = scalar(binding);
                    self.bindings.extend(BindingCategory::Where, [binding]);
                }
                Ok(self.push_where(boolean, Predicate::Basic { column, operator, value }))
            }
        }
    }

    /// Lower-cased operator, rejected when the dialect does not know it.
    pub(crate) fn checked_operator(&self, operator: &str) -> Result<String> {
        let operator = operator.trim().to_lowercase();
        if self.grammar().is_valid_operator(&operator) {
            Ok(operator)
        } else {
            Err(QueryError::invalid(format!("Illegal operator '{operator}'.")))
        }
    }

    fn add_list_of_wheres(self, rows: Vec<Vec<WhereValue<'_>>>, boolean: Connector, shorthand: Shorthand) -> Result<Self> {
        let mut nested = self.for_nested_where();
        for row in rows {
            nested = nested.apply_row(row, shorthand)?;
        }
        Ok(self.add_nested_where_query(nested, boolean))
    }

    fn apply_row(self, row: Vec<WhereValue<'_>>, shorthand: Shorthand) -> Result<Self> {
        let count = row.len();
        let mut items = row.into_iter();
        match count {
            1 => match next_item(&mut items)? {
                WhereValue::Query(SubQuery::Closure(f)) => self.where_nested_with(f, Connector::And),
                other => Err(QueryError::invalid(format!("A single-element where row must be a closure, got {other:?}."))),
            },
            2 => {
                let column = WhereColumn::from_row_head(next_item(&mut items)?)?;
                let value = next_item(&mut items)?;
                self.apply_shorthand(column, "=", value, Connector::And, shorthand)
            }
            3 | 4 => {
                let column = WhereColumn::from_row_head(next_item(&mut items)?)?;
                let operator = row_string(next_item(&mut items)?, "operator")?;
                let value = next_item(&mut items)?;
                let boolean = match items.next() {
                    Some(boolean) => row_string(boolean, "boolean")?.parse()?,
                    None => Connector::And,
                };
                self.apply_shorthand(column, &operator, value, boolean, shorthand)
            }
            _ => Err(QueryError::invalid(format!("Invalid where parameters count {count}."))),
        }
    }

    fn apply_shorthand<'a>(
        self,
        column: WhereColumn<'a>,
        operator: &str,
        value: WhereValue<'a>,
        boolean: Connector,
        shorthand: Shorthand,
    ) -> Result<Self> {
        match shorthand {
            Shorthand::Value => self.add_where(column, Some(operator), value, boolean),
            Shorthand::Column => {
                let first = match column {
                    WhereColumn::Column(column) => column,
                    _ => return Err(QueryError::invalid("Column comparisons need a column on the left.")),
                };
                let second = match value {
                    WhereValue::Operand(Operand::Value(Value::String(name))) => ColumnRef::Name(name),
                    WhereValue::Operand(Operand::Raw(expression)) => ColumnRef::Raw(expression),
                    other => return Err(QueryError::invalid(format!("{other:?} cannot be used as a column."))),
                };
                self.add_column_comparison(first, operator, second, boolean)
            }
        }
    }

    fn add_map_of_wheres(self, pairs: Vec<(String, WhereValue<'_>)>, boolean: Connector) -> Result<Self> {
        let mut nested = self.for_nested_where();
        for (column, value) in pairs {
            nested = nested.add_where(column, Some("="), value, Connector::And)?;
        }
        Ok(self.add_nested_where_query(nested, boolean))
    }

    fn where_nested_with<F>(self, f: F, boolean: Connector) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        let nested = f(self.for_nested_where())?;
        Ok(self.add_nested_where_query(nested, boolean))
    }

    /// Wraps the conditions of `nested` in parentheses. An empty group adds nothing.
    pub fn add_nested_where_query(mut self, nested: Builder, boolean: Connector) -> Self {
        if nested.wheres.is_empty() {
            return self;
        }
        self.bindings.extend(BindingCategory::Where, nested.bindings.get(BindingCategory::Where).iter().cloned());
        self.push_where(boolean, Predicate::Nested { wheres: nested.wheres })
    }

    // ---- basic ----

    pub fn where_<'a>(
        self,
        column: impl Into<WhereColumn<'a>>,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.add_where(column, Some(operator), value, Connector::And)
    }

    pub fn or_where<'a>(
        self,
        column: impl Into<WhereColumn<'a>>,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.add_where(column, Some(operator), value, Connector::Or)
    }

    pub fn where_not<'a>(
        self,
        column: impl Into<WhereColumn<'a>>,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.add_where(column, Some(operator), value, Connector::AndNot)
    }

    pub fn or_where_not<'a>(
        self,
        column: impl Into<WhereColumn<'a>>,
        operator: &str,
        value: impl Into<WhereValue<'a>>,
    ) -> Result<Self> {
        self.add_where(column, Some(operator), value, Connector::OrNot)
    }

    /// `column = value`, or `column is null` when the value is null.
    pub fn where_eq<'a>(self, column: impl Into<WhereColumn<'a>>, value: impl Into<WhereValue<'a>>) -> Result<Self> {
        self.add_where(column, None, value, Connector::And)
    }

    pub fn or_where_eq<'a>(self, column: impl Into<WhereColumn<'a>>, value: impl Into<WhereValue<'a>>) -> Result<Self> {
        self.add_where(column, None, value, Connector::Or)
    }

    /// Rows of `[column, value]`, `[column, operator, value]`, `[column, operator, value, boolean]`
    /// or `[closure]`, grouped in parentheses.
    pub fn where_list(self, rows: Vec<Vec<WhereValue<'_>>>) -> Result<Self> {
        self.add_list_of_wheres(rows, Connector::And, Shorthand::Value)
    }

    pub fn or_where_list(self, rows: Vec<Vec<WhereValue<'_>>>) -> Result<Self> {
        self.add_list_of_wheres(rows, Connector::Or, Shorthand::Value)
    }

    /// `column = value` for each pair, grouped in parentheses.
    pub fn where_map<'a, I, K, V>(self, pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<WhereValue<'a>>,
    {
        self.add_where(WhereColumn::map(pairs), None, None::<i64>, Connector::And)
    }

    pub fn where_nested<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        self.where_nested_with(f, Connector::And)
    }

    pub fn or_where_nested<F>(self, f: F) -> Result<Self>
    where
        F: FnOnce(Builder) -> Result<Builder>,
    {
        self.where_nested_with(f, Connector::Or)
    }

    // ---- column comparisons ----

    fn add_column_comparison(self, first: ColumnRef, operator: &str, second: ColumnRef, boolean: Connector) -> Result<Self> {
        let operator = self.checked_operator(operator)?;
        Ok(self.push_where(boolean, Predicate::Column { first, operator, second }))
    }

    pub fn where_column(
        self,
        first: impl Into<ColumnRef>,
        operator: &str,
        second: impl Into<ColumnRef>,
    ) -> Result<Self> {
        self.add_column_comparison(first.into(), operator, second.into(), Connector::And)
    }

    pub fn or_where_column(
        self,
        first: impl Into<ColumnRef>,
        operator: &str,
        second: impl Into<ColumnRef>,
    ) -> Result<Self> {
        self.add_column_comparison(first.into(), operator, second.into(), Connector::Or)
    }

    /// Rows of `[first, second]` or `[first, operator, second]`, grouped in parentheses.
    pub fn where_column_list(self, rows: Vec<Vec<WhereValue<'_>>>) -> Result<Self> {
        self.add_list_of_wheres(rows, Connector::And, Shorthand::Column)
    }

    // ---- null ----

    pub fn where_null(self, column: impl Into<ColumnRef>) -> Self {
        self.push_where(Connector::And, Predicate::Null { column: column.into(), negated: false })
    }

    pub fn or_where_null(self, column: impl Into<ColumnRef>) -> Self {
        self.push_where(Connector::Or, Predicate::Null { column: column.into(), negated: false })
    }

    pub fn where_not_null(self, column: impl Into<ColumnRef>) -> Self {
        self.push_where(Connector::And, Predicate::Null { column: column.into(), negated: true })
    }

    pub fn or_where_not_null(self, column: impl Into<ColumnRef>) -> Self {
        self.push_where(Connector::Or, Predicate::Null { column: column.into(), negated: true })
    }

    // ---- raw ----

    pub fn where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.extend(BindingCategory::Where, bindings);
        self.push_where(Connector::And, Predicate::Raw { sql: sql.to_string() })
    }

    pub fn or_where_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.extend(BindingCategory::Where, bindings);
        self.push_where(Connector::Or, Predicate::Raw { sql: sql.to_string() })
    }

    // ---- in ----

    fn add_where_in(mut self, column: ColumnRef, values: InValues<'_>, negated: bool, boolean: Connector) -> Result<Self> {
        let values = match values {
            InValues::Query(query) => {
                let (sql, bindings) = self.create_sub(query)?;
                self.bindings.extend(BindingCategory::Where, bindings);
                vec![Operand::Raw(Expression::new(sql))]
            }
            InValues::List(values) => {
                let bindings: Vec<Value> = values.iter().filter_map(Operand::binding).map(scalar).collect();
                self.bindings.extend(BindingCategory::Where, bindings);
                values
            }
        };
        Ok(self.push_where(boolean, Predicate::In { column, values, negated }))
    }

    /// `column in (...)`. An empty list never matches.
    pub fn where_in<'a>(self, column: impl Into<ColumnRef>, values: impl Into<InValues<'a>>) -> Result<Self> {
        self.add_where_in(column.into(), values.into(), false, Connector::And)
    }

    pub fn or_where_in<'a>(self, column: impl Into<ColumnRef>, values: impl Into<InValues<'a>>) -> Result<Self> {
        self.add_where_in(column.into(), values.into(), false, Connector::Or)
    }

    /// `column not in (...)`. An empty list always matches.
    pub fn where_not_in<'a>(self, column: impl Into<ColumnRef>, values: impl Into<InValues<'a>>) -> Result<Self> {
        self.add_where_in(column.into(), values.into(), true, Connector::And)
    }

    pub fn or_where_not_in<'a>(self, column: impl Into<ColumnRef>, values: impl Into<InValues<'a>>) -> Result<Self> {
        self.add_where_in(column.into(), values.into(), true, Connector::Or)
    }

    // ---- between ----

    fn add_where_between(mut self, column: ColumnRef, low: Operand, high: Operand, negated: bool, boolean: Connector) -> Self {
        let bindings: Vec<Value> = [&low, &high].into_iter().filter_map(Operand::binding).map(scalar).collect();
        self.bindings.extend(BindingCategory::Where, bindings);
        self.push_where(boolean, Predicate::Between { column, low, high, negated })
    }

    pub fn where_between(self, column: impl Into<ColumnRef>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.add_where_between(column.into(), low.into(), high.into(), false, Connector::And)
    }

    pub fn or_where_between(self, column: impl Into<ColumnRef>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.add_where_between(column.into(), low.into(), high.into(), false, Connector::Or)
    }

    pub fn where_not_between(self, column: impl Into<ColumnRef>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.add_where_between(column.into(), low.into(), high.into(), true, Connector::And)
    }

    pub fn or_where_not_between(
        self,
        column: impl Into<ColumnRef>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        self.add_where_between(column.into(), low.into(), high.into(), true, Connector::Or)
    }

    /// `column between low_column and high_column`; nothing is bound.
    pub fn where_between_columns(
        self,
        column: impl Into<ColumnRef>,
        low: impl Into<ColumnRef>,
        high: impl Into<ColumnRef>,
    ) -> Self {
        let predicate =
            Predicate::BetweenColumns { column: column.into(), low: low.into(), high: high.into(), negated: false };
        self.push_where(Connector::And, predicate)
    }

    pub fn where_not_between_columns(
        self,
        column: impl Into<ColumnRef>,
        low: impl Into<ColumnRef>,
        high: impl Into<ColumnRef>,
    ) -> Self {
        let predicate =
            Predicate::BetweenColumns { column: column.into(), low: low.into(), high: high.into(), negated: true };
        self.push_where(Connector::And, predicate)
    }

    // ---- date parts ----

    fn add_date_where(
        mut self,
        part: DatePart,
        column: ColumnRef,
        operator: &str,
        value: Operand,
        boolean: Connector,
    ) -> Result<Self> {
        let operator = self.checked_operator(operator)?;
        let value = match (part, value) {
            (DatePart::Day | DatePart::Month, Operand::Value(value)) => Operand::Value(zero_pad(&value)),
            (_, value) => value,
        };
        if let Some(binding) = value.binding() {
            let binding = scalar(binding);
            self.bindings.extend(BindingCategory::Where, [binding]);
        }
        Ok(self.push_where(boolean, Predicate::DatePart { part, column, operator, value }))
    }

    pub fn where_date(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Date, column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_where_date(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Date, column.into(), operator, value.into(), Connector::Or)
    }

    pub fn where_time(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Time, column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_where_time(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Time, column.into(), operator, value.into(), Connector::Or)
    }

    /// Compares the day of month; numeric values are bound zero-padded (`"05"`).
    pub fn where_day(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Day, column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_where_day(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Day, column.into(), operator, value.into(), Connector::Or)
    }

    pub fn where_month(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Month, column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_where_month(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Month, column.into(), operator, value.into(), Connector::Or)
    }

    pub fn where_year(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Year, column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_where_year(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_date_where(DatePart::Year, column.into(), operator, value.into(), Connector::Or)
    }

    // ---- exists ----

    pub(crate) fn add_where_exists(mut self, query: Builder, negated: bool, boolean: Connector) -> Self {
        self.bindings.extend(BindingCategory::Where, query.get_flatten_bindings());
        self.push_where(boolean, Predicate::Exists { query: Box::new(query), negated })
    }

    pub fn where_exists<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        let query = self.sub_builder(query.into())?;
        Ok(self.add_where_exists(query, false, Connector::And))
    }

    pub fn or_where_exists<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        let query = self.sub_builder(query.into())?;
        Ok(self.add_where_exists(query, false, Connector::Or))
    }

    pub fn where_not_exists<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        let query = self.sub_builder(query.into())?;
        Ok(self.add_where_exists(query, true, Connector::And))
    }

    pub fn or_where_not_exists<'a>(self, query: impl Into<SubQuery<'a>>) -> Result<Self> {
        let query = self.sub_builder(query.into())?;
        Ok(self.add_where_exists(query, true, Connector::Or))
    }

    // ---- having ----

    fn add_having(mut self, column: ColumnRef, operator: &str, value: Operand, boolean: Connector) -> Result<Self> {
        let operator = self.checked_operator(operator)?;
        if let Some(binding) = value.binding() {
            let binding = scalar(binding);
            self.bindings.extend(BindingCategory::Having, [binding]);
        }
        self.havings.push(Where::new(boolean, Predicate::Basic { column, operator, value }));
        Ok(self)
    }

    pub fn having(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_having(column.into(), operator, value.into(), Connector::And)
    }

    pub fn or_having(self, column: impl Into<ColumnRef>, operator: &str, value: impl Into<Operand>) -> Result<Self> {
        self.add_having(column.into(), operator, value.into(), Connector::Or)
    }

    pub fn having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.extend(BindingCategory::Having, bindings);
        self.havings.push(Where::new(Connector::And, Predicate::Raw { sql: sql.to_string() }));
        self
    }

    pub fn or_having_raw(mut self, sql: &str, bindings: Vec<Value>) -> Self {
        self.bindings.extend(BindingCategory::Having, bindings);
        self.havings.push(Where::new(Connector::Or, Predicate::Raw { sql: sql.to_string() }));
        self
    }

    pub fn having_null(mut self, column: impl Into<ColumnRef>) -> Self {
        self.havings.push(Where::new(Connector::And, Predicate::Null { column: column.into(), negated: false }));
        self
    }

    pub fn having_not_null(mut self, column: impl Into<ColumnRef>) -> Self {
        self.havings.push(Where::new(Connector::And, Predicate::Null { column: column.into(), negated: true }));
        self
    }

    pub fn having_between(mut self, column: impl Into<ColumnRef>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        let (low, high) = (low.into(), high.into());
        let bindings: Vec<Value> = [&low, &high].into_iter().filter_map(Operand::binding).map(scalar).collect();
        self.bindings.extend(BindingCategory::Having, bindings);
        let predicate = Predicate::Between { column: column.into(), low, high, negated: false };
        self.havings.push(Where::new(Connector::And, predicate));
        self
    }
}

fn zero_pad(value: &Value) -> Value {
    match value {
        Value::Number(n) => Value::String(format!("{:0>2}", n.to_string())),
        Value::String(s) => Value::String(format!("{s:0>2}")),
        other => other.clone(),
    }
}
