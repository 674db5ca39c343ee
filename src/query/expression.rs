use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::Value;

/// Literal SQL that is written through verbatim: never quoted, never bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression(pub String);

impl Expression {
    pub fn new(sql: impl Into<String>) -> Self {
        Self(sql.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Shorthand for [`Expression::new`].
pub fn raw(sql: impl Into<String>) -> Expression {
    Expression::new(sql)
}

/// A value position in a predicate, assignment or insert row.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Raw(Expression),
}

impl Operand {
    pub fn null() -> Self {
        Operand::Value(Value::Null)
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Operand::Raw(_))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }

    /// The value this operand binds, `None` for raw expressions.
    pub fn binding(&self) -> Option<&Value> {
        match self {
            Operand::Value(value) => Some(value),
            Operand::Raw(_) => None,
        }
    }
}

macro_rules! operand_from_json {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(value: $ty) -> Self {
                    Operand::Value(Value::from(value))
                }
            }
        )*
    };
}

operand_from_json!(i8, i16, i32, i64, u8, u16, u32, u64, f32, f64, bool, String, &str);

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Value(value)
    }
}

impl From<Expression> for Operand {
    fn from(value: Expression) -> Self {
        Operand::Raw(value)
    }
}

impl From<NaiveDate> for Operand {
    fn from(value: NaiveDate) -> Self {
        Operand::Value(Value::String(value.format("%Y-%m-%d").to_string()))
    }
}

impl From<NaiveTime> for Operand {
    fn from(value: NaiveTime) -> Self {
        Operand::Value(Value::String(value.format("%H:%M:%S").to_string()))
    }
}

impl From<NaiveDateTime> for Operand {
    fn from(value: NaiveDateTime) -> Self {
        Operand::Value(Value::String(value.format("%Y-%m-%d %H:%M:%S").to_string()))
    }
}

impl<T: Into<Operand>> From<Option<T>> for Operand {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => value.into(),
            None => Operand::null(),
        }
    }
}

/// A column position: a (possibly qualified or aliased) name or a raw expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnRef {
    Name(String),
    Raw(Expression),
}

impl ColumnRef {
    pub fn star() -> Self {
        ColumnRef::Name("*".to_string())
    }

    pub fn name(&self) -> &str {
        match self {
            ColumnRef::Name(name) => name,
            ColumnRef::Raw(expression) => expression.as_str(),
        }
    }
}

impl From<&str> for ColumnRef {
    fn from(value: &str) -> Self {
        ColumnRef::Name(value.to_string())
    }
}

impl From<String> for ColumnRef {
    fn from(value: String) -> Self {
        ColumnRef::Name(value)
    }
}

impl From<&String> for ColumnRef {
    fn from(value: &String) -> Self {
        ColumnRef::Name(value.clone())
    }
}

impl From<Expression> for ColumnRef {
    fn from(value: Expression) -> Self {
        ColumnRef::Raw(value)
    }
}

/// The target of a query: a table name (optionally `"table as alias"`) or a raw expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Table(String),
    Raw(Expression),
}

impl Source {
    pub fn as_str(&self) -> &str {
        match self {
            Source::Table(name) => name,
            Source::Raw(expression) => expression.as_str(),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::Table(value.to_string())
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Source::Table(value)
    }
}

impl From<Expression> for Source {
    fn from(value: Expression) -> Self {
        Source::Raw(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operand_conversions() {
        assert_eq!(Operand::from(18), Operand::Value(json!(18)));
        assert_eq!(Operand::from("Jim"), Operand::Value(json!("Jim")));
        assert_eq!(Operand::from(None::<i64>), Operand::null());
        assert!(Operand::from(raw("now()")).is_raw());
        assert_eq!(Operand::from(raw("now()")).binding(), None);
    }

    #[test]
    fn test_chrono_operands_are_formatted() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        assert_eq!(Operand::from(date), Operand::Value(json!("2020-01-02")));
        let time = NaiveTime::from_hms_opt(12, 5, 0).unwrap();
        assert_eq!(Operand::from(time), Operand::Value(json!("12:05:00")));
        assert_eq!(Operand::from(date.and_time(time)), Operand::Value(json!("2020-01-02 12:05:00")));
    }
}
