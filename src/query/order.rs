use std::{fmt, str::FromStr};

use crate::{error::QueryError, query::ColumnRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(Direction::Asc),
            "desc" => Ok(Direction::Desc),
            _ => Err(QueryError::invalid("Order direction must be \"asc\" or \"desc\".")),
        }
    }
}

/// An ordering entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Order {
    Column { column: ColumnRef, direction: Direction },
    Raw(String),
}

impl Order {
    /// True when this entry orders by the plain column `name`.
    pub fn targets(&self, name: &str) -> bool {
        matches!(self, Order::Column { column: ColumnRef::Name(column), .. } if column == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_parse() {
        assert_eq!("DESC".parse::<Direction>().unwrap(), Direction::Desc);
        assert!(matches!("up".parse::<Direction>(), Err(QueryError::InvalidArgument(_))));
    }

    #[test]
    fn test_targets_only_plain_columns() {
        let order = Order::Column { column: "id".into(), direction: Direction::Asc };
        assert!(order.targets("id"));
        assert!(!order.targets("name"));
        assert!(!Order::Raw("id desc".into()).targets("id"));
    }
}
