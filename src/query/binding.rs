use std::{fmt, str::FromStr};

use serde_json::Value;

use crate::error::QueryError;

/// The buckets a query's parameter values are grouped in. Flattening walks
/// them in declaration order, which mirrors the textual order of the clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingCategory {
    Select,
    From,
    Join,
    Where,
    GroupBy,
    Having,
    Order,
    Union,
    UnionOrder,
}

impl BindingCategory {
    pub const ALL: [BindingCategory; 9] = [
        BindingCategory::Select,
        BindingCategory::From,
        BindingCategory::Join,
        BindingCategory::Where,
        BindingCategory::GroupBy,
        BindingCategory::Having,
        BindingCategory::Order,
        BindingCategory::Union,
        BindingCategory::UnionOrder,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BindingCategory::Select => "select",
            BindingCategory::From => "from",
            BindingCategory::Join => "join",
            BindingCategory::Where => "where",
            BindingCategory::GroupBy => "groupBy",
            BindingCategory::Having => "having",
            BindingCategory::Order => "order",
            BindingCategory::Union => "union",
            BindingCategory::UnionOrder => "unionOrder",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for BindingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BindingCategory {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BindingCategory::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| QueryError::InvalidBindingCategory(s.to_string()))
    }
}

/// Parameter values of one query, kept per [`BindingCategory`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    buckets: [Vec<Value>; 9],
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value. Arrays are spread into one entry per element.
    pub fn add(&mut self, category: BindingCategory, value: Value) {
        let bucket = &mut self.buckets[category.index()];
        match value {
            Value::Array(values) => bucket.extend(values),
            other => bucket.push(other),
        }
    }

    pub fn extend<I>(&mut self, category: BindingCategory, values: I)
    where
        I: IntoIterator<Item = Value>,
    {
        self.buckets[category.index()].extend(values);
    }

    pub fn get(&self, category: BindingCategory) -> &[Value] {
        &self.buckets[category.index()]
    }

    pub fn set(&mut self, category: BindingCategory, values: Vec<Value>) {
        self.buckets[category.index()] = values;
    }

    pub fn clear(&mut self, category: BindingCategory) {
        self.buckets[category.index()].clear();
    }

    /// Appends every bucket of `other` onto the matching bucket of `self`.
    pub fn merge(&mut self, other: &Bindings) {
        for (bucket, incoming) in self.buckets.iter_mut().zip(other.buckets.iter()) {
            bucket.extend(incoming.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    /// Every value, bucket by bucket, with composite values expanded.
    pub fn flatten(&self) -> Vec<Value> {
        self.flatten_except(&[])
    }

    pub fn flatten_except(&self, excluded: &[BindingCategory]) -> Vec<Value> {
        let mut out = Vec::new();
        for category in BindingCategory::ALL {
            if excluded.contains(&category) {
                continue;
            }
            for value in self.get(category) {
                flatten_into(value, &mut out);
            }
        }
        out
    }
}

/// Recursively expands arrays and objects into a single ordered sequence of scalars.
pub fn flatten(value: &Value) -> Vec<Value> {
    let mut out = Vec::new();
    flatten_into(value, &mut out);
    out
}

fn flatten_into(value: &Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| flatten_into(item, out)),
        Value::Object(map) => map.values().for_each(|item| flatten_into(item, out)),
        scalar => out.push(scalar.clone()),
    }
}
