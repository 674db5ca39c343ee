use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::{
    error::Result,
    executor::{Connection, Record, key_string},
    relations::{BelongsToMany, Relation},
};

/// Column alias carrying the parent key through a many-to-many join. Removed before rows are returned.
const PIVOT_ID: &str = "_pivot_id";

/// Loads `relation` for every row with one query and stores the result under `name`.
///
/// Keys are compared by their string form, so `1` and `"1"` match. Parents
/// without a match get `null` (singular) or `[]` (plural). Row order is kept.
pub(crate) fn load(connection: &Connection, rows: Vec<Record>, name: &str, relation: &Relation) -> Result<Vec<Record>> {
    let keys = collect_keys(&rows, relation.parent_key());
    debug!(relation = name, table = relation.table(), keys = keys.len(), "eager load");
    if keys.is_empty() {
        return Ok(attach_empty(rows, name, relation));
    }
    match relation {
        Relation::HasOne(r) => {
            let related = relation.related_query(connection)?.where_in(r.foreign_key.as_str(), keys)?.get()?;
            Ok(stitch(rows, name, &r.local_key, &related, &r.foreign_key, true))
        }
        Relation::HasMany(r) => {
            let related = relation.related_query(connection)?.where_in(r.foreign_key.as_str(), keys)?.get()?;
            Ok(stitch(rows, name, &r.local_key, &related, &r.foreign_key, false))
        }
        Relation::BelongsTo(r) => {
            let related = relation.related_query(connection)?.where_in(r.owner_key.as_str(), keys)?.get()?;
            Ok(stitch(rows, name, &r.foreign_key, &related, &r.owner_key, true))
        }
        Relation::BelongsToMany(r) => load_many_to_many(connection, rows, name, relation, r, keys),
    }
}

/// Distinct non-null values of `key`, in first-seen order.
fn collect_keys(rows: &[Record], key: &str) -> Vec<Value> {
    let mut seen = HashSet::new();
    rows.iter()
        .filter_map(|row| row.get(key))
        .filter(|value| key_string(value).is_some_and(|k| seen.insert(k)))
        .cloned()
        .collect()
}

fn attach_empty(rows: Vec<Record>, name: &str, relation: &Relation) -> Vec<Record> {
    rows.into_iter()
        .map(|mut row| {
            row.insert(name.to_string(), relation.empty_value());
            row
        })
        .collect()
}

fn index_by<'a>(rows: &'a [Record], key: &str) -> HashMap<String, Vec<&'a Record>> {
    let mut index: HashMap<String, Vec<&Record>> = HashMap::new();
    for row in rows {
        if let Some(k) = row.get(key).and_then(key_string) {
            index.entry(k).or_default().push(row);
        }
    }
    index
}

fn stitch(
    rows: Vec<Record>,
    name: &str,
    parent_key: &str,
    related: &[Record],
    related_key: &str,
    singular: bool,
) -> Vec<Record> {
    let index = index_by(related, related_key);
    rows.into_iter()
        .map(|mut row| {
            let matches = row.get(parent_key).and_then(key_string).and_then(|k| index.get(&k));
            let value = if singular {
                matches.and_then(|m| m.first()).map(|r| Value::Object((*r).clone())).unwrap_or(Value::Null)
            } else {
                Value::Array(
                    matches.map(|m| m.iter().map(|r| Value::Object((*r).clone())).collect()).unwrap_or_default(),
                )
            };
            row.insert(name.to_string(), value);
            row
        })
        .collect()
}

fn load_many_to_many(
    connection: &Connection,
    rows: Vec<Record>,
    name: &str,
    relation: &Relation,
    r: &BelongsToMany,
    keys: Vec<Value>,
) -> Result<Vec<Record>> {
    let pivot_foreign = format!("{}.{}", r.pivot_table, r.foreign_pivot_key);
    let query = relation
        .related_query(connection)?
        .add_select([format!("{pivot_foreign} as {PIVOT_ID}"), format!("{}.*", r.table)])
        .join(
            r.pivot_table.as_str(),
            &format!("{}.{}", r.pivot_table, r.related_pivot_key),
            "=",
            &format!("{}.{}", r.table, r.related_key),
        );
    let query = r.apply_pivot_orders(r.apply_pivot_wheres(query, true)?, true);
    let related = query.where_in(pivot_foreign, keys.clone())?.get()?;

    let pivot_query = r.apply_pivot_wheres(connection.table(r.pivot_table.as_str()), false)?;
    let pivots = r.apply_pivot_orders(pivot_query, false).where_in(r.foreign_pivot_key.as_str(), keys)?.get()?;

    let mut pivot_index: HashMap<(String, String), &Record> = HashMap::new();
    for pivot in &pivots {
        let parent = pivot.get(&r.foreign_pivot_key).and_then(key_string);
        let child = pivot.get(&r.related_pivot_key).and_then(key_string);
        if let (Some(parent), Some(child)) = (parent, child) {
            pivot_index.entry((parent, child)).or_insert(pivot);
        }
    }
    let related_index = index_by(&related, PIVOT_ID);
    let pivot_key = connection.config().pivot_key.clone();

    Ok(rows
        .into_iter()
        .map(|mut row| {
            let parent = row.get(&r.local_key).and_then(key_string);
            let items = parent
                .as_ref()
                .and_then(|parent| related_index.get(parent).map(|items| (parent, items)))
                .map(|(parent, items)| {
                    items
                        .iter()
                        .map(|item| {
                            let mut item = (*item).clone();
                            item.shift_remove(PIVOT_ID);
                            let pivot = item
                                .get(&r.related_key)
                                .and_then(key_string)
                                .and_then(|child| pivot_index.get(&(parent.clone(), child)))
                                .map(|pivot| Value::Object((*pivot).clone()))
                                .unwrap_or(Value::Null);
                            item.insert(pivot_key.clone(), pivot);
                            Value::Object(item)
                        })
                        .collect()
                })
                .unwrap_or_default();
            row.insert(name.to_string(), Value::Array(items));
            row
        })
        .collect())
}
