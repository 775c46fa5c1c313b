use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde_yaml::{value::TaggedValue, Mapping, Value};

use crate::blob::compress_to_blob;
use crate::yaml::{as_mapping, get_mapping, sorted_mapping, value_key_to_string};

// Data tables the web unlocker ships beside the mission catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableKind {
    Collectibles,
    Unlockables,
}

impl TableKind {
    pub fn name(self) -> &'static str {
        match self {
            TableKind::Collectibles => "collectibles",
            TableKind::Unlockables => "unlockables",
        }
    }

    // Collectibles live in a character save, unlockables in profile.sav.
    fn path(self) -> [&'static str; 3] {
        match self {
            TableKind::Collectibles => ["stats", "openworld", "collectibles"],
            TableKind::Unlockables => ["domains", "local", "unlockables"],
        }
    }

    pub fn extract(self, document: &Value) -> Mapping {
        let [outer, middle, inner] = self.path();
        as_mapping(document)
            .and_then(|root| get_mapping(root, outer))
            .and_then(|map| get_mapping(map, middle))
            .and_then(|map| get_mapping(map, inner))
            .map(sort_table)
            .unwrap_or_default()
    }
}

pub fn parse_table(text: &str) -> Result<Mapping> {
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    let root: Value = serde_yaml::from_str(text).context("failed to parse data table")?;
    match root {
        Value::Null => Ok(Mapping::new()),
        Value::Mapping(map) => Ok(map),
        _ => bail!("data table must be a mapping"),
    }
}

pub fn table_to_yaml(table: &Mapping) -> Result<String> {
    serde_yaml::to_string(table).context("failed to serialize data table")
}

pub fn table_to_compressed_blob(table: &Mapping) -> Result<String> {
    compress_to_blob(table_to_yaml(table)?.as_bytes())
}

// Keys ordered case-insensitively at every level, lists ordered by their text.
pub fn sort_table(table: &Mapping) -> Mapping {
    sorted_mapping(table, key_order)
        .into_iter()
        .map(|(name, value)| (name, sort_value(&value)))
        .collect()
}

fn sort_value(value: &Value) -> Value {
    match value {
        Value::Mapping(map) => Value::Mapping(sort_table(map)),
        Value::Sequence(items) => {
            let mut sorted: Vec<Value> = items.iter().map(sort_value).collect();
            sorted.sort_by_cached_key(entry_order);
            Value::Sequence(sorted)
        }
        Value::Tagged(tagged) => Value::Tagged(Box::new(TaggedValue {
            tag: tagged.tag.clone(),
            value: sort_value(&tagged.value),
        })),
        other => other.clone(),
    }
}

// Folds `incoming` into `existing`: nested mappings merge, lists union, scalars
// are replaced, and a mapping or list is never replaced by a different shape.
pub fn merge_table(existing: &mut Mapping, incoming: Mapping) {
    for (name, value) in incoming {
        match existing.get_mut(&name) {
            Some(current) => merge_value(current, value),
            None => {
                existing.insert(name, value);
            }
        }
    }
    *existing = sorted_mapping(existing, key_order);
}

fn merge_value(current: &mut Value, incoming: Value) {
    match (current, incoming) {
        (Value::Mapping(current_map), Value::Mapping(incoming_map)) => {
            merge_table(current_map, incoming_map)
        }
        (Value::Sequence(current_items), Value::Sequence(incoming_items)) => {
            let merged = merge_entry_lists(std::mem::take(current_items), incoming_items);
            *current_items = merged;
        }
        (current, incoming) if !matches!(current, Value::Mapping(_) | Value::Sequence(_)) => {
            *current = incoming;
        }
        _ => {}
    }
}

fn merge_entry_lists(current: Vec<Value>, incoming: Vec<Value>) -> Vec<Value> {
    let all_strings = current
        .iter()
        .chain(incoming.iter())
        .all(|item| item.as_str().is_some());

    if all_strings {
        // Case-only differences keep the spelling already on file.
        let mut by_lowercase = BTreeMap::new();
        for item in current.into_iter().chain(incoming) {
            let lowered = item.as_str().unwrap_or_default().to_lowercase();
            by_lowercase.entry(lowered).or_insert(item);
        }
        return by_lowercase.into_values().collect();
    }

    let mut merged = current;
    for item in incoming {
        if !merged.contains(&item) {
            merged.push(item);
        }
    }
    merged.sort_by_cached_key(entry_order);
    merged
}

fn key_order(name: &Value) -> String {
    value_key_to_string(name).unwrap_or_default().to_lowercase()
}

fn entry_order(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Number(num) => num.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => String::new(),
        Value::Tagged(tagged) => return entry_order(&tagged.value),
        compound => serde_yaml::to_string(compound).unwrap_or_default(),
    };
    text.to_lowercase()
}
