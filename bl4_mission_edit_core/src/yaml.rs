use serde_yaml::{Mapping, Value};

pub(crate) fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

pub(crate) fn mapping_mut(value: &mut Value) -> Option<&mut Mapping> {
    match value {
        Value::Mapping(map) => Some(map),
        Value::Tagged(tagged) => mapping_mut(&mut tagged.value),
        _ => None,
    }
}

pub(crate) fn sequence_mut(value: &mut Value) -> Option<&mut Vec<Value>> {
    match value {
        Value::Sequence(seq) => Some(seq),
        Value::Tagged(tagged) => sequence_mut(&mut tagged.value),
        _ => None,
    }
}

pub(crate) fn as_mapping(value: &Value) -> Option<&Mapping> {
    match value {
        Value::Mapping(map) => Some(map),
        Value::Tagged(tagged) => as_mapping(&tagged.value),
        _ => None,
    }
}

// Replaces anything that is not a mapping with an empty one.
pub(crate) fn ensure_mapping(value: &mut Value) -> &mut Mapping {
    match value {
        Value::Mapping(map) => map,
        Value::Tagged(tagged) => ensure_mapping(&mut tagged.value),
        other => {
            *other = Value::Mapping(Mapping::new());
            ensure_mapping(other)
        }
    }
}

pub(crate) fn ensure_child_mapping<'a>(parent: &'a mut Mapping, name: &str) -> &'a mut Mapping {
    let child = parent
        .entry(key(name))
        .or_insert_with(|| Value::Mapping(Mapping::new()));
    ensure_mapping(child)
}

pub(crate) fn get_mapping<'a>(map: &'a Mapping, name: &str) -> Option<&'a Mapping> {
    map.get(&key(name)).and_then(as_mapping)
}

pub(crate) fn get_sequence<'a>(map: &'a Mapping, name: &str) -> Option<&'a Vec<Value>> {
    map.get(&key(name)).and_then(Value::as_sequence)
}

pub(crate) fn get_string(map: &Mapping, name: &str) -> Option<String> {
    map.get(&key(name)).and_then(|value| match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(num) => num.as_i64().map(|n| n.to_string()),
        _ => None,
    })
}

pub(crate) fn value_key_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(num) => num.as_i64().map(|n| n.to_string()),
        _ => None,
    }
}

// Rebuilds `map` with its entries ordered by `sort_key`.
pub(crate) fn sorted_mapping<K, F>(map: &Mapping, mut sort_key: F) -> Mapping
where
    K: Ord,
    F: FnMut(&Value) -> K,
{
    let mut entries: Vec<(&Value, &Value)> = map.iter().collect();
    entries.sort_by_key(|(k, _)| sort_key(k));
    entries
        .into_iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
