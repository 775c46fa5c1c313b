use std::collections::BTreeSet;

use anyhow::Result;
use serde_yaml::Value;

use crate::blob::compress_to_blob;
use crate::yaml::{as_mapping, get_mapping, get_sequence, get_string};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListMerge {
    pub entries: Vec<String>,
    pub extracted: usize,
    pub added: usize,
}

impl ListMerge {
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(|entry| format!("{entry}\n"))
            .collect()
    }

    pub fn to_compressed_blob(&self) -> Result<String> {
        compress_to_blob(self.entries.join(",").as_bytes())
    }
}

pub fn extract_locations(document: &Value) -> Vec<String> {
    as_mapping(document)
        .and_then(|root| get_mapping(root, "gbx_discovery_pg"))
        .and_then(|discovery| get_string(discovery, "dlblob"))
        .map(|blob| split_discovery_blob(&blob))
        .unwrap_or_default()
}

pub fn extract_rewards(document: &Value) -> Vec<String> {
    as_mapping(document)
        .and_then(|root| get_mapping(root, "state"))
        .and_then(|state| get_sequence(state, "unique_rewards"))
        .map(|rewards| {
            rewards
                .iter()
                .filter_map(Value::as_str)
                .map(|reward| reward.to_string())
                .collect()
        })
        .unwrap_or_default()
}

// `dlblob` is location names separated by `:<digit>:` markers.
pub fn split_discovery_blob(blob: &str) -> Vec<String> {
    let bytes = blob.as_bytes();
    let mut locations = Vec::new();
    let mut start = 0;
    let mut idx = 0;
    while idx + 2 < bytes.len() {
        if bytes[idx] == b':' && bytes[idx + 1].is_ascii_digit() && bytes[idx + 2] == b':' {
            locations.push(&blob[start..idx]);
            idx += 3;
            start = idx;
        } else {
            idx += 1;
        }
    }
    locations.push(&blob[start..]);

    locations
        .into_iter()
        .filter(|location| !location.is_empty())
        .map(|location| location.to_string())
        .collect()
}

pub fn merge_list_file(existing_text: &str, new_entries: &[String]) -> ListMerge {
    let existing: BTreeSet<String> = existing_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
        .collect();
    let mut merged = existing.clone();
    merged.extend(new_entries.iter().cloned());

    ListMerge {
        extracted: new_entries.len(),
        added: merged.len() - existing.len(),
        entries: merged.into_iter().collect(),
    }
}
