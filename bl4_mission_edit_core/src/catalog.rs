use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::blob::{compress_to_blob, decompress_blob, looks_like_blob};
use crate::missions::{LOCAL_SETS_KEY, MISSIONS_KEY};
use crate::yaml::{as_mapping, get_mapping, key, sorted_mapping, value_key_to_string};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MissionCatalog {
    sets: Mapping,
}

#[derive(Debug, Clone, Default)]
pub struct MissionSetSelection<'a> {
    entries: Vec<(&'a str, &'a Value)>,
}

impl<'a> MissionSetSelection<'a> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a Value)> + '_ {
        self.entries.iter().copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.entries.iter().map(|(name, _)| *name)
    }

    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.entries
            .iter()
            .find(|(entry_name, _)| *entry_name == name)
            .map(|(_, value)| *value)
    }
}

impl MissionCatalog {
    pub fn from_mapping(sets: Mapping) -> Self {
        Self { sets }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let root: Value = serde_yaml::from_str(text).context("failed to parse mission catalog")?;
        match root {
            Value::Null => Ok(Self::default()),
            other => match as_mapping(&other) {
                Some(map) => Ok(Self::from_mapping(map.clone())),
                None => bail!("mission catalog must be a mapping of mission set names"),
            },
        }
    }

    pub fn from_compressed_blob(blob: &str) -> Result<Self> {
        let yaml_bytes = decompress_blob(blob).context("failed to unpack mission catalog blob")?;
        let yaml_str =
            String::from_utf8(yaml_bytes).context("mission catalog blob is not valid UTF-8")?;
        Self::from_yaml_str(&yaml_str)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let catalog = if looks_like_blob(&content) {
            Self::from_compressed_blob(&content)
        } else {
            Self::from_yaml_str(&content)
        }
        .with_context(|| format!("failed to load mission catalog {}", path.display()))?;
        debug!(path = %path.display(), sets = catalog.len(), "loaded mission catalog");
        Ok(catalog)
    }

    // Mission sets from a save's `missions.local_sets`, with set names and the
    // missions inside each set sorted.
    pub fn extract_from_save(document: &Value) -> Self {
        let local_sets = as_mapping(document)
            .and_then(|root| get_mapping(root, MISSIONS_KEY))
            .and_then(|missions| get_mapping(missions, LOCAL_SETS_KEY));
        let Some(local_sets) = local_sets else {
            return Self::default();
        };

        let mut sets = sorted_mapping(local_sets, by_name);
        for (_, set_value) in sets.iter_mut() {
            let Value::Mapping(set_map) = set_value else {
                continue;
            };
            let sorted_missions =
                get_mapping(set_map, MISSIONS_KEY).map(|missions| sorted_mapping(missions, by_name));
            if let Some(sorted_missions) = sorted_missions {
                set_map.insert(key(MISSIONS_KEY), Value::Mapping(sorted_missions));
            }
        }

        Self { sets }
    }

    // Later sets replace earlier ones wholesale; keys end up in case-insensitive order.
    pub fn absorb(&mut self, other: MissionCatalog) -> usize {
        let mut added = 0;
        for (name, set) in other.sets {
            if self.sets.insert(name, set).is_none() {
                added += 1;
            }
        }
        self.sets = sorted_mapping(&self.sets, |k| {
            value_key_to_string(k).unwrap_or_default().to_lowercase()
        });
        added
    }

    pub fn select_by_prefix(&self, prefix: &str) -> MissionSetSelection<'_> {
        let entries = self
            .sets
            .iter()
            .filter_map(|(name, set)| name.as_str().map(|name| (name, set)))
            .filter(|(name, _)| name.starts_with(prefix))
            .collect();
        MissionSetSelection { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.sets.get(&key(name))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().filter_map(Value::as_str)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        serde_yaml::to_string(&self.sets).context("failed to serialize mission catalog")
    }

    pub fn to_compressed_blob(&self) -> Result<String> {
        compress_to_blob(self.to_yaml_string()?.as_bytes())
    }
}

fn by_name(name: &Value) -> String {
    value_key_to_string(name).unwrap_or_default()
}
