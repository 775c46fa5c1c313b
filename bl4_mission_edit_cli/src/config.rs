use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bl4_mission_edit_core::MissionNamespaces;
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MissionEditConfig {
    pub catalog: CatalogConfig,
    pub save: SaveConfig,
    pub namespaces: MissionNamespaces,
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SaveConfig {
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HooksConfig {
    pub sdu_points: bool,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self { sdu_points: true }
    }
}

impl MissionEditConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    // Command-line values win over the file.
    pub fn with_overrides(mut self, catalog: Option<PathBuf>, user_id: Option<String>) -> Self {
        if catalog.is_some() {
            self.catalog.path = catalog;
        }
        if user_id.is_some() {
            self.save.user_id = user_id;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::MissionEditConfig;

    #[test]
    fn missing_sections_use_defaults() {
        let config: MissionEditConfig = toml::from_str("").expect("empty config");
        assert_eq!(config, MissionEditConfig::default());
        assert!(config.hooks.sdu_points);
        assert_eq!(config.namespaces.story, "missionset_main");
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn parses_every_section() {
        let config: MissionEditConfig = toml::from_str(
            r#"
[catalog]
path = "data/missionsets.txt"

[save]
user_id = "76561199131094380"

[namespaces]
silo = "missionset_zoneactivity_silo_dlc"

[hooks]
sdu_points = false
"#,
        )
        .expect("parse config");

        assert_eq!(
            config.catalog.path,
            Some(PathBuf::from("data/missionsets.txt"))
        );
        assert_eq!(config.save.user_id.as_deref(), Some("76561199131094380"));
        assert_eq!(config.namespaces.silo, "missionset_zoneactivity_silo_dlc");
        assert_eq!(config.namespaces.all, "missionset_");
        assert!(!config.hooks.sdu_points);
    }

    #[test]
    fn flags_override_file_values() {
        let mut config = MissionEditConfig::default();
        config.catalog.path = Some(PathBuf::from("from_file.yaml"));
        config.save.user_id = Some("111".into());

        let config = config.with_overrides(Some(PathBuf::from("from_flag.yaml")), None);
        assert_eq!(config.catalog.path, Some(PathBuf::from("from_flag.yaml")));
        assert_eq!(config.save.user_id.as_deref(), Some("111"));
    }

    #[test]
    fn from_file_reads_and_reports_errors() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bl4.toml");
        std::fs::write(&path, "[save]\nuser_id = \"42\"\n").expect("write config");
        let config = MissionEditConfig::from_file(&path).expect("load config");
        assert_eq!(config.save.user_id.as_deref(), Some("42"));

        std::fs::write(&path, "this is not valid toml {{{").expect("write config");
        assert!(MissionEditConfig::from_file(&path).is_err());
        assert!(MissionEditConfig::from_file(&dir.path().join("missing.toml")).is_err());
        assert_eq!(
            MissionEditConfig::load(None).expect("default config"),
            MissionEditConfig::default()
        );
    }
}
