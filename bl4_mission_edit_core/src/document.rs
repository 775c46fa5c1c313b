use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};
use tracing::{debug, error};

use crate::error::MissionEditError;
use crate::sav::{decrypt_sav_to_yaml, encrypt_yaml_to_sav};
use crate::yaml::as_mapping;

// Whatever currently holds the save text: an editor widget, a file on disk, a buffer.
pub trait DocumentEditor {
    fn text(&self) -> Result<String>;
    fn set_text(&mut self, text: String) -> Result<()>;
}

pub fn load_document(editor: &dyn DocumentEditor) -> Result<Value, MissionEditError> {
    let text = editor.text().map_err(MissionEditError::Editor)?;
    parse_document(&text).map_err(|err| {
        error!("{}", err);
        err
    })
}

pub fn store_document(
    editor: &mut dyn DocumentEditor,
    document: &Value,
) -> Result<(), MissionEditError> {
    let text = serde_yaml::to_string(document)?;
    debug!(bytes = text.len(), "writing save document");
    editor.set_text(text).map_err(MissionEditError::Editor)
}

pub fn parse_document(text: &str) -> Result<Value, MissionEditError> {
    if text.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    let document: Value = serde_yaml::from_str(text).map_err(|err| MissionEditError::Parse {
        message: err.to_string(),
    })?;
    match document {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        document if as_mapping(&document).is_some() => Ok(document),
        _ => Err(MissionEditError::Parse {
            message: "save document root is not a mapping".into(),
        }),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryEditor {
    text: String,
}

impl MemoryEditor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl DocumentEditor for MemoryEditor {
    fn text(&self) -> Result<String> {
        Ok(self.text.clone())
    }

    fn set_text(&mut self, text: String) -> Result<()> {
        self.text = text;
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct YamlFileEditor {
    path: PathBuf,
}

impl YamlFileEditor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DocumentEditor for YamlFileEditor {
    fn text(&self) -> Result<String> {
        fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))
    }

    fn set_text(&mut self, text: String) -> Result<()> {
        fs::write(&self.path, text.as_bytes())
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}

// Encrypted `.sav` file, keyed by the owning platform user id.
#[derive(Debug, Clone)]
pub struct SavFileEditor {
    path: PathBuf,
    user_id: String,
}

impl SavFileEditor {
    pub fn new(path: impl Into<PathBuf>, user_id: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            user_id: user_id.into(),
        }
    }
}

impl DocumentEditor for SavFileEditor {
    fn text(&self) -> Result<String> {
        let encrypted = fs::read(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let yaml_bytes = decrypt_sav_to_yaml(&encrypted, &self.user_id)
            .with_context(|| format!("failed to decrypt {}", self.path.display()))?;
        String::from_utf8(yaml_bytes).context("decrypted YAML is not valid UTF-8 text")
    }

    fn set_text(&mut self, text: String) -> Result<()> {
        let encrypted = encrypt_yaml_to_sav(text.as_bytes(), &self.user_id)?;
        fs::write(&self.path, &encrypted)
            .with_context(|| format!("failed to write {}", self.path.display()))
    }
}
