#[derive(Debug, thiserror::Error)]
pub enum MissionEditError {
    #[error("failed to parse save document: {message}")]
    Parse { message: String },

    #[error("failed to serialize save document: {0}")]
    Serialize(#[from] serde_yaml::Error),

    #[error("{0:#}")]
    Editor(anyhow::Error),
}

impl MissionEditError {
    pub fn is_parse_failure(&self) -> bool {
        matches!(self, MissionEditError::Parse { .. })
    }
}
