use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("node index out of bounds: {index} (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },
    #[error("expected a text node at {0}")]
    NotText(usize),
    #[error("expected a chip at {0}")]
    NotChip(usize),
    #[error("normalization did not converge")]
    NormalizeDidNotConverge,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid match url pattern: {0}")]
    MatchUrlPattern(#[from] regex::Error),
    #[error("match url pattern has no `id` capture group")]
    MissingIdGroup,
    #[error("failed to parse composer config: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct CommandError {
    message: String,
}

impl CommandError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
