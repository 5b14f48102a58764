use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PLACEHOLDER_LABEL: &str = "Lade...";
pub const DEFAULT_MATCH_URL_PATTERN: &str =
    r"(?:https?://[^\s/?#]+)?/matches/(?P<id>[0-9]+)(?:\?[^\s#]*)?(?:#\S*)?";

/// Per-instance composer settings. Every field is optional in serialized
/// form; zero limits fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Display label of a match link whose reference is still resolving.
    pub placeholder_label: String,
    /// Pasted text matching this pattern becomes a placeholder match link.
    /// Must capture the match id in a group named `id`.
    pub match_url_pattern: String,
    pub max_undo: usize,
    pub max_normalize_iterations: usize,
    pub mention_result_limit: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            placeholder_label: DEFAULT_PLACEHOLDER_LABEL.to_string(),
            match_url_pattern: DEFAULT_MATCH_URL_PATTERN.to_string(),
            max_undo: 200,
            max_normalize_iterations: 100,
            mention_result_limit: 8,
        }
    }
}

impl ComposerConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        let config = config.with_defaults();
        config.match_url_regex()?;
        Ok(config)
    }

    pub(crate) fn with_defaults(mut self) -> Self {
        let defaults = Self::default();
        if self.placeholder_label.is_empty() {
            self.placeholder_label = defaults.placeholder_label;
        }
        if self.match_url_pattern.is_empty() {
            self.match_url_pattern = defaults.match_url_pattern;
        }
        if self.max_undo == 0 {
            self.max_undo = defaults.max_undo;
        }
        if self.max_normalize_iterations == 0 {
            self.max_normalize_iterations = defaults.max_normalize_iterations;
        }
        if self.mention_result_limit == 0 {
            self.mention_result_limit = defaults.mention_result_limit;
        }
        self
    }

    pub fn match_url_regex(&self) -> Result<Regex, ConfigError> {
        let regex = Regex::new(&self.match_url_pattern)?;
        if !regex.capture_names().any(|name| name == Some("id")) {
            return Err(ConfigError::MissingIdGroup);
        }
        Ok(regex)
    }
}
