use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::Chip;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PasteScan {
    /// Pasted text with every match URL replaced by a placeholder token.
    pub text: String,
    /// Ids parsed from the URLs, in order of first appearance.
    pub match_ids: Vec<String>,
}

impl PasteScan {
    pub fn has_matches(&self) -> bool {
        !self.match_ids.is_empty()
    }
}

/// Replace each match URL in `text` with a placeholder match link whose
/// display is `placeholder`. Text without URLs comes back unchanged.
pub fn scan_match_urls(text: &str, pattern: &Regex, placeholder: &str) -> PasteScan {
    let mut out = String::with_capacity(text.len());
    let mut match_ids: Vec<String> = Vec::new();
    let mut last = 0usize;

    for caps in pattern.captures_iter(text) {
        let (Some(whole), Some(id)) = (caps.get(0), caps.name("id")) else {
            continue;
        };
        out.push_str(&text[last..whole.start()]);
        Chip::match_link(id.as_str(), placeholder).write_token(&mut out);
        if !match_ids.iter().any(|known| known == id.as_str()) {
            match_ids.push(id.as_str().to_string());
        }
        last = whole.end();
    }
    out.push_str(&text[last..]);

    PasteScan {
        text: out,
        match_ids,
    }
}

/// Binary clipboard content handed to the host for upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PastedImage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub mime_type: String,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl PastedImage {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
