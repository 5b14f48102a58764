use serde::{Deserialize, Serialize};

use crate::codec::{decode, encode};
use crate::composer::Composer;
use crate::core::Document;

const SNAPSHOT_SCHEMA: &str = "kicker-compose";
const SNAPSHOT_VERSION: u32 = 1;

fn snapshot_schema() -> String {
    SNAPSHOT_SCHEMA.to_string()
}

fn snapshot_version() -> u32 {
    SNAPSHOT_VERSION
}

/// Message content as handed to a separate renderer: the fragment tree plus
/// the canonical string it stands for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComposeValue {
    #[serde(default = "snapshot_schema")]
    pub schema: String,
    #[serde(default = "snapshot_version")]
    pub version: u32,
    #[serde(default)]
    canonical: String,
    #[serde(default)]
    document: Document,
}

impl ComposeValue {
    pub fn from_document(document: Document) -> Self {
        Self {
            schema: snapshot_schema(),
            version: snapshot_version(),
            canonical: decode(&document),
            document,
        }
    }

    pub fn from_canonical(canonical: &str) -> Self {
        Self::from_document(encode(canonical))
    }

    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn into_document(self) -> Document {
        self.document
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Parse a snapshot. A snapshot carrying only the canonical string gets
    /// its tree rebuilt; otherwise the tree is authoritative and the
    /// canonical string is re-derived from it.
    pub fn from_json_str(s: &str) -> Result<Self, serde_json::Error> {
        let mut value: Self = serde_json::from_str(s)?;
        if value.document.children.is_empty() && !value.canonical.is_empty() {
            value.document = encode(&value.canonical);
        } else {
            value.canonical = decode(&value.document);
        }
        Ok(value)
    }
}

impl Composer {
    pub fn snapshot(&self) -> ComposeValue {
        ComposeValue::from_document(self.doc().clone())
    }
}
