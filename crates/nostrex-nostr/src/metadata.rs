//! Profile snapshots built from kind:0 metadata events

use serde::{Deserialize, Serialize};

use crate::error::NetworkError;

/// A user's self-published metadata at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub about: Option<String>,
    pub picture: Option<String>,
    pub banner: Option<String>,
    pub website: Option<String>,
    pub nip05: Option<String>,
    pub lud16: Option<String>,
    /// `created_at` of the metadata event, seconds since epoch
    pub created_at: u64,
}

/// Metadata content as clients publish it; field spelling varies in the wild
#[derive(Debug, Default, Deserialize)]
struct MetadataContent {
    name: Option<String>,
    #[serde(alias = "displayName")]
    display_name: Option<String>,
    about: Option<String>,
    #[serde(alias = "image")]
    picture: Option<String>,
    banner: Option<String>,
    website: Option<String>,
    nip05: Option<String>,
    lud16: Option<String>,
}

/// Just the event fields a profile needs
#[derive(Debug, Deserialize)]
struct RawEvent {
    created_at: u64,
    content: String,
}

impl ProfileSnapshot {
    /// Parse the JSON `content` of a metadata event
    pub fn from_metadata_json(content: &str, created_at: u64) -> Result<Self, NetworkError> {
        let parsed: MetadataContent = serde_json::from_str(content)?;
        Ok(Self {
            name: non_empty(parsed.name),
            display_name: non_empty(parsed.display_name),
            about: non_empty(parsed.about),
            picture: non_empty(parsed.picture),
            banner: non_empty(parsed.banner),
            website: non_empty(parsed.website),
            nip05: non_empty(parsed.nip05),
            lud16: non_empty(parsed.lud16),
            created_at,
        })
    }

    /// Parse a full serialized event
    pub fn from_event_json(event_json: &str) -> Result<Self, NetworkError> {
        let event: RawEvent = serde_json::from_str(event_json)?;
        Self::from_metadata_json(&event.content, event.created_at)
    }

    /// Display name, falling back to name
    pub fn best_name(&self) -> Option<&str> {
        self.display_name.as_deref().or(self.name.as_deref())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
