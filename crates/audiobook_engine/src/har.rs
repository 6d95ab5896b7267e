//! Replays a HAR 1.2 capture (browser dev tools export) as network events.
use std::path::Path;

use audiobook_core::ResourceType;
use serde::Deserialize;

use crate::host::NetworkEvent;

#[derive(Debug, thiserror::Error)]
pub enum HarError {
    #[error("failed to read HAR file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid HAR document: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct HarDocument {
    log: HarLog,
}

#[derive(Debug, Deserialize)]
struct HarLog {
    #[serde(default)]
    entries: Vec<HarEntry>,
}

#[derive(Debug, Deserialize)]
struct HarEntry {
    request: HarRequest,
    #[serde(default)]
    response: Option<HarResponse>,
    /// Chromium extension field.
    #[serde(default, rename = "_resourceType")]
    resource_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HarRequest {
    url: String,
}

#[derive(Debug, Deserialize)]
struct HarResponse {
    #[serde(default)]
    content: Option<HarContent>,
}

#[derive(Debug, Deserialize)]
struct HarContent {
    #[serde(default, rename = "mimeType")]
    mime_type: Option<String>,
}

impl HarEntry {
    fn resource_type(&self) -> ResourceType {
        if let Some(name) = &self.resource_type {
            return ResourceType::from_name(name);
        }
        let mime = self
            .response
            .as_ref()
            .and_then(|response| response.content.as_ref())
            .and_then(|content| content.mime_type.as_deref())
            .unwrap_or_default();
        if mime.starts_with("audio/") || mime.starts_with("video/") {
            ResourceType::Media
        } else {
            ResourceType::Other
        }
    }
}

/// Parses HAR JSON into events in capture order. Events carry no tab.
pub fn parse_har(text: &str) -> Result<Vec<NetworkEvent>, HarError> {
    let document: HarDocument = serde_json::from_str(text)?;
    Ok(document
        .log
        .entries
        .into_iter()
        .map(|entry| {
            let resource_type = entry.resource_type();
            NetworkEvent::new(None, entry.request.url, resource_type)
        })
        .collect())
}

pub fn load_har(path: &Path) -> Result<Vec<NetworkEvent>, HarError> {
    let text = std::fs::read_to_string(path)?;
    parse_har(&text)
}
