//! Message vocabulary exchanged between the panel, the observer and the
//! page automator. The JSON form uses the `action` field as discriminator.
use serde::{Deserialize, Serialize};

use crate::{DownloadMetadata, TrackJob};

/// Payload shared by the panel relay and the automator download request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRequest {
    pub url: String,
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DownloadMetadata>,
}

impl From<TrackJob> for TrackRequest {
    fn from(job: TrackJob) -> Self {
        Self {
            url: job.url,
            filename: job.filename,
            metadata: Some(job.metadata),
        }
    }
}

/// Requests handled by the observer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ObserverRequest {
    #[serde(rename = "getURLs")]
    GetUrls,
    #[serde(rename = "clearURLs")]
    ClearUrls,
    #[serde(rename = "downloadURL")]
    DownloadUrl(TrackRequest),
    UpdateAuthorField,
    CaptureAudio,
    ContentScriptReady,
}

/// Requests handled by the automator inside the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AutomatorRequest {
    Ping,
    #[serde(alias = "startCapture")]
    StartAudioCapture,
    DownloadWithFetch(TrackRequest),
}

/// Unsolicited observer → panel messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Notification {
    /// The stored author was cleared because the book changed.
    UpdateAuthorField,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReply {
    pub status: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DownloadReply {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorReply {
    #[serde(rename = "authorName")]
    pub author_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReply {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error.into()),
        }
    }
}

pub const READY: &str = "ready";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReply {
    pub status: String,
}

impl PingReply {
    pub fn ready() -> Self {
        Self {
            status: READY.to_string(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == READY
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ObserverReply {
    Status(StatusReply),
    Download(DownloadReply),
    Author(AuthorReply),
    Capture(CaptureReply),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum AutomatorReply {
    Ready(PingReply),
    Capture(CaptureReply),
    Fetch(FetchReply),
}
