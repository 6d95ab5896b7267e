use std::fmt;

use crate::channel::ChannelError;
use crate::page::PageError;
use crate::persist::PersistError;

pub type TabId = u32;

/// Progress of a single fetch-tag-save pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetching,
    Tagging,
    Saving,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackProgress {
    pub url: String,
    pub stage: Stage,
    pub bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub original_url: String,
    pub final_url: String,
    pub content_type: Option<String>,
    pub byte_len: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub(crate) fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FailureKind::HttpStatus(code) => write!(f, "HTTP error! status: {code}"),
            kind => write!(f, "{kind}: {}", self.message),
        }
    }
}

impl std::error::Error for FetchError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failures crossing context boundaries. `Display` is the text the panel shows.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("{control} not found.")]
    NotFound { control: String },
    #[error("Cannot inject script: {0}")]
    InjectionFailure(String),
    #[error("Message error: {0}")]
    Channel(#[from] ChannelError),
    #[error("HTTP error! status: {0}")]
    Http(u16),
    #[error("Failed to write tags: {0}")]
    TagWrite(String),
    #[error("Timeout: No response received")]
    Timeout,
    #[error("No active tab found")]
    NoActiveTab,
    /// Failure reported by the other side of a relay.
    #[error("{0}")]
    Remote(String),
    #[error("Page error: {0}")]
    Page(#[from] PageError),
    #[error("{0}")]
    Fetch(FetchError),
    #[error("Failed to save file: {0}")]
    Save(#[from] PersistError),
}

impl From<FetchError> for RelayError {
    fn from(err: FetchError) -> Self {
        match err.kind {
            FailureKind::HttpStatus(code) => RelayError::Http(code),
            _ => RelayError::Fetch(err),
        }
    }
}
