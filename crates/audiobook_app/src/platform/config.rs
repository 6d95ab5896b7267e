//! Application configuration read from an optional RON file.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use audiobook_core::{MatchPattern, PatternError, RequestFilter, ResourceType};
use audiobook_engine::{AutomatorSettings, FetchSettings, ObserverSettings, DEFAULT_ORIGIN};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "./audiobook.ron";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid URL pattern: {0}")]
    Pattern(#[from] PatternError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where downloaded tracks are written.
    pub output_dir: PathBuf,
    /// JSON document holding captured URLs and book metadata.
    pub state_path: PathBuf,
    pub log_file: Option<PathBuf>,
    pub relay_timeout_ms: u64,
    pub ping_timeout_ms: u64,
    pub injection_settle_ms: u64,
    pub play_settle_ms: u64,
    pub chapter_settle_ms: u64,
    pub release_grace_ms: u64,
    pub origin: String,
    pub request_pattern: String,
    pub media_marker: String,
    /// Empty disables the page restriction.
    pub page_pattern: String,
    pub reader_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./downloads"),
            state_path: PathBuf::from("./.audiobook_state.json"),
            log_file: None,
            relay_timeout_ms: 5000,
            ping_timeout_ms: 1000,
            injection_settle_ms: 500,
            play_settle_ms: 1000,
            chapter_settle_ms: 500,
            release_grace_ms: 100,
            origin: DEFAULT_ORIGIN.to_string(),
            request_pattern: audiobook_core::MEDIA_REQUEST_PATTERN.to_string(),
            media_marker: audiobook_core::MEDIA_CLIP_MARKER.to_string(),
            page_pattern: audiobook_core::READER_PAGE_PATTERN.to_string(),
            reader_url: "https://libbyapp.com/shelf".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `path`, or the default location when `None`.
    ///
    /// A missing file at the default location yields defaults; an explicitly
    /// named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if !required && err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::parse(&text).map_err(|message| ConfigError::Parse { path, message })
    }

    fn parse(text: &str) -> Result<Self, String> {
        ron::from_str(text).map_err(|err| err.to_string())
    }

    pub fn observer_settings(&self) -> Result<ObserverSettings, ConfigError> {
        let pattern = MatchPattern::parse(&self.request_pattern)?;
        let page_pattern = match self.page_pattern.trim() {
            "" => None,
            pattern => Some(MatchPattern::parse(pattern)?),
        };
        Ok(ObserverSettings {
            relay_timeout: Duration::from_millis(self.relay_timeout_ms),
            ping_timeout: Duration::from_millis(self.ping_timeout_ms),
            injection_settle: Duration::from_millis(self.injection_settle_ms),
            filter: RequestFilter::new(pattern, ResourceType::Media, self.media_marker.as_str()),
            page_pattern,
        })
    }

    pub fn automator_settings(&self) -> AutomatorSettings {
        AutomatorSettings {
            play_settle: Duration::from_millis(self.play_settle_ms),
            chapter_settle: Duration::from_millis(self.chapter_settle_ms),
            release_grace: Duration::from_millis(self.release_grace_ms),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            origin: self.origin.clone(),
            ..FetchSettings::default()
        }
    }
}
