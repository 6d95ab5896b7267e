use crate::{BookMetadata, TrackJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    SaveMetadata(BookMetadata),
    RefreshCount,
    ClearUrls,
    StartCapture,
    LoadUrls,
    /// Relay one track through the observer. Only one is outstanding at a time.
    DownloadTrack(TrackJob),
}
