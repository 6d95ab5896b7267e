use crate::{BookMetadata, CaptureReply, StatusReply};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Panel opened with the persisted metadata and current capture count.
    Opened {
        book: BookMetadata,
        captured_count: usize,
    },
    /// User edited the book title field.
    TitleEdited(String),
    /// User edited the author field.
    AuthorEdited(String),
    /// Fresh captured-URL count read from storage.
    CountRefreshed(usize),
    /// User clicked Clear URLs.
    ClearClicked,
    /// Observer answered the clear request (`Err` carries the channel failure).
    ClearReplied(Result<StatusReply, String>),
    /// User clicked Capture Audio.
    CaptureClicked,
    /// Observer answered the capture request.
    CaptureReplied(Result<CaptureReply, String>),
    /// User clicked Download.
    DownloadClicked,
    /// Captured URLs loaded for a batch.
    UrlsLoaded(Vec<String>),
    /// The relay for one track finished.
    TrackFinished {
        track_number: u32,
        result: Result<(), String>,
    },
    /// Observer reported that the stored author was cleared.
    AuthorInvalidated,
    /// UI/render tick.
    Tick,
    /// Fallback for placeholder wiring.
    NoOp,
}
