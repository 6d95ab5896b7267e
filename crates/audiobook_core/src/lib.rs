//! Audiobook core: shared data model, message vocabulary and the panel state machine.
mod captured;
mod effect;
mod filter;
mod metadata;
mod msg;
pub mod protocol;
mod state;
mod update;
mod view_model;

pub use captured::CapturedUrls;
pub use effect::Effect;
pub use filter::{
    reader_page_pattern, MatchPattern, PatternError, RequestFilter, ResourceType,
    MEDIA_CLIP_MARKER, MEDIA_REQUEST_PATTERN, READER_PAGE_PATTERN,
};
pub use metadata::{
    plan_tracks, track_filename, BookMetadata, DownloadMetadata, TitleUpdate, TrackJob,
};
pub use msg::Msg;
pub use protocol::{
    AuthorReply, AutomatorReply, AutomatorRequest, CaptureReply, DownloadReply, FetchReply,
    Notification, ObserverReply, ObserverRequest, PingReply, StatusReply, TrackRequest,
};
pub use state::PanelState;
pub use update::update;
pub use view_model::{BatchProgress, PanelViewModel};
