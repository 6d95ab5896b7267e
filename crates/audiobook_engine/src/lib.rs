//! Audiobook engine: observer and automator contexts, messaging, storage and
//! the fetch-tag-save pipeline.
mod automator;
mod channel;
mod fetch;
mod filename;
mod har;
mod host;
mod observer;
mod page;
mod persist;
mod save;
mod storage;
mod tagging;
mod types;

pub use automator::{
    Automator, AutomatorEndpoint, AutomatorMailbox, AutomatorSettings, WalkEnd, WalkSummary,
};
pub use channel::{
    channel, reply_pair, ChannelError, Disposition, Endpoint, Envelope, Mailbox, Responder,
};
pub use fetch::{
    ChannelProgressSink, FetchSettings, Fetcher, NullProgressSink, ProgressSink, ReqwestFetcher,
    DEFAULT_ORIGIN,
};
pub use filename::safe_filename;
pub use har::{load_har, parse_har, HarError};
pub use host::{AutomatorFactory, BrowserHost, HostEvent, LocalHost, NetworkEvent};
pub use observer::{Observer, ObserverEndpoint, ObserverMailbox, ObserverSettings};
pub use page::{
    ChapterControls, DetachedDom, LibbyControls, PageControl, PageDom, PageError,
    END_OF_BOOK_LABEL, NEXT_CHAPTER_SELECTOR, PLAY_SELECTOR,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use save::{finish_save, DirectorySaver, FileSaver, SaveTask};
pub use storage::{
    JsonFileStore, KeyValueStore, MemoryStore, SharedState, StorageError, KEY_AUTHOR_NAME,
    KEY_BOOK_TITLE, KEY_CAPTURED_URLS,
};
pub use tagging::{Id3TagWriter, TagError, TagWriter};
pub use types::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, RelayError, Stage, TabId, TrackProgress,
};
