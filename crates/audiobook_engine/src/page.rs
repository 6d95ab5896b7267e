//! What the automator can see and do inside the host page.
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    #[error("page is no longer available")]
    Detached,
    #[error("{0}")]
    Script(String),
}

/// A located control (a button) in the page.
#[async_trait]
pub trait PageControl: Send + Sync {
    async fn activate(&self) -> Result<(), PageError>;
    /// Current accessible label; it may change after activation.
    async fn label(&self) -> Option<String>;
}

#[async_trait]
pub trait PageDom: Send + Sync {
    async fn find(&self, selector: &str) -> Option<Box<dyn PageControl>>;
    async fn title(&self) -> Option<String>;
}

/// A page without any reachable document, e.g. a host that only relays downloads.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedDom;

#[async_trait]
impl PageDom for DetachedDom {
    async fn find(&self, _selector: &str) -> Option<Box<dyn PageControl>> {
        None
    }

    async fn title(&self) -> Option<String> {
        None
    }
}

/// How the chapter walk recognises the player controls.
///
/// The rules match the host page's current markup and copy, so they are
/// kept out of the walk itself.
pub trait ChapterControls: Send + Sync {
    fn play_selector(&self) -> &str;
    fn next_chapter_selector(&self) -> &str;
    /// Whether a next-chapter label announces the end of the book.
    fn is_end_of_book(&self, label: &str) -> bool;
}

pub const PLAY_SELECTOR: &str = r#"button[aria-label="Play"].playback-toggle.halo"#;
pub const NEXT_CHAPTER_SELECTOR: &str =
    r#"button.chapter-bar-next-button.chapter-bar-jump-button.halo[aria-label*="Next Chapter"]"#;
// Literal label text; breaks if the player copy changes.
pub const END_OF_BOOK_LABEL: &str = "End Of Audiobook";

/// Selectors and labels of the Libby web player.
#[derive(Debug, Default, Clone, Copy)]
pub struct LibbyControls;

impl ChapterControls for LibbyControls {
    fn play_selector(&self) -> &str {
        PLAY_SELECTOR
    }

    fn next_chapter_selector(&self) -> &str {
        NEXT_CHAPTER_SELECTOR
    }

    fn is_end_of_book(&self, label: &str) -> bool {
        label.contains(END_OF_BOOK_LABEL)
    }
}
