use serde::{Deserialize, Serialize};

/// Book-level metadata shared between the observer (title) and the panel (author).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BookMetadata {
    pub title: String,
    pub author: String,
}

/// Outcome of feeding a freshly observed page title into [`BookMetadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleUpdate {
    /// The page reported no title; nothing changed.
    Ignored,
    /// No title was stored before; the author is kept.
    Seeded,
    /// Same title as before.
    Unchanged,
    /// A different book: the author was cleared.
    Changed { previous: String },
}

impl TitleUpdate {
    pub fn author_invalidated(&self) -> bool {
        matches!(self, TitleUpdate::Changed { .. })
    }
}

impl BookMetadata {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
        }
    }

    /// Records the document title of a newly loaded page.
    ///
    /// A title that differs from a previously stored one means another book,
    /// so the author no longer applies.
    pub fn observe_title(&mut self, page_title: &str) -> TitleUpdate {
        if page_title.is_empty() {
            return TitleUpdate::Ignored;
        }
        if self.title.is_empty() {
            self.title = page_title.to_string();
            return TitleUpdate::Seeded;
        }
        if self.title == page_title {
            return TitleUpdate::Unchanged;
        }
        let previous = std::mem::replace(&mut self.title, page_title.to_string());
        self.author.clear();
        TitleUpdate::Changed { previous }
    }

    /// Both fields are non-empty after trimming.
    pub fn is_complete(&self) -> bool {
        !self.title.trim().is_empty() && !self.author.trim().is_empty()
    }

    pub fn trimmed(&self) -> Self {
        Self::new(self.title.trim(), self.author.trim())
    }
}

/// Tag values for one downloaded part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadMetadata {
    pub title: String,
    pub artist: String,
    /// Written to the composer frame.
    pub author: String,
    pub track_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
}

/// One unit of a batch download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackJob {
    pub url: String,
    pub filename: String,
    pub metadata: DownloadMetadata,
}

pub fn track_filename(title: &str, track_number: u32) -> String {
    format!("{title} - Part {track_number}.mp3")
}

/// Builds the download jobs for `urls` in list order, numbering tracks from 1.
pub fn plan_tracks(urls: &[String], book: &BookMetadata) -> Vec<TrackJob> {
    let book = book.trimmed();
    urls.iter()
        .zip(1u32..)
        .map(|(url, track_number)| TrackJob {
            url: url.clone(),
            filename: track_filename(&book.title, track_number),
            metadata: DownloadMetadata {
                title: format!("{} - Part {}", book.title, track_number),
                artist: book.author.clone(),
                author: book.author.clone(),
                track_number,
                album: Some(book.title.clone()),
            },
        })
        .collect()
}
