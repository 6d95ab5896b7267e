use crate::view_model::{BatchProgress, PanelViewModel};
use crate::{BookMetadata, TrackJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Batch {
    jobs: Vec<TrackJob>,
    current: usize,
}

impl Batch {
    pub(crate) fn new(jobs: Vec<TrackJob>) -> Option<Self> {
        if jobs.is_empty() {
            None
        } else {
            Some(Self { jobs, current: 0 })
        }
    }

    pub(crate) fn current(&self) -> &TrackJob {
        &self.jobs[self.current]
    }

    pub(crate) fn total(&self) -> usize {
        self.jobs.len()
    }

    /// Moves to the next job, returning it, or `None` when the batch is done.
    pub(crate) fn advance(&mut self) -> Option<&TrackJob> {
        if self.current + 1 < self.jobs.len() {
            self.current += 1;
            Some(&self.jobs[self.current])
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelState {
    book: BookMetadata,
    captured_count: usize,
    status: String,
    batch: Option<Batch>,
    dirty: bool,
}

impl PanelState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&self) -> PanelViewModel {
        PanelViewModel {
            title: self.book.title.clone(),
            author: self.book.author.clone(),
            capture_status: format!(
                "Monitoring for media URLs ({} captured)",
                self.captured_count
            ),
            status: self.status.clone(),
            download_enabled: self.batch.is_none()
                && self.captured_count > 0
                && self.book.is_complete(),
            progress: self.batch.as_ref().map(|batch| BatchProgress {
                current: batch.current().metadata.track_number,
                total: batch.total(),
            }),
            dirty: self.dirty,
        }
    }

    pub fn book(&self) -> &BookMetadata {
        &self.book
    }

    pub fn is_downloading(&self) -> bool {
        self.batch.is_some()
    }

    /// Returns whether anything changed since the last call and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn set_book(&mut self, book: BookMetadata) {
        self.book = book;
        self.dirty = true;
    }

    pub(crate) fn set_title(&mut self, title: String) {
        self.book.title = title;
        self.dirty = true;
    }

    pub(crate) fn set_author(&mut self, author: String) {
        self.book.author = author;
        self.dirty = true;
    }

    pub(crate) fn set_captured_count(&mut self, count: usize) {
        self.captured_count = count;
        self.dirty = true;
    }

    pub(crate) fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
        self.dirty = true;
    }

    pub(crate) fn batch_mut(&mut self) -> Option<&mut Batch> {
        self.batch.as_mut()
    }

    pub(crate) fn begin_batch(&mut self, batch: Batch) {
        self.batch = Some(batch);
        self.dirty = true;
    }

    pub(crate) fn end_batch(&mut self) {
        self.batch = None;
        self.dirty = true;
    }

    /// Recomputes the idle status line from the count and metadata.
    pub(crate) fn refresh_summary(&mut self) {
        if self.batch.is_some() {
            return;
        }
        let summary = if self.captured_count == 0 {
            "Capture some media URLs first"
        } else if !self.book.is_complete() {
            "Please fill in the book title and author"
        } else {
            "Ready to download"
        };
        self.set_status(summary);
    }
}
