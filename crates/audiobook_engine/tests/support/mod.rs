#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use audiobook_engine::{
    FailureKind, FetchError, FetchMetadata, FetchOutput, Fetcher, FileSaver, PageControl,
    PageDom, PageError, ProgressSink, SaveTask, NEXT_CHAPTER_SELECTOR, PLAY_SELECTOR,
};
use bytes::Bytes;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Press {
    Play,
    Next,
}

/// A player page with a fixed number of chapters. The next-chapter button is
/// one live element whose label follows the current chapter.
pub struct PlayerState {
    has_play: bool,
    chapters: usize,
    chapter: Mutex<usize>,
    title: Mutex<Option<String>>,
    presses: Mutex<Vec<(Press, Instant)>>,
}

impl PlayerState {
    pub fn presses(&self) -> Vec<(Press, Instant)> {
        self.presses.lock().unwrap().clone()
    }

    pub fn count(&self, press: Press) -> usize {
        self.presses().iter().filter(|(p, _)| *p == press).count()
    }

    pub fn set_title(&self, title: &str) {
        *self.title.lock().unwrap() = Some(title.to_string());
    }

    fn record(&self, press: Press) {
        self.presses.lock().unwrap().push((press, Instant::now()));
    }

    fn next_label(&self) -> String {
        let chapter = *self.chapter.lock().unwrap();
        if chapter + 1 >= self.chapters {
            "Next Chapter (End Of Audiobook)".to_string()
        } else {
            "Next Chapter".to_string()
        }
    }
}

#[derive(Clone)]
pub struct FakePlayer {
    pub state: Arc<PlayerState>,
}

impl FakePlayer {
    pub fn new(chapters: usize) -> Self {
        Self::build(true, chapters, None)
    }

    pub fn without_play_button() -> Self {
        Self::build(false, 3, None)
    }

    pub fn titled(title: &str) -> Self {
        Self::build(true, 3, Some(title.to_string()))
    }

    fn build(has_play: bool, chapters: usize, title: Option<String>) -> Self {
        Self {
            state: Arc::new(PlayerState {
                has_play,
                chapters,
                chapter: Mutex::new(0),
                title: Mutex::new(title),
                presses: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn dom(&self) -> Arc<dyn PageDom> {
        Arc::new(self.clone())
    }
}

struct FakeButton {
    press: Press,
    state: Arc<PlayerState>,
}

#[async_trait]
impl PageControl for FakeButton {
    async fn activate(&self) -> Result<(), PageError> {
        self.state.record(self.press);
        if self.press == Press::Next {
            *self.state.chapter.lock().unwrap() += 1;
        }
        Ok(())
    }

    async fn label(&self) -> Option<String> {
        match self.press {
            Press::Play => Some("Play".to_string()),
            Press::Next => Some(self.state.next_label()),
        }
    }
}

#[async_trait]
impl PageDom for FakePlayer {
    async fn find(&self, selector: &str) -> Option<Box<dyn PageControl>> {
        let press = if selector == PLAY_SELECTOR && self.state.has_play {
            Press::Play
        } else if selector == NEXT_CHAPTER_SELECTOR
            && *self.state.chapter.lock().unwrap() < self.state.chapters
        {
            Press::Next
        } else {
            return None;
        };
        Some(Box::new(FakeButton {
            press,
            state: Arc::clone(&self.state),
        }))
    }

    async fn title(&self) -> Option<String> {
        self.state.title.lock().unwrap().clone()
    }
}

/// Serves canned bodies; unknown URLs answer 404.
#[derive(Default)]
pub struct CannedFetcher {
    bodies: HashMap<String, Vec<u8>>,
    delay: Option<Duration>,
    requested: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies.insert(url.to_string(), body.to_vec());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch(&self, url: &str, _sink: &dyn ProgressSink) -> Result<FetchOutput, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let Some(body) = self.bodies.get(url) else {
            return Err(FetchError {
                kind: FailureKind::HttpStatus(404),
                message: "404 Not Found".to_string(),
            });
        };
        Ok(FetchOutput {
            bytes: body.clone(),
            metadata: FetchMetadata {
                original_url: url.to_string(),
                final_url: url.to_string(),
                content_type: Some("audio/mpeg".to_string()),
                byte_len: body.len() as u64,
            },
        })
    }
}

/// Keeps saved files in memory, in save order.
#[derive(Clone, Default)]
pub struct RecordingSaver {
    saved: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingSaver {
    pub fn saved(&self) -> Vec<(String, Vec<u8>)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.saved().into_iter().map(|(name, _)| name).collect()
    }
}

impl FileSaver for RecordingSaver {
    fn begin_save(&self, filename: &str, payload: Bytes) -> SaveTask {
        let saved = Arc::clone(&self.saved);
        let filename = filename.to_string();
        tokio::spawn(async move {
            saved
                .lock()
                .unwrap()
                .push((filename.clone(), payload.to_vec()));
            Ok(PathBuf::from(filename))
        })
    }
}
