//! The automator runs against one page: it walks the chapters through the
//! player controls and performs the fetch-tag-save pipeline on request.
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use audiobook_core::{
    AutomatorReply, AutomatorRequest, CaptureReply, FetchReply, ObserverRequest, PingReply,
    TrackRequest,
};
use bytes::Bytes;
use relay_logging::{relay_error, relay_info, relay_warn};

use crate::channel::{self, Disposition, Endpoint, Envelope, Mailbox, Responder};
use crate::fetch::{Fetcher, NullProgressSink, ProgressSink};
use crate::observer::ObserverEndpoint;
use crate::page::{ChapterControls, LibbyControls, PageDom};
use crate::save::{finish_save, FileSaver};
use crate::tagging::TagWriter;
use crate::{RelayError, Stage, TrackProgress};

pub type AutomatorEndpoint = Endpoint<AutomatorRequest, AutomatorReply>;
pub type AutomatorMailbox = Mailbox<AutomatorRequest, AutomatorReply>;

#[derive(Debug, Clone)]
pub struct AutomatorSettings {
    /// Wait after pressing play.
    pub play_settle: Duration,
    /// Wait after each next-chapter press.
    pub chapter_settle: Duration,
    /// How long the saved payload stays referenced after the save starts.
    pub release_grace: Duration,
}

impl Default for AutomatorSettings {
    fn default() -> Self {
        Self {
            play_settle: Duration::from_millis(1000),
            chapter_settle: Duration::from_millis(500),
            release_grace: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    /// No next-chapter control was found.
    NoNextControl,
    /// The next-chapter control announced the end of the book.
    EndOfAudiobook,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    /// Next-chapter activations, including the final flush press.
    pub next_clicks: u32,
    pub end: WalkEnd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    Start,
    Advancing { clicks: u32 },
    End(WalkSummary),
}

pub struct Automator {
    dom: Arc<dyn PageDom>,
    controls: Arc<dyn ChapterControls>,
    fetcher: Arc<dyn Fetcher>,
    tagger: Option<Arc<dyn TagWriter>>,
    saver: Arc<dyn FileSaver>,
    progress: Arc<dyn ProgressSink>,
    settings: AutomatorSettings,
}

impl Automator {
    pub fn new(dom: Arc<dyn PageDom>, fetcher: Arc<dyn Fetcher>, saver: Arc<dyn FileSaver>) -> Self {
        Self {
            dom,
            controls: Arc::new(LibbyControls),
            fetcher,
            tagger: None,
            saver,
            progress: Arc::new(NullProgressSink),
            settings: AutomatorSettings::default(),
        }
    }

    pub fn with_tagger(mut self, tagger: Arc<dyn TagWriter>) -> Self {
        self.tagger = Some(tagger);
        self
    }

    pub fn with_controls(mut self, controls: Arc<dyn ChapterControls>) -> Self {
        self.controls = controls;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_settings(mut self, settings: AutomatorSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Starts serving requests and announces readiness to `observer`.
    ///
    /// The automator stops once every endpoint clone is dropped.
    pub fn spawn(self, observer: Option<&ObserverEndpoint>) -> AutomatorEndpoint {
        let (endpoint, mailbox) = channel::channel();
        let automator = Arc::new(self);
        tokio::spawn(automator.run(mailbox));

        if let Some(observer) = observer {
            if observer.post(ObserverRequest::ContentScriptReady).is_err() {
                relay_warn!("Observer is gone; readiness not announced");
            }
        }
        relay_info!("Download helper automator initialized");
        endpoint
    }

    async fn run(self: Arc<Self>, mut mailbox: AutomatorMailbox) {
        while let Some(Envelope { request, responder }) = mailbox.recv().await {
            self.handle(request, responder);
        }
    }

    pub fn handle(
        self: &Arc<Self>,
        request: AutomatorRequest,
        responder: Responder<AutomatorReply>,
    ) -> Disposition {
        match request {
            AutomatorRequest::Ping => {
                responder.respond(AutomatorReply::Ready(PingReply::ready()));
                Disposition::Replied
            }
            AutomatorRequest::StartAudioCapture => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let status = match this.walk_chapters().await {
                        Ok(summary) => {
                            relay_info!(
                                "Capture process completed after {} next-chapter presses ({:?})",
                                summary.next_clicks,
                                summary.end
                            );
                            "Capture process completed".to_string()
                        }
                        Err(err) => {
                            relay_error!("Error during capture process: {}", err);
                            format!("Error: {err}")
                        }
                    };
                    responder.respond(AutomatorReply::Capture(CaptureReply { status }));
                });
                Disposition::Pending
            }
            AutomatorRequest::DownloadWithFetch(track) => {
                relay_info!("Automator received download request for {}", track.url);
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let reply = match this.fetch_and_save(&track).await {
                        Ok(path) => {
                            relay_info!("Download completed: {:?}", path);
                            FetchReply::ok("Download completed via content script")
                        }
                        Err(err) => {
                            relay_error!("Automator download error: {}", err);
                            FetchReply::failed(err.to_string())
                        }
                    };
                    responder.respond(AutomatorReply::Fetch(reply));
                });
                Disposition::Pending
            }
        }
    }

    /// Presses play, then next-chapter until the control disappears or
    /// announces the end of the book. There is no iteration cap.
    pub async fn walk_chapters(&self) -> Result<WalkSummary, RelayError> {
        relay_info!("Starting chapter walk");
        let mut state = WalkState::Start;
        loop {
            state = match state {
                WalkState::Start => {
                    let Some(play) = self.dom.find(self.controls.play_selector()).await else {
                        relay_error!("Play button not found.");
                        return Err(RelayError::NotFound {
                            control: "Play button".to_string(),
                        });
                    };
                    play.activate().await?;
                    tokio::time::sleep(self.settings.play_settle).await;
                    WalkState::Advancing { clicks: 0 }
                }
                WalkState::Advancing { clicks } => {
                    let selector = self.controls.next_chapter_selector();
                    match self.dom.find(selector).await {
                        None => {
                            relay_warn!("Next chapter button not found or end of book reached.");
                            WalkState::End(WalkSummary {
                                next_clicks: clicks,
                                end: WalkEnd::NoNextControl,
                            })
                        }
                        Some(next) => {
                            next.activate().await?;
                            tokio::time::sleep(self.settings.chapter_settle).await;
                            let clicks = clicks + 1;
                            let at_end = next
                                .label()
                                .await
                                .is_some_and(|label| self.controls.is_end_of_book(&label));
                            if at_end {
                                // One more press triggers the last chapter's media.
                                next.activate().await?;
                                tokio::time::sleep(self.settings.chapter_settle).await;
                                WalkState::End(WalkSummary {
                                    next_clicks: clicks + 1,
                                    end: WalkEnd::EndOfAudiobook,
                                })
                            } else {
                                WalkState::Advancing { clicks }
                            }
                        }
                    }
                }
                WalkState::End(summary) => return Ok(summary),
            };
        }
    }

    /// Fetches `track.url` with the origin override, tags it when possible
    /// and saves it under `track.filename`.
    pub async fn fetch_and_save(&self, track: &TrackRequest) -> Result<PathBuf, RelayError> {
        relay_info!("Automator fetching: {}", track.url);
        let output = self.fetcher.fetch(&track.url, self.progress.as_ref()).await?;
        let mut payload = output.bytes;

        match (&self.tagger, &track.metadata) {
            (Some(tagger), Some(metadata)) => {
                self.report(&track.url, Stage::Tagging, payload.len());
                match tagger.write_tags(&payload, metadata) {
                    Ok(tagged) => {
                        payload = tagged;
                        relay_info!("ID3 tags added to {}", track.filename);
                    }
                    Err(err) => {
                        let err = RelayError::TagWrite(err.to_string());
                        relay_error!("{}; saving untagged audio", err);
                    }
                }
            }
            _ => relay_warn!("Tag writer not available or no metadata provided"),
        }

        self.report(&track.url, Stage::Saving, payload.len());
        let handle = Bytes::from(payload);
        let task = self.saver.begin_save(&track.filename, handle.clone());
        tokio::time::sleep(self.settings.release_grace).await;
        drop(handle);

        let path = finish_save(task).await?;
        self.report(&track.url, Stage::Done, 0);
        Ok(path)
    }

    fn report(&self, url: &str, stage: Stage, bytes: usize) {
        self.progress.emit(TrackProgress {
            url: url.to_string(),
            stage,
            bytes: Some(bytes as u64),
        });
    }
}
