//! The panel context: drives the core state machine and turns its effects
//! into observer requests.
use audiobook_core::{
    update, BookMetadata, Effect, Msg, Notification, ObserverReply, ObserverRequest, PanelState,
    PanelViewModel,
};
use audiobook_engine::{ObserverEndpoint, SharedState};
use relay_logging::{relay_debug, relay_info, relay_warn};
use tokio::sync::{broadcast, mpsc};

/// Executes effects. Every effect except `SaveMetadata` answers with exactly
/// one message on the panel inbox.
pub struct EffectRunner {
    observer: ObserverEndpoint,
    store: SharedState,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl EffectRunner {
    pub fn new(
        observer: ObserverEndpoint,
        store: SharedState,
        msg_tx: mpsc::UnboundedSender<Msg>,
    ) -> Self {
        Self {
            observer,
            store,
            msg_tx,
        }
    }

    /// Starts `effect`; returns whether a reply message will follow.
    pub fn run(&self, effect: Effect) -> bool {
        match effect {
            Effect::SaveMetadata(book) => {
                if let Err(err) = self.store.save_book(&book) {
                    relay_warn!("Failed to save book metadata: {}", err);
                }
                false
            }
            Effect::RefreshCount => {
                self.spawn_request(ObserverRequest::GetUrls, |reply| match reply {
                    Ok(ObserverReply::Status(status)) => Msg::CountRefreshed(status.count),
                    other => {
                        relay_warn!("Could not refresh URL count: {:?}", other);
                        Msg::NoOp
                    }
                });
                true
            }
            Effect::ClearUrls => {
                self.spawn_request(ObserverRequest::ClearUrls, |reply| {
                    Msg::ClearReplied(match reply {
                        Ok(ObserverReply::Status(status)) => Ok(status),
                        Ok(other) => Err(format!("unexpected reply: {other:?}")),
                        Err(err) => Err(err),
                    })
                });
                true
            }
            Effect::StartCapture => {
                self.spawn_request(ObserverRequest::CaptureAudio, |reply| {
                    Msg::CaptureReplied(match reply {
                        Ok(ObserverReply::Capture(capture)) => Ok(capture),
                        Ok(other) => Err(format!("unexpected reply: {other:?}")),
                        Err(err) => Err(err),
                    })
                });
                true
            }
            Effect::LoadUrls => {
                let urls = match self.store.captured_urls() {
                    Ok(urls) => urls.into_vec(),
                    Err(err) => {
                        relay_warn!("Failed to read captured URLs: {}", err);
                        Vec::new()
                    }
                };
                self.send(Msg::UrlsLoaded(urls));
                true
            }
            Effect::DownloadTrack(job) => {
                let track_number = job.metadata.track_number;
                relay_info!("Downloading {} from {}", job.filename, job.url);
                self.spawn_request(ObserverRequest::DownloadUrl(job.into()), move |reply| {
                    let result = match reply {
                        Ok(ObserverReply::Download(download)) if download.success => Ok(()),
                        Ok(ObserverReply::Download(download)) => Err(download
                            .error
                            .unwrap_or_else(|| "Unknown error".to_string())),
                        Ok(other) => Err(format!("unexpected reply: {other:?}")),
                        Err(err) => Err(err),
                    };
                    Msg::TrackFinished {
                        track_number,
                        result,
                    }
                });
                true
            }
        }
    }

    fn spawn_request<F>(&self, request: ObserverRequest, to_msg: F)
    where
        F: FnOnce(Result<ObserverReply, String>) -> Msg + Send + 'static,
    {
        let observer = self.observer.clone();
        let msg_tx = self.msg_tx.clone();
        tokio::spawn(async move {
            let reply = observer
                .request(request)
                .await
                .map_err(|err| format!("Message error: {err}"));
            if msg_tx.send(to_msg(reply)).is_err() {
                relay_debug!("Panel closed before the reply arrived");
            }
        });
    }

    fn send(&self, msg: Msg) {
        if self.msg_tx.send(msg).is_err() {
            relay_debug!("Panel inbox closed");
        }
    }
}

pub struct Panel {
    state: PanelState,
    runner: EffectRunner,
    inbox: mpsc::UnboundedReceiver<Msg>,
    notifications: Option<broadcast::Receiver<Notification>>,
    in_flight: usize,
}

impl Panel {
    /// Opens the panel with the stored metadata and the observer's URL count.
    pub async fn open(
        observer: ObserverEndpoint,
        store: SharedState,
        notifications: broadcast::Receiver<Notification>,
    ) -> Self {
        let book = store.book().unwrap_or_else(|err| {
            relay_warn!("Failed to load book metadata: {}", err);
            BookMetadata::default()
        });
        let captured_count = match observer.request(ObserverRequest::GetUrls).await {
            Ok(ObserverReply::Status(status)) => status.count,
            other => {
                relay_warn!("Could not read URL count: {:?}", other);
                0
            }
        };

        let (msg_tx, inbox) = mpsc::unbounded_channel();
        let mut panel = Self {
            state: PanelState::new(),
            runner: EffectRunner::new(observer, store, msg_tx),
            inbox,
            notifications: Some(notifications),
            in_flight: 0,
        };
        panel.dispatch(Msg::Opened {
            book,
            captured_count,
        });
        panel
    }

    pub fn view(&self) -> PanelViewModel {
        self.state.view()
    }

    pub fn dispatch(&mut self, msg: Msg) {
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        if state.consume_dirty() {
            render(&state.view());
        }
        self.state = state;
        for effect in effects {
            if self.runner.run(effect) {
                self.in_flight += 1;
            }
        }
    }

    /// Processes replies and notifications until no effect is outstanding.
    /// Notifications already queued at that point are applied as well.
    pub async fn settle(&mut self) {
        loop {
            if self.in_flight == 0 {
                match self.queued_notification() {
                    Some(msg) => {
                        self.dispatch(msg);
                        continue;
                    }
                    None => break,
                }
            }
            let msg = tokio::select! {
                msg = self.inbox.recv() => match msg {
                    Some(msg) => {
                        self.in_flight -= 1;
                        msg
                    }
                    None => break,
                },
                note = recv_notification(&mut self.notifications) => match note {
                    Some(note) => notification_msg(note),
                    None => continue,
                },
            };
            self.dispatch(msg);
        }
    }

    fn queued_notification(&mut self) -> Option<Msg> {
        let rx = self.notifications.as_mut()?;
        loop {
            match rx.try_recv() {
                Ok(note) => return Some(notification_msg(note)),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    relay_debug!("Missed {} panel notifications", skipped);
                }
                Err(_) => return None,
            }
        }
    }
}

fn notification_msg(note: Notification) -> Msg {
    match note {
        Notification::UpdateAuthorField => Msg::AuthorInvalidated,
    }
}

async fn recv_notification(
    notifications: &mut Option<broadcast::Receiver<Notification>>,
) -> Option<Notification> {
    let Some(rx) = notifications.as_mut() else {
        return std::future::pending().await;
    };
    match rx.recv().await {
        Ok(note) => Some(note),
        Err(broadcast::error::RecvError::Lagged(skipped)) => {
            relay_debug!("Missed {} panel notifications", skipped);
            None
        }
        Err(broadcast::error::RecvError::Closed) => {
            *notifications = None;
            None
        }
    }
}

fn render(view: &PanelViewModel) {
    match view.progress {
        Some(progress) => relay_info!(
            "{} [{}/{}]",
            view.status,
            progress.current,
            progress.total
        ),
        None if !view.status.is_empty() => relay_info!("{}", view.status),
        None => relay_debug!("{}", view.capture_status),
    }
}
