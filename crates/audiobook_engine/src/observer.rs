//! The long-lived observer: watches network and navigation events, owns the
//! captured list through [`SharedState`] and relays panel requests to the
//! automator in the active tab.
use std::sync::Arc;
use std::time::Duration;

use audiobook_core::{
    AuthorReply, AutomatorReply, AutomatorRequest, CaptureReply, DownloadReply, MatchPattern,
    Notification, ObserverReply, ObserverRequest, RequestFilter, StatusReply, TrackRequest,
};
use relay_logging::{relay_debug, relay_error, relay_info, relay_warn};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::channel::{self, Disposition, Endpoint, Envelope, Mailbox, Responder};
use crate::host::{BrowserHost, HostEvent, NetworkEvent};
use crate::storage::SharedState;
use crate::{RelayError, TabId};

pub type ObserverEndpoint = Endpoint<ObserverRequest, ObserverReply>;
pub type ObserverMailbox = Mailbox<ObserverRequest, ObserverReply>;

#[derive(Debug, Clone)]
pub struct ObserverSettings {
    /// Ceiling on a download relay; the panel gets a failure after this.
    pub relay_timeout: Duration,
    pub ping_timeout: Duration,
    /// Wait after a fresh injection before messaging the automator.
    pub injection_settle: Duration,
    pub filter: RequestFilter,
    /// Pages eligible for title extraction and automatic injection.
    /// `None` means every page.
    pub page_pattern: Option<MatchPattern>,
}

impl Default for ObserverSettings {
    fn default() -> Self {
        Self {
            relay_timeout: Duration::from_millis(5000),
            ping_timeout: Duration::from_millis(1000),
            injection_settle: Duration::from_millis(500),
            filter: RequestFilter::default(),
            page_pattern: Some(audiobook_core::reader_page_pattern()),
        }
    }
}

pub struct Observer {
    state: SharedState,
    host: Arc<dyn BrowserHost>,
    settings: ObserverSettings,
    notifications: broadcast::Sender<Notification>,
}

impl Observer {
    pub fn new(state: SharedState, host: Arc<dyn BrowserHost>, settings: ObserverSettings) -> Arc<Self> {
        let (notifications, _) = broadcast::channel(16);
        Arc::new(Self {
            state,
            host,
            settings,
            notifications,
        })
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Unsolicited notifications for the panel.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// First start or update: tracking begins from an empty list.
    pub fn on_installed(&self) {
        self.reset_captured();
        relay_info!("Libby Audiobook Helper installed/updated. URL tracking initialized.");
    }

    /// Records a matching media request. Never influences the request itself.
    pub fn on_request(&self, event: &NetworkEvent) -> bool {
        if !self.settings.filter.matches(&event.url, event.resource_type) {
            return false;
        }
        relay_info!("Captured media URL: {}", event.url);
        match self.state.record_url(&event.url) {
            Ok(added) => added,
            Err(err) => {
                relay_error!("Failed to persist captured URL: {}", err);
                false
            }
        }
    }

    /// Clears the captured list right away, then refreshes the title and
    /// pre-injects the automator in the background.
    pub fn on_navigation_complete(self: &Arc<Self>, tab: TabId) -> JoinHandle<()> {
        self.reset_captured();
        relay_info!("Page loaded/reloaded. URL tracking reset for tab: {}", tab);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            if !this.is_reader_page(tab).await {
                relay_debug!("Tab {} is not a reader page", tab);
                return;
            }
            tokio::join!(this.refresh_title(tab), this.preinject(tab));
        })
    }

    async fn is_reader_page(&self, tab: TabId) -> bool {
        let Some(pattern) = &self.settings.page_pattern else {
            return true;
        };
        self.host
            .tab_url(tab)
            .await
            .is_some_and(|url| pattern.matches(&url))
    }

    async fn refresh_title(&self, tab: TabId) {
        let title = match self.host.page_title(tab).await {
            Ok(Some(title)) => title,
            Ok(None) => return,
            Err(err) => {
                relay_error!("Error extracting title: {}", err);
                return;
            }
        };
        match self.state.observe_title(&title) {
            Ok(update) if update.author_invalidated() => {
                relay_info!("Title changed, author name cleared.");
                // No receiver just means no panel is open.
                let _ = self.notifications.send(Notification::UpdateAuthorField);
            }
            Ok(_) => {}
            Err(err) => relay_error!("Failed to store page title: {}", err),
        }
    }

    async fn preinject(&self, tab: TabId) {
        match self.ensure_automator(tab).await {
            Ok(()) => relay_debug!("Automator ready in tab {}", tab),
            Err(err) => relay_error!("Failed to pre-inject automator: {}", err),
        }
    }

    /// Pings the tab's automator and injects a new one if it does not answer.
    /// Injection is attempted once.
    pub async fn ensure_automator(&self, tab: TabId) -> Result<(), RelayError> {
        let ping = tokio::time::timeout(
            self.settings.ping_timeout,
            self.host.send_to_tab(tab, AutomatorRequest::Ping),
        )
        .await;
        match ping {
            Ok(Ok(AutomatorReply::Ready(reply))) if reply.is_ready() => {
                relay_debug!("Automator already loaded in tab {}", tab);
                return Ok(());
            }
            Ok(Ok(other)) => relay_warn!("Unexpected ping reply: {:?}", other),
            Ok(Err(err)) => relay_debug!("Automator not reachable in tab {}: {}", tab, err),
            Err(_) => relay_debug!("Automator ping timed out in tab {}", tab),
        }

        relay_info!("Automator not ready, injecting it now");
        self.host.inject_automator(tab).await?;
        tokio::time::sleep(self.settings.injection_settle).await;
        Ok(())
    }

    /// Forwards one track to the active tab's automator and waits for the outcome.
    pub async fn relay_download(&self, track: TrackRequest) -> Result<(), RelayError> {
        let tab = self.host.active_tab().await.ok_or(RelayError::NoActiveTab)?;
        self.ensure_automator(tab).await?;
        match self
            .host
            .send_to_tab(tab, AutomatorRequest::DownloadWithFetch(track))
            .await?
        {
            AutomatorReply::Fetch(reply) if reply.success => Ok(()),
            AutomatorReply::Fetch(reply) => Err(RelayError::Remote(
                reply
                    .error
                    .unwrap_or_else(|| "Content script failed to download".to_string()),
            )),
            other => Err(RelayError::Remote(format!("Unexpected reply: {other:?}"))),
        }
    }

    pub async fn start_capture(&self) -> Result<CaptureReply, RelayError> {
        let tab = self.host.active_tab().await.ok_or(RelayError::NoActiveTab)?;
        self.ensure_automator(tab).await?;
        match self
            .host
            .send_to_tab(tab, AutomatorRequest::StartAudioCapture)
            .await?
        {
            AutomatorReply::Capture(reply) => Ok(reply),
            other => Err(RelayError::Remote(format!("Unexpected reply: {other:?}"))),
        }
    }

    pub fn dispatch(
        self: &Arc<Self>,
        request: ObserverRequest,
        responder: Responder<ObserverReply>,
    ) -> Disposition {
        match request {
            ObserverRequest::GetUrls => {
                let urls = self.state.captured_urls().unwrap_or_else(|err| {
                    relay_error!("Failed to read captured URLs: {}", err);
                    Default::default()
                });
                let reply = if urls.is_empty() {
                    StatusReply {
                        status: "No URLs captured yet".to_string(),
                        count: 0,
                    }
                } else {
                    for url in urls.iter() {
                        relay_info!("CapturedURL: {}", url);
                    }
                    StatusReply {
                        status: "Logged URLs to console".to_string(),
                        count: urls.len(),
                    }
                };
                responder.respond(ObserverReply::Status(reply));
                Disposition::Replied
            }
            ObserverRequest::ClearUrls => {
                self.reset_captured();
                responder.respond(ObserverReply::Status(StatusReply {
                    status: "URLs cleared".to_string(),
                    count: 0,
                }));
                Disposition::Replied
            }
            ObserverRequest::DownloadUrl(track) => {
                let deadline = responder.clone();
                let ceiling = self.settings.relay_timeout;
                tokio::spawn(async move {
                    tokio::time::sleep(ceiling).await;
                    if deadline.is_settled() {
                        return;
                    }
                    relay_warn!("Download relay gave no answer within {:?}", ceiling);
                    deadline.respond(ObserverReply::Download(DownloadReply::failed(
                        RelayError::Timeout.to_string(),
                    )));
                });

                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let reply = match this.relay_download(track).await {
                        Ok(()) => DownloadReply::ok(),
                        Err(err) => {
                            relay_error!("Download failed: {}", err);
                            DownloadReply::failed(err.to_string())
                        }
                    };
                    responder.respond(ObserverReply::Download(reply));
                });
                Disposition::Pending
            }
            ObserverRequest::UpdateAuthorField => {
                let author_name = self.state.author().unwrap_or_else(|err| {
                    relay_error!("Failed to read author: {}", err);
                    String::new()
                });
                responder.respond(ObserverReply::Author(AuthorReply { author_name }));
                Disposition::Replied
            }
            ObserverRequest::CaptureAudio => {
                let this = Arc::clone(self);
                tokio::spawn(async move {
                    let reply = this.start_capture().await.unwrap_or_else(|err| {
                        relay_error!("Audio capture failed: {}", err);
                        CaptureReply {
                            status: format!("Error: {err}"),
                        }
                    });
                    responder.respond(ObserverReply::Capture(reply));
                });
                Disposition::Pending
            }
            ObserverRequest::ContentScriptReady => {
                relay_info!("Content script is ready");
                Disposition::NoReply
            }
        }
    }

    /// Serves panel requests and host events. Stops once the mailbox
    /// closes; a closed event stream only stops event handling.
    pub async fn run(
        self: Arc<Self>,
        mut mailbox: ObserverMailbox,
        mut events: mpsc::UnboundedReceiver<HostEvent>,
    ) {
        let mut events_open = true;
        loop {
            tokio::select! {
                envelope = mailbox.recv() => {
                    let Some(Envelope { request, responder }) = envelope else {
                        break;
                    };
                    self.dispatch(request, responder);
                }
                event = events.recv(), if events_open => match event {
                    Some(HostEvent::Request(event)) => {
                        self.on_request(&event);
                    }
                    Some(HostEvent::NavigationComplete { tab }) => {
                        self.on_navigation_complete(tab);
                    }
                    None => events_open = false,
                },
            }
        }
        relay_debug!("Observer stopped");
    }

    /// Starts the event loop. The observer keeps running while any endpoint
    /// clone is alive.
    pub fn spawn(self: &Arc<Self>, events: mpsc::UnboundedReceiver<HostEvent>) -> ObserverEndpoint {
        let (endpoint, mailbox) = channel::channel();
        tokio::spawn(Arc::clone(self).run(mailbox, events));
        endpoint
    }

    fn reset_captured(&self) {
        match self.state.clear_urls() {
            Ok(()) => relay_debug!("Cleared captured URLs list"),
            Err(err) => relay_error!("Failed to clear captured URLs: {}", err),
        }
    }
}
