//! The browser surface the observer drives: tabs, script injection and
//! tab messaging.
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use audiobook_core::{AutomatorReply, AutomatorRequest, ResourceType};
use relay_logging::{relay_debug, relay_info, relay_warn};
use tokio::sync::mpsc;

use crate::automator::{Automator, AutomatorEndpoint};
use crate::channel::ChannelError;
use crate::observer::ObserverEndpoint;
use crate::page::PageDom;
use crate::{RelayError, TabId};

/// An outgoing request seen by the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkEvent {
    /// Issuing tab, if the request belongs to one.
    pub tab: Option<TabId>,
    pub url: String,
    pub resource_type: ResourceType,
}

impl NetworkEvent {
    pub fn new(tab: Option<TabId>, url: impl Into<String>, resource_type: ResourceType) -> Self {
        Self {
            tab,
            url: url.into(),
            resource_type,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Request(NetworkEvent),
    NavigationComplete { tab: TabId },
}

#[async_trait]
pub trait BrowserHost: Send + Sync {
    /// The focused tab of the current window.
    async fn active_tab(&self) -> Option<TabId>;
    async fn tab_url(&self, tab: TabId) -> Option<String>;
    /// Evaluates `document.title` in the tab.
    async fn page_title(&self, tab: TabId) -> Result<Option<String>, RelayError>;
    /// Places a fresh automator into the tab. Fails with `InjectionFailure`.
    async fn inject_automator(&self, tab: TabId) -> Result<(), RelayError>;
    async fn send_to_tab(
        &self,
        tab: TabId,
        request: AutomatorRequest,
    ) -> Result<AutomatorReply, ChannelError>;
}

/// Builds the automator injected into a page.
pub type AutomatorFactory = Arc<dyn Fn(Arc<dyn PageDom>) -> Automator + Send + Sync>;

struct Tab {
    url: String,
    dom: Arc<dyn PageDom>,
    automator: Option<AutomatorEndpoint>,
}

#[derive(Default)]
struct Tabs {
    entries: BTreeMap<TabId, Tab>,
    active: Option<TabId>,
    next_id: TabId,
}

/// In-process browser: tabs are page handles, injection spawns an automator task.
pub struct LocalHost {
    tabs: Mutex<Tabs>,
    factory: AutomatorFactory,
    observer: Mutex<Option<ObserverEndpoint>>,
    events: mpsc::UnboundedSender<HostEvent>,
}

impl LocalHost {
    pub fn new(factory: AutomatorFactory) -> (Arc<Self>, mpsc::UnboundedReceiver<HostEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let host = Arc::new(Self {
            tabs: Mutex::new(Tabs {
                next_id: 1,
                ..Tabs::default()
            }),
            factory,
            observer: Mutex::new(None),
            events,
        });
        (host, rx)
    }

    /// Injected automators announce themselves to `observer`.
    pub fn connect_observer(&self, observer: ObserverEndpoint) {
        *self.observer.lock().unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    fn tabs(&self) -> MutexGuard<'_, Tabs> {
        self.tabs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens and focuses a tab, then reports its load as complete.
    pub fn open_tab(&self, url: &str, dom: Arc<dyn PageDom>) -> TabId {
        let id = self.attach_tab(url, dom);
        self.emit(HostEvent::NavigationComplete { tab: id });
        id
    }

    /// Registers and focuses a tab whose page was already loaded before the
    /// observer started. No navigation is reported.
    pub fn attach_tab(&self, url: &str, dom: Arc<dyn PageDom>) -> TabId {
        let mut tabs = self.tabs();
        let id = tabs.next_id;
        tabs.next_id += 1;
        tabs.entries.insert(
            id,
            Tab {
                url: url.to_string(),
                dom,
                automator: None,
            },
        );
        tabs.active = Some(id);
        relay_debug!("Tab {} at {}", id, url);
        id
    }

    /// Loads a new document into `tab`. Any injected automator is gone afterwards.
    pub fn navigate(&self, tab: TabId, url: &str, dom: Arc<dyn PageDom>) -> bool {
        {
            let mut tabs = self.tabs();
            let Some(entry) = tabs.entries.get_mut(&tab) else {
                relay_warn!("Cannot navigate unknown tab {}", tab);
                return false;
            };
            entry.url = url.to_string();
            entry.dom = dom;
            entry.automator = None;
        }
        self.emit(HostEvent::NavigationComplete { tab });
        true
    }

    /// Removes `tab`; focus moves to the most recently opened remaining tab.
    pub fn close_tab(&self, tab: TabId) {
        let mut tabs = self.tabs();
        tabs.entries.remove(&tab);
        if tabs.active == Some(tab) {
            tabs.active = tabs.entries.keys().next_back().copied();
        }
    }

    pub fn activate(&self, tab: TabId) -> bool {
        let mut tabs = self.tabs();
        if tabs.entries.contains_key(&tab) {
            tabs.active = Some(tab);
            true
        } else {
            false
        }
    }

    pub fn has_automator(&self, tab: TabId) -> bool {
        self.tabs()
            .entries
            .get(&tab)
            .is_some_and(|entry| entry.automator.is_some())
    }

    /// Reports an outgoing request, as the network layer would.
    pub fn emit_request(&self, event: NetworkEvent) {
        self.emit(HostEvent::Request(event));
    }

    fn emit(&self, event: HostEvent) {
        if self.events.send(event).is_err() {
            relay_debug!("No observer is listening to host events");
        }
    }

    fn endpoint(&self, tab: TabId) -> Option<AutomatorEndpoint> {
        self.tabs()
            .entries
            .get(&tab)
            .and_then(|entry| entry.automator.clone())
    }
}

#[async_trait]
impl BrowserHost for LocalHost {
    async fn active_tab(&self) -> Option<TabId> {
        self.tabs().active
    }

    async fn tab_url(&self, tab: TabId) -> Option<String> {
        self.tabs().entries.get(&tab).map(|entry| entry.url.clone())
    }

    async fn page_title(&self, tab: TabId) -> Result<Option<String>, RelayError> {
        let dom = self
            .tabs()
            .entries
            .get(&tab)
            .map(|entry| Arc::clone(&entry.dom));
        match dom {
            Some(dom) => Ok(dom.title().await),
            None => Err(RelayError::Remote(format!("No tab with id: {tab}."))),
        }
    }

    async fn inject_automator(&self, tab: TabId) -> Result<(), RelayError> {
        let (url, dom) = {
            let tabs = self.tabs();
            let entry = tabs
                .entries
                .get(&tab)
                .ok_or_else(|| RelayError::InjectionFailure(format!("No tab with id: {tab}.")))?;
            (entry.url.clone(), Arc::clone(&entry.dom))
        };
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(RelayError::InjectionFailure(format!(
                "Cannot access contents of url \"{url}\"."
            )));
        }

        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let endpoint = (self.factory)(dom).spawn(observer.as_ref());

        let mut tabs = self.tabs();
        match tabs.entries.get_mut(&tab) {
            Some(entry) if entry.url == url => {
                entry.automator = Some(endpoint);
                relay_info!("Automator injected into tab {}", tab);
                Ok(())
            }
            _ => Err(RelayError::InjectionFailure(
                "The frame was removed.".to_string(),
            )),
        }
    }

    async fn send_to_tab(
        &self,
        tab: TabId,
        request: AutomatorRequest,
    ) -> Result<AutomatorReply, ChannelError> {
        let endpoint = self.endpoint(tab).ok_or(ChannelError::Disconnected)?;
        endpoint.request(request).await
    }
}
