//! Chromium backend: the reader page runs in a real browser driven over the
//! DevTools protocol. Network and load events are forwarded to the host.
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use audiobook_core::ResourceType;
use audiobook_engine::{LocalHost, NetworkEvent, PageControl, PageDom, PageError, TabId};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{self, EventRequestWillBeSent};
use chromiumoxide::cdp::browser_protocol::page::EventLoadEventFired;
use chromiumoxide::element::Element;
use chromiumoxide::Page;
use futures_util::StreamExt;
use relay_logging::{relay_debug, relay_warn};
use tokio::task::JoinHandle;

/// `PageDom` over a CDP page.
#[derive(Clone)]
pub struct CdpDom {
    page: Page,
}

impl CdpDom {
    pub fn new(page: Page) -> Self {
        Self { page }
    }
}

struct CdpControl {
    element: Element,
}

#[async_trait]
impl PageControl for CdpControl {
    async fn activate(&self) -> Result<(), PageError> {
        self.element
            .click()
            .await
            .map(|_| ())
            .map_err(|err| PageError::Script(err.to_string()))
    }

    async fn label(&self) -> Option<String> {
        self.element.attribute("aria-label").await.ok().flatten()
    }
}

#[async_trait]
impl PageDom for CdpDom {
    async fn find(&self, selector: &str) -> Option<Box<dyn PageControl>> {
        match self.page.find_element(selector).await {
            Ok(element) => Some(Box::new(CdpControl { element })),
            Err(err) => {
                relay_debug!("No element for {}: {}", selector, err);
                None
            }
        }
    }

    async fn title(&self) -> Option<String> {
        self.page.get_title().await.ok().flatten()
    }
}

/// A launched browser with one reader tab registered in the host.
pub struct ChromiumSession {
    browser: Browser,
    tasks: Vec<JoinHandle<()>>,
    pub tab: TabId,
}

impl ChromiumSession {
    pub async fn launch(
        host: Arc<LocalHost>,
        url: &str,
        profile: Option<PathBuf>,
    ) -> anyhow::Result<Self> {
        let mut builder = BrowserConfig::builder().with_head();
        if let Some(profile) = profile {
            builder = builder.user_data_dir(profile);
        }
        let config = builder.build().map_err(|err| anyhow!(err))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("launching Chromium")?;

        let mut tasks = vec![tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        })];

        let page = browser
            .new_page("about:blank")
            .await
            .context("opening reader tab")?;
        page.execute(network::EnableParams::default())
            .await
            .context("enabling network events")?;
        let tab = host.attach_tab("about:blank", Arc::new(CdpDom::new(page.clone())));

        let mut requests = page.event_listener::<EventRequestWillBeSent>().await?;
        let request_host = Arc::clone(&host);
        tasks.push(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                let resource_type = event
                    .r#type
                    .as_ref()
                    .map_or(ResourceType::Other, |kind| {
                        ResourceType::from_name(kind.as_ref())
                    });
                request_host.emit_request(NetworkEvent::new(
                    Some(tab),
                    event.request.url.clone(),
                    resource_type,
                ));
            }
        }));

        let mut loads = page.event_listener::<EventLoadEventFired>().await?;
        let load_page = page.clone();
        tasks.push(tokio::spawn(async move {
            while loads.next().await.is_some() {
                let url = match load_page.url().await {
                    Ok(Some(url)) => url,
                    Ok(None) => continue,
                    Err(err) => {
                        relay_warn!("Could not read page URL: {}", err);
                        continue;
                    }
                };
                // A load replaces the document, and any injected automator with it.
                host.navigate(tab, &url, Arc::new(CdpDom::new(load_page.clone())));
            }
        }));

        page.goto(url).await.context("loading reader page")?;
        Ok(Self {
            browser,
            tasks,
            tab,
        })
    }

    pub async fn close(mut self) {
        if let Err(err) = self.browser.close().await {
            relay_warn!("Failed to close Chromium: {}", err);
        }
        for task in self.tasks {
            task.abort();
        }
    }
}
