//! Wires the store, the in-process browser host, the observer and the
//! automator factory for one CLI invocation.
use std::sync::Arc;

use anyhow::Context;
use audiobook_engine::{
    Automator, AutomatorFactory, ChannelProgressSink, DetachedDom, DirectorySaver, Id3TagWriter,
    JsonFileStore, LocalHost, Observer, ObserverEndpoint, PageDom, ReqwestFetcher,
    SharedState, Stage, TabId, TrackProgress,
};
use relay_logging::{relay_debug, relay_info};
use tokio::sync::mpsc;

use super::config::AppConfig;

pub struct Session {
    pub store: SharedState,
    pub host: Arc<LocalHost>,
    pub observer: Arc<Observer>,
    pub endpoint: ObserverEndpoint,
}

impl Session {
    /// Starts the observer loop. No tab exists yet.
    pub fn start(config: &AppConfig) -> anyhow::Result<Self> {
        let store = JsonFileStore::open(&config.state_path)
            .with_context(|| format!("opening state file {:?}", config.state_path))?;
        let store = SharedState::new(Arc::new(store));

        let fetcher = Arc::new(
            ReqwestFetcher::new(config.fetch_settings()).context("building HTTP client")?,
        );
        let saver = Arc::new(DirectorySaver::new(config.output_dir.clone()));
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        tokio::spawn(log_progress(progress_rx));
        let progress = Arc::new(ChannelProgressSink::new(progress_tx));
        let automator_settings = config.automator_settings();

        let factory: AutomatorFactory = Arc::new(move |dom: Arc<dyn PageDom>| {
            Automator::new(dom, fetcher.clone(), saver.clone())
                .with_tagger(Arc::new(Id3TagWriter))
                .with_progress(progress.clone())
                .with_settings(automator_settings.clone())
        });
        let (host, events) = LocalHost::new(factory);

        let observer = Observer::new(store.clone(), host.clone(), config.observer_settings()?);
        let endpoint = observer.spawn(events);
        host.connect_observer(endpoint.clone());

        Ok(Self {
            store,
            host,
            observer,
            endpoint,
        })
    }

    /// Focuses a reader tab without a live document. Downloads only need
    /// the page as a fetch context, so no navigation is reported.
    pub fn attach_reader(&self, config: &AppConfig) -> TabId {
        self.host.attach_tab(&config.reader_url, Arc::new(DetachedDom))
    }
}

async fn log_progress(mut rx: mpsc::UnboundedReceiver<TrackProgress>) {
    while let Some(progress) = rx.recv().await {
        match progress.stage {
            Stage::Fetching => relay_debug!(
                "Fetching {}: {} bytes",
                progress.url,
                progress.bytes.unwrap_or(0)
            ),
            Stage::Tagging => relay_debug!("Tagging {}", progress.url),
            Stage::Saving => relay_info!(
                "Saving {} ({} bytes)",
                progress.url,
                progress.bytes.unwrap_or(0)
            ),
            Stage::Done => relay_info!("Finished {}", progress.url),
        }
    }
}
