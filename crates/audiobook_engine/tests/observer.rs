mod support;

use std::sync::Arc;
use std::time::Duration;

use audiobook_core::{
    AuthorReply, BookMetadata, CaptureReply, DownloadReply, Notification, ObserverReply,
    ObserverRequest, ResourceType, StatusReply, TrackRequest,
};
use audiobook_engine::{
    reply_pair, Automator, AutomatorFactory, Disposition, HostEvent, LocalHost, NetworkEvent,
    Observer, ObserverEndpoint, ObserverSettings, PageDom, SharedState,
};
use pretty_assertions::assert_eq;
use support::{CannedFetcher, FakePlayer, RecordingSaver};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

const READER_URL: &str = "https://libbyapp.com/open/loan/1234";

fn clip(name: &str) -> String {
    format!("https://dls.odrmediaclips.cachefly.net/{name}.mp3")
}

fn media(url: &str) -> NetworkEvent {
    NetworkEvent::new(Some(1), url, ResourceType::Media)
}

struct Rig {
    host: Arc<LocalHost>,
    observer: Arc<Observer>,
    saver: RecordingSaver,
    events: Option<UnboundedReceiver<HostEvent>>,
}

impl Rig {
    fn new(fetcher: CannedFetcher) -> Self {
        let fetcher = Arc::new(fetcher);
        let saver = RecordingSaver::default();
        let factory: AutomatorFactory = {
            let saver = saver.clone();
            Arc::new(move |dom: Arc<dyn PageDom>| {
                Automator::new(dom, fetcher.clone(), Arc::new(saver.clone()))
            })
        };
        let (host, events) = LocalHost::new(factory);
        let observer = Observer::new(
            SharedState::in_memory(),
            host.clone(),
            ObserverSettings::default(),
        );
        Self {
            host,
            observer,
            saver,
            events: Some(events),
        }
    }

    /// Runs the observer loop and routes automator announcements to it.
    fn spawn(&mut self) -> ObserverEndpoint {
        let events = self.events.take().expect("observer already running");
        let endpoint = self.observer.spawn(events);
        self.host.connect_observer(endpoint.clone());
        endpoint
    }

    fn urls(&self) -> Vec<String> {
        self.observer.state().captured_urls().unwrap().into_vec()
    }
}

async fn download(endpoint: &ObserverEndpoint, url: &str) -> ObserverReply {
    endpoint
        .request(ObserverRequest::DownloadUrl(TrackRequest {
            url: url.to_string(),
            filename: "T - Part 1.mp3".to_string(),
            metadata: None,
        }))
        .await
        .unwrap()
}

#[tokio::test]
async fn captures_distinct_matching_urls_in_first_seen_order() {
    relay_logging::initialize_for_tests();
    let rig = Rig::new(CannedFetcher::new());
    let (a, b, c) = (clip("a"), clip("b"), clip("c"));

    for url in [&a, &b, &a, &c] {
        rig.observer.on_request(&media(url));
    }

    assert_eq!(rig.urls(), vec![a, b, c]);
}

#[tokio::test]
async fn ignores_requests_outside_the_media_filter() {
    let rig = Rig::new(CannedFetcher::new());

    let wrong_type = NetworkEvent::new(Some(1), clip("a"), ResourceType::Xhr);
    let no_marker = media("https://static.cachefly.net/cover.mp3");
    let wrong_host = media("https://odrmediaclips.example.com/odrmediaclips.cachefly.net.mp3");

    assert!(!rig.observer.on_request(&wrong_type));
    assert!(!rig.observer.on_request(&no_marker));
    assert!(!rig.observer.on_request(&wrong_host));
    assert!(rig.urls().is_empty());
}

#[tokio::test]
async fn install_starts_from_an_empty_list() {
    let rig = Rig::new(CannedFetcher::new());
    rig.observer.on_request(&media(&clip("a")));
    rig.observer
        .state()
        .save_book(&BookMetadata::new("T", "A"))
        .unwrap();

    rig.observer.on_installed();

    assert!(rig.urls().is_empty());
    assert_eq!(
        rig.observer.state().book().unwrap(),
        BookMetadata::new("T", "A")
    );
}

#[tokio::test(start_paused = true)]
async fn navigation_complete_empties_the_list_immediately() {
    let rig = Rig::new(CannedFetcher::new());
    let tab = rig.host.open_tab(READER_URL, FakePlayer::titled("Book One").dom());
    rig.observer.on_request(&media(&clip("a")));
    rig.observer.on_request(&media(&clip("b")));

    let refresh = rig.observer.on_navigation_complete(tab);
    assert!(rig.urls().is_empty());

    refresh.await.unwrap();
    assert!(rig.urls().is_empty());
    assert!(rig.host.has_automator(tab));
}

#[tokio::test(start_paused = true)]
async fn changed_title_clears_author_and_notifies_panel() {
    let rig = Rig::new(CannedFetcher::new());
    let mut notifications = rig.observer.subscribe();
    let state = rig.observer.state().clone();
    let player = FakePlayer::titled("Book One");
    let tab = rig.host.open_tab(READER_URL, player.dom());

    // Previously unset title: author survives.
    state.save_book(&BookMetadata::new("", "Someone")).unwrap();
    rig.observer.on_navigation_complete(tab).await.unwrap();
    assert_eq!(state.book().unwrap(), BookMetadata::new("Book One", "Someone"));

    // Same title again: author survives.
    rig.observer.on_navigation_complete(tab).await.unwrap();
    assert_eq!(state.author().unwrap(), "Someone");
    assert!(notifications.try_recv().is_err());

    player.state.set_title("Book Two");
    rig.observer.on_navigation_complete(tab).await.unwrap();
    assert_eq!(state.book().unwrap(), BookMetadata::new("Book Two", ""));
    assert_eq!(notifications.try_recv().unwrap(), Notification::UpdateAuthorField);
}

#[tokio::test(start_paused = true)]
async fn pages_outside_the_reader_keep_title_and_get_no_automator() {
    let rig = Rig::new(CannedFetcher::new());
    let tab = rig
        .host
        .open_tab("https://example.org/", FakePlayer::titled("Elsewhere").dom());

    rig.observer.on_navigation_complete(tab).await.unwrap();

    assert_eq!(rig.observer.state().book().unwrap().title, "");
    assert!(!rig.host.has_automator(tab));
}

#[tokio::test(start_paused = true)]
async fn url_count_and_clear_round_trip_through_the_endpoint() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();

    let empty = endpoint.request(ObserverRequest::GetUrls).await.unwrap();
    assert_eq!(
        empty,
        ObserverReply::Status(StatusReply {
            status: "No URLs captured yet".to_string(),
            count: 0
        })
    );

    rig.observer.on_request(&media(&clip("a")));
    rig.observer.on_request(&media(&clip("b")));
    let logged = endpoint.request(ObserverRequest::GetUrls).await.unwrap();
    assert_eq!(
        logged,
        ObserverReply::Status(StatusReply {
            status: "Logged URLs to console".to_string(),
            count: 2
        })
    );

    let cleared = endpoint.request(ObserverRequest::ClearUrls).await.unwrap();
    assert_eq!(
        cleared,
        ObserverReply::Status(StatusReply {
            status: "URLs cleared".to_string(),
            count: 0
        })
    );
    assert!(rig.urls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn author_query_reads_the_store() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();
    rig.observer
        .state()
        .save_book(&BookMetadata::new("T", "A"))
        .unwrap();

    let reply = endpoint
        .request(ObserverRequest::UpdateAuthorField)
        .await
        .unwrap();
    assert_eq!(
        reply,
        ObserverReply::Author(AuthorReply {
            author_name: "A".to_string()
        })
    );
}

#[tokio::test(start_paused = true)]
async fn relayed_download_saves_through_the_page() {
    let mut rig = Rig::new(CannedFetcher::new().with_body(&clip("a"), b"audio"));
    let endpoint = rig.spawn();
    rig.host.open_tab(READER_URL, FakePlayer::new(3).dom());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let reply = download(&endpoint, &clip("a")).await;

    assert_eq!(reply, ObserverReply::Download(DownloadReply::ok()));
    assert_eq!(rig.saver.filenames(), vec!["T - Part 1.mp3".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn relayed_404_fails_with_status_in_message() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();
    rig.host.open_tab(READER_URL, FakePlayer::new(3).dom());

    let ObserverReply::Download(reply) = download(&endpoint, &clip("gone")).await else {
        panic!("expected a download reply");
    };

    assert!(!reply.success);
    assert!(reply.error.unwrap().contains("404"));
    assert!(rig.saver.saved().is_empty());
}

#[tokio::test(start_paused = true)]
async fn hung_relay_times_out_but_download_still_finishes() {
    let slow = CannedFetcher::new()
        .with_body(&clip("slow"), b"late audio")
        .with_delay(Duration::from_secs(30));
    let mut rig = Rig::new(slow);
    let endpoint = rig.spawn();
    rig.host.open_tab(READER_URL, FakePlayer::new(3).dom());
    tokio::time::sleep(Duration::from_secs(1)).await;

    let started = Instant::now();
    let reply = download(&endpoint, &clip("slow")).await;

    let waited = started.elapsed();
    assert!(waited >= Duration::from_millis(5000) && waited < Duration::from_millis(5100));
    assert_eq!(
        reply,
        ObserverReply::Download(DownloadReply::failed("Timeout: No response received"))
    );

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(rig.saver.filenames(), vec!["T - Part 1.mp3".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn injection_failure_is_surfaced_not_fatal() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();
    rig.host.open_tab("about:blank", FakePlayer::new(3).dom());

    let ObserverReply::Download(reply) = download(&endpoint, &clip("a")).await else {
        panic!("expected a download reply");
    };
    assert!(!reply.success);
    assert!(reply
        .error
        .unwrap()
        .starts_with("Cannot inject script: Cannot access contents of url"));

    // The observer keeps serving.
    let status = endpoint.request(ObserverRequest::GetUrls).await.unwrap();
    assert!(matches!(status, ObserverReply::Status(_)));
}

#[tokio::test(start_paused = true)]
async fn relay_without_any_tab_reports_no_active_tab() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();

    let reply = download(&endpoint, &clip("a")).await;
    assert_eq!(
        reply,
        ObserverReply::Download(DownloadReply::failed("No active tab found"))
    );
}

#[tokio::test(start_paused = true)]
async fn relays_follow_the_focused_tab() {
    let mut rig = Rig::new(CannedFetcher::new().with_body(&clip("a"), b"audio"));
    let endpoint = rig.spawn();
    let reader = rig.host.open_tab(READER_URL, FakePlayer::new(3).dom());
    let blank = rig.host.open_tab("about:blank", FakePlayer::new(3).dom());

    assert!(rig.host.activate(reader));
    assert!(!rig.host.activate(99));
    let reply = download(&endpoint, &clip("a")).await;
    assert_eq!(reply, ObserverReply::Download(DownloadReply::ok()));
    assert!(rig.host.has_automator(reader));

    rig.host.close_tab(reader);
    let ObserverReply::Download(reply) = download(&endpoint, &clip("a")).await else {
        panic!("expected a download reply");
    };
    assert!(reply.error.unwrap().contains("about:blank"));

    rig.host.close_tab(blank);
    assert_eq!(
        download(&endpoint, &clip("a")).await,
        ObserverReply::Download(DownloadReply::failed("No active tab found"))
    );
    assert_eq!(rig.saver.filenames().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn capture_request_walks_the_active_page() {
    let mut rig = Rig::new(CannedFetcher::new());
    let endpoint = rig.spawn();
    let player = FakePlayer::new(3);
    rig.host.open_tab(READER_URL, player.dom());

    let reply = endpoint.request(ObserverRequest::CaptureAudio).await.unwrap();

    assert_eq!(
        reply,
        ObserverReply::Capture(CaptureReply {
            status: "Capture process completed".to_string()
        })
    );
    assert_eq!(player.state.count(support::Press::Next), 3);
}

#[tokio::test]
async fn ready_announcement_expects_no_reply() {
    let rig = Rig::new(CannedFetcher::new());
    let (responder, rx) = reply_pair();

    let disposition = rig
        .observer
        .dispatch(ObserverRequest::ContentScriptReady, responder);

    assert_eq!(disposition, Disposition::NoReply);
    assert!(rx.await.is_err());
}

#[tokio::test(start_paused = true)]
async fn reload_discards_the_injected_automator() {
    let rig = Rig::new(CannedFetcher::new());
    let tab = rig.host.open_tab(READER_URL, FakePlayer::new(3).dom());
    rig.observer.ensure_automator(tab).await.unwrap();
    assert!(rig.host.has_automator(tab));

    assert!(rig.host.navigate(tab, READER_URL, FakePlayer::new(3).dom()));
    assert!(!rig.host.has_automator(tab));

    rig.observer.ensure_automator(tab).await.unwrap();
    assert!(rig.host.has_automator(tab));
}
