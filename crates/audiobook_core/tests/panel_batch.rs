use std::sync::Once;

use audiobook_core::{
    update, BatchProgress, BookMetadata, Effect, Msg, PanelState, TrackJob,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(relay_logging::initialize_for_tests);
}

fn opened(title: &str, author: &str, count: usize) -> PanelState {
    let (state, effects) = update(
        PanelState::new(),
        Msg::Opened {
            book: BookMetadata::new(title, author),
            captured_count: count,
        },
    );
    assert!(effects.is_empty());
    state
}

fn expect_track(effects: &[Effect]) -> TrackJob {
    match effects {
        [Effect::DownloadTrack(job)] => job.clone(),
        other => panic!("expected a single DownloadTrack effect, got {other:?}"),
    }
}

#[test]
fn batch_downloads_tracks_in_list_order_one_at_a_time() {
    init_logging();
    let state = opened("T", "A", 2);

    let (state, effects) = update(state, Msg::DownloadClicked);
    assert_eq!(
        effects,
        vec![
            Effect::SaveMetadata(BookMetadata::new("T", "A")),
            Effect::LoadUrls
        ]
    );

    let urls = vec!["https://u/1".to_string(), "https://u/2".to_string()];
    let (state, effects) = update(state, Msg::UrlsLoaded(urls));
    let first = expect_track(&effects);
    assert_eq!(first.url, "https://u/1");
    assert_eq!(first.filename, "T - Part 1.mp3");
    assert_eq!(first.metadata.track_number, 1);
    assert_eq!(first.metadata.title, "T - Part 1");
    assert_eq!(first.metadata.artist, "A");
    assert_eq!(first.metadata.author, "A");
    assert_eq!(first.metadata.album.as_deref(), Some("T"));
    assert_eq!(state.view().status, "Starting download of 2 files...");
    assert_eq!(
        state.view().progress,
        Some(BatchProgress {
            current: 1,
            total: 2
        })
    );
    assert!(!state.view().download_enabled);

    let (state, effects) = update(
        state,
        Msg::TrackFinished {
            track_number: 1,
            result: Ok(()),
        },
    );
    let second = expect_track(&effects);
    assert_eq!(second.url, "https://u/2");
    assert_eq!(second.filename, "T - Part 2.mp3");
    assert_eq!(second.metadata.track_number, 2);
    assert_eq!(state.view().status, "Downloaded 1/2 files");

    let (state, effects) = update(
        state,
        Msg::TrackFinished {
            track_number: 2,
            result: Ok(()),
        },
    );
    assert!(effects.is_empty());
    let view = state.view();
    assert_eq!(view.status, "Successfully downloaded all 2 files!");
    assert_eq!(view.progress, None);
    assert!(view.download_enabled);
}

#[test]
fn failure_aborts_remaining_batch() {
    let state = opened("T", "A", 3);
    let (state, _) = update(state, Msg::DownloadClicked);
    let urls = vec!["u1".to_string(), "u2".to_string(), "u3".to_string()];
    let (state, _) = update(state, Msg::UrlsLoaded(urls));

    let (state, effects) = update(
        state,
        Msg::TrackFinished {
            track_number: 1,
            result: Err("HTTP error! status: 404".to_string()),
        },
    );
    assert!(effects.is_empty());
    assert!(!state.is_downloading());
    assert_eq!(
        state.view().status,
        "Error downloading: HTTP error! status: 404"
    );

    // A late answer for the aborted batch changes nothing.
    let (state, effects) = update(
        state,
        Msg::TrackFinished {
            track_number: 1,
            result: Ok(()),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(
        state.view().status,
        "Error downloading: HTTP error! status: 404"
    );
}

#[test]
fn download_refused_without_title_and_author() {
    let state = opened("T", "   ", 2);
    let (mut state, effects) = update(state, Msg::DownloadClicked);

    assert_eq!(
        effects,
        vec![Effect::SaveMetadata(BookMetadata::new("T", "   "))]
    );
    assert_eq!(state.view().status, "Please enter book title and author name");
    assert!(state.consume_dirty());
}

#[test]
fn empty_capture_list_reports_nothing_to_download() {
    let state = opened("T", "A", 0);
    let (state, _) = update(state, Msg::DownloadClicked);
    let (state, effects) = update(state, Msg::UrlsLoaded(Vec::new()));

    assert!(effects.is_empty());
    assert_eq!(state.view().status, "No URLs to download");
}

#[test]
fn second_click_during_batch_is_ignored() {
    let state = opened("T", "A", 1);
    let (state, _) = update(state, Msg::DownloadClicked);
    let (state, _) = update(state, Msg::UrlsLoaded(vec!["u1".to_string()]));

    let (state, effects) = update(state, Msg::DownloadClicked);
    assert!(effects.is_empty());
    let (_state, effects) = update(state, Msg::UrlsLoaded(vec!["u9".to_string()]));
    assert!(effects.is_empty());
}

#[test]
fn title_and_author_are_trimmed_for_tracks() {
    let state = opened("  My Book ", " Jane ", 1);
    let (state, _) = update(state, Msg::DownloadClicked);
    let (_state, effects) = update(state, Msg::UrlsLoaded(vec!["u1".to_string()]));

    let job = expect_track(&effects);
    assert_eq!(job.filename, "My Book - Part 1.mp3");
    assert_eq!(job.metadata.artist, "Jane");
}
