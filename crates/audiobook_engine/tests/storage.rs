use std::fs;
use std::sync::Arc;

use audiobook_core::{BookMetadata, TitleUpdate};
use audiobook_engine::{
    finish_save, DirectorySaver, FileSaver, JsonFileStore, KeyValueStore, SharedState,
    StorageError, KEY_CAPTURED_URLS,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::tempdir;

#[test]
fn json_store_survives_reopen() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");

    let state = SharedState::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert!(state.record_url("https://x.odrmediaclips.cachefly.net/1.mp3").unwrap());
    assert!(!state.record_url("https://x.odrmediaclips.cachefly.net/1.mp3").unwrap());
    state.save_book(&BookMetadata::new("T", "A")).unwrap();

    let reopened = SharedState::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert_eq!(
        reopened.captured_urls().unwrap().into_vec(),
        vec!["https://x.odrmediaclips.cachefly.net/1.mp3".to_string()]
    );
    assert_eq!(reopened.book().unwrap(), BookMetadata::new("T", "A"));

    let on_disk: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(on_disk["bookTitle"], json!("T"));
    assert_eq!(on_disk["authorName"], json!("A"));
    assert_eq!(on_disk["capturedURLs"].as_array().map(Vec::len), Some(1));
}

#[test]
fn separate_stores_on_one_file_keep_each_others_keys() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    let observer = SharedState::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    let panel = SharedState::new(Arc::new(JsonFileStore::open(&path).unwrap()));

    panel.save_book(&BookMetadata::new("T", "A")).unwrap();
    observer
        .record_url("https://x.odrmediaclips.cachefly.net/1.mp3")
        .unwrap();

    assert_eq!(observer.book().unwrap(), BookMetadata::new("T", "A"));
    assert_eq!(panel.captured_urls().unwrap().len(), 1);

    let reopened = SharedState::new(Arc::new(JsonFileStore::open(&path).unwrap()));
    assert_eq!(reopened.book().unwrap(), BookMetadata::new("T", "A"));
    assert_eq!(
        reopened.captured_urls().unwrap().into_vec(),
        vec!["https://x.odrmediaclips.cachefly.net/1.mp3".to_string()]
    );
}

#[test]
fn missing_file_is_an_empty_store() {
    let dir = tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("absent.json")).unwrap();
    assert_eq!(store.get(KEY_CAPTURED_URLS).unwrap(), None);
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "[1, 2").unwrap();

    let err = JsonFileStore::open(&path).unwrap_err();
    assert!(matches!(err, StorageError::Corrupt { .. }));
}

#[test]
fn title_observation_follows_stored_title() {
    let state = SharedState::in_memory();
    state.save_book(&BookMetadata::new("", "A")).unwrap();

    assert_eq!(state.observe_title("Book One").unwrap(), TitleUpdate::Seeded);
    assert_eq!(state.observe_title("").unwrap(), TitleUpdate::Ignored);
    assert_eq!(state.observe_title("Book One").unwrap(), TitleUpdate::Unchanged);
    assert_eq!(state.author().unwrap(), "A");

    let update = state.observe_title("Book Two").unwrap();
    assert!(update.author_invalidated());
    assert_eq!(state.book().unwrap(), BookMetadata::new("Book Two", ""));
}

#[test]
fn clearing_keeps_metadata() {
    let state = SharedState::in_memory();
    state.record_url("u1").unwrap();
    state.save_book(&BookMetadata::new("T", "A")).unwrap();

    state.clear_urls().unwrap();

    assert!(state.captured_urls().unwrap().is_empty());
    assert_eq!(state.book().unwrap(), BookMetadata::new("T", "A"));
}

#[tokio::test]
async fn directory_saver_writes_sanitized_files() {
    let dir = tempdir().unwrap();
    let saver = DirectorySaver::new(dir.path().join("downloads"));

    let task = saver.begin_save("AC/DC: Live - Part 1.mp3", bytes::Bytes::from_static(b"mp3"));
    let path = finish_save(task).await.unwrap();

    assert_eq!(path.file_name().unwrap(), "AC_DC_ Live - Part 1.mp3");
    assert_eq!(fs::read(&path).unwrap(), b"mp3");
}
