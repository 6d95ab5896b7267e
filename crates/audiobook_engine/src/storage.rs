//! Persisted key/value state shared by all contexts.
//!
//! The store is the only consistency point between contexts. Every
//! read-modify-write in this process goes through [`SharedState`], which
//! serializes them behind one lock so local updates are never lost.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use audiobook_core::{BookMetadata, CapturedUrls, TitleUpdate};
use serde_json::Value;

use crate::persist::{AtomicFileWriter, PersistError};

pub const KEY_CAPTURED_URLS: &str = "capturedURLs";
pub const KEY_BOOK_TITLE: &str = "bookTitle";
pub const KEY_AUTHOR_NAME: &str = "authorName";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("failed to read store {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("store {path:?} is not a JSON object: {message}")]
    Corrupt { path: PathBuf, message: String },
    #[error("failed to write store: {0}")]
    Write(#[from] PersistError),
    #[error("failed to encode value for {key}: {message}")]
    Encode { key: String, message: String },
}

/// Backing storage. Values are JSON, keys are the fixed names above.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    /// Writes all entries together.
    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<(), StorageError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<(), StorageError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            values.insert(key.to_string(), value);
        }
        Ok(())
    }
}

/// Whole store kept as one JSON object on disk, rewritten atomically.
///
/// The file is the source of truth: reads go to disk and writes merge only
/// their own keys into the current document, so several processes sharing
/// one file keep each other's keys.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    writer: AtomicFileWriter,
    file_name: String,
    turn: Mutex<()>,
}

impl JsonFileStore {
    /// Opens `path`, treating a missing file as an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        load_object(&path)?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".audiobook_state.json".to_string());
        Ok(Self {
            writer: AtomicFileWriter::new(dir),
            file_name,
            path,
            turn: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn load_object(path: &Path) -> Result<BTreeMap<String, Value>, StorageError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(source) => {
            return Err(StorageError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text).map_err(|err| StorageError::Corrupt {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let _turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(load_object(&self.path)?.remove(key))
    }

    fn set_many(&self, entries: Vec<(&str, Value)>) -> Result<(), StorageError> {
        let _turn = self.turn.lock().unwrap_or_else(PoisonError::into_inner);
        let mut values = load_object(&self.path)?;
        for (key, value) in entries {
            values.insert(key.to_string(), value);
        }
        let encoded = serde_json::to_vec_pretty(&values).map_err(|err| StorageError::Encode {
            key: "*".to_string(),
            message: err.to_string(),
        })?;
        self.writer.write(&self.file_name, &encoded)?;
        Ok(())
    }
}

/// Typed accessor over the persisted keys.
#[derive(Clone)]
pub struct SharedState {
    store: Arc<dyn KeyValueStore>,
    queue: Arc<Mutex<()>>,
}

impl SharedState {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            queue: Arc::new(Mutex::new(())),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    fn serialize(&self) -> MutexGuard<'_, ()> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn captured_urls(&self) -> Result<CapturedUrls, StorageError> {
        Ok(match self.store.get(KEY_CAPTURED_URLS)? {
            Some(value) => serde_json::from_value(value).unwrap_or_default(),
            None => CapturedUrls::new(),
        })
    }

    /// Appends `url` if new and persists the list. Returns whether it was added.
    pub fn record_url(&self, url: &str) -> Result<bool, StorageError> {
        let _turn = self.serialize();
        let mut urls = self.captured_urls()?;
        if !urls.insert(url) {
            return Ok(false);
        }
        self.store
            .set_many(vec![(KEY_CAPTURED_URLS, encode(KEY_CAPTURED_URLS, &urls)?)])?;
        Ok(true)
    }

    pub fn clear_urls(&self) -> Result<(), StorageError> {
        let _turn = self.serialize();
        self.store
            .set_many(vec![(KEY_CAPTURED_URLS, Value::Array(Vec::new()))])
    }

    pub fn book(&self) -> Result<BookMetadata, StorageError> {
        Ok(BookMetadata {
            title: self.string(KEY_BOOK_TITLE)?,
            author: self.string(KEY_AUTHOR_NAME)?,
        })
    }

    pub fn author(&self) -> Result<String, StorageError> {
        self.string(KEY_AUTHOR_NAME)
    }

    pub fn save_book(&self, book: &BookMetadata) -> Result<(), StorageError> {
        let _turn = self.serialize();
        self.store.set_many(vec![
            (KEY_BOOK_TITLE, Value::String(book.title.clone())),
            (KEY_AUTHOR_NAME, Value::String(book.author.clone())),
        ])
    }

    /// Feeds a page title into the stored metadata, clearing the author on change.
    pub fn observe_title(&self, page_title: &str) -> Result<TitleUpdate, StorageError> {
        let _turn = self.serialize();
        let mut book = self.book()?;
        let update = book.observe_title(page_title);
        match &update {
            TitleUpdate::Ignored | TitleUpdate::Unchanged => {}
            TitleUpdate::Seeded => self
                .store
                .set_many(vec![(KEY_BOOK_TITLE, Value::String(book.title))])?,
            TitleUpdate::Changed { .. } => self.store.set_many(vec![
                (KEY_AUTHOR_NAME, Value::String(String::new())),
                (KEY_BOOK_TITLE, Value::String(book.title)),
            ])?,
        }
        Ok(update)
    }

    fn string(&self, key: &str) -> Result<String, StorageError> {
        Ok(match self.store.get(key)? {
            Some(Value::String(text)) => text,
            _ => String::new(),
        })
    }
}

fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<Value, StorageError> {
    serde_json::to_value(value).map_err(|err| StorageError::Encode {
        key: key.to_string(),
        message: err.to_string(),
    })
}
