use std::io;
use std::path::PathBuf;

use bytes::Bytes;
use tokio::task::JoinHandle;

use crate::filename::safe_filename;
use crate::persist::{AtomicFileWriter, PersistError};

pub type SaveTask = JoinHandle<Result<PathBuf, PersistError>>;

/// The platform's "save as" affordance.
pub trait FileSaver: Send + Sync {
    /// Starts saving `payload` under `filename`. The payload handle is shared
    /// with the caller, which releases its own reference independently.
    fn begin_save(&self, filename: &str, payload: Bytes) -> SaveTask;
}

/// Saves into a fixed download directory.
#[derive(Debug, Clone)]
pub struct DirectorySaver {
    writer: AtomicFileWriter,
}

impl DirectorySaver {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            writer: AtomicFileWriter::new(dir),
        }
    }
}

impl FileSaver for DirectorySaver {
    fn begin_save(&self, filename: &str, payload: Bytes) -> SaveTask {
        let writer = self.writer.clone();
        let filename = safe_filename(filename);
        tokio::task::spawn_blocking(move || writer.write(&filename, &payload))
    }
}

/// Waits for a save task, folding a panicked or cancelled task into an IO error.
pub async fn finish_save(task: SaveTask) -> Result<PathBuf, PersistError> {
    match task.await {
        Ok(result) => result,
        Err(err) => Err(PersistError::Io(io::Error::other(err.to_string()))),
    }
}
