use std::path::PathBuf;

use serde::Serialize;
use tokio::io::AsyncWriteExt;

use weather_station_common::error::RemoteError;
use weather_station_common::remote::{RemoteStore, RemoteWrite};

/// One line of the journal.
#[derive(Serialize)]
struct Entry<'a> {
    #[serde(flatten)]
    write: &'a RemoteWrite,
    /// When the write reached the store; the value of a timestamp marker.
    received_at: String,
}

/// Stands in for the remote key/value store by appending every write to a
/// JSON-lines file.
#[derive(Clone, Debug)]
pub struct JournalStore {
    path: PathBuf,
}

impl JournalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RemoteStore for JournalStore {
    fn is_ready(&self) -> bool {
        self.path.parent().map_or(true, |dir| dir.is_dir())
    }

    async fn apply(&mut self, write: &RemoteWrite) -> Result<(), RemoteError> {
        let entry = Entry {
            write,
            received_at: chrono::Utc::now().to_rfc3339(),
        };
        let mut line =
            serde_json::to_string(&entry).map_err(|e| RemoteError::Rejected(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
