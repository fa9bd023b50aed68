use std::io;

/// A failed step while appending to the daily log.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("could not create folder {path}")]
    CreateFolder {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not create file {path}")]
    CreateFile {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not open {path} for append")]
    Open {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("could not write to {path}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// A remote write the publisher could not deliver.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("remote store is not ready")]
    NotReady,
    #[error("remote store I/O failed")]
    Io(#[from] io::Error),
    #[error("remote store rejected the write: {0}")]
    Rejected(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read config file")]
    Io(#[from] io::Error),
    #[error("could not parse config")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
