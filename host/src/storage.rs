use std::fs::{self, OpenOptions};
use std::io;
use std::path::PathBuf;

use weather_station_common::devices::{OpenMode, Storage};

/// A storage card backed by a directory on the host.
///
/// Card paths are absolute (`/March_2024/5_March_2024.csv`) and resolve below `root`.
#[derive(Clone, Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
}

impl DirectoryStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for DirectoryStorage {
    fn begin(&mut self) -> bool {
        match fs::create_dir_all(&self.root) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("card directory {} unavailable: {e}", self.root.display());
                false
            }
        }
    }

    fn exists(&mut self, path: &str) -> bool {
        self.resolve(path).exists()
    }

    fn mkdir(&mut self, path: &str) -> io::Result<()> {
        fs::create_dir(self.resolve(path))
    }

    fn open(&mut self, path: &str, mode: OpenMode) -> io::Result<Box<dyn io::Write + Send>> {
        let mut options = OpenOptions::new();
        match mode {
            OpenMode::Write => options.write(true).create(true).truncate(true),
            OpenMode::Append => options.append(true),
        };
        let file = options.open(self.resolve(path))?;
        Ok(Box::new(file))
    }
}

/// A fresh, empty directory under the system temp dir.
#[cfg(test)]
pub(crate) fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "weather-station-{name}-{}-{}",
        std::process::id(),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    let _ = fs::remove_dir_all(&dir);
    dir
}
