use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::anyhow;
use anyhow::Context;

type Entries = BTreeMap<String, Vec<String>>;

/// Albums already downloaded, keyed by artist and persisted as a JSON object.
///
/// Every [`record`](DownloadLog::record) rewrites the whole file while holding the
/// lock, so concurrent workers never interleave their writes.
#[derive(Debug)]
pub struct DownloadLog {
    path: PathBuf,
    entries: Mutex<Entries>,
}

impl DownloadLog {
    /// Loads the log at `path`. A missing file is an empty log.
    pub fn load<P: Into<PathBuf>>(path: P) -> anyhow::Result<Self> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)
                .with_context(|| format!("Invalid download log {}", path.display()))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Entries::new(),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read download log {}", path.display()))
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, artist: &str, album: &str) -> anyhow::Result<bool> {
        let entries = self.lock()?;
        Ok(entries
            .get(artist)
            .map_or(false, |albums| albums.iter().any(|a| a == album)))
    }

    pub fn albums(&self, artist: &str) -> anyhow::Result<Vec<String>> {
        let entries = self.lock()?;
        Ok(entries.get(artist).cloned().unwrap_or_default())
    }

    /// Adds `album` under `artist` and persists the log before releasing the lock.
    pub fn record(&self, artist: &str, album: &str) -> anyhow::Result<()> {
        let mut entries = self.lock()?;
        let albums = entries.entry(artist.to_owned()).or_default();
        if !albums.iter().any(|a| a == album) {
            albums.push(album.to_owned());
        }
        self.persist(&entries)
    }

    fn persist(&self, entries: &Entries) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write download log {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace download log {}", self.path.display()))?;
        Ok(())
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Entries>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("Download log lock poisoned"))
    }
}
