use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use tracing::info;

use crate::catalog::Catalog;
use crate::history::DownloadLog;

static ILLEGAL_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[\\/:*?"<>|]"#).unwrap());

/// Replaces characters that are not allowed in Windows folder names with `_`.
pub fn sanitize_folder_name(name: &str) -> String {
    ILLEGAL_CHARS.replace_all(name, "_").into_owned()
}

/// One album waiting to be downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// Artist name as written in the catalog; used as the log key.
    pub artist: String,
    /// Album name as written in the catalog; used as the log key.
    pub album: String,
    pub dir: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoUrl,
    AlreadyDownloaded,
    /// Listed more than once in the same catalog.
    Duplicate,
}

#[derive(Debug, Default)]
pub struct Plan {
    pub tasks: Vec<DownloadTask>,
    pub skipped: Vec<(String, SkipReason)>,
}

/// Turns a catalog into download tasks, leaving out albums without a URL, albums
/// the log already knows about and repeated entries.
pub fn plan(catalog: &Catalog, log: &DownloadLog, root: &Path) -> anyhow::Result<Plan> {
    let artist = &catalog.artist_name;
    let artist_dir = root.join(sanitize_folder_name(artist));
    let mut plan = Plan::default();
    let mut queued: HashSet<&str> = HashSet::new();

    for album in &catalog.albums {
        let url = match &album.url {
            Some(url) => url,
            None => {
                debug!(artist, album = album.name, "No URL, skipping");
                plan.skipped.push((album.name.clone(), SkipReason::NoUrl));
                continue;
            }
        };

        if log.contains(artist, &album.name)? {
            info!(artist, album = album.name, "Already downloaded");
            plan.skipped
                .push((album.name.clone(), SkipReason::AlreadyDownloaded));
            continue;
        }

        if !queued.insert(&album.name) {
            debug!(artist, album = album.name, "Listed twice, skipping");
            plan.skipped.push((album.name.clone(), SkipReason::Duplicate));
            continue;
        }

        plan.tasks.push(DownloadTask {
            artist: artist.clone(),
            album: album.name.clone(),
            dir: artist_dir.join(sanitize_folder_name(&album.name)),
            url: url.clone(),
        });
    }

    Ok(plan)
}
