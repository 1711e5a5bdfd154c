use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

pub mod catalog;
pub mod dispatch;
pub mod fetch;
pub mod history;
pub mod plan;
pub mod spotify;

pub use catalog::Album;
pub use catalog::Catalog;
pub use dispatch::Report;
pub use dispatch::TaskOutcome;
pub use fetch::CommandFetcher;
pub use fetch::FetchOutcome;
pub use fetch::Fetcher;
pub use history::DownloadLog;

use dispatch::Dispatcher;

const DEFAULT_JOBS: usize = 4;

pub struct Downloader<F = CommandFetcher> {
    /// Root directory; albums land in `<dest>/<artist>/<album>`.
    dest: PathBuf,

    /// JSON file remembering which albums are already downloaded.
    log_file: PathBuf,

    /// Number of albums downloaded at the same time.
    jobs: usize,

    fetcher: F,
}

impl Downloader {
    pub fn builder() -> DownloaderBuilder {
        DownloaderBuilder::default()
    }
}

impl<F: Fetcher> Downloader<F> {
    pub fn download_catalog(&self, catalog: &Catalog) -> anyhow::Result<Report> {
        fs::create_dir_all(&self.dest)
            .with_context(|| format!("Failed to create {}", self.dest.display()))?;
        let log = DownloadLog::load(&self.log_file)?;
        info!(
            log = %log.path().display(),
            artist = catalog.artist_name,
            logged = log.albums(&catalog.artist_name)?.len(),
            "Loaded download log"
        );

        let plan = plan::plan(catalog, &log, &self.dest)?;
        info!(
            artist = catalog.artist_name,
            queued = plan.tasks.len(),
            skipped = plan.skipped.len(),
            "Planned downloads"
        );

        Dispatcher::new(self.jobs, &self.fetcher, &log).run(plan.tasks)
    }
}

#[derive(Debug)]
pub struct DownloaderBuilder<F = CommandFetcher> {
    dest: PathBuf,
    log_file: PathBuf,
    jobs: usize,
    fetcher: F,
}

impl<F> DownloaderBuilder<F> {
    pub fn dest<P: Into<PathBuf>>(mut self, dest: P) -> Self {
        self.dest = dest.into();
        self
    }

    pub fn log_file<P: Into<PathBuf>>(mut self, log_file: P) -> Self {
        self.log_file = log_file.into();
        self
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn fetcher<G: Fetcher>(self, fetcher: G) -> DownloaderBuilder<G> {
        DownloaderBuilder {
            dest: self.dest,
            log_file: self.log_file,
            jobs: self.jobs,
            fetcher,
        }
    }

    pub fn build(self) -> Downloader<F> {
        Downloader {
            dest: self.dest,
            log_file: self.log_file,
            jobs: self.jobs,
            fetcher: self.fetcher,
        }
    }
}

impl Default for DownloaderBuilder {
    fn default() -> Self {
        Self {
            dest: PathBuf::from("music"),
            log_file: PathBuf::from("downloaded_log.json"),
            jobs: DEFAULT_JOBS,
            fetcher: CommandFetcher::default(),
        }
    }
}
