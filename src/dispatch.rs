use std::fs;
use std::panic;
use std::panic::AssertUnwindSafe;

use anyhow::anyhow;
use anyhow::ensure;
use anyhow::Context;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::fetch::FetchOutcome;
use crate::fetch::Fetcher;
use crate::history::DownloadLog;
use crate::plan::DownloadTask;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The downloader succeeded and the album was recorded in the log.
    Downloaded,
    /// The downloader ran and exited with a non-zero status.
    Failed { code: Option<i32>, stderr: String },
    /// Anything else that went wrong for this task only.
    Errored(String),
}

#[derive(Debug, Default)]
pub struct Report {
    results: Vec<(DownloadTask, TaskOutcome)>,
}

impl Report {
    pub fn downloaded(&self) -> usize {
        self.results
            .iter()
            .filter(|(_, outcome)| *outcome == TaskOutcome::Downloaded)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.downloaded()
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DownloadTask, TaskOutcome)> {
        self.results.iter()
    }
}

/// Runs download tasks on a fixed number of worker threads and records each
/// success in the log as soon as it completes.
pub struct Dispatcher<'a, F> {
    jobs: usize,
    fetcher: &'a F,
    log: &'a DownloadLog,
}

impl<'a, F: Fetcher> Dispatcher<'a, F> {
    pub fn new(jobs: usize, fetcher: &'a F, log: &'a DownloadLog) -> Self {
        Self { jobs, fetcher, log }
    }

    /// Fails only if the worker pool cannot be set up. Task failures end up in the
    /// returned [`Report`].
    pub fn run(&self, tasks: Vec<DownloadTask>) -> anyhow::Result<Report> {
        ensure!(self.jobs > 0, "At least one download job is required");

        let pool = ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .thread_name(|i| format!("download-{}", i))
            .build()?;

        let results = pool.install(|| {
            tasks
                .into_par_iter()
                .with_max_len(1)
                .map(|task| {
                    let outcome = self.run_task(&task);
                    (task, outcome)
                })
                .collect::<Vec<_>>()
        });

        Ok(Report { results })
    }

    fn run_task(&self, task: &DownloadTask) -> TaskOutcome {
        info!(artist = task.artist, album = task.album, "Downloading");

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.download(task)))
            .unwrap_or_else(|_| Err(anyhow!("Downloader panicked")));

        match result {
            Ok(FetchOutcome::Completed) => {
                if let Err(e) = self.log.record(&task.artist, &task.album) {
                    error!(artist = task.artist, album = task.album, "{:#}", e);
                    return TaskOutcome::Errored(format!("{:#}", e));
                }
                info!(artist = task.artist, album = task.album, "Done");
                TaskOutcome::Downloaded
            }
            Ok(FetchOutcome::Failed { code, stderr }) => {
                warn!(
                    artist = task.artist,
                    album = task.album,
                    code = ?code,
                    stderr = %stderr,
                    "Download failed"
                );
                TaskOutcome::Failed { code, stderr }
            }
            Err(e) => {
                error!(artist = task.artist, album = task.album, "{:#}", e);
                TaskOutcome::Errored(format!("{:#}", e))
            }
        }
    }

    fn download(&self, task: &DownloadTask) -> anyhow::Result<FetchOutcome> {
        fs::create_dir_all(&task.dir)
            .with_context(|| format!("Failed to create {}", task.dir.display()))?;
        self.fetcher.fetch(&task.url, &task.dir)
    }
}
