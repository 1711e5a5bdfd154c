use std::io;
use std::path::PathBuf;

use anyhow::bail;
use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use discography_downloader_rs::catalog;
use discography_downloader_rs::spotify::Spotify;
use discography_downloader_rs::Catalog;
use discography_downloader_rs::CommandFetcher;
use discography_downloader_rs::Downloader;
use discography_downloader_rs::TaskOutcome;
use tracing::info;

/// Downloads whole discographies with an external downloader (spotDL by default)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Directory holding the catalog JSON files
    #[arg(long, default_value = PathBuf::from("./data").into_os_string())]
    data_dir: PathBuf,

    /// Destination directory; albums are saved to <DEST>/<artist>/<album>
    #[arg(long, default_value = PathBuf::from("./music").into_os_string())]
    dest: PathBuf,

    /// File recording the albums already downloaded
    #[arg(long, default_value = PathBuf::from("./downloaded_log.json").into_os_string())]
    log_file: PathBuf,

    /// Number of albums downloaded at the same time
    #[arg(short, long, default_value_t = 4)]
    jobs: usize,

    /// Downloader program, run inside the album directory with the album URL as last argument
    #[arg(long, default_value = "spotdl")]
    downloader: String,

    /// Extra argument passed to the downloader before the URL (repeatable)
    #[arg(long = "downloader-arg", allow_hyphen_values = true)]
    downloader_args: Vec<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the albums of a catalog (asks which one when CATALOG is omitted)
    Download { catalog: Option<PathBuf> },

    /// Build a catalog from Spotify, save it to the data directory and download it
    Search {
        query: String,

        /// Only write the catalog file
        #[arg(long)]
        catalog_only: bool,

        #[arg(long, env = "SPOTIFY_CLIENT_ID", hide_env_values = true)]
        client_id: String,

        #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let catalog_path = match &args.command {
        None | Some(Command::Download { catalog: None }) => {
            let files = catalog::list_catalogs(&args.data_dir)?;
            let stdin = io::stdin();
            catalog::choose_catalog(&files, stdin.lock(), io::stdout())?
        }
        Some(Command::Download {
            catalog: Some(path),
        }) => path.clone(),
        Some(Command::Search {
            query,
            catalog_only,
            client_id,
            client_secret,
        }) => {
            let spotify = Spotify::builder()
                .credentials(client_id.as_str(), client_secret.as_str())
                .build();
            let catalog = match spotify.catalog(query)? {
                Some(catalog) => catalog,
                None => bail!("No artist found for {:?}", query),
            };
            let path = catalog.save(&args.data_dir)?;
            info!(path = %path.display(), albums = catalog.albums.len(), "Catalog saved");
            if *catalog_only {
                return Ok(());
            }
            path
        }
    };

    let catalog = Catalog::load(&catalog_path)?;

    let fetcher = CommandFetcher::new(&args.downloader).args(&args.downloader_args);
    let downloader = Downloader::builder()
        .dest(&args.dest)
        .log_file(&args.log_file)
        .jobs(args.jobs)
        .fetcher(fetcher)
        .build();

    let report = downloader
        .download_catalog(&catalog)
        .with_context(|| format!("Failed to download {}", catalog_path.display()))?;

    for (task, outcome) in report.iter() {
        match outcome {
            TaskOutcome::Downloaded => println!("[ok]     {} - {}", task.artist, task.album),
            TaskOutcome::Failed { code, .. } => match code {
                Some(code) => println!(
                    "[failed] {} - {} (exit code {})",
                    task.artist, task.album, code
                ),
                None => println!("[failed] {} - {} (terminated)", task.artist, task.album),
            },
            TaskOutcome::Errored(e) => println!("[error]  {} - {}: {}", task.artist, task.album, e),
        }
    }
    println!(
        "\n{} downloaded, {} failed, {} total",
        report.downloaded(),
        report.failed(),
        report.len()
    );

    Ok(())
}
