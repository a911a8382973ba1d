// FarsiFlix - Persian Streaming Engine
// Copyright (C) 2025 FarsiFlix contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
use farsiflix_core::config::EngineConfig;
use farsiflix_core::download::{DownloadRequest, DownloadStatus};
use farsiflix_core::engine::Engine;
use farsiflix_core::logging;
use farsiflix_core::scrape::{quality_score, ScraperOutcome};
use farsiflix_core::storage::{Database, SqliteDownloadStore};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "farsiflix-cli")]
#[command(about = "FarsiFlix CLI - resolve and download from the command line", long_about = None)]
struct Cli {
    /// JSON config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Download directory (overrides the config file)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the ranked video URLs of a content page
    Resolve {
        page_url: String,
    },
    /// Resolve a page and download its best URL
    Download {
        page_url: String,
        /// Movie id (mutually exclusive with --episode-id)
        #[arg(long, conflicts_with = "episode_id")]
        movie_id: Option<i64>,
        #[arg(long, requires = "series")]
        episode_id: Option<i64>,
        /// Movie title or episode label
        #[arg(short, long)]
        title: String,
        /// Series title for episodes
        #[arg(long)]
        series: Option<String>,
    },
    /// Show stored downloads
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };
    if let Some(dir) = cli.dir {
        config.download.download_directory = dir;
    }

    let db_path = config.download.download_directory.join("farsiflix.db");
    let db = Database::new(&db_path)
        .await
        .with_context(|| format!("opening {}", db_path.display()))?;
    let engine = Engine::new(config, Arc::new(SqliteDownloadStore::new(db))).await?;

    match cli.command {
        Commands::Resolve { page_url } => match engine.resolve(&page_url).await {
            ScraperOutcome::Success { urls } => {
                for url in urls {
                    let flag = if url.low_confidence { " (low confidence)" } else { "" };
                    println!("[{}] {:<8} {}{}", quality_score(&url.quality), url.quality, url.url, flag);
                }
            }
            ScraperOutcome::NetworkError { message } => bail!("network error (retryable): {}", message),
            ScraperOutcome::ParseError { message } => bail!("parse error (retryable): {}", message),
            ScraperOutcome::NoDataFound { message } => bail!("no video: {}", message),
        },
        Commands::Download {
            page_url,
            movie_id,
            episode_id,
            title,
            series,
        } => {
            let request = match (movie_id, episode_id, series) {
                (Some(movie_id), None, _) => DownloadRequest::Movie {
                    movie_id,
                    title,
                    poster_url: None,
                },
                (None, Some(episode_id), Some(series_title)) => DownloadRequest::Episode {
                    episode_id,
                    series_title,
                    episode_info: title,
                    poster_url: None,
                },
                _ => bail!("pass --movie-id, or --episode-id with --series"),
            };
            let id = request.id();

            let queued = engine
                .download_best(&page_url, &request)
                .await
                .map_err(|e| anyhow!("{} ({})", e.user_message(), e))?;
            if !queued {
                println!("{} is already queued", id);
            }

            let mut downloads = engine.all_downloads();
            let mut last_percent = None;
            loop {
                let current = downloads.borrow_and_update().iter().find(|d| d.id == id).cloned();
                let Some(item) = current else {
                    bail!("{} disappeared from the queue", id);
                };

                match item.status {
                    DownloadStatus::Completed => {
                        println!("done: {}", item.file_path);
                        break;
                    }
                    DownloadStatus::Failed => {
                        bail!("failed: {}", item.error_message.unwrap_or_default())
                    }
                    DownloadStatus::Cancelled | DownloadStatus::Paused => {
                        println!("{}: {}", id, item.status);
                        break;
                    }
                    DownloadStatus::Pending | DownloadStatus::Downloading => {
                        if last_percent != Some(item.progress) {
                            last_percent = Some(item.progress);
                            match engine.progress_snapshot(&id).await {
                                Some(p) => println!(
                                    "{:>3}%  {}  eta {}",
                                    item.progress,
                                    p.speed_string(),
                                    p.eta_string()
                                ),
                                None => println!("{:>3}%", item.progress),
                            }
                        }
                    }
                }

                downloads.changed().await.context("download manager stopped")?;
            }
        }
        Commands::List => {
            let items = engine.downloads().list_downloads().await?;
            if items.is_empty() {
                println!("no downloads");
            }
            for item in items {
                println!(
                    "{:<14} {:<11} {:>3}%  {}",
                    item.id,
                    item.status.as_str(),
                    item.progress,
                    item.title
                );
            }
        }
    }

    Ok(())
}
