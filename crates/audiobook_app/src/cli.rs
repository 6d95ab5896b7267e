//! Command-line front end. Each command opens the panel against a fresh
//! observer session that shares the persisted store.
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use audiobook_core::{Msg, PanelViewModel};
use audiobook_engine::load_har;
use clap::{Parser, Subcommand};
use log::LevelFilter;
use relay_logging::{relay_info, LogDestination};

use crate::platform::config::AppConfig;
use crate::platform::panel::Panel;
use crate::platform::session::Session;

#[derive(Debug, Parser)]
#[command(name = "audiobook")]
#[command(about = "Capture, tag and save audiobook chapters", long_about = None)]
pub struct Cli {
    /// RON configuration file (default ./audiobook.ron).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// More log output; repeat for trace.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show the captured URL count and the book metadata.
    Status,

    /// Forget all captured URLs.
    Clear,

    /// Edit the book title and/or author used for naming and tagging.
    Meta {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        author: Option<String>,
    },

    /// Feed the requests of a HAR capture through the media filter.
    ImportHar {
        /// Path to the HAR file.
        path: PathBuf,
    },

    /// Download every captured URL as `{title} - Part {n}.mp3`.
    Download,

    /// Open the reader in Chromium and walk the chapters to capture URLs.
    #[cfg(feature = "chromium")]
    Capture {
        /// Page to open instead of the configured reader URL.
        #[arg(long)]
        url: Option<String>,
        /// Chromium profile directory (keeps the library login).
        #[arg(long, value_name = "DIR")]
        profile: Option<PathBuf>,
        /// Seconds to wait for the player before pressing play.
        #[arg(long, default_value = "10")]
        wait_secs: u64,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config = AppConfig::load(self.config.as_deref())?;
        init_logging(&config, self.verbose);

        let session = Session::start(&config)?;
        match self.command {
            Command::Status => {
                let panel = open_panel(&session).await;
                print_view(&panel.view());
            }
            Command::Clear => {
                let mut panel = open_panel(&session).await;
                panel.dispatch(Msg::ClearClicked);
                panel.settle().await;
                print_view(&panel.view());
            }
            Command::Meta { title, author } => {
                let mut panel = open_panel(&session).await;
                if let Some(title) = title {
                    panel.dispatch(Msg::TitleEdited(title));
                }
                if let Some(author) = author {
                    panel.dispatch(Msg::AuthorEdited(author));
                }
                panel.settle().await;
                print_view(&panel.view());
            }
            Command::ImportHar { path } => {
                let events =
                    load_har(&path).with_context(|| format!("importing {}", path.display()))?;
                let added = events
                    .iter()
                    .filter(|event| session.observer.on_request(event))
                    .count();
                println!(
                    "Captured {added} new media URLs from {} requests",
                    events.len()
                );
                let panel = open_panel(&session).await;
                print_view(&panel.view());
            }
            Command::Download => {
                session.attach_reader(&config);
                let mut panel = open_panel(&session).await;
                panel.dispatch(Msg::DownloadClicked);
                panel.settle().await;
                let view = panel.view();
                print_view(&view);
                if !view.status.starts_with("Successfully") {
                    bail!("{}", view.status);
                }
                relay_info!("Files saved to {}", config.output_dir.display());
            }
            #[cfg(feature = "chromium")]
            Command::Capture {
                url,
                profile,
                wait_secs,
            } => {
                use crate::platform::chromium::ChromiumSession;

                session.observer.on_installed();
                let url = url.unwrap_or_else(|| config.reader_url.clone());
                let browser = ChromiumSession::launch(session.host.clone(), &url, profile).await?;
                tokio::time::sleep(std::time::Duration::from_secs(wait_secs)).await;

                let mut panel = open_panel(&session).await;
                panel.dispatch(Msg::CaptureClicked);
                panel.settle().await;
                panel.dispatch(Msg::CountRefreshed(
                    session.store.captured_urls()?.len(),
                ));
                print_view(&panel.view());
                browser.close().await;
            }
        }
        Ok(())
    }
}

async fn open_panel(session: &Session) -> Panel {
    Panel::open(
        session.endpoint.clone(),
        session.store.clone(),
        session.observer.subscribe(),
    )
    .await
}

fn init_logging(config: &AppConfig, verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let destination = match &config.log_file {
        Some(path) => LogDestination::Both(path.clone()),
        None => LogDestination::Terminal,
    };
    relay_logging::initialize(destination, level);
}

fn print_view(view: &PanelViewModel) {
    println!("Title:  {}", view.title);
    println!("Author: {}", view.author);
    println!("{}", view.capture_status);
    if !view.status.is_empty() {
        println!("{}", view.status);
    }
}
