//! Harvest - Gmail thread and attachment exporter
//!
//! Lists every thread in the mailbox with a pool of concurrent fetch workers,
//! writes the discovered thread IDs, then exports allow-listed attachments
//! and per-thread metadata into the output directory.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use mail::{
    ExportStore, FileExportStore, GMAIL_READONLY_SCOPE, GmailAuth, GmailClient, GmailCredentials,
    HarvestSettings, ThreadFetcher, export_threads,
};

#[derive(Parser, Debug)]
#[command(name = "harvest", about = "Export Gmail threads and their attachments")]
struct Cli {
    /// Directory receiving thread_ids.json, metadata and attachments
    #[arg(long, default_value = "./output")]
    output: PathBuf,

    /// OAuth client secret file (Google Cloud Console format)
    #[arg(long)]
    client_secret: Option<PathBuf>,

    /// Stored OAuth token file [default: <config dir>/gmail-tokens.json]
    #[arg(long)]
    token: Option<PathBuf>,

    /// Threads requested per listing call
    #[arg(long)]
    page_size: Option<u32>,

    /// Concurrent fetch workers
    #[arg(long)]
    workers: Option<usize>,

    /// Attempt budget per API call
    #[arg(long)]
    max_retries: Option<u32>,

    /// Abort the fetch when any pagination branch fails
    #[arg(long)]
    fail_fast: bool,

    /// Concurrent export workers
    #[arg(long)]
    export_workers: Option<usize>,

    /// Only list thread IDs, skip the attachment export
    #[arg(long)]
    ids_only: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the settings file
    fn apply(&self, settings: &mut HarvestSettings) {
        if let Some(page_size) = self.page_size {
            settings.fetch.page_size = page_size;
        }
        if let Some(workers) = self.workers {
            settings.fetch.workers = workers;
        }
        if let Some(max_retries) = self.max_retries {
            settings.fetch.max_retries = max_retries;
            settings.export.max_retries = max_retries;
        }
        if self.fail_fast {
            settings.fetch.fail_fast = true;
        }
        if let Some(export_workers) = self.export_workers {
            settings.export.export_workers = export_workers;
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    // Bootstrap config directory
    if let Err(e) = config::init() {
        warn!("Failed to initialize config directory: {}", e);
    }

    let mut settings = HarvestSettings::load()?;
    cli.apply(&mut settings);

    let credentials = match &cli.client_secret {
        Some(path) => GmailCredentials::from_file(path)?,
        None => GmailCredentials::load().map_err(|e| {
            if let Some(path) = GmailCredentials::default_credentials_path() {
                warn!(
                    "To configure Gmail access, either:\n\
                     1. Pass --client-secret <file>\n\
                     2. Place your Google OAuth credentials at: {}\n\
                     3. Or set environment variables: GMAIL_CLIENT_ID and GMAIL_CLIENT_SECRET",
                    path.display()
                );
            }
            e
        })?,
    };

    let token_path = match &cli.token {
        Some(path) => path.clone(),
        None => GmailAuth::default_token_path()?,
    };
    let auth = GmailAuth::new(
        credentials,
        token_path,
        vec![GMAIL_READONLY_SCOPE.to_string()],
    );
    let client = GmailClient::new(auth);
    client
        .authenticate()
        .context("Gmail authentication failed")?;
    info!("Authenticated with Gmail");

    let store = FileExportStore::new(&cli.output);
    store.prepare()?;

    let thread_ids = ThreadFetcher::new(&client, settings.fetch.clone()).fetch_all()?;
    store.write_thread_index(&thread_ids)?;
    info!(
        "Wrote {} thread IDs to {}",
        thread_ids.len(),
        store.thread_index_path().display()
    );

    if cli.ids_only {
        return Ok(());
    }

    let stats = export_threads(&client, &store, &thread_ids, &settings.export)?;
    info!(
        "Harvest finished: {} threads, {} messages with attachments, {} attachments saved to {}, {} errors",
        stats.threads_processed,
        stats.messages_with_attachments,
        stats.attachments_saved,
        store.attachments_dir().display(),
        stats.errors
    );

    Ok(())
}
