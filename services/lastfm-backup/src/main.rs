//!
//! src/main.rs  Andrew Belles  Oct 18, 2026
//!
//! Entry point of the last.fm backup: parses the request, wires the
//! client and the store together and dispatches sync, export or stats
//!
//!

mod cli;
mod config;
mod errors;
mod logging;

mod fetch;
mod normalize;
mod persistent;
mod retry;
mod types;

mod export;
mod stats;
mod sync;

use clap::Parser;
use tracing::{error, info};

use crate::cli::{Action, Request};
use crate::config::AppConfig;
use crate::errors::BackupError;
use crate::persistent::Persistent;
use crate::sync::SyncOptions;
use crate::types::Partition;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), BackupError> {
    let request  = cli::Cli::parse().into_request()?;
    let mut cfgs = config::load_config()?;
    cfgs.persistence.db_path = request.db.clone();

    let _logger = logging::init_logging(&cfgs.logging)?;

    info!(
        service = "lastfm-backup",
        version = %env!("CARGO_PKG_VERSION"),
        user = %request.username,
        db = %cfgs.persistence.db_path.display(),
        "starting"
    );

    let db = Persistent::init(&cfgs.persistence.db_url()).await?;
    let outcome = run(&cfgs, &request, &db).await;
    db.close().await;
    outcome
}

async fn run(cfgs: &AppConfig, request: &Request, db: &Persistent) -> Result<(), BackupError> {
    match &request.action {
        Action::Export { path, separator } => {
            let kind = request.kinds.first().copied().ok_or_else(|| {
                BackupError::InvalidInput("no scrobble type selected".to_string())
            })?;
            let partition = Partition::new(request.username.clone(), kind);
            export::export_to_path(db, &partition, separator, path).await?;
        },
        Action::Stats => {
            let report = stats::stats(db, &request.username, &request.kinds).await?;
            print!("{report}");
        },
        Action::Sync(opts) => sync_all(cfgs, request, db, *opts).await?
    }
    Ok(())
}

/// Syncs each requested partition in turn. A failed partition is logged and
/// does not stop the others; the last failure becomes the exit error.
async fn sync_all(
    cfgs: &AppConfig,
    request: &Request,
    db: &Persistent,
    opts: SyncOptions
) -> Result<(), BackupError> {
    let client = fetch::LastFmClient::new(&cfgs.http, &cfgs.lastfm)?;
    let syncer = sync::Syncer::new(&client, db);

    let mut last_error = None;
    for kind in &request.kinds {
        let partition = Partition::new(request.username.clone(), *kind);
        match syncer.sync(&partition, opts).await {
            Ok(report) => info!(
                partition = %partition, processed = report.processed,
                stored = report.stored, "backup.partition.done"
            ),
            Err(failure) => {
                error!(partition = %partition, error = %failure, "backup.partition.failed");
                last_error = Some(failure.source);
            }
        }
    }

    match last_error {
        Some(e) => Err(e),
        None => Ok(())
    }
}
