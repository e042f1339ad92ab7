//!
//! src/cli.rs  Andrew Belles  Oct 18th, 2026
//!
//! Command line surface. Everything is validated here, before any
//! network or database work, and turned into an immutable `Request`.
//!

use std::path::PathBuf;

use clap::Parser;

use crate::config::DEFAULT_DB_PATH;
use crate::errors::BackupError;
use crate::export::DEFAULT_SEPARATOR;
use crate::sync::SyncOptions;
use crate::types::{ScrobbleType, Username};

#[derive(Parser, Debug)]
#[command(name = "lastfm-backup", version,
    about = "Incremental backup of a last.fm profile into sqlite")]
pub struct Cli {
    /// SQLite database path
    #[arg(short = 'd', long = "db", env = "LASTFM_BACKUP_DB", default_value = DEFAULT_DB_PATH)]
    pub db: PathBuf,

    /// last.fm user name
    #[arg(short = 'u', long = "user")]
    pub username: String,

    /// Re-download all tracks (don't check for the last stored timestamp)
    #[arg(long)]
    pub force: bool,

    /// Drop the selected data table before scrobble processing
    #[arg(long)]
    pub drop: bool,

    /// Scrobbles (recent tracks)
    #[arg(short = 's', long = "scrobbles", help_heading = "Scrobble type")]
    pub scrobbles: bool,

    /// Loved tracks
    #[arg(short = 'l', long = "loved", help_heading = "Scrobble type")]
    pub loved: bool,

    /// Export the selected table into a separated text file
    #[arg(short = 'e', long = "export", value_name = "FILENAME", help_heading = "Export")]
    pub export: Option<PathBuf>,

    /// Column separator for the export
    #[arg(long, default_value = DEFAULT_SEPARATOR, hide_default_value = true,
        help_heading = "Export")]
    pub separator: String,

    /// Print statistics for the given user and scrobble types
    #[arg(long, help_heading = "Statistics")]
    pub stats: bool
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Sync(SyncOptions),
    Export { path: PathBuf, separator: String },
    Stats
}

#[derive(Debug, Clone)]
pub struct Request {
    pub username: Username,
    pub kinds: Vec<ScrobbleType>,
    pub db: PathBuf,
    pub action: Action
}

impl Cli {
    /// Export wins over stats, stats over sync
    pub fn into_request(self) -> Result<Request, BackupError> {
        let username = Username::parse(&self.username)?;

        let mut kinds = Vec::new();
        if self.scrobbles {
            kinds.push(ScrobbleType::Recent);
        }
        if self.loved {
            kinds.push(ScrobbleType::Loved);
        }
        if kinds.is_empty() {
            return Err(BackupError::InvalidInput(
                "at least one scrobble type must be selected".to_string()
            ));
        }

        let action = if let Some(path) = self.export {
            if kinds.len() > 1 {
                return Err(BackupError::InvalidInput(
                    "only one scrobble type can be selected for export".to_string()
                ));
            }
            if self.separator.is_empty() {
                return Err(BackupError::InvalidInput(
                    "separator must not be empty".to_string()
                ));
            }
            Action::Export { path, separator: self.separator }
        } else if self.stats {
            Action::Stats
        } else {
            Action::Sync(SyncOptions { force_full_resync: self.force, drop: self.drop })
        };

        Ok( Request { username, kinds, db: self.db, action } )
    }
}
