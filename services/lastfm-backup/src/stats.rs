//!
//! src/stats.rs  Andrew Belles  Oct 18th, 2026
//!
//! Summary statistics over the stored partitions of a user
//!

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Local, TimeZone};

use crate::errors::BackupError;
use crate::persistent::{require_synced, ScrobbleStore};
use crate::types::{Partition, Scrobble, ScrobbleType, Username};

/// Distinct value counts. Empty strings count as a value of their own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecentStats {
    pub total: usize,
    pub artists: usize,
    pub artist_mbids: usize,
    pub tracks: usize,
    pub track_mbids: usize,
    pub albums: usize,
    pub album_mbids: usize,
    pub first: Option<Scrobble>,
    pub last: Option<Scrobble>
}

impl RecentStats {
    /// `rows` in any order
    pub fn from_rows(rows: &[Scrobble]) -> Self {
        fn distinct<'a>(rows: &'a [Scrobble], f: impl Fn(&'a Scrobble) -> &'a str) -> usize {
            rows.iter().map(f).collect::<HashSet<_>>().len()
        }

        Self {
            total: rows.len(),
            artists: distinct(rows, |s| s.artist.as_str()),
            artist_mbids: distinct(rows, |s| s.artist_mbid.as_str()),
            tracks: distinct(rows, |s| s.track.as_str()),
            track_mbids: distinct(rows, |s| s.track_mbid.as_str()),
            albums: distinct(rows, |s| s.album.as_str()),
            album_mbids: distinct(rows, |s| s.album_mbid.as_str()),
            first: rows.iter().min_by_key(|s| s.timestamp).cloned(),
            last: rows.iter().max_by_key(|s| s.timestamp).cloned()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionStats {
    Recent(RecentStats),
    Loved { total: i64 }
}

#[derive(Debug, Clone)]
pub struct StatsReport {
    pub username: Username,
    pub partitions: Vec<PartitionStats>
}

/// Gather stats for every requested type of `username`
pub async fn stats(
    store: &dyn ScrobbleStore,
    username: &Username,
    kinds: &[ScrobbleType]
) -> Result<StatsReport, BackupError> {
    let mut partitions = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let partition = Partition::new(username.clone(), *kind);
        require_synced(store, &partition).await?;

        let entry = match kind {
            ScrobbleType::Recent => {
                let rows = store.scan_desc(&partition).await?;
                PartitionStats::Recent(RecentStats::from_rows(&rows))
            },
            ScrobbleType::Loved => PartitionStats::Loved {
                total: store.count(&partition).await?
            }
        };
        partitions.push(entry);
    }

    Ok( StatsReport { username: username.clone(), partitions } )
}

fn local_date(ts: i64) -> String {
    match Local.timestamp_opt(ts, 0).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => DateTime::from_timestamp(ts, 0)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| ts.to_string())
    }
}

fn write_scrobble(f: &mut fmt::Formatter<'_>, label: &str, s: &Scrobble) -> fmt::Result {
    writeln!(f, "\t{label}:")?;
    writeln!(f, "\t\tdate: {}", local_date(s.timestamp))?;
    writeln!(f, "\t\tartist: {}", s.artist)?;
    writeln!(f, "\t\ttrack: {}", s.track)?;
    writeln!(f, "\t\talbum: {}", s.album)
}

impl fmt::Display for StatsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "[{}]", self.username)?;
        for entry in &self.partitions {
            match entry {
                PartitionStats::Recent(r) => {
                    writeln!(f, "\tscrobbles: {}", r.total)?;
                    writeln!(f, "\tartists: {} (MBIDs: {})", r.artists, r.artist_mbids)?;
                    writeln!(f, "\ttracks: {} (MBIDs: {})", r.tracks, r.track_mbids)?;
                    writeln!(f, "\talbums: {} (MBIDs: {})", r.albums, r.album_mbids)?;
                    if let Some(first) = &r.first {
                        write_scrobble(f, "first scrobble", first)?;
                    }
                    if let Some(last) = &r.last {
                        write_scrobble(f, "last scrobble", last)?;
                    }
                },
                PartitionStats::Loved { total } => {
                    writeln!(f, "\tloved tracks: {total}")?;
                }
            }
        }
        Ok(())
    }
}
