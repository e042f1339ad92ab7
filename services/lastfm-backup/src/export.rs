//!
//! src/export.rs  Andrew Belles  Oct 18th, 2026
//!
//! Plaintext export of a partition, newest first:
//!   timestamp artist artist_mbid track track_mbid album album_mbid
//!

use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::BackupError;
use crate::persistent::{require_synced, ScrobbleStore};
use crate::types::{Partition, Scrobble};

pub const DEFAULT_SEPARATOR: &str = "\t";

/// One export line, newline included
pub fn export_line(s: &Scrobble, separator: &str) -> String {
    let timestamp = s.timestamp.to_string();
    let columns: [&str; 7] = [
        &timestamp, &s.artist, &s.artist_mbid, &s.track,
        &s.track_mbid, &s.album, &s.album_mbid
    ];
    let mut line = columns.join(separator);
    line.push('\n');
    line
}

/// Write every row of `partition` to `out`. Returns the row count.
pub async fn export<W: Write>(
    store: &dyn ScrobbleStore,
    partition: &Partition,
    separator: &str,
    out: &mut W
) -> Result<usize, BackupError> {
    require_synced(store, partition).await?;
    let rows = store.scan_desc(partition).await?;
    for row in &rows {
        out.write_all(export_line(row, separator).as_bytes())?;
    }
    out.flush()?;
    Ok(rows.len())
}

/// Export into `path`, written to a sibling tempfile first and renamed
/// into place so a failed run never leaves a half written file
pub async fn export_to_path(
    store: &dyn ScrobbleStore,
    partition: &Partition,
    separator: &str,
    path: &Path
) -> Result<usize, BackupError> {
    require_synced(store, partition).await?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from(".")
    };
    fs::create_dir_all(&parent)?;

    let temp = tempfile::NamedTempFile::new_in(&parent)?;
    let count = {
        let mut writer = BufWriter::new(temp.as_file());
        export(store, partition, separator, &mut writer).await?
    };

    temp.persist(path).map_err(|e| e.error)?;
    info!(partition = %partition, rows = count, path = %path.display(), "export.done");
    Ok(count)
}
