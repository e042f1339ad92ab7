//!
//! src/sync.rs  Andrew Belles  Oct 18th, 2026
//!
//! Incremental sync of one partition. The source only pages newest first,
//! so new data ends at the first entry not newer than what the store
//! already holds; everything past that point was saved by an earlier run.
//!

use tracing::{debug, info, warn};

use crate::errors::{BackupError, SyncFailure};
use crate::fetch::PagedSource;
use crate::normalize::{normalize, parse_page};
use crate::persistent::ScrobbleStore;
use crate::types::Partition;

/// Counters for one partition run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub processed: u64,
    pub stored: u64,
    pub pages: u32
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// ignore the stored boundary and walk every page
    pub force_full_resync: bool,
    /// drop the partition table before syncing
    pub drop: bool
}

pub struct Syncer<'a> {
    source: &'a dyn PagedSource,
    store: &'a dyn ScrobbleStore
}

impl<'a> Syncer<'a> {
    pub fn new(source: &'a dyn PagedSource, store: &'a dyn ScrobbleStore) -> Self {
        Self { source, store }
    }

    pub async fn sync(&self, partition: &Partition, opts: SyncOptions) ->
        Result<SyncReport, SyncFailure> {
        let mut report = SyncReport::default();
        match self.run(partition, opts, &mut report).await {
            Ok(()) => Ok(report),
            Err(source) => {
                warn!(
                    partition = %partition, processed = report.processed,
                    stored = report.stored, error = %source, "sync.abort"
                );
                Err(SyncFailure { report, source })
            }
        }
    }

    async fn run(&self, partition: &Partition, opts: SyncOptions, report: &mut SyncReport)
        -> Result<(), BackupError> {
        self.store.prepare(partition, opts.drop).await?;

        let boundary = if opts.force_full_resync {
            0
        } else {
            self.store.max_timestamp(partition).await?.unwrap_or(0)
        };

        let kind = partition.kind;
        let first = self.source.fetch_page(&partition.username, kind, 1).await?;
        let mut page = parse_page(&first, kind)?;
        let total_pages = page.total_pages;

        info!(
            partition = %partition, boundary, total_pages,
            force = opts.force_full_resync, "sync.start"
        );

        let mut page_no = 1_u32;
        loop {
            report.pages = page_no;

            // entries past the boundary are never looked at, malformed or not
            let mut hit_boundary = false;
            for entry in &page.entries {
                let Some(scrobble) = normalize(entry, kind)? else { continue };
                if scrobble.timestamp <= boundary {
                    hit_boundary = true;
                    break;
                }
                if self.store.insert_if_absent(partition, &scrobble).await? {
                    report.stored += 1;
                }
                report.processed += 1;
            }

            info!(
                partition = %partition, page = page_no, total_pages,
                processed = report.processed, stored = report.stored, "sync.page"
            );

            if hit_boundary {
                info!(partition = %partition, page = page_no, "sync.boundary");
                break;
            }
            if page_no >= total_pages {
                break;
            }

            page_no += 1;
            debug!(partition = %partition, page = page_no, "sync.fetch");
            let body = self.source.fetch_page(&partition.username, kind, page_no).await?;
            page = parse_page(&body, kind)?;
        }

        info!(
            partition = %partition, processed = report.processed,
            stored = report.stored, pages = report.pages, "sync.done"
        );
        Ok(())
    }
}
