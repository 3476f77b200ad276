//! A recorded feed: saved page snapshots standing in for a live browser.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use engine_logging::engine_info;

use crate::collab::{ProgressGauge, RenderedContent, ViewportAdvancer};
use crate::decode::{decode_snapshot, DecodeError};
use crate::types::{AdvanceError, ExtractError, MeasureError};

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("io error reading snapshots: {0}")]
    Io(#[from] io::Error),
    #[error("failed to decode {path:?}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("no .html snapshots found in {0:?}")]
    Empty(PathBuf),
}

/// Replays snapshots in order. The first advance lands on the first snapshot
/// and each later one reveals the next; the last stays visible once reached,
/// so the measured extent plateaus.
///
/// Before any advance the first snapshot is on screen as well.
#[derive(Debug)]
pub struct SnapshotFeed {
    snapshots: Vec<String>,
    /// Cumulative byte length up to and including each snapshot.
    extents: Vec<u64>,
    /// Advances seen so far, saturating at the snapshot count.
    advances: AtomicUsize,
}

impl SnapshotFeed {
    pub fn new(snapshots: Vec<String>) -> Self {
        let extents = snapshots
            .iter()
            .scan(0u64, |total, snapshot| {
                *total += snapshot.len() as u64;
                Some(*total)
            })
            .collect();
        Self {
            snapshots,
            extents,
            advances: AtomicUsize::new(0),
        }
    }

    /// Loads every `*.html` file in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path, charset_hint: Option<&str>) -> Result<Self, SnapshotError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
            })
            .collect();
        paths.sort();
        if paths.is_empty() {
            return Err(SnapshotError::Empty(dir.to_path_buf()));
        }

        let mut snapshots = Vec::with_capacity(paths.len());
        for path in paths {
            let bytes = fs::read(&path)?;
            let html = decode_snapshot(&bytes, charset_hint)
                .map_err(|source| SnapshotError::Decode { path, source })?;
            snapshots.push(html);
        }
        engine_info!("Loaded {} snapshots from {:?}", snapshots.len(), dir);
        Ok(Self::new(snapshots))
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Index of the snapshot currently "on screen".
    pub fn position(&self) -> usize {
        let last = self.snapshots.len().saturating_sub(1);
        self.advances
            .load(Ordering::Acquire)
            .saturating_sub(1)
            .min(last)
    }
}

#[async_trait::async_trait]
impl ViewportAdvancer for SnapshotFeed {
    async fn advance(&self) -> Result<(), AdvanceError> {
        if self.snapshots.is_empty() {
            return Err(AdvanceError("feed has no snapshots".into()));
        }
        let count = self.snapshots.len();
        let _ = self
            .advances
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |seen| {
                Some((seen + 1).min(count))
            });
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProgressGauge for SnapshotFeed {
    async fn measure(&self) -> Result<u64, MeasureError> {
        self.extents
            .get(self.position())
            .copied()
            .ok_or_else(|| MeasureError("feed has no snapshots".into()))
    }
}

#[async_trait::async_trait]
impl RenderedContent for SnapshotFeed {
    async fn snapshot(&self) -> Result<String, ExtractError> {
        self.snapshots
            .get(self.position())
            .cloned()
            .ok_or_else(|| ExtractError::Unavailable("feed has no snapshots".into()))
    }
}
