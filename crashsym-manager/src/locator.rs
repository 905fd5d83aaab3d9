//! Asynchronous, cancellable filesystem search for dSYM bundles by UUID.

use std::fs;
use std::path::{Path, PathBuf};

use crashsym_symbols::{dwarf_image_in_bundle, uuids_in_file};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Terminal result of a search. Delivered exactly once, unless the search
/// was cancelled first, in which case the event stream just ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// At least one matching bundle was delivered.
    Found,
    /// The walk completed without a match.
    Exhausted,
    /// No root directory could be read.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DsymSearchEvent {
    /// A bundle whose image UUID matches the searched-for UUID.
    Candidate(PathBuf),
    Done(SearchOutcome),
}

/// Spawns dSYM searches on the blocking pool.
pub struct DsymSearch;

impl DsymSearch {
    pub fn spawn(uuid: Uuid, roots: Vec<PathBuf>) -> DsymSearchHandle {
        Self::spawn_with_token(uuid, roots, CancellationToken::new())
    }

    /// Like [`spawn`](DsymSearch::spawn), with a caller-provided token. A
    /// token that is already cancelled produces an empty event stream.
    pub fn spawn_with_token(
        uuid: Uuid,
        roots: Vec<PathBuf>,
        token: CancellationToken,
    ) -> DsymSearchHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let walk_token = token.clone();
        tokio::task::spawn_blocking(move || run_search(uuid, roots, tx, walk_token));
        DsymSearchHandle { events: rx, token }
    }
}

/// Receiving half of a running search. Dropping the handle cancels the
/// search.
pub struct DsymSearchHandle {
    events: mpsc::UnboundedReceiver<DsymSearchEvent>,
    token: CancellationToken,
}

impl DsymSearchHandle {
    /// The next event, or `None` once the stream has ended (after the
    /// terminal event, or silently after cancellation).
    pub async fn next_event(&mut self) -> Option<DsymSearchEvent> {
        self.events.recv().await
    }

    /// Requests cancellation. The walk stops at the next directory boundary
    /// and delivers no further events.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for DsymSearchHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

enum WalkStop {
    Cancelled,
    ReceiverClosed,
    RootUnreadable(std::io::Error),
}

fn run_search(
    uuid: Uuid,
    roots: Vec<PathBuf>,
    tx: mpsc::UnboundedSender<DsymSearchEvent>,
    token: CancellationToken,
) {
    let mut found = 0usize;
    let mut root_errors = Vec::new();

    for root in roots {
        if token.is_cancelled() {
            return;
        }
        match walk_root(&root, uuid, &tx, &token) {
            Ok(count) => found += count,
            Err(WalkStop::Cancelled) | Err(WalkStop::ReceiverClosed) => return,
            Err(WalkStop::RootUnreadable(err)) => {
                log::warn!("dSYM search cannot read root {}: {}", root.display(), err);
                root_errors.push(format!("{}: {}", root.display(), err));
            }
        }
    }

    if token.is_cancelled() {
        return;
    }
    let outcome = if found > 0 {
        SearchOutcome::Found
    } else if !root_errors.is_empty() {
        SearchOutcome::Failed(root_errors.join("; "))
    } else {
        SearchOutcome::Exhausted
    };
    let _ = tx.send(DsymSearchEvent::Done(outcome));
}

/// Depth-first walk of one root. Within each directory, `.dSYM` bundles are
/// checked before other subdirectories are descended into, so bundles next
/// to the crash file win over deeply nested ones.
fn walk_root(
    root: &Path,
    uuid: Uuid,
    tx: &mpsc::UnboundedSender<DsymSearchEvent>,
    token: &CancellationToken,
) -> Result<usize, WalkStop> {
    let mut found = 0usize;
    let mut stack = vec![root.to_path_buf()];
    let mut is_root = true;

    while let Some(dir) = stack.pop() {
        if token.is_cancelled() {
            return Err(WalkStop::Cancelled);
        }
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if is_root => return Err(WalkStop::RootUnreadable(err)),
            Err(err) => {
                log::debug!("skipping unreadable directory {}: {}", dir.display(), err);
                continue;
            }
        };
        is_root = false;

        let mut subdirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(file_type) => file_type,
                Err(_) => continue,
            };
            if !file_type.is_dir() {
                continue;
            }
            if path.extension() == Some(std::ffi::OsStr::new("dSYM")) {
                if bundle_matches(&path, uuid) {
                    found += 1;
                    if tx.send(DsymSearchEvent::Candidate(path)).is_err() {
                        return Err(WalkStop::ReceiverClosed);
                    }
                }
            } else {
                subdirs.push(path);
            }
        }
        stack.extend(subdirs);
    }

    Ok(found)
}

/// Whether the bundle's image carries `uuid`. Reads load commands only.
fn bundle_matches(bundle_path: &Path, uuid: Uuid) -> bool {
    let dwarf_path = match dwarf_image_in_bundle(bundle_path) {
        Ok(path) => path,
        Err(_) => return false,
    };
    match uuids_in_file(&dwarf_path) {
        Ok(uuids) => uuids.iter().any(|image| image.uuid == uuid),
        Err(_) => false,
    }
}
