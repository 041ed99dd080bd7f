//! Remote path attribute resolution.
//!
//! There is no "stat" primitive in the grid listing protocol.  Existence,
//! file-vs-directory, and aggregate size are all derived from directory
//! listing calls: a listable path is a directory, a path whose listing is
//! rejected with the not-a-directory sentinel is a file, and anything else
//! does not exist.  The listing call returns an explicit [`ListOutcome`] so
//! the resolver branches on variants instead of caught errors.
//!
//! Size computation walks the tree recursively.  A failure anywhere in the
//! walk contributes zero instead of aborting, and the degradation is
//! surfaced through `PathAttributes::uncertain`.  The walk is bounded by
//! [`WalkLimits`] so a misbehaving remote listing cannot recurse forever.

use std::future::Future;
use std::pin::Pin;

use tracing::warn;

use crate::model::{FileLocation, PathAttributes};

/// Kind of a directory listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks and anything else the remote reports; ignored by the walk.
    Other,
}

/// One entry of a remote directory listing.
#[derive(Debug, Clone)]
pub struct ListEntry {
    pub name: String,
    pub kind: EntryKind,
    pub size: i64,
}

/// A remote directory listing: the listed location as echoed by the
/// remote, plus its entries.  Child locations are built by appending an
/// entry name to `location.path`.
#[derive(Debug, Clone)]
pub struct DirectoryListing {
    pub location: FileLocation,
    pub entries: Vec<ListEntry>,
}

/// Outcome of a directory listing call.
///
/// `NotADirectory` is control flow, not failure: it is how the remote
/// signals that the path exists as a single file.
#[derive(Debug, Clone)]
pub enum ListOutcome {
    Listed(DirectoryListing),
    NotADirectory,
    NotFound,
    Failed(String),
}

/// Directory listing source.  The grid client is the production
/// implementation; tests use an in-memory tree.
pub trait DirectoryLister: Send + Sync {
    /// List `location` as a directory.
    fn list(
        &self,
        location: &FileLocation,
    ) -> Pin<Box<dyn Future<Output = ListOutcome> + Send + '_>>;
}

/// Defensive bounds on the recursive walk.
#[derive(Debug, Clone, Copy)]
pub struct WalkLimits {
    /// Maximum recursion depth before a subtree is pruned.
    pub max_depth: u32,
    /// Maximum total entries visited before the walk is pruned.
    pub max_entries: u64,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: 64,
            max_entries: 1_000_000,
        }
    }
}

/// Resolve the attributes of a remote path.
///
/// Absence is a normal outcome, never an error: an unlistable path yields
/// `exists=false`.  Size is computed only when `compute_size` is set.
pub async fn resolve_path_attributes(
    lister: &dyn DirectoryLister,
    location: &FileLocation,
    compute_size: bool,
    limits: &WalkLimits,
) -> PathAttributes {
    let mut attributes = PathAttributes::nonexistent();

    match lister.list(location).await {
        ListOutcome::Listed(listing) => {
            attributes.exists = true;
            attributes.is_directory = true;
            if compute_size {
                let mut walker = Walker::new(lister, limits);
                attributes.size = walker.directory_size(listing, 0).await;
                attributes.uncertain = walker.uncertain;
            }
        }
        ListOutcome::NotADirectory => {
            // The path exists as a single file.
            attributes.exists = true;
            attributes.is_file = true;
            if compute_size {
                let (size, uncertain) = file_size(lister, location).await;
                attributes.size = size;
                attributes.uncertain = uncertain;
            }
        }
        ListOutcome::NotFound => {}
        ListOutcome::Failed(reason) => {
            warn!("path probe failed for {}: {}", location, reason);
            attributes.uncertain = true;
        }
    }

    attributes
}

/// Resolve a file's size by listing its parent directory and locating the
/// matching entry name.  Returns `(size, uncertain)`.
async fn file_size(lister: &dyn DirectoryLister, location: &FileLocation) -> (i64, bool) {
    let Some(slash) = location.path.rfind('/') else {
        warn!("cannot derive parent directory of {}", location);
        return (0, true);
    };
    let parent_path = if slash == 0 { "/" } else { &location.path[..slash] };
    let file_name = &location.path[slash + 1..];
    let parent = FileLocation::new(location.container.clone(), parent_path);

    match lister.list(&parent).await {
        ListOutcome::Listed(listing) => {
            for entry in &listing.entries {
                if entry.name == file_name {
                    return (entry.size, false);
                }
            }
            warn!("{} not present in parent listing of {}", file_name, parent);
            (0, true)
        }
        outcome => {
            warn!("failed to list parent {} of {}: {:?}", parent, location, outcome);
            (0, true)
        }
    }
}

/// Recursive directory size accumulator.
struct Walker<'a> {
    lister: &'a dyn DirectoryLister,
    limits: &'a WalkLimits,
    entries_visited: u64,
    uncertain: bool,
}

impl<'a> Walker<'a> {
    fn new(lister: &'a dyn DirectoryLister, limits: &'a WalkLimits) -> Self {
        Self {
            lister,
            limits,
            entries_visited: 0,
            uncertain: false,
        }
    }

    /// Sum the sizes of all files under `listing`, recursing into
    /// subdirectories.  Failures and pruned subtrees contribute zero and
    /// mark the walk uncertain; the walk itself never aborts.
    fn directory_size(
        &mut self,
        listing: DirectoryListing,
        depth: u32,
    ) -> Pin<Box<dyn Future<Output = i64> + Send + '_>> {
        Box::pin(async move {
            let mut size: i64 = 0;

            for entry in listing.entries {
                self.entries_visited += 1;
                if self.entries_visited > self.limits.max_entries {
                    warn!(
                        "directory walk pruned at {} entries under {}",
                        self.limits.max_entries, listing.location
                    );
                    self.uncertain = true;
                    return size;
                }

                match entry.kind {
                    EntryKind::File => size += entry.size,
                    EntryKind::Dir => {
                        if depth + 1 > self.limits.max_depth {
                            warn!(
                                "directory walk pruned at depth {} under {}",
                                self.limits.max_depth, listing.location
                            );
                            self.uncertain = true;
                            continue;
                        }

                        let child = FileLocation::new(
                            listing.location.container.clone(),
                            format!("{}/{}", listing.location.path, entry.name),
                        );
                        match self.lister.list(&child).await {
                            ListOutcome::Listed(child_listing) => {
                                size += self.directory_size(child_listing, depth + 1).await;
                            }
                            outcome => {
                                warn!("failed to list subdirectory {}: {:?}", child, outcome);
                                self.uncertain = true;
                            }
                        }
                    }
                    EntryKind::Other => {}
                }
            }

            size
        })
    }
}

// -- Tests -------------------------------------------------------------------
