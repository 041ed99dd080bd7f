//! Archive destination resolution.
//!
//! Maps a logical catalog path onto the physical location an upload is
//! written to.  The placement rule is deployment configuration, not a
//! protocol concern, so it is injected into backends as a strategy.

use std::sync::Arc;

use crate::model::{ArchiveDestination, ArchiveType, FileLocation};

/// Pluggable placement rule.  Implementations must be pure: identical
/// inputs always resolve to identical locations.
pub trait ArchivePathStrategy: Send + Sync + 'static {
    /// Resolve the physical location for `logical_path` under `base`.
    fn resolve(
        &self,
        base: &ArchiveDestination,
        logical_path: &str,
        caller_object_id: Option<&str>,
    ) -> FileLocation;
}

/// Default placement rule.
///
/// The destination container is the base container; the destination path is
/// the base path joined with the logical path.  For permanent archives a
/// non-empty caller object id is appended as a final path segment; temporary
/// staging areas ignore it (the object moves again before it is catalogued).
#[derive(Debug, Default)]
pub struct DefaultArchiveLayout;

impl ArchivePathStrategy for DefaultArchiveLayout {
    fn resolve(
        &self,
        base: &ArchiveDestination,
        logical_path: &str,
        caller_object_id: Option<&str>,
    ) -> FileLocation {
        let mut path = String::from(base.location.path.trim_end_matches('/'));
        join_segment(&mut path, logical_path);

        if base.archive_type == ArchiveType::Archive {
            if let Some(caller_id) = caller_object_id {
                if !caller_id.is_empty() {
                    join_segment(&mut path, caller_id);
                }
            }
        }

        FileLocation::new(base.location.container.clone(), path)
    }
}

/// Append `segment` to `path` with exactly one separating slash.
fn join_segment(path: &mut String, segment: &str) {
    if !segment.starts_with('/') {
        path.push('/');
    }
    path.push_str(segment.trim_end_matches('/'));
}

/// Convenience constructor for the default layout.
pub fn default_layout() -> Arc<dyn ArchivePathStrategy> {
    Arc::new(DefaultArchiveLayout)
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn base(archive_type: ArchiveType) -> ArchiveDestination {
        ArchiveDestination {
            location: FileLocation::new("dme-archive", "/archive/root"),
            archive_type,
        }
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let layout = DefaultArchiveLayout;
        let base = base(ArchiveType::Archive);
        let first = layout.resolve(&base, "/project/run-1/data.bin", Some("obj-7"));
        let second = layout.resolve(&base, "/project/run-1/data.bin", Some("obj-7"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_permanent_archive_appends_caller_id() {
        let layout = DefaultArchiveLayout;
        let resolved = layout.resolve(&base(ArchiveType::Archive), "/project/data.bin", Some("obj-7"));
        assert_eq!(resolved.container, "dme-archive");
        assert_eq!(resolved.path, "/archive/root/project/data.bin/obj-7");
    }

    #[test]
    fn test_temporary_archive_ignores_caller_id() {
        let layout = DefaultArchiveLayout;
        let resolved = layout.resolve(
            &base(ArchiveType::TemporaryArchive),
            "/project/data.bin",
            Some("obj-7"),
        );
        assert_eq!(resolved.path, "/archive/root/project/data.bin");
    }

    #[test]
    fn test_slash_normalization() {
        let layout = DefaultArchiveLayout;
        let base = ArchiveDestination {
            location: FileLocation::new("dme-archive", "/archive/root/"),
            archive_type: ArchiveType::Archive,
        };
        let with_slash = layout.resolve(&base, "/project/data.bin", None);
        let without_slash = layout.resolve(&base, "project/data.bin", None);
        assert_eq!(with_slash.path, "/archive/root/project/data.bin");
        assert_eq!(with_slash, without_slash);
    }

    #[test]
    fn test_empty_caller_id_is_ignored() {
        let layout = DefaultArchiveLayout;
        let resolved = layout.resolve(&base(ArchiveType::Archive), "/project/data.bin", Some(""));
        assert_eq!(resolved.path, "/archive/root/project/data.bin");
    }
}
