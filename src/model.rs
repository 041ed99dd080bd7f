//! Canonical transfer model.
//!
//! Value types shared by every backend: locations, archive destinations,
//! transfer requests/responses, the canonical status vocabulary, and the
//! task report.  All of these are created per call and discarded once the
//! caller consumes them -- the library holds no state between calls.

use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Checksum value reported when the backend cannot provide one yet
/// (asynchronous uploads, grid submissions).
pub const CHECKSUM_UNKNOWN: &str = "unknown";

/// Size value reported when a size was not computed.
pub const SIZE_NOT_COMPUTED: i64 = -1;

// -- Locations ----------------------------------------------------------------

/// A backend-addressable location: a container (grid endpoint name or
/// object-store bucket) plus a path/object id within it.
///
/// Both identifiers are opaque strings in backend-specific formats; the
/// façade never parses them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLocation {
    /// Container identifier (grid endpoint or bucket).
    pub container: String,
    /// Path or object identifier within the container.
    pub path: String,
}

impl FileLocation {
    /// Create a new location.
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            path: path.into(),
        }
    }

    /// True when both identifiers are non-empty.
    pub fn is_valid(&self) -> bool {
        !self.container.is_empty() && !self.path.is_empty()
    }
}

impl std::fmt::Display for FileLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.container, self.path)
    }
}

/// Archive placement policy: permanent archive or temporary staging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveType {
    /// Permanent archive -- uploads land in their final location.
    Archive,
    /// Temporary staging area -- uploads await a later move to the archive.
    TemporaryArchive,
}

/// Root location + placement policy for where uploads land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveDestination {
    /// Base location all resolved destinations are rooted under.
    pub location: FileLocation,
    /// Placement policy.
    pub archive_type: ArchiveType,
}

// -- Accounts -----------------------------------------------------------------

/// Credentials for a backend-specific login: a client id / access key and
/// its secret.  Carried opaquely into `authenticate` and nowhere else.
#[derive(Debug, Clone)]
pub struct AccountCredentials {
    /// Client id (grid) or access key id (object store).
    pub id: String,
    /// Client secret (grid) or secret access key (object store).
    pub secret: String,
}

// -- Status -------------------------------------------------------------------

/// Canonical transfer lifecycle status.
///
/// `InTemporaryArchive` is a terminal-success substate reported only by the
/// object store backend when the configured archive is a staging area; it
/// collapses to `Archived` in the canonical four-state vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferStatus {
    Pending,
    InProgress,
    Archived,
    InTemporaryArchive,
    Failed,
}

/// Grid task status string that maps to `Archived`.
const GRID_ARCHIVED_STATUS: &str = "SUCCEEDED";

/// Grid task status string that maps to `Failed`.
const GRID_FAILED_STATUS: &str = "FAILED";

impl TransferStatus {
    /// Map a native grid task status into the canonical vocabulary.
    ///
    /// The mapping is total: `SUCCEEDED` and `FAILED` are terminal, every
    /// other native value (`ACTIVE`, `INACTIVE`, ...) is `InProgress`.
    pub fn from_grid_task_status(native: &str) -> Self {
        match native {
            GRID_ARCHIVED_STATUS => TransferStatus::Archived,
            GRID_FAILED_STATUS => TransferStatus::Failed,
            _ => TransferStatus::InProgress,
        }
    }

    /// Upload status for an object store put, derived from the archive type.
    pub fn from_archive_type(archive_type: ArchiveType) -> Self {
        match archive_type {
            ArchiveType::Archive => TransferStatus::Archived,
            ArchiveType::TemporaryArchive => TransferStatus::InTemporaryArchive,
        }
    }

    /// Collapse to the canonical four-state vocabulary.
    pub fn canonical(self) -> Self {
        match self {
            TransferStatus::InTemporaryArchive => TransferStatus::Archived,
            other => other,
        }
    }

    /// True for statuses that never change again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Archived | TransferStatus::InTemporaryArchive | TransferStatus::Failed
        )
    }
}

/// Which backend variant produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferBackendKind {
    Grid,
    ObjectStore,
}

impl TransferBackendKind {
    /// Short name used in error context and logs.
    pub fn name(self) -> &'static str {
        match self {
            TransferBackendKind::Grid => "grid",
            TransferBackendKind::ObjectStore => "object_store",
        }
    }
}

// -- Requests / responses -----------------------------------------------------

/// A caller-supplied metadata entry attached to an uploaded object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub attribute: String,
    pub value: String,
}

/// Where upload bytes come from.
#[derive(Debug, Clone)]
pub enum UploadSource {
    /// A remote location -- grid transfers move data between endpoints.
    Remote(FileLocation),
    /// A local file read by the object store backend.
    File(PathBuf),
    /// An in-memory payload for the object store backend.
    Bytes(Bytes),
}

/// One upload intent.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Logical catalog path of the data object.
    pub path: String,
    /// Caller-supplied correlation id, folded into the archive destination
    /// for permanent archives.
    pub caller_object_id: Option<String>,
    /// Source of the bytes.
    pub source: UploadSource,
}

/// Where downloaded bytes go.
#[derive(Debug, Clone, Serialize)]
pub enum DownloadDestination {
    /// A remote location -- grid transfers move data between endpoints.
    Remote(FileLocation),
    /// A local file written by the object store backend.
    File(PathBuf),
}

/// One download intent.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// The archive location the object was uploaded to.
    pub archive_location: FileLocation,
    /// Destination handle.
    pub destination: DownloadDestination,
}

/// Response to an upload call.
#[derive(Debug, Clone, Serialize)]
pub struct UploadResponse {
    /// The resolved physical location the object was (or is being) written to.
    pub archive_location: FileLocation,
    /// Backend variant that handled the upload.
    pub backend: TransferBackendKind,
    /// Canonical request id for later status/report/size queries.
    pub request_id: String,
    /// Entity tag of the stored object, or [`CHECKSUM_UNKNOWN`] when the
    /// transfer is still in flight.
    pub checksum: String,
    /// Upload status at the time the call returned.
    pub status: TransferStatus,
}

/// Response to a download call.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadResponse {
    /// Canonical request id for later status/report/size queries.
    pub request_id: String,
    /// The destination handle the caller supplied.
    pub destination: DownloadDestination,
}

// -- Task report --------------------------------------------------------------

/// Aggregated grid task telemetry, re-fetched on every query and never
/// cached by the library.  Absent native timestamps stay `None`.
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    pub task_id: String,
    pub task_type: String,
    /// Native status string as reported by the grid service.
    pub native_status: String,
    /// Canonical status derived from `native_status`.
    pub status: TransferStatus,
    pub request_time: Option<DateTime<FixedOffset>>,
    pub deadline: Option<DateTime<FixedOffset>>,
    pub completion_time: Option<DateTime<FixedOffset>>,
    pub subtasks_total: i64,
    pub subtasks_succeeded: i64,
    pub subtasks_expired: i64,
    pub subtasks_canceled: i64,
    pub subtasks_pending: i64,
    pub subtasks_retrying: i64,
    pub command: Option<String>,
    pub source_endpoint: Option<String>,
    pub destination_endpoint: Option<String>,
    pub data_encryption: bool,
    pub checksum_verification: bool,
    pub delete_destination_extra: bool,
    pub files: i64,
    pub files_skipped: i64,
    pub directories: i64,
    pub bytes_transferred: i64,
    pub bytes_checksummed: i64,
    pub effective_bytes_per_second: f64,
    pub faults: i64,
}

// -- Path attributes ----------------------------------------------------------

/// Result of probing a remote path.
///
/// `size` is populated only when the caller asked for it; walking a large
/// directory tree is expensive and must be opt-in.  `uncertain` is set when
/// a listing failure degraded the answer (a pruned or unreadable subtree
/// contributed zero, or an existence probe failed outright).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathAttributes {
    pub exists: bool,
    pub is_file: bool,
    pub is_directory: bool,
    /// Aggregate size in bytes, or [`SIZE_NOT_COMPUTED`].
    pub size: i64,
    pub uncertain: bool,
}

impl PathAttributes {
    /// Attributes of a path that does not exist.
    pub fn nonexistent() -> Self {
        Self {
            exists: false,
            is_file: false,
            is_directory: false,
            size: SIZE_NOT_COMPUTED,
            uncertain: false,
        }
    }
}

impl Default for PathAttributes {
    fn default() -> Self {
        Self::nonexistent()
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_status_mapping_terminal() {
        assert_eq!(
            TransferStatus::from_grid_task_status("SUCCEEDED"),
            TransferStatus::Archived
        );
        assert_eq!(
            TransferStatus::from_grid_task_status("FAILED"),
            TransferStatus::Failed
        );
    }

    #[test]
    fn test_grid_status_mapping_is_total() {
        // Any native value outside the two terminal strings maps to
        // InProgress -- no value may be unmapped.
        for native in ["ACTIVE", "INACTIVE", "QUEUED", "", "succeeded", "weird"] {
            assert_eq!(
                TransferStatus::from_grid_task_status(native),
                TransferStatus::InProgress,
                "native status {native:?}"
            );
        }
    }

    #[test]
    fn test_grid_status_mapping_idempotent() {
        // Two consecutive queries for a completed task return the same
        // canonical status -- no flapping back to a non-terminal state.
        let first = TransferStatus::from_grid_task_status("SUCCEEDED");
        let second = TransferStatus::from_grid_task_status("SUCCEEDED");
        assert_eq!(first, second);
        assert!(first.is_terminal());
    }

    #[test]
    fn test_archive_type_status() {
        assert_eq!(
            TransferStatus::from_archive_type(ArchiveType::Archive),
            TransferStatus::Archived
        );
        assert_eq!(
            TransferStatus::from_archive_type(ArchiveType::TemporaryArchive),
            TransferStatus::InTemporaryArchive
        );
    }

    #[test]
    fn test_canonical_collapse() {
        assert_eq!(
            TransferStatus::InTemporaryArchive.canonical(),
            TransferStatus::Archived
        );
        assert_eq!(TransferStatus::Pending.canonical(), TransferStatus::Pending);
        assert_eq!(TransferStatus::Failed.canonical(), TransferStatus::Failed);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(TransferStatus::Archived.is_terminal());
        assert!(TransferStatus::InTemporaryArchive.is_terminal());
        assert!(TransferStatus::Failed.is_terminal());
        assert!(!TransferStatus::Pending.is_terminal());
        assert!(!TransferStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        assert_eq!(
            serde_json::to_string(&TransferStatus::InTemporaryArchive).unwrap(),
            "\"IN_TEMPORARY_ARCHIVE\""
        );
        assert_eq!(
            serde_json::to_string(&TransferStatus::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
    }

    #[test]
    fn test_file_location_validity() {
        assert!(FileLocation::new("endpoint", "/path").is_valid());
        assert!(!FileLocation::new("", "/path").is_valid());
        assert!(!FileLocation::new("endpoint", "").is_valid());
    }

    #[test]
    fn test_file_location_display() {
        let loc = FileLocation::new("archive-bucket", "/root/obj");
        assert_eq!(loc.to_string(), "archive-bucket:/root/obj");
    }

    #[test]
    fn test_nonexistent_path_attributes() {
        let attrs = PathAttributes::nonexistent();
        assert!(!attrs.exists);
        assert!(!attrs.is_file);
        assert!(!attrs.is_directory);
        assert_eq!(attrs.size, SIZE_NOT_COMPUTED);
        assert!(!attrs.uncertain);
    }
}
