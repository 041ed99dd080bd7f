//! datamover -- data transfer proxy client library.
//!
//! Normalizes two structurally different remote transfer protocols -- a
//! poll-based grid transfer service and a callback/blocking S3-compatible
//! object store -- into one canonical transfer model behind the
//! [`transfer::DataTransferProxy`] trait.  The library is a pure client:
//! it holds no state between calls, owns no workers beyond the single
//! task driving an asynchronous transfer, and leaves durability and retry
//! policy to its callers.

pub mod attributes;
pub mod config;
pub mod destination;
pub mod errors;
pub mod model;
pub mod progress;
pub mod transfer;

pub use errors::TransferError;
pub use model::{
    AccountCredentials, ArchiveDestination, ArchiveType, DownloadRequest, DownloadResponse,
    FileLocation, MetadataEntry, PathAttributes, TransferBackendKind, TransferReport,
    TransferStatus, UploadRequest, UploadResponse,
};
pub use progress::TransferProgressListener;
pub use transfer::{DataTransferProxy, GridBackend, ObjectStoreBackend, TransferSession};
