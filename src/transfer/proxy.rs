//! Abstract data transfer proxy trait.
//!
//! Every transfer backend implements [`DataTransferProxy`].  The trait
//! normalizes two structurally different remote protocols into one
//! canonical model: callers authenticate once, then issue upload /
//! download / status / attribute calls without knowing which backend
//! variant is active.  Operations a variant does not implement fall
//! through to default methods that report them as unsupported.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::errors::TransferError;
use crate::model::{
    AccountCredentials, DownloadRequest, DownloadResponse, FileLocation, MetadataEntry,
    PathAttributes, TransferBackendKind, TransferReport, TransferStatus, UploadRequest,
    UploadResponse,
};
use crate::progress::TransferProgressListener;

use super::grid::GridSession;
use super::object_store::ObjectStoreSession;

/// An authenticated backend session.
///
/// Each variant carries exactly the state its backend needs; callers hold
/// the session opaquely and pass it back into proxy calls.  A session may
/// be used for multiple concurrent calls.
#[derive(Clone)]
pub enum TransferSession {
    Grid(GridSession),
    ObjectStore(ObjectStoreSession),
}

impl TransferSession {
    /// Which backend issued this session.
    pub fn backend_kind(&self) -> TransferBackendKind {
        match self {
            TransferSession::Grid(_) => TransferBackendKind::Grid,
            TransferSession::ObjectStore(_) => TransferBackendKind::ObjectStore,
        }
    }

    /// Unwrap a grid session, or fail when the session was issued by a
    /// different backend.
    pub(crate) fn as_grid(&self) -> Result<&GridSession, TransferError> {
        match self {
            TransferSession::Grid(session) => Ok(session),
            other => Err(session_mismatch(TransferBackendKind::Grid, other)),
        }
    }

    /// Unwrap an object store session, or fail when the session was issued
    /// by a different backend.
    pub(crate) fn as_object_store(&self) -> Result<&ObjectStoreSession, TransferError> {
        match self {
            TransferSession::ObjectStore(session) => Ok(session),
            other => Err(session_mismatch(TransferBackendKind::ObjectStore, other)),
        }
    }
}

fn session_mismatch(expected: TransferBackendKind, actual: &TransferSession) -> TransferError {
    TransferError::Authentication {
        reason: format!(
            "session was issued by the {} backend, not {}",
            actual.backend_kind().name(),
            expected.name()
        ),
    }
}

/// Async data transfer proxy contract.
pub trait DataTransferProxy: Send + Sync + 'static {
    /// Which backend variant this is.
    fn kind(&self) -> TransferBackendKind;

    /// Log into the backend and return an opaque session.
    fn authenticate(
        &self,
        account: &AccountCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TransferSession, TransferError>> + Send + '_>>;

    /// Upload one data object to its resolved archive destination.
    ///
    /// With a progress listener the call returns as soon as the transfer is
    /// underway and the listener observes progress and completion; without
    /// one the call waits for the backend to finish (or, for the grid
    /// backend, to accept the submission).
    fn upload_data_object(
        &self,
        session: &TransferSession,
        request: UploadRequest,
        metadata: &[MetadataEntry],
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, TransferError>> + Send + '_>>;

    /// Download one data object from its archive location.
    fn download_data_object(
        &self,
        session: &TransferSession,
        request: DownloadRequest,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> Pin<Box<dyn Future<Output = Result<DownloadResponse, TransferError>> + Send + '_>>;

    /// Canonical status of a previously issued transfer request.
    fn get_data_transfer_status(
        &self,
        _session: &TransferSession,
        _request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TransferStatus, TransferError>> + Send + '_>> {
        let backend = self.kind().name();
        Box::pin(async move {
            Err(TransferError::Unsupported {
                operation: "get_data_transfer_status",
                backend,
            })
        })
    }

    /// Full task telemetry of a previously issued transfer request.
    fn get_data_transfer_report(
        &self,
        _session: &TransferSession,
        _request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TransferReport, TransferError>> + Send + '_>> {
        let backend = self.kind().name();
        Box::pin(async move {
            Err(TransferError::Unsupported {
                operation: "get_data_transfer_report",
                backend,
            })
        })
    }

    /// Bytes transferred so far for a previously issued transfer request.
    fn get_data_transfer_size(
        &self,
        _session: &TransferSession,
        _request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, TransferError>> + Send + '_>> {
        let backend = self.kind().name();
        Box::pin(async move {
            Err(TransferError::Unsupported {
                operation: "get_data_transfer_size",
                backend,
            })
        })
    }

    /// Probe a remote path for existence, kind, and (optionally) size.
    fn get_path_attributes(
        &self,
        _session: &TransferSession,
        _location: &FileLocation,
        _compute_size: bool,
    ) -> Pin<Box<dyn Future<Output = Result<PathAttributes, TransferError>> + Send + '_>> {
        let backend = self.kind().name();
        Box::pin(async move {
            Err(TransferError::Unsupported {
                operation: "get_path_attributes",
                backend,
            })
        })
    }
}
