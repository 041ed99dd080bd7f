//! Object store backend (callback/blocking-based).
//!
//! Talks to an S3-compatible object store through the AWS SDK.  Uploads
//! and downloads complete inline: without a progress listener the call
//! waits for the remote operation; with one, the operation runs on its own
//! task and the listener observes progress and the terminal outcome.
//!
//! Credentials are explicit (access key + secret from `authenticate`);
//! the endpoint, region, and addressing style come from configuration.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use aws_sdk_s3::Client;
use bytes::Bytes;
use md5::{Digest, Md5};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ObjectStoreConfig;
use crate::destination::ArchivePathStrategy;
use crate::errors::TransferError;
use crate::model::{
    AccountCredentials, ArchiveDestination, DownloadDestination, DownloadRequest,
    DownloadResponse, FileLocation, MetadataEntry, TransferBackendKind, TransferStatus,
    UploadRequest, UploadResponse, UploadSource, CHECKSUM_UNKNOWN,
};
use crate::progress::{ProgressBridge, TransferProgressListener};

use super::proxy::{DataTransferProxy, TransferSession};

// -- Session ------------------------------------------------------------------

/// Object store session: the authenticated SDK client.  Cloning is cheap;
/// the client pools connections internally.
#[derive(Clone)]
pub struct ObjectStoreSession {
    client: Client,
}

// -- Backend ------------------------------------------------------------------

/// Callback/blocking object store backend.
pub struct ObjectStoreBackend {
    /// S3-compatible endpoint URL.
    endpoint_url: String,
    /// Region presented to the endpoint.
    region: String,
    /// Force path-style URL addressing.
    use_path_style: bool,
    /// Where uploads land.
    archive: ArchiveDestination,
    /// Placement rule for resolving archive destinations.
    layout: Arc<dyn ArchivePathStrategy>,
}

impl ObjectStoreBackend {
    /// Create a new object store backend from configuration.
    pub fn new(
        config: &ObjectStoreConfig,
        layout: Arc<dyn ArchivePathStrategy>,
    ) -> Result<Self, TransferError> {
        info!(
            "object store backend initialized: endpoint={} archive={}",
            config.endpoint_url,
            config.archive.destination().location
        );

        Ok(Self {
            endpoint_url: config.endpoint_url.clone(),
            region: config.region.clone(),
            use_path_style: config.use_path_style,
            archive: config.archive.destination(),
            layout,
        })
    }
}

/// Map an archive location onto a bucket key (keys carry no leading slash).
fn object_key(location: &FileLocation) -> &str {
    location.path.trim_start_matches('/')
}

/// Locally computed MD5 entity tag, used when the store omits one from a
/// put response.
fn etag_from_md5(data: &[u8]) -> String {
    let mut hasher = Md5::new();
    hasher.update(data);
    format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Put one object, returning the entity tag the store reported (if any).
async fn put_object(
    client: Client,
    bucket: String,
    key: String,
    data: Bytes,
    metadata: Vec<MetadataEntry>,
) -> Result<Option<String>, String> {
    debug!("put_object: bucket={} key={}", bucket, key);

    let mut request = client
        .put_object()
        .bucket(&bucket)
        .key(&key)
        .body(aws_sdk_s3::primitives::ByteStream::from(data));

    for entry in &metadata {
        request = request.metadata(&entry.attribute, &entry.value);
    }

    let resp = request
        .send()
        .await
        .map_err(|e| format!("put_object: {e}"))?;

    Ok(resp.e_tag().map(str::to_string))
}

/// Get one object into a local file, streaming the body chunk by chunk.
/// The chunk stream is the store's native progress event stream; each
/// chunk is forwarded to the bridge when one is attached.
async fn get_object_to_file(
    client: Client,
    location: FileLocation,
    destination: PathBuf,
    bridge: Option<Arc<ProgressBridge>>,
) -> Result<u64, String> {
    let key = object_key(&location).to_string();

    debug!("get_object: bucket={} key={}", location.container, key);

    let resp = client
        .get_object()
        .bucket(&location.container)
        .key(&key)
        .send()
        .await
        .map_err(|e| {
            let service_err = e.into_service_error();
            if service_err.is_no_such_key() {
                format!("object not found at {location}")
            } else {
                format!("get_object: {service_err}")
            }
        })?;

    let mut file = tokio::fs::File::create(&destination)
        .await
        .map_err(|e| format!("failed to create {}: {e}", destination.display()))?;

    let mut body = resp.body;
    let mut written: u64 = 0;
    while let Some(chunk) = body
        .try_next()
        .await
        .map_err(|e| format!("get_object body: {e}"))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| format!("failed to write {}: {e}", destination.display()))?;
        written += chunk.len() as u64;
        if let Some(ref bridge) = bridge {
            bridge.add_bytes(chunk.len() as u64);
        }
    }

    file.flush()
        .await
        .map_err(|e| format!("failed to flush {}: {e}", destination.display()))?;

    Ok(written)
}

// -- Trait implementation -----------------------------------------------------

impl DataTransferProxy for ObjectStoreBackend {
    fn kind(&self) -> TransferBackendKind {
        TransferBackendKind::ObjectStore
    }

    fn authenticate(
        &self,
        account: &AccountCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TransferSession, TransferError>> + Send + '_>> {
        let account = account.clone();
        Box::pin(async move {
            if account.id.is_empty() || account.secret.is_empty() {
                return Err(TransferError::Authentication {
                    reason: "missing access key id or secret".to_string(),
                });
            }

            let credentials = aws_sdk_s3::config::Credentials::new(
                &account.id,
                &account.secret,
                None, // session_token
                None, // expiry
                "datamover-config",
            );

            let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .region(aws_config::Region::new(self.region.clone()))
                .endpoint_url(&self.endpoint_url)
                .credentials_provider(credentials)
                .load()
                .await;

            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(self.use_path_style)
                .build();

            Ok(TransferSession::ObjectStore(ObjectStoreSession {
                client: Client::from_conf(s3_config),
            }))
        })
    }

    fn upload_data_object(
        &self,
        session: &TransferSession,
        request: UploadRequest,
        metadata: &[MetadataEntry],
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, TransferError>> + Send + '_>> {
        let session = match session.as_object_store() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let metadata = metadata.to_vec();
        Box::pin(async move {
            let destination = self.layout.resolve(
                &self.archive,
                &request.path,
                request.caller_object_id.as_deref(),
            );

            let data = match request.source {
                UploadSource::Bytes(data) => data,
                UploadSource::File(path) => Bytes::from(
                    tokio::fs::read(&path).await.map_err(|e| {
                        TransferError::transfer(
                            path.display(),
                            &destination,
                            format!("failed to read source file: {e}"),
                        )
                    })?,
                ),
                UploadSource::Remote(location) => {
                    return Err(TransferError::InvalidLocation {
                        location: location.to_string(),
                        reason: "object store uploads require a local file or in-memory source"
                            .to_string(),
                    });
                }
            };

            let total_bytes = data.len() as u64;
            let local_etag = etag_from_md5(&data);
            let request_id = uuid::Uuid::new_v4().to_string();
            let status = TransferStatus::from_archive_type(self.archive.archive_type);
            let bucket = destination.container.clone();
            let key = object_key(&destination).to_string();
            let source_label = request.path.clone();

            match listener {
                None => {
                    // Synchronous: wait for the put.  The put runs on its
                    // own task so an aborted wait surfaces as an explicit
                    // interruption instead of a success-shaped return.
                    let handle = tokio::spawn(put_object(
                        session.client.clone(),
                        bucket,
                        key,
                        data,
                        metadata,
                    ));
                    let etag = match handle.await {
                        Ok(Ok(etag)) => etag,
                        Ok(Err(reason)) => {
                            return Err(TransferError::transfer(
                                &source_label,
                                &destination,
                                reason,
                            ));
                        }
                        Err(join_err) => {
                            warn!("upload task for {} did not complete: {}", destination, join_err);
                            return Err(TransferError::Interrupted { request_id });
                        }
                    };

                    Ok(UploadResponse {
                        archive_location: destination,
                        backend: TransferBackendKind::ObjectStore,
                        request_id,
                        checksum: etag.unwrap_or(local_etag),
                        status,
                    })
                }
                Some(listener) => {
                    // Asynchronous: return immediately; the spawned task
                    // drives the bridge.  The checksum is unknown until the
                    // listener observes completion.
                    let bridge = ProgressBridge::new(listener, Some(total_bytes));
                    let client = session.client.clone();
                    let destination_label = destination.to_string();

                    tokio::spawn(async move {
                        bridge.started();
                        match put_object(client, bucket, key, data, metadata).await {
                            Ok(etag) => {
                                bridge.add_bytes(total_bytes);
                                bridge.completed(Some(etag.as_deref().unwrap_or(&local_etag)));
                            }
                            Err(reason) => {
                                warn!(
                                    "asynchronous upload to {} failed: {}",
                                    destination_label, reason
                                );
                                bridge.failed(&reason);
                            }
                        }
                    });

                    Ok(UploadResponse {
                        archive_location: destination,
                        backend: TransferBackendKind::ObjectStore,
                        request_id,
                        checksum: CHECKSUM_UNKNOWN.to_string(),
                        status,
                    })
                }
            }
        })
    }

    fn download_data_object(
        &self,
        session: &TransferSession,
        request: DownloadRequest,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> Pin<Box<dyn Future<Output = Result<DownloadResponse, TransferError>> + Send + '_>> {
        let session = match session.as_object_store() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        Box::pin(async move {
            let DownloadRequest {
                archive_location,
                destination,
            } = request;

            let DownloadDestination::File(destination_path) = destination else {
                return Err(TransferError::InvalidLocation {
                    location: archive_location.to_string(),
                    reason: "object store downloads require a local file destination".to_string(),
                });
            };

            let request_id = uuid::Uuid::new_v4().to_string();

            match listener {
                None => {
                    let handle = tokio::spawn(get_object_to_file(
                        session.client.clone(),
                        archive_location.clone(),
                        destination_path.clone(),
                        None,
                    ));
                    match handle.await {
                        Ok(Ok(_written)) => {}
                        Ok(Err(reason)) => {
                            return Err(TransferError::transfer(
                                &archive_location,
                                destination_path.display(),
                                reason,
                            ));
                        }
                        Err(join_err) => {
                            warn!(
                                "download task for {} did not complete: {}",
                                archive_location, join_err
                            );
                            return Err(TransferError::Interrupted { request_id });
                        }
                    }

                    Ok(DownloadResponse {
                        request_id,
                        destination: DownloadDestination::File(destination_path),
                    })
                }
                Some(listener) => {
                    let bridge = Arc::new(ProgressBridge::new(listener, None));
                    let client = session.client.clone();
                    let location = archive_location.clone();
                    let path = destination_path.clone();

                    tokio::spawn(async move {
                        bridge.started();
                        match get_object_to_file(client, location.clone(), path, Some(bridge.clone()))
                            .await
                        {
                            Ok(_written) => bridge.completed(None),
                            Err(reason) => {
                                warn!("asynchronous download of {} failed: {}", location, reason);
                                bridge.failed(&reason);
                            }
                        }
                    });

                    Ok(DownloadResponse {
                        request_id,
                        destination: DownloadDestination::File(destination_path),
                    })
                }
            }
        })
    }
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArchiveConfig;
    use crate::destination::default_layout;
    use crate::model::ArchiveType;

    fn test_backend(archive_type: ArchiveType) -> ObjectStoreBackend {
        let config = ObjectStoreConfig {
            endpoint_url: "https://objstore.example.org".to_string(),
            region: "us-east-1".to_string(),
            use_path_style: true,
            archive: ArchiveConfig {
                container: "dme-archive".to_string(),
                path: "/archive/root".to_string(),
                archive_type,
            },
        };
        ObjectStoreBackend::new(&config, default_layout()).unwrap()
    }

    #[test]
    fn test_object_key_strips_leading_slash() {
        let location = FileLocation::new("bucket", "/archive/root/project/data.bin");
        assert_eq!(object_key(&location), "archive/root/project/data.bin");
    }

    #[test]
    fn test_object_key_without_leading_slash() {
        let location = FileLocation::new("bucket", "already/relative");
        assert_eq!(object_key(&location), "already/relative");
    }

    #[test]
    fn test_etag_from_md5_empty() {
        assert_eq!(etag_from_md5(b""), "\"d41d8cd98f00b204e9800998ecf8427e\"");
    }

    #[test]
    fn test_etag_from_md5_hello() {
        assert_eq!(
            etag_from_md5(b"hello world"),
            "\"5eb63bbbe01eeed093cb22bb8f5acdc3\""
        );
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_credentials() {
        let backend = test_backend(ArchiveType::Archive);
        let account = AccountCredentials {
            id: "access-key".to_string(),
            secret: String::new(),
        };
        let err = backend.authenticate(&account).await.unwrap_err();
        assert_eq!(err.code(), "Authentication");
    }

    #[tokio::test]
    async fn test_status_query_is_unsupported() {
        // The object store completes transfers inline and holds no task
        // state; status queries fall through to the trait default.
        let backend = test_backend(ArchiveType::Archive);
        let account = AccountCredentials {
            id: "access-key".to_string(),
            secret: "secret-key".to_string(),
        };
        let session = backend.authenticate(&account).await.unwrap();
        let err = backend
            .get_data_transfer_status(&session, "req-1")
            .await
            .unwrap_err();
        assert_eq!(err.code(), "Unsupported");
        assert!(err.to_string().contains("object_store"));
    }

    #[tokio::test]
    async fn test_upload_with_listener_returns_unknown_checksum() {
        // The asynchronous path returns before the put completes: the
        // checksum is unknown and the status reflects the archive type.
        struct NullListener;
        impl crate::progress::TransferProgressListener for NullListener {
            fn transfer_progressed(&self, _bytes_transferred: u64, _total_bytes: Option<u64>) {}
            fn transfer_completed(&self, _checksum: Option<&str>) {}
            fn transfer_failed(&self, _reason: &str) {}
        }

        let backend = test_backend(ArchiveType::TemporaryArchive);
        let account = AccountCredentials {
            id: "access-key".to_string(),
            secret: "secret-key".to_string(),
        };
        let session = backend.authenticate(&account).await.unwrap();
        let request = UploadRequest {
            path: "/project/data.bin".to_string(),
            caller_object_id: Some("obj-7".to_string()),
            source: UploadSource::Bytes(Bytes::from_static(b"payload")),
        };

        let response = backend
            .upload_data_object(&session, request, &[], Some(Arc::new(NullListener)))
            .await
            .unwrap();

        assert_eq!(response.checksum, CHECKSUM_UNKNOWN);
        assert_eq!(response.status, TransferStatus::InTemporaryArchive);
        assert_eq!(response.backend, TransferBackendKind::ObjectStore);
        // Temporary staging ignores the caller object id.
        assert_eq!(
            response.archive_location,
            FileLocation::new("dme-archive", "/archive/root/project/data.bin")
        );
        assert!(!response.request_id.is_empty());
    }

    #[tokio::test]
    async fn test_upload_rejects_remote_source() {
        let backend = test_backend(ArchiveType::Archive);
        let account = AccountCredentials {
            id: "access-key".to_string(),
            secret: "secret-key".to_string(),
        };
        let session = backend.authenticate(&account).await.unwrap();
        let request = UploadRequest {
            path: "/project/data.bin".to_string(),
            caller_object_id: None,
            source: UploadSource::Remote(FileLocation::new("ep", "/src")),
        };
        let err = backend
            .upload_data_object(&session, request, &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidLocation");
    }

    #[tokio::test]
    async fn test_download_rejects_remote_destination() {
        let backend = test_backend(ArchiveType::Archive);
        let account = AccountCredentials {
            id: "access-key".to_string(),
            secret: "secret-key".to_string(),
        };
        let session = backend.authenticate(&account).await.unwrap();
        let request = DownloadRequest {
            archive_location: FileLocation::new("dme-archive", "/archive/root/obj"),
            destination: DownloadDestination::Remote(FileLocation::new("ep", "/dst")),
        };
        let err = backend
            .download_data_object(&session, request, None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidLocation");
    }
}
