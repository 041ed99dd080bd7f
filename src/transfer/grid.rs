//! Grid transfer backend (poll-based).
//!
//! Talks JSON-over-HTTP to the grid transfer service:
//!   Token:       `POST {auth_url}/token` (client credentials)
//!   Submission:  `GET  {transfer_url}/transfer/submission_id`
//!   Submit:      `POST {transfer_url}/transfer`
//!   Task:        `GET  {transfer_url}/task/{id}`
//!   Listing:     `GET  {transfer_url}/endpoint/{name}/ls?path=...`
//!   Activation:  `POST {transfer_url}/endpoint/{name}/autoactivate?if_expires_in=100`
//!
//! Transfers are asynchronous: a submission yields a task id that callers
//! poll for status.  Upload and download are not distinct primitives here;
//! both are one endpoint-to-endpoint transfer with the source/destination
//! order chosen by the caller-facing operation.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::{
    self, DirectoryLister, DirectoryListing, EntryKind, ListEntry, ListOutcome, WalkLimits,
};
use crate::config::{GridConfig, WalkConfig};
use crate::destination::ArchivePathStrategy;
use crate::errors::TransferError;
use crate::model::{
    AccountCredentials, ArchiveDestination, DownloadDestination, DownloadRequest,
    DownloadResponse, FileLocation, MetadataEntry, PathAttributes, TransferBackendKind,
    TransferReport, TransferStatus, UploadRequest, UploadResponse, UploadSource,
    CHECKSUM_UNKNOWN,
};
use crate::progress::TransferProgressListener;

use super::proxy::{DataTransferProxy, TransferSession};

/// Error code the listing service returns for a path that exists as a
/// single file.  Control flow, not failure.
const NOT_DIRECTORY_CODE: &str = "ExternalError.DirListingFailed.NotDirectory";

/// Error code prefix for a path that does not exist.
const NOT_FOUND_CODE_PREFIX: &str = "ClientError.NotFound";

/// Activation response code prefix signalling failure.
const AUTO_ACTIVATION_FAILED_PREFIX: &str = "AutoActivationFailed";

// -- Wire documents -----------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenDocument {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SubmissionIdDocument {
    value: String,
}

#[derive(Debug, Serialize)]
struct TransferItem {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    source_endpoint: String,
    source_path: String,
    destination_endpoint: String,
    destination_path: String,
    recursive: bool,
}

#[derive(Debug, Serialize)]
struct TransferDescriptor {
    #[serde(rename = "DATA_TYPE")]
    data_type: &'static str,
    submission_id: String,
    verify_checksum: bool,
    delete_destination_extra: bool,
    preserve_timestamp: bool,
    encrypt_data: bool,
    #[serde(rename = "DATA")]
    data: Vec<TransferItem>,
}

impl TransferDescriptor {
    /// Descriptor with exactly one transfer item: checksum verification
    /// on, no destructive delete, no timestamp preservation, no inline
    /// encryption.
    fn single(
        submission_id: String,
        source: &FileLocation,
        destination: &FileLocation,
        recursive: bool,
    ) -> Self {
        Self {
            data_type: "transfer",
            submission_id,
            verify_checksum: true,
            delete_destination_extra: false,
            preserve_timestamp: false,
            encrypt_data: false,
            data: vec![TransferItem {
                data_type: "transfer_item",
                source_endpoint: source.container.clone(),
                source_path: source.path.clone(),
                destination_endpoint: destination.container.clone(),
                destination_path: destination.path.clone(),
                recursive,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct SubmitDocument {
    task_id: String,
}

#[derive(Debug, Deserialize)]
struct TaskDocument {
    #[serde(rename = "type", default)]
    task_type: String,
    status: String,
    #[serde(default)]
    request_time: Option<String>,
    #[serde(default)]
    deadline: Option<String>,
    #[serde(default)]
    completion_time: Option<String>,
    #[serde(default)]
    subtasks_total: i64,
    #[serde(default)]
    subtasks_succeeded: i64,
    #[serde(default)]
    subtasks_expired: i64,
    #[serde(default)]
    subtasks_canceled: i64,
    #[serde(default)]
    subtasks_pending: i64,
    #[serde(default)]
    subtasks_retrying: i64,
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    source_endpoint: Option<String>,
    #[serde(default)]
    destination_endpoint: Option<String>,
    #[serde(default)]
    encrypt_data: bool,
    #[serde(default)]
    verify_checksum: bool,
    #[serde(default)]
    delete_destination_extra: bool,
    #[serde(default)]
    files: i64,
    #[serde(default)]
    files_skipped: i64,
    #[serde(default)]
    directories: i64,
    #[serde(default)]
    bytes_transferred: i64,
    #[serde(default)]
    bytes_checksummed: i64,
    #[serde(default)]
    effective_bytes_per_second: f64,
    #[serde(default)]
    faults: i64,
}

#[derive(Debug, Deserialize)]
struct ListDocument {
    #[serde(rename = "DATA", default)]
    data: Vec<ListEntryDocument>,
    endpoint: String,
    path: String,
}

#[derive(Debug, Deserialize)]
struct ListEntryDocument {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
    #[serde(default)]
    size: i64,
}

impl ListDocument {
    fn into_listing(self) -> DirectoryListing {
        let entries = self
            .data
            .into_iter()
            .map(|entry| ListEntry {
                kind: match entry.entry_type.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                name: entry.name,
                size: entry.size,
            })
            .collect();
        DirectoryListing {
            // The echoed path may carry a trailing slash; trim it so child
            // paths join cleanly.
            location: FileLocation::new(self.endpoint, self.path.trim_end_matches('/')),
            entries,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorDocument {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ActivationDocument {
    code: String,
}

// -- Session ------------------------------------------------------------------

/// Grid session: the bearer token issued at login.
#[derive(Clone)]
pub struct GridSession {
    access_token: String,
}

// -- Backend ------------------------------------------------------------------

/// Poll-based grid transfer backend.
pub struct GridBackend {
    /// HTTP client for the transfer and token services.
    client: reqwest::Client,
    /// Base URL of the transfer API.
    transfer_url: String,
    /// Base URL of the token service.
    auth_url: String,
    /// Where uploads land.
    archive: ArchiveDestination,
    /// Placement rule for resolving archive destinations.
    layout: Arc<dyn ArchivePathStrategy>,
    /// Bounds on the directory walk.
    limits: WalkLimits,
}

impl GridBackend {
    /// Create a new grid backend from configuration.
    pub fn new(
        config: &GridConfig,
        walk: &WalkConfig,
        layout: Arc<dyn ArchivePathStrategy>,
    ) -> Result<Self, TransferError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| TransferError::protocol("http client", e))?;

        info!(
            "grid backend initialized: transfer_url={} archive={}",
            config.transfer_url,
            config.archive.destination().location
        );

        Ok(Self {
            client,
            transfer_url: config.transfer_url.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.trim_end_matches('/').to_string(),
            archive: config.archive.destination(),
            layout,
            limits: WalkLimits {
                max_depth: walk.max_depth,
                max_entries: walk.max_entries,
            },
        })
    }

    /// URL prefix for endpoint-scoped resources.
    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/endpoint/{}",
            self.transfer_url,
            utf8_percent_encode(endpoint, NON_ALPHANUMERIC)
        )
    }

    /// Refresh the activation lease of `endpoint` ahead of a submission.
    ///
    /// Activation failure aborts the transfer; submitting against an
    /// inactive endpoint would fail remotely with a less actionable error.
    async fn auto_activate(
        &self,
        session: &GridSession,
        endpoint: &str,
    ) -> Result<(), TransferError> {
        let url = format!("{}/autoactivate?if_expires_in=100", self.endpoint_url(endpoint));

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| TransferError::EndpointActivation {
                endpoint: endpoint.to_string(),
                code: format!("request failed: {e}"),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(TransferError::EndpointActivation {
                endpoint: endpoint.to_string(),
                code: format!("HTTP {status}"),
            });
        }

        let doc: ActivationDocument =
            resp.json()
                .await
                .map_err(|e| TransferError::EndpointActivation {
                    endpoint: endpoint.to_string(),
                    code: format!("malformed activation document: {e}"),
                })?;

        if doc.code.starts_with(AUTO_ACTIVATION_FAILED_PREFIX) {
            return Err(TransferError::EndpointActivation {
                endpoint: endpoint.to_string(),
                code: doc.code,
            });
        }

        debug!("endpoint {} activated: {}", endpoint, doc.code);
        Ok(())
    }

    /// Acquire a fresh submission id.
    async fn fetch_submission_id(&self, session: &GridSession) -> Result<String, TransferError> {
        let url = format!("{}/transfer/submission_id", self.transfer_url);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| TransferError::protocol("submission_id", e))?;

        if !resp.status().is_success() {
            return Err(TransferError::protocol(
                "submission_id",
                format!("HTTP {}", resp.status()),
            ));
        }

        let doc: SubmissionIdDocument = resp
            .json()
            .await
            .map_err(|e| TransferError::protocol("submission_id", e))?;
        Ok(doc.value)
    }

    /// Submit one endpoint-to-endpoint transfer and return its task id.
    async fn transfer_data(
        &self,
        session: &GridSession,
        source: &FileLocation,
        destination: &FileLocation,
    ) -> Result<String, TransferError> {
        if !source.is_valid() {
            return Err(TransferError::InvalidLocation {
                location: source.to_string(),
                reason: "endpoint and path must be non-empty".to_string(),
            });
        }
        if !destination.is_valid() {
            return Err(TransferError::InvalidLocation {
                location: destination.to_string(),
                reason: "endpoint and path must be non-empty".to_string(),
            });
        }

        self.auto_activate(session, &source.container).await?;
        self.auto_activate(session, &destination.container).await?;

        // The recursive flag requires knowing whether the source is a
        // directory, so submission is preceded by an attribute probe.
        let recursive = self
            .path_attributes(session, source, false)
            .await
            .is_directory;

        let submission_id = self.fetch_submission_id(session).await?;
        let descriptor = TransferDescriptor::single(submission_id, source, destination, recursive);

        let resp = self
            .client
            .post(format!("{}/transfer", self.transfer_url))
            .bearer_auth(&session.access_token)
            .json(&descriptor)
            .send()
            .await
            .map_err(|e| TransferError::transfer(source, destination, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferError::transfer(
                source,
                destination,
                format!("submission rejected (HTTP {status}): {body}"),
            ));
        }

        let doc: SubmitDocument = resp
            .json()
            .await
            .map_err(|e| TransferError::transfer(source, destination, e))?;

        debug!("transfer task submitted: {}", doc.task_id);
        Ok(doc.task_id)
    }

    /// Fetch the task document for a request id.
    async fn get_task(
        &self,
        session: &GridSession,
        request_id: &str,
    ) -> Result<TaskDocument, TransferError> {
        let url = format!(
            "{}/task/{}",
            self.transfer_url,
            utf8_percent_encode(request_id, NON_ALPHANUMERIC)
        );
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .send()
            .await
            .map_err(|e| TransferError::protocol(format!("task {request_id}"), e))?;

        if !resp.status().is_success() {
            return Err(TransferError::protocol(
                format!("task {request_id}"),
                format!("HTTP {}", resp.status()),
            ));
        }

        resp.json()
            .await
            .map_err(|e| TransferError::protocol(format!("task {request_id}"), e))
    }

    /// List `location` as a directory, translating the protocol's error
    /// codes into an explicit outcome.
    async fn list_directory(&self, session: &GridSession, location: &FileLocation) -> ListOutcome {
        let url = format!("{}/ls", self.endpoint_url(&location.container));
        let resp = match self
            .client
            .get(&url)
            .bearer_auth(&session.access_token)
            .query(&[("path", location.path.as_str())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return ListOutcome::Failed(format!("list request failed: {e}")),
        };

        let status = resp.status();
        if status.is_success() {
            return match resp.json::<ListDocument>().await {
                Ok(doc) => ListOutcome::Listed(doc.into_listing()),
                Err(e) => ListOutcome::Failed(format!("malformed listing document: {e}")),
            };
        }

        let body = resp.text().await.unwrap_or_default();
        classify_listing_error(status, &body)
    }

    /// Resolve path attributes through the recursive walker.
    async fn path_attributes(
        &self,
        session: &GridSession,
        location: &FileLocation,
        compute_size: bool,
    ) -> PathAttributes {
        let lister = GridLister {
            backend: self,
            session: session.clone(),
        };
        attributes::resolve_path_attributes(&lister, location, compute_size, &self.limits).await
    }
}

/// Translate a listing error response into an explicit outcome.
///
/// The not-a-directory sentinel means the path exists as a single file;
/// a missing path is `NotFound`; everything else is a genuine failure.
fn classify_listing_error(status: StatusCode, body: &str) -> ListOutcome {
    match serde_json::from_str::<ErrorDocument>(body) {
        Ok(doc) => {
            let code = doc.code.unwrap_or_default();
            if code == NOT_DIRECTORY_CODE {
                ListOutcome::NotADirectory
            } else if status == StatusCode::NOT_FOUND || code.starts_with(NOT_FOUND_CODE_PREFIX) {
                ListOutcome::NotFound
            } else {
                ListOutcome::Failed(format!(
                    "listing rejected ({code}): {}",
                    doc.message.unwrap_or_default()
                ))
            }
        }
        Err(_) if status == StatusCode::NOT_FOUND => ListOutcome::NotFound,
        Err(_) => ListOutcome::Failed(format!("HTTP {status}: {body}")),
    }
}

/// Listing adapter feeding the recursive attribute resolver.
struct GridLister<'a> {
    backend: &'a GridBackend,
    session: GridSession,
}

impl DirectoryLister for GridLister<'_> {
    fn list(
        &self,
        location: &FileLocation,
    ) -> Pin<Box<dyn Future<Output = ListOutcome> + Send + '_>> {
        let location = location.clone();
        Box::pin(async move { self.backend.list_directory(&self.session, &location).await })
    }
}

// -- Report mapping -----------------------------------------------------------

/// Convert the grid's lexical timestamp (`YYYY-MM-DD HH:MM:SS±HH:MM`) into
/// a structured value.  A `"null"` literal, an empty string, or an absent
/// field all map to `None` -- never an epoch placeholder.
fn parse_grid_time(raw: &str) -> Option<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }

    let lexical = trimmed.replace(' ', "T");
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&lexical) {
        return Some(parsed);
    }

    // Timestamps without an explicit offset are UTC.
    chrono::NaiveDateTime::parse_from_str(&lexical, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

fn report_from_task(request_id: &str, task: TaskDocument) -> TransferReport {
    TransferReport {
        task_id: request_id.to_string(),
        status: TransferStatus::from_grid_task_status(&task.status),
        task_type: task.task_type,
        native_status: task.status,
        request_time: task.request_time.as_deref().and_then(parse_grid_time),
        deadline: task.deadline.as_deref().and_then(parse_grid_time),
        completion_time: task.completion_time.as_deref().and_then(parse_grid_time),
        subtasks_total: task.subtasks_total,
        subtasks_succeeded: task.subtasks_succeeded,
        subtasks_expired: task.subtasks_expired,
        subtasks_canceled: task.subtasks_canceled,
        subtasks_pending: task.subtasks_pending,
        subtasks_retrying: task.subtasks_retrying,
        command: task.command,
        source_endpoint: task.source_endpoint,
        destination_endpoint: task.destination_endpoint,
        data_encryption: task.encrypt_data,
        checksum_verification: task.verify_checksum,
        delete_destination_extra: task.delete_destination_extra,
        files: task.files,
        files_skipped: task.files_skipped,
        directories: task.directories,
        bytes_transferred: task.bytes_transferred,
        bytes_checksummed: task.bytes_checksummed,
        effective_bytes_per_second: task.effective_bytes_per_second,
        faults: task.faults,
    }
}

// -- Trait implementation -----------------------------------------------------

impl DataTransferProxy for GridBackend {
    fn kind(&self) -> TransferBackendKind {
        TransferBackendKind::Grid
    }

    fn authenticate(
        &self,
        account: &AccountCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TransferSession, TransferError>> + Send + '_>> {
        let account = account.clone();
        Box::pin(async move {
            if account.id.is_empty() || account.secret.is_empty() {
                return Err(TransferError::Authentication {
                    reason: "missing client id or secret".to_string(),
                });
            }

            let url = format!("{}/token", self.auth_url);
            let resp = self
                .client
                .post(&url)
                .basic_auth(&account.id, Some(&account.secret))
                .form(&[("grant_type", "client_credentials")])
                .send()
                .await
                .map_err(|e| TransferError::Authentication {
                    reason: format!("token request failed: {e}"),
                })?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(TransferError::Authentication {
                    reason: format!("token endpoint returned {status}: {body}"),
                });
            }

            let doc: TokenDocument = resp.json().await.map_err(|e| TransferError::Authentication {
                reason: format!("malformed token document: {e}"),
            })?;

            Ok(TransferSession::Grid(GridSession {
                access_token: doc.access_token,
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
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let metadata_count = metadata.len();
        Box::pin(async move {
            let UploadSource::Remote(source) = request.source else {
                return Err(TransferError::InvalidLocation {
                    location: request.path,
                    reason: "grid uploads require a remote source location".to_string(),
                });
            };

            if metadata_count > 0 {
                debug!(
                    "grid transfers carry no user metadata; dropping {} entries",
                    metadata_count
                );
            }
            if listener.is_some() {
                debug!("grid transfers surface no incremental progress; listener ignored");
            }

            let destination = self.layout.resolve(
                &self.archive,
                &request.path,
                request.caller_object_id.as_deref(),
            );

            let task_id = self.transfer_data(&session, &source, &destination).await?;

            Ok(UploadResponse {
                archive_location: destination,
                backend: TransferBackendKind::Grid,
                request_id: task_id,
                checksum: CHECKSUM_UNKNOWN.to_string(),
                status: TransferStatus::Pending,
            })
        })
    }

    fn download_data_object(
        &self,
        session: &TransferSession,
        request: DownloadRequest,
        listener: Option<Arc<dyn TransferProgressListener>>,
    ) -> Pin<Box<dyn Future<Output = Result<DownloadResponse, TransferError>> + Send + '_>> {
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        Box::pin(async move {
            let DownloadRequest {
                archive_location,
                destination,
            } = request;

            let DownloadDestination::Remote(dest) = destination else {
                return Err(TransferError::InvalidLocation {
                    location: archive_location.to_string(),
                    reason: "grid downloads require a remote destination location".to_string(),
                });
            };

            if listener.is_some() {
                debug!("grid transfers surface no incremental progress; listener ignored");
            }

            let task_id = self
                .transfer_data(&session, &archive_location, &dest)
                .await?;

            Ok(DownloadResponse {
                request_id: task_id,
                destination: DownloadDestination::Remote(dest),
            })
        })
    }

    fn get_data_transfer_status(
        &self,
        session: &TransferSession,
        request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TransferStatus, TransferError>> + Send + '_>> {
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let request_id = request_id.to_string();
        Box::pin(async move {
            let task = self.get_task(&session, &request_id).await?;
            Ok(TransferStatus::from_grid_task_status(&task.status))
        })
    }

    fn get_data_transfer_report(
        &self,
        session: &TransferSession,
        request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<TransferReport, TransferError>> + Send + '_>> {
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let request_id = request_id.to_string();
        Box::pin(async move {
            let task = self.get_task(&session, &request_id).await?;
            Ok(report_from_task(&request_id, task))
        })
    }

    fn get_data_transfer_size(
        &self,
        session: &TransferSession,
        request_id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<i64, TransferError>> + Send + '_>> {
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let request_id = request_id.to_string();
        Box::pin(async move {
            let task = self.get_task(&session, &request_id).await?;
            Ok(task.bytes_transferred)
        })
    }

    fn get_path_attributes(
        &self,
        session: &TransferSession,
        location: &FileLocation,
        compute_size: bool,
    ) -> Pin<Box<dyn Future<Output = Result<PathAttributes, TransferError>> + Send + '_>> {
        let session = match session.as_grid() {
            Ok(session) => session.clone(),
            Err(e) => return Box::pin(async move { Err(e) }),
        };
        let location = location.clone();
        Box::pin(async move {
            Ok(self
                .path_attributes(&session, &location, compute_size)
                .await)
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

    fn test_backend() -> GridBackend {
        let config = GridConfig {
            transfer_url: "https://transfer.example.org/v0.10/".to_string(),
            auth_url: "https://auth.example.org".to_string(),
            archive: ArchiveConfig {
                container: "archive-endpoint".to_string(),
                path: "/archive/root".to_string(),
                archive_type: ArchiveType::Archive,
            },
        };
        GridBackend::new(&config, &WalkConfig::default(), default_layout()).unwrap()
    }

    #[test]
    fn test_parse_grid_time_with_offset() {
        let parsed = parse_grid_time("2016-01-15 20:33:10+00:00").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2016-01-15T20:33:10+00:00");
    }

    #[test]
    fn test_parse_grid_time_without_offset_is_utc() {
        let parsed = parse_grid_time("2016-01-15 20:33:10").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2016-01-15T20:33:10+00:00");
    }

    #[test]
    fn test_parse_grid_time_null_literal() {
        assert!(parse_grid_time("null").is_none());
        assert!(parse_grid_time("NULL").is_none());
        assert!(parse_grid_time("").is_none());
        assert!(parse_grid_time("  ").is_none());
    }

    #[test]
    fn test_transfer_descriptor_shape() {
        let descriptor = TransferDescriptor::single(
            "sub-1".to_string(),
            &FileLocation::new("ep-src", "/src/dir"),
            &FileLocation::new("ep-dst", "/dst/dir"),
            true,
        );
        let value = serde_json::to_value(&descriptor).unwrap();

        assert_eq!(value["DATA_TYPE"], "transfer");
        assert_eq!(value["submission_id"], "sub-1");
        assert_eq!(value["verify_checksum"], true);
        assert_eq!(value["delete_destination_extra"], false);
        assert_eq!(value["preserve_timestamp"], false);
        assert_eq!(value["encrypt_data"], false);

        let items = value["DATA"].as_array().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["DATA_TYPE"], "transfer_item");
        assert_eq!(items[0]["source_endpoint"], "ep-src");
        assert_eq!(items[0]["source_path"], "/src/dir");
        assert_eq!(items[0]["destination_endpoint"], "ep-dst");
        assert_eq!(items[0]["destination_path"], "/dst/dir");
        assert_eq!(items[0]["recursive"], true);
    }

    #[test]
    fn test_task_document_full() {
        let json = r#"{
            "type": "TRANSFER",
            "status": "SUCCEEDED",
            "request_time": "2016-01-15 20:33:10+00:00",
            "deadline": "null",
            "completion_time": "2016-01-15 21:00:00+00:00",
            "subtasks_total": 3,
            "subtasks_succeeded": 3,
            "subtasks_expired": 0,
            "subtasks_canceled": 0,
            "subtasks_pending": 0,
            "subtasks_retrying": 0,
            "command": "API 0.10",
            "source_endpoint": "go#ep1",
            "destination_endpoint": "go#ep2",
            "encrypt_data": false,
            "verify_checksum": true,
            "delete_destination_extra": false,
            "files": 2,
            "files_skipped": 0,
            "directories": 1,
            "bytes_transferred": 4096,
            "bytes_checksummed": 4096,
            "effective_bytes_per_second": 1024.5,
            "faults": 0
        }"#;
        let task: TaskDocument = serde_json::from_str(json).unwrap();
        let report = report_from_task("task-1", task);

        assert_eq!(report.task_id, "task-1");
        assert_eq!(report.native_status, "SUCCEEDED");
        assert_eq!(report.status, TransferStatus::Archived);
        assert!(report.request_time.is_some());
        // The "null" literal maps to an absent value, not an epoch.
        assert!(report.deadline.is_none());
        assert!(report.completion_time.is_some());
        assert_eq!(report.bytes_transferred, 4096);
        assert_eq!(report.files, 2);
        assert!((report.effective_bytes_per_second - 1024.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_task_document_minimal() {
        // A live task may omit optional fields entirely.
        let task: TaskDocument = serde_json::from_str(r#"{"status": "ACTIVE"}"#).unwrap();
        let report = report_from_task("task-2", task);

        assert_eq!(report.status, TransferStatus::InProgress);
        assert!(report.request_time.is_none());
        assert!(report.deadline.is_none());
        assert!(report.completion_time.is_none());
        assert_eq!(report.bytes_transferred, 0);
    }

    #[test]
    fn test_list_document_conversion() {
        let json = r#"{
            "DATA": [
                {"name": "a.bin", "type": "file", "size": 10},
                {"name": "sub", "type": "dir", "size": 0},
                {"name": "link", "type": "symlink", "size": 99}
            ],
            "endpoint": "go#ep1",
            "path": "/data/"
        }"#;
        let doc: ListDocument = serde_json::from_str(json).unwrap();
        let listing = doc.into_listing();

        assert_eq!(listing.location, FileLocation::new("go#ep1", "/data"));
        assert_eq!(listing.entries.len(), 3);
        assert_eq!(listing.entries[0].kind, EntryKind::File);
        assert_eq!(listing.entries[0].size, 10);
        assert_eq!(listing.entries[1].kind, EntryKind::Dir);
        assert_eq!(listing.entries[2].kind, EntryKind::Other);
    }

    #[test]
    fn test_not_directory_sentinel_is_the_file_case() {
        let body =
            r#"{"code": "ExternalError.DirListingFailed.NotDirectory", "message": "not a directory"}"#;
        let outcome = classify_listing_error(StatusCode::BAD_REQUEST, body);
        assert!(matches!(outcome, ListOutcome::NotADirectory));
    }

    #[test]
    fn test_missing_path_classified_not_found() {
        let body = r#"{"code": "ClientError.NotFound", "message": "gone"}"#;
        assert!(matches!(
            classify_listing_error(StatusCode::NOT_FOUND, body),
            ListOutcome::NotFound
        ));
        // The code alone is decisive even on an unexpected HTTP status.
        assert!(matches!(
            classify_listing_error(StatusCode::BAD_REQUEST, body),
            ListOutcome::NotFound
        ));
        // A bare 404 with a non-JSON body still counts as absent.
        assert!(matches!(
            classify_listing_error(StatusCode::NOT_FOUND, "gone"),
            ListOutcome::NotFound
        ));
    }

    #[test]
    fn test_other_listing_errors_are_failures() {
        let body = r#"{"code": "EndpointError", "message": "endpoint offline"}"#;
        let outcome = classify_listing_error(StatusCode::SERVICE_UNAVAILABLE, body);
        match outcome {
            ListOutcome::Failed(reason) => {
                assert!(reason.contains("EndpointError"));
                assert!(reason.contains("endpoint offline"));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_endpoint_url_encodes_name() {
        let backend = test_backend();
        let url = backend.endpoint_url("go#ep1");
        assert_eq!(
            url,
            "https://transfer.example.org/v0.10/endpoint/go%23ep1"
        );
    }

    #[test]
    fn test_session_mismatch_is_rejected() {
        let session = TransferSession::Grid(GridSession {
            access_token: "token".to_string(),
        });
        assert!(session.as_grid().is_ok());
        let err = session.as_object_store().unwrap_err();
        assert_eq!(err.code(), "Authentication");
    }

    #[tokio::test]
    async fn test_invalid_source_location_rejected_before_any_call() {
        let backend = test_backend();
        let session = GridSession {
            access_token: "token".to_string(),
        };
        let err = backend
            .transfer_data(
                &session,
                &FileLocation::new("", "/src"),
                &FileLocation::new("ep", "/dst"),
            )
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidLocation");
    }

    #[tokio::test]
    async fn test_grid_upload_requires_remote_source() {
        let backend = test_backend();
        let session = TransferSession::Grid(GridSession {
            access_token: "token".to_string(),
        });
        let request = UploadRequest {
            path: "/project/data.bin".to_string(),
            caller_object_id: None,
            source: UploadSource::Bytes(bytes::Bytes::from_static(b"payload")),
        };
        let err = backend
            .upload_data_object(&session, request, &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "InvalidLocation");
    }
}
