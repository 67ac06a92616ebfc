//! src/services/gateway.rs
//!
//! S3Gateway — the single point of connection to the S3-compatible object
//! store. Every store round trip in the crate goes through the `ObjectStore`
//! primitives defined here, and every store-level failure is translated into
//! the two-variant `GatewayError` taxonomy by one function at this boundary.
//! The higher-level transfer components (upload orchestrator, download
//! streamer, lister) are written against the trait, not the SDK.

use anyhow::anyhow;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::{
    Client,
    config::Credentials,
    error::SdkError,
    operation::create_bucket::CreateBucketError,
    primitives::ByteStream,
    types::{CompletedMultipartUpload, CompletedPart},
};
use bytes::Bytes;
use futures::{StreamExt, stream::BoxStream};
use std::io;
use thiserror::Error;
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};

use crate::config::AppConfig;

/// Size of each bounded read pulled off a store body during download.
pub const DOWNLOAD_CHUNK_SIZE: usize = 1024 * 1024;

/// Content type assumed whenever the store omits one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Failures surfaced by the gateway, already translated from store-level
/// detail. `NotFound` is recoverable at the HTTP layer (404); everything
/// else is `Internal` (500) with the cause logged where it occurred.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("object `{0}` not found")]
    NotFound(String),
    #[error("object store failure: {0}")]
    Internal(anyhow::Error),
}

impl From<anyhow::Error> for GatewayError {
    fn from(err: anyhow::Error) -> Self {
        GatewayError::Internal(err)
    }
}

impl From<io::Error> for GatewayError {
    fn from(err: io::Error) -> Self {
        GatewayError::Internal(err.into())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// A lazily-pulled sequence of byte chunks backed by a live store body.
/// Dropping it releases the underlying connection.
pub type ByteChunks = BoxStream<'static, io::Result<Bytes>>;

/// A part committed during a multipart upload: 1-based part number plus the
/// integrity tag the store returned for it. The store requires these in
/// ascending part-number order at commit time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    pub number: i32,
    pub etag: String,
}

/// One page of the store's listing API, in the store's native key order.
#[derive(Debug, Default)]
pub struct ListPage {
    pub keys: Vec<String>,
    pub next: Option<String>,
}

/// Primitive object-store operations. The transfer engine is generic over
/// this trait so it can be exercised against an in-memory store in tests.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create the configured bucket; already-owned is success.
    async fn ensure_bucket(&self) -> GatewayResult<()>;

    /// Initiate a multipart upload, returning the store-assigned upload id.
    async fn create_multipart(&self, key: &str, content_type: &str) -> GatewayResult<String>;

    /// Upload one part, returning its integrity tag.
    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> GatewayResult<String>;

    /// Commit a multipart upload from its ordered part descriptors.
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartDescriptor],
    ) -> GatewayResult<()>;

    /// Abort a multipart upload, discarding any uploaded parts.
    async fn abort_multipart(&self, key: &str, upload_id: &str) -> GatewayResult<()>;

    /// Open an object for streaming: its content type plus a lazy chunk
    /// stream. Fails with `NotFound` before any bytes are yielded.
    async fn open_object(&self, key: &str) -> GatewayResult<(String, ByteChunks)>;

    /// Content type of a stored object, defaulting when the store omits it.
    async fn content_type_of(&self, key: &str) -> GatewayResult<String>;

    /// Delete an object. Idempotent: a missing key is still success.
    async fn delete_object(&self, key: &str) -> GatewayResult<()>;

    /// Fetch one listing page, continuing from `token` when given.
    async fn list_page(&self, token: Option<String>) -> GatewayResult<ListPage>;
}

/// Translate an SDK failure into the gateway taxonomy, logging it with an
/// operation-specific message at the point of lowest-level detail. Applied
/// uniformly to every store call; a 404 from the store becomes `NotFound`
/// for keyed operations, anything else becomes `Internal`.
fn translate<E>(err: SdkError<E>, op: &'static str, key: Option<&str>) -> GatewayError
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let (Some(key), SdkError::ServiceError(service)) = (key, &err) {
        if service.raw().status().as_u16() == 404 {
            info!(key, "{op}: object not found");
            return GatewayError::NotFound(key.to_string());
        }
    }
    error!(error = %err, "{op} failed");
    GatewayError::Internal(anyhow!(err))
}

/// Gateway client for a single bucket of an S3-compatible store.
///
/// Cheap to clone; the SDK client shares its connection pool across clones,
/// and each operation acquires and releases transport per call.
#[derive(Clone)]
pub struct S3Gateway {
    client: Client,
    bucket: String,
}

impl S3Gateway {
    /// Build the SDK client from gateway configuration.
    ///
    /// Path-style addressing is forced so MinIO-style endpoints resolve
    /// without virtual-hosted bucket DNS. Static credentials are used when
    /// both keys are configured, otherwise the SDK's default chain applies.
    pub async fn connect(cfg: &AppConfig) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.s3_region.clone()))
            .endpoint_url(&cfg.s3_endpoint);

        if let (Some(access_key), Some(secret_key)) = (&cfg.s3_access_key, &cfg.s3_secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "s3-file-gateway",
            ));
        }

        let shared = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&shared)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: cfg.bucket.clone(),
        }
    }

    /// Readiness probe: HeadBucket against the configured bucket.
    pub async fn bucket_ready(&self) -> GatewayResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| translate(err, "bucket readiness probe", None))
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3Gateway {
    async fn ensure_bucket(&self) -> GatewayResult<()> {
        match self.client.create_bucket().bucket(&self.bucket).send().await {
            Ok(_) => {
                info!(bucket = %self.bucket, "created default bucket");
                Ok(())
            }
            Err(err)
                if err
                    .as_service_error()
                    .is_some_and(CreateBucketError::is_bucket_already_owned_by_you) =>
            {
                debug!(bucket = %self.bucket, "default bucket already exists");
                Ok(())
            }
            Err(err) => Err(translate(err, "create default bucket", None)),
        }
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> GatewayResult<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| translate(err, "initiate multipart upload", None))?;

        resp.upload_id()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Internal(anyhow!("store returned no upload id for `{key}`")))
    }

    async fn upload_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> GatewayResult<String> {
        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|err| translate(err, "upload part", None))?;

        resp.e_tag()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::Internal(anyhow!("store returned no etag for part {part_number} of `{key}`")))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartDescriptor],
    ) -> GatewayResult<()> {
        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|part| {
                CompletedPart::builder()
                    .set_part_number(Some(part.number))
                    .set_e_tag(Some(part.etag.clone()))
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map(|_| ())
            .map_err(|err| translate(err, "commit multipart upload", None))
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) -> GatewayResult<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| translate(err, "abort multipart upload", None))
    }

    async fn open_object(&self, key: &str) -> GatewayResult<(String, ByteChunks)> {
        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| translate(err, "download file", Some(key)))?;

        let content_type = resp
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let reader = resp.body.into_async_read();
        let chunks = ReaderStream::with_capacity(reader, DOWNLOAD_CHUNK_SIZE).boxed();

        Ok((content_type, chunks))
    }

    async fn content_type_of(&self, key: &str) -> GatewayResult<String> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| translate(err, "read file metadata", Some(key)))?;

        Ok(resp
            .content_type()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string())
    }

    async fn delete_object(&self, key: &str) -> GatewayResult<()> {
        // S3 DeleteObject succeeds for absent keys, which is exactly the
        // idempotent contract the HTTP layer exposes.
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| translate(err, "delete file", None))?;

        info!(key, "removed file if it existed");
        Ok(())
    }

    async fn list_page(&self, token: Option<String>) -> GatewayResult<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|err| translate(err, "list files", None))?;

        let keys = resp
            .contents()
            .iter()
            .filter_map(|obj| obj.key().map(str::to_string))
            .collect();
        let next = if resp.is_truncated().unwrap_or(false) {
            resp.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage { keys, next })
    }
}
