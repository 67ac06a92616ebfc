//! In-memory `ObjectStore` used by the engine tests.
//!
//! Mirrors the store behaviors the engine depends on: multipart sessions
//! keyed by upload id, rejection of zero-part commits, ascending part-number
//! validation at commit, idempotent delete, and paginated lexicographic
//! listing. Failure injection covers part uploads and aborts.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

use crate::services::gateway::{
    ByteChunks, GatewayError, GatewayResult, ListPage, ObjectStore, PartDescriptor,
};

#[derive(Default)]
struct Inner {
    /// key -> (content type, assembled bytes)
    objects: HashMap<String, (String, Vec<u8>)>,
    /// upload id -> pending session
    uploads: HashMap<String, PendingUpload>,
    /// upload ids for which abort was attempted, in order
    aborted: Vec<String>,
    /// key -> (part number, part length) of the last committed upload
    committed: HashMap<String, Vec<(i32, usize)>>,
    next_upload: u32,
}

struct PendingUpload {
    key: String,
    content_type: String,
    parts: Vec<(i32, Bytes)>,
}

#[derive(Clone, Default)]
pub struct MockStore {
    inner: Arc<Mutex<Inner>>,
    fail_on_part: Option<i32>,
    fail_abort: bool,
    page_size: usize,
}

impl MockStore {
    pub fn new() -> Self {
        Self {
            page_size: 1000,
            ..Self::default()
        }
    }

    /// Fail the upload of the part with this number.
    pub fn fail_on_part(mut self, part_number: i32) -> Self {
        self.fail_on_part = Some(part_number);
        self
    }

    /// Make abort calls fail (they are still recorded as attempted).
    pub fn fail_abort(mut self) -> Self {
        self.fail_abort = true;
        self
    }

    /// Keys per listing page.
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Insert a stored object directly.
    pub fn seed(&self, key: &str, content_type: &str, bytes: &[u8]) {
        self.inner
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (content_type.to_string(), bytes.to_vec()));
    }

    pub fn object(&self, key: &str) -> Option<(String, Vec<u8>)> {
        self.inner.lock().unwrap().objects.get(key).cloned()
    }

    /// (part number, part length) pairs of the committed upload for `key`.
    pub fn committed_parts(&self, key: &str) -> Vec<(i32, usize)> {
        self.inner
            .lock()
            .unwrap()
            .committed
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn pending_uploads(&self) -> usize {
        self.inner.lock().unwrap().uploads.len()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.inner.lock().unwrap().aborted.clone()
    }
}

#[async_trait]
impl ObjectStore for MockStore {
    async fn ensure_bucket(&self) -> GatewayResult<()> {
        Ok(())
    }

    async fn create_multipart(&self, key: &str, content_type: &str) -> GatewayResult<String> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_upload += 1;
        let upload_id = format!("upload-{}", inner.next_upload);
        inner.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: Vec::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Bytes,
    ) -> GatewayResult<String> {
        if self.fail_on_part == Some(part_number) {
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "injected part failure"
            )));
        }
        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| GatewayError::Internal(anyhow::anyhow!("unknown upload id")))?;
        upload.parts.push((part_number, body));
        Ok(format!("etag-{part_number}"))
    }

    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartDescriptor],
    ) -> GatewayResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let upload = inner
            .uploads
            .remove(upload_id)
            .ok_or_else(|| GatewayError::Internal(anyhow::anyhow!("unknown upload id")))?;

        if parts.is_empty() {
            // S3 rejects CompleteMultipartUpload with no parts.
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "commit with zero parts rejected"
            )));
        }
        for (index, part) in parts.iter().enumerate() {
            if part.number != index as i32 + 1 {
                return Err(GatewayError::Internal(anyhow::anyhow!(
                    "parts not declared in ascending order"
                )));
            }
            if part.etag != format!("etag-{}", part.number) {
                return Err(GatewayError::Internal(anyhow::anyhow!(
                    "etag mismatch for part {}",
                    part.number
                )));
            }
        }

        let mut uploaded = upload.parts;
        uploaded.sort_by_key(|(number, _)| *number);
        let sizes: Vec<(i32, usize)> = uploaded
            .iter()
            .map(|(number, body)| (*number, body.len()))
            .collect();
        let bytes: Vec<u8> = uploaded
            .into_iter()
            .flat_map(|(_, body)| body.to_vec())
            .collect();

        inner
            .objects
            .insert(key.to_string(), (upload.content_type, bytes));
        inner.committed.insert(upload.key, sizes);
        Ok(())
    }

    async fn abort_multipart(&self, _key: &str, upload_id: &str) -> GatewayResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.aborted.push(upload_id.to_string());
        inner.uploads.remove(upload_id);
        if self.fail_abort {
            return Err(GatewayError::Internal(anyhow::anyhow!(
                "injected abort failure"
            )));
        }
        Ok(())
    }

    async fn open_object(&self, key: &str) -> GatewayResult<(String, ByteChunks)> {
        let (content_type, bytes) = self
            .object(key)
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))?;
        let chunks: Vec<io::Result<Bytes>> = bytes
            .chunks(1024)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok((content_type, stream::iter(chunks).boxed()))
    }

    async fn content_type_of(&self, key: &str) -> GatewayResult<String> {
        self.object(key)
            .map(|(content_type, _)| content_type)
            .ok_or_else(|| GatewayError::NotFound(key.to_string()))
    }

    async fn delete_object(&self, key: &str) -> GatewayResult<()> {
        self.inner.lock().unwrap().objects.remove(key);
        Ok(())
    }

    async fn list_page(&self, token: Option<String>) -> GatewayResult<ListPage> {
        let inner = self.inner.lock().unwrap();
        let mut keys: Vec<String> = inner.objects.keys().cloned().collect();
        keys.sort();

        let start = token
            .as_deref()
            .map(|t| t.parse::<usize>().expect("mock continuation token"))
            .unwrap_or(0);
        let end = (start + self.page_size).min(keys.len());
        let next = (end < keys.len()).then(|| end.to_string());

        Ok(ListPage {
            keys: keys[start..end].to_vec(),
            next,
        })
    }
}
