//! Multipart upload orchestrator.
//!
//! Pulls a byte source in bounded chunks and drives the store's multipart
//! protocol: initiate, upload parts numbered from 1, commit with the full
//! ordered descriptor list. Once initiation succeeds the session must not
//! leak: every failure path aborts it explicitly before surfacing the
//! original error, and an abort-on-drop guard covers cancelled requests
//! whose handler future is dropped mid-transfer.

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt, pin_mut};
use std::io;
use tracing::{info, warn};

use crate::services::gateway::{GatewayResult, ObjectStore, PartDescriptor};

/// Fixed upload chunk size. S3 requires every part except the last to be at
/// least 5 MiB.
pub const PART_SIZE: usize = 5 * 1024 * 1024;

/// Upload `source` under `key` with the declared content type, returning the
/// committed key.
///
/// The source is pulled, never pushed: at most one part buffer is held in
/// memory regardless of object size. Individual part failures are not
/// retried; any failure aborts the whole session.
pub async fn upload_stream<T, S>(
    store: &T,
    source: S,
    key: &str,
    content_type: &str,
) -> GatewayResult<String>
where
    T: ObjectStore + Clone + 'static,
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    upload_with_part_size(store, source, key, content_type, PART_SIZE).await
}

async fn upload_with_part_size<T, S>(
    store: &T,
    source: S,
    key: &str,
    content_type: &str,
    part_size: usize,
) -> GatewayResult<String>
where
    T: ObjectStore + Clone + 'static,
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    // Point of no return: from here on the session exists in the store and
    // must be committed or aborted before this function returns. The guard
    // is constructed only from a successful initiate response, so no abort
    // can ever run with an unassigned upload id.
    let upload_id = store.create_multipart(key, content_type).await?;
    let mut guard = AbortOnDrop::arm(store.clone(), key, &upload_id);

    match transfer_parts(store, source, key, &upload_id, part_size).await {
        Ok(parts) => {
            info!(key, parts, "committed multipart upload");
            guard.disarm();
            Ok(key.to_string())
        }
        Err(err) => {
            // Abort failure is logged but must not mask the original cause.
            if let Err(abort_err) = store.abort_multipart(key, &upload_id).await {
                warn!(key, upload_id, error = %abort_err, "failed to abort multipart upload");
            }
            guard.disarm();
            Err(err)
        }
    }
}

/// Pull the source to exhaustion, uploading a part per full `part_size`
/// slice plus the non-empty remainder, then commit. Returns the number of
/// parts committed.
async fn transfer_parts<T, S>(
    store: &T,
    source: S,
    key: &str,
    upload_id: &str,
    part_size: usize,
) -> GatewayResult<usize>
where
    T: ObjectStore,
    S: Stream<Item = io::Result<Bytes>> + Send,
{
    pin_mut!(source);

    let mut parts: Vec<PartDescriptor> = Vec::new();
    let mut buf = BytesMut::new();
    let mut next_number: i32 = 1;

    while let Some(chunk) = source.next().await {
        buf.extend_from_slice(&chunk?);
        while buf.len() >= part_size {
            let body = buf.split_to(part_size).freeze();
            let etag = store.upload_part(key, upload_id, next_number, body).await?;
            parts.push(PartDescriptor {
                number: next_number,
                etag,
            });
            next_number += 1;
        }
    }

    if !buf.is_empty() {
        let body = buf.split().freeze();
        let etag = store.upload_part(key, upload_id, next_number, body).await?;
        parts.push(PartDescriptor {
            number: next_number,
            etag,
        });
    }

    // An empty source reaches the commit with zero parts; the store rejects
    // that and the rejection surfaces as Internal like any other failure.
    store.complete_multipart(key, upload_id, &parts).await?;
    Ok(parts.len())
}

/// Aborts the session from `Drop` when the owning future is dropped before
/// commit or explicit abort — the cleanup path for cancelled HTTP requests.
struct AbortOnDrop<T: ObjectStore + Clone + 'static> {
    store: T,
    key: String,
    upload_id: String,
    armed: bool,
}

impl<T: ObjectStore + Clone + 'static> AbortOnDrop<T> {
    fn arm(store: T, key: &str, upload_id: &str) -> Self {
        Self {
            store,
            key: key.to_string(),
            upload_id: upload_id.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T: ObjectStore + Clone + 'static> Drop for AbortOnDrop<T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let upload_id = std::mem::take(&mut self.upload_id);
        // Drop cannot await; fire the abort as a task on the runtime.
        tokio::spawn(async move {
            if let Err(err) = store.abort_multipart(&key, &upload_id).await {
                warn!(key, upload_id, error = %err, "failed to abort cancelled multipart upload");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::GatewayError;
    use crate::services::mock::MockStore;
    use futures::stream;

    fn source_of(chunks: Vec<&'static [u8]>) -> impl Stream<Item = io::Result<Bytes>> + Send {
        stream::iter(chunks.into_iter().map(|c| Ok(Bytes::from_static(c))))
    }

    #[tokio::test]
    async fn splits_source_into_fixed_size_parts() {
        let store = MockStore::new();
        // 10 bytes at part size 4: ceil(10/4) = 3 parts of 4, 4, 2 bytes.
        let source = source_of(vec![b"abc", b"defg", b"hij"]);

        let key = upload_with_part_size(&store, source, "data.bin", "application/octet-stream", 4)
            .await
            .unwrap();

        assert_eq!(key, "data.bin");
        let (content_type, bytes) = store.object("data.bin").unwrap();
        assert_eq!(content_type, "application/octet-stream");
        assert_eq!(bytes, b"abcdefghij");
        assert_eq!(store.committed_parts("data.bin"), vec![(1, 4), (2, 4), (3, 2)]);
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn source_smaller_than_part_size_commits_one_part() {
        let store = MockStore::new();
        let source = source_of(vec![b"tiny"]);

        upload_with_part_size(&store, source, "tiny.txt", "text/plain", 1024)
            .await
            .unwrap();

        assert_eq!(store.committed_parts("tiny.txt"), vec![(1, 4)]);
        let (_, bytes) = store.object("tiny.txt").unwrap();
        assert_eq!(bytes, b"tiny");
    }

    #[tokio::test]
    async fn part_failure_aborts_with_the_recorded_upload_id() {
        let store = MockStore::new().fail_on_part(2);
        let source = source_of(vec![b"abcdefgh", b"ij"]);

        let err = upload_with_part_size(&store, source, "data.bin", "text/plain", 4)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Internal(_)));
        assert_eq!(store.aborted(), vec!["upload-1"]);
        assert!(store.object("data.bin").is_none());
        assert_eq!(store.pending_uploads(), 0);
    }

    #[tokio::test]
    async fn empty_source_is_rejected_and_aborted() {
        let store = MockStore::new();
        let source = source_of(vec![]);

        let err = upload_with_part_size(&store, source, "empty.bin", "text/plain", 4)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Internal(_)));
        assert_eq!(store.aborted(), vec!["upload-1"]);
        assert!(store.object("empty.bin").is_none());
    }

    #[tokio::test]
    async fn source_read_error_aborts_the_session() {
        let store = MockStore::new();
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"abcd")),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "client went away")),
        ]);

        let err = upload_with_part_size(&store, source, "data.bin", "text/plain", 4)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Internal(_)));
        assert_eq!(store.aborted(), vec!["upload-1"]);
        assert!(store.object("data.bin").is_none());
    }

    #[tokio::test]
    async fn abort_failure_does_not_mask_the_original_error() {
        let store = MockStore::new().fail_on_part(1).fail_abort();
        let source = source_of(vec![b"abcd"]);

        let err = upload_with_part_size(&store, source, "data.bin", "text/plain", 4)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("injected part failure"));
        // The abort was attempted even though it failed.
        assert_eq!(store.aborted(), vec!["upload-1"]);
    }
}
