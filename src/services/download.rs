//! Download streamer.
//!
//! Exposes a stored object as its content type plus a lazy,
//! backpressure-respecting chunk stream. The store connection stays open for
//! the life of the stream and is released when it is exhausted or dropped.
//! A missing key fails fast with `NotFound` before any bytes are yielded; a
//! store error after bytes have flowed surfaces in the stream and truncates
//! the response.

use crate::services::gateway::{ByteChunks, GatewayResult, ObjectStore};

/// An opened object ready to be framed as a streaming HTTP response.
pub struct Download {
    pub content_type: String,
    pub stream: ByteChunks,
}

impl std::fmt::Debug for Download {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Download")
            .field("content_type", &self.content_type)
            .field("stream", &"<ByteChunks>")
            .finish()
    }
}

impl Download {
    /// `Content-Disposition` value for the response, or `None` for image
    /// types, which render inline.
    pub fn attachment_disposition(&self, key: &str) -> Option<String> {
        if self.content_type.contains("image") {
            None
        } else {
            Some(format!("attachment; filename={key}"))
        }
    }
}

/// Open `key` for streaming. One store round trip; the existence check is
/// implicit in the initial fetch.
pub async fn open<T: ObjectStore + ?Sized>(store: &T, key: &str) -> GatewayResult<Download> {
    let (content_type, stream) = store.open_object(key).await?;
    Ok(Download {
        content_type,
        stream,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::gateway::GatewayError;
    use crate::services::mock::MockStore;
    use crate::services::upload;
    use bytes::Bytes;
    use futures::{TryStreamExt, stream};
    use std::io;

    #[tokio::test]
    async fn round_trip_preserves_bytes_and_content_type() {
        let store = MockStore::new();
        let payload: Vec<u8> = (0..40_000u32).map(|n| n as u8).collect();
        let chunks: Vec<io::Result<Bytes>> = payload
            .chunks(7_000)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        upload::upload_stream(&store, stream::iter(chunks), "photo.jpg", "image/jpeg")
            .await
            .unwrap();

        let download = open(&store, "photo.jpg").await.unwrap();
        assert_eq!(download.content_type, "image/jpeg");

        let collected: Vec<Bytes> = download.stream.try_collect().await.unwrap();
        assert_eq!(collected.concat(), payload);
    }

    #[tokio::test]
    async fn missing_key_fails_before_yielding_bytes() {
        let store = MockStore::new();

        let err = open(&store, "absent.bin").await.unwrap_err();
        assert!(matches!(err, GatewayError::NotFound(key) if key == "absent.bin"));
    }

    #[tokio::test]
    async fn non_image_downloads_are_served_as_attachments() {
        let store = MockStore::new();
        store.seed("report.pdf", "application/pdf", b"%PDF-");
        store.seed("photo.jpg", "image/jpeg", b"\xff\xd8");

        let report = open(&store, "report.pdf").await.unwrap();
        assert_eq!(
            report.attachment_disposition("report.pdf").as_deref(),
            Some("attachment; filename=report.pdf"),
        );

        let photo = open(&store, "photo.jpg").await.unwrap();
        assert_eq!(photo.attachment_disposition("photo.jpg"), None);
    }
}
