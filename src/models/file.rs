//! Represents a stored file as surfaced by the listing API.

use serde::{Deserialize, Serialize};

/// One entry in a file listing.
///
/// Derived per request from the store's listing plus a metadata lookup —
/// never persisted by the gateway itself.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct FileEntry {
    /// Object key in the bucket.
    pub file_name: String,

    /// Content type (MIME type) recorded at upload time, or
    /// `application/octet-stream` when the store omits it.
    pub content_type: String,
}
