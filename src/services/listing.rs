//! Lister: pattern-filtered file listing.
//!
//! Walks the store's paginated listing API to completion, keeps keys whose
//! name contains the pattern (case-sensitive substring, empty pattern
//! matches everything), and enriches each match with its content type. Keys
//! come back in the store's native order and are not re-sorted. Cost is one
//! metadata round trip per matching key.

use tracing::debug;

use crate::models::file::FileEntry;
use crate::services::gateway::{GatewayResult, ObjectStore};

/// Collect every stored key containing `pattern`, with content types.
pub async fn find_files<T: ObjectStore + ?Sized>(
    store: &T,
    pattern: &str,
) -> GatewayResult<Vec<FileEntry>> {
    let mut files = Vec::new();
    let mut token: Option<String> = None;

    loop {
        let page = store.list_page(token.take()).await?;
        for key in page.keys {
            if !key.contains(pattern) {
                continue;
            }
            let content_type = store.content_type_of(&key).await?;
            files.push(FileEntry {
                file_name: key,
                content_type,
            });
        }
        match page.next {
            Some(next) => token = Some(next),
            None => break,
        }
    }

    debug!(pattern, matches = files.len(), "filtered files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::mock::MockStore;

    fn seeded_store() -> MockStore {
        // Page size 2 forces the walk across multiple listing pages.
        let store = MockStore::new().page_size(2);
        store.seed("0other_filename.jpg", "image/jpeg", b"a");
        store.seed("1other_filename.jpg", "image/jpeg", b"b");
        store.seed("different_name.jpg", "image/png", b"c");
        store
    }

    #[tokio::test]
    async fn substring_pattern_filters_across_pages() {
        let store = seeded_store();

        let files = find_files(&store, "other_filename.jpg").await.unwrap();

        assert_eq!(
            files,
            vec![
                FileEntry {
                    file_name: "0other_filename.jpg".into(),
                    content_type: "image/jpeg".into(),
                },
                FileEntry {
                    file_name: "1other_filename.jpg".into(),
                    content_type: "image/jpeg".into(),
                },
            ],
        );
    }

    #[tokio::test]
    async fn empty_pattern_matches_everything_in_store_order() {
        let store = seeded_store();

        let files = find_files(&store, "").await.unwrap();

        let names: Vec<&str> = files.iter().map(|f| f.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "0other_filename.jpg",
                "1other_filename.jpg",
                "different_name.jpg",
            ],
        );
    }

    #[tokio::test]
    async fn unmatched_pattern_yields_empty_listing() {
        let store = seeded_store();

        let files = find_files(&store, "no-such-file").await.unwrap();
        assert!(files.is_empty());
    }
}
