//! Unique object key generation.

use uuid::Uuid;

/// Prefix `original_name` with a fresh UUIDv4: `<uuid>_<original_name>`.
/// Pure, no I/O. Splitting the result on the first `_` always yields a
/// parseable UUIDv4 on the left — the contract `is_unique_key` checks.
pub fn unique_key(original_name: &str) -> String {
    format!("{}_{}", Uuid::new_v4(), original_name)
}

/// Check the unique-filename contract: the segment before the first `_`
/// parses as a version-4 UUID.
pub fn is_unique_key(key: &str) -> bool {
    match key.split_once('_') {
        Some((prefix, _)) => Uuid::try_parse(prefix)
            .map(|uuid| uuid.get_version_num() == 4)
            .unwrap_or(false),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_splits_into_uuid_and_original_name() {
        let key = unique_key("renamed_img_for_test.jpg");

        let (prefix, rest) = key.split_once('_').unwrap();
        let uuid = Uuid::try_parse(prefix).unwrap();
        assert_eq!(uuid.get_version_num(), 4);
        assert_eq!(rest, "renamed_img_for_test.jpg");
        assert!(is_unique_key(&key));
    }

    #[test]
    fn distinct_calls_produce_distinct_keys() {
        assert_ne!(unique_key("a.txt"), unique_key("a.txt"));
    }

    #[test]
    fn plain_names_are_not_unique_form() {
        assert!(!is_unique_key("img_for_test.jpg"));
        assert!(!is_unique_key("no-underscore.jpg"));
        assert!(!is_unique_key(""));
    }
}
