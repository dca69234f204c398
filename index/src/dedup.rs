//! Content deduplication using xxhash.

use xxhash_rust::xxh3::xxh3_64;

/// Computes a content hash for chunk-level deduplication.
#[must_use]
pub fn content_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_same_hash() {
        let text = "Hello, world!";
        assert_eq!(content_hash(text), content_hash(text));
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(content_hash("Hello, world!"), content_hash("Goodbye, world!"));
    }
}
