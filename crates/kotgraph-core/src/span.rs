//! Byte spans and content hashing.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Byte offsets into file content.
///
/// Spans are half-open intervals: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset (inclusive).
    pub start: u32,
    /// End byte offset (exclusive).
    pub end: u32,
}

impl Span {
    /// Create a new span.
    ///
    /// # Panics
    /// Panics if `start > end`.
    pub fn new(start: u32, end: u32) -> Self {
        assert!(
            start <= end,
            "Span start ({}) must be <= end ({})",
            start,
            end
        );
        Span { start, end }
    }

    /// Length of the span in bytes.
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Check if span is empty.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if this span contains another span entirely.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Hash type for content identity (SHA-256, stored as hex string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    /// Compute SHA-256 hash of the given bytes, returning hex-encoded string.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentHash(hex::encode(hasher.finalize()))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_len_and_empty() {
        assert_eq!(Span::new(3, 10).len(), 7);
        assert!(!Span::new(3, 10).is_empty());
        assert!(Span::new(4, 4).is_empty());
    }

    #[test]
    fn span_containment() {
        let outer = Span::new(0, 100);
        assert!(outer.contains(&Span::new(0, 100)));
        assert!(outer.contains(&Span::new(10, 20)));
        assert!(!outer.contains(&Span::new(90, 101)));
    }

    #[test]
    #[should_panic(expected = "must be <=")]
    fn span_rejects_inverted_bounds() {
        let _ = Span::new(5, 4);
    }

    #[test]
    fn content_hash_is_stable() {
        let a = ContentHash::compute(b"fun foo() {}");
        let b = ContentHash::compute(b"fun foo() {}");
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_ne!(a, ContentHash::compute(b"fun bar() {}"));
    }
}
