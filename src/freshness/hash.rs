//! Content fingerprints using blake3.

use std::fmt;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 16 hex chars are enough for log lines
        write!(f, "{}", &self.to_hex()[..16])
    }
}

/// Fingerprint of a file as read: its content plus its modification time.
pub type CacheKey = ContentHash;

/// Compute the cache key for `content` last modified at `mtime_ms`.
///
/// Without an mtime the key covers content only.
pub fn cache_key(content: &[u8], mtime_ms: Option<u64>) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(content);
    if let Some(ms) = mtime_ms {
        hasher.update(b"\0mtime:");
        hasher.update(&ms.to_le_bytes());
    }
    ContentHash::new(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_display() {
        let hash = ContentHash::new([0xab; 32]);
        assert_eq!(format!("{}", hash), "abababababababab");
    }

    #[test]
    fn test_content_hash_hex_roundtrip() {
        let original = ContentHash::new([0x12; 32]);
        assert_eq!(ContentHash::from_hex(&original.to_hex()), Some(original));
        assert_eq!(ContentHash::from_hex("abcd"), None);
        assert_eq!(ContentHash::from_hex("not hex"), None);
    }

    #[test]
    fn test_cache_key_stability() {
        let a = cache_key(b"<html></html>", Some(1_700_000_000_000));
        let b = cache_key(b"<html></html>", Some(1_700_000_000_000));
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_key_sensitivity() {
        let base = cache_key(b"<html></html>", Some(1));
        assert_ne!(base, cache_key(b"<html> </html>", Some(1)));
        assert_ne!(base, cache_key(b"<html></html>", Some(2)));
        assert_ne!(base, cache_key(b"<html></html>", None));
    }
}
