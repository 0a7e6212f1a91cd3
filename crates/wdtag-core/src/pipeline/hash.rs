//! Content hashing for skip-existing detection.

use std::fs::File;
use std::io;
use std::path::Path;

/// BLAKE3 content hashes of image files.
pub struct Hasher;

impl Hasher {
    /// Hash a file on disk without loading it whole.
    pub fn content_hash(path: &Path) -> io::Result<String> {
        let mut hasher = blake3::Hasher::new();
        io::copy(&mut File::open(path)?, &mut hasher)?;
        Ok(hasher.finalize().to_hex().to_string())
    }

    /// Hash bytes that were already read for decoding.
    pub fn content_hash_from_bytes(data: &[u8]) -> String {
        blake3::hash(data).to_hex().to_string()
    }
}
