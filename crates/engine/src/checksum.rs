//! SHA-256 content digests for local and remote streams.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::CHUNK_SIZE;

/// Consumes `reader` to end-of-data and returns the hex-encoded SHA-256
/// digest of everything it yielded.
///
/// Reads in fixed-size chunks, so arbitrarily large streams hash in
/// constant memory. The algorithm has no knowledge of where the stream
/// came from; local file handles and remote store streams go through the
/// same code path.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Computes the SHA-256 digest of an entire local file.
pub fn digest_file(path: &Path) -> std::io::Result<String> {
    digest_reader(std::fs::File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn digest_is_deterministic() {
        let d1 = digest_reader(Cursor::new(b"hello world")).unwrap();
        let d2 = digest_reader(Cursor::new(b"hello world")).unwrap();
        assert_eq!(d1, d2);
        assert_eq!(d1.len(), 64); // SHA-256 = 64 hex chars.
    }

    #[test]
    fn digest_differs_for_different_data() {
        let d1 = digest_reader(Cursor::new(b"hello")).unwrap();
        let d2 = digest_reader(Cursor::new(b"world")).unwrap();
        assert_ne!(d1, d2);
    }

    #[test]
    fn empty_stream_digest() {
        let d = digest_reader(Cursor::new(b"")).unwrap();
        assert_eq!(
            d,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_digest_matches_stream_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        std::fs::write(&path, b"content under test").unwrap();

        let from_file = digest_file(&path).unwrap();
        let from_stream = digest_reader(Cursor::new(b"content under test")).unwrap();
        assert_eq!(from_file, from_stream);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(digest_file(Path::new("/nonexistent/file")).is_err());
    }
}
