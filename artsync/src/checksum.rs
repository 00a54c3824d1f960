//! Integrity verification of downloaded content.
//!
//! The proxy occasionally serves truncated or mangled files; publishing
//! them would poison the destination registry. Download paths call
//! [`verify_file`] before reporting a file as downloaded, turning a digest
//! mismatch into the unrecoverable corrupted-content failure.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::FetchError;
use crate::model::Checksums;

/// Verifies a downloaded file against its recorded checksums.
///
/// The strongest available digest wins: SHA-256 when recorded, MD5 as the
/// fallback. Files without any recorded digest pass. An unreadable file
/// counts as corrupted, not as a transport failure, because the transfer
/// itself already reported success.
pub fn verify_file(path: &Path, checksums: &Checksums) -> Result<(), FetchError> {
    let expected_sha256 = checksums.sha256.trim();
    let expected_md5 = checksums.md5.trim();
    if expected_sha256.is_empty() && expected_md5.is_empty() {
        return Ok(());
    }

    let content = std::fs::read(path).map_err(|_| FetchError::ContentCorrupted {
        path: path.display().to_string(),
    })?;

    let matches = if expected_sha256.is_empty() {
        hex::encode(md5::Md5::digest(&content)).eq_ignore_ascii_case(expected_md5)
    } else {
        hex::encode(Sha256::digest(&content)).eq_ignore_ascii_case(expected_sha256)
    };

    if matches {
        Ok(())
    } else {
        Err(FetchError::ContentCorrupted {
            path: path.display().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use md5::Md5;
    use std::io::Write;

    fn write_temp(content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(content).expect("write");
        file
    }

    #[test]
    fn test_matching_sha256_passes() {
        let file = write_temp(b"artifact bytes");
        let checksums = Checksums {
            md5: String::new(),
            sha1: String::new(),
            sha256: hex::encode(Sha256::digest(b"artifact bytes")),
        };
        assert!(verify_file(file.path(), &checksums).is_ok());
    }

    #[test]
    fn test_mismatch_is_corrupted() {
        let file = write_temp(b"artifact bytes");
        let checksums = Checksums {
            md5: String::new(),
            sha1: String::new(),
            sha256: hex::encode(Sha256::digest(b"different bytes")),
        };
        let err = verify_file(file.path(), &checksums).expect_err("mismatch");
        assert!(matches!(err, FetchError::ContentCorrupted { .. }));
    }

    #[test]
    fn test_md5_fallback() {
        let file = write_temp(b"artifact bytes");
        let checksums = Checksums {
            md5: hex::encode(Md5::digest(b"artifact bytes")),
            sha1: String::new(),
            sha256: String::new(),
        };
        assert!(verify_file(file.path(), &checksums).is_ok());
    }

    #[test]
    fn test_missing_digests_pass() {
        let file = write_temp(b"artifact bytes");
        assert!(verify_file(file.path(), &Checksums::default()).is_ok());
    }

    #[test]
    fn test_unreadable_file_is_corrupted() {
        let checksums = Checksums {
            md5: String::new(),
            sha1: String::new(),
            sha256: "abc".to_string(),
        };
        let err = verify_file(Path::new("/nonexistent/file.jar"), &checksums)
            .expect_err("unreadable");
        assert!(matches!(err, FetchError::ContentCorrupted { .. }));
    }
}
