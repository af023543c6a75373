//! Content hashing
//!
//! Streams file contents through SHA-256 in fixed-size blocks so that memory
//! use does not grow with file size. The digest is hex-encoded and is what
//! gets stored as object metadata on upload.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use capysync_core::domain::newtypes::ContentHash;

use crate::SyncError;

/// Read block size
pub const BLOCK_SIZE: usize = 64 * 1024;

/// Hash everything `reader` yields from its start
pub fn hash_reader<R: Read + Seek>(reader: &mut R) -> std::io::Result<String> {
    reader.seek(SeekFrom::Start(0))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; BLOCK_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Digest of an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> Result<ContentHash, SyncError> {
    Ok(ContentHash::new(hex::encode(Sha256::digest(data)))?)
}

/// Digest of a file, computed on the blocking pool
///
/// # Errors
/// `SyncError::LocalIo` if the file cannot be opened or read
#[instrument(fields(path = %path.display()))]
pub async fn hash_file(path: &Path) -> Result<ContentHash, SyncError> {
    let owned: PathBuf = path.to_path_buf();
    let hex = tokio::task::spawn_blocking(move || {
        let mut file = File::open(&owned)?;
        hash_reader(&mut file)
    })
    .await
    .map_err(|e| SyncError::local_io(path, std::io::Error::other(e)))?
    .map_err(|e| SyncError::local_io(path, e))?;

    debug!(hash = %hex, "hash computed");
    Ok(ContentHash::new(hex)?)
}
