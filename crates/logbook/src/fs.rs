//! Content-addressed blob storage for the encrypted book.
//!
//! Every `put` returns a fresh content-derived address; the book records
//! the latest address as its location. A `get` against an unknown address
//! yields `Error::NotFound`, which the book treats as "fresh book" on
//! first load.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Where the book reads and writes its encrypted form.
pub trait Filesystem: Send + Sync {
    /// Store a blob, returning its content-derived address.
    fn put(&self, data: &[u8]) -> Result<String>;
    /// Fetch the blob at an address.
    fn get(&self, address: &str) -> Result<Vec<u8>>;
}

fn content_hash(data: &[u8]) -> String {
    bs58::encode(Sha256::digest(data)).into_string()
}

/// In-memory filesystem for tests.
#[derive(Debug, Default)]
pub struct MemFilesystem {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemFilesystem {
    /// An empty in-memory filesystem.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Filesystem for MemFilesystem {
    fn put(&self, data: &[u8]) -> Result<String> {
        let address = format!("/mem/{}", content_hash(data));
        self.blobs.write().insert(address.clone(), data.to_vec());
        Ok(address)
    }

    fn get(&self, address: &str) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .get(address)
            .cloned()
            .ok_or(Error::NotFound)
    }
}

/// Blob files under a local directory, one file per content hash.
#[derive(Debug)]
pub struct DirFilesystem {
    root: PathBuf,
}

impl DirFilesystem {
    /// Open (creating if needed) a blob directory.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(root.join("tmp"))?;
        Ok(Self { root })
    }

    fn blob_path(&self, address: &str) -> Option<PathBuf> {
        let hash = address.strip_prefix("/local/")?;
        if hash.is_empty() || !hash.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(self.root.join(hash))
    }
}

impl Filesystem for DirFilesystem {
    fn put(&self, data: &[u8]) -> Result<String> {
        let hash = content_hash(data);
        let dest = self.root.join(&hash);

        // atomic write: temp file, sync, rename into place
        let tmp = self.root.join("tmp").join(format!("{hash}.partial"));
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &dest)?;

        if let Ok(dir) = fs::File::open(&self.root) {
            let _ = dir.sync_all();
        }

        Ok(format!("/local/{hash}"))
    }

    fn get(&self, address: &str) -> Result<Vec<u8>> {
        let path = self.blob_path(address).ok_or(Error::NotFound)?;
        read_blob(&path)
    }
}

fn read_blob(path: &Path) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(data) => Ok(data),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(Error::NotFound),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mem_roundtrip() {
        let fs = MemFilesystem::new();
        let address = fs.put(b"encrypted book").unwrap();
        assert!(address.starts_with("/mem/"));
        assert_eq!(fs.get(&address).unwrap(), b"encrypted book");
    }

    #[test]
    fn test_mem_missing_address() {
        let fs = MemFilesystem::new();
        assert!(matches!(fs.get("/mem/unknown"), Err(Error::NotFound)));
    }

    #[test]
    fn test_mem_addresses_are_content_derived() {
        let fs = MemFilesystem::new();
        let a = fs.put(b"one").unwrap();
        let b = fs.put(b"two").unwrap();
        let a_again = fs.put(b"one").unwrap();
        assert_ne!(a, b);
        assert_eq!(a, a_again);
    }

    #[test]
    fn test_dir_roundtrip() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = DirFilesystem::new(dir.path())?;

        let address = fs.put(b"encrypted book")?;
        assert!(address.starts_with("/local/"));
        assert_eq!(fs.get(&address)?, b"encrypted book");
        Ok(())
    }

    #[test]
    fn test_dir_missing_address() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let fs = DirFilesystem::new(dir.path())?;
        assert!(matches!(fs.get("/local/unknown"), Err(Error::NotFound)));
        assert!(matches!(fs.get("not-an-address"), Err(Error::NotFound)));
        Ok(())
    }

    #[test]
    fn test_dir_survives_reopen() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let address = {
            let fs = DirFilesystem::new(dir.path())?;
            fs.put(b"persisted")?
        };
        let fs = DirFilesystem::new(dir.path())?;
        assert_eq!(fs.get(&address)?, b"persisted");
        Ok(())
    }
}
