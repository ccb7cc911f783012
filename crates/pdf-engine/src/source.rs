//! Where original document bytes come from

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Supplier of the original document bytes for loading and stamping
pub trait DocumentSource {
    fn load_bytes(&self) -> io::Result<Vec<u8>>;
}

/// Document read from disk on every load
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocumentSource for FileSource {
    fn load_bytes(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }
}

/// Document already held in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bytes: Vec<u8>,
}

impl MemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }
}

impl DocumentSource for MemorySource {
    fn load_bytes(&self) -> io::Result<Vec<u8>> {
        Ok(self.bytes.clone())
    }
}
