//! Run options and artifact naming.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{Error, Result};

/// Number of tokens between two sync points in the compressed token stream.
pub const DEFAULT_SYNC_INTERVAL: u32 = 128;

/// Options shared by the compressors and their validators.
///
/// The validator must be run with the same options as the compressor that
/// produced the artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompressOptions {
    sync_interval: u32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
        }
    }
}

impl CompressOptions {
    /// Set the number of tokens between sync points (must be >= 1).
    pub fn with_sync_interval(mut self, sync_interval: u32) -> Result<Self> {
        if sync_interval == 0 {
            return Err(Error::InvalidOption(
                "sync interval must be >= 1".to_string(),
            ));
        }
        self.sync_interval = sync_interval;
        Ok(self)
    }

    /// Number of tokens between sync points.
    #[must_use]
    pub fn sync_interval(&self) -> u32 {
        self.sync_interval
    }
}

/// File names of every artifact produced for one attribute.
///
/// `ArtifactPaths::new("corpus/word")` yields `corpus/word.hcd`,
/// `corpus/word.huf`, `corpus/word.huf.syn`, `corpus/word.crc` and
/// `corpus/word.crx`. Fields may be overridden individually.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Huffman code descriptor.
    pub descriptor: PathBuf,
    /// Bit-packed token stream.
    pub stream: PathBuf,
    /// Sync offsets into `stream`.
    pub sync: PathBuf,
    /// Golomb-coded reversed index.
    pub rdx_data: PathBuf,
    /// Per-item offsets into `rdx_data`.
    pub rdx_offsets: PathBuf,
}

impl ArtifactPaths {
    /// Derive all artifact names from a common base path.
    pub fn new(base: impl AsRef<Path>) -> Self {
        let base = base.as_ref();
        Self {
            descriptor: with_suffix(base, ".hcd"),
            stream: with_suffix(base, ".huf"),
            sync: with_suffix(base, ".huf.syn"),
            rdx_data: with_suffix(base, ".crc"),
            rdx_offsets: with_suffix(base, ".crx"),
        }
    }
}

/// Best-effort removal of artifacts left behind by a failed run.
pub(crate) fn discard(paths: &[&Path]) {
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => warn!(path = %path.display(), "removed partial artifact"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove partial artifact"),
        }
    }
}

// Appends rather than replacing an extension: "word.lemma" -> "word.lemma.hcd".
fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut name = base.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}
