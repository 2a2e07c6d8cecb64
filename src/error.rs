//! Error types for compression and validation runs.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Where a decoded value disagreed with the live attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// Decoded token id at a corpus position.
    Token {
        /// Corpus position.
        cpos: u32,
    },
    /// Sync offset recorded for the block starting at `cpos`.
    SyncOffset {
        /// First corpus position of the block.
        cpos: u32,
    },
    /// Offset recorded for a vocabulary item in the reversed index.
    ItemOffset {
        /// Vocabulary id.
        id: u32,
    },
    /// Decoded occurrence of a vocabulary item.
    Position {
        /// Vocabulary id.
        id: u32,
        /// Index of the occurrence within the item's position list.
        occurrence: u32,
    },
    /// Vocabulary size declared by a code descriptor.
    DescriptorSize,
    /// Corpus length declared by a code descriptor.
    DescriptorLength,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Token { cpos } => write!(f, "wrong token at cpos {cpos}"),
            Mismatch::SyncOffset { cpos } => write!(f, "wrong sync offset at cpos {cpos}"),
            Mismatch::ItemOffset { id } => write!(f, "wrong block offset for id {id}"),
            Mismatch::Position { id, occurrence } => {
                write!(f, "wrong occurrence #{occurrence} of id {id}")
            }
            Mismatch::DescriptorSize => f.write_str("wrong vocabulary size in descriptor"),
            Mismatch::DescriptorLength => f.write_str("wrong corpus length in descriptor"),
        }
    }
}

/// Error variants for compression and validation.
#[derive(Debug, Error)]
pub enum Error {
    /// A file could not be created, opened, read or written.
    #[error("{}: {source}", path.display())]
    Io {
        /// The artifact being accessed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The attribute could not deliver consistent data.
    #[error("corpus access failed: {0}")]
    CorpusAccess(String),

    /// A run option is out of range.
    #[error("invalid option: {0}")]
    InvalidOption(String),

    /// A derived Huffman code is longer than the descriptor can represent.
    #[error("huffman codes too long: {max_codelen} bits (maximum is {limit})")]
    CodeLengthOverflow {
        /// Longest derived code length.
        max_codelen: u32,
        /// Longest supported code length.
        limit: u32,
    },

    /// A byte offset does not fit into a 4-byte offset record.
    #[error("{}: offset {offset} does not fit a 4-byte record", artifact.display())]
    OffsetOverflow {
        /// The artifact being written.
        artifact: PathBuf,
        /// The offending byte offset.
        offset: u64,
    },

    /// An artifact is structurally invalid.
    #[error("{}: corrupt data: {detail}", artifact.display())]
    Corrupt {
        /// The artifact being read.
        artifact: PathBuf,
        /// What is wrong with it.
        detail: String,
    },

    /// A decoded value disagrees with the live attribute.
    #[error("{}: {what}: found {found}, expected {expected}", artifact.display())]
    ValidationMismatch {
        /// The artifact being validated.
        artifact: PathBuf,
        /// Location of the mismatch.
        what: Mismatch,
        /// Ground truth from the attribute.
        expected: u64,
        /// Value recovered from the artifact.
        found: u64,
    },
}

impl Error {
    /// Create a corpus access error.
    pub fn corpus(msg: impl Into<String>) -> Self {
        Error::CorpusAccess(msg.into())
    }

    /// Create a corrupt artifact error.
    pub fn corrupt(artifact: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Error::Corrupt {
            artifact: artifact.into(),
            detail: detail.into(),
        }
    }

    /// Create a validation mismatch error.
    pub fn mismatch(
        artifact: impl Into<PathBuf>,
        what: Mismatch,
        expected: impl Into<u64>,
        found: impl Into<u64>,
    ) -> Self {
        Error::ValidationMismatch {
            artifact: artifact.into(),
            what,
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Return true if this error came from a self-check rather than from I/O or the corpus.
    pub fn is_validation_failure(&self) -> bool {
        matches!(self, Error::ValidationMismatch { .. } | Error::Corrupt { .. })
    }
}

/// A specialized Result type for compression operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach the artifact path to an I/O result.
pub(crate) trait IoContext<T> {
    fn at(self, path: &Path) -> Result<T>;
}

impl<T> IoContext<T> for std::io::Result<T> {
    fn at(self, path: &Path) -> Result<T> {
        self.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
