//! Compress-then-validate runs.
//!
//! An uncompressed component may only be removed after its compressed
//! replacement has been written and fully decoded against the live
//! attribute. These functions perform both steps and return a
//! [`SafeToDelete`] token on success; deleting the component is left to
//! the caller.

use std::fmt;

use tracing::info;

use crate::attribute::Attribute;
use crate::config::{ArtifactPaths, CompressOptions};
use crate::error::Result;
use crate::rdx::{self, RdxSummary};
use crate::token_stream::{self, TokenStreamSummary};

/// Uncompressed attribute component replaced by a compressed artifact set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uncompressed {
    /// The plain token stream, replaced by `.hcd`, `.huf` and `.huf.syn`.
    TokenStream,
    /// The plain reversed index, replaced by `.crc` and `.crx`.
    ReversedIndex,
}

impl fmt::Display for Uncompressed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uncompressed::TokenStream => f.write_str("token stream"),
            Uncompressed::ReversedIndex => f.write_str("reversed index"),
        }
    }
}

/// Proof that an uncompressed component has a validated replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct SafeToDelete<S> {
    /// Name of the attribute.
    pub attribute: String,
    /// The component that may be removed.
    pub component: Uncompressed,
    /// What the compressor reported.
    pub summary: S,
}

/// Compress the token stream of `attr` and validate the result.
pub fn compress_token_stream<A: Attribute + ?Sized>(
    attr: &A,
    paths: &ArtifactPaths,
    opts: &CompressOptions,
) -> Result<SafeToDelete<TokenStreamSummary>> {
    let summary = token_stream::compress(attr, paths, opts)?;
    token_stream::decode_check(attr, paths, opts)?;
    Ok(safe_to_delete(attr, Uncompressed::TokenStream, summary))
}

/// Compress the reversed index of `attr` and validate the result.
pub fn compress_reversed_index<A: Attribute + ?Sized>(
    attr: &A,
    paths: &ArtifactPaths,
) -> Result<SafeToDelete<RdxSummary>> {
    let summary = rdx::compress(attr, paths)?;
    rdx::decompress_check(attr, paths)?;
    Ok(safe_to_delete(attr, Uncompressed::ReversedIndex, summary))
}

fn safe_to_delete<A: Attribute + ?Sized, S>(
    attr: &A,
    component: Uncompressed,
    summary: S,
) -> SafeToDelete<S> {
    info!(
        attribute = attr.name(),
        %component,
        "compressed data validated, uncompressed component is safe to delete"
    );
    SafeToDelete {
        attribute: attr.name().to_string(),
        component,
        summary,
    }
}
