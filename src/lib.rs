//! # Compressed Corpus Attributes
//!
//! *Canonical Huffman token streams and Golomb-coded reversed indexes.*
//!
//! ## Intuition First
//!
//! A positional attribute of a corpus (word forms, lemmas, part-of-speech
//! tags) is stored twice: as a token stream (which id sits at each corpus
//! position) and as a reversed index (at which positions each id occurs).
//! Both are large and both are highly skewed: a handful of ids account for
//! most tokens, and the positions of frequent ids are close together.
//!
//! Short codes for frequent ids shrink the token stream; short codes for
//! small gaps shrink the reversed index. Periodic byte-aligned sync points
//! keep both randomly accessible.
//!
//! ## The Problem
//!
//! - **Token stream**: ids are fixed-width integers, but their distribution
//!   is Zipfian. A Huffman code approaches the entropy of the id
//!   distribution.
//! - **Reversed index**: each id's sorted positions are stored as gaps.
//!   For an id of frequency $f$ in a corpus of $N$ tokens the gaps are
//!   roughly geometric with mean $N/f$, which is exactly what Golomb codes
//!   are optimal for.
//!
//! ## Historical Context
//!
//! ```text
//! 1952  Huffman     Minimum-redundancy prefix codes
//! 1966  Golomb      Run-length encodings for geometric sources
//! 1983  Schwartz    Canonical codes: decode tables instead of trees
//! 1994  Witten      Managing Gigabytes: Golomb-coded inverted files
//! 1997  Moffat      Truncated-binary remainders, in-place code lengths
//! ```
//!
//! ## Mathematical Formulation
//!
//! Code lengths $l_i$ are derived from weights $f_i + 1$ by repeatedly
//! merging the two lightest nodes. The canonical assignment satisfies the
//! Kraft equality
//!
//! $$\sum_i 2^{-l_i} = 1$$
//!
//! and gives the $l$-bit codes the contiguous range
//! `[min_code[l], min_code[l] + lcount[l])`, so a decoder needs only three
//! arrays indexed by length.
//!
//! The Golomb parameter of an item is $b = \max(1, \lfloor 0.69 \cdot N / f \rfloor)$.
//!
//! ## What Could Go Wrong
//!
//! 1. **Code length overflow**: extremely skewed frequencies produce codes
//!    longer than 31 bits. Compression fails instead of truncating.
//! 2. **Partial artifacts**: a run that fails halfway removes what it wrote.
//!    Nothing is trustworthy until the validator has decoded every code.
//! 3. **Offset width**: offsets are 4-byte records, so a compressed file is
//!    limited to 4 GiB.
//!
//! ## Implementation Notes
//!
//! This crate provides:
//! - **`HuffmanTable`**: code construction, the `.hcd` descriptor, and the
//!   canonical decoder.
//! - **`Golomb`**: gap codes with truncated-binary remainders.
//! - **`token_stream`** / **`rdx`**: compressors, validators and readers.
//! - **`driver`**: compress-then-validate runs ending in a `SafeToDelete` signal.
//!
//! Corpus data is read through the [`Attribute`] trait; [`MemoryAttribute`]
//! implements it over an in-memory token vector.
//!
//! ## References
//!
//! - Huffman, D. A. (1952). "A Method for the Construction of Minimum-Redundancy Codes."
//! - Golomb, S. W. (1966). "Run-length encodings."
//! - Witten, I. H., Moffat, A., & Bell, T. C. (1999). "Managing Gigabytes."

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod attribute;
pub mod bitio;
pub mod config;
pub mod driver;
pub mod error;
pub mod golomb;
pub mod hcd;
pub mod huffman;
pub mod rdx;
pub mod token_stream;

pub use attribute::{Attribute, MemoryAttribute};
pub use bitio::{BitStreamReader, BitStreamWriter};
pub use config::{ArtifactPaths, CompressOptions, DEFAULT_SYNC_INTERVAL};
pub use driver::{compress_reversed_index, compress_token_stream, SafeToDelete, Uncompressed};
pub use error::{Error, Mismatch, Result};
pub use golomb::{golomb_parameter, Golomb};
pub use huffman::{Codebook, HuffmanTable, MAX_CODE_LEN};
pub use rdx::ReversedIndexReader;
pub use token_stream::TokenStreamReader;
