//! Huffman-coded token streams (`.hcd`, `.huf`, `.huf.syn`).
//!
//! The stream is the concatenation of every position's canonical code, in
//! corpus order. Before the code of every position `cpos` with
//! `cpos % K == 0` the stream is flushed to a byte boundary and the byte
//! offset is appended to the sync file, so a reader can start decoding at
//! any multiple of `K` without touching earlier data.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::attribute::{self, Attribute};
use crate::bitio::{read_offsets, BitStreamReader, BitStreamWriter, OffsetWriter};
use crate::config::{discard, ArtifactPaths, CompressOptions};
use crate::error::{Error, IoContext, Mismatch, Result};
use crate::hcd::{read_descriptor, read_descriptor_for, write_descriptor};
use crate::huffman::HuffmanTable;

/// Outcome of a successful token stream compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenStreamSummary {
    /// Number of tokens encoded.
    pub tokens: u32,
    /// Sum of all code lengths.
    pub encoded_bits: u64,
    /// Size of the compressed stream, including sync padding.
    pub compressed_bytes: u64,
    /// Number of sync records written.
    pub sync_points: u32,
    /// Shortest code length.
    pub min_codelen: u32,
    /// Longest code length.
    pub max_codelen: u32,
}

/// Compress the token stream of `attr` into the descriptor, stream and sync files.
///
/// On failure, whatever was written is removed again.
pub fn compress<A: Attribute + ?Sized>(
    attr: &A,
    paths: &ArtifactPaths,
    opts: &CompressOptions,
) -> Result<TokenStreamSummary> {
    info!(attribute = attr.name(), "compressing token stream");
    let result = write_artifacts(attr, paths, opts);
    if result.is_err() {
        discard(&[&paths.descriptor, &paths.stream, &paths.sync]);
    }
    result
}

fn write_artifacts<A: Attribute + ?Sized>(
    attr: &A,
    paths: &ArtifactPaths,
    opts: &CompressOptions,
) -> Result<TokenStreamSummary> {
    let freqs = attribute::frequencies(attr)?;
    let length = attribute::corpus_length(attr)?;
    let total: u64 = freqs.iter().map(|&f| u64::from(f)).sum();
    if total != u64::from(length) {
        return Err(Error::corpus(format!(
            "{}: frequencies sum to {total}, corpus has {length} tokens",
            attr.name()
        )));
    }

    let (table, codebook) = HuffmanTable::build(&freqs, length)?;
    write_descriptor(&paths.descriptor, &table)?;

    info!(path = %paths.stream.display(), "writing compressed token stream");
    let mut stream = BitStreamWriter::create(&paths.stream)?;
    info!(
        path = %paths.sync.display(),
        every = opts.sync_interval(),
        "writing sync offsets"
    );
    let mut sync = OffsetWriter::create(&paths.sync)?;

    let k = opts.sync_interval();
    for cpos in 0..length {
        if cpos % k == 0 {
            let offset = stream.flush()?;
            sync.push(offset, &paths.stream)?;
        }
        let id = attr.token_at(cpos)?;
        let (code, len) = codebook.get(id).ok_or_else(|| {
            Error::corpus(format!(
                "{}: id {id} at cpos {cpos} outside vocabulary of {}",
                attr.name(),
                table.size()
            ))
        })?;
        stream.write_bits(code, len)?;
    }

    let compressed_bytes = stream.close()?;
    let sync_points = sync.close()?;
    let summary = TokenStreamSummary {
        tokens: length,
        encoded_bits: codebook.encoded_bits(&freqs),
        compressed_bytes,
        sync_points,
        min_codelen: table.min_codelen(),
        max_codelen: table.max_codelen(),
    };
    info!(
        attribute = attr.name(),
        tokens = summary.tokens,
        compressed_bytes = summary.compressed_bytes,
        "token stream compressed"
    );
    Ok(summary)
}

/// Decode the whole compressed stream and compare it with the live attribute.
///
/// Checks the descriptor against the attribute, every sync offset against
/// the decoder's byte position, every decoded id against `token_at`, and
/// that no data follows the last code.
pub fn decode_check<A: Attribute + ?Sized>(
    attr: &A,
    paths: &ArtifactPaths,
    opts: &CompressOptions,
) -> Result<()> {
    info!(attribute = attr.name(), "validating token stream");
    let table = read_descriptor_for(&paths.descriptor, attr)?;
    let sync = read_sync(&paths.sync, &table, opts)?;
    let mut stream = BitStreamReader::open(&paths.stream)?;

    let k = opts.sync_interval();
    for cpos in 0..table.length() {
        if cpos % k == 0 {
            let offset = stream.flush();
            let recorded = sync[(cpos / k) as usize];
            if u64::from(recorded) != offset {
                return Err(Error::mismatch(
                    &paths.sync,
                    Mismatch::SyncOffset { cpos },
                    offset,
                    recorded,
                ));
            }
        }
        let id = table.decode_symbol(&mut stream)?;
        let truth = attr.token_at(cpos)?;
        if id != truth {
            return Err(Error::mismatch(
                &paths.stream,
                Mismatch::Token { cpos },
                truth,
                id,
            ));
        }
    }

    let end = stream.flush();
    let file_len = fs::metadata(&paths.stream).at(&paths.stream)?.len();
    if end != file_len {
        return Err(Error::corrupt(
            &paths.stream,
            format!("{} bytes after the last code", file_len.saturating_sub(end)),
        ));
    }
    info!(attribute = attr.name(), tokens = table.length(), "token stream is valid");
    Ok(())
}

fn read_sync(path: &Path, table: &HuffmanTable, opts: &CompressOptions) -> Result<Vec<u32>> {
    let sync = read_offsets(path)?;
    let expected = table.length().div_ceil(opts.sync_interval());
    if sync.len() != expected as usize {
        return Err(Error::corrupt(
            path,
            format!("{} sync records, expected {expected}", sync.len()),
        ));
    }
    Ok(sync)
}

/// Random access to a compressed token stream.
///
/// Decoding starts at the sync point preceding the requested position, so
/// at most `K - 1` codes are skipped per lookup.
pub struct TokenStreamReader {
    table: HuffmanTable,
    sync: Vec<u32>,
    sync_interval: u32,
    stream: BitStreamReader,
}

impl TokenStreamReader {
    /// Open the descriptor, sync and stream files.
    pub fn open(paths: &ArtifactPaths, opts: &CompressOptions) -> Result<Self> {
        let table = read_descriptor(&paths.descriptor)?;
        let sync = read_sync(&paths.sync, &table, opts)?;
        let stream = BitStreamReader::open(&paths.stream)?;
        Ok(Self {
            table,
            sync,
            sync_interval: opts.sync_interval(),
            stream,
        })
    }

    /// The code descriptor.
    pub fn table(&self) -> &HuffmanTable {
        &self.table
    }

    /// Number of tokens in the stream.
    pub fn len(&self) -> u32 {
        self.table.length()
    }

    /// Return true if the stream holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.table.length() == 0
    }

    /// The id at corpus position `cpos`.
    pub fn token_at(&mut self, cpos: u32) -> Result<u32> {
        self.position_at(cpos, 1)?;
        self.table.decode_symbol(&mut self.stream)
    }

    /// The ids at positions `start..start + len`.
    pub fn decode_range(&mut self, start: u32, len: u32) -> Result<Vec<u32>> {
        self.position_at(start, len)?;
        (0..len)
            .map(|_| self.table.decode_symbol(&mut self.stream))
            .collect()
    }

    fn position_at(&mut self, start: u32, len: u32) -> Result<()> {
        let end = u64::from(start) + u64::from(len);
        if end > u64::from(self.len()) {
            return Err(Error::corpus(format!(
                "positions {start}..{end} outside stream of {} tokens",
                self.len()
            )));
        }
        if len == 0 {
            return Ok(());
        }
        let block = start / self.sync_interval;
        let offset = *self.sync.get(block as usize).ok_or_else(|| {
            Error::corrupt(self.stream.artifact(), format!("no sync point for cpos {start}"))
        })?;
        self.stream.seek(u64::from(offset))?;
        for _ in block * self.sync_interval..start {
            self.table.decode_symbol(&mut self.stream)?;
        }
        Ok(())
    }
}
