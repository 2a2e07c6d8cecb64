//! Golomb-coded reversed index (`.crc`, `.crx`).
//!
//! Each vocabulary id, in ascending order, owns one byte-aligned block of
//! the data file holding the Golomb codes of its position gaps. The first
//! gap is the first position itself. The offset file has one record per
//! id pointing at the start of its block, so a single item's positions can
//! be decoded without touching any other block.
//!
//! The Golomb parameter of a block is recomputed from `(f(id), N)` on both
//! sides and never stored.

use std::fs;

use tracing::{debug, info};

use crate::attribute::{self, Attribute};
use crate::bitio::{read_offsets, BitStreamReader, BitStreamWriter, OffsetWriter};
use crate::config::{discard, ArtifactPaths};
use crate::error::{Error, IoContext, Mismatch, Result};
use crate::golomb::Golomb;

/// Outcome of a successful reversed index compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdxSummary {
    /// Number of vocabulary items (blocks).
    pub items: u32,
    /// Number of positions encoded.
    pub positions: u64,
    /// Size of the data file, including block padding.
    pub compressed_bytes: u64,
}

/// Compress the reversed index of `attr` into the data and offset files.
///
/// On failure, whatever was written is removed again.
pub fn compress<A: Attribute + ?Sized>(attr: &A, paths: &ArtifactPaths) -> Result<RdxSummary> {
    info!(attribute = attr.name(), "compressing reversed index");
    let result = write_artifacts(attr, paths);
    if result.is_err() {
        discard(&[&paths.rdx_data, &paths.rdx_offsets]);
    }
    result
}

fn write_artifacts<A: Attribute + ?Sized>(attr: &A, paths: &ArtifactPaths) -> Result<RdxSummary> {
    let size = attribute::vocabulary_size(attr)?;
    let length = attribute::corpus_length(attr)?;

    info!(path = %paths.rdx_data.display(), "writing compressed reversed index");
    let mut data = BitStreamWriter::create(&paths.rdx_data)?;
    info!(path = %paths.rdx_offsets.display(), "writing item offsets");
    let mut offsets = OffsetWriter::create(&paths.rdx_offsets)?;

    let mut total = 0u64;
    for id in 0..size {
        let freq = attr.frequency(id)?;
        let positions = checked_positions(attr, id, freq, length)?;
        let code = Golomb::for_item(freq, length);
        debug!(id, freq, b = code.parameter(), "encoding item");

        offsets.push(data.position(), &paths.rdx_data)?;
        let mut last = 0;
        for &pos in &positions {
            code.encode(pos - last, &mut data)?;
            last = pos;
        }
        data.flush()?;
        total += positions.len() as u64;
    }

    let summary = RdxSummary {
        items: offsets.close()?,
        positions: total,
        compressed_bytes: data.close()?,
    };
    info!(
        attribute = attr.name(),
        items = summary.items,
        compressed_bytes = summary.compressed_bytes,
        "reversed index compressed"
    );
    Ok(summary)
}

/// Fetch the positions of `id` and check they form a valid posting list.
fn checked_positions<A: Attribute + ?Sized>(
    attr: &A,
    id: u32,
    freq: u32,
    length: u32,
) -> Result<Vec<u32>> {
    if freq == 0 {
        return Err(Error::corpus(format!("{}: id {id} has frequency 0", attr.name())));
    }
    let positions = attr.positions_of(id)?;
    if positions.len() != freq as usize {
        return Err(Error::corpus(format!(
            "{}: id {id} has frequency {freq} but {} positions",
            attr.name(),
            positions.len()
        )));
    }
    if positions.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::corpus(format!(
            "{}: positions of id {id} are not strictly increasing",
            attr.name()
        )));
    }
    if let Some(&last) = positions.last() {
        if last >= length {
            return Err(Error::corpus(format!(
                "{}: id {id} occurs at cpos {last} beyond corpus of {length}",
                attr.name()
            )));
        }
    }
    Ok(positions)
}

/// Decode every block and compare it with the live attribute.
///
/// Checks that each recorded offset equals the decoder's own byte position
/// at the start of the block, that every decoded position matches
/// `positions_of`, and that no data follows the last block.
pub fn decompress_check<A: Attribute + ?Sized>(attr: &A, paths: &ArtifactPaths) -> Result<()> {
    info!(attribute = attr.name(), "validating reversed index");
    let size = attribute::vocabulary_size(attr)?;
    let length = attribute::corpus_length(attr)?;

    let offsets = read_offsets(&paths.rdx_offsets)?;
    if offsets.len() != size as usize {
        return Err(Error::corrupt(
            &paths.rdx_offsets,
            format!("{} item offsets, expected {size}", offsets.len()),
        ));
    }

    let mut data = BitStreamReader::open(&paths.rdx_data)?;
    for (id, &recorded) in (0..size).zip(&offsets) {
        let start = data.flush();
        if u64::from(recorded) != start {
            return Err(Error::mismatch(
                &paths.rdx_offsets,
                Mismatch::ItemOffset { id },
                start,
                recorded,
            ));
        }

        let freq = attr.frequency(id)?;
        let truth = checked_positions(attr, id, freq, length)?;
        let code = Golomb::for_item(freq, length);
        let mut pos = 0u64;
        for (occurrence, &expected) in (0u32..).zip(&truth) {
            pos += u64::from(code.decode(&mut data)?);
            if pos != u64::from(expected) {
                return Err(Error::mismatch(
                    &paths.rdx_data,
                    Mismatch::Position { id, occurrence },
                    expected,
                    pos,
                ));
            }
        }
    }

    let end = data.flush();
    let file_len = fs::metadata(&paths.rdx_data).at(&paths.rdx_data)?.len();
    if end != file_len {
        return Err(Error::corrupt(
            &paths.rdx_data,
            format!("{} bytes after the last block", file_len.saturating_sub(end)),
        ));
    }
    info!(attribute = attr.name(), items = size, "reversed index is valid");
    Ok(())
}

/// Per-item access to a compressed reversed index.
pub struct ReversedIndexReader {
    data: BitStreamReader,
    offsets: Vec<u32>,
    corpus_size: u32,
}

impl ReversedIndexReader {
    /// Open the data and offset files of a corpus of `corpus_size` tokens.
    pub fn open(paths: &ArtifactPaths, corpus_size: u32) -> Result<Self> {
        Ok(Self {
            offsets: read_offsets(&paths.rdx_offsets)?,
            data: BitStreamReader::open(&paths.rdx_data)?,
            corpus_size,
        })
    }

    /// Number of items in the index.
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// Return true if the index has no items.
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Decode the `freq` positions of `id`.
    ///
    /// `freq` must be the item's corpus frequency; it selects the Golomb
    /// parameter and the number of codes in the block.
    pub fn positions(&mut self, id: u32, freq: u32) -> Result<Vec<u32>> {
        let offset = *self.offsets.get(id as usize).ok_or_else(|| {
            Error::corpus(format!("id {id} outside index of {} items", self.offsets.len()))
        })?;
        self.data.seek(u64::from(offset))?;

        let code = Golomb::for_item(freq, self.corpus_size);
        let mut pos = 0u32;
        let mut out = Vec::with_capacity((freq as usize).min(1 << 16));
        for _ in 0..freq {
            let gap = code.decode(&mut self.data)?;
            pos = pos.checked_add(gap).ok_or_else(|| {
                Error::corrupt(self.data.artifact(), format!("position of id {id} exceeds 32 bits"))
            })?;
            out.push(pos);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::MemoryAttribute;

    fn sample() -> MemoryAttribute {
        let tokens = (0..500u32).map(|i| (i * 7 + i / 3) % 5).collect();
        MemoryAttribute::new("word", tokens, 5).unwrap()
    }

    #[test]
    fn worked_example_blocks() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", vec![2, 0, 2, 1], 3).unwrap();

        let summary = compress(&attr, &paths).unwrap();
        assert_eq!(summary.items, 3);
        assert_eq!(summary.positions, 4);
        // id 0: b=2, gap 1 -> "0|1"
        // id 1: b=2, gap 3 -> "10|1"
        // id 2: b=1, gaps 0, 2 -> "0" "110"
        assert_eq!(
            fs::read(&paths.rdx_data).unwrap(),
            vec![0b0100_0000, 0b1010_0000, 0b0110_0000]
        );
        assert_eq!(read_offsets(&paths.rdx_offsets).unwrap(), vec![0, 1, 2]);
        decompress_check(&attr, &paths).unwrap();
    }

    #[test]
    fn blocks_decode_independently() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = sample();
        compress(&attr, &paths).unwrap();
        decompress_check(&attr, &paths).unwrap();

        let mut reader = ReversedIndexReader::open(&paths, 500).unwrap();
        assert_eq!(reader.len(), 5);
        for id in [4, 0, 2, 2, 1, 3] {
            let freq = attr.frequency(id).unwrap();
            assert_eq!(reader.positions(id, freq).unwrap(), attr.positions_of(id).unwrap());
        }
        assert!(reader.positions(5, 1).is_err());
    }

    #[test]
    fn oversized_frequency_runs_into_end_of_data() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", vec![2, 0, 2, 1], 3).unwrap();
        compress(&attr, &paths).unwrap();

        let mut reader = ReversedIndexReader::open(&paths, 4).unwrap();
        assert!(reader.positions(0, u32::MAX).is_err());
        assert_eq!(reader.positions(2, 2).unwrap(), vec![0, 2]);
    }

    #[test]
    fn tampered_offset_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", vec![2, 0, 2, 1], 3).unwrap();
        compress(&attr, &paths).unwrap();

        fs::write(&paths.rdx_offsets, [0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 3]).unwrap();
        assert!(matches!(
            decompress_check(&attr, &paths),
            Err(Error::ValidationMismatch { what: Mismatch::ItemOffset { id: 2 }, expected: 2, found: 3, .. })
        ));
    }

    #[test]
    fn wrong_position_is_reported_with_occurrence() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", vec![2, 0, 2, 1], 3).unwrap();
        compress(&attr, &paths).unwrap();

        // id 2 second gap "110" -> "10": position 1 instead of 2
        fs::write(&paths.rdx_data, [0b0100_0000, 0b1010_0000, 0b0100_0000]).unwrap();
        assert!(matches!(
            decompress_check(&attr, &paths),
            Err(Error::ValidationMismatch {
                what: Mismatch::Position { id: 2, occurrence: 1 },
                expected: 2,
                found: 1,
                ..
            })
        ));
    }

    #[test]
    fn trailing_block_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = sample();
        compress(&attr, &paths).unwrap();

        let mut bytes = fs::read(&paths.rdx_data).unwrap();
        bytes.push(0);
        fs::write(&paths.rdx_data, bytes).unwrap();
        assert!(matches!(decompress_check(&attr, &paths), Err(Error::Corrupt { .. })));
    }

    #[test]
    fn offset_count_must_match_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = sample();
        compress(&attr, &paths).unwrap();

        let wider = MemoryAttribute::new("word", attr.tokens().to_vec(), 6).unwrap();
        assert!(decompress_check(&wider, &paths).is_err());
    }

    #[test]
    fn failed_run_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", vec![0, 0, 2], 3).unwrap();

        assert!(matches!(compress(&attr, &paths), Err(Error::CorpusAccess(_))));
        assert!(!paths.rdx_data.exists());
        assert!(!paths.rdx_offsets.exists());
    }
}
