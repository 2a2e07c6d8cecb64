//! Byte-buffered bit streams over files.
//!
//! Bits are packed MSB-first. Both directions track how many bits have
//! passed through them, so the byte offset of the next byte boundary is
//! known without asking the underlying file.
//!
//! `flush` is the synchronization primitive: it completes the current
//! partial byte (zero-padded on write, skipped on read) and returns the
//! byte offset at which the next code starts. Offsets recorded by a writer
//! after `flush` equal the offsets a reader observes after its own `flush`
//! at the same point in the code sequence.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bitstream_io::{BigEndian, BitRead, BitReader, BitWrite, BitWriter};

use crate::error::{Error, IoContext, Result};

/// Bit-level writer.
pub struct BitStreamWriter<W: Write = BufWriter<File>> {
    artifact: PathBuf,
    inner: BitWriter<W, BigEndian>,
    bits: u64,
}

impl BitStreamWriter {
    /// Create (or truncate) a file for writing.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).at(path)?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> BitStreamWriter<W> {
    /// Wrap an arbitrary writer; `artifact` names it in errors.
    pub fn new(writer: W, artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            inner: BitWriter::endian(writer, BigEndian),
            bits: 0,
        }
    }

    /// Path of the underlying artifact.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Append the low `n` bits of `value`, most significant first (`n <= 32`).
    pub fn write_bits(&mut self, value: u32, n: u32) -> Result<()> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(());
        }
        let value = if n == 32 { value } else { value & ((1u32 << n) - 1) };
        self.inner.write(n, value).at(&self.artifact)?;
        self.bits += u64::from(n);
        Ok(())
    }

    /// Append a single bit.
    pub fn write_bit(&mut self, bit: bool) -> Result<()> {
        self.inner.write_bit(bit).at(&self.artifact)?;
        self.bits += 1;
        Ok(())
    }

    /// Number of bits written so far, including any partial byte.
    pub fn bit_position(&self) -> u64 {
        self.bits
    }

    /// Byte offset of the next byte boundary.
    pub fn position(&self) -> u64 {
        self.bits.div_ceil(8)
    }

    /// Zero-pad the current partial byte and return the offset of the next write.
    pub fn flush(&mut self) -> Result<u64> {
        self.inner.byte_align().at(&self.artifact)?;
        self.bits = self.bits.div_ceil(8) * 8;
        Ok(self.bits / 8)
    }

    /// Flush, hand back the underlying writer, and return the total byte count.
    pub fn finish(mut self) -> Result<(W, u64)> {
        let len = self.flush()?;
        let mut writer = self.inner.into_writer();
        writer.flush().at(&self.artifact)?;
        Ok((writer, len))
    }

    /// Flush and close, returning the total byte count.
    pub fn close(self) -> Result<u64> {
        self.finish().map(|(_, len)| len)
    }
}

/// Bit-level reader.
pub struct BitStreamReader<R: Read = BufReader<File>> {
    artifact: PathBuf,
    inner: BitReader<R, BigEndian>,
    bits: u64,
}

impl BitStreamReader {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).at(path)?;
        Ok(Self::new(BufReader::new(file), path))
    }
}

impl<R: Read> BitStreamReader<R> {
    /// Wrap an arbitrary reader; `artifact` names it in errors.
    pub fn new(reader: R, artifact: impl Into<PathBuf>) -> Self {
        Self {
            artifact: artifact.into(),
            inner: BitReader::endian(reader, BigEndian),
            bits: 0,
        }
    }

    /// Path of the underlying artifact.
    pub fn artifact(&self) -> &Path {
        &self.artifact
    }

    /// Read one bit. Reading past the end is an I/O error.
    pub fn read_bit(&mut self) -> Result<bool> {
        let bit = self.inner.read_bit().at(&self.artifact)?;
        self.bits += 1;
        Ok(bit)
    }

    /// Read `n` bits (`n <= 32`) as an unsigned integer, most significant first.
    pub fn read_bits(&mut self, n: u32) -> Result<u32> {
        debug_assert!(n <= 32);
        if n == 0 {
            return Ok(0);
        }
        let value = self.inner.read::<u32>(n).at(&self.artifact)?;
        self.bits += u64::from(n);
        Ok(value)
    }

    /// Number of bits consumed so far.
    pub fn bit_position(&self) -> u64 {
        self.bits
    }

    /// Byte offset of the next byte boundary.
    pub fn position(&self) -> u64 {
        self.bits.div_ceil(8)
    }

    /// Skip the rest of the current partial byte and return the offset of the next read.
    pub fn flush(&mut self) -> u64 {
        self.inner.byte_align();
        self.bits = self.bits.div_ceil(8) * 8;
        self.bits / 8
    }
}

impl<R: Read + Seek> BitStreamReader<R> {
    /// Continue reading at byte `offset`, discarding any partial byte.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        self.inner.byte_align();
        if let Some(reader) = self.inner.reader() {
            reader.seek(SeekFrom::Start(offset)).at(&self.artifact)?;
        }
        self.bits = offset * 8;
        Ok(())
    }
}

/// Writer for a fixed-stride file of 4-byte big-endian byte offsets.
pub struct OffsetWriter {
    path: PathBuf,
    inner: BufWriter<File>,
    count: u32,
}

impl OffsetWriter {
    /// Create (or truncate) an offset file.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).at(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            inner: BufWriter::new(file),
            count: 0,
        })
    }

    /// Append one offset into `target`; fails if it does not fit in 4 bytes.
    pub fn push(&mut self, offset: u64, target: &Path) -> Result<()> {
        let record = u32::try_from(offset).map_err(|_| Error::OffsetOverflow {
            artifact: target.to_path_buf(),
            offset,
        })?;
        self.inner.write_all(&record.to_be_bytes()).at(&self.path)?;
        self.count += 1;
        Ok(())
    }

    /// Number of records written.
    pub fn len(&self) -> u32 {
        self.count
    }

    /// Return true if no record has been written.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush and close, returning the number of records.
    pub fn close(mut self) -> Result<u32> {
        self.inner.flush().at(&self.path)?;
        Ok(self.count)
    }
}

/// Read a whole offset file written by [`OffsetWriter`].
pub fn read_offsets(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let bytes = fs::read(path).at(path)?;
    if bytes.len() % 4 != 0 {
        return Err(Error::corrupt(
            path,
            format!("{} bytes is not a whole number of offsets", bytes.len()),
        ));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}
