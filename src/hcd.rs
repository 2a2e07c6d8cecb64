//! On-disk Huffman code descriptor (`.hcd`).
//!
//! # Format
//!
//! All fields are 4-byte big-endian integers:
//!
//! ```text
//! size          number of ids (V)
//! length        number of tokens (N)
//! min_codelen
//! max_codelen
//! lcount[32]    codes per length (unused lengths are 0)
//! symindex[32]  first slot in `symbols` per length
//! min_code[32]  first code per length
//! symbols[size] ids in code order
//! ```
//!
//! The header has a fixed size of 400 bytes regardless of which lengths are
//! used. There is no version field; any layout change is a breaking change.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::info;

use crate::attribute::{self, Attribute};
use crate::error::{Error, IoContext, Mismatch, Result};
use crate::huffman::{HuffmanTable, MAX_CODE_LEN};

/// Size in bytes of the fixed descriptor header.
pub const HEADER_BYTES: u64 = 4 * 4 + 3 * 4 * MAX_CODE_LEN as u64;

fn write_int<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_be_bytes())
}

fn read_int<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}

fn read_ints<R: Read>(r: &mut R, out: &mut [u32]) -> io::Result<()> {
    for v in out.iter_mut() {
        *v = read_int(r)?;
    }
    Ok(())
}

impl HuffmanTable {
    /// Serialize the descriptor.
    pub fn write_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write_int(w, self.size)?;
        write_int(w, self.length)?;
        write_int(w, self.min_codelen)?;
        write_int(w, self.max_codelen)?;
        for arr in [&self.lcount, &self.symindex, &self.min_code] {
            for &v in arr.iter() {
                write_int(w, v)?;
            }
        }
        for &s in &self.symbols {
            write_int(w, s)?;
        }
        Ok(())
    }

    /// Deserialize a descriptor written by [`write_to`](Self::write_to).
    ///
    /// `artifact` names the source in errors. The table is checked for
    /// internal consistency, not against any attribute.
    pub fn read_from<R: Read>(r: &mut R, artifact: &Path) -> Result<Self> {
        let mut head = [0u32; 4];
        read_ints(r, &mut head).at(artifact)?;
        let [size, length, min_codelen, max_codelen] = head;

        let mut lcount = [0u32; MAX_CODE_LEN];
        let mut symindex = [0u32; MAX_CODE_LEN];
        let mut min_code = [0u32; MAX_CODE_LEN];
        read_ints(r, &mut lcount).at(artifact)?;
        read_ints(r, &mut symindex).at(artifact)?;
        read_ints(r, &mut min_code).at(artifact)?;

        check_header(size, min_codelen, max_codelen, &lcount)
            .map_err(|detail| Error::corrupt(artifact, detail))?;

        // Grows with the data actually present, so a bogus `size` hits EOF first.
        let mut symbols = Vec::with_capacity((size as usize).min(1 << 16));
        for _ in 0..size {
            symbols.push(read_int(r).at(artifact)?);
        }
        let mut seen = vec![false; symbols.len()];
        for &s in &symbols {
            match seen.get_mut(s as usize) {
                Some(flag) if !*flag => *flag = true,
                Some(_) => {
                    return Err(Error::corrupt(artifact, format!("symbol {s} listed twice")))
                }
                None => {
                    return Err(Error::corrupt(
                        artifact,
                        format!("symbol {s} outside vocabulary of {size}"),
                    ))
                }
            }
        }

        let mut trailing = [0u8; 1];
        if r.read(&mut trailing).at(artifact)? != 0 {
            return Err(Error::corrupt(artifact, "trailing bytes after symbol table"));
        }

        Ok(Self {
            size,
            length,
            min_codelen,
            max_codelen,
            lcount,
            min_code,
            symindex,
            symbols,
        })
    }
}

fn check_header(
    size: u32,
    min_codelen: u32,
    max_codelen: u32,
    lcount: &[u32; MAX_CODE_LEN],
) -> std::result::Result<(), String> {
    if size == 0 {
        return Err("empty vocabulary".to_string());
    }
    if min_codelen == 0 || min_codelen > max_codelen || max_codelen as usize >= MAX_CODE_LEN {
        return Err(format!(
            "invalid code length range {min_codelen}..={max_codelen}"
        ));
    }
    let total: u64 = lcount.iter().map(|&c| u64::from(c)).sum();
    if total != u64::from(size) {
        return Err(format!("length counts sum to {total}, expected {size}"));
    }
    Ok(())
}

/// Write a descriptor file.
pub fn write_descriptor(path: impl AsRef<Path>, table: &HuffmanTable) -> Result<()> {
    let path = path.as_ref();
    info!(path = %path.display(), "writing code descriptor");
    let mut w = BufWriter::new(File::create(path).at(path)?);
    table.write_to(&mut w).at(path)?;
    w.flush().at(path)
}

/// Read a descriptor file.
pub fn read_descriptor(path: impl AsRef<Path>) -> Result<HuffmanTable> {
    let path = path.as_ref();
    let file = File::open(path).at(path)?;
    let file_len = file.metadata().at(path)?.len();
    if file_len < HEADER_BYTES {
        return Err(Error::corrupt(path, format!("{file_len} bytes is shorter than the header")));
    }
    let table = HuffmanTable::read_from(&mut BufReader::new(file), path)?;
    let expected = HEADER_BYTES + 4 * u64::from(table.size());
    if file_len != expected {
        return Err(Error::corrupt(path, format!("{file_len} bytes, expected {expected}")));
    }
    Ok(table)
}

/// Read a descriptor file and check it against the live attribute.
pub fn read_descriptor_for<A: Attribute + ?Sized>(
    path: impl AsRef<Path>,
    attr: &A,
) -> Result<HuffmanTable> {
    let path = path.as_ref();
    let table = read_descriptor(path)?;
    let size = attribute::vocabulary_size(attr)?;
    if table.size() != size {
        return Err(Error::mismatch(path, Mismatch::DescriptorSize, size, table.size()));
    }
    let length = attribute::corpus_length(attr)?;
    if table.length() != length {
        return Err(Error::mismatch(path, Mismatch::DescriptorLength, length, table.length()));
    }
    Ok(table)
}
