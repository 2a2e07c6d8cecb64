//! Canonical Huffman codes over a token-id alphabet.
//!
//! # Construction
//!
//! Follows Witten, Moffat & Bell, *Managing Gigabytes* (pp. 335ff):
//!
//! 1. Every id gets weight `f(id) + 1`. The add-one keeps the optimal code
//!    length of hapax legomena below 31 bits even for corpora of about
//!    $2^{31}$ tokens; cumulative weights may then exceed the corpus size,
//!    so they are kept in `u64`.
//! 2. An implicit binary min-heap of node references is built over the
//!    leaves. The two lightest nodes are repeatedly replaced by their merged
//!    parent. Every consumed node records a reference to its parent.
//! 3. Parents are always stored at lower indices than their children, so one
//!    forward pass over the node array turns parent references into depths,
//!    which are the code lengths.
//!
//! # Canonical assignment
//!
//! Codes of length `L` are the contiguous integers starting at
//! `min_code[L]`, handed out in ascending id order:
//!
//! ```text
//! min_code[max]  = 0
//! min_code[L]    = (min_code[L+1] + lcount[L+1]) >> 1
//! symindex[min]  = 0
//! symindex[L]    = symindex[L-1] + lcount[L-1]
//! ```
//!
//! `symbols[symindex[L] + (code - min_code[L])]` maps an `L`-bit code back
//! to its id, which is all a decoder needs.

use std::io::Read;

use tracing::{debug, trace};

use crate::bitio::BitStreamReader;
use crate::error::{Error, Result};

/// Number of code length slots in a descriptor. Valid lengths are `1..MAX_CODE_LEN`.
pub const MAX_CODE_LEN: usize = 32;

/// A node slot of the Huffman heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeapCell {
    /// A live node with its accumulated weight.
    Weight(u64),
    /// A merged node, pointing at its parent's slot.
    Parent(usize),
}

impl HeapCell {
    fn weight(self) -> u64 {
        match self {
            HeapCell::Weight(w) => w,
            HeapCell::Parent(_) => unreachable!("merged node is still referenced by the heap"),
        }
    }
}

/// Implicit min-heap of node references, 1-based as in the textbook layout.
struct NodeHeap {
    /// `slots[..len]` hold indices into `cells`.
    slots: Vec<usize>,
    len: usize,
    /// `cells[size..2 * size]` are the leaves; merged nodes take `cells[1..size]`.
    cells: Vec<HeapCell>,
}

impl NodeHeap {
    fn with_weights(weights: impl ExactSizeIterator<Item = u64>) -> Self {
        let size = weights.len();
        let mut cells = vec![HeapCell::Weight(0); 2 * size];
        for (i, w) in weights.enumerate() {
            cells[size + i] = HeapCell::Weight(w);
        }
        let mut heap = Self {
            slots: (size..2 * size).collect(),
            len: size,
            cells,
        };
        for node in (1..=size / 2).rev() {
            heap.sift_down(node);
        }
        heap
    }

    fn key(&self, slot: usize) -> u64 {
        self.cells[self.slots[slot - 1]].weight()
    }

    fn sift_down(&mut self, mut node: usize) {
        let mut child = node * 2;
        while child <= self.len {
            if child < self.len && self.key(child + 1) < self.key(child) {
                child += 1;
            }
            if self.key(node) <= self.key(child) {
                break;
            }
            self.slots.swap(node - 1, child - 1);
            node = child;
            child = node * 2;
        }
    }

    fn sift_up(&mut self, mut node: usize) {
        let mut parent = node >> 1;
        while parent > 0 && self.key(parent) > self.key(node) {
            self.slots.swap(parent - 1, node - 1);
            node = parent;
            parent = node >> 1;
        }
    }

    fn pop(&mut self) -> usize {
        let top = self.slots[0];
        self.len -= 1;
        self.slots[0] = self.slots[self.len];
        self.sift_down(1);
        top
    }

    /// Merge nodes until one root remains in `cells[1]`.
    fn merge_all(&mut self) {
        while self.len > 1 {
            let a = self.pop();
            let b = self.pop();
            let merged = self.len + 1;
            let weight = self.cells[a].weight() + self.cells[b].weight();
            self.cells[merged] = HeapCell::Weight(weight);
            self.cells[a] = HeapCell::Parent(merged);
            self.cells[b] = HeapCell::Parent(merged);
            self.slots[self.len] = merged;
            self.len += 1;
            self.sift_up(self.len);
        }
    }

    /// Depth of every leaf, in leaf order.
    fn leaf_depths(&self) -> Vec<u32> {
        let size = self.cells.len() / 2;
        let mut depth = vec![0u32; self.cells.len()];
        for i in 2..self.cells.len() {
            if let HeapCell::Parent(p) = self.cells[i] {
                depth[i] = depth[p] + 1;
            }
        }
        depth.split_off(size)
    }
}

/// Huffman code length of every id, given its corpus frequency.
///
/// A single-id alphabet gets a 1-bit code. Fails on an empty alphabet, on a
/// zero frequency, and on codes that do not fit the descriptor.
pub fn code_lengths(freqs: &[u32]) -> Result<Vec<u32>> {
    if freqs.is_empty() {
        return Err(Error::corpus("cannot build a code for an empty lexicon"));
    }
    if let Some(id) = freqs.iter().position(|&f| f == 0) {
        return Err(Error::corpus(format!("id {id} has frequency 0")));
    }

    let mut heap = NodeHeap::with_weights(freqs.iter().map(|&f| u64::from(f) + 1));
    heap.merge_all();

    let lengths: Vec<u32> = heap.leaf_depths().into_iter().map(|d| d.max(1)).collect();
    let max_codelen = lengths.iter().copied().max().unwrap_or(1);
    if max_codelen as usize >= MAX_CODE_LEN {
        return Err(Error::CodeLengthOverflow {
            max_codelen,
            limit: MAX_CODE_LEN as u32 - 1,
        });
    }
    Ok(lengths)
}

/// Per-id codes for the encoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Codebook {
    codes: Vec<u32>,
    lengths: Vec<u8>,
}

impl Codebook {
    /// Code and code length of `id`, or `None` if `id` is not in the alphabet.
    pub fn get(&self, id: u32) -> Option<(u32, u32)> {
        let i = id as usize;
        Some((*self.codes.get(i)?, u32::from(*self.lengths.get(i)?)))
    }

    /// Number of ids.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Return true if the codebook has no ids.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Total size in bits of a stream with the given id frequencies.
    pub fn encoded_bits(&self, freqs: &[u32]) -> u64 {
        self.lengths
            .iter()
            .zip(freqs)
            .map(|(&l, &f)| u64::from(l) * u64::from(f))
            .sum()
    }
}

/// Canonical Huffman code descriptor.
///
/// Holds everything a decoder needs; the encoder-side codes live in a
/// [`Codebook`] produced alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanTable {
    pub(crate) size: u32,
    pub(crate) length: u32,
    pub(crate) min_codelen: u32,
    pub(crate) max_codelen: u32,
    pub(crate) lcount: [u32; MAX_CODE_LEN],
    pub(crate) min_code: [u32; MAX_CODE_LEN],
    pub(crate) symindex: [u32; MAX_CODE_LEN],
    pub(crate) symbols: Vec<u32>,
}

impl HuffmanTable {
    /// Build the code for an attribute with frequencies `freqs` and `length` tokens.
    pub fn build(freqs: &[u32], length: u32) -> Result<(Self, Codebook)> {
        let lengths = code_lengths(freqs)?;
        let (table, codebook) = Self::from_code_lengths(&lengths, length)?;
        debug!(
            size = table.size,
            min_codelen = table.min_codelen,
            max_codelen = table.max_codelen,
            encoded_bits = codebook.encoded_bits(freqs),
            "built huffman code"
        );
        Ok((table, codebook))
    }

    /// Assign canonical codes to per-id code lengths.
    pub fn from_code_lengths(lengths: &[u32], length: u32) -> Result<(Self, Codebook)> {
        let size = u32::try_from(lengths.len())
            .map_err(|_| Error::corpus("lexicon exceeds 32-bit ids"))?;
        if size == 0 {
            return Err(Error::corpus("cannot build a code for an empty lexicon"));
        }

        let mut lcount = [0u32; MAX_CODE_LEN];
        for (id, &l) in lengths.iter().enumerate() {
            if l == 0 || l as usize >= MAX_CODE_LEN {
                return Err(Error::CodeLengthOverflow {
                    max_codelen: l,
                    limit: MAX_CODE_LEN as u32 - 1,
                });
            }
            lcount[l as usize] += 1;
            trace!(id, codelen = l);
        }
        let min_codelen = lengths.iter().copied().min().unwrap_or(1);
        let max_codelen = lengths.iter().copied().max().unwrap_or(1);

        let mut min_code = [0u32; MAX_CODE_LEN];
        for l in (1..max_codelen as usize).rev() {
            min_code[l] = ((u64::from(min_code[l + 1]) + u64::from(lcount[l + 1])) >> 1) as u32;
        }

        let mut symindex = [0u32; MAX_CODE_LEN];
        for l in (min_codelen as usize + 1)..=(max_codelen as usize) {
            symindex[l] = symindex[l - 1] + lcount[l - 1];
        }

        for l in min_codelen as usize..=max_codelen as usize {
            debug!(
                codelen = l,
                codes = lcount[l],
                min_code = min_code[l],
                symindex = symindex[l]
            );
        }

        let mut next_code = min_code;
        let mut issued = [0u32; MAX_CODE_LEN];
        let mut codes = Vec::with_capacity(lengths.len());
        let mut symbols = vec![0u32; lengths.len()];
        for (id, &l) in lengths.iter().enumerate() {
            let l = l as usize;
            codes.push(next_code[l]);
            next_code[l] += 1;
            symbols[(symindex[l] + issued[l]) as usize] = id as u32;
            issued[l] += 1;
        }

        let table = Self {
            size,
            length,
            min_codelen,
            max_codelen,
            lcount,
            min_code,
            symindex,
            symbols,
        };
        let codebook = Codebook {
            codes,
            lengths: lengths.iter().map(|&l| l as u8).collect(),
        };
        Ok((table, codebook))
    }

    /// Number of ids (V).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Number of tokens (N) the code was built for.
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Shortest code length.
    pub fn min_codelen(&self) -> u32 {
        self.min_codelen
    }

    /// Longest code length.
    pub fn max_codelen(&self) -> u32 {
        self.max_codelen
    }

    /// Number of codes of each length, indexed by length.
    pub fn lcount(&self) -> &[u32; MAX_CODE_LEN] {
        &self.lcount
    }

    /// First code of each length, indexed by length.
    pub fn min_code(&self) -> &[u32; MAX_CODE_LEN] {
        &self.min_code
    }

    /// Offset of each length's block in [`symbols`](Self::symbols), indexed by length.
    pub fn symindex(&self) -> &[u32; MAX_CODE_LEN] {
        &self.symindex
    }

    /// Ids ordered by code length, then by code.
    pub fn symbols(&self) -> &[u32] {
        &self.symbols
    }

    /// Decode one id from `input`.
    pub fn decode_symbol<R: Read>(&self, input: &mut BitStreamReader<R>) -> Result<u32> {
        let mut v = u32::from(input.read_bit()?);
        let mut l = 1usize;
        while v < self.min_code[l] {
            l += 1;
            if l > self.max_codelen as usize {
                return Err(Error::corrupt(
                    input.artifact(),
                    format!("no code of length <= {} matches", self.max_codelen),
                ));
            }
            v = (v << 1) | u32::from(input.read_bit()?);
        }
        self.symbols
            .get(self.symindex[l] as usize + (v - self.min_code[l]) as usize)
            .copied()
            .ok_or_else(|| {
                Error::corrupt(
                    input.artifact(),
                    format!("code {v} of length {l} has no symbol"),
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitio::BitStreamWriter;
    use std::io::Cursor;

    #[test]
    fn worked_example_three_ids() {
        let (table, book) = HuffmanTable::build(&[1, 1, 2], 4).unwrap();
        assert_eq!(code_lengths(&[1, 1, 2]).unwrap(), vec![2, 2, 1]);
        assert_eq!(table.min_codelen(), 1);
        assert_eq!(table.max_codelen(), 2);
        assert_eq!(table.lcount()[1..3], [1, 2]);
        assert_eq!(table.min_code()[1..3], [1, 0]);
        assert_eq!(table.symindex()[1..3], [0, 1]);
        assert_eq!(table.symbols(), &[2, 0, 1]);

        assert_eq!(book.get(0), Some((0b00, 2)));
        assert_eq!(book.get(1), Some((0b01, 2)));
        assert_eq!(book.get(2), Some((0b1, 1)));
        assert_eq!(book.get(3), None);
        assert_eq!(book.encoded_bits(&[1, 1, 2]), 6);
    }

    #[test]
    fn single_id_gets_one_bit() {
        let (table, book) = HuffmanTable::build(&[7], 7).unwrap();
        assert_eq!(book.get(0), Some((0, 1)));
        assert_eq!(table.min_codelen(), 1);
        assert_eq!(table.max_codelen(), 1);
        assert_eq!(table.symbols(), &[0]);

        let mut r = BitStreamReader::new(Cursor::new(vec![0u8]), "<memory>");
        assert_eq!(table.decode_symbol(&mut r).unwrap(), 0);
    }

    #[test]
    fn degenerate_inputs_are_rejected() {
        assert!(matches!(code_lengths(&[]), Err(Error::CorpusAccess(_))));
        assert!(matches!(code_lengths(&[3, 0, 1]), Err(Error::CorpusAccess(_))));
        assert!(HuffmanTable::from_code_lengths(&[1, 0], 1).is_err());
    }

    /// Frequencies whose weights `f + 1` follow 2, 3, 5, 8, ... build a chain-shaped tree.
    fn skewed(n: usize) -> Vec<u32> {
        let mut weights = vec![2u64, 3];
        while weights.len() < n {
            let k = weights.len();
            weights.push(weights[k - 1] + weights[k - 2]);
        }
        weights.iter().map(|&w| (w - 1) as u32).collect()
    }

    #[test]
    fn skewed_weights_reach_31_bits() {
        let lengths = code_lengths(&skewed(32)).unwrap();
        assert_eq!(lengths.iter().max(), Some(&31));
        assert!(HuffmanTable::build(&skewed(32), 0).is_ok());
    }

    #[test]
    fn skewed_weights_overflow_the_length_limit() {
        assert!(matches!(
            code_lengths(&skewed(40)),
            Err(Error::CodeLengthOverflow { max_codelen: 39, .. })
        ));
    }

    #[test]
    fn uniform_frequencies_give_balanced_codes() {
        let lengths = code_lengths(&[5; 8]).unwrap();
        assert!(lengths.iter().all(|&l| l == 3));
    }

    #[test]
    fn codes_decode_back_to_ids() {
        let freqs = [10, 1, 1, 3, 40, 2, 2, 9];
        let (table, book) = HuffmanTable::build(&freqs, freqs.iter().sum()).unwrap();

        let mut w = BitStreamWriter::new(Vec::new(), "<memory>");
        let ids: Vec<u32> = (0..freqs.len() as u32).chain([4, 4, 0, 7]).collect();
        for &id in &ids {
            let (code, len) = book.get(id).unwrap();
            w.write_bits(code, len).unwrap();
        }
        let (bytes, _) = w.finish().unwrap();

        let mut r = BitStreamReader::new(Cursor::new(bytes), "<memory>");
        for &id in &ids {
            assert_eq!(table.decode_symbol(&mut r).unwrap(), id);
        }
    }
}
