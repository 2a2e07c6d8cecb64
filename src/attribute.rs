//! The positional attribute being compressed.
//!
//! The compressors only read from an attribute; they never modify it. Every
//! accessor may fail, and every failure aborts the current run.

use crate::error::{Error, Result};

/// Read access to an indexed positional attribute.
///
/// Ids are dense in `[0, vocabulary_size)`, positions are dense in
/// `[0, corpus_length)`. `positions_of(id)` must return exactly
/// `frequency(id)` strictly increasing positions.
pub trait Attribute {
    /// Human-readable name used in log output.
    fn name(&self) -> &str;

    /// Number of distinct ids (V).
    fn vocabulary_size(&self) -> Result<u32>;

    /// Number of tokens (N).
    fn corpus_length(&self) -> Result<u32>;

    /// Number of occurrences of `id`.
    fn frequency(&self, id: u32) -> Result<u32>;

    /// The id at corpus position `cpos`.
    fn token_at(&self, cpos: u32) -> Result<u32>;

    /// Sorted positions at which `id` occurs.
    fn positions_of(&self, id: u32) -> Result<Vec<u32>>;
}

/// Collect the frequency table of an attribute, rejecting unused ids.
pub fn frequencies<A: Attribute + ?Sized>(attr: &A) -> Result<Vec<u32>> {
    let size = vocabulary_size(attr)?;
    (0..size)
        .map(|id| match attr.frequency(id)? {
            0 => Err(Error::corpus(format!(
                "{}: id {id} has frequency 0",
                attr.name()
            ))),
            f => Ok(f),
        })
        .collect()
}

/// Vocabulary size, rejecting an empty lexicon.
pub(crate) fn vocabulary_size<A: Attribute + ?Sized>(attr: &A) -> Result<u32> {
    match attr.vocabulary_size()? {
        0 => Err(Error::corpus(format!("{}: empty lexicon", attr.name()))),
        n => Ok(n),
    }
}

/// Corpus length, rejecting an empty token stream.
pub(crate) fn corpus_length<A: Attribute + ?Sized>(attr: &A) -> Result<u32> {
    match attr.corpus_length()? {
        0 => Err(Error::corpus(format!("{}: empty token stream", attr.name()))),
        n => Ok(n),
    }
}

/// An attribute held entirely in memory.
///
/// Builds the reversed index on construction, so `positions_of` is a slice copy.
#[derive(Debug, Clone)]
pub struct MemoryAttribute {
    name: String,
    tokens: Vec<u32>,
    /// `postings[starts[id]..starts[id + 1]]` are the positions of `id`.
    starts: Vec<u32>,
    postings: Vec<u32>,
}

impl MemoryAttribute {
    /// Build an attribute over `tokens` with ids in `[0, vocabulary_size)`.
    pub fn new(name: impl Into<String>, tokens: Vec<u32>, vocabulary_size: u32) -> Result<Self> {
        let name = name.into();
        if u32::try_from(tokens.len()).is_err() {
            return Err(Error::corpus(format!(
                "{name}: {} tokens exceed the 32-bit position range",
                tokens.len()
            )));
        }

        let mut counts = vec![0u32; vocabulary_size as usize];
        for (cpos, &id) in tokens.iter().enumerate() {
            let slot = counts.get_mut(id as usize).ok_or_else(|| {
                Error::corpus(format!(
                    "{name}: id {id} at cpos {cpos} outside vocabulary of {vocabulary_size}"
                ))
            })?;
            *slot += 1;
        }

        let mut starts = Vec::with_capacity(counts.len() + 1);
        let mut acc = 0u32;
        starts.push(0);
        for &c in &counts {
            acc += c;
            starts.push(acc);
        }

        let mut fill: Vec<u32> = starts[..counts.len()].to_vec();
        let mut postings = vec![0u32; tokens.len()];
        for (cpos, &id) in tokens.iter().enumerate() {
            let slot = &mut fill[id as usize];
            postings[*slot as usize] = cpos as u32;
            *slot += 1;
        }

        Ok(Self {
            name,
            tokens,
            starts,
            postings,
        })
    }

    /// Build an attribute whose vocabulary is `0..=max(tokens)`.
    pub fn from_tokens(name: impl Into<String>, tokens: Vec<u32>) -> Result<Self> {
        let size = tokens.iter().max().map_or(0, |&m| m + 1);
        Self::new(name, tokens, size)
    }

    /// The raw token stream.
    pub fn tokens(&self) -> &[u32] {
        &self.tokens
    }

    fn check_id(&self, id: u32) -> Result<usize> {
        let id = id as usize;
        if id + 1 >= self.starts.len() {
            return Err(Error::corpus(format!(
                "{}: id {id} outside vocabulary",
                self.name
            )));
        }
        Ok(id)
    }
}

impl Attribute for MemoryAttribute {
    fn name(&self) -> &str {
        &self.name
    }

    fn vocabulary_size(&self) -> Result<u32> {
        Ok((self.starts.len() - 1) as u32)
    }

    fn corpus_length(&self) -> Result<u32> {
        Ok(self.tokens.len() as u32)
    }

    fn frequency(&self, id: u32) -> Result<u32> {
        let id = self.check_id(id)?;
        Ok(self.starts[id + 1] - self.starts[id])
    }

    fn token_at(&self, cpos: u32) -> Result<u32> {
        self.tokens.get(cpos as usize).copied().ok_or_else(|| {
            Error::corpus(format!("{}: cpos {cpos} outside corpus", self.name))
        })
    }

    fn positions_of(&self, id: u32) -> Result<Vec<u32>> {
        let id = self.check_id(id)?;
        let (lo, hi) = (self.starts[id] as usize, self.starts[id + 1] as usize);
        Ok(self.postings[lo..hi].to_vec())
    }
}
