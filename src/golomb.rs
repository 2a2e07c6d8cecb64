//! Golomb codes for position gaps.
//!
//! A gap `x` is split by the parameter `b` into a quotient `q = x / b`,
//! written in unary (`q` one-bits and a terminating zero), and a remainder
//! `r = x - q·b`, written in truncated binary.
//!
//! # Truncated binary remainder
//!
//! With $u = \lceil \log_2 b \rceil$ and `nr_sc = 2^u - b` short codes:
//! - `r < nr_sc` is written in `u - 1` bits;
//! - otherwise `r + nr_sc` is written in `u` bits.
//!
//! The decoder reads `u - 1` bits first and only reads one more if the
//! prefix is not a short code. For `b = 1` the remainder is always 0 and no
//! remainder bits are written.
//!
//! # Parameter
//!
//! For an item occurring $f$ times in a corpus of $N$ tokens, gaps are
//! roughly geometric with mean $N/f$, and the best Golomb parameter is
//! $b \approx 0.69 \cdot N/f$ (Witten, Moffat & Bell, *Managing Gigabytes*).
//! The parameter is never stored: encoder and decoder both recompute it
//! from `(f, N)` with [`golomb_parameter`].

use std::io::{Read, Write};

use crate::bitio::{BitStreamReader, BitStreamWriter};
use crate::error::{Error, Result};

/// Golomb parameter for an item of frequency `freq` in a corpus of `corpus_size` tokens.
///
/// Always >= 1.
pub fn golomb_parameter(freq: u32, corpus_size: u32) -> u32 {
    let freq = u64::from(freq.max(1));
    let b = (69 * u64::from(corpus_size)) / (100 * freq);
    b.clamp(1, u64::from(u32::MAX)) as u32
}

/// A Golomb code with a fixed parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Golomb {
    b: u32,
    /// Bits of a long remainder code, `ceil(log2 b)`.
    ub: u32,
    /// Number of short remainder codes.
    nr_sc: u64,
}

impl Golomb {
    /// Create a code with parameter `b` (values below 1 are raised to 1).
    pub fn new(b: u32) -> Self {
        let b = b.max(1);
        let ub = 32 - (b - 1).leading_zeros();
        let nr_sc = (1u64 << ub) - u64::from(b);
        Self { b, ub, nr_sc }
    }

    /// The code for an item of frequency `freq` in a corpus of `corpus_size` tokens.
    pub fn for_item(freq: u32, corpus_size: u32) -> Self {
        Self::new(golomb_parameter(freq, corpus_size))
    }

    /// The parameter `b`.
    pub fn parameter(&self) -> u32 {
        self.b
    }

    /// Length in bits of the code for `gap`.
    pub fn code_len(&self, gap: u32) -> u64 {
        let q = u64::from(gap / self.b);
        let r = u64::from(gap % self.b);
        let rem = if self.ub == 0 {
            0
        } else if r < self.nr_sc {
            u64::from(self.ub - 1)
        } else {
            u64::from(self.ub)
        };
        q + 1 + rem
    }

    /// Write the code for `gap`.
    pub fn encode<W: Write>(&self, gap: u32, out: &mut BitStreamWriter<W>) -> Result<()> {
        let mut q = gap / self.b;
        let r = gap % self.b;

        while q >= 32 {
            out.write_bits(u32::MAX, 32)?;
            q -= 32;
        }
        // q ones followed by the terminating zero
        out.write_bits(((1u64 << (q + 1)) - 2) as u32, q + 1)?;

        if self.ub == 0 {
            return Ok(());
        }
        let r = u64::from(r);
        if r < self.nr_sc {
            out.write_bits(r as u32, self.ub - 1)
        } else {
            out.write_bits((r + self.nr_sc) as u32, self.ub)
        }
    }

    /// Read one gap.
    pub fn decode<R: Read>(&self, input: &mut BitStreamReader<R>) -> Result<u32> {
        let mut q = 0u64;
        while input.read_bit()? {
            q += 1;
        }

        let r = if self.ub == 0 {
            0
        } else {
            let mut r = u64::from(input.read_bits(self.ub - 1)?);
            if r >= self.nr_sc {
                r = ((r << 1) | u64::from(input.read_bit()?)) - self.nr_sc;
            }
            r
        };

        q.checked_mul(u64::from(self.b))
            .and_then(|v| v.checked_add(r))
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| {
                Error::corrupt(
                    input.artifact(),
                    format!("golomb code (b={}, q={q}, r={r}) exceeds 32 bits", self.b),
                )
            })
    }
}
