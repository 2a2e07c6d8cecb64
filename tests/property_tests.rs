use std::io::Cursor;

use corpack::attribute::{frequencies, Attribute, MemoryAttribute};
use corpack::bitio::{read_offsets, BitStreamReader, BitStreamWriter};
use corpack::config::{ArtifactPaths, CompressOptions};
use corpack::golomb::Golomb;
use corpack::huffman::{code_lengths, HuffmanTable};
use corpack::{rdx, token_stream, ReversedIndexReader, TokenStreamReader};
use proptest::prelude::*;

/// Token streams in which every id of `0..v` occurs at least once.
fn corpus() -> impl Strategy<Value = (u32, Vec<u32>)> {
    (1u32..40)
        .prop_flat_map(|v| (Just(v), prop::collection::vec(0..v, 0..400)))
        .prop_flat_map(|(v, mut tokens)| {
            tokens.extend(0..v);
            (Just(v), Just(tokens).prop_shuffle())
        })
}

fn sorted_positions() -> impl Strategy<Value = (u32, Vec<u32>)> {
    (1000u32..100_000).prop_flat_map(|n| {
        (
            Just(n),
            prop::collection::btree_set(0..n, 1..200).prop_map(|s| s.into_iter().collect::<Vec<u32>>()),
        )
    })
}

proptest! {
    #[test]
    fn test_huffman_round_trip((v, tokens) in corpus(), k in 1u32..300) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let opts = CompressOptions::default().with_sync_interval(k).unwrap();
        let attr = MemoryAttribute::new("word", tokens.clone(), v).unwrap();

        let summary = token_stream::compress(&attr, &paths, &opts).unwrap();
        prop_assert_eq!(summary.tokens as usize, tokens.len());
        token_stream::decode_check(&attr, &paths, &opts).unwrap();

        let mut reader = TokenStreamReader::open(&paths, &opts).unwrap();
        prop_assert_eq!(reader.decode_range(0, tokens.len() as u32).unwrap(), tokens);
    }

    #[test]
    fn test_sync_offsets_match_stream((v, tokens) in corpus(), k in 1u32..50) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let opts = CompressOptions::default().with_sync_interval(k).unwrap();
        let attr = MemoryAttribute::new("word", tokens.clone(), v).unwrap();
        token_stream::compress(&attr, &paths, &opts).unwrap();

        // Re-derive every sync offset from the code lengths alone.
        let freqs = frequencies(&attr).unwrap();
        let lengths = code_lengths(&freqs).unwrap();
        let mut expected = Vec::new();
        let mut bits = 0u64;
        for (cpos, &id) in tokens.iter().enumerate() {
            if cpos as u32 % k == 0 {
                bits = bits.div_ceil(8) * 8;
                expected.push((bits / 8) as u32);
            }
            bits += u64::from(lengths[id as usize]);
        }
        prop_assert_eq!(read_offsets(&paths.sync).unwrap(), expected);

        let mut reader = TokenStreamReader::open(&paths, &opts).unwrap();
        for cpos in (0..tokens.len()).rev().step_by(7) {
            prop_assert_eq!(reader.token_at(cpos as u32).unwrap(), tokens[cpos]);
        }
    }

    #[test]
    fn test_kraft_equality(freqs in prop::collection::vec(1u32..10_000, 2..200)) {
        let lengths = code_lengths(&freqs).unwrap();
        let sum: u64 = lengths.iter().map(|&l| 1u64 << (31 - l)).sum();
        prop_assert_eq!(sum, 1u64 << 31);
    }

    #[test]
    fn test_canonical_codes_are_contiguous(freqs in prop::collection::vec(1u32..10_000, 1..200)) {
        let (table, book) = HuffmanTable::build(&freqs, 0).unwrap();
        for l in table.min_codelen()..=table.max_codelen() {
            let codes: Vec<u32> = (0..freqs.len() as u32)
                .filter_map(|id| book.get(id))
                .filter(|&(_, len)| len == l)
                .map(|(code, _)| code)
                .collect();
            prop_assert_eq!(codes.len() as u32, table.lcount()[l as usize]);
            let start = table.min_code()[l as usize];
            let expected: Vec<u32> = (start..start + codes.len() as u32).collect();
            prop_assert_eq!(codes, expected);
        }
    }

    #[test]
    fn test_huffman_codes_decode(freqs in prop::collection::vec(1u32..1000, 1..100)) {
        let (table, book) = HuffmanTable::build(&freqs, 0).unwrap();
        let mut w = BitStreamWriter::new(Vec::new(), "<memory>");
        for id in (0..freqs.len() as u32).rev() {
            let (code, len) = book.get(id).unwrap();
            w.write_bits(code, len).unwrap();
        }
        let (bytes, _) = w.finish().unwrap();

        let mut r = BitStreamReader::new(Cursor::new(bytes), "<memory>");
        for id in (0..freqs.len() as u32).rev() {
            prop_assert_eq!(table.decode_symbol(&mut r).unwrap(), id);
        }
    }

    #[test]
    fn test_golomb_round_trip((n, positions) in sorted_positions()) {
        let code = Golomb::for_item(positions.len() as u32, n);
        let mut w = BitStreamWriter::new(Vec::new(), "<memory>");
        let mut last = 0;
        for &p in &positions {
            code.encode(p - last, &mut w).unwrap();
            last = p;
        }
        let (bytes, _) = w.finish().unwrap();

        let mut r = BitStreamReader::new(Cursor::new(bytes), "<memory>");
        let mut pos = 0;
        for &p in &positions {
            pos += code.decode(&mut r).unwrap();
            prop_assert_eq!(pos, p);
        }
    }

    #[test]
    fn test_rdx_round_trip((v, tokens) in corpus()) {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::new(dir.path().join("word"));
        let attr = MemoryAttribute::new("word", tokens.clone(), v).unwrap();

        let summary = rdx::compress(&attr, &paths).unwrap();
        prop_assert_eq!(summary.items, v);
        rdx::decompress_check(&attr, &paths).unwrap();

        let mut reader = ReversedIndexReader::open(&paths, tokens.len() as u32).unwrap();
        for id in (0..v).rev() {
            let freq = attr.frequency(id).unwrap();
            prop_assert_eq!(reader.positions(id, freq).unwrap(), attr.positions_of(id).unwrap());
        }
    }
}
