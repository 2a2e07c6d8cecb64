#![no_main]
use std::io::Cursor;
use std::path::Path;

use corpack::bitio::BitStreamReader;
use corpack::golomb::Golomb;
use corpack::huffman::HuffmanTable;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes as a descriptor: must parse or fail, never panic.
    if let Ok(table) = HuffmanTable::read_from(&mut Cursor::new(data), Path::new("fuzz.hcd")) {
        assert!(table.min_codelen() >= 1);
        assert!(table.max_codelen() < 32);
        assert_eq!(table.symbols().len() as u32, table.size());
    }

    // Arbitrary bytes as a Golomb stream with a parameter taken from the input.
    if let Some((&head, rest)) = data.split_first() {
        let code = Golomb::new(u32::from(head) * 977 + 1);
        let mut r = BitStreamReader::new(Cursor::new(rest), "<fuzz>");
        while code.decode(&mut r).is_ok() {}
    }

    // Arbitrary bytes as a Huffman stream under a fixed code.
    if let Ok((table, _)) = HuffmanTable::build(&[1, 5, 2, 9, 1, 1, 30], 0) {
        let mut r = BitStreamReader::new(Cursor::new(data), "<fuzz>");
        while let Ok(id) = table.decode_symbol(&mut r) {
            assert!(id < 7);
        }
    }
});
