//! Byte-frequency Huffman coder: the entropy-coding stage layered on top of
//! `deflate`'s LZ77-style output for the `huffman+deflate` on-disk format.
//!
//! Grounded on `examples/original_source/bitbase/HuffmanCode.h`, reworked
//! from its raw-pointer tree (`HuffmanNode* left/right`, arena-free) into an
//! arena of indices per that file's own redesign note, and from its bit-level
//! `setValue`/`getValue` helpers into a small `BitWriter`/`BitReader` pair in
//! the same spirit as `deflate.rs`'s control-byte reader/writer.
//!
//! The tree is serialised pre-order: each node is a leaf flag bit, followed
//! by either an 8-bit leaf byte or (for an internal node) its two children
//! serialised the same way. Decoding rebuilds the identical arena from that
//! bitstream before walking it once per output byte.

#[derive(Clone, Copy)]
enum Node {
    Leaf(u8),
    Internal(u32, u32),
}

struct BitWriter {
    bytes: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter { bytes: Vec::new(), current: 0, filled: 0 }
    }

    fn push_bit(&mut self, bit: bool) {
        if bit {
            self.current |= 1 << (7 - self.filled);
        }
        self.filled += 1;
        if self.filled == 8 {
            self.bytes.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn push_bits(&mut self, code: u32, length: u8) {
        for i in (0..length).rev() {
            self.push_bit((code >> i) & 1 != 0);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        if self.filled > 0 {
            self.bytes.push(self.current);
        }
        self.bytes
    }
}

struct BitReader<'a> {
    bytes: &'a [u8],
    byte_index: usize,
    bit_index: u8,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        BitReader { bytes, byte_index: 0, bit_index: 0 }
    }

    fn next_bit(&mut self) -> bool {
        let byte = self.bytes[self.byte_index];
        let bit = (byte >> (7 - self.bit_index)) & 1 != 0;
        self.bit_index += 1;
        if self.bit_index == 8 {
            self.bit_index = 0;
            self.byte_index += 1;
        }
        bit
    }
}

/// Builds the Huffman forest for `data`'s byte frequencies and collapses it
/// to a single tree, returning the node arena and the root index. Ties in
/// frequency are broken by insertion order, so the same input always
/// produces the same tree regardless of hashmap/heap iteration order.
fn build_tree(data: &[u8]) -> (Vec<Node>, u32) {
    let mut freq = [0u64; 256];
    for &b in data {
        freq[b as usize] += 1;
    }

    let mut nodes: Vec<Node> = Vec::new();
    let mut heap: std::collections::BinaryHeap<std::cmp::Reverse<(u64, u64, u32)>> =
        std::collections::BinaryHeap::new();
    let mut order = 0u64;
    for (value, &count) in freq.iter().enumerate() {
        if count > 0 {
            let idx = nodes.len() as u32;
            nodes.push(Node::Leaf(value as u8));
            heap.push(std::cmp::Reverse((count, order, idx)));
            order += 1;
        }
    }

    if heap.len() == 1 {
        // A single distinct byte would otherwise get a zero-length code;
        // duplicate it as a sibling so it gets a real 1-bit one instead.
        let std::cmp::Reverse((count, _, idx)) = *heap.peek().unwrap();
        if let Node::Leaf(b) = nodes[idx as usize] {
            let dup = nodes.len() as u32;
            nodes.push(Node::Leaf(b));
            heap.push(std::cmp::Reverse((count, order, dup)));
            order += 1;
        }
    }

    while heap.len() > 1 {
        let std::cmp::Reverse((f1, _, n1)) = heap.pop().unwrap();
        let std::cmp::Reverse((f2, _, n2)) = heap.pop().unwrap();
        let idx = nodes.len() as u32;
        nodes.push(Node::Internal(n1, n2));
        heap.push(std::cmp::Reverse((f1 + f2, order, idx)));
        order += 1;
    }

    let root = heap.pop().map_or(0, |std::cmp::Reverse((_, _, idx))| idx);
    (nodes, root)
}

fn build_codes(nodes: &[Node], root: u32, codes: &mut [(u32, u8); 256]) {
    fn walk(nodes: &[Node], idx: u32, code: u32, length: u8, codes: &mut [(u32, u8); 256]) {
        match nodes[idx as usize] {
            Node::Leaf(b) => codes[b as usize] = (code, length),
            Node::Internal(left, right) => {
                walk(nodes, left, code << 1, length + 1, codes);
                walk(nodes, right, (code << 1) | 1, length + 1, codes);
            }
        }
    }
    walk(nodes, root, 0, 0, codes);
}

fn write_tree(writer: &mut BitWriter, nodes: &[Node], idx: u32) {
    match nodes[idx as usize] {
        Node::Leaf(b) => {
            writer.push_bit(true);
            writer.push_bits(b as u32, 8);
        }
        Node::Internal(left, right) => {
            writer.push_bit(false);
            write_tree(writer, nodes, left);
            write_tree(writer, nodes, right);
        }
    }
}

fn read_tree(reader: &mut BitReader) -> (Vec<Node>, u32) {
    let mut nodes = Vec::new();
    let root = read_node(reader, &mut nodes);
    (nodes, root)
}

fn read_node(reader: &mut BitReader, nodes: &mut Vec<Node>) -> u32 {
    if reader.next_bit() {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | (reader.next_bit() as u8);
        }
        let idx = nodes.len() as u32;
        nodes.push(Node::Leaf(byte));
        idx
    } else {
        let idx = nodes.len() as u32;
        nodes.push(Node::Internal(0, 0));
        let left = read_node(reader, nodes);
        let right = read_node(reader, nodes);
        nodes[idx as usize] = Node::Internal(left, right);
        idx
    }
}

/// Huffman-codes `data`: the serialised tree followed by each byte's code,
/// bit-packed and padded to a whole number of bytes.
#[must_use]
pub fn compress(data: &[u8]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let (nodes, root) = build_tree(data);
    let mut codes = [(0u32, 0u8); 256];
    build_codes(&nodes, root, &mut codes);

    let mut writer = BitWriter::new();
    write_tree(&mut writer, &nodes, root);
    for &b in data {
        let (code, length) = codes[b as usize];
        writer.push_bits(code, length);
    }
    writer.finish()
}

/// Inverse of [`compress`]; `out_len` is the known decoded length (the
/// huffman stage carries no in-band length, unlike `deflate`'s control
/// bytes, so the caller supplies it from the file header).
#[must_use]
pub fn decompress(input: &[u8], out_len: usize) -> Vec<u8> {
    if out_len == 0 {
        return Vec::new();
    }
    let mut reader = BitReader::new(input);
    let (nodes, root) = read_tree(&mut reader);
    let mut out = Vec::with_capacity(out_len);
    for _ in 0..out_len {
        let mut idx = root;
        loop {
            match nodes[idx as usize] {
                Node::Leaf(b) => {
                    out.push(b);
                    break;
                }
                Node::Internal(left, right) => idx = if reader.next_bit() { right } else { left },
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_skewed_frequency_data() {
        let mut data = vec![0u8; 900];
        data.extend((0..100).map(|i| (i % 7) as u8 + 1));
        let compressed = compress(&data);
        assert!(compressed.len() < data.len());
        assert_eq!(decompress(&compressed, data.len()), data);
    }

    #[test]
    fn roundtrips_single_distinct_byte() {
        let data = vec![5u8; 64];
        let compressed = compress(&data);
        assert_eq!(decompress(&compressed, data.len()), data);
    }

    #[test]
    fn roundtrips_every_byte_value_once() {
        let data: Vec<u8> = (0..=255).collect();
        let compressed = compress(&data);
        assert_eq!(decompress(&compressed, data.len()), data);
    }

    #[test]
    fn roundtrips_empty_input() {
        assert!(compress(&[]).is_empty());
        assert!(decompress(&[], 0).is_empty());
    }
}
