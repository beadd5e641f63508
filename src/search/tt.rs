//! Transposition table: mate scoring, transposition lookup and store.
//!
//! A flat power-of-two-sized `Vec`, a hash-masked index, a replacement rule
//! that favours deeper searches and stale generations. The entry layout is
//! narrowed to a packed key-fragment/best-move/value/depth/bound/age shape;
//! there is no separate stored hash key, since `Position::zobrist_hash`
//! already is one.
//!
//! Writes during search are best-effort racy, with no locking, relying on
//! the key-fragment check on probe for integrity. The search model here is
//! single-threaded and cooperative, so a `&mut TranspositionTable` never
//! actually crosses a thread boundary; the racy-write design is carried as
//! a documented property of the layout (plain `&mut` access, no atomics)
//! rather than implemented with unsafe cross-thread aliasing nobody here
//! exercises.

use crate::eval_value::{Value, MIN_MATE_VALUE};
use crate::position::Move;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bound {
    Exact,
    Lower,
    Upper,
    Draw,
}

impl Bound {
    fn to_bits(self) -> u8 {
        match self {
            Bound::Exact => 0,
            Bound::Lower => 1,
            Bound::Upper => 2,
            Bound::Draw => 3,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Bound::Exact,
            1 => Bound::Lower,
            2 => Bound::Upper,
            _ => Bound::Draw,
        }
    }
}

/// This layout lands at 12 bytes (key fragment 4, best move 4, value 2,
/// depth 1, bound+age 1) and is left unpadded.
#[derive(Clone, Copy, Debug)]
pub struct TTEntry {
    key_fragment: u32,
    best_move: u32,
    value: i16,
    depth: u8,
    meta: u8,
}

impl TTEntry {
    #[must_use]
    pub fn best_move(&self) -> Option<Move> {
        if self.best_move == 0 {
            None
        } else {
            Some(Move::unpack(self.best_move))
        }
    }

    #[must_use]
    pub fn value(&self) -> Value {
        self.value as Value
    }

    #[must_use]
    pub fn depth(&self) -> u8 {
        self.depth
    }

    #[must_use]
    pub fn bound(&self) -> Bound {
        Bound::from_bits(self.meta >> 2)
    }

    fn age(&self) -> u8 {
        self.meta & 0x3F
    }
}

fn key_fragment(hash: u64) -> u32 {
    (hash >> 32) as u32
}

/// Converts a mate-distance-from-root search value into a mate-distance-
/// from-this-node value for storage, so the entry stays valid when probed
/// again at a different ply.
fn value_to_tt(value: Value, ply: u32) -> Value {
    if value >= MIN_MATE_VALUE {
        value + ply as Value
    } else if value <= -MIN_MATE_VALUE {
        value - ply as Value
    } else {
        value
    }
}

/// Inverse of [`value_to_tt`].
fn value_from_tt(value: Value, ply: u32) -> Value {
    if value >= MIN_MATE_VALUE {
        value - ply as Value
    } else if value <= -MIN_MATE_VALUE {
        value + ply as Value
    } else {
        value
    }
}

pub struct TranspositionTable {
    table: Vec<Option<TTEntry>>,
    mask: usize,
    generation: u8,
}

impl TranspositionTable {
    /// `size_mb` is clamped by the caller to a 1..32000 MiB range
    /// (`EngineConfig::clamp_hash_mb`) before reaching here.
    #[must_use]
    pub fn new(size_mb: u32) -> Self {
        let bytes = (size_mb as usize).saturating_mul(1024 * 1024);
        let entry_size = std::mem::size_of::<Option<TTEntry>>().max(1);
        let mut entries = (bytes / entry_size).next_power_of_two();
        if entries > bytes / entry_size && entries > 1 {
            entries /= 2;
        }
        let entries = entries.max(1024);
        TranspositionTable {
            table: vec![None; entries],
            mask: entries - 1,
            generation: 0,
        }
    }

    fn index(&self, hash: u64) -> usize {
        (hash as usize) & self.mask
    }

    /// Looks up `hash`, returning the value already converted from the
    /// stored node-relative mate distance back to root-relative (`ply` is
    /// the current search ply).
    #[must_use]
    pub fn probe(&self, hash: u64, ply: u32) -> Option<TTEntry> {
        let slot = self.table[self.index(hash)]?;
        if slot.key_fragment != key_fragment(hash) {
            return None;
        }
        Some(TTEntry {
            value: value_from_tt(slot.value as Value, ply).clamp(i16::MIN as Value, i16::MAX as Value) as i16,
            ..slot
        })
    }

    pub fn store(
        &mut self,
        hash: u64,
        depth: u8,
        value: Value,
        ply: u32,
        bound: Bound,
        best_move: Option<Move>,
    ) {
        let index = self.index(hash);
        let replace = match &self.table[index] {
            Some(existing) => {
                existing.depth <= depth || existing.age() != self.generation
            }
            None => true,
        };
        if !replace {
            return;
        }

        let stored_value = value_to_tt(value, ply).clamp(i16::MIN as Value, i16::MAX as Value) as i16;
        self.table[index] = Some(TTEntry {
            key_fragment: key_fragment(hash),
            best_move: best_move.map(|m| m.pack()).unwrap_or(0),
            value: stored_value,
            depth,
            meta: (bound.to_bits() << 2) | (self.generation & 0x3F),
        });
    }

    /// Clears the age tag without wiping entries, so a "new game" ages out
    /// every existing slot without the cost of zeroing the whole table
    /// (teacher's `new_generation`, same rationale).
    pub fn new_generation(&mut self) {
        self.generation = self.generation.wrapping_add(1) & 0x3F;
    }

    pub fn clear(&mut self) {
        self.table.iter_mut().for_each(|slot| *slot = None);
        self.generation = 0;
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Permille of slots occupied, for `SearchInfoSink::on_progress`'s
    /// `hash_full_per_mille` field.
    #[must_use]
    pub fn hash_full_per_mille(&self) -> u32 {
        let sample = self.table.len().min(1000);
        if sample == 0 {
            return 0;
        }
        let filled = self.table[..sample].iter().filter(|s| s.is_some()).count();
        (filled * 1000 / sample) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::MoveFlag;
    use crate::types::{PieceType, Square};

    fn sample_move() -> Move {
        Move {
            from: Square::new(12),
            to: Square::new(28),
            moving: PieceType::Pawn,
            captured: None,
            promotion: None,
            flag: MoveFlag::DoublePawnPush,
        }
    }

    #[test]
    fn stores_and_probes_an_exact_entry() {
        let mut tt = TranspositionTable::new(1);
        let hash = 0x1234_5678_9abc_def0;
        tt.store(hash, 6, 55, 0, Bound::Exact, Some(sample_move()));
        let entry = tt.probe(hash, 0).expect("entry should be present");
        assert_eq!(entry.value(), 55);
        assert_eq!(entry.depth(), 6);
        assert_eq!(entry.bound(), Bound::Exact);
        assert_eq!(entry.best_move(), Some(sample_move()));
    }

    #[test]
    fn key_mismatch_is_treated_as_a_miss() {
        let mut tt = TranspositionTable::new(1);
        tt.store(0x1111_1111_0000_0000, 4, 10, 0, Bound::Exact, None);
        assert!(tt.probe(0x2222_2222_0000_0000, 0).is_none());
    }

    #[test]
    fn shallower_depth_does_not_replace_a_deeper_entry() {
        let mut tt = TranspositionTable::new(1);
        let hash = 0xaaaa_bbbb_cccc_dddd;
        tt.store(hash, 10, 100, 0, Bound::Exact, None);
        tt.store(hash, 3, 1, 0, Bound::Lower, None);
        let entry = tt.probe(hash, 0).unwrap();
        assert_eq!(entry.depth(), 10);
        assert_eq!(entry.value(), 100);
    }

    #[test]
    fn new_generation_allows_shallow_entries_to_replace_stale_ones() {
        let mut tt = TranspositionTable::new(1);
        let hash = 0x5555_6666_7777_8888;
        tt.store(hash, 10, 100, 0, Bound::Exact, None);
        tt.new_generation();
        tt.store(hash, 2, -5, 0, Bound::Upper, None);
        let entry = tt.probe(hash, 0).unwrap();
        assert_eq!(entry.depth(), 2);
    }

    #[test]
    fn mate_scores_adjust_relative_to_ply() {
        let mut tt = TranspositionTable::new(1);
        let hash = 0x9999_0000_1111_2222;
        let mate_in_three_from_root = MIN_MATE_VALUE + 10;
        tt.store(hash, 5, mate_in_three_from_root, 4, Bound::Exact, None);
        // Probed at the same ply it was stored at, the value round-trips.
        let entry = tt.probe(hash, 4).unwrap();
        assert_eq!(entry.value(), mate_in_three_from_root);
    }
}
