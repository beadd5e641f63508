//! Magic bitboards for bishop/rook/queen attacks.
//!
//! A relevant-occupancy mask per square, a flattened per-square attack table
//! built by enumerating every occupancy subset of the mask (the classic
//! "carry-rippler" magic construction), and a multiplicative hash from
//! occupancy to a dense index. Magics are generated at first use rather than
//! hard-coded; determinism only requires that the same magic always maps
//! the same (square, occupancy) pair to the same index, which a fixed seed
//! guarantees.

use once_cell::sync::Lazy;

use crate::bits::{BISHOP_DELTAS, ROOK_DELTAS};

struct SliderTable {
    masks: [u64; 64],
    magics: [u64; 64],
    shifts: [u32; 64],
    offsets: [usize; 64],
    attacks: Vec<u64>,
}

fn relevant_mask(square: usize, deltas: &[(i8, i8)]) -> u64 {
    let mut mask = 0u64;
    let rank = (square / 8) as i8;
    let file = (square % 8) as i8;
    for &(dr, df) in deltas {
        let (mut r, mut f) = (rank + dr, file + df);
        // Stop one square before the edge: edge squares never block further,
        // so they're excluded from the relevant-occupancy mask.
        while (1..7).contains(&r) && (1..7).contains(&f) {
            mask |= 1u64 << (r * 8 + f);
            r += dr;
            f += df;
        }
    }
    mask
}

fn attacks_from(square: usize, occupancy: u64, deltas: &[(i8, i8)]) -> u64 {
    let mut attacks = 0u64;
    let rank = (square / 8) as i8;
    let file = (square % 8) as i8;
    for &(dr, df) in deltas {
        let (mut r, mut f) = (rank + dr, file + df);
        while (0..8).contains(&r) && (0..8).contains(&f) {
            let sq = (r * 8 + f) as usize;
            attacks |= 1u64 << sq;
            if occupancy & (1u64 << sq) != 0 {
                break;
            }
            r += dr;
            f += df;
        }
    }
    attacks
}

fn occupancy_subset(index: usize, mask: u64) -> u64 {
    let mut occ = 0u64;
    let mut m = mask;
    let mut i = index;
    while m != 0 {
        let bit = m & m.wrapping_neg();
        if i & 1 != 0 {
            occ |= bit;
        }
        m &= m - 1;
        i >>= 1;
    }
    occ
}

/// Deterministic magic search: hashes every occupancy subset of `mask`
/// through candidate multipliers (an xorshift-style fixed-seed stream, not
/// `rand`, so this stays a pure function safe to call from `Lazy`) until one
/// produces no collisions in a table of `1 << bits` entries.
fn find_magic(square: usize, deltas: &[(i8, i8)], mask: u64, bits: u32) -> (u64, Vec<u64>) {
    let occupancies: Vec<u64> = (0..(1usize << mask.count_ones()))
        .map(|i| occupancy_subset(i, mask))
        .collect();
    let reference: Vec<u64> = occupancies
        .iter()
        .map(|&occ| attacks_from(square, occ, deltas))
        .collect();

    let mut seed = 0x9E37_79B9_7F4A_7C15u64 ^ ((square as u64) << 1) ^ (deltas.len() as u64);
    let mut next_rand = move || {
        seed ^= seed << 13;
        seed ^= seed >> 7;
        seed ^= seed << 17;
        seed
    };

    'search: loop {
        let magic = next_rand() & next_rand() & next_rand();
        let mut table = vec![u64::MAX; 1usize << bits];
        for (occ, &attack) in occupancies.iter().zip(reference.iter()) {
            let index = ((occ.wrapping_mul(magic)) >> (64 - bits)) as usize;
            if table[index] == u64::MAX {
                table[index] = attack;
            } else if table[index] != attack {
                continue 'search;
            }
        }
        return (magic, table);
    }
}

fn build_table(deltas: &[(i8, i8)]) -> SliderTable {
    let mut masks = [0u64; 64];
    let mut magics = [0u64; 64];
    let mut shifts = [0u32; 64];
    let mut offsets = [0usize; 64];
    let mut attacks = Vec::new();

    for sq in 0..64 {
        let mask = relevant_mask(sq, deltas);
        let bits = mask.count_ones().max(1);
        let (magic, table) = find_magic(sq, deltas, mask, bits);
        masks[sq] = mask;
        magics[sq] = magic;
        shifts[sq] = 64 - bits;
        offsets[sq] = attacks.len();
        attacks.extend_from_slice(&table);
    }

    SliderTable {
        masks,
        magics,
        shifts,
        offsets,
        attacks,
    }
}

static ROOK_TABLE: Lazy<SliderTable> = Lazy::new(|| build_table(&ROOK_DELTAS));
static BISHOP_TABLE: Lazy<SliderTable> = Lazy::new(|| build_table(&BISHOP_DELTAS));

fn lookup(table: &SliderTable, square: usize, occupied: u64) -> u64 {
    let masked = occupied & table.masks[square];
    let index = (masked.wrapping_mul(table.magics[square])) >> table.shifts[square];
    table.attacks[table.offsets[square] + index as usize]
}

#[inline]
#[must_use]
pub fn rook_attacks(square: usize, occupied: u64) -> u64 {
    lookup(&ROOK_TABLE, square, occupied)
}

#[inline]
#[must_use]
pub fn bishop_attacks(square: usize, occupied: u64) -> u64 {
    lookup(&BISHOP_TABLE, square, occupied)
}

#[inline]
#[must_use]
pub fn queen_attacks(square: usize, occupied: u64) -> u64 {
    rook_attacks(square, occupied) | bishop_attacks(square, occupied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bits::popcount;

    #[test]
    fn rook_attacks_empty_board_from_corner() {
        // a1 on an empty board attacks all of rank 1 and file a (14 squares).
        assert_eq!(popcount(rook_attacks(0, 0)), 14);
    }

    #[test]
    fn rook_attacks_blocked() {
        // Rook on a1, blocker on a4: attacks a2,a3,a4 plus rank 1 (7), total 10.
        let occ = 1u64 << 24; // a4
        assert_eq!(popcount(rook_attacks(0, occ)), 10);
    }

    #[test]
    fn bishop_attacks_center_empty_board() {
        // Bishop on d4 (square 27) on an empty board sees 13 squares.
        assert_eq!(popcount(bishop_attacks(27, 0)), 13);
    }

    #[test]
    fn queen_is_union_of_rook_and_bishop() {
        let occ = 0x0000_1000_0000_0000u64;
        assert_eq!(
            queen_attacks(27, occ),
            rook_attacks(27, occ) | bishop_attacks(27, occ)
        );
    }

    #[test]
    fn magic_lookup_matches_brute_force_for_sampled_occupancies() {
        for sq in [0usize, 9, 27, 36, 63] {
            let mask = relevant_mask(sq, &ROOK_DELTAS);
            for i in [0usize, 1, 5, 17] {
                let occ = occupancy_subset(i.min((1 << mask.count_ones().max(1)) - 1), mask);
                assert_eq!(
                    rook_attacks(sq, occ),
                    attacks_from(sq, occ, &ROOK_DELTAS)
                );
            }
        }
    }
}
