//! Retrograde-analysis WDL generator.
//!
//! A fixed-point scheme rather than the more usual backward-BFS-from-mates
//! approach: every round, re-scan every node still `Unknown`; a node
//! becomes `Win` as soon as one legal move reaches an
//! opponent-`Loss` child, `Loss` once *every* legal move reaches an
//! opponent-`Win` child, and otherwise stays `Unknown` for another round.
//! Nodes still `Unknown` once no round changes anything have no winning or
//! losing line and are `Draw` by construction.
//!
//! A move that captures or promotes leaves the current signature; those
//! children are looked up in an already-generated simpler bitbase supplied
//! by the caller (`children`), keyed by [`Signature::name`] -- the generator
//! for a signature always runs after all of its captures/promotion targets,
//! mirroring how real tablebase sets are built smallest-material-first.
//!
//! The fixed-point round loop is partitioned across `cores` worker threads,
//! sharded by contiguous king-square-pair blocks (`Signature::king_pair_count`
//! / `king_pair_block_size`): each worker owns an equal slice of king pairs
//! but reads and writes the whole shared table, because a move can relocate
//! a piece into any other worker's region of the index space. `entries` and
//! `has_moves` are therefore `Vec<AtomicU8>`/`Vec<AtomicBool>` rather than
//! split disjoint slices, and workers rendezvous on a `std::sync::Barrier`
//! once per round: first to agree the shared "anything changed this round"
//! flag is reset, then to finish the round's scan, then to read back whether
//! another round is needed. Races between workers reading each other's
//! not-yet-settled entries are benign the same way stale transposition-table
//! reads are: a node just resolves one round later than the optimal case,
//! never incorrectly.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Barrier};

use crate::error::{EngineError, EngineResult};
use crate::movegen::{self, attacks};
use crate::position::Position;
use crate::types::{Color, Piece, Square};

use super::{Bitbase, CompressionFormat, Signature, Wdl};

/// Generates the full WDL table for `signature` using up to `cores` worker
/// threads, writing the on-disk-format preference `compression` onto the
/// result. `children` must contain a [`Bitbase`] for every signature
/// reachable from `signature` by a single capture or promotion; a position
/// whose resulting signature isn't found there is treated as
/// unknown-forever, i.e. it resolves to `Draw`, which is wrong but only
/// reachable if the caller didn't generate in signature order.
///
/// `trace` logs round-by-round progress (total still-unknown count) at
/// `log::info!` level when the `logging` feature is enabled.
#[must_use]
pub fn generate(
    signature: &Signature,
    children: &HashMap<String, Bitbase>,
    cores: usize,
    compression: CompressionFormat,
    trace: bool,
) -> Bitbase {
    let space = signature.index_space_size() as usize;
    let entries: Vec<AtomicU8> = (0..space).map(|_| AtomicU8::new(Wdl::Illegal.to_byte())).collect();
    let has_moves: Vec<AtomicBool> = (0..space).map(|_| AtomicBool::new(false)).collect();

    mark_terminal_nodes(signature, &entries, &has_moves);
    run_rounds(signature, children, &entries, &has_moves, cores.max(1), trace);

    let mut resolved: Vec<Wdl> = entries.iter().map(|e| Wdl::from_byte(e.load(Ordering::Relaxed))).collect();
    for (packed, has_move) in has_moves.iter().enumerate() {
        if has_move.load(Ordering::Relaxed) && resolved[packed] == Wdl::Illegal {
            resolved[packed] = Wdl::Draw;
        }
    }

    Bitbase::from_entries(signature.clone(), resolved).with_compression(compression)
}

/// Re-generates `signature`'s table from `children` and compares it entry by
/// entry against `stored`, returning the first mismatch found. Used to
/// confirm an already-written bitbase file still matches what its children
/// and the current generator would produce, e.g. after a format change.
pub fn verify(
    signature: &Signature,
    stored: &Bitbase,
    children: &HashMap<String, Bitbase>,
    cores: usize,
) -> EngineResult<()> {
    let fresh = generate(signature, children, cores, CompressionFormat::Raw, false);
    for (packed, (want, got)) in fresh.entries.iter().zip(stored.entries.iter()).enumerate() {
        if want != got {
            return Err(EngineError::BitbaseCorrupt {
                signature: signature.name(),
                reason: format!("entry {packed} mismatch: expected {want:?}, found {got:?}"),
            });
        }
    }
    if fresh.entries.len() != stored.entries.len() {
        return Err(EngineError::BitbaseCorrupt {
            signature: signature.name(),
            reason: format!(
                "entry count mismatch: expected {}, found {}",
                fresh.entries.len(),
                stored.entries.len()
            ),
        });
    }
    Ok(())
}

/// First pass: marks every legal, non-check-evading-failure node with no
/// legal replies (checkmates and stalemates) and records which nodes have
/// at least one legal move, ahead of the iterative round phase. Single
/// threaded: this is one linear scan of the index space, not worth sharding.
fn mark_terminal_nodes(signature: &Signature, entries: &[AtomicU8], has_moves: &[AtomicBool]) {
    for packed in 0..entries.len() as u64 {
        let Some(placement) = signature.decode(packed) else {
            continue;
        };
        let Some(pos) = build_position(signature, &placement) else {
            continue;
        };
        if attacks::is_in_check(&pos, placement.side_to_move.opposite()) {
            continue;
        }

        let mut scratch = pos.clone();
        let legal = movegen::generate_legal(&mut scratch);
        if legal.is_empty() {
            let value = if attacks::is_in_check(&pos, placement.side_to_move) {
                Wdl::Loss
            } else {
                Wdl::Draw
            };
            entries[packed as usize].store(value.to_byte(), Ordering::Relaxed);
        } else {
            has_moves[packed as usize].store(true, Ordering::Relaxed);
        }
    }
}

/// Runs the fixed-point round loop across `cores` worker threads, each
/// responsible for a contiguous slice of king-square-pair blocks. Blocks
/// until no worker changes anything in a full round.
fn run_rounds(
    signature: &Signature,
    children: &HashMap<String, Bitbase>,
    entries: &[AtomicU8],
    has_moves: &[AtomicBool],
    cores: usize,
    trace: bool,
) {
    let king_pairs = signature.king_pair_count().max(1);
    let workers = cores.min(king_pairs as usize).max(1);
    let block_size = signature.king_pair_block_size();
    let pairs_per_worker = king_pairs.div_ceil(workers as u64).max(1);

    let any_changed = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(workers));

    std::thread::scope(|scope| {
        for worker in 0..workers {
            let first_pair = worker as u64 * pairs_per_worker;
            let last_pair = ((worker as u64 + 1) * pairs_per_worker).min(king_pairs);
            if first_pair >= last_pair {
                continue;
            }
            let range_start = first_pair * block_size;
            let range_end = (last_pair * block_size).min(entries.len() as u64);

            let any_changed = Arc::clone(&any_changed);
            let barrier = Arc::clone(&barrier);

            scope.spawn(move || {
                let mut round = 0u64;
                loop {
                    // Barrier 1: rendezvous before resetting the shared flag;
                    // exactly one thread (the round's leader) does the reset.
                    let result = barrier.wait();
                    if result.is_leader() {
                        any_changed.store(false, Ordering::Relaxed);
                    }
                    // Barrier 2: make sure the reset is visible to everyone
                    // before any worker starts scanning its shard.
                    barrier.wait();

                    let mut local_changed = false;
                    for packed in range_start..range_end {
                        if scan_one(signature, children, entries, has_moves, packed) {
                            local_changed = true;
                        }
                    }
                    if local_changed {
                        any_changed.store(true, Ordering::Relaxed);
                    }

                    // Barrier 3: make sure every worker's writes to the flag
                    // (and to `entries`) have landed before anyone decides
                    // whether another round is needed.
                    barrier.wait();
                    round += 1;
                    if trace && worker == 0 {
                        #[cfg(feature = "logging")]
                        log::info!("bitbase {} round {round} complete", signature.name());
                    }
                    if !any_changed.load(Ordering::Relaxed) {
                        break;
                    }
                }
            });
        }
    });
}

/// Re-evaluates a single still-`Illegal`, has-a-move node against the
/// current (possibly still-settling) table, storing `Win`/`Loss` if a
/// decisive result is now reachable. Returns whether it made a change.
fn scan_one(
    signature: &Signature,
    children: &HashMap<String, Bitbase>,
    entries: &[AtomicU8],
    has_moves: &[AtomicBool],
    packed: u64,
) -> bool {
    if !has_moves[packed as usize].load(Ordering::Relaxed)
        || Wdl::from_byte(entries[packed as usize].load(Ordering::Relaxed)) != Wdl::Illegal
    {
        return false;
    }
    let Some(placement) = signature.decode(packed) else {
        return false;
    };
    let Some(pos) = build_position(signature, &placement) else {
        return false;
    };

    let mut scratch = pos.clone();
    let legal = movegen::generate_legal(&mut scratch);

    let mut any_unknown = false;
    let mut any_loses_for_opponent = false;
    let mut all_win_for_opponent = true;

    for mv in &legal {
        let mut child = pos.clone();
        let state = movegen::do_move(&mut child, mv);
        let child_value = value_of(&child, signature, children, entries);
        movegen::undo_move(&mut child, mv, state);

        match child_value {
            None => {
                any_unknown = true;
                all_win_for_opponent = false;
            }
            Some(Wdl::Loss) => any_loses_for_opponent = true,
            Some(Wdl::Win) => {}
            Some(_) => all_win_for_opponent = false,
        }
    }

    if any_loses_for_opponent {
        entries[packed as usize].store(Wdl::Win.to_byte(), Ordering::Relaxed);
        true
    } else if !any_unknown && all_win_for_opponent {
        entries[packed as usize].store(Wdl::Loss.to_byte(), Ordering::Relaxed);
        true
    } else {
        false
    }
}

/// The WDL value of `pos` (from `pos`'s own side-to-move perspective),
/// resolving either against this generation run's in-progress `entries`
/// array (same signature) or an already-finished simpler bitbase
/// (`children`, keyed by signature name) when a capture or promotion
/// changed the material on the board.
fn value_of(
    pos: &Position,
    signature: &Signature,
    children: &HashMap<String, Bitbase>,
    entries: &[AtomicU8],
) -> Option<Wdl> {
    let child_sig = Signature::from_position(pos);
    if child_sig == *signature {
        let placement = placement_of(pos, signature)?;
        let packed = signature.encode(
            pos.side_to_move(),
            placement.0,
            placement.1,
            &placement.2,
        )?;
        match Wdl::from_byte(entries[packed as usize].load(Ordering::Relaxed)) {
            Wdl::Illegal => None,
            value => Some(value),
        }
    } else {
        children.get(&child_sig.name())?.probe(pos)
    }
}

fn placement_of(pos: &Position, signature: &Signature) -> Option<(Square, Square, Vec<Square>)> {
    let white_king = pos.king_square(Color::White);
    let black_king = pos.king_square(Color::Black);
    let mut used = pos.pieces(Color::White, crate::types::PieceType::King)
        | pos.pieces(Color::Black, crate::types::PieceType::King);
    let mut piece_squares = Vec::with_capacity(signature.pieces.len());
    for &(color, kind) in &signature.pieces {
        let candidates = pos.pieces(color, kind) & !used;
        let sq = crate::bits::squares(candidates).next()?;
        used |= sq.bit();
        piece_squares.push(sq);
    }
    Some((white_king, black_king, piece_squares))
}

/// Builds a synthetic position for a decoded placement, rejecting
/// placements that aren't geometrically valid: overlapping squares or kings
/// adjacent to (or on top of) each other. `Signature::decode` deliberately
/// doesn't filter these out itself (see `index.rs`'s module doc comment), so
/// the generator is the one place that has to.
fn build_position(signature: &Signature, placement: &super::index::Placement) -> Option<Position> {
    let mut occupied = vec![placement.white_king, placement.black_king];
    occupied.extend_from_slice(&placement.piece_squares);
    for i in 0..occupied.len() {
        for j in (i + 1)..occupied.len() {
            if occupied[i] == occupied[j] {
                return None;
            }
        }
    }
    if chebyshev(placement.white_king, placement.black_king) <= 1 {
        return None;
    }
    for (sq, (_, kind)) in placement.piece_squares.iter().zip(signature.pieces.iter()) {
        if matches!(kind, crate::types::PieceType::Pawn) {
            let rank = sq.rank();
            if rank == 0 || rank == 7 {
                return None;
            }
        }
    }

    let mut pos = Position::empty();
    pos.set_piece(placement.white_king, Piece::new(Color::White, crate::types::PieceType::King));
    pos.set_piece(placement.black_king, Piece::new(Color::Black, crate::types::PieceType::King));
    for (sq, &(color, kind)) in placement.piece_squares.iter().zip(signature.pieces.iter()) {
        pos.set_piece(*sq, Piece::new(color, kind));
    }
    pos.set_side_to_move(placement.side_to_move);
    Some(pos)
}

fn chebyshev(a: Square, b: Square) -> i32 {
    let file_dist = (a.file() as i32 - b.file() as i32).abs();
    let rank_dist = (a.rank() as i32 - b.rank() as i32).abs();
    file_dist.max(rank_dist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;

    // Full KPK generation walks the whole ~400,000-slot index space through
    // several fixed-point rounds; kept out of the default test run the same
    // way deep perft cases are (see `tests/perft_tests.rs`'s plan).
    #[test]
    #[ignore]
    fn kpk_generation_agrees_with_simple_known_cases() {
        let signature = Signature::new(vec![(Color::White, crate::types::PieceType::Pawn)]);
        let children = HashMap::new();
        let bitbase = generate(&signature, &children, 2, CompressionFormat::Deflate, false);

        // White king and pawn escort the pawn home, black king far off:
        // trivially winning for White with White to move.
        let winning = fen::from_fen("4k3/8/8/8/8/8/4K3/4P3 w - - 0 1").unwrap();
        assert_eq!(bitbase.probe(&winning), Some(Wdl::Win));

        // Black king sits right in front of the pawn with the move,
        // opposition held: a textbook draw.
        let drawn = fen::from_fen("8/8/8/8/3k4/8/3P4/3K4 b - - 0 1").unwrap();
        assert_eq!(bitbase.probe(&drawn), Some(Wdl::Draw));
    }

    #[test]
    #[ignore]
    fn kpk_generation_handles_a_second_simple_mating_line() {
        let signature = Signature::new(vec![(Color::White, crate::types::PieceType::Pawn)]);
        let children = HashMap::new();
        let bitbase = generate(&signature, &children, 1, CompressionFormat::Raw, false);

        let promoting_soon = fen::from_fen("8/8/8/8/k7/8/1KP5/8 w - - 0 1").unwrap();
        assert_eq!(bitbase.probe(&promoting_soon), Some(Wdl::Win));
    }

    #[test]
    fn build_position_rejects_overlapping_and_adjacent_kings() {
        let signature = Signature::new(vec![(Color::White, crate::types::PieceType::Pawn)]);
        let adjacent_kings = super::super::index::Placement {
            side_to_move: Color::White,
            white_king: Square::new(0),
            black_king: Square::new(1),
            piece_squares: vec![Square::new(20)],
        };
        assert!(build_position(&signature, &adjacent_kings).is_none());

        let overlapping = super::super::index::Placement {
            side_to_move: Color::White,
            white_king: Square::new(0),
            black_king: Square::new(32),
            piece_squares: vec![Square::new(0)],
        };
        assert!(build_position(&signature, &overlapping).is_none());

        let valid = super::super::index::Placement {
            side_to_move: Color::White,
            white_king: Square::new(0),
            black_king: Square::new(32),
            piece_squares: vec![Square::new(20)],
        };
        assert!(build_position(&signature, &valid).is_some());
    }

    #[test]
    fn verify_confirms_a_freshly_generated_table() {
        // Bare kings: a 1,280-slot index space, small enough to run un-ignored.
        let signature = Signature::new(vec![]);
        let children = HashMap::new();
        let bitbase = generate(&signature, &children, 2, CompressionFormat::Raw, false);
        assert!(verify(&signature, &bitbase, &children, 2).is_ok());
    }

    #[test]
    fn verify_rejects_a_tampered_entry() {
        let signature = Signature::new(vec![]);
        let children = HashMap::new();
        let mut bitbase = generate(&signature, &children, 1, CompressionFormat::Raw, false);
        let flipped = match bitbase.entries[0] {
            Wdl::Win => Wdl::Loss,
            _ => Wdl::Win,
        };
        bitbase.entries[0] = flipped;
        assert!(verify(&signature, &bitbase, &children, 1).is_err());
    }
}
