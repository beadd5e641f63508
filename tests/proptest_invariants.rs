//! Property tests for the do/undo and recompute invariants:
//! `undo_move(do_move(P, m)) == P` bit for bit, and the scratch-recomputed
//! hash/pawn-hash/PST/material/signature always agree with the incremental
//! ones a legal move sequence leaves behind.

use proptest::collection::vec as choice_vec;
use proptest::prelude::*;

use qapla::movegen::{do_move, generate_legal, undo_move};
use qapla::position::fen::{from_fen, to_fen, STARTPOS_FEN};
use qapla::position::Position;

fn assert_incremental_matches_scratch(pos: &Position) {
    let (hash, pawn_hash, pst_sum, material, signature) = pos.recompute_from_scratch();
    assert_eq!(hash, pos.zobrist_hash(), "zobrist hash drifted from incremental updates");
    assert_eq!(pawn_hash, pos.pawn_hash(), "pawn hash drifted from incremental updates");
    assert_eq!(pst_sum, pos.pst_sum(), "pst sum drifted from incremental updates");
    assert_eq!(material, pos.material_balance(), "material balance drifted from incremental updates");
    assert_eq!(signature, pos.piece_signature(), "piece signature drifted from incremental updates");
}

/// Walks `count` plies deep from the starting position, picking the
/// `choice`-th legal move modulo the move count at each ply (a
/// deterministic pseudo-random walk, since proptest supplies the choices).
fn walk(choices: &[u8]) -> Position {
    let mut pos = from_fen(STARTPOS_FEN).unwrap();
    for &choice in choices {
        let legal = generate_legal(&mut pos);
        if legal.is_empty() {
            break;
        }
        let mv = legal.get(choice as usize % legal.len());
        do_move(&mut pos, &mv);
    }
    pos
}

proptest! {
    #[test]
    fn do_undo_round_trips(choices in choice_vec(any::<u8>(), 0..12)) {
        let mut pos = from_fen(STARTPOS_FEN).unwrap();
        let mut history = Vec::new();
        for &choice in &choices {
            let legal = generate_legal(&mut pos);
            if legal.is_empty() {
                break;
            }
            let mv = legal.get(choice as usize % legal.len());
            let before = to_fen(&pos);
            let state = do_move(&mut pos, &mv);
            history.push((mv, state, before));
        }

        while let Some((mv, state, before)) = history.pop() {
            undo_move(&mut pos, &mv, state);
            prop_assert_eq!(to_fen(&pos), before, "undo_move did not restore the position exactly");
        }
    }

    #[test]
    fn incremental_aggregates_never_drift(choices in choice_vec(any::<u8>(), 0..16)) {
        let pos = walk(&choices);
        assert_incremental_matches_scratch(&pos);
    }

    #[test]
    fn legal_moves_are_a_subset_of_pseudo_legal(choices in choice_vec(any::<u8>(), 0..10)) {
        let mut pos = walk(&choices);
        let legal = generate_legal(&mut pos);
        let mut pseudo = qapla::position::MoveList::new();
        qapla::movegen::generate_pseudo_legal(&pos, &mut pseudo);
        for i in 0..legal.len() {
            let mv = legal.get(i);
            prop_assert!(pseudo.contains(&mv), "legal move {} missing from pseudo-legal set", mv.to_long_algebraic());
        }
    }

    #[test]
    fn noisy_moves_are_captures_or_promotions(choices in choice_vec(any::<u8>(), 0..10)) {
        let mut pos = walk(&choices);
        let noisy = qapla::movegen::generate_legal_noisy(&mut pos);
        for i in 0..noisy.len() {
            let mv = noisy.get(i);
            prop_assert!(mv.is_capture() || mv.promotion.is_some(), "noisy move {} is neither a capture nor a promotion", mv.to_long_algebraic());
        }
    }
}
