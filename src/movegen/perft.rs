//! Perft: exhaustive move-count enumeration used to validate the move
//! generator against known node counts, exposed to the `qapla-perft`
//! binary and to the integration test suite.

use crate::movegen::{do_move, generate_legal, undo_move};
use crate::position::Position;

/// Total leaf node count at `depth` plies from `pos`.
#[must_use]
pub fn perft(pos: &mut Position, depth: u32) -> u64 {
    if depth == 0 {
        return 1;
    }
    let moves = generate_legal(pos);
    if depth == 1 {
        return moves.len() as u64;
    }
    let mut nodes = 0u64;
    for mv in moves.iter() {
        let state = do_move(pos, mv);
        nodes += perft(pos, depth - 1);
        undo_move(pos, mv, state);
    }
    nodes
}

/// Per-root-move breakdown ("divide"), used to localise a perft mismatch to
/// a single root move during debugging.
#[must_use]
pub fn perft_divide(pos: &mut Position, depth: u32) -> Vec<(String, u64)> {
    let moves = generate_legal(pos);
    let mut out = Vec::with_capacity(moves.len());
    for mv in moves.iter() {
        let state = do_move(pos, mv);
        let nodes = if depth == 0 { 1 } else { perft(pos, depth - 1) };
        undo_move(pos, mv, state);
        out.push((mv.to_long_algebraic(), nodes));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;

    #[test]
    fn startpos_perft_depth_1_through_3() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        assert_eq!(perft(&mut pos, 1), 20);
        assert_eq!(perft(&mut pos, 2), 400);
        assert_eq!(perft(&mut pos, 3), 8_902);
    }

    #[test]
    fn kiwipete_perft_depth_1_and_2() {
        let mut pos =
            fen::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        assert_eq!(perft(&mut pos, 1), 48);
        assert_eq!(perft(&mut pos, 2), 2_039);
    }

    #[test]
    fn position_3_perft_depth_1_through_4() {
        let mut pos = fen::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&mut pos, 1), 14);
        assert_eq!(perft(&mut pos, 2), 191);
        assert_eq!(perft(&mut pos, 3), 2_812);
        assert_eq!(perft(&mut pos, 4), 43_238);
    }
}
