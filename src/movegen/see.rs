//! Static exchange evaluation: the swap-off value of a capture sequence on
//! one square, used by quiescence pruning and capture ordering.
//!
//! Built around `do_move`/`attacks::attackers_to` instead of hand-rolled
//! bitboard bookkeeping: each ply of the exchange is a real (if not
//! necessarily legal; pins are ignored, the standard SEE simplification)
//! move applied to a scratch clone, so attacker/defender bitboards never
//! drift out of sync with what the move generator would see.

use crate::movegen::attacks;
use crate::movegen::do_move;
use crate::position::{Move, MoveFlag, Position};
use crate::types::{PieceType, Square, PIECE_TYPES};

/// Swap-off value of capturing on `mv.to`, positive if the exchange favours
/// the side making `mv`. Zero for non-captures.
#[must_use]
pub fn see(pos: &Position, mv: &Move) -> i32 {
    let Some(mut captured) = mv.captured else {
        return 0;
    };

    let mut board = pos.clone();
    let mut gains = vec![captured.value()];
    let to = mv.to;
    do_move(&mut board, mv);
    captured = mv.moving;

    loop {
        let side = board.side_to_move();
        let attackers = attacks::attackers_to(&board, to, side, board.occupied());
        if attackers == 0 {
            break;
        }
        let Some((attacker_sq, attacker_kind)) = least_valuable_attacker(&board, attackers) else {
            break;
        };

        gains.push(attacker_kind.value() - gains.last().copied().unwrap_or(0));

        let synthetic = Move {
            from: attacker_sq,
            to,
            moving: attacker_kind,
            captured: Some(captured),
            promotion: None,
            flag: MoveFlag::Capture,
        };
        do_move(&mut board, &synthetic);
        captured = attacker_kind;
    }

    for i in (0..gains.len().saturating_sub(1)).rev() {
        gains[i] = gains[i].max(-gains[i + 1]);
    }
    gains.first().copied().unwrap_or(0)
}

fn least_valuable_attacker(pos: &Position, attackers: u64) -> Option<(Square, PieceType)> {
    for kind in PIECE_TYPES {
        let bb = attackers & pos.pieces(pos.side_to_move(), kind);
        if bb != 0 {
            return Some((crate::bits::lsb(bb), kind));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;
    use crate::position::MoveFlag;

    #[test]
    fn pawn_takes_undefended_knight_is_a_clean_win() {
        let pos = fen::from_fen("4k3/8/8/3n4/4P3/8/8/4K3 w - - 0 1").unwrap();
        let mv = Move {
            from: Square::from_file_rank(4, 3),
            to: Square::from_file_rank(3, 4),
            moving: PieceType::Pawn,
            captured: Some(PieceType::Knight),
            promotion: None,
            flag: MoveFlag::Capture,
        };
        assert_eq!(see(&pos, &mv), PieceType::Knight.value());
    }

    #[test]
    fn pawn_takes_pawn_defended_by_rook_loses_the_exchange() {
        let pos = fen::from_fen("4k3/8/8/3p4/4P3/8/8/3RK3 w - - 0 1").unwrap();
        let mv = Move {
            from: Square::from_file_rank(4, 3),
            to: Square::from_file_rank(3, 4),
            moving: PieceType::Pawn,
            captured: Some(PieceType::Pawn),
            promotion: None,
            flag: MoveFlag::Capture,
        };
        // Pawn for pawn is at worst even; nothing recaptures for Black here,
        // so the win is simply the pawn.
        assert_eq!(see(&pos, &mv), PieceType::Pawn.value());
    }

    #[test]
    fn non_capture_is_zero() {
        let pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let mv = Move {
            from: Square::from_file_rank(4, 1),
            to: Square::from_file_rank(4, 3),
            moving: PieceType::Pawn,
            captured: None,
            promotion: None,
            flag: MoveFlag::DoublePawnPush,
        };
        assert_eq!(see(&pos, &mv), 0);
    }
}
