//! King safety: pawn-shield integrity and an attacker-weighted pressure
//! score on the ring of squares around the king.
//!
//! A per-attacker-type weight accumulated over the king's immediate zone,
//! scaled down when few attackers are involved (a lone knight near the king
//! is not a real threat), plus a separate pawn-shield term and a safe-check
//! term counting squares an enemy piece could check from next move.

use crate::bits::{squares, KING_ATTACKS, KNIGHT_ATTACKS};
use crate::eval_value::EvalValue;
use crate::magic::{bishop_attacks, rook_attacks};
use crate::movegen::attacks::attackers_to;
use crate::position::Position;
use crate::types::{Color, PieceType};

/// Per-attacker-type weight, indexed by `PieceType::index()`. Kings do not
/// attack as "attackers" for this term.
const ATTACK_WEIGHT: [i32; 6] = [2, 8, 8, 11, 14, 0];

/// Per-piece-type weight for a safe check square, indexed by
/// `PieceType::index()`.
const SAFE_CHECK_WEIGHT: [i32; 6] = [0, 9, 9, 12, 16, 0];

/// Attack-unit -> centipawn danger curve, same shape as the original's
/// `KING_SAFETY_TABLE`: roughly quadratic, capped so a swarmed king caps out
/// rather than overflowing.
#[rustfmt::skip]
const DANGER_CURVE: [i32; 32] = [
    0,  0,  1,  2,  3,  5,  7,  9,
   12, 15, 18, 22, 26, 30, 35, 39,
   44, 50, 56, 62, 68, 75, 82, 85,
   89, 92, 95, 98, 99, 100, 100, 100,
];

const MISSING_SHIELD_PAWN_PENALTY: EvalValue = EvalValue::new(-14, -4);
const OPEN_FILE_NEAR_KING_PENALTY: EvalValue = EvalValue::new(-18, -6);

#[must_use]
pub fn evaluate(pos: &Position) -> EvalValue {
    let mut value = EvalValue::default();
    for color in [Color::White, Color::Black] {
        let them = color.opposite();
        let king_sq = pos.king_square(color);
        let zone = KING_ATTACKS[king_sq.index()] | king_sq.bit();

        let mut units = 0i32;
        let mut attacker_count = 0i32;
        for kind in [
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Rook,
            PieceType::Queen,
        ] {
            for sq in squares(pos.pieces(them, kind)) {
                let attacks = crate::magic::queen_attacks(sq.index(), pos.occupied());
                let hits = match kind {
                    PieceType::Knight => crate::bits::KNIGHT_ATTACKS[sq.index()] & zone,
                    _ => attacks & zone,
                };
                if hits != 0 {
                    units += ATTACK_WEIGHT[kind.index()] * hits.count_ones() as i32;
                    attacker_count += 1;
                }
            }
        }

        let check_units = safe_check_pressure(pos, color, king_sq);
        units += check_units;

        let mut side_value = EvalValue::default();
        if attacker_count >= 2 || check_units > 0 {
            let index = (units as usize).min(DANGER_CURVE.len() - 1);
            side_value -= EvalValue::new(DANGER_CURVE[index], DANGER_CURVE[index] / 3);
        }

        side_value += shield_penalty(pos, color, king_sq);

        value = match color {
            Color::White => value + side_value,
            Color::Black => value - side_value,
        };
    }
    value
}

/// Weighted count of squares from which an enemy piece already attacking
/// through that square could move to give check, and not be recaptured for
/// free there. Grounded on `eval/kingattack.h`'s `computeCheckMoves`: for
/// each piece type, the squares a piece of that type would need to occupy to
/// check the king, intersected with the squares the enemy already attacks
/// with that piece type (so the move is available next turn), then split
/// into safe (undefended by us) and unsafe.
fn safe_check_pressure(pos: &Position, color: Color, king_sq: crate::types::Square) -> i32 {
    let them = color.opposite();
    let occupied = pos.occupied();
    let not_their_pieces = !pos.color_occupancy(them);

    let knight_checks = KNIGHT_ATTACKS[king_sq.index()] & not_their_pieces;
    let bishop_checks = bishop_attacks(king_sq.index(), occupied) & not_their_pieces;
    let rook_checks = rook_attacks(king_sq.index(), occupied) & not_their_pieces;

    let mut units = 0;
    for (kind, check_squares) in [
        (PieceType::Knight, knight_checks),
        (PieceType::Bishop, bishop_checks),
        (PieceType::Rook, rook_checks),
        (PieceType::Queen, bishop_checks | rook_checks),
    ] {
        for sq in squares(check_squares) {
            if attackers_to(pos, sq, them, occupied) & pos.pieces(them, kind) == 0 {
                continue;
            }
            let safe = attackers_to(pos, sq, color, occupied) == 0;
            units += SAFE_CHECK_WEIGHT[kind.index()] * if safe { 2 } else { 1 };
        }
    }
    units
}

fn shield_penalty(
    pos: &Position,
    color: Color,
    king_sq: crate::types::Square,
) -> EvalValue {
    let mut penalty = EvalValue::default();
    let own_pawns = pos.pieces(color, PieceType::Pawn);
    let king_file = king_sq.file();

    for file in king_file.saturating_sub(1)..=(king_file + 1).min(7) {
        let file_mask = crate::bits::file_mask(file);
        if own_pawns & file_mask == 0 {
            penalty += MISSING_SHIELD_PAWN_PENALTY;
            if pos.pieces(color.opposite(), PieceType::Pawn) & file_mask == 0 {
                penalty += OPEN_FILE_NEAR_KING_PENALTY;
            }
        }
    }
    penalty
}
