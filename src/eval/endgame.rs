//! Endgame specialisations: exact or near-exact scores for material
//! signatures where the general term-sum evaluator is unreliable (dead
//! draws it would otherwise score as winning, or simple mates it would
//! underrate).
//!
//! A signature-keyed dispatch table, expressed as a match over
//! `PieceSignature`'s per-side piece counts rather than a precomputed
//! lookup array, since the signature type already exposes
//! `count`/`side_signature` cheaply. This is also the hook point the
//! bitbase generator/reader eventually overrides: `specialized_value` wins
//! in `eval::mod`'s dispatch order but a bitbase probe is consulted first
//! in its place.

use crate::bits::squares;
use crate::eval_value::Value;
use crate::position::Position;
use crate::types::{Color, PieceType};

const KNOWN_WIN_FLOOR: Value = 800;

/// Returns `Some(score)` (side-to-move relative, like `Evaluator::evaluate`)
/// when `pos`'s material signature is one this module recognises, `None`
/// to fall through to the general evaluator.
#[must_use]
pub fn specialized_value(pos: &Position) -> Option<Value> {
    let sig = pos.piece_signature();
    if sig.total_non_pawn_pieces() == 0
        && pos.pieces(Color::White, PieceType::Pawn) == 0
        && pos.pieces(Color::Black, PieceType::Pawn) == 0
    {
        return Some(0);
    }

    if is_insufficient_material(pos) {
        return Some(0);
    }

    if let Some(v) = kx_vs_k(pos) {
        return Some(v);
    }

    None
}

/// King + (queen or rook, possibly plus minors) vs bare king: drive the
/// defending king to a corner and keep the attacking king close, same shape
/// as `evalendgame.cpp`'s `KQKEval`/`KRKEval` mating-drive heuristic.
fn kx_vs_k(pos: &Position) -> Option<Value> {
    let (strong, weak) = strong_side(pos)?;
    let weak_has_pieces = pos.pieces(weak, PieceType::Pawn) != 0
        || non_king_pieces(pos, weak) != 0;
    if weak_has_pieces {
        return None;
    }

    let material = material_value(pos, strong) - material_value(pos, weak);
    if material < KNOWN_WIN_FLOOR {
        return None;
    }

    let weak_king = pos.king_square(weak);
    let strong_king = pos.king_square(strong);

    let corner_distance = center_manhattan_distance(weak_king);
    let king_distance = chebyshev_distance(weak_king, strong_king);

    let mate_drive = (14 - corner_distance) * 10 + (8 - king_distance) * 6;
    let score = material + mate_drive;

    Some(match pos.side_to_move() {
        s if s == strong => score,
        _ => -score,
    })
}

fn strong_side(pos: &Position) -> Option<(Color, Color)> {
    let white_material = material_value(pos, Color::White);
    let black_material = material_value(pos, Color::Black);
    if white_material > black_material {
        Some((Color::White, Color::Black))
    } else if black_material > white_material {
        Some((Color::Black, Color::White))
    } else {
        None
    }
}

fn non_king_pieces(pos: &Position, color: Color) -> u64 {
    [
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
    ]
    .iter()
    .fold(0u64, |acc, &kind| acc | pos.pieces(color, kind))
}

fn material_value(pos: &Position, color: Color) -> Value {
    let mut total = 0;
    for kind in crate::types::PIECE_TYPES {
        total += kind.value() * pos.pieces(color, kind).count_ones() as Value;
    }
    total
}

/// True for the classic dead draws: bare kings, KvKN, KvKB, and same-colour
/// KBvKB where neither side can force progress.
fn is_insufficient_material(pos: &Position) -> bool {
    for color in [Color::White, Color::Black] {
        if pos.pieces(color, PieceType::Pawn) != 0
            || pos.pieces(color, PieceType::Rook) != 0
            || pos.pieces(color, PieceType::Queen) != 0
        {
            return false;
        }
    }

    let minors = |color: Color| {
        pos.pieces(color, PieceType::Knight).count_ones()
            + pos.pieces(color, PieceType::Bishop).count_ones()
    };
    let white_minors = minors(Color::White);
    let black_minors = minors(Color::Black);

    if white_minors == 0 && black_minors == 0 {
        return true;
    }
    if white_minors + black_minors == 1 {
        return true;
    }
    if white_minors == 1
        && black_minors == 1
        && pos.pieces(Color::White, PieceType::Bishop) != 0
        && pos.pieces(Color::Black, PieceType::Bishop) != 0
    {
        let white_sq = squares(pos.pieces(Color::White, PieceType::Bishop)).next().unwrap();
        let black_sq = squares(pos.pieces(Color::Black, PieceType::Bishop)).next().unwrap();
        return square_colour(white_sq.index()) == square_colour(black_sq.index());
    }
    false
}

fn square_colour(index: usize) -> bool {
    ((index / 8) + (index % 8)) % 2 == 0
}

/// Distance outward from the centre 4 squares, 0..=6: higher means closer
/// to a corner, which is where a lone king gets mated.
fn center_manhattan_distance(sq: crate::types::Square) -> i32 {
    let file = sq.file() as i32;
    let rank = sq.rank() as i32;
    let file_dist = if file <= 3 { 3 - file } else { file - 4 };
    let rank_dist = if rank <= 3 { 3 - rank } else { rank - 4 };
    file_dist + rank_dist
}

fn chebyshev_distance(a: crate::types::Square, b: crate::types::Square) -> i32 {
    let file_dist = (a.file() as i32 - b.file() as i32).abs();
    let rank_dist = (a.rank() as i32 - b.rank() as i32).abs();
    file_dist.max(rank_dist)
}
