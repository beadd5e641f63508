//! Pseudo-legal move generation, legality filtering, and do/undo.
//!
//! A bitboard scan per piece type into a single `MoveList` output parameter,
//! covering the full move set: promotions, en passant, generalised
//! castling. Legality is pseudo-legal-then-filter: each candidate is played
//! with `do_move`, tested for king safety with `attacks::is_in_check`, then
//! undone, traded for the complexity of a fully pin-aware generator.

pub mod attacks;
pub mod perft;
pub mod see;

use crate::bits::{self, KING_ATTACKS, KNIGHT_ATTACKS, PAWN_ATTACKS};
use crate::magic::{bishop_attacks, queen_attacks, rook_attacks};
use crate::position::castling;
use crate::position::{BoardState, Move, MoveFlag, MoveList, NullMoveState, Position};
use crate::types::{Color, Piece, PieceType, Square};

/// Generates every pseudo-legal move for the side to move into `list`,
/// without filtering for king safety.
pub fn generate_pseudo_legal(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move();
    generate_pawn_moves(pos, us, list, false);
    generate_piece_moves(pos, us, PieceType::Knight, list, false);
    generate_piece_moves(pos, us, PieceType::Bishop, list, false);
    generate_piece_moves(pos, us, PieceType::Rook, list, false);
    generate_piece_moves(pos, us, PieceType::Queen, list, false);
    generate_king_moves(pos, us, list, false);
    generate_castling_moves(pos, us, list);
}

/// Generates only captures and promotions (quiescence search's move set).
pub fn generate_pseudo_legal_noisy(pos: &Position, list: &mut MoveList) {
    let us = pos.side_to_move();
    generate_pawn_moves(pos, us, list, true);
    generate_piece_moves(pos, us, PieceType::Knight, list, true);
    generate_piece_moves(pos, us, PieceType::Bishop, list, true);
    generate_piece_moves(pos, us, PieceType::Rook, list, true);
    generate_piece_moves(pos, us, PieceType::Queen, list, true);
    generate_king_moves(pos, us, list, true);
}

/// Filters `list` in place down to legal moves, by playing and undoing each
/// candidate and testing whether it leaves the mover's own king in check.
pub fn filter_legal(pos: &mut Position, list: &MoveList) -> MoveList {
    let us = pos.side_to_move();
    let mut legal = MoveList::new();
    for mv in list.iter() {
        let state = do_move(pos, mv);
        if !attacks::is_in_check(pos, us) {
            legal.push(*mv);
        }
        undo_move(pos, mv, state);
    }
    legal
}

/// Convenience: pseudo-legal generation followed by legality filtering.
#[must_use]
pub fn generate_legal(pos: &mut Position) -> MoveList {
    let mut pseudo = MoveList::new();
    generate_pseudo_legal(pos, &mut pseudo);
    filter_legal(pos, &pseudo)
}

#[must_use]
pub fn generate_legal_noisy(pos: &mut Position) -> MoveList {
    let mut pseudo = MoveList::new();
    generate_pseudo_legal_noisy(pos, &mut pseudo);
    filter_legal(pos, &pseudo)
}

fn generate_pawn_moves(pos: &Position, us: Color, list: &mut MoveList, noisy_only: bool) {
    let them = us.opposite();
    let pawns = pos.pieces(us, PieceType::Pawn);
    let empty = pos.empty_squares();
    let enemy = pos.color_occupancy(them);

    let (push_dir, start_rank, promo_rank, double_rank): (i8, u64, u64, u64) = match us {
        Color::White => (8, bits::RANK_2, bits::RANK_8, bits::RANK_4),
        Color::Black => (-8, bits::RANK_7, bits::RANK_1, bits::RANK_5),
    };

    for from in bits::squares(pawns) {
        let from_bit = from.bit();
        let to_idx = from.0 as i16 + push_dir as i16;
        let single_push_sq = if (0..64).contains(&to_idx) {
            Some(Square::new(to_idx as u8))
        } else {
            None
        };

        if !noisy_only {
            if let Some(to) = single_push_sq {
                if empty & to.bit() != 0 {
                    push_pawn_move(list, from, to, us, PieceType::Pawn, None, promo_rank);
                    if from_bit & start_rank != 0 {
                        let dbl_idx = from.0 as i16 + push_dir as i16 * 2;
                        if (0..64).contains(&dbl_idx) {
                            let dbl = Square::new(dbl_idx as u8);
                            if empty & dbl.bit() != 0 && double_rank & dbl.bit() != 0 {
                                list.push(Move {
                                    from,
                                    to: dbl,
                                    moving: PieceType::Pawn,
                                    captured: None,
                                    promotion: None,
                                    flag: MoveFlag::DoublePawnPush,
                                });
                            }
                        }
                    }
                }
            }
        }

        let attacks = PAWN_ATTACKS[us.index()][from.index()];
        for to in bits::squares(attacks & enemy) {
            let captured = pos.piece_at(to).kind();
            push_pawn_capture(list, from, to, us, captured, promo_rank);
        }

        if let Some(ep) = pos.ep_target() {
            let ep_capture_sq = match us {
                Color::White => Square::new(ep.0 + 8),
                Color::Black => Square::new(ep.0 - 8),
            };
            if attacks & ep_capture_sq.bit() != 0 {
                list.push(Move {
                    from,
                    to: ep_capture_sq,
                    moving: PieceType::Pawn,
                    captured: Some(PieceType::Pawn),
                    promotion: None,
                    flag: MoveFlag::EnPassant,
                });
            }
        }
    }
}

fn push_pawn_move(
    list: &mut MoveList,
    from: Square,
    to: Square,
    _us: Color,
    moving: PieceType,
    captured: Option<PieceType>,
    promo_rank: u64,
) {
    if to.bit() & promo_rank != 0 {
        for promo in [PieceType::Queen, PieceType::Rook, PieceType::Bishop, PieceType::Knight] {
            list.push(Move {
                from,
                to,
                moving,
                captured,
                promotion: Some(promo),
                flag: if captured.is_some() {
                    MoveFlag::PromotionCapture
                } else {
                    MoveFlag::Promotion
                },
            });
        }
    } else {
        list.push(Move {
            from,
            to,
            moving,
            captured,
            promotion: None,
            flag: if captured.is_some() {
                MoveFlag::Capture
            } else {
                MoveFlag::Quiet
            },
        });
    }
}

fn push_pawn_capture(
    list: &mut MoveList,
    from: Square,
    to: Square,
    us: Color,
    captured: Option<PieceType>,
    promo_rank: u64,
) {
    push_pawn_move(list, from, to, us, PieceType::Pawn, captured, promo_rank);
}

fn generate_piece_moves(
    pos: &Position,
    us: Color,
    kind: PieceType,
    list: &mut MoveList,
    noisy_only: bool,
) {
    let own = pos.color_occupancy(us);
    let occupied = pos.occupied();

    for from in bits::squares(pos.pieces(us, kind)) {
        let attacks = match kind {
            PieceType::Knight => KNIGHT_ATTACKS[from.index()],
            PieceType::Bishop => bishop_attacks(from.index(), occupied),
            PieceType::Rook => rook_attacks(from.index(), occupied),
            PieceType::Queen => queen_attacks(from.index(), occupied),
            _ => unreachable!("king/pawn handled separately"),
        };
        let targets = attacks & !own;
        for to in bits::squares(targets) {
            let captured = pos.piece_at(to).kind();
            if noisy_only && captured.is_none() {
                continue;
            }
            list.push(Move {
                from,
                to,
                moving: kind,
                captured,
                promotion: None,
                flag: if captured.is_some() {
                    MoveFlag::Capture
                } else {
                    MoveFlag::Quiet
                },
            });
        }
    }
}

fn generate_king_moves(pos: &Position, us: Color, list: &mut MoveList, noisy_only: bool) {
    let own = pos.color_occupancy(us);
    let from = pos.king_square(us);
    let targets = KING_ATTACKS[from.index()] & !own;
    for to in bits::squares(targets) {
        let captured = pos.piece_at(to).kind();
        if noisy_only && captured.is_none() {
            continue;
        }
        list.push(Move {
            from,
            to,
            moving: PieceType::King,
            captured,
            promotion: None,
            flag: if captured.is_some() {
                MoveFlag::Capture
            } else {
                MoveFlag::Quiet
            },
        });
    }
}

fn generate_castling_moves(pos: &Position, us: Color, list: &mut MoveList) {
    let them = us.opposite();
    if attacks::is_square_attacked(pos, pos.king_square(us), them) {
        return;
    }
    let files = pos.castling().files;
    let king_file = files.king_file[us.index()];
    let home_rank = match us {
        Color::White => 0u8,
        Color::Black => 7u8,
    };
    let king_from = pos.king_square(us);

    for (bit, rook_file, king_to_file, rook_to_file) in [
        (castling::kingside_bit(us), files.rook_kingside_file[us.index()], 6u8, 5u8),
        (castling::queenside_bit(us), files.rook_queenside_file[us.index()], 2u8, 3u8),
    ] {
        if !pos.castling().has(bit) {
            continue;
        }
        let rook_from = Square::from_file_rank(rook_file, home_rank);
        if pos.piece_at(rook_from).kind() != Some(PieceType::Rook) {
            continue;
        }
        let king_to = Square::from_file_rank(king_to_file, home_rank);
        let rook_to = Square::from_file_rank(rook_to_file, home_rank);

        if !path_clear_for_castle(pos, home_rank, king_file, king_to_file, rook_file, rook_to_file, king_from, rook_from) {
            continue;
        }
        if !king_path_safe(pos, them, home_rank, king_file, king_to_file) {
            continue;
        }

        list.push(Move {
            from: king_from,
            to: king_to,
            moving: PieceType::King,
            captured: None,
            promotion: None,
            flag: if king_to_file > king_file {
                MoveFlag::CastleKingside
            } else {
                MoveFlag::CastleQueenside
            },
        });
    }
}

#[allow(clippy::too_many_arguments)]
fn path_clear_for_castle(
    pos: &Position,
    home_rank: u8,
    king_file: u8,
    king_to_file: u8,
    rook_file: u8,
    rook_to_file: u8,
    king_from: Square,
    rook_from: Square,
) -> bool {
    let lo_king = king_file.min(king_to_file);
    let hi_king = king_file.max(king_to_file);
    let lo_rook = rook_file.min(rook_to_file);
    let hi_rook = rook_file.max(rook_to_file);
    let lo = lo_king.min(lo_rook);
    let hi = hi_king.max(hi_rook);
    for file in lo..=hi {
        let sq = Square::from_file_rank(file, home_rank);
        if sq == king_from || sq == rook_from {
            continue;
        }
        if pos.piece_at(sq) != Piece::None {
            return false;
        }
    }
    true
}

fn king_path_safe(
    pos: &Position,
    them: Color,
    home_rank: u8,
    king_file: u8,
    king_to_file: u8,
) -> bool {
    let lo = king_file.min(king_to_file);
    let hi = king_file.max(king_to_file);
    for file in lo..=hi {
        let sq = Square::from_file_rank(file, home_rank);
        if attacks::is_square_attacked(pos, sq, them) {
            return false;
        }
    }
    true
}

/// Applies `mv` to `pos`, returning the undo cookie `undo_move` needs.
pub fn do_move(pos: &mut Position, mv: &Move) -> BoardState {
    let state = BoardState {
        ep_target: pos.ep_target(),
        castling: pos.castling(),
        halfmoves_without_pawn_or_capture: pos.halfmove_clock(),
        zobrist_hash: pos.zobrist_hash(),
        pawn_hash: pos.pawn_hash(),
        pst_sum: pos.pst_sum(),
        material_balance: pos.material_balance(),
        piece_signature: pos.piece_signature(),
    };

    let us = pos.side_to_move();
    let them = us.opposite();
    pos.set_ep_target(None);

    match mv.flag {
        MoveFlag::EnPassant => {
            let captured_sq = match us {
                Color::White => Square::new(mv.to.0 - 8),
                Color::Black => Square::new(mv.to.0 + 8),
            };
            pos.remove_piece(captured_sq);
            pos.remove_piece(mv.from);
            pos.set_piece(mv.to, Piece::new(us, PieceType::Pawn));
        }
        MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
            let home_rank = mv.from.rank();
            let files = pos.castling().files;
            let rook_file = if matches!(mv.flag, MoveFlag::CastleKingside) {
                files.rook_kingside_file[us.index()]
            } else {
                files.rook_queenside_file[us.index()]
            };
            let rook_from = Square::from_file_rank(rook_file, home_rank);
            let rook_to_file = if matches!(mv.flag, MoveFlag::CastleKingside) { 5 } else { 3 };
            let rook_to = Square::from_file_rank(rook_to_file, home_rank);

            pos.remove_piece(mv.from);
            if rook_from != mv.to {
                pos.remove_piece(rook_from);
            }
            pos.set_piece(mv.to, Piece::new(us, PieceType::King));
            pos.set_piece(rook_to, Piece::new(us, PieceType::Rook));
        }
        _ => {
            if let Some(promo) = mv.promotion {
                if mv.is_capture() {
                    pos.remove_piece(mv.to);
                }
                pos.remove_piece(mv.from);
                pos.set_piece(mv.to, Piece::new(us, promo));
            } else {
                if mv.is_capture() {
                    pos.remove_piece(mv.to);
                }
                let piece = pos.remove_piece(mv.from);
                pos.set_piece(mv.to, piece);
            }
        }
    }

    if matches!(mv.flag, MoveFlag::DoublePawnPush) {
        // `ep_target` stores the capturable pawn's own square (its
        // destination here), not FEN's empty pass-through square.
        pos.set_ep_target(Some(mv.to));
    }

    update_castling_rights_after_move(pos, mv, us);

    if mv.moving == PieceType::Pawn || mv.is_capture() {
        pos.set_halfmove_clock(0);
    } else {
        pos.set_halfmove_clock(pos.halfmove_clock() + 1);
    }

    pos.set_side_to_move(them);
    pos.bump_fullmove_number();
    pos.push_history(pos.zobrist_hash());

    pos.debug_check_invariants();
    state
}

fn update_castling_rights_after_move(pos: &mut Position, mv: &Move, us: Color) {
    if mv.moving == PieceType::King {
        for bit in [castling::kingside_bit(us), castling::queenside_bit(us)] {
            pos.toggle_castling_bit(bit);
        }
    }
    let clear_if_rook_left = |pos: &mut Position, sq: Square, color: Color| {
        let f = pos.castling().files;
        if sq.rank() == if matches!(color, Color::White) { 0 } else { 7 } {
            if sq.file() == f.rook_kingside_file[color.index()] {
                pos.toggle_castling_bit(castling::kingside_bit(color));
            } else if sq.file() == f.rook_queenside_file[color.index()] {
                pos.toggle_castling_bit(castling::queenside_bit(color));
            }
        }
    };
    clear_if_rook_left(pos, mv.from, us);
    if mv.is_capture() && !matches!(mv.flag, MoveFlag::EnPassant) {
        clear_if_rook_left(pos, mv.to, us.opposite());
    }
}

/// Restores `pos` to the state before `mv` was played, using `state`.
pub fn undo_move(pos: &mut Position, mv: &Move, state: BoardState) {
    pos.pop_history();
    let them = pos.side_to_move();
    let us = them.opposite();
    pos.set_side_to_move(us);
    if matches!(us, Color::Black) {
        pos.set_fullmove_number(pos.fullmove_number() - 1);
    }

    match mv.flag {
        MoveFlag::EnPassant => {
            pos.remove_piece(mv.to);
            pos.set_piece(mv.from, Piece::new(us, PieceType::Pawn));
            let captured_sq = match us {
                Color::White => Square::new(mv.to.0 - 8),
                Color::Black => Square::new(mv.to.0 + 8),
            };
            pos.set_piece(captured_sq, Piece::new(them, PieceType::Pawn));
        }
        MoveFlag::CastleKingside | MoveFlag::CastleQueenside => {
            let home_rank = mv.from.rank();
            let files = state.castling.files;
            let rook_file = if matches!(mv.flag, MoveFlag::CastleKingside) {
                files.rook_kingside_file[us.index()]
            } else {
                files.rook_queenside_file[us.index()]
            };
            let rook_from = Square::from_file_rank(rook_file, home_rank);
            let rook_to_file = if matches!(mv.flag, MoveFlag::CastleKingside) { 5 } else { 3 };
            let rook_to = Square::from_file_rank(rook_to_file, home_rank);

            pos.remove_piece(mv.to);
            pos.remove_piece(rook_to);
            pos.set_piece(mv.from, Piece::new(us, PieceType::King));
            pos.set_piece(rook_from, Piece::new(us, PieceType::Rook));
        }
        _ => {
            if let Some(_promo) = mv.promotion {
                pos.remove_piece(mv.to);
                pos.set_piece(mv.from, Piece::new(us, PieceType::Pawn));
                if let Some(captured) = mv.captured {
                    pos.set_piece(mv.to, Piece::new(them, captured));
                }
            } else {
                let piece = pos.remove_piece(mv.to);
                pos.set_piece(mv.from, piece);
                if let Some(captured) = mv.captured {
                    pos.set_piece(mv.to, Piece::new(them, captured));
                }
            }
        }
    }

    *pos.castling_mut() = state.castling;
    pos.restore_incremental_state(state);
    pos.debug_check_invariants();
}

/// Applies a null move (side to move passes), used by the search's
/// null-move pruning. Only the side to move and en-passant target change.
pub fn do_null_move(pos: &mut Position) -> NullMoveState {
    let state = NullMoveState {
        ep_target: pos.ep_target(),
        zobrist_hash: pos.zobrist_hash(),
    };
    pos.set_ep_target(None);
    pos.set_side_to_move(pos.side_to_move().opposite());
    state
}

pub fn undo_null_move(pos: &mut Position, state: NullMoveState) {
    pos.set_side_to_move(pos.side_to_move().opposite());
    pos.set_ep_target(state.ep_target);
    debug_assert_eq!(pos.zobrist_hash(), state.zobrist_hash);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;

    #[test]
    fn startpos_has_20_legal_moves() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let moves = generate_legal(&mut pos);
        assert_eq!(moves.len(), 20);
    }

    #[test]
    fn do_undo_move_restores_position_exactly() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let before_hash = pos.zobrist_hash();
        let moves = generate_legal(&mut pos);
        let mv = moves.get(0);
        let state = do_move(&mut pos, &mv);
        assert_ne!(pos.zobrist_hash(), before_hash);
        undo_move(&mut pos, &mv, state);
        assert_eq!(pos.zobrist_hash(), before_hash);
    }

    #[test]
    fn en_passant_capture_is_generated() {
        let mut pos =
            fen::from_fen("rnbqkbnr/ppp1pppp/8/3pP3/8/8/PPPP1PPP/RNBQKBNR w KQkq d6 0 3").unwrap();
        let moves = generate_legal(&mut pos);
        assert!(moves.iter().any(|m| m.flag == MoveFlag::EnPassant));
    }

    #[test]
    fn castling_requires_clear_path_and_no_check_through() {
        let mut pos = fen::from_fen("4k3/8/8/8/8/8/8/R3K2R w KQ - 0 1").unwrap();
        let moves = generate_legal(&mut pos);
        assert!(moves
            .iter()
            .any(|m| m.flag == MoveFlag::CastleKingside || m.flag == MoveFlag::CastleQueenside));
    }

    #[test]
    fn pinned_piece_cannot_expose_king() {
        let mut pos = fen::from_fen("4r3/8/8/8/8/8/4R3/4K3 w - - 0 1").unwrap();
        let moves = generate_legal(&mut pos);
        // The rook on e2 may only move along the e-file or capture on e8.
        assert!(moves
            .iter()
            .filter(|m| m.from == Square::from_file_rank(4, 1))
            .all(|m| m.to.file() == 4));
    }
}
