//! Zobrist key tables for incremental position hashing.
//!
//! Built once from a seeded PRNG. A fixed seed is always used, never
//! per-process entropy: the engine relies on the *same* keys across runs so
//! a bitbase generated in one process can be probed by another, and so
//! perft/search golden tests are reproducible without threading
//! `EngineConfig` through every static.

use once_cell::sync::Lazy;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::{Color, Piece, PieceType, Square};

const ZOBRIST_SEED: u64 = 0x516f_6170_6c61_3132; // "Qapla12" in ASCII hex-ish

pub struct ZobristKeys {
    /// [piece packed index 0..12][square]
    pub piece_square: [[u64; 64]; 12],
    pub side_to_move: u64,
    /// One key per castling-right bit (white K, white Q, black K, black Q).
    pub castling: [u64; 4],
    /// One key per file, for the en-passant target file.
    pub en_passant_file: [u64; 8],
}

pub static ZOBRIST: Lazy<ZobristKeys> = Lazy::new(|| {
    let mut rng = StdRng::seed_from_u64(ZOBRIST_SEED);
    let mut piece_square = [[0u64; 64]; 12];
    for row in piece_square.iter_mut() {
        for key in row.iter_mut() {
            *key = rng.gen();
        }
    }
    let mut castling = [0u64; 4];
    for key in castling.iter_mut() {
        *key = rng.gen();
    }
    let mut en_passant_file = [0u64; 8];
    for key in en_passant_file.iter_mut() {
        *key = rng.gen();
    }
    ZobristKeys {
        piece_square,
        side_to_move: rng.gen(),
        castling,
        en_passant_file,
    }
});

#[inline]
#[must_use]
pub fn piece_key(piece: Piece, square: Square) -> u64 {
    match piece.packed_index() {
        Some(idx) => ZOBRIST.piece_square[idx][square.index()],
        None => 0,
    }
}

/// Subset of keys used for the pawn hash: pawns of both colors plus both
/// kings, so the pawn structure cache key ignores every other piece.
#[inline]
#[must_use]
pub fn pawn_hash_relevant(piece: Piece) -> bool {
    matches!(
        piece.kind(),
        Some(PieceType::Pawn) | Some(PieceType::King)
    )
}

#[inline]
#[must_use]
pub fn castling_key(bit: u8) -> u64 {
    ZOBRIST.castling[bit as usize]
}

#[inline]
#[must_use]
pub fn en_passant_key(file: u8) -> u64 {
    ZOBRIST.en_passant_file[file as usize]
}

#[inline]
#[must_use]
pub fn side_to_move_key(color: Color) -> u64 {
    if matches!(color, Color::Black) {
        ZOBRIST.side_to_move
    } else {
        0
    }
}
