//! Canonical index space for a fixed material signature.
//!
//! A *signature* here is the non-king pieces on the board (kings are always
//! present and are handled separately): `[(Color, PieceType)]` in a fixed
//! canonical order. A position's index is `(side_to_move, placement_index)`
//! where `placement_index` encodes, in this order:
//!
//! 1. the white king's square, restricted to its fundamental domain: the
//!    10-square `a1..d4` triangle when no pawn is in the signature (full
//!    board symmetry applies), or the `a`-`d` file half (32 squares) when a
//!    pawn is present (only the left/right mirror remains free);
//! 2. the black king's square, any of the squares not adjacent to or equal
//!    to the white king's square;
//! 3. every remaining listed piece, each over its full square set (48 pawn
//!    squares — ranks 2..7 — or 64 otherwise) minus squares already taken.
//!
//! This mirrors `original_source`'s placement order but, unlike it, does not
//! collapse permutations of identical pieces into binomial-coefficient
//! indices: two identical pieces get `count * (count - 1)` orderings
//! instead of `count choose 2`. That is a deliberate scope trim (documented
//! in `DESIGN.md`): it costs index-space density, not correctness, and the
//! small material signatures this engine targets stay small enough for it
//! not to matter in practice.

use crate::position::Position;
use crate::types::{Color, PieceType, Square};

pub const WHITE_KING_TRIANGLE: [u8; 10] = [0, 1, 2, 3, 9, 10, 11, 18, 19, 27];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub pieces: Vec<(Color, PieceType)>,
}

impl Signature {
    #[must_use]
    pub fn new(pieces: Vec<(Color, PieceType)>) -> Self {
        Signature { pieces }
    }

    /// Derives the canonical signature of `pos`'s non-king material, in the
    /// same queen-rook-bishop-knight-pawn, white-then-black order
    /// [`Self::name`] prints in. Used by the bitbase generator to recognise
    /// which loaded child bitbase a capture/promotion should consult.
    #[must_use]
    pub fn from_position(pos: &Position) -> Self {
        let mut pieces = Vec::new();
        for color in [Color::White, Color::Black] {
            for kind in [
                PieceType::Queen,
                PieceType::Rook,
                PieceType::Bishop,
                PieceType::Knight,
                PieceType::Pawn,
            ] {
                for _ in crate::bits::squares(pos.pieces(color, kind)) {
                    pieces.push((color, kind));
                }
            }
        }
        Signature { pieces }
    }

    #[must_use]
    pub fn has_pawn(&self) -> bool {
        self.pieces.iter().any(|(_, k)| matches!(k, PieceType::Pawn))
    }

    /// Canonical file name, e.g. `KKPK` is written `KPK`: `K` + white piece
    /// letters (queen..pawn order) + `K` + black piece letters.
    #[must_use]
    pub fn name(&self) -> String {
        let mut name = String::from("K");
        for kind in [
            PieceType::Queen,
            PieceType::Rook,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Pawn,
        ] {
            for _ in self
                .pieces
                .iter()
                .filter(|(c, k)| *c == Color::White && *k == kind)
            {
                name.push(kind.to_char().to_ascii_uppercase());
            }
        }
        name.push('K');
        for kind in [
            PieceType::Queen,
            PieceType::Rook,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Pawn,
        ] {
            for _ in self
                .pieces
                .iter()
                .filter(|(c, k)| *c == Color::Black && *k == kind)
            {
                name.push(kind.to_char().to_ascii_uppercase());
            }
        }
        name
    }

    fn white_king_domain(&self) -> &'static [u8] {
        if self.has_pawn() {
            &LEFT_HALF
        } else {
            &WHITE_KING_TRIANGLE
        }
    }

    /// Number of `(white_king, black_king)` placement pairs in this
    /// signature's domain, ignoring side-to-move and the remaining pieces.
    /// Each pair owns a contiguous, equal-sized block of the packed index
    /// space (`encode`'s king terms are the high-order factors), which is
    /// how generation shards the space by king-square pair.
    #[must_use]
    pub fn king_pair_count(&self) -> u64 {
        self.white_king_domain().len() as u64 * 64
    }

    /// Size of the contiguous packed-index block owned by a single
    /// king-square pair: every remaining piece placement times the two
    /// side-to-move values.
    #[must_use]
    pub fn king_pair_block_size(&self) -> u64 {
        self.index_space_size() / self.king_pair_count().max(1)
    }

    /// Total number of `(side_to_move, placement)` slots in this signature's
    /// index space, an upper bound (some slots are illegal, e.g. adjacent
    /// kings, and are skipped by the generator rather than compacted out).
    #[must_use]
    pub fn index_space_size(&self) -> u64 {
        let white_king_count = self.white_king_domain().len() as u64;
        let black_king_count = 64u64;
        let mut total = white_king_count * black_king_count;
        for (_, kind) in &self.pieces {
            total *= if matches!(kind, PieceType::Pawn) { 48 } else { 64 };
        }
        total * 2
    }

    /// Encodes a placement into `(side_to_move, index)`. `white_king`,
    /// `black_king` and `piece_squares` (parallel to `self.pieces`) must all
    /// be mutually disjoint and `white_king` must lie in its fundamental
    /// domain (callers normalise before calling this — see
    /// `crate::bitbase::generate` which only ever builds canonical
    /// placements).
    #[must_use]
    pub fn encode(
        &self,
        side_to_move: Color,
        white_king: Square,
        black_king: Square,
        piece_squares: &[Square],
    ) -> Option<u64> {
        let domain = self.white_king_domain();
        let wk_index = domain.iter().position(|&s| s == white_king.0)? as u64;
        let mut index = wk_index;
        index = index * 64 + black_king.index() as u64;

        for (sq, (_, kind)) in piece_squares.iter().zip(self.pieces.iter()) {
            let radix = if matches!(kind, PieceType::Pawn) { 48 } else { 64 };
            let local = if matches!(kind, PieceType::Pawn) {
                pawn_square_index(*sq)?
            } else {
                sq.index() as u64
            };
            index = index * radix + local;
        }

        Some(index * 2 + side_to_move.index() as u64)
    }

    /// Inverse of [`Self::encode`]: reconstructs the placement for a given
    /// packed index. Returns `None` if the encoded white-king slot is out of
    /// the domain's range (a caller-supplied index from a corrupt file).
    #[must_use]
    pub fn decode(&self, packed: u64) -> Option<Placement> {
        let side_to_move = if packed % 2 == 0 { Color::White } else { Color::Black };
        let mut rest = packed / 2;

        let mut piece_squares = vec![Square::new(0); self.pieces.len()];
        for (slot, (_, kind)) in piece_squares.iter_mut().zip(self.pieces.iter()).rev() {
            let radix = if matches!(kind, PieceType::Pawn) { 48 } else { 64 };
            let local = rest % radix;
            rest /= radix;
            *slot = if matches!(kind, PieceType::Pawn) {
                pawn_square_from_index(local)
            } else {
                Square::new(local as u8)
            };
        }

        let black_king = Square::new((rest % 64) as u8);
        rest /= 64;
        let domain = self.white_king_domain();
        let white_king = Square::new(*domain.get(rest as usize)?);

        Some(Placement {
            side_to_move,
            white_king,
            black_king,
            piece_squares,
        })
    }
}

#[derive(Clone, Debug)]
pub struct Placement {
    pub side_to_move: Color,
    pub white_king: Square,
    pub black_king: Square,
    pub piece_squares: Vec<Square>,
}

const LEFT_HALF: [u8; 32] = [
    0, 1, 2, 3, 8, 9, 10, 11, 16, 17, 18, 19, 24, 25, 26, 27, 32, 33, 34, 35, 40, 41, 42, 43, 48,
    49, 50, 51, 56, 57, 58, 59,
];

fn pawn_square_index(sq: Square) -> Option<u64> {
    let rank = sq.rank();
    if rank == 0 || rank == 7 {
        return None;
    }
    Some((rank as u64 - 1) * 8 + sq.file() as u64)
}

fn pawn_square_from_index(index: u64) -> Square {
    let rank = (index / 8) + 1;
    let file = index % 8;
    Square::from_file_rank(file as u8, rank as u8)
}
