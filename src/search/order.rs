//! Move ordering: TT move, MVV-LVA/SEE captures, killers, history.
//!
//! Scores directly into `MoveList`'s per-entry score slot instead of
//! sorting a separate `Vec<Move>`, so callers keep using
//! `MoveList::pick_best` for incremental best-first iteration.

use crate::movegen::see;
use crate::position::{Move, MoveList, Position};
use crate::types::PieceType;

const HASH_MOVE_SCORE: i32 = 1_000_000;
const WINNING_CAPTURE_BASE: i32 = 100_000;
const PROMOTION_SCORE: i32 = 90_000;
const KILLER_PRIMARY_SCORE: i32 = 80_000;
const KILLER_SECONDARY_SCORE: i32 = 79_000;
const LOSING_CAPTURE_PENALTY: i32 = -100_000;

/// Two killer slots per ply plus a piece/from/to history table, owned by
/// the search for its whole run (not per-node) so heuristics accumulate
/// across the iterative-deepening loop.
pub struct OrderingTables {
    killers: Vec<[Option<Move>; 2]>,
    history: Vec<i32>,
}

const HISTORY_PIECES: usize = 6;
const HISTORY_SQUARES: usize = 64;

impl OrderingTables {
    #[must_use]
    pub fn new(max_ply: usize) -> Self {
        OrderingTables {
            killers: vec![[None, None]; max_ply + 1],
            history: vec![0; HISTORY_PIECES * HISTORY_SQUARES * HISTORY_SQUARES],
        }
    }

    pub fn record_killer(&mut self, ply: usize, mv: Move) {
        let Some(slot) = self.killers.get_mut(ply) else {
            return;
        };
        if slot[0] != Some(mv) {
            slot[1] = slot[0];
            slot[0] = Some(mv);
        }
    }

    pub fn record_history(&mut self, mv: &Move, depth: u8) {
        let idx = history_index(mv);
        let bonus = (depth as i32) * (depth as i32);
        self.history[idx] = self.history[idx].saturating_add(bonus);
    }

    pub fn clear(&mut self) {
        self.killers.iter_mut().for_each(|k| *k = [None, None]);
        self.history.iter_mut().for_each(|h| *h = 0);
    }

    fn killer_score(&self, ply: usize, mv: &Move) -> i32 {
        match self.killers.get(ply) {
            Some([Some(k0), _]) if k0 == mv => KILLER_PRIMARY_SCORE,
            Some([_, Some(k1)]) if k1 == mv => KILLER_SECONDARY_SCORE,
            _ => 0,
        }
    }

    fn history_score(&self, mv: &Move) -> i32 {
        self.history[history_index(mv)]
    }
}

fn history_index(mv: &Move) -> usize {
    mv.moving.index() * HISTORY_SQUARES * HISTORY_SQUARES + mv.from.index() * HISTORY_SQUARES + mv.to.index()
}

/// Assigns an ordering score to every move in `list`, highest-first via
/// `MoveList::pick_best`. `tt_move`, when present, always sorts first.
pub fn score_moves(
    pos: &Position,
    list: &mut MoveList,
    tables: &OrderingTables,
    ply: usize,
    tt_move: Option<Move>,
) {
    for i in 0..list.len() {
        let mv = list.get(i);
        let score = if Some(mv) == tt_move {
            HASH_MOVE_SCORE
        } else if let Some(victim) = mv.captured {
            let exchange = see::see(pos, &mv);
            let mvv_lva = victim.value() * 10 - mv.moving.value();
            if exchange >= 0 {
                WINNING_CAPTURE_BASE + mvv_lva
            } else {
                LOSING_CAPTURE_PENALTY + mvv_lva
            }
        } else if mv.promotion == Some(PieceType::Queen) {
            PROMOTION_SCORE
        } else {
            tables.killer_score(ply, &mv) + tables.history_score(&mv)
        };
        list.set_score(i, score);
    }
}
