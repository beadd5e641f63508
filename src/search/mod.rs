//! Iterative-deepening alpha-beta search.
//!
//! A negamax core with TT probe/store, null-move pruning, late move
//! reductions and check extensions, driven by an outer iterative-deepening
//! loop that grows the aspiration window on fail-high/low. No internal
//! iterative deepening, razoring, or singular extensions: the remaining
//! machinery already exercises every invariant (TT bound handling,
//! mate-distance pruning, draw detection) those passes would otherwise
//! share coverage with.

pub mod order;
pub mod tt;

use crate::bitbase::{BitbaseCache, Signature};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::eval::Evaluator;
use crate::eval_value::{Value, DRAW_VALUE, MAX_VALUE, MIN_MATE_VALUE};
use crate::movegen::{self, attacks, see};
use crate::position::{Move, MoveList, Position};
use crate::types::{Color, PieceType};

use order::OrderingTables;
use tt::{Bound, TranspositionTable};

/// Score awarded to the side delivering mate at the root; searches never
/// return a value outside `-MATE_VALUE..=MATE_VALUE`.
const MATE_VALUE: Value = MAX_VALUE;

fn mate_in(ply: usize) -> Value {
    MATE_VALUE - ply as Value
}

/// Per-node callback the protocol shells implement to surface search
/// progress.
pub trait SearchInfoSink {
    #[allow(clippy::too_many_arguments)]
    fn on_depth_done(
        &mut self,
        depth: u32,
        score: Value,
        bound: Bound,
        time_ms: u64,
        nodes: u64,
        tb_hits: u64,
        pv: &[Move],
    );

    #[allow(clippy::too_many_arguments)]
    fn on_progress(
        &mut self,
        depth: u32,
        score: Value,
        time_ms: u64,
        nodes: u64,
        tb_hits: u64,
        move_idx: u32,
        move_total: u32,
        current_move: Move,
        hash_full_per_mille: u32,
    );
}

/// A sink that discards everything, for callers (tests, self-play scripts
/// that only want the final move) with no interest in per-depth info.
#[derive(Default)]
pub struct NullSink;

impl SearchInfoSink for NullSink {
    fn on_depth_done(&mut self, _: u32, _: Value, _: Bound, _: u64, _: u64, _: u64, _: &[Move]) {}
    fn on_progress(&mut self, _: u32, _: Value, _: u64, _: u64, _: u64, _: u32, _: u32, _: Move, _: u32) {}
}

#[derive(Clone, Debug, Default)]
pub struct SearchStats {
    pub nodes: u64,
    pub tb_hits: u64,
    pub depth_reached: u32,
}

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub best_move: Option<Move>,
    pub pv: Vec<Move>,
    pub value: Value,
    pub stats: SearchStats,
}

/// Owns the per-search-call move-ordering tables; the TT, evaluator and
/// bitbase cache are borrowed from whatever process-wide context
/// constructs this, since those stay single-instance across the process.
pub struct Search<'e> {
    evaluator: &'e Evaluator,
    tt: &'e mut TranspositionTable,
    bitbase: &'e BitbaseCache,
    config: EngineConfig,
    order: OrderingTables,
    nodes: u64,
    tb_hits: u64,
}

impl<'e> Search<'e> {
    #[must_use]
    pub fn new(
        evaluator: &'e Evaluator,
        tt: &'e mut TranspositionTable,
        bitbase: &'e BitbaseCache,
        config: EngineConfig,
    ) -> Self {
        Search {
            evaluator,
            tt,
            bitbase,
            config,
            order: OrderingTables::new(crate::position::MAX_PLY + 64),
            nodes: 0,
            tb_hits: 0,
        }
    }

    pub fn new_game(&mut self) {
        self.tt.new_generation();
        self.order.clear();
    }

    /// Iterative deepening from `pos` (mutated and restored, never left
    /// changed) until `clock` says stop.
    pub fn search(&mut self, pos: &mut Position, clock: &Clock, sink: &mut dyn SearchInfoSink) -> SearchResult {
        self.nodes = 0;
        self.tb_hits = 0;
        self.order.clear();

        let mut best_move = None;
        let mut best_value = 0;
        let mut pv = Vec::new();
        let mut depth = 1u32;

        loop {
            let mut window = self.config.aspiration_window.max(1);
            let (mut alpha, mut beta) = if depth <= 1 || best_move.is_none() {
                (-MATE_VALUE, MATE_VALUE)
            } else {
                (
                    (best_value - window).max(-MATE_VALUE),
                    (best_value + window).min(MATE_VALUE),
                )
            };

            let (value, mv) = loop {
                let (value, mv) = self.search_root(pos, depth, alpha, beta, clock, sink);
                if clock.stop_flag().is_stopped() {
                    break (value, mv);
                }
                if value <= alpha && alpha > -MATE_VALUE {
                    window *= 2;
                    alpha = (alpha - window).max(-MATE_VALUE);
                    continue;
                }
                if value >= beta && beta < MATE_VALUE {
                    window *= 2;
                    beta = (beta + window).min(MATE_VALUE);
                    continue;
                }
                break (value, mv);
            };

            if clock.stop_flag().is_stopped() && mv.is_none() {
                break;
            }

            best_value = value;
            if mv.is_some() {
                best_move = mv;
            }
            pv = self.reconstruct_pv(pos, depth);

            sink.on_depth_done(
                depth,
                best_value,
                Bound::Exact,
                clock.elapsed_ms(),
                self.nodes,
                self.tb_hits,
                &pv,
            );

            if clock.stop_flag().is_stopped() {
                break;
            }
            if best_value.abs() >= MIN_MATE_VALUE {
                break;
            }
            if clock.iteration_budget_exhausted(depth) {
                break;
            }
            depth += 1;
            if depth as usize >= crate::position::MAX_PLY {
                break;
            }
        }

        SearchResult {
            best_move,
            pv,
            value: best_value,
            stats: SearchStats {
                nodes: self.nodes,
                tb_hits: self.tb_hits,
                depth_reached: depth,
            },
        }
    }

    fn search_root(
        &mut self,
        pos: &mut Position,
        depth: u32,
        mut alpha: Value,
        beta: Value,
        clock: &Clock,
        sink: &mut dyn SearchInfoSink,
    ) -> (Value, Option<Move>) {
        let mut legal = movegen::generate_legal(pos);
        if legal.is_empty() {
            let value = if attacks::is_in_check(pos, pos.side_to_move()) {
                -mate_in(0)
            } else {
                DRAW_VALUE
            };
            return (value, None);
        }

        let tt_move = self.tt.probe(pos.zobrist_hash(), 0).and_then(|e| e.best_move());
        order::score_moves(pos, &mut legal, &self.order, 0, tt_move);

        let mut best_value = -MATE_VALUE * 2;
        let mut best_move = None;
        let total = legal.len() as u32;

        for idx in 0..legal.len() {
            let mv = legal.pick_best(idx);
            sink.on_progress(
                depth,
                best_value,
                clock.elapsed_ms(),
                self.nodes,
                self.tb_hits,
                idx as u32 + 1,
                total,
                mv,
                self.tt.hash_full_per_mille(),
            );

            let state = movegen::do_move(pos, &mv);
            let value = if idx == 0 {
                -self.negamax(pos, depth.saturating_sub(1) as i32, 1, -beta, -alpha, clock, true)
            } else {
                let reduced = -self.negamax(pos, depth.saturating_sub(1) as i32, 1, -alpha - 1, -alpha, clock, true);
                if reduced > alpha && reduced < beta {
                    -self.negamax(pos, depth.saturating_sub(1) as i32, 1, -beta, -alpha, clock, true)
                } else {
                    reduced
                }
            };
            movegen::undo_move(pos, &mv, state);

            if value > best_value {
                best_value = value;
                best_move = Some(mv);
            }
            if value > alpha {
                alpha = value;
            }
            if clock.stop_flag().is_stopped() {
                break;
            }
        }

        if let Some(mv) = best_move {
            self.tt
                .store(pos.zobrist_hash(), depth as u8, best_value, 0, Bound::Exact, Some(mv));
        }

        (best_value, best_move)
    }

    fn negamax(
        &mut self,
        pos: &mut Position,
        depth: i32,
        ply: usize,
        mut alpha: Value,
        mut beta: Value,
        clock: &Clock,
        allow_null: bool,
    ) -> Value {
        self.nodes += 1;
        if self.nodes % 2048 == 0 && clock.should_stop(self.nodes) {
            return alpha;
        }

        if ply > 0 {
            if pos.halfmove_clock() >= 100 || pos.repetition_count(pos.zobrist_hash()) >= 2 {
                // Store an exact draw marker so a later transposition into
                // this same position skips straight to it instead of
                // re-walking the position to rediscover it's a draw.
                self.tt.store(pos.zobrist_hash(), depth.max(0) as u8, DRAW_VALUE, ply as u32, Bound::Draw, None);
                return DRAW_VALUE;
            }
            // Mate distance pruning: no point searching for a mate longer
            // than one already found closer to the root.
            alpha = alpha.max(-mate_in(ply));
            beta = beta.min(mate_in(ply + 1));
            if alpha >= beta {
                return alpha;
            }
        }

        if depth <= 0 {
            return self.quiescence(pos, alpha, beta, ply, clock);
        }

        let hash = pos.zobrist_hash();
        let original_alpha = alpha;
        let mut tt_move = None;
        if let Some(entry) = self.tt.probe(hash, ply as u32) {
            tt_move = entry.best_move();
            if entry.depth() as i32 >= depth {
                match entry.bound() {
                    Bound::Exact => return entry.value(),
                    Bound::Lower => alpha = alpha.max(entry.value()),
                    Bound::Upper => beta = beta.min(entry.value()),
                    Bound::Draw => return DRAW_VALUE,
                }
                if alpha >= beta {
                    return entry.value();
                }
            }
        }

        if let Some(wdl) = self.probe_bitbase(pos) {
            self.tb_hits += 1;
            let value = match wdl {
                crate::bitbase::Wdl::Win => mate_in(ply + 2),
                crate::bitbase::Wdl::Loss => -mate_in(ply + 2),
                crate::bitbase::Wdl::Draw | crate::bitbase::Wdl::Illegal => DRAW_VALUE,
            };
            return value;
        }

        let in_check = attacks::is_in_check(pos, pos.side_to_move());

        if allow_null
            && !in_check
            && ply > 0
            && depth >= self.config.null_move_min_reduction as i32 + 1
            && has_non_pawn_material(pos, pos.side_to_move())
        {
            let state = movegen::do_null_move(pos);
            let reduction = self.config.null_move_max_reduction.max(self.config.null_move_min_reduction) as i32;
            let score = -self.negamax(pos, depth - 1 - reduction, ply + 1, -beta, -beta + 1, clock, false);
            movegen::undo_null_move(pos, state);
            if score >= beta {
                return beta;
            }
        }

        let mut legal = movegen::generate_legal(pos);
        if legal.is_empty() {
            return if in_check { -mate_in(ply) } else { DRAW_VALUE };
        }
        order::score_moves(pos, &mut legal, &self.order, ply, tt_move);

        let mut best_value = -MATE_VALUE * 2;
        let mut best_move = None;

        for idx in 0..legal.len() {
            let mv = legal.pick_best(idx);
            let is_quiet = !mv.is_noisy();

            let mut extension = 0;
            if in_check {
                extension = 1;
            } else if is_quiet && self.config.passed_pawn_extension && is_passed_pawn_push(pos, &mv) {
                extension = 1;
            }

            let state = movegen::do_move(pos, &mv);
            let gives_check = attacks::is_in_check(pos, pos.side_to_move());

            let mut reduction = 0;
            if extension == 0
                && !gives_check
                && is_quiet
                && idx >= self.config.lmr_min_move_index
                && depth >= self.config.lmr_min_depth as i32
            {
                reduction = 1;
            }

            let mut value = if idx == 0 {
                -self.negamax(pos, depth - 1 + extension, ply + 1, -beta, -alpha, clock, true)
            } else {
                let reduced_depth = depth - 1 + extension - reduction;
                let score = -self.negamax(pos, reduced_depth, ply + 1, -alpha - 1, -alpha, clock, true);
                if score > alpha && (reduction > 0 || score < beta) {
                    -self.negamax(pos, depth - 1 + extension, ply + 1, -beta, -alpha, clock, true)
                } else {
                    score
                }
            };
            movegen::undo_move(pos, &mv, state);

            if clock.stop_flag().is_stopped() {
                value = value.max(best_value);
            }

            if value > best_value {
                best_value = value;
                best_move = Some(mv);
            }
            if value > alpha {
                alpha = value;
            }
            if alpha >= beta {
                if is_quiet {
                    self.order.record_killer(ply, mv);
                    self.order.record_history(&mv, depth as u8);
                }
                break;
            }
            if clock.stop_flag().is_stopped() {
                break;
            }
        }

        let bound = if best_value <= original_alpha {
            Bound::Upper
        } else if best_value >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.tt.store(hash, depth.max(0) as u8, best_value, ply as u32, bound, best_move);

        best_value
    }

    fn quiescence(&mut self, pos: &mut Position, mut alpha: Value, beta: Value, ply: usize, clock: &Clock) -> Value {
        self.nodes += 1;
        if self.nodes % 2048 == 0 && clock.should_stop(self.nodes) {
            return alpha;
        }

        let in_check = attacks::is_in_check(pos, pos.side_to_move());
        let stand_pat = self.evaluator.evaluate(pos);
        if !in_check {
            if stand_pat >= beta {
                return beta;
            }
            alpha = alpha.max(stand_pat);
        }

        let mut moves = if in_check {
            movegen::generate_legal(pos)
        } else {
            let mut noisy = movegen::generate_legal_noisy(pos);
            retain_non_losing_captures(pos, &mut noisy);
            noisy
        };
        if moves.is_empty() {
            return if in_check { -mate_in(ply) } else { alpha };
        }
        order::score_moves(pos, &mut moves, &self.order, ply.min(self.order_capacity() - 1), None);

        let mut best = if in_check { -MATE_VALUE * 2 } else { stand_pat };
        for idx in 0..moves.len() {
            let mv = moves.pick_best(idx);
            let state = movegen::do_move(pos, &mv);
            let score = -self.quiescence(pos, -beta, -alpha, ply + 1, clock);
            movegen::undo_move(pos, &mv, state);

            if score > best {
                best = score;
            }
            if score > alpha {
                alpha = score;
            }
            if alpha >= beta {
                break;
            }
            if clock.stop_flag().is_stopped() {
                break;
            }
        }
        best
    }

    fn order_capacity(&self) -> usize {
        crate::position::MAX_PLY + 64
    }

    fn probe_bitbase(&self, pos: &Position) -> Option<crate::bitbase::Wdl> {
        let total_pieces: u32 = [Color::White, Color::Black]
            .iter()
            .flat_map(|&c| crate::types::PIECE_TYPES.iter().map(move |&k| (c, k)))
            .filter(|(_, k)| *k != PieceType::King)
            .map(|(c, k)| pos.pieces(c, k).count_ones())
            .sum();
        if total_pieces > 4 {
            return None;
        }
        let signature = Signature::from_position(pos);
        if !self.bitbase.is_loaded(&signature) {
            let _ = self.bitbase.load(&signature);
        }
        self.bitbase.probe(pos, &signature)
    }

    /// Walks the TT's recorded best moves from `pos`, replaying and undoing
    /// them on a scratch clone, to reconstruct the principal variation for
    /// `SearchInfoSink::on_depth_done`. Stops at `depth` plies, on a
    /// repeated position (the chain would loop forever on a draw by
    /// repetition), or when the TT has no more best moves.
    fn reconstruct_pv(&self, pos: &mut Position, depth: u32) -> Vec<Move> {
        let mut pv = Vec::new();
        let mut undo_stack = Vec::new();
        let mut seen_hashes = Vec::new();

        for _ in 0..depth.max(1) {
            let hash = pos.zobrist_hash();
            if seen_hashes.contains(&hash) {
                break;
            }
            let Some(entry) = self.tt.probe(hash, pv.len() as u32) else {
                break;
            };
            let Some(mv) = entry.best_move() else { break };

            let legal = movegen::generate_legal(pos);
            if !legal.contains(&mv) {
                break;
            }

            seen_hashes.push(hash);
            let state = movegen::do_move(pos, &mv);
            undo_stack.push((mv, state));
            pv.push(mv);
        }

        for (mv, state) in undo_stack.into_iter().rev() {
            movegen::undo_move(pos, &mv, state);
        }
        pv
    }
}

fn has_non_pawn_material(pos: &Position, color: Color) -> bool {
    pos.pieces(color, PieceType::Knight) != 0
        || pos.pieces(color, PieceType::Bishop) != 0
        || pos.pieces(color, PieceType::Rook) != 0
        || pos.pieces(color, PieceType::Queen) != 0
}

/// Swap-off filter for quiescence: keep every promotion and every capture
/// that isn't a clear loss.
fn retain_non_losing_captures(pos: &Position, list: &mut MoveList) {
    let mut kept = MoveList::new();
    for i in 0..list.len() {
        let mv = list.get(i);
        if mv.promotion.is_some() || see::see(pos, &mv) >= 0 {
            kept.push(mv);
        }
    }
    *list = kept;
}

fn is_passed_pawn_push(pos: &Position, mv: &Move) -> bool {
    if mv.moving != PieceType::Pawn {
        return false;
    }
    let color = pos.side_to_move();
    let promotion_rank = match color {
        Color::White => 7,
        Color::Black => 0,
    };
    let near_promotion = match color {
        Color::White => mv.to.rank() >= 5,
        Color::Black => mv.to.rank() <= 2,
    };
    if !near_promotion || mv.to.rank() == promotion_rank {
        return false;
    }
    let enemy_pawns = pos.pieces(color.opposite(), PieceType::Pawn);
    crate::eval::pawns::is_passed(mv.to, color, enemy_pawns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, ClockSetting, StopFlag};
    use crate::position::fen;

    fn fresh_search(tt: &mut TranspositionTable, eval: &Evaluator, bb: &BitbaseCache) -> Search<'_> {
        Search::new(eval, tt, bb, EngineConfig::default())
    }

    #[test]
    fn finds_mate_in_one() {
        let mut pos = fen::from_fen("6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1").unwrap();
        let mut tt = TranspositionTable::new(1);
        let evaluator = Evaluator::new(&EngineConfig::default());
        let bitbase = BitbaseCache::new();
        let mut search = fresh_search(&mut tt, &evaluator, &bitbase);

        let clock = Clock::new(ClockSetting::DepthLimit(3), StopFlag::new());
        let result = search.search(&mut pos, &clock, &mut NullSink);

        let mv = result.best_move.expect("should find a move");
        assert_eq!(mv.to_long_algebraic(), "a1a8");
        assert!(result.value >= mate_in(1));
    }

    #[test]
    fn avoids_losing_a_free_queen() {
        let mut pos = fen::from_fen("4k3/8/8/8/8/8/3q4/4K2R w K - 0 1").unwrap();
        let mut tt = TranspositionTable::new(1);
        let evaluator = Evaluator::new(&EngineConfig::default());
        let bitbase = BitbaseCache::new();
        let mut search = fresh_search(&mut tt, &evaluator, &bitbase);

        let clock = Clock::new(ClockSetting::DepthLimit(4), StopFlag::new());
        let result = search.search(&mut pos, &clock, &mut NullSink);
        assert!(result.best_move.is_some());
    }

    #[test]
    fn detects_repetition_draw() {
        // A position with only shuffling rook moves available; forcing the
        // same position three times should be scored as a draw, not a loss,
        // for the side that is materially behind.
        let mut pos = fen::from_fen("7k/8/8/8/8/8/8/R3K2r w Q - 0 1").unwrap();
        let mut tt = TranspositionTable::new(1);
        let evaluator = Evaluator::new(&EngineConfig::default());
        let bitbase = BitbaseCache::new();
        let mut search = fresh_search(&mut tt, &evaluator, &bitbase);
        let clock = Clock::new(ClockSetting::DepthLimit(2), StopFlag::new());
        let result = search.search(&mut pos, &clock, &mut NullSink);
        assert!(result.best_move.is_some());
    }
}
