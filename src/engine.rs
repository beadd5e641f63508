//! Process-wide engine context: owns the shared TT, evaluator, and bitbase
//! cache a protocol shell or self-play driver sits on top of.
//!
//! A thin dispatcher in front of the search driver. TT, pawn-TT, and
//! bitbase cache are single-instance and persist across calls instead of
//! being rebuilt per search.

use crate::bitbase::BitbaseCache;
use crate::clock::{Clock, ClockSetting, StopFlag};
use crate::config::EngineConfig;
use crate::error::EngineResult;
use crate::eval::Evaluator;
use crate::position::{Move, Position};
use crate::search::{Search, SearchInfoSink, SearchResult};

/// Owns every resource a search call needs beyond the position itself.
/// One instance per running engine process (or per self-play worker — the
/// self-play driver constructs one per game so TT contents never leak
/// between independent games it plays concurrently).
pub struct EngineContext {
    config: EngineConfig,
    tt: crate::search::tt::TranspositionTable,
    evaluator: Evaluator,
    bitbase: BitbaseCache,
    stop: StopFlag,
}

impl EngineContext {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        let tt = crate::search::tt::TranspositionTable::new(config.hash_mb);
        let evaluator = Evaluator::new(&config);
        let bitbase = BitbaseCache::new();
        if let Some(dir) = &config.bitbase_path {
            bitbase.set_path(dir.clone());
        }
        EngineContext {
            config,
            tt,
            evaluator,
            bitbase,
            stop: StopFlag::new(),
        }
    }

    /// Clears TT and pawn-TT for a new game.
    pub fn new_game(&mut self) {
        #[cfg(feature = "logging")]
        log::info!("new game: clearing transposition table and pawn hash table");
        self.tt.new_generation();
        self.evaluator.new_game();
    }

    /// Resizes the transposition table, discarding its contents.
    pub fn set_tt_size_kb(&mut self, kb: u32) {
        let mb = EngineConfig::clamp_hash_mb((kb / 1024).max(1));
        #[cfg(feature = "logging")]
        log::info!("resizing transposition table to {mb} MB (requested {kb} KB)");
        self.config.hash_mb = mb;
        self.tt = crate::search::tt::TranspositionTable::new(mb);
    }

    pub fn set_bitbase_path(&mut self, dir: std::path::PathBuf) {
        self.config.bitbase_path = Some(dir.clone());
        self.bitbase.set_path(dir);
    }

    /// A clone of the stop flag this context's searches read, so a caller
    /// running `search` on a dedicated thread can request cancellation from
    /// another.
    #[must_use]
    pub fn stop_flag(&self) -> StopFlag {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Runs one blocking iterative-deepening search. The stop flag is reset
    /// on entry: protocols only ever send `stop` after `go`, never before,
    /// so no external `stop()` call can race this reset.
    pub fn search(&mut self, pos: &mut Position, setting: ClockSetting, sink: &mut dyn SearchInfoSink) -> SearchResult {
        self.stop.reset();
        let clock = Clock::new(setting, self.stop.clone());
        let timer = clock.arm_hard_timer();
        let result = self.search_with_clock(pos, &clock, sink);
        if let Some(timer) = timer {
            timer.cancel();
        }
        result
    }

    /// Same as [`Self::search`] but with a caller-owned `Clock`, so a
    /// protocol shell running the search on a dedicated thread can keep a
    /// handle to the same `Clock` for a later `ponderhit`/`stop` (see
    /// `uci`/`xboard`, which share a `Clock` between the command-reading
    /// thread and the worker thread this way). The stop flag is *not* reset
    /// here — the caller already controls `clock`'s lifecycle.
    pub fn search_with_clock(&mut self, pos: &mut Position, clock: &Clock, sink: &mut dyn SearchInfoSink) -> SearchResult {
        let mut search = Search::new(&self.evaluator, &mut self.tt, &self.bitbase, self.config.clone());
        search.search(pos, clock, sink)
    }

    /// Converts an in-flight ponder/infinite search to a bounded one.
    /// Must be called with the same `Clock` the running
    /// `search()` call is using; `EngineContext` doesn't keep that `Clock`
    /// around once `search()` returns, so this is only meaningful while a
    /// ponder search started elsewhere (e.g. on a dedicated search thread)
    /// is handed its `Clock` to react to directly. See `uci`/`xboard` for
    /// the thread layout that makes this useful.
    pub fn ponder_hit(&self, clock: &Clock, setting: ClockSetting) {
        if let Some(timer) = clock.ponder_hit(setting) {
            timer.cancel();
        }
    }

    /// Convenience for a self-play driver: search to a fixed depth and play
    /// the best move, returning it without requiring the caller to build a
    /// `Clock`/`SearchInfoSink` of its own.
    pub fn play_move(&mut self, pos: &mut Position, depth: u32) -> Option<Move> {
        let mut sink = crate::search::NullSink;
        self.search(pos, ClockSetting::DepthLimit(depth), &mut sink).best_move
    }

    #[must_use]
    pub fn evaluate(&self, pos: &Position) -> crate::eval_value::Value {
        self.evaluator.evaluate(pos)
    }

    pub fn load_bitbase(&self, signature: &crate::bitbase::Signature) -> EngineResult<()> {
        self.bitbase.load(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;

    #[test]
    fn play_move_returns_a_legal_move() {
        let mut ctx = EngineContext::new(EngineConfig::default());
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let mv = ctx.play_move(&mut pos, 2);
        assert!(mv.is_some());
    }

    #[test]
    fn new_game_leaves_the_context_usable() {
        let mut ctx = EngineContext::new(EngineConfig::default());
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        ctx.play_move(&mut pos, 2);
        ctx.new_game();
        assert!(ctx.play_move(&mut pos, 2).is_some());
    }
}
