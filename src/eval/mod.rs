//! Static evaluator: material+PST, mobility, pawn structure, king safety,
//! threats, and endgame specialisations, phase-blended into a single
//! centipawn score from the side-to-move's perspective.
//!
//! Mobility, pawn, king attack, threat and tempo terms are each summed as
//! `EvalValue`s in their own submodule, then blended by phase here.

pub mod endgame;
pub mod king_safety;
pub mod mobility;
pub mod pawns;

use crate::config::EngineConfig;
use crate::eval_value::{EvalValue, Value};
use crate::pst_tables::TOTAL_PHASE;
use crate::position::Position;
use crate::types::{Color, PieceType};

pub const TEMPO_BONUS: i32 = 10;

/// Per-term breakdown of a single evaluation call, returned alongside the
/// final score for the self-play/training tooling and for `eval`-style
/// protocol commands that print a term-by-term explanation.
#[derive(Clone, Copy, Debug, Default)]
pub struct EvalBreakdown {
    pub material_pst: EvalValue,
    pub mobility: EvalValue,
    pub pawns: EvalValue,
    pub king_safety: EvalValue,
    pub threats: EvalValue,
    pub tempo: Value,
    pub phase_midgame_percent: i32,
    pub total: Value,
}

/// Shared, lock-protected pawn evaluation cache, sized from `EngineConfig`
/// and owned by whichever layer constructs an `Evaluator` (the engine
/// context, normally).
pub struct Evaluator {
    pawn_tt: pawns::PawnTable,
}

impl Evaluator {
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        Evaluator {
            pawn_tt: pawns::PawnTable::new(pawn_tt_entries(config)),
        }
    }

    pub fn new_game(&mut self) {
        self.pawn_tt.clear();
    }

    /// Full evaluation from the side-to-move's perspective, in centipawns.
    #[must_use]
    pub fn evaluate(&self, pos: &Position) -> Value {
        self.evaluate_breakdown(pos).total
    }

    /// Full per-term breakdown. When `endgame::specialized_value` applies,
    /// its score is the *entire* result: every other field is left at its
    /// default rather than computed and blended in. The specialised scores
    /// are full replacements for positions the general term-sum evaluator
    /// handles poorly (dead draws, simple mating drives near the fifty-move
    /// boundary), not adjustments meant to be added on top of it, so
    /// computing mobility/pawns/king-safety/threats for them would be work
    /// whose result gets discarded either way.
    #[must_use]
    pub fn evaluate_breakdown(&self, pos: &Position) -> EvalBreakdown {
        if let Some(specialized) = endgame::specialized_value(pos) {
            return EvalBreakdown {
                total: specialized,
                phase_midgame_percent: phase_midgame_percent(pos),
                ..Default::default()
            };
        }

        let material_pst = pos.pst_sum();
        let mobility = mobility::evaluate(pos);
        let pawns = self.pawn_tt.probe_or_compute(pos);
        let king_safety = king_safety::evaluate(pos);
        let threats = threats::evaluate(pos);

        let midgame_percent = phase_midgame_percent(pos);
        let sum = material_pst + mobility + pawns + king_safety + threats;
        let blended = sum.blend(midgame_percent);

        let tempo = if matches!(pos.side_to_move(), Color::White) {
            TEMPO_BONUS
        } else {
            -TEMPO_BONUS
        };

        let side_relative = match pos.side_to_move() {
            Color::White => blended + tempo,
            Color::Black => -(blended) + tempo,
        };

        EvalBreakdown {
            material_pst,
            mobility,
            pawns,
            king_safety,
            threats,
            tempo,
            phase_midgame_percent: midgame_percent,
            total: side_relative,
        }
    }
}

mod threats {
    use super::*;

    /// Hanging/undefended-piece pressure: for each side, a small bonus per
    /// enemy piece attacked more times than it is defended. Grounded on
    /// `examples/original_source/eval/threat.h`'s attacker/defender count
    /// comparison, simplified to a flat per-piece bonus rather than the
    /// original's full attack-value table.
    pub fn evaluate(pos: &Position) -> EvalValue {
        let mut value = EvalValue::default();
        for color in [Color::White, Color::Black] {
            let them = color.opposite();
            for kind in crate::types::PIECE_TYPES {
                if matches!(kind, PieceType::King) {
                    continue;
                }
                for sq in crate::bits::squares(pos.pieces(them, kind)) {
                    let attackers = crate::movegen::attacks::attackers_to(pos, sq, color, pos.occupied())
                        .count_ones();
                    let defenders =
                        crate::movegen::attacks::attackers_to(pos, sq, them, pos.occupied()).count_ones();
                    if attackers > defenders {
                        let bonus = EvalValue::flat(8 + kind.value() / 50);
                        value = match color {
                            Color::White => value + bonus,
                            Color::Black => value - bonus,
                        };
                    }
                }
            }
        }
        value
    }
}

/// Game-phase blend percentage (0 = pure endgame, 100 = pure midgame),
/// derived from remaining non-pawn material.
#[must_use]
pub fn phase_midgame_percent(pos: &Position) -> i32 {
    let mut phase = 0i32;
    for color in [Color::White, Color::Black] {
        for kind in [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen] {
            phase += crate::pst_tables::PHASE_WEIGHT[kind.index()] * pos.pieces(color, kind).count_ones() as i32;
        }
    }
    phase = phase.min(TOTAL_PHASE);
    (phase * 100) / TOTAL_PHASE
}

fn pawn_tt_entries(config: &EngineConfig) -> usize {
    let bytes = (config.hash_mb as usize / 16).max(1) * 1024 * 1024;
    (bytes / std::mem::size_of::<pawns::PawnEntry>()).max(1024)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::fen;

    #[test]
    fn startpos_is_near_equal() {
        let pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let eval = Evaluator::new(&EngineConfig::default());
        let score = eval.evaluate(&pos);
        assert!(score.abs() < 60, "startpos should be near-balanced, got {score}");
    }

    #[test]
    fn phase_is_full_midgame_at_start() {
        let pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        assert_eq!(phase_midgame_percent(&pos), 100);
    }

    #[test]
    fn extra_queen_is_clearly_winning() {
        let pos = fen::from_fen("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1").unwrap();
        let eval = Evaluator::new(&EngineConfig::default());
        assert!(eval.evaluate(&pos) > 500);
    }
}
