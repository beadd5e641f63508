//! Process-wide engine configuration.
//!
//! A single bag passed into the search and evaluator instead of scattered
//! globals or constructor arguments threaded through every layer, kept as
//! plain data so UCI `setoption` and xboard commands can mutate it at
//! runtime without rebuilding the engine.

pub const MIN_HASH_MB: u32 = 1;
pub const MAX_HASH_MB: u32 = 32_000;

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub hash_mb: u32,
    pub bitbase_path: Option<std::path::PathBuf>,
    pub bitbase_cache_mb: u32,
    pub null_move_min_reduction: u32,
    pub null_move_max_reduction: u32,
    pub lmr_min_depth: u32,
    pub lmr_min_move_index: usize,
    pub aspiration_window: i32,
    /// Extends search by one ply on a passed-pawn push to rank 6/7 that
    /// isn't immediately recapturable.
    pub passed_pawn_extension: bool,
    /// Forces single-threaded, jitter-free search so the same position at
    /// the same depth always returns the same line. Independent of Zobrist
    /// key generation, which is always deterministic regardless of this
    /// flag (the keys must stay stable across process restarts for TT and
    /// bitbase files to remain valid, not just for test reproducibility).
    pub deterministic: bool,
    pub threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            hash_mb: 16,
            bitbase_path: None,
            bitbase_cache_mb: 8,
            null_move_min_reduction: 2,
            null_move_max_reduction: 3,
            lmr_min_depth: 3,
            lmr_min_move_index: 4,
            aspiration_window: 25,
            passed_pawn_extension: true,
            deterministic: false,
            threads: 1,
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn clamp_hash_mb(mb: u32) -> u32 {
        mb.clamp(MIN_HASH_MB, MAX_HASH_MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_hash_mb_respects_bounds() {
        assert_eq!(EngineConfig::clamp_hash_mb(0), MIN_HASH_MB);
        assert_eq!(EngineConfig::clamp_hash_mb(1_000_000), MAX_HASH_MB);
        assert_eq!(EngineConfig::clamp_hash_mb(64), 64);
    }
}
