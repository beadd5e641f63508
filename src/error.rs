//! Engine-wide error type.
//!
//! Reserved for boundary errors: malformed input from a protocol shell or a
//! caller of the library API (bad FEN, illegal move string, a bitbase file
//! that can't be loaded). Internal invariant violations — a do/undo pair
//! that leaves the incremental hash out of sync, a move generator producing
//! a pseudo-legal move with no matching piece — are bugs, not recoverable
//! errors, and are caught with `debug_assert!` instead.

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineError {
    IllegalMove { mv: String },
    IllegalFen { reason: String },
    BitbaseMissing { signature: String },
    BitbaseCorrupt { signature: String, reason: String },
    BitbaseTooLarge { signature: String, bytes: usize },
    HashAllocationFailed { requested_kb: u32 },
    Stopped,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::IllegalMove { mv } => write!(f, "illegal move: {mv}"),
            EngineError::IllegalFen { reason } => write!(f, "illegal FEN: {reason}"),
            EngineError::BitbaseMissing { signature } => {
                write!(f, "no bitbase loaded for signature {signature}")
            }
            EngineError::BitbaseCorrupt { signature, reason } => {
                write!(f, "bitbase {signature} is corrupt: {reason}")
            }
            EngineError::BitbaseTooLarge { signature, bytes } => {
                write!(f, "bitbase {signature} exceeds size limit ({bytes} bytes)")
            }
            EngineError::HashAllocationFailed { requested_kb } => {
                write!(f, "failed to allocate {requested_kb} KB hash table")
            }
            EngineError::Stopped => write!(f, "search stopped"),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_offending_move() {
        let err = EngineError::IllegalMove {
            mv: "e2e5".to_string(),
        };
        assert_eq!(err.to_string(), "illegal move: e2e5");
    }
}
