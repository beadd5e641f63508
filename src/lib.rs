//! Qapla: bitboard move generation, a multi-term evaluator, an
//! iterative-deepening alpha-beta search, an endgame bitbase
//! generator/reader, and UCI/Winboard protocol shells on top of them.

pub mod bitbase;
pub mod bits;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod eval;
pub mod eval_value;
pub mod magic;
pub mod movegen;
pub mod nnue;
pub mod position;
pub mod pst_tables;
pub mod search;
pub mod types;
pub mod uci;
pub mod xboard;
pub mod zobrist;
