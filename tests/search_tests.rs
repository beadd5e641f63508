//! Search tests: verifies the engine finds correct moves in tactical and
//! drawn positions, not just that it returns *a* move.

use qapla::config::EngineConfig;
use qapla::engine::EngineContext;
use qapla::movegen::attacks::is_in_check;
use qapla::movegen::{do_move, generate_legal};
use qapla::position::fen::{self, from_fen};
use qapla::uci::parse_position_command;

fn is_checkmate(pos: &mut qapla::position::Position) -> bool {
    generate_legal(pos).is_empty() && is_in_check(pos, pos.side_to_move())
}

fn is_stalemate(pos: &mut qapla::position::Position) -> bool {
    generate_legal(pos).is_empty() && !is_in_check(pos, pos.side_to_move())
}

#[test]
fn finds_mate_in_one_back_rank() {
    let mut pos = from_fen("6k1/5ppp/8/8/8/8/8/4Q2K w - - 0 1").unwrap();
    let mut ctx = EngineContext::new(EngineConfig::default());

    let mv = ctx.play_move(&mut pos, 4).expect("should find a move");
    do_move(&mut pos, &mv);
    assert!(is_checkmate(&mut pos), "{} should be a back rank mate", mv.to_long_algebraic());
}

#[test]
fn finds_mate_in_one_queen() {
    let mut pos = from_fen("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 0 4").unwrap();
    let mut ctx = EngineContext::new(EngineConfig::default());

    let mv = ctx.play_move(&mut pos, 4).expect("should find a move");
    do_move(&mut pos, &mv);
    assert!(is_checkmate(&mut pos), "{} should be scholar's mate", mv.to_long_algebraic());
}

#[test]
fn avoids_hanging_the_queen() {
    let mut pos = from_fen("r1bqkbnr/pppppppp/2n5/8/4P3/5Q2/PPPP1PPP/RNB1KBNR w KQkq - 0 3").unwrap();
    let mut ctx = EngineContext::new(EngineConfig::default());

    let mv = ctx.play_move(&mut pos, 4).expect("should find a move");
    assert_ne!(mv.to_long_algebraic(), "f3c6", "should not hang the queen on c6");
}

#[test]
fn captures_free_material() {
    let mut pos = from_fen("rnbqk1nr/pppp1ppp/2b5/4p3/2B1P3/5N2/PPPP1PPP/RNBQK2R w KQkq - 0 4").unwrap();
    let mut ctx = EngineContext::new(EngineConfig::default());

    let mv = ctx.play_move(&mut pos, 4).expect("should find a move");
    assert!(mv.is_capture() || mv.to_long_algebraic() == "c4f7", "should capture material or threaten f7");
}

#[test]
fn single_legal_move_position() {
    let mut pos = from_fen("8/8/8/8/8/8/8/K6rk w - - 0 1").unwrap();
    let mut ctx = EngineContext::new(EngineConfig::default());

    let mv = ctx.play_move(&mut pos, 4).expect("should find a move");
    assert_eq!(mv.to_long_algebraic(), "a1a2", "only legal move should be Ka2");
}

#[test]
fn no_move_in_checkmate() {
    let mut pos = from_fen("rnb1kbnr/pppp1ppp/4p3/8/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 0 1").unwrap();
    assert!(is_checkmate(&mut pos), "position should already be checkmate");

    let mut ctx = EngineContext::new(EngineConfig::default());
    assert!(ctx.play_move(&mut pos, 4).is_none());
}

#[test]
fn handles_draw_by_repetition() {
    // Knights shuffle home and back twice: the starting position recurs
    // after the 4th and 8th half-moves, so it's in `history` twice over
    // (the pre-game position itself is never pushed there). A generation
    // detection that always reports "at least the current position itself"
    // would still satisfy `>= 1`; `>= 2` requires the shuffle to actually
    // have been recognised as a real repeat.
    let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
    let parts: Vec<&str> = "position startpos moves g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1 f6g8"
        .split_whitespace()
        .collect();
    parse_position_command(&mut pos, &parts);
    assert_eq!(pos.repetition_count(pos.zobrist_hash()), 2);
}

#[test]
fn literal_threefold_repetition_is_detected() {
    // One more knight shuffle than above: the starting position now recurs
    // after half-moves 4, 8 and 12 -- a genuine threefold repetition, the
    // literal scenario repetition detection exists to catch, rather than
    // just the two-occurrences case above.
    let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
    let parts: Vec<&str> = "position startpos moves \
         g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1 f6g8"
        .split_whitespace()
        .collect();
    parse_position_command(&mut pos, &parts);
    assert_eq!(pos.repetition_count(pos.zobrist_hash()), 3);
}

#[test]
fn identifies_stalemate() {
    let mut pos = from_fen("k7/8/1QK5/8/8/8/8/8 b - - 0 1").unwrap();
    assert!(is_stalemate(&mut pos));
    assert!(!is_checkmate(&mut pos));
}
