//! A small hand-picked mate-in-one suite, run through the same
//! `position ... moves ...` parsing path the UCI shell uses, checking that
//! the move is actually applied and mates.

use qapla::movegen::attacks::is_in_check;
use qapla::movegen::generate_legal;
use qapla::position::Position;
use qapla::uci::parse_position_command;

fn is_checkmate(pos: &mut qapla::position::Position) -> bool {
    generate_legal(pos).is_empty() && is_in_check(pos, pos.side_to_move())
}

struct MateInOne {
    fen: &'static str,
    mv: &'static str,
}

const SUITE: &[MateInOne] = &[
    MateInOne { fen: "6k1/5ppp/8/8/8/8/8/4Q2K w - - 0 1", mv: "e1e8" },
    MateInOne { fen: "r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 0 4", mv: "h5f7" },
    MateInOne { fen: "1k6/ppp5/8/8/8/8/8/1K4R1 w - - 0 1", mv: "g1g8" },
    MateInOne { fen: "7k/6pp/8/8/8/8/6PP/R6K w - - 0 1", mv: "a1a8" },
];

#[test]
fn mate_in_one_suite() {
    for problem in SUITE {
        let mut pos = Position::empty();
        let mut parts: Vec<String> = vec!["position".into(), "fen".into()];
        parts.extend(problem.fen.split_whitespace().map(str::to_string));
        parts.push("moves".into());
        parts.push(problem.mv.to_string());
        let parts_ref: Vec<&str> = parts.iter().map(String::as_str).collect();

        parse_position_command(&mut pos, &parts_ref);
        assert!(is_checkmate(&mut pos), "{} {} should be checkmate", problem.fen, problem.mv);
    }
}
