use std::io::Write;
use std::process::{Command, Stdio};

use qapla::position::Position;
use qapla::uci::{parse_position_command, parse_uci_move};

#[test]
fn uci_smoke_test_returns_legal_move() {
    let exe = env!("CARGO_BIN_EXE_qapla_uci");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn qapla-uci");

    let input = b"uci\nisready\nposition startpos moves e2e4\ngo movetime 100\nquit\n";
    child.stdin.as_mut().unwrap().write_all(input).unwrap();

    let output = child.wait_with_output().expect("failed to read engine output");
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("uciok"));
    assert!(stdout.contains("readyok"));

    let bestmove_line = stdout
        .lines()
        .filter(|line| line.starts_with("bestmove"))
        .last()
        .expect("no bestmove in engine output");
    let mv_str = bestmove_line
        .split_whitespace()
        .nth(1)
        .expect("bestmove line missing the move");
    assert_ne!(mv_str, "0000", "engine returned a null move");

    let mut pos = Position::empty();
    let parts = ["position", "startpos", "moves", "e2e4"];
    parse_position_command(&mut pos, &parts);

    assert!(parse_uci_move(&mut pos, mv_str).is_some(), "bestmove {mv_str} is not legal in the reached position");
}

#[test]
fn uci_handshake_without_a_position_still_answers_isready() {
    let exe = env!("CARGO_BIN_EXE_qapla_uci");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("failed to spawn qapla-uci");

    child.stdin.as_mut().unwrap().write_all(b"isready\nquit\n").unwrap();
    let output = child.wait_with_output().expect("failed to read engine output");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("readyok"));
}
