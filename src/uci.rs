//! UCI protocol shell.
//!
//! A stdin command loop, a background worker thread per `go` so the main
//! thread stays free to read `stop`/`ponderhit`, and a shared best-move
//! sink the worker publishes to. The worker thread holds its own
//! `Arc<Clock>` (rather than a bare stop `AtomicBool`) so `ponderhit` can
//! convert an in-flight ponder search the way `Clock::ponder_hit` expects,
//! instead of only ever clearing a stop flag.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::clock::{Clock, ClockSetting};
use crate::config::EngineConfig;
use crate::engine::EngineContext;
use crate::eval_value::{Value, MAX_VALUE, MIN_MATE_VALUE};
use crate::movegen;
use crate::position::{fen, Move, Position};
use crate::search::tt::Bound;
use crate::search::SearchInfoSink;
use crate::types::PieceType;

const ENGINE_NAME: &str = "Qapla";
const ENGINE_AUTHOR: &str = "Qapla contributors";

/// Parses a `position [startpos|fen <fen>] [moves ...]` command, mutating
/// `pos` in place. Malformed FEN or an illegal move in the `moves` list logs
/// an `info string` and leaves everything before the bad token applied, a
/// "skip and keep going" tolerance for GUIs that occasionally send a stale
/// move list.
pub fn parse_position_command(pos: &mut Position, parts: &[&str]) {
    let mut i = 1;
    if parts.get(i) == Some(&"startpos") {
        *pos = fen::from_fen(fen::STARTPOS_FEN).expect("startpos FEN is always valid");
        i += 1;
    } else if parts.get(i) == Some(&"fen") {
        let rest = &parts[i + 1..];
        let fen_len = rest.iter().take_while(|&&p| p != "moves").count();
        let fen_str = rest[..fen_len].join(" ");
        match fen::from_fen(&fen_str) {
            Ok(p) => *pos = p,
            Err(e) => {
                println!("info string invalid fen: {e}");
                return;
            }
        }
        i += 1 + fen_len;
    } else {
        return;
    }

    if parts.get(i) == Some(&"moves") {
        i += 1;
        while i < parts.len() {
            match parse_uci_move(pos, parts[i]) {
                Some(mv) => {
                    movegen::do_move(pos, &mv);
                }
                None => println!("info string illegal move: {}", parts[i]),
            }
            i += 1;
        }
    }
}

/// Resolves a long-algebraic move string (`e2e4`, `e7e8q`) against `pos`'s
/// legal moves. There's no separate `Move::from_long_algebraic`: the square
/// pair alone is ambiguous without knowing which piece is moving and
/// whether the move is en passant/castling, so this matches against the
/// move list instead.
#[must_use]
pub fn parse_uci_move(pos: &mut Position, s: &str) -> Option<Move> {
    if s.len() < 4 {
        return None;
    }
    let from = s[0..2].parse().ok()?;
    let to = s[2..4].parse().ok()?;
    let promotion = s.get(4..5).and_then(|p| p.chars().next()).and_then(PieceType::from_char);

    let legal = movegen::generate_legal(pos);
    (0..legal.len())
        .map(|i| legal.get(i))
        .find(|mv| mv.from == from && mv.to == to && mv.promotion == promotion)
}

fn format_score(value: Value) -> String {
    if value >= MIN_MATE_VALUE {
        let plies = MAX_VALUE - value;
        format!("mate {}", (plies + 1) / 2)
    } else if value <= -MIN_MATE_VALUE {
        let plies = MAX_VALUE + value;
        format!("mate -{}", (plies + 1) / 2)
    } else {
        format!("cp {value}")
    }
}

/// Prints `info` lines straight to stdout as the search produces them. The
/// teacher routes these through an `mpsc` channel to a dedicated printer
/// thread so the search thread never blocks on a locked stdout; this
/// shell's `println!` already serialises on the process-wide stdout lock
/// per call, which is enough given a single worker thread ever prints at a
/// time (no second `go` is dispatched before the current one answers).
struct UciInfoSink;

impl SearchInfoSink for UciInfoSink {
    fn on_depth_done(&mut self, depth: u32, score: Value, _bound: Bound, time_ms: u64, nodes: u64, tb_hits: u64, pv: &[Move]) {
        let nps = if time_ms > 0 { nodes * 1000 / time_ms } else { 0 };
        let pv_str = pv.iter().map(Move::to_long_algebraic).collect::<Vec<_>>().join(" ");
        println!(
            "info depth {depth} score {} nodes {nodes} nps {nps} time {time_ms} tbhits {tb_hits} pv {pv_str}",
            format_score(score)
        );
        let _ = io::stdout().flush();
    }

    #[allow(clippy::too_many_arguments)]
    fn on_progress(
        &mut self,
        depth: u32,
        _score: Value,
        time_ms: u64,
        nodes: u64,
        _tb_hits: u64,
        move_idx: u32,
        _move_total: u32,
        current_move: Move,
        hash_full_per_mille: u32,
    ) {
        println!(
            "info depth {depth} currmove {} currmovenumber {move_idx} nodes {nodes} time {time_ms} hashfull {hash_full_per_mille}",
            current_move.to_long_algebraic()
        );
        let _ = io::stdout().flush();
    }
}

/// Builds the `ClockSetting` a `go` command without `ponder`/`infinite`
/// should use: `movetime` if given, else the remaining-time/increment fields
/// for whichever side is on move, else `Infinite`.
fn derive_time_control(pos: &Position, go: &GoFields) -> ClockSetting {
    if let Some(ms) = go.movetime_ms {
        return ClockSetting::FixedPerMove { time_ms: ms };
    }
    if let Some(depth) = go.depth {
        return ClockSetting::DepthLimit(depth);
    }
    if let Some(nodes) = go.nodes {
        return ClockSetting::NodesLimit(nodes);
    }
    let (time_left_ms, increment_ms) = if pos.side_to_move() == crate::types::Color::White {
        (go.wtime_ms, go.winc_ms)
    } else {
        (go.btime_ms, go.binc_ms)
    };
    match (time_left_ms, go.movestogo) {
        (Some(time_left_ms), Some(moves_to_go)) => ClockSetting::MovesPerPeriod {
            time_left_ms,
            moves_to_go: Some(moves_to_go),
        },
        (Some(time_left_ms), None) => ClockSetting::Increment {
            time_left_ms,
            increment_ms: increment_ms.unwrap_or(0),
        },
        (None, _) => ClockSetting::Infinite,
    }
}

#[derive(Default, Clone, Copy)]
struct GoFields {
    wtime_ms: Option<u64>,
    btime_ms: Option<u64>,
    winc_ms: Option<u64>,
    binc_ms: Option<u64>,
    movestogo: Option<u32>,
    movetime_ms: Option<u64>,
    depth: Option<u32>,
    nodes: Option<u64>,
    ponder: bool,
    infinite: bool,
}

fn parse_go_command(parts: &[&str]) -> GoFields {
    let mut go = GoFields::default();
    let mut i = 1;
    let next_u64 = |parts: &[&str], i: usize| parts.get(i).and_then(|s| s.parse::<u64>().ok());
    let next_u32 = |parts: &[&str], i: usize| parts.get(i).and_then(|s| s.parse::<u32>().ok());
    while i < parts.len() {
        match parts[i] {
            "wtime" => {
                go.wtime_ms = next_u64(parts, i + 1);
                i += 2;
            }
            "btime" => {
                go.btime_ms = next_u64(parts, i + 1);
                i += 2;
            }
            "winc" => {
                go.winc_ms = next_u64(parts, i + 1);
                i += 2;
            }
            "binc" => {
                go.binc_ms = next_u64(parts, i + 1);
                i += 2;
            }
            "movestogo" => {
                go.movestogo = next_u32(parts, i + 1);
                i += 2;
            }
            "movetime" => {
                go.movetime_ms = next_u64(parts, i + 1);
                i += 2;
            }
            "depth" => {
                go.depth = next_u32(parts, i + 1);
                i += 2;
            }
            "nodes" => {
                go.nodes = next_u64(parts, i + 1);
                i += 2;
            }
            "ponder" => {
                go.ponder = true;
                i += 1;
            }
            "infinite" => {
                go.infinite = true;
                i += 1;
            }
            _ => i += 1,
        }
    }
    go
}

struct SearchJob {
    handle: JoinHandle<()>,
    clock: Arc<Clock>,
    /// The time control the job would have used had `ponder`/`infinite` not
    /// been set, so `ponderhit` can hand `Clock::ponder_hit` a real budget.
    fallback_setting: ClockSetting,
}

fn print_uci_options() {
    println!("id name {ENGINE_NAME}");
    println!("id author {ENGINE_AUTHOR}");
    println!(
        "option name Hash type spin default {} min {} max {}",
        EngineConfig::default().hash_mb,
        crate::config::MIN_HASH_MB,
        crate::config::MAX_HASH_MB
    );
    println!("option name Threads type spin default 1 min 1 max 1");
    println!("option name Ponder type check default true");
    println!("uciok");
}

fn handle_setoption(ctx: &Mutex<EngineContext>, parts: &[&str]) {
    let Some(name_pos) = parts.iter().position(|&s| s == "name") else { return };
    let Some(value_pos) = parts.iter().position(|&s| s == "value") else { return };
    if value_pos <= name_pos + 1 {
        return;
    }
    let name = parts[name_pos + 1..value_pos].join(" ");
    let value = parts.get(value_pos + 1..).map(|v| v.join(" ")).unwrap_or_default();

    match name.as_str() {
        "Hash" => {
            if let Ok(mb) = value.parse::<u32>() {
                ctx.lock().set_tt_size_kb(mb * 1024);
            }
        }
        _ => {
            println!("info string unknown option {name}");
        }
    }
}

/// Runs the UCI command loop until `quit` or end of input.
pub fn run_uci_loop() {
    let ctx = Arc::new(Mutex::new(EngineContext::new(EngineConfig::default())));
    let mut pos = fen::from_fen(fen::STARTPOS_FEN).expect("startpos FEN is always valid");
    let mut job: Option<SearchJob> = None;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else { continue };

        match cmd {
            "uci" => print_uci_options(),
            "isready" => println!("readyok"),
            "ucinewgame" => {
                if let Some(job) = job.take() {
                    job.clock.stop_flag().stop();
                    let _ = job.handle.join();
                }
                ctx.lock().new_game();
            }
            "position" => parse_position_command(&mut pos, &parts),
            "setoption" => handle_setoption(&ctx, &parts),
            "go" => {
                if let Some(old) = job.take() {
                    old.clock.stop_flag().stop();
                    let _ = old.handle.join();
                }

                let go = parse_go_command(&parts);
                let fallback_setting = derive_time_control(&pos, &go);
                let setting = if go.ponder {
                    ClockSetting::Ponder
                } else if go.infinite {
                    ClockSetting::Infinite
                } else {
                    fallback_setting
                };

                let stop = ctx.lock().stop_flag();
                stop.reset();
                let clock = Arc::new(Clock::new(setting, stop));
                let ctx_worker = ctx.clone();
                let clock_worker = clock.clone();
                let mut pos_worker = pos.clone();

                let handle = std::thread::spawn(move || {
                    let timer = clock_worker.arm_hard_timer();
                    let mut sink = UciInfoSink;
                    let result = ctx_worker.lock().search_with_clock(&mut pos_worker, &clock_worker, &mut sink);
                    if let Some(timer) = timer {
                        timer.cancel();
                    }
                    match result.best_move {
                        Some(mv) => println!("bestmove {}", mv.to_long_algebraic()),
                        None => println!("bestmove 0000"),
                    }
                    let _ = io::stdout().flush();
                });

                job = Some(SearchJob {
                    handle,
                    clock,
                    fallback_setting,
                });
            }
            "ponderhit" => {
                if let Some(job) = &job {
                    if let Some(timer) = job.clock.ponder_hit(job.fallback_setting) {
                        timer.cancel();
                    }
                }
            }
            "stop" => {
                if let Some(job) = job.take() {
                    job.clock.stop_flag().stop();
                    let _ = job.handle.join();
                }
            }
            "quit" => break,
            _ => {}
        }

        let _ = io::stdout().flush();
    }

    if let Some(job) = job.take() {
        job.clock.stop_flag().stop();
        let _ = job.handle.join();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_startpos_with_moves() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let parts: Vec<&str> = "position startpos moves e2e4 e7e5".split_whitespace().collect();
        parse_position_command(&mut pos, &parts);
        assert_eq!(pos.side_to_move(), crate::types::Color::White);
    }

    #[test]
    fn parses_fen_position() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let parts: Vec<&str> = "position fen 8/8/8/4k3/8/8/8/4K2R w K - 0 1".split_whitespace().collect();
        parse_position_command(&mut pos, &parts);
        assert_eq!(fen::to_fen(&pos), "8/8/8/4k3/8/8/8/4K2R w K - 0 1");
    }

    #[test]
    fn rejects_illegal_move_string() {
        let mut pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        assert!(parse_uci_move(&mut pos, "e2e5").is_none());
        assert!(parse_uci_move(&mut pos, "e2e4").is_some());
    }

    #[test]
    fn formats_mate_scores() {
        assert_eq!(format_score(MAX_VALUE), "mate 0");
        assert_eq!(format_score(10), "cp 10");
    }

    #[test]
    fn go_fields_default_to_infinite_without_time_info() {
        let pos = fen::from_fen(fen::STARTPOS_FEN).unwrap();
        let go = GoFields::default();
        assert!(matches!(derive_time_control(&pos, &go), ClockSetting::Infinite));
    }
}
