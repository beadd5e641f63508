//! Winboard/XBoard protocol shell.
//!
//! A stateful handler (force mode, engine color, per-side clock,
//! post/nopost) dispatching parsed commands, with a background search
//! thread per `go` mirroring `uci.rs`'s worker-thread layout. No SAN
//! formatter exists in this crate, so moves are read and printed in long
//! algebraic instead of SAN (`feature san=0`), and `edit`/`analyze` modes
//! aren't implemented: they're GUI board-editing/engine-match conveniences
//! orthogonal to the search/evaluate/bitbase core.

use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

use crate::clock::{Clock, ClockSetting};
use crate::config::EngineConfig;
use crate::engine::EngineContext;
use crate::movegen;
use crate::position::{fen, BoardState, Move, Position};
use crate::types::Color;
use crate::uci::parse_uci_move;

const FEATURES: &[&str] = &[
    "feature myname=\"Qapla\"",
    "feature setboard=1",
    "feature ping=1",
    "feature san=0",
    "feature usermove=1",
    "feature time=1",
    "feature draw=1",
    "feature sigint=0",
    "feature sigterm=0",
    "feature reuse=1",
    "feature analyze=0",
    "feature colors=0",
    "feature ics=0",
    "feature name=1",
    "feature pause=0",
    "feature nps=0",
    "feature debug=0",
    "feature memory=1",
    "feature smp=0",
    "feature done=1",
];

struct SearchJob {
    handle: JoinHandle<()>,
    clock: Arc<Clock>,
}

/// Per-protocol-session state: the board, whose move it is to play, time
/// controls, and the currently running search (if any).
pub struct XboardHandler {
    ctx: Arc<Mutex<EngineContext>>,
    pos: Position,
    history: Vec<(Move, BoardState)>,
    force_mode: bool,
    engine_color: Option<Color>,
    post_thinking: bool,
    engine_time_cs: u64,
    opponent_time_cs: u64,
    moves_per_session: u32,
    base_time_cs: u64,
    increment_cs: u64,
    time_per_move_cs: Option<u64>,
    max_depth: u32,
    job: Option<SearchJob>,
}

impl Default for XboardHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl XboardHandler {
    #[must_use]
    pub fn new() -> Self {
        XboardHandler {
            ctx: Arc::new(Mutex::new(EngineContext::new(EngineConfig::default()))),
            pos: fen::from_fen(fen::STARTPOS_FEN).expect("startpos FEN is always valid"),
            history: Vec::new(),
            force_mode: false,
            engine_color: None,
            post_thinking: true,
            engine_time_cs: 0,
            opponent_time_cs: 0,
            moves_per_session: 40,
            base_time_cs: 5 * 60 * 100,
            increment_cs: 0,
            time_per_move_cs: None,
            max_depth: u32::from(crate::position::MAX_PLY as u16),
            job: None,
        }
    }

    fn stop_job(&mut self) {
        if let Some(job) = self.job.take() {
            job.clock.stop_flag().stop();
            let _ = job.handle.join();
        }
    }

    fn reset_game(&mut self) {
        self.stop_job();
        self.pos = fen::from_fen(fen::STARTPOS_FEN).expect("startpos FEN is always valid");
        self.history.clear();
        self.force_mode = false;
        self.engine_color = Some(Color::Black);
        self.ctx.lock().new_game();
    }

    fn apply_move(&mut self, mv: Move) {
        let state = movegen::do_move(&mut self.pos, &mv);
        self.history.push((mv, state));
    }

    fn undo_one(&mut self) {
        if let Some((mv, state)) = self.history.pop() {
            movegen::undo_move(&mut self.pos, &mv, state);
        }
    }

    fn clock_setting_for_go(&self) -> ClockSetting {
        if let Some(cs) = self.time_per_move_cs {
            return ClockSetting::FixedPerMove { time_ms: cs * 10 };
        }
        ClockSetting::MovesPerPeriod {
            time_left_ms: self.engine_time_cs.max(1) * 10,
            moves_to_go: if self.moves_per_session == 0 { None } else { Some(self.moves_per_session) },
        }
    }

    /// Starts a background search and, once it finishes, prints `move
    /// <long-algebraic>` and applies it to `self.pos` so the handler stays
    /// in sync with the move it just played (xboard never echoes the
    /// engine's own move back as a `usermove`).
    fn start_engine_move(&mut self) {
        self.stop_job();
        if self.force_mode || self.engine_color != Some(self.pos.side_to_move()) {
            return;
        }

        let setting = self.clock_setting_for_go();
        let stop = self.ctx.lock().stop_flag();
        stop.reset();
        let clock = Arc::new(Clock::new(setting, stop));
        let ctx_worker = self.ctx.clone();
        let clock_worker = clock.clone();
        let mut pos_worker = self.pos.clone();
        let post = self.post_thinking;

        let handle = std::thread::spawn(move || {
            let timer = clock_worker.arm_hard_timer();
            struct PostSink {
                enabled: bool,
            }
            impl crate::search::SearchInfoSink for PostSink {
                fn on_depth_done(
                    &mut self,
                    depth: u32,
                    score: crate::eval_value::Value,
                    _bound: crate::search::tt::Bound,
                    time_ms: u64,
                    nodes: u64,
                    _tb_hits: u64,
                    pv: &[Move],
                ) {
                    if !self.enabled {
                        return;
                    }
                    let pv_str = pv.iter().map(Move::to_long_algebraic).collect::<Vec<_>>().join(" ");
                    println!("{depth} {score} {} {nodes} {pv_str}", time_ms / 10);
                    let _ = io::stdout().flush();
                }
                fn on_progress(
                    &mut self,
                    _depth: u32,
                    _score: crate::eval_value::Value,
                    _time_ms: u64,
                    _nodes: u64,
                    _tb_hits: u64,
                    _move_idx: u32,
                    _move_total: u32,
                    _current_move: Move,
                    _hash_full_per_mille: u32,
                ) {
                }
            }

            let mut sink = PostSink { enabled: post };
            let result = ctx_worker.lock().search_with_clock(&mut pos_worker, &clock_worker, &mut sink);
            if let Some(timer) = timer {
                timer.cancel();
            }
            if let Some(mv) = result.best_move {
                println!("move {}", mv.to_long_algebraic());
            } else {
                println!("resign");
            }
            let _ = io::stdout().flush();
        });

        self.job = Some(SearchJob { handle, clock });
    }

    fn handle_line(&mut self, line: &str) -> bool {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some(&cmd) = parts.first() else { return true };

        match cmd {
            "xboard" => {}
            "protover" => println!("{}", FEATURES.join("\n")),
            "new" => self.reset_game(),
            "setboard" => {
                self.stop_job();
                let rest = parts[1..].join(" ");
                match fen::from_fen(&rest) {
                    Ok(p) => {
                        self.pos = p;
                        self.history.clear();
                    }
                    Err(e) => println!("Error ({e}): setboard"),
                }
            }
            "force" => {
                self.stop_job();
                self.force_mode = true;
                self.engine_color = None;
            }
            "go" => {
                self.force_mode = false;
                self.engine_color = Some(self.pos.side_to_move());
                self.start_engine_move();
            }
            "playother" => self.engine_color = Some(self.pos.side_to_move().opposite()),
            "white" => self.engine_color = Some(Color::White),
            "black" => self.engine_color = Some(Color::Black),
            "usermove" => {
                if let Some(mv_str) = parts.get(1) {
                    self.handle_user_move(mv_str);
                }
            }
            "time" => {
                if let Some(cs) = parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                    self.engine_time_cs = cs;
                }
            }
            "otim" => {
                if let Some(cs) = parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                    self.opponent_time_cs = cs;
                }
            }
            "level" => {
                if parts.len() >= 4 {
                    self.moves_per_session = parts[1].parse().unwrap_or(40);
                    self.base_time_cs = parse_level_base(parts[2]);
                    self.increment_cs = parts[3].parse::<u64>().unwrap_or(0) * 100;
                    self.time_per_move_cs = None;
                }
            }
            "st" => {
                if let Some(secs) = parts.get(1).and_then(|s| s.parse::<u64>().ok()) {
                    self.time_per_move_cs = Some(secs * 100);
                }
            }
            "sd" => {
                if let Some(depth) = parts.get(1).and_then(|s| s.parse::<u32>().ok()) {
                    self.max_depth = depth;
                }
            }
            "post" => self.post_thinking = true,
            "nopost" => self.post_thinking = false,
            "hard" | "easy" => {}
            "memory" => {
                if let Some(mb) = parts.get(1).and_then(|s| s.parse::<u32>().ok()) {
                    self.stop_job();
                    self.ctx.lock().set_tt_size_kb(mb * 1024);
                }
            }
            "cores" => {}
            "ping" => {
                if let Some(n) = parts.get(1) {
                    println!("pong {n}");
                }
            }
            "undo" => {
                self.stop_job();
                self.undo_one();
            }
            "remove" => {
                self.stop_job();
                self.undo_one();
                self.undo_one();
            }
            "result" => self.force_mode = true,
            "?" => self.stop_job(),
            "quit" => {
                self.stop_job();
                return false;
            }
            "." => {}
            _ => {
                // A bare move (xboard sends the opponent's move with no
                // leading keyword unless `usermove` was accepted in
                // `protover`'s feature negotiation).
                self.handle_user_move(cmd);
            }
        }

        true
    }

    fn handle_user_move(&mut self, mv_str: &str) {
        match parse_uci_move(&mut self.pos, mv_str) {
            Some(mv) => {
                self.apply_move(mv);
                if !self.force_mode {
                    self.start_engine_move();
                }
            }
            None => println!("Illegal move: {mv_str}"),
        }
    }
}

fn parse_level_base(field: &str) -> u64 {
    // `level` gives base time as minutes, or `minutes:seconds`.
    if let Some((min, sec)) = field.split_once(':') {
        let min: u64 = min.parse().unwrap_or(0);
        let sec: u64 = sec.parse().unwrap_or(0);
        (min * 60 + sec) * 100
    } else {
        field.parse::<u64>().unwrap_or(5) * 60 * 100
    }
}

/// Runs the xboard command loop until `quit` or end of input.
pub fn run_xboard_loop() {
    let mut handler = XboardHandler::new();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if !handler.handle_line(&line) {
            break;
        }
        let _ = io::stdout().flush();
    }
    handler.stop_job();
}
