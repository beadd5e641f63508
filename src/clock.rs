//! Time management and cooperative search cancellation.
//!
//! `StopFlag` and `DeadlineTimer` follow an atomic flag polled every N
//! nodes, with a background thread setting it at a deadline.
//! `ClockSetting`/`Clock` turn one of the UCI/xboard time controls into the
//! soft/hard deadlines and node/depth ceilings the search loop polls.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// A thread-safe stop flag for controlling search termination.
#[derive(Clone, Debug)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    #[must_use]
    pub fn new() -> Self {
        StopFlag(Arc::new(AtomicBool::new(false)))
    }

    #[must_use]
    pub fn stopped() -> Self {
        StopFlag(Arc::new(AtomicBool::new(true)))
    }

    #[inline]
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

impl Default for StopFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Arc<AtomicBool>> for StopFlag {
    fn from(arc: Arc<AtomicBool>) -> Self {
        StopFlag(arc)
    }
}

/// A timer that signals a [`StopFlag`] when a deadline is reached, running
/// in a background thread so the search loop only ever has to poll a bool.
pub struct DeadlineTimer {
    handle: Option<JoinHandle<()>>,
    stop_flag: StopFlag,
}

impl DeadlineTimer {
    /// Starts a timer firing after `duration`. `None` if `duration` is zero
    /// (nothing to wait for — the caller should treat the budget as already
    /// exhausted, not as "no timer needed").
    #[must_use]
    pub fn start(duration: Duration, stop_flag: StopFlag) -> Option<Self> {
        if duration.is_zero() {
            return None;
        }
        let flag = stop_flag.clone();
        let handle = thread::spawn(move || {
            thread::sleep(duration);
            flag.stop();
        });
        Some(DeadlineTimer {
            handle: Some(handle),
            stop_flag,
        })
    }

    #[must_use]
    pub fn start_at(deadline: Option<Instant>, stop_flag: StopFlag) -> Option<Self> {
        let deadline = deadline?;
        match duration_until(deadline) {
            Some(duration) => Self::start(duration, stop_flag),
            None => {
                stop_flag.stop();
                None
            }
        }
    }

    pub fn cancel(mut self) {
        self.handle.take();
    }

    pub fn wait(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.stop_flag.is_stopped()
    }
}

fn duration_until(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    (deadline > now).then(|| deadline - now)
}

/// One of the time controls a protocol shell can hand to `Search::start`.
/// `moves_to_go: None` in `MovesPerPeriod` means "rest of the game",
/// matching UCI's `movestogo`-absent convention.
#[derive(Clone, Copy, Debug)]
pub enum ClockSetting {
    MovesPerPeriod {
        time_left_ms: u64,
        moves_to_go: Option<u32>,
    },
    Increment {
        time_left_ms: u64,
        increment_ms: u64,
    },
    FixedPerMove {
        time_ms: u64,
    },
    Infinite,
    Ponder,
    DepthLimit(u32),
    NodesLimit(u64),
}

const NODE_POLL_INTERVAL: u64 = 2048;

/// Derived soft/hard time budget plus any depth/node ceiling, computed once
/// at search start. Deadlines sit behind a `Mutex` (not plain fields) so
/// `ponder_hit` can be called from the protocol shell's own thread while the
/// search thread holds only a shared `&Clock`, a cooperative two-thread
/// model rather than requiring the whole `Clock` to be exclusively
/// borrowed by the search for its duration.
pub struct Clock {
    started_at: Instant,
    soft_deadline: Mutex<Option<Instant>>,
    hard_deadline: Mutex<Option<Instant>>,
    depth_limit: Option<u32>,
    nodes_limit: Option<u64>,
    pondering: AtomicBool,
    stop: StopFlag,
}

/// (soft deadline, hard deadline, depth limit, node limit, pondering)
/// relative to `from`, shared between `Clock::new` and `Clock::ponder_hit`.
fn derive_budget(setting: ClockSetting, from: Instant) -> (Option<Instant>, Option<Instant>, Option<u32>, Option<u64>, bool) {
    let soft_hard = |soft_ms: u64, hard_ms: u64| {
        let soft = from + Duration::from_millis(soft_ms);
        // Never let the hard cap fall below the soft one; a tiny increment
        // or moves-to-go=1 budget can otherwise compute soft > hard.
        let hard = from + Duration::from_millis(hard_ms.max(soft_ms));
        (Some(soft), Some(hard))
    };

    match setting {
        ClockSetting::MovesPerPeriod { time_left_ms, moves_to_go } => {
            let divisor = moves_to_go.unwrap_or(30).max(1) as u64;
            let (soft, hard) = soft_hard(time_left_ms / divisor, time_left_ms);
            (soft, hard, None, None, false)
        }
        ClockSetting::Increment { time_left_ms, increment_ms } => {
            let (soft, hard) = soft_hard(time_left_ms / 20 + increment_ms / 2, time_left_ms);
            (soft, hard, None, None, false)
        }
        ClockSetting::FixedPerMove { time_ms } => {
            let (soft, hard) = soft_hard(time_ms, time_ms);
            (soft, hard, None, None, false)
        }
        ClockSetting::Infinite => (None, None, None, None, false),
        ClockSetting::Ponder => (None, None, None, None, true),
        ClockSetting::DepthLimit(depth) => (None, None, Some(depth), None, false),
        ClockSetting::NodesLimit(nodes) => (None, None, None, Some(nodes), false),
    }
}

impl Clock {
    #[must_use]
    pub fn new(setting: ClockSetting, stop: StopFlag) -> Self {
        let started_at = Instant::now();
        let (soft, hard, depth_limit, nodes_limit, pondering) = derive_budget(setting, started_at);
        Clock {
            started_at,
            soft_deadline: Mutex::new(soft),
            hard_deadline: Mutex::new(hard),
            depth_limit,
            nodes_limit,
            pondering: AtomicBool::new(pondering),
            stop,
        }
    }

    /// Starts the background deadline timer for the hard cap, if any. Must
    /// be called at most once; the returned timer must outlive the search
    /// (drop it, or `cancel()`/`wait()` it, once the search returns). A
    /// `ponder_hit` that introduces a hard cap where none existed must be
    /// paired with re-arming (the original call here saw `None` and armed
    /// nothing).
    #[must_use]
    pub fn arm_hard_timer(&self) -> Option<DeadlineTimer> {
        DeadlineTimer::start_at(*self.hard_deadline.lock(), self.stop.clone())
    }

    /// Ponder-hit converts an infinite/pondering budget into a normal one
    /// without restarting the search. Recomputes the deadline relative to
    /// the moment of the hit, not the original search start.
    /// Depth/node ceilings aren't revised (ponder mode never sets them), so
    /// a `ponder_hit` carrying `DepthLimit`/`NodesLimit` has no effect on
    /// those ceilings; callers pondering indefinitely should hit into a
    /// time-based setting.
    pub fn ponder_hit(&self, setting: ClockSetting) -> Option<DeadlineTimer> {
        if !self.pondering.swap(false, Ordering::SeqCst) {
            return None;
        }
        let (soft, hard, ..) = derive_budget(setting, Instant::now());
        *self.soft_deadline.lock() = soft;
        *self.hard_deadline.lock() = hard;
        DeadlineTimer::start_at(hard, self.stop.clone())
    }

    /// Called by the search loop at iteration boundaries: has the soft
    /// budget or the depth limit been reached? Doesn't consult the stop
    /// flag — that's `should_stop`'s job, polled far more often.
    #[must_use]
    pub fn iteration_budget_exhausted(&self, completed_depth: u32) -> bool {
        if let Some(limit) = self.depth_limit {
            if completed_depth >= limit {
                return true;
            }
        }
        if let Some(soft) = *self.soft_deadline.lock() {
            if Instant::now() >= soft {
                return true;
            }
        }
        false
    }

    /// Called every [`NODE_POLL_INTERVAL`] nodes: has a hard limit (node
    /// count, or an external `stop()`) been tripped?
    #[must_use]
    pub fn should_stop(&self, nodes_searched: u64) -> bool {
        if self.stop.is_stopped() {
            return true;
        }
        if let Some(limit) = self.nodes_limit {
            if nodes_searched >= limit {
                return true;
            }
        }
        if nodes_searched % NODE_POLL_INTERVAL == 0 {
            if let Some(hard) = *self.hard_deadline.lock() {
                if Instant::now() >= hard {
                    return true;
                }
            }
        }
        false
    }

    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    #[must_use]
    pub fn stop_flag(&self) -> &StopFlag {
        &self.stop
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_flag_lifecycle() {
        let flag = StopFlag::new();
        assert!(!flag.is_stopped());
        flag.stop();
        assert!(flag.is_stopped());
        flag.reset();
        assert!(!flag.is_stopped());
    }

    #[test]
    fn deadline_timer_triggers() {
        let flag = StopFlag::new();
        let timer = DeadlineTimer::start(Duration::from_millis(20), flag.clone());
        assert!(timer.is_some());
        thread::sleep(Duration::from_millis(60));
        assert!(flag.is_stopped());
    }

    #[test]
    fn deadline_timer_zero_duration_is_none() {
        let flag = StopFlag::new();
        assert!(DeadlineTimer::start(Duration::ZERO, flag).is_none());
    }

    #[test]
    fn depth_limit_exhausts_after_reaching_depth() {
        let clock = Clock::new(ClockSetting::DepthLimit(4), StopFlag::new());
        assert!(!clock.iteration_budget_exhausted(3));
        assert!(clock.iteration_budget_exhausted(4));
    }

    #[test]
    fn nodes_limit_trips_should_stop() {
        let clock = Clock::new(ClockSetting::NodesLimit(1000), StopFlag::new());
        assert!(!clock.should_stop(999));
        assert!(clock.should_stop(1000));
    }

    #[test]
    fn external_stop_flag_is_observed() {
        let stop = StopFlag::new();
        let clock = Clock::new(ClockSetting::Infinite, stop.clone());
        assert!(!clock.should_stop(0));
        stop.stop();
        assert!(clock.should_stop(0));
    }

    #[test]
    fn moves_per_period_hard_never_below_soft() {
        let clock = Clock::new(
            ClockSetting::MovesPerPeriod {
                time_left_ms: 1000,
                moves_to_go: Some(40),
            },
            StopFlag::new(),
        );
        assert!(clock.soft_deadline.lock().unwrap() <= clock.hard_deadline.lock().unwrap());
    }

    #[test]
    fn ponder_hit_converts_infinite_budget() {
        let clock = Clock::new(ClockSetting::Ponder, StopFlag::new());
        assert!(clock.pondering.load(Ordering::Relaxed));
        clock.ponder_hit(ClockSetting::FixedPerMove { time_ms: 500 });
        assert!(!clock.pondering.load(Ordering::Relaxed));
        assert!(clock.hard_deadline.lock().is_some());
    }

    #[test]
    fn ponder_hit_is_a_no_op_outside_pondering() {
        let clock = Clock::new(ClockSetting::Infinite, StopFlag::new());
        assert!(clock.ponder_hit(ClockSetting::FixedPerMove { time_ms: 500 }).is_none());
        assert!(clock.hard_deadline.lock().is_none());
    }
}
