//! Tick scheduling: who decides when the next compositing pass runs.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::foundation::core::Fps;

/// Handle for one requested tick, used to cancel it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TickToken(pub u64);

/// Display-synchronized tick source.
///
/// The compositor calls [`Scheduler::request_next_tick`] and [`Scheduler::cancel`]; the driving
/// loop calls [`Scheduler::wait_next`] to learn which requested tick is due.
pub trait Scheduler {
    /// Ask for one more tick at the next refresh.
    fn request_next_tick(&mut self) -> TickToken;

    /// Withdraw a previously requested tick. Unknown tokens are ignored.
    fn cancel(&mut self, token: TickToken);

    /// Block until the next requested tick is due and return its token, or `None` when nothing
    /// is pending.
    fn wait_next(&mut self) -> Option<TickToken>;
}

/// Deterministic scheduler that never sleeps: a requested tick is due immediately.
///
/// Records every request and cancellation so tests can assert on them.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next_id: u64,
    pending: VecDeque<TickToken>,
    requests: u64,
    cancellations: Vec<TickToken>,
}

impl ManualScheduler {
    /// Create a scheduler with nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ticks requested so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Tokens passed to [`Scheduler::cancel`], in call order.
    pub fn cancellations(&self) -> &[TickToken] {
        &self.cancellations
    }

    /// Tokens requested and neither fired nor cancelled.
    pub fn pending(&self) -> Vec<TickToken> {
        self.pending.iter().copied().collect()
    }
}

impl Scheduler for ManualScheduler {
    fn request_next_tick(&mut self) -> TickToken {
        let token = TickToken(self.next_id);
        self.next_id += 1;
        self.requests += 1;
        self.pending.push_back(token);
        token
    }

    fn cancel(&mut self, token: TickToken) {
        self.cancellations.push(token);
        self.pending.retain(|&t| t != token);
    }

    fn wait_next(&mut self) -> Option<TickToken> {
        self.pending.pop_front()
    }
}

/// Fixed-cadence scheduler standing in for a display refresh callback.
///
/// Ticks are spaced one refresh interval apart, measured from the previous tick. A tick that is
/// already late fires immediately; missed intervals are not replayed.
#[derive(Debug)]
pub struct IntervalScheduler {
    interval: Duration,
    next_id: u64,
    pending: VecDeque<TickToken>,
    last_fired: Option<Instant>,
}

impl IntervalScheduler {
    /// Scheduler ticking at `fps`.
    pub fn new(fps: Fps) -> Self {
        Self::with_interval(fps.frame_interval())
    }

    /// Scheduler ticking every `interval`.
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_id: 0,
            pending: VecDeque::new(),
            last_fired: None,
        }
    }

    /// Refresh interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Scheduler for IntervalScheduler {
    fn request_next_tick(&mut self) -> TickToken {
        let token = TickToken(self.next_id);
        self.next_id += 1;
        self.pending.push_back(token);
        token
    }

    fn cancel(&mut self, token: TickToken) {
        self.pending.retain(|&t| t != token);
    }

    fn wait_next(&mut self) -> Option<TickToken> {
        let token = self.pending.pop_front()?;
        if let Some(last) = self.last_fired {
            let due = last + self.interval;
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }
        self.last_fired = Some(Instant::now());
        Some(token)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/schedule/scheduler.rs"]
mod tests;
