//! Wall-clock timer queue for the control side.
//!
//! Timers never touch the audio graph directly. Polling hands back the due
//! tasks and the engine decides, per task, whether its target still exists.

use std::time::Duration;

/// Handle for cancelling a timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(u64);

/// Work a timer asks the engine to do when it fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerTask {
    /// Schedule the next cycle of a looping voice.
    LoopCycle { id: String, generation: u64 },
    /// A non-looping voice has played its last note.
    Finish { id: String, generation: u64 },
    /// Start a voice again after a parameter change.
    Restart { id: String, token: u64 },
}

#[derive(Debug, Clone)]
struct Timer {
    id: TimerId,
    due: Duration,
    period: Option<Duration>,
    task: TimerTask,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    timers: Vec<Timer>,
    next_id: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `task` once at `due`.
    pub fn arm_once(&mut self, due: Duration, task: TimerTask) -> TimerId {
        self.arm(due, None, task)
    }

    /// Fire `task` every `period`, first at `first_due`. A zero period is
    /// treated as a one-shot.
    pub fn arm_repeating(&mut self, first_due: Duration, period: Duration, task: TimerTask) -> TimerId {
        let period = (!period.is_zero()).then_some(period);
        self.arm(first_due, period, task)
    }

    fn arm(&mut self, due: Duration, period: Option<Duration>, task: TimerTask) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.timers.push(Timer { id, due, period, task });
        id
    }

    pub fn cancel(&mut self, id: TimerId) {
        self.timers.retain(|t| t.id != id);
    }

    /// Take every task due at or before `now`, earliest first.
    ///
    /// Repeating timers fire at most once per poll and are re-armed on their
    /// original phase (`due + period`), skipping periods that already passed,
    /// so lateness in one poll does not accumulate.
    pub fn poll(&mut self, now: Duration) -> Vec<(TimerId, TimerTask)> {
        let mut fired: Vec<(Duration, TimerId, TimerTask)> = Vec::new();
        self.timers.retain_mut(|t| {
            if t.due > now {
                return true;
            }
            fired.push((t.due, t.id, t.task.clone()));
            match t.period {
                Some(period) => {
                    while t.due <= now {
                        t.due += period;
                    }
                    true
                }
                None => false,
            }
        });
        fired.sort_by_key(|(due, id, _)| (*due, id.0));
        fired.into_iter().map(|(_, id, task)| (id, task)).collect()
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }
}
