// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Timer and module-load queues
//!
//! The loop itself is driven by the runtime: it owns the interpreter and
//! decides when to run promise jobs, fire timers and fetch modules. This type
//! only keeps the queues.

use boa_engine::{JsValue, object::builtins::JsFunction};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// Longest delay a timer can have, about 24.8 days
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(i32::MAX as u64);

/// `from + delay` with the delay capped at [`MAX_TIMER_DELAY`]
fn deadline_after(from: Instant, delay: Duration) -> Instant {
    let delay = delay.min(MAX_TIMER_DELAY);
    from.checked_add(delay).unwrap_or(from)
}

/// Unique identifier for a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Work performed when a timer fires
#[derive(Clone)]
pub enum TimerTask {
    /// Call a script function with arguments
    Callback {
        /// Function to call
        function: JsFunction,
        /// Extra arguments passed to `setTimeout`/`setInterval`
        args: Vec<JsValue>,
    },
    /// Resolve a promise handed out by `sleep`
    Resolve(JsFunction),
}

/// A scheduled timer
#[derive(Clone)]
pub struct Timer {
    /// Unique timer ID
    pub id: TimerId,
    /// When the timer should fire
    pub deadline: Instant,
    /// Scheduling order, breaks ties between equal deadlines
    seq: u64,
    /// What to run
    pub task: TimerTask,
    /// Interval period for `setInterval`
    pub repeat: Option<Duration>,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Promise settlement functions of one `require.async` caller
#[derive(Clone)]
pub struct Waiter {
    /// Fulfills the caller's promise
    pub resolve: JsFunction,
    /// Rejects the caller's promise
    pub reject: JsFunction,
}

/// A remote module requested through `require.async` that is not cached yet
pub struct UrlLoad {
    /// Module URL
    pub url: String,
    /// Every caller waiting for this URL
    pub waiters: Vec<Waiter>,
}

/// Pending timers and module loads of the running script
pub struct EventLoop {
    next_timer_id: u64,
    next_seq: u64,
    /// Pending timers (min-heap by deadline)
    timers: BinaryHeap<Timer>,
    cancelled: HashSet<TimerId>,
    url_loads: VecDeque<UrlLoad>,
}

impl EventLoop {
    /// Create an empty loop
    pub fn new() -> Self {
        Self {
            next_timer_id: 1,
            next_seq: 0,
            timers: BinaryHeap::new(),
            cancelled: HashSet::new(),
            url_loads: VecDeque::new(),
        }
    }

    /// Schedule a timer
    pub fn set_timer(&mut self, task: TimerTask, delay: Duration, repeat: bool) -> TimerId {
        let id = TimerId(self.next_timer_id);
        self.next_timer_id += 1;

        // Intervals never run back to back without yielding
        let delay = if repeat {
            delay.clamp(Duration::from_millis(1), MAX_TIMER_DELAY)
        } else {
            delay.min(MAX_TIMER_DELAY)
        };
        self.push(Timer {
            id,
            deadline: deadline_after(Instant::now(), delay),
            seq: 0,
            task,
            repeat: repeat.then_some(delay),
        });
        id
    }

    fn push(&mut self, mut timer: Timer) {
        timer.seq = self.next_seq;
        self.next_seq += 1;
        self.timers.push(timer);
    }

    /// Cancel a timer (clearTimeout/clearInterval)
    pub fn clear_timer(&mut self, id: TimerId) {
        if self.timers.iter().any(|timer| timer.id == id) {
            self.cancelled.insert(id);
        }
    }

    fn drop_cancelled(&mut self) {
        while let Some(timer) = self.timers.peek() {
            if !self.cancelled.contains(&timer.id) {
                break;
            }
            let id = timer.id;
            self.timers.pop();
            self.cancelled.remove(&id);
        }
    }

    /// Deadline of the next live timer
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.drop_cancelled();
        self.timers.peek().map(|timer| timer.deadline)
    }

    /// Pop the next timer due at `now`. Intervals are rescheduled.
    pub fn pop_due(&mut self, now: Instant) -> Option<Timer> {
        self.drop_cancelled();
        if self.timers.peek()?.deadline > now {
            return None;
        }
        let timer = self.timers.pop()?;
        if let Some(period) = timer.repeat {
            let mut next = timer.clone();
            next.deadline = deadline_after(now, period);
            self.push(next);
        }
        Some(timer)
    }

    /// Number of live timers
    pub fn timer_count(&self) -> usize {
        self.timers
            .iter()
            .filter(|timer| !self.cancelled.contains(&timer.id))
            .count()
    }

    /// Queue a module load, joining an already queued load of the same URL.
    ///
    /// Returns `true` if this is the first waiter for `url`.
    pub fn queue_url_load(&mut self, url: &str, waiter: Waiter) -> bool {
        if let Some(load) = self.url_loads.iter_mut().find(|load| load.url == url) {
            load.waiters.push(waiter);
            return false;
        }
        self.url_loads.push_back(UrlLoad {
            url: url.to_string(),
            waiters: vec![waiter],
        });
        true
    }

    /// Take the oldest queued module load
    pub fn pop_url_load(&mut self) -> Option<UrlLoad> {
        self.url_loads.pop_front()
    }

    /// Drop every pending timer and load, returning how many there were
    pub fn discard(&mut self) -> (usize, usize) {
        let timers = self.timer_count();
        let loads = self.url_loads.len();
        self.timers.clear();
        self.cancelled.clear();
        self.url_loads.clear();
        (timers, loads)
    }
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boa_engine::{Context, Source};

    fn function(context: &mut Context) -> JsFunction {
        let value = context
            .eval(Source::from_bytes("(function () {})"))
            .unwrap();
        JsFunction::from_object(value.as_object().unwrap().clone()).unwrap()
    }

    fn callback(context: &mut Context) -> TimerTask {
        TimerTask::Callback {
            function: function(context),
            args: Vec::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timers_fire_in_deadline_order() {
        let mut context = Context::default();
        let mut event_loop = EventLoop::new();

        let late = event_loop.set_timer(callback(&mut context), Duration::from_millis(30), false);
        let early = event_loop.set_timer(callback(&mut context), Duration::from_millis(10), false);
        let tie = event_loop.set_timer(callback(&mut context), Duration::from_millis(10), false);

        assert!(event_loop.pop_due(Instant::now()).is_none());
        tokio::time::advance(Duration::from_millis(30)).await;

        let now = Instant::now();
        let order: Vec<TimerId> = std::iter::from_fn(|| event_loop.pop_due(now))
            .map(|timer| timer.id)
            .collect();
        assert_eq!(order, vec![early, tie, late]);
        assert_eq!(event_loop.timer_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_timer_is_skipped() {
        let mut context = Context::default();
        let mut event_loop = EventLoop::new();

        let id = event_loop.set_timer(callback(&mut context), Duration::from_millis(5), false);
        event_loop.clear_timer(id);

        assert_eq!(event_loop.timer_count(), 0);
        assert!(event_loop.next_deadline().is_none());
        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(event_loop.pop_due(Instant::now()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_reschedules() {
        let mut context = Context::default();
        let mut event_loop = EventLoop::new();

        let id = event_loop.set_timer(callback(&mut context), Duration::from_millis(10), true);
        tokio::time::advance(Duration::from_millis(10)).await;

        let fired = event_loop.pop_due(Instant::now()).unwrap();
        assert_eq!(fired.id, id);
        assert_eq!(event_loop.timer_count(), 1);
        assert_eq!(
            event_loop.next_deadline(),
            Some(Instant::now() + Duration::from_millis(10))
        );

        event_loop.clear_timer(id);
        assert_eq!(event_loop.timer_count(), 0);
        assert!(event_loop.next_deadline().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_delays_are_capped() {
        let mut context = Context::default();
        let mut event_loop = EventLoop::new();

        let now = Instant::now();
        event_loop.set_timer(callback(&mut context), Duration::MAX, false);
        event_loop.set_timer(callback(&mut context), Duration::from_secs(u64::MAX / 2), true);

        assert_eq!(event_loop.next_deadline(), Some(now + MAX_TIMER_DELAY));
        assert!(event_loop.pop_due(now).is_none());
        assert_eq!(event_loop.timer_count(), 2);
    }

    #[test]
    fn test_url_loads_are_deduplicated() {
        let mut context = Context::default();
        let waiter = Waiter {
            resolve: function(&mut context),
            reject: function(&mut context),
        };

        let mut event_loop = EventLoop::new();
        assert!(event_loop.queue_url_load("https://example.com/a.js", waiter.clone()));
        assert!(!event_loop.queue_url_load("https://example.com/a.js", waiter.clone()));
        assert!(event_loop.queue_url_load("https://example.com/b.js", waiter));

        let first = event_loop.pop_url_load().unwrap();
        assert_eq!(first.url, "https://example.com/a.js");
        assert_eq!(first.waiters.len(), 2);
        assert_eq!(event_loop.discard(), (0, 1));
        assert!(event_loop.pop_url_load().is_none());
    }
}
