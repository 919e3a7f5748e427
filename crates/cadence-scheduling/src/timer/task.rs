// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The timer task record and its per-tick state machine.

use super::TimerContext;
use cadence_core::reached;
use std::fmt;

/// A boxed timer callback.
pub type TimerCallback = Box<dyn FnMut(&mut TimerContext<'_>) -> anyhow::Result<()>>;

/// One timed, possibly repeating callback.
///
/// `interval <= 0` marks a one-shot task. `started` flips to `true` exactly
/// once, on the tick where `total_elapsed` reaches `delay`.
#[derive(Default)]
pub struct TimerTask {
    pub(crate) callback: Option<TimerCallback>,
    label: Option<String>,
    delay: f64,
    interval: f64,
    elapsed_since_last_fire: f64,
    total_elapsed: f64,
    started: bool,
    cancel_at: Option<f64>,
    active: bool,
}

impl TimerTask {
    /// Populates a freshly reset record and marks it active.
    ///
    /// A non-positive `cancel_time` means the task has no scheduled cancellation.
    pub(crate) fn configure(
        &mut self,
        callback: Option<TimerCallback>,
        delay: f64,
        interval: f64,
        cancel_time: f64,
        label: Option<String>,
    ) {
        self.callback = callback;
        self.label = label;
        self.delay = delay;
        self.interval = interval;
        self.cancel_at = (cancel_time > 0.0).then_some(cancel_time);
        self.started = false;
        self.active = true;
    }

    /// Advances the task by `dt` and returns how many times it must fire.
    ///
    /// The start tick fires once and resets the interval accumulator, so
    /// later fires are counted from the end of the start tick, not from
    /// `delay`. Repeats land on `delay + n * interval` only when a tick ends
    /// exactly on `delay`; with `delay = 1`, `interval = 1` and two ticks of
    /// 1.5 the task fires twice, not three times.
    pub(crate) fn advance(&mut self, dt: f64, epsilon: f64) -> u32 {
        self.total_elapsed += dt;

        if !self.started {
            if reached(self.total_elapsed, self.delay, epsilon) {
                self.started = true;
                // The start tick does not feed the interval accumulator.
                self.elapsed_since_last_fire = 0.0;
                return 1;
            }
            return 0;
        }

        if self.is_one_shot() {
            return 0;
        }

        self.elapsed_since_last_fire += dt;
        let mut fires = 0;
        while reached(self.elapsed_since_last_fire, self.interval, epsilon) {
            // Carry the remainder so irregular deltas do not drift.
            self.elapsed_since_last_fire -= self.interval;
            fires += 1;
        }
        fires
    }

    /// Accumulates `dt` without firing, for a tick that skipped this task.
    ///
    /// Crossings inside the skipped time fire on the next [`advance`](Self::advance).
    pub(crate) fn defer(&mut self, dt: f64) {
        self.total_elapsed += dt;
        if self.started && !self.is_one_shot() {
            self.elapsed_since_last_fire += dt;
        }
    }

    /// Whether the task is due for removal at the end of the current tick.
    pub(crate) fn should_remove(&self, epsilon: f64) -> bool {
        if !self.active {
            return true;
        }
        if self.is_one_shot() && self.started {
            return true;
        }
        self.cancel_at
            .is_some_and(|cancel_at| reached(self.total_elapsed, cancel_at, epsilon))
    }

    /// Cancels the task now (`delay <= 0`) or once `delay` more seconds have elapsed.
    pub(crate) fn cancel(&mut self, delay: f64) {
        if delay > 0.0 {
            self.cancel_at = Some(self.total_elapsed + delay);
        } else {
            self.active = false;
        }
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// `true` for tasks that fire at most once.
    pub fn is_one_shot(&self) -> bool {
        self.interval <= 0.0
    }

    /// `false` once the task has been cancelled or has run its course.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// `true` once the initial delay has elapsed and the first fire happened.
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Delay before the first fire.
    pub fn delay(&self) -> f64 {
        self.delay
    }

    /// Period between fires after the first one.
    pub fn interval(&self) -> f64 {
        self.interval
    }

    /// Time accumulated since registration.
    pub fn total_elapsed(&self) -> f64 {
        self.total_elapsed
    }

    /// The scheduled cancellation point, measured in the task's own elapsed time.
    pub fn cancel_at(&self) -> Option<f64> {
        self.cancel_at
    }

    /// Diagnostic label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

impl fmt::Debug for TimerTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerTask")
            .field("label", &self.label)
            .field("delay", &self.delay)
            .field("interval", &self.interval)
            .field("elapsed_since_last_fire", &self.elapsed_since_last_fire)
            .field("total_elapsed", &self.total_elapsed)
            .field("started", &self.started)
            .field("cancel_at", &self.cancel_at)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-5;

    fn task(delay: f64, interval: f64, cancel_time: f64) -> TimerTask {
        let mut task = TimerTask::default();
        task.configure(None, delay, interval, cancel_time, None);
        task
    }

    #[test]
    fn one_shot_fires_once_when_delay_is_reached() {
        let mut task = task(1.0, 0.0, 1.0);

        assert_eq!(task.advance(0.4, EPS), 0);
        assert_eq!(task.advance(0.4, EPS), 0);
        assert!(!task.should_remove(EPS));

        assert_eq!(task.advance(0.4, EPS), 1);
        assert!(task.has_started());
        assert!(task.should_remove(EPS), "One-shot is removed on its firing tick");
    }

    #[test]
    fn negative_delay_fires_on_first_tick() {
        let mut task = task(-3.0, 0.0, 0.0);
        assert_eq!(task.advance(0.0, EPS), 1);
    }

    #[test]
    fn large_delta_fires_repeating_task_several_times() {
        let mut task = task(0.0, 1.0, 0.0);
        assert_eq!(task.advance(0.1, EPS), 1, "Start tick fires once");
        assert_eq!(task.advance(3.5, EPS), 3);
        assert_eq!(task.advance(0.5, EPS), 1, "Remainder 0.5 is carried");
    }

    #[test]
    fn repeats_count_from_the_end_of_the_start_tick() {
        let mut task = task(1.0, 1.0, 0.0);

        assert_eq!(task.advance(1.5, EPS), 1, "Start tick overshoots the delay");
        assert_eq!(task.advance(1.5, EPS), 1, "Only 1.5 accumulated since the start tick");
    }

    #[test]
    fn deferred_time_is_caught_up_on_the_next_advance() {
        let mut task = task(0.0, 0.5, 0.0);
        task.advance(0.1, EPS);

        task.defer(0.5);
        approx::assert_relative_eq!(task.total_elapsed(), 0.6);
        assert_eq!(task.advance(0.5, EPS), 2);
    }

    #[test]
    fn cancel_with_delay_is_lazy() {
        let mut task = task(0.0, 1.0, 0.0);
        task.advance(1.0, EPS);
        task.cancel(2.0);

        assert_eq!(task.cancel_at(), Some(3.0));
        assert!(task.is_active());
        task.advance(1.0, EPS);
        assert!(!task.should_remove(EPS));
        task.advance(1.0, EPS);
        assert!(task.should_remove(EPS));
    }

    #[test]
    fn cancel_without_delay_deactivates() {
        let mut task = task(5.0, 1.0, 0.0);
        task.cancel(0.0);
        assert!(!task.is_active());
        assert!(task.should_remove(EPS));
    }

    #[test]
    fn zero_cancel_time_never_removes_repeating_task() {
        let mut task = task(0.0, 0.5, 0.0);
        for _ in 0..100 {
            task.advance(0.5, EPS);
        }
        assert!(!task.should_remove(EPS));
    }
}
