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

//! Timed, possibly repeating callbacks with lazy cancellation.
//!
//! Timers are normally driven through a [`FrameDriver`](crate::FrameDriver),
//! which advances the logical clock before ticking them.
//!
//! ```rust
//! use cadence_core::SchedulerConfig;
//! use cadence_scheduling::FrameDriver;
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let mut driver = FrameDriver::new(SchedulerConfig::default()).unwrap();
//! let fired_at = Rc::new(RefCell::new(Vec::new()));
//! let record = fired_at.clone();
//! driver.timers_mut().invoke_repeating(
//!     move |ctx| { record.borrow_mut().push(ctx.now()); Ok(()) },
//!     1.0,
//!     0.5,
//!     0.0,
//! );
//!
//! for _ in 0..4 {
//!     driver.tick(0.5).unwrap();
//! }
//! assert_eq!(*fired_at.borrow(), vec![1.0, 1.5, 2.0]);
//! ```

mod pool;
mod task;

pub use pool::TaskRecordPool;
pub use task::{TimerCallback, TimerTask};

use crate::TickSummary;
use cadence_core::{
    CallbackFailure, CallbackOrigin, ConfigurationError, FailurePolicy, PoolStats,
    SchedulerContext, TimerHandle,
};

/// Scheduling access handed to a timer callback while it runs.
///
/// Timers registered here get a handle immediately but only join the active
/// set once the current tick has finished, so they first advance on the next
/// tick. Cancellations apply to the record right away; the removal itself is
/// applied with the other removals at the end of the tick.
pub struct TimerContext<'a> {
    handle: TimerHandle,
    now: f64,
    pool: &'a mut TaskRecordPool,
    pending: &'a mut Vec<TimerHandle>,
}

impl TimerContext<'_> {
    /// The handle of the timer being fired.
    pub fn handle(&self) -> TimerHandle {
        self.handle
    }

    /// Logical time of the current tick.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Registers a one-shot timer from inside a callback.
    pub fn invoke<F>(&mut self, callback: F, delay: f64) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.invoke_repeating(callback, delay, 0.0, delay)
    }

    /// Registers a repeating timer from inside a callback.
    pub fn invoke_repeating<F>(
        &mut self,
        callback: F,
        delay: f64,
        interval: f64,
        cancel_time: f64,
    ) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        let handle = register(self.pool, Box::new(callback), delay, interval, cancel_time, None);
        self.pending.push(handle);
        handle
    }

    /// Cancels a timer, including the one currently firing.
    ///
    /// Returns `false` if the handle is stale.
    pub fn stop_invoke(&mut self, handle: TimerHandle, delay: f64) -> bool {
        match self.pool.get_mut(handle) {
            Some(task) => {
                task.cancel(delay);
                true
            }
            None => false,
        }
    }
}

fn register(
    pool: &mut TaskRecordPool,
    callback: TimerCallback,
    delay: f64,
    interval: f64,
    cancel_time: f64,
    label: Option<String>,
) -> TimerHandle {
    let (handle, task) = pool.acquire();
    task.configure(Some(callback), delay, interval, cancel_time, label);
    log::debug!(
        "TimerTaskScheduler: registered {handle} (delay={delay}, interval={interval}, cancel={cancel_time})"
    );
    handle
}

/// Owns the active timer tasks and fires them as ticks advance.
pub struct TimerTaskScheduler {
    context: SchedulerContext,
    pool: TaskRecordPool,
    active: Vec<TimerHandle>,
    pending: Vec<TimerHandle>,
    removals: Vec<TimerHandle>,
}

impl TimerTaskScheduler {
    /// Creates a scheduler whose record pool is sized from the context's configuration.
    pub fn new(context: SchedulerContext) -> Self {
        let capacity = context.config().timer_pool_capacity;
        Self {
            context,
            pool: TaskRecordPool::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            pending: Vec::new(),
            removals: Vec::new(),
        }
    }

    /// Fires `callback` once after `delay` seconds.
    pub fn invoke<F>(&mut self, callback: F, delay: f64) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.invoke_repeating(callback, delay, 0.0, delay)
    }

    /// Like [`invoke`](Self::invoke), with a diagnostic label.
    pub fn invoke_labeled<F>(&mut self, label: impl Into<String>, callback: F, delay: f64) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        self.invoke_repeating_labeled(label, callback, delay, 0.0, delay)
    }

    /// Fires `callback` after `delay` seconds, then every `interval` seconds.
    ///
    /// `interval <= 0` registers a one-shot. A positive `cancel_time` removes
    /// the task once that much time has elapsed since registration.
    pub fn invoke_repeating<F>(
        &mut self,
        callback: F,
        delay: f64,
        interval: f64,
        cancel_time: f64,
    ) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        let handle = register(&mut self.pool, Box::new(callback), delay, interval, cancel_time, None);
        self.active.push(handle);
        handle
    }

    /// Like [`invoke_repeating`](Self::invoke_repeating), with a diagnostic label.
    pub fn invoke_repeating_labeled<F>(
        &mut self,
        label: impl Into<String>,
        callback: F,
        delay: f64,
        interval: f64,
        cancel_time: f64,
    ) -> TimerHandle
    where
        F: FnMut(&mut TimerContext<'_>) -> anyhow::Result<()> + 'static,
    {
        let handle = register(
            &mut self.pool,
            Box::new(callback),
            delay,
            interval,
            cancel_time,
            Some(label.into()),
        );
        self.active.push(handle);
        handle
    }

    /// Cancels a timer.
    ///
    /// With `delay <= 0` the task is removed immediately. Otherwise it keeps
    /// running until `delay` more seconds have elapsed. Unknown or stale
    /// handles are ignored and return `false`.
    pub fn stop_invoke(&mut self, handle: TimerHandle, delay: f64) -> bool {
        let Some(task) = self.pool.get_mut(handle) else {
            log::trace!("TimerTaskScheduler: stop_invoke on inactive {handle}");
            return false;
        };

        task.cancel(delay);
        if delay <= 0.0 {
            self.remove(handle);
        }
        true
    }

    /// Cancels the single active timer carrying `label`.
    ///
    /// Returns `Ok(false)` if no active timer has the label, and
    /// [`ConfigurationError::AmbiguousLabel`] if several do.
    pub fn stop_invoke_labeled(&mut self, label: &str, delay: f64) -> Result<bool, ConfigurationError> {
        let mut matches = self
            .active
            .iter()
            .copied()
            .filter(|handle| {
                self.pool
                    .get(*handle)
                    .is_some_and(|task| task.is_active() && task.label() == Some(label))
            });

        let Some(handle) = matches.next() else {
            return Ok(false);
        };
        let extra = matches.count();
        if extra > 0 {
            return Err(ConfigurationError::AmbiguousLabel {
                label: label.to_owned(),
                matches: extra + 1,
            });
        }
        Ok(self.stop_invoke(handle, delay))
    }

    /// Removes every active timer.
    pub fn cancel_all(&mut self) {
        for handle in self.active.drain(..) {
            self.pool.release(handle);
        }
        log::debug!("TimerTaskScheduler: cancelled all timers");
    }

    /// Returns `true` while the timer is registered and not cancelled.
    pub fn is_invoking(&self, handle: TimerHandle) -> bool {
        self.pool.get(handle).is_some_and(TimerTask::is_active)
    }

    /// Read access to a registered timer.
    pub fn task(&self, handle: TimerHandle) -> Option<&TimerTask> {
        self.pool.get(handle)
    }

    /// Number of timers in the active set.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Occupancy counters of the record pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Advances every active timer by `dt` and fires the due callbacks.
    ///
    /// Removals are collected during the traversal and applied once every
    /// task has been processed. A failing callback is recorded in the
    /// returned summary. Under [`FailurePolicy::Abort`] the traversal stops at
    /// the first failure: the timers after it accumulate `dt` without firing
    /// and catch up on the next tick. Removals and registrations collected so
    /// far are still applied.
    ///
    /// This does not advance the logical clock, so [`TimerContext::now`]
    /// reports whatever the clock holds. [`FrameDriver::tick`](crate::FrameDriver::tick)
    /// advances the clock first and is the supported way to drive timers.
    pub fn tick(&mut self, dt: f64) -> TickSummary {
        let epsilon = self.context.config().epsilon;
        let abort_on_failure = self.context.config().failure_policy == FailurePolicy::Abort;
        let now = self.context.now();
        let mut summary = TickSummary::default();
        let mut aborted_at = None;

        for i in 0..self.active.len() {
            let handle = self.active[i];
            let Some(task) = self.pool.get_mut(handle) else {
                continue;
            };
            if !task.is_active() {
                // Cancelled earlier in this tick, swept below.
                continue;
            }

            let fires = task.advance(dt, epsilon);
            let mut aborted = false;
            if fires > 0 {
                let label = task.label().map(str::to_owned);
                let mut callback = task.callback.take();
                if let Some(callback) = callback.as_mut() {
                    for _ in 0..fires {
                        let mut ctx = TimerContext {
                            handle,
                            now,
                            pool: &mut self.pool,
                            pending: &mut self.pending,
                        };
                        summary.ran += 1;
                        if let Err(source) = callback(&mut ctx) {
                            let failure = CallbackFailure {
                                origin: CallbackOrigin::Timer {
                                    handle,
                                    label: label.clone(),
                                },
                                time: now,
                                source,
                            };
                            log::error!("TimerTaskScheduler: {failure}");
                            summary.failures.push(failure);
                            if abort_on_failure {
                                aborted = true;
                                break;
                            }
                        }
                        if !self.pool.get(handle).is_some_and(TimerTask::is_active) {
                            // Cancelled by its own callback.
                            break;
                        }
                    }
                }
                if let Some(task) = self.pool.get_mut(handle) {
                    task.callback = callback;
                }
            }

            if let Some(task) = self.pool.get_mut(handle) {
                if task.should_remove(epsilon) {
                    task.deactivate();
                }
            }
            if aborted {
                log::warn!("TimerTaskScheduler: tick aborted after failure of {handle}");
                aborted_at = Some(i);
                break;
            }
        }

        if let Some(i) = aborted_at {
            for &handle in &self.active[i + 1..] {
                if let Some(task) = self.pool.get_mut(handle).filter(|task| task.is_active()) {
                    task.defer(dt);
                }
            }
        }

        summary.retired = self.sweep_inactive() + self.admit_pending();
        log::trace!(
            "TimerTaskScheduler: tick dt={dt} ran={} retired={} active={}",
            summary.ran,
            summary.retired,
            self.active.len()
        );
        summary
    }

    /// Drops every deactivated task from the active set and releases its record.
    fn sweep_inactive(&mut self) -> usize {
        let pool = &mut self.pool;
        let removals = &mut self.removals;
        self.active.retain(|&handle| {
            let keep = pool.get(handle).is_some_and(TimerTask::is_active);
            if !keep {
                removals.push(handle);
            }
            keep
        });

        let count = removals.len();
        for handle in removals.drain(..) {
            log::debug!("TimerTaskScheduler: removed {handle}");
            pool.release(handle);
        }
        count
    }

    /// Moves timers registered during the tick into the active set.
    ///
    /// Those already cancelled again are released instead.
    fn admit_pending(&mut self) -> usize {
        let mut released = 0;
        for handle in self.pending.drain(..) {
            if self.pool.get(handle).is_some_and(TimerTask::is_active) {
                self.active.push(handle);
            } else {
                log::debug!("TimerTaskScheduler: removed {handle} before it started");
                self.pool.release(handle);
                released += 1;
            }
        }
        released
    }

    fn remove(&mut self, handle: TimerHandle) {
        if let Some(position) = self.active.iter().position(|h| *h == handle) {
            self.active.remove(position);
        }
        self.pool.release(handle);
        log::debug!("TimerTaskScheduler: removed {handle}");
    }
}
