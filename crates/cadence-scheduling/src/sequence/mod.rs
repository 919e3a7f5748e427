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

//! Pooled cooperative step-sequences.
//!
//! A sequence is installed into a slot of a fixed arena and addressed by a
//! [`SequenceHandle`]. Every tick, each registered slot that is not paused
//! executes exactly one step. When the sequence finishes, fails or is
//! stopped, the slot is released and its generation bumped, so later use of
//! the old handle is rejected with [`HandleError::StaleSequence`].
//!
//! Completion callbacks fire when the sequence actually ends, in the tick
//! (or the `stop` call) that ends it.

mod step;

pub use step::{from_fn, from_steps, FromFn, FromSteps, Sequence, SequenceOutcome, Step};

use crate::TickSummary;
use cadence_core::{
    CallbackFailure, CallbackOrigin, FailurePolicy, HandleError, PoolStats, SchedulerContext,
    SequenceHandle, SlotArena,
};
use std::fmt;

/// Callback notified once when a sequence's slot is released.
pub type CompletionCallback = Box<dyn FnOnce(SequenceHandle, SequenceOutcome)>;

#[derive(Default)]
struct SequenceSlot {
    sequence: Option<Box<dyn Sequence>>,
    paused: bool,
    resume_at: Option<f64>,
    label: Option<String>,
    on_complete: Option<CompletionCallback>,
}

impl fmt::Debug for SequenceSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SequenceSlot")
            .field("label", &self.label)
            .field("paused", &self.paused)
            .field("resume_at", &self.resume_at)
            .finish_non_exhaustive()
    }
}

type SequenceArena = SlotArena<SequenceHandle, SequenceSlot>;

fn install(
    slots: &mut SequenceArena,
    sequence: Box<dyn Sequence>,
    delay: f64,
    now: f64,
    label: Option<String>,
    on_complete: Option<CompletionCallback>,
) -> SequenceHandle {
    let (handle, slot) = slots.acquire();
    slot.sequence = Some(sequence);
    slot.label = label;
    slot.on_complete = on_complete;
    if delay > 0.0 {
        slot.paused = true;
        slot.resume_at = Some(now + delay);
    }
    log::debug!("SequenceRunner: started {handle} (delay={delay})");
    handle
}

/// Access handed to a sequence while one of its steps runs.
pub struct StepContext<'a> {
    handle: SequenceHandle,
    now: f64,
    slots: &'a mut SequenceArena,
    pending: &'a mut Vec<SequenceHandle>,
}

impl StepContext<'_> {
    /// The handle of the running sequence.
    pub fn handle(&self) -> SequenceHandle {
        self.handle
    }

    /// Logical time of the current tick.
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Starts another sequence. It executes its first step on the next tick.
    pub fn run<S: Sequence + 'static>(&mut self, sequence: S, delay: f64) -> SequenceHandle {
        let handle = install(self.slots, Box::new(sequence), delay, self.now, None, None);
        self.pending.push(handle);
        handle
    }
}

enum Advance {
    Paused,
    Stepped,
    Finished,
    Failed(anyhow::Error),
}

/// Drives pooled sequences, one step per tick.
pub struct CooperativeSequenceRunner {
    context: SchedulerContext,
    slots: SequenceArena,
    active: Vec<SequenceHandle>,
    pending: Vec<SequenceHandle>,
    finished: Vec<(SequenceHandle, SequenceOutcome)>,
}

impl CooperativeSequenceRunner {
    /// Creates a runner whose slot pool is sized from the context's configuration.
    pub fn new(context: SchedulerContext) -> Self {
        let capacity = context.config().sequence_pool_capacity;
        Self {
            context,
            slots: SlotArena::with_capacity(capacity),
            active: Vec::with_capacity(capacity),
            pending: Vec::new(),
            finished: Vec::new(),
        }
    }

    /// Starts `sequence`. With `delay > 0` it stays paused until `now + delay`.
    pub fn run<S: Sequence + 'static>(&mut self, sequence: S, delay: f64) -> SequenceHandle {
        self.start(Box::new(sequence), delay, None, None)
    }

    /// Like [`run`](Self::run), with a diagnostic label used in logs and failures.
    pub fn run_labeled<S: Sequence + 'static>(
        &mut self,
        label: impl Into<String>,
        sequence: S,
        delay: f64,
    ) -> SequenceHandle {
        self.start(Box::new(sequence), delay, Some(label.into()), None)
    }

    /// Like [`run`](Self::run), notifying `on_complete` when the slot is released.
    pub fn run_with_completion<S, F>(&mut self, sequence: S, delay: f64, on_complete: F) -> SequenceHandle
    where
        S: Sequence + 'static,
        F: FnOnce(SequenceHandle, SequenceOutcome) + 'static,
    {
        self.start(Box::new(sequence), delay, None, Some(Box::new(on_complete)))
    }

    fn start(
        &mut self,
        sequence: Box<dyn Sequence>,
        delay: f64,
        label: Option<String>,
        on_complete: Option<CompletionCallback>,
    ) -> SequenceHandle {
        let now = self.context.now();
        let handle = install(&mut self.slots, sequence, delay, now, label, on_complete);
        self.active.push(handle);
        handle
    }

    /// Pauses the sequence indefinitely. Any pending resume time is kept.
    pub fn pause(&mut self, handle: SequenceHandle) -> Result<(), HandleError> {
        let slot = self.slot_mut(handle)?;
        slot.paused = true;
        Ok(())
    }

    /// Pauses the sequence until `duration` seconds of logical time have passed.
    pub fn pause_for(&mut self, handle: SequenceHandle, duration: f64) -> Result<(), HandleError> {
        let resume_at = self.context.now() + duration;
        let slot = self.slot_mut(handle)?;
        slot.paused = true;
        slot.resume_at = Some(resume_at);
        Ok(())
    }

    /// Un-pauses the sequence and clears any pending resume time.
    pub fn resume(&mut self, handle: SequenceHandle) -> Result<(), HandleError> {
        let slot = self.slot_mut(handle)?;
        slot.paused = false;
        slot.resume_at = None;
        Ok(())
    }

    /// Unregisters the sequence and releases its slot, whatever its own state.
    pub fn stop(&mut self, handle: SequenceHandle) -> Result<(), HandleError> {
        self.slot_mut(handle)?;
        self.active.retain(|h| *h != handle);
        self.pending.retain(|h| *h != handle);
        self.release(handle, SequenceOutcome::Stopped);
        Ok(())
    }

    /// Stops every running sequence.
    pub fn stop_all(&mut self) {
        let handles: Vec<_> = self.active.drain(..).chain(self.pending.drain(..)).collect();
        for handle in handles {
            self.release(handle, SequenceOutcome::Stopped);
        }
    }

    /// Returns `true` while the handle refers to a running sequence.
    pub fn is_running(&self, handle: SequenceHandle) -> bool {
        self.slots.contains(handle)
    }

    /// Returns whether the sequence is paused, or `None` for a stale handle.
    pub fn is_paused(&self, handle: SequenceHandle) -> Option<bool> {
        self.slots.get(handle).map(|slot| slot.paused)
    }

    /// Number of sequences registered for per-tick advancement.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Occupancy counters of the slot pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.slots.stats()
    }

    /// Advances every registered sequence by one step.
    ///
    /// Finished and failed sequences are released after the traversal.
    /// Under [`FailurePolicy::Abort`] the traversal stops at the first failure.
    ///
    /// Resume times are compared against the shared logical clock, which this
    /// method does not advance. [`FrameDriver::tick`](crate::FrameDriver::tick)
    /// advances it first and is the supported way to drive sequences; a
    /// runner ticked on its own never wakes a timed pause.
    pub fn tick(&mut self) -> TickSummary {
        let now = self.context.now();
        let abort_on_failure = self.context.config().failure_policy == FailurePolicy::Abort;
        let mut summary = TickSummary::default();

        for i in 0..self.active.len() {
            let handle = self.active[i];
            match self.advance(handle, now) {
                Advance::Paused => {}
                Advance::Stepped => summary.ran += 1,
                Advance::Finished => {
                    summary.ran += 1;
                    self.finished.push((handle, SequenceOutcome::Completed));
                }
                Advance::Failed(source) => {
                    summary.ran += 1;
                    let label = self.slots.get(handle).and_then(|slot| slot.label.clone());
                    let failure = CallbackFailure {
                        origin: CallbackOrigin::Sequence { handle, label },
                        time: now,
                        source,
                    };
                    log::error!("SequenceRunner: {failure}");
                    summary.failures.push(failure);
                    self.finished.push((handle, SequenceOutcome::Failed));
                    if abort_on_failure {
                        log::warn!("SequenceRunner: tick aborted after failure of {handle}");
                        break;
                    }
                }
            }
        }

        summary.retired = self.retire_finished();
        self.active.append(&mut self.pending);
        log::trace!(
            "SequenceRunner: tick ran={} retired={} active={}",
            summary.ran,
            summary.retired,
            self.active.len()
        );
        summary
    }

    fn advance(&mut self, handle: SequenceHandle, now: f64) -> Advance {
        let epsilon = self.context.config().epsilon;
        let Some(slot) = self.slots.get_mut(handle) else {
            return Advance::Paused;
        };

        if slot.paused {
            if let Some(resume_at) = slot.resume_at {
                if cadence_core::reached(now, resume_at, epsilon) {
                    slot.paused = false;
                    slot.resume_at = None;
                }
            }
        }
        if slot.paused {
            return Advance::Paused;
        }

        let Some(mut sequence) = slot.sequence.take() else {
            return Advance::Finished;
        };
        let mut ctx = StepContext {
            handle,
            now,
            slots: &mut self.slots,
            pending: &mut self.pending,
        };
        let result = sequence.step(&mut ctx);

        let Some(slot) = self.slots.get_mut(handle) else {
            return Advance::Finished;
        };
        match result {
            Ok(Step::Yield) => {
                slot.sequence = Some(sequence);
                Advance::Stepped
            }
            Ok(Step::WaitFor(seconds)) => {
                slot.sequence = Some(sequence);
                if seconds > 0.0 {
                    slot.paused = true;
                    slot.resume_at = Some(now + seconds);
                }
                Advance::Stepped
            }
            Ok(Step::Done) => Advance::Finished,
            Err(error) => Advance::Failed(error),
        }
    }

    fn retire_finished(&mut self) -> usize {
        if self.finished.is_empty() {
            return 0;
        }
        let finished = std::mem::take(&mut self.finished);
        self.active
            .retain(|handle| !finished.iter().any(|(done, _)| done == handle));
        for &(handle, outcome) in &finished {
            self.release(handle, outcome);
        }
        let count = finished.len();
        self.finished = finished;
        self.finished.clear();
        count
    }

    fn release(&mut self, handle: SequenceHandle, outcome: SequenceOutcome) {
        let Some(slot) = self.slots.release(handle) else {
            return;
        };
        log::debug!("SequenceRunner: released {handle} ({outcome:?})");
        if let Some(on_complete) = slot.on_complete {
            on_complete(handle, outcome);
        }
    }

    fn slot_mut(&mut self, handle: SequenceHandle) -> Result<&mut SequenceSlot, HandleError> {
        self.slots.get_mut(handle).ok_or_else(|| {
            log::warn!("SequenceRunner: rejected stale handle {handle}");
            HandleError::StaleSequence(handle)
        })
    }
}
