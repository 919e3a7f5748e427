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

//! # Cadence Scheduling
//!
//! The cooperative, single-threaded scheduling layer of a frame-driven host:
//!
//! - [`timer`]: timed, possibly repeating callbacks with cancellation;
//! - [`sequence`]: pooled step-sequences with pause and resume;
//! - [`deferred`]: priority-ordered one-shot initialization, run one tick late;
//! - [`driver`]: the per-frame entry point tying them to the logical clock.

#![warn(missing_docs)]

pub mod deferred;
pub mod driver;
pub mod sequence;
pub mod timer;

pub use deferred::{DeferredInitializationOrderer, DeferredInitialize, InitializableRef};
pub use driver::{FrameDriver, TickReport};
pub use sequence::{CooperativeSequenceRunner, Sequence, SequenceOutcome, Step, StepContext};
pub use timer::{TaskRecordPool, TimerContext, TimerTaskScheduler};

use cadence_core::CallbackFailure;

/// What one component did during a tick.
#[must_use = "a tick summary carries the callback failures of the tick"]
#[derive(Debug, Default)]
pub struct TickSummary {
    /// Timer callbacks fired or sequence steps executed.
    pub ran: usize,
    /// Timers removed or sequences finished.
    pub retired: usize,
    /// Failures surfaced by callbacks, in the order they happened.
    pub failures: Vec<CallbackFailure>,
}
