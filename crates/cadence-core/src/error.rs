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

//! Defines the hierarchy of error types for the scheduler.
//!
//! User code (timer callbacks, sequence steps, initializer hooks) reports
//! failures as [`anyhow::Error`]. The scheduler wraps those in typed errors
//! that record which registration failed, so the host can locate the culprit.

use crate::handle::{SequenceHandle, TimerHandle};
use std::fmt;
use thiserror::Error;

/// A registration or configuration mistake, detected before any work runs.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The same initializer object was registered more than once.
    #[error("initializer '{name}' is registered twice (registrations #{first} and #{duplicate})")]
    DuplicateInitializer {
        /// Name of the duplicated initializer.
        name: String,
        /// Registration index of the first occurrence.
        first: usize,
        /// Registration index of the duplicate.
        duplicate: usize,
    },
    /// A label-based cancellation matched more than one active timer.
    #[error("label '{label}' matches {matches} active timers")]
    AmbiguousLabel {
        /// The label that was looked up.
        label: String,
        /// How many active timers carry it.
        matches: usize,
    },
    /// Deferred initialization was executed a second time.
    #[error("deferred initialization has already been executed")]
    AlreadyExecuted,
    /// An initializer was registered after deferred initialization ran.
    #[error("initializer '{name}' was registered after deferred initialization ran")]
    RegistrationAfterExecution {
        /// Name of the late initializer.
        name: String,
    },
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A deferred initializer hook failed.
#[derive(Debug, Error)]
#[error("initializer '{name}' (priority {priority}, registration #{index}) failed: {source}")]
pub struct InitializationFailure {
    /// Name of the failing initializer.
    pub name: String,
    /// Priority it was registered with.
    pub priority: i32,
    /// Its registration index.
    pub index: usize,
    /// The error returned by the hook.
    #[source]
    pub source: anyhow::Error,
}

/// Identifies the registration whose callback failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOrigin {
    /// A timer callback.
    Timer {
        /// The timer's handle.
        handle: TimerHandle,
        /// The timer's diagnostic label, if any.
        label: Option<String>,
    },
    /// A cooperative sequence step.
    Sequence {
        /// The sequence's handle.
        handle: SequenceHandle,
        /// The sequence's diagnostic label, if any.
        label: Option<String>,
    },
}

impl fmt::Display for CallbackOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackOrigin::Timer { handle, label } => match label {
                Some(label) => write!(f, "{handle} '{label}'"),
                None => write!(f, "{handle}"),
            },
            CallbackOrigin::Sequence { handle, label } => match label {
                Some(label) => write!(f, "{handle} '{label}'"),
                None => write!(f, "{handle}"),
            },
        }
    }
}

/// A timer callback or sequence step returned an error.
#[derive(Debug, Error)]
#[error("{origin} failed at t={time:.3}: {source}")]
pub struct CallbackFailure {
    /// Which registration failed.
    pub origin: CallbackOrigin,
    /// Logical time of the failing tick.
    pub time: f64,
    /// The error returned by the callback.
    #[source]
    pub source: anyhow::Error,
}

/// An operation was attempted through a handle whose slot was released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HandleError {
    /// The timer has already been removed.
    #[error("stale timer handle {0}")]
    StaleTimer(TimerHandle),
    /// The sequence has already finished or been stopped.
    #[error("stale sequence handle {0}")]
    StaleSequence(SequenceHandle),
}

/// Umbrella error returned by the frame driver and high-level operations.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// See [`ConfigurationError`].
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// See [`InitializationFailure`].
    #[error(transparent)]
    Initialization(#[from] InitializationFailure),
    /// See [`HandleError`].
    #[error(transparent)]
    Handle(#[from] HandleError),
    /// The tick delta was negative or not finite.
    #[error("invalid tick delta {0}")]
    InvalidDelta(f64),
    /// One or more callbacks failed during a tick.
    #[error("{} callback failure(s) during frame {frame}", .failures.len())]
    TickFailed {
        /// Frame number of the failing tick.
        frame: u64,
        /// Every failure collected, in the order they happened.
        failures: Vec<CallbackFailure>,
    },
}
