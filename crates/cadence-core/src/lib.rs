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

//! # Cadence Core
//!
//! Foundational crate containing the shared vocabulary of the cadence
//! scheduler: the explicit [`SchedulerContext`], the logical clock,
//! configuration, generational slot handles and the error taxonomy.

#![warn(missing_docs)]

pub mod arena;
pub mod clock;
pub mod config;
pub mod context;
pub mod error;
pub mod handle;

pub use arena::{PoolStats, SlotArena};
pub use clock::{reached, LogicalClock};
pub use config::{FailurePolicy, SchedulerConfig};
pub use context::SchedulerContext;
pub use error::{
    CallbackFailure, CallbackOrigin, ConfigurationError, HandleError, InitializationFailure,
    SchedulerError,
};
pub use handle::{SequenceHandle, SlotHandle, TimerHandle};
