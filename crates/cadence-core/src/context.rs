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

//! Scheduler context providing access to the clock and configuration.

use crate::clock::{self, LogicalClock};
use crate::config::SchedulerConfig;
use crate::error::ConfigurationError;
use std::rc::Rc;

/// Context shared by every scheduling component.
///
/// The host constructs it once and hands a clone to each component that
/// needs the logical time or the configuration. Clones are cheap and all of
/// them observe the same clock.
#[derive(Debug, Clone)]
pub struct SchedulerContext {
    clock: Rc<LogicalClock>,
    config: Rc<SchedulerConfig>,
}

impl SchedulerContext {
    /// Creates a context with a fresh clock after validating `config`.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            clock: Rc::new(LogicalClock::new()),
            config: Rc::new(config),
        })
    }

    /// The logical clock.
    pub fn clock(&self) -> &LogicalClock {
        &self.clock
    }

    /// The configuration.
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Current logical time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    /// Epsilon-tolerant `value >= threshold` using the configured epsilon.
    #[inline]
    pub fn reached(&self, value: f64, threshold: f64) -> bool {
        clock::reached(value, threshold, self.config.epsilon)
    }
}

impl Default for SchedulerContext {
    fn default() -> Self {
        Self {
            clock: Rc::new(LogicalClock::new()),
            config: Rc::new(SchedulerConfig::default()),
        }
    }
}
