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

//! The per-frame entry point.

use crate::deferred::DeferredInitializationOrderer;
use crate::sequence::CooperativeSequenceRunner;
use crate::timer::TimerTaskScheduler;
use cadence_core::{ConfigurationError, FailurePolicy, SchedulerConfig, SchedulerContext, SchedulerError};

/// What happened during one successful frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickReport {
    /// Frame number after the tick.
    pub frame: u64,
    /// Logical time after the tick.
    pub now: f64,
    /// Timer callbacks fired.
    pub timers_fired: usize,
    /// Timers removed at the end of the tick.
    pub timers_removed: usize,
    /// Sequence steps executed.
    pub sequences_advanced: usize,
    /// Sequences released at the end of the tick.
    pub sequences_finished: usize,
}

/// Owns the scheduling components and advances them once per frame.
///
/// Each [`tick`](Self::tick) moves the logical clock forward, then the
/// timers, then the sequences.
pub struct FrameDriver {
    context: SchedulerContext,
    timers: TimerTaskScheduler,
    sequences: CooperativeSequenceRunner,
}

impl FrameDriver {
    /// Validates `config` and builds a driver with a fresh context.
    pub fn new(config: SchedulerConfig) -> Result<Self, ConfigurationError> {
        Ok(Self::with_context(SchedulerContext::new(config)?))
    }

    /// Builds a driver around an existing context.
    pub fn with_context(context: SchedulerContext) -> Self {
        log::info!(
            "FrameDriver: created (timer pool={}, sequence pool={}, policy={:?})",
            context.config().timer_pool_capacity,
            context.config().sequence_pool_capacity,
            context.config().failure_policy
        );
        Self {
            timers: TimerTaskScheduler::new(context.clone()),
            sequences: CooperativeSequenceRunner::new(context.clone()),
            context,
        }
    }

    /// Advances the frame by `dt` seconds.
    ///
    /// Every callback failure of the frame is returned in
    /// [`SchedulerError::TickFailed`]. Under [`FailurePolicy::Abort`] a timer
    /// failure also skips the sequences for this frame.
    pub fn tick(&mut self, dt: f64) -> Result<TickReport, SchedulerError> {
        if !dt.is_finite() || dt < 0.0 {
            log::error!("FrameDriver: rejected tick delta {dt}");
            return Err(SchedulerError::InvalidDelta(dt));
        }

        let now = self.context.clock().advance(dt);
        let frame = self.context.clock().frame();

        let mut timers = self.timers.tick(dt);
        if !timers.failures.is_empty()
            && self.context.config().failure_policy == FailurePolicy::Abort
        {
            log::error!("FrameDriver: frame {frame} aborted by timer failure");
            return Err(SchedulerError::TickFailed {
                frame,
                failures: timers.failures,
            });
        }

        let sequences = self.sequences.tick();
        timers.failures.extend(sequences.failures);
        if !timers.failures.is_empty() {
            log::error!(
                "FrameDriver: frame {frame} finished with {} failure(s)",
                timers.failures.len()
            );
            return Err(SchedulerError::TickFailed {
                frame,
                failures: timers.failures,
            });
        }

        Ok(TickReport {
            frame,
            now,
            timers_fired: timers.ran,
            timers_removed: timers.retired,
            sequences_advanced: sequences.ran,
            sequences_finished: sequences.retired,
        })
    }

    /// Creates a deferred-initialization orderer sharing this driver's context.
    pub fn deferred_orderer(&self) -> DeferredInitializationOrderer {
        DeferredInitializationOrderer::new(self.context.clone())
    }

    /// The shared context.
    pub fn context(&self) -> &SchedulerContext {
        &self.context
    }

    /// Current logical time.
    pub fn now(&self) -> f64 {
        self.context.now()
    }

    /// The timer scheduler.
    pub fn timers(&self) -> &TimerTaskScheduler {
        &self.timers
    }

    /// Mutable access to the timer scheduler.
    pub fn timers_mut(&mut self) -> &mut TimerTaskScheduler {
        &mut self.timers
    }

    /// The sequence runner.
    pub fn sequences(&self) -> &CooperativeSequenceRunner {
        &self.sequences
    }

    /// Mutable access to the sequence runner.
    pub fn sequences_mut(&mut self) -> &mut CooperativeSequenceRunner {
        &mut self.sequences
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn tick_advances_the_clock() {
        let mut driver = FrameDriver::new(SchedulerConfig::default()).unwrap();

        driver.tick(0.25).unwrap();
        let report = driver.tick(0.25).unwrap();

        assert_eq!(report.frame, 2);
        assert_relative_eq!(report.now, 0.5);
        assert_relative_eq!(driver.now(), 0.5);
    }

    #[test]
    fn invalid_delta_is_rejected_without_advancing() {
        let mut driver = FrameDriver::new(SchedulerConfig::default()).unwrap();

        for dt in [-0.1, f64::NAN, f64::INFINITY] {
            assert!(matches!(driver.tick(dt), Err(SchedulerError::InvalidDelta(_))));
        }
        assert_eq!(driver.context().clock().frame(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SchedulerConfig {
            epsilon: -1.0,
            ..SchedulerConfig::default()
        };
        assert!(matches!(
            FrameDriver::new(config),
            Err(ConfigurationError::InvalidConfig(_))
        ));
    }
}
