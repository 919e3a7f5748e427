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

//! Scheduler configuration.
//!
//! All settings have defaults, so an empty JSON object is a valid
//! configuration:
//!
//! ```rust
//! use cadence_core::{FailurePolicy, SchedulerConfig};
//!
//! let config = SchedulerConfig::from_json_str(r#"{
//!     "failure_policy": "abort",
//!     "category_priorities": { "physics": -10, "ui": 20 }
//! }"#).unwrap();
//!
//! assert_eq!(config.failure_policy, FailurePolicy::Abort);
//! assert_eq!(config.priority_for("physics"), -10);
//! assert_eq!(config.priority_for("audio"), 0);
//! ```

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// What the frame driver does when a callback fails during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep processing the remaining tasks and sequences, then report every failure.
    #[default]
    Continue,
    /// Stop the tick at the first failure and report it.
    Abort,
}

/// Settings shared by every scheduling component through the
/// [`SchedulerContext`](crate::SchedulerContext).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Tolerance used by every "has this time been reached" comparison.
    pub epsilon: f64,
    /// Number of timer records pre-allocated by the task record pool.
    pub timer_pool_capacity: usize,
    /// Number of sequence slots pre-allocated by the sequence runner.
    pub sequence_pool_capacity: usize,
    /// Behaviour of the driver when a callback fails.
    pub failure_policy: FailurePolicy,
    /// Priority of each deferred-initializer category. Unlisted categories get 0.
    pub category_priorities: BTreeMap<String, i32>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            epsilon: 1e-5,
            timer_pool_capacity: 32,
            sequence_pool_capacity: 16,
            failure_policy: FailurePolicy::default(),
            category_priorities: BTreeMap::new(),
        }
    }
}

impl SchedulerConfig {
    /// Parses and validates a configuration from JSON.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigurationError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            log::warn!("SchedulerConfig: rejected epsilon {}", self.epsilon);
            return Err(ConfigurationError::InvalidConfig(format!(
                "epsilon must be finite and non-negative, got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Builder-style setter for a category priority.
    #[must_use]
    pub fn with_category_priority(mut self, category: impl Into<String>, priority: i32) -> Self {
        self.category_priorities.insert(category.into(), priority);
        self
    }

    /// Builder-style setter for the failure policy.
    #[must_use]
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Resolves the priority of a deferred-initializer category.
    pub fn priority_for(&self, category: &str) -> i32 {
        self.category_priorities
            .get(category)
            .copied()
            .unwrap_or(0)
    }
}
