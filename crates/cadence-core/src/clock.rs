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

//! The monotonic logical clock shared by all scheduling components.

use std::cell::Cell;

/// Epsilon-tolerant `value >= threshold`.
///
/// Values within `epsilon` below the threshold count as reached, which absorbs
/// the error accumulated by summing floating-point deltas.
#[inline]
pub fn reached(value: f64, threshold: f64, epsilon: f64) -> bool {
    value >= threshold - epsilon
}

/// Logical time, advanced only by the frame driver.
///
/// Time never flows on its own: it is the sum of every delta passed to
/// [`advance`](LogicalClock::advance). Interior mutability lets every
/// component hold a shared reference to the same clock.
#[derive(Debug, Default)]
pub struct LogicalClock {
    now: Cell<f64>,
    frame: Cell<u64>,
}

impl LogicalClock {
    /// Creates a clock at time zero, frame zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current logical time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.now.get()
    }

    /// Number of frames advanced so far.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame.get()
    }

    /// Moves the clock forward by one frame of `dt` seconds and returns the new time.
    ///
    /// `dt` must be finite and non-negative; the driver validates it before calling.
    pub fn advance(&self, dt: f64) -> f64 {
        debug_assert!(dt.is_finite() && dt >= 0.0, "invalid clock delta {dt}");
        let now = self.now.get() + dt;
        self.now.set(now);
        self.frame.set(self.frame.get() + 1);
        now
    }
}
