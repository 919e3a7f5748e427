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

//! Recycling storage for timer task records.

use super::task::TimerTask;
use cadence_core::{PoolStats, SlotArena, TimerHandle};

/// Pool of [`TimerTask`] records.
///
/// Registering a timer reuses an inactive record instead of allocating a new
/// one. Every record handed out by [`acquire`](TaskRecordPool::acquire) is
/// fully reset.
pub struct TaskRecordPool {
    records: SlotArena<TimerHandle, TimerTask>,
}

impl TaskRecordPool {
    /// Creates a pool with `capacity` pre-allocated records.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: SlotArena::with_capacity(capacity),
        }
    }

    /// Hands out a reset record, allocating a new one if none is inactive.
    pub fn acquire(&mut self) -> (TimerHandle, &mut TimerTask) {
        let (handle, task) = self.records.acquire();
        log::trace!("TaskRecordPool: acquired {handle}");
        (handle, task)
    }

    /// Marks a record inactive and makes it available again.
    ///
    /// The caller must already have removed `handle` from its active set.
    /// Returns `false` if the handle was stale.
    pub fn release(&mut self, handle: TimerHandle) -> bool {
        let released = self.records.release(handle).is_some();
        if released {
            log::trace!("TaskRecordPool: released {handle}");
        }
        released
    }

    /// Returns the live record behind `handle`.
    pub fn get(&self, handle: TimerHandle) -> Option<&TimerTask> {
        self.records.get(handle)
    }

    /// Returns the live record behind `handle`, mutably.
    pub fn get_mut(&mut self, handle: TimerHandle) -> Option<&mut TimerTask> {
        self.records.get_mut(handle)
    }

    /// Occupancy counters.
    pub fn stats(&self) -> PoolStats {
        self.records.stats()
    }
}

impl Default for TaskRecordPool {
    fn default() -> Self {
        Self::with_capacity(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquired_records_are_reset() {
        let mut pool = TaskRecordPool::with_capacity(1);
        let (first, task) = pool.acquire();
        task.configure(None, 1.0, 0.5, 3.0, Some("first".into()));
        assert!(pool.release(first));

        let (second, task) = pool.acquire();
        assert_eq!(second.index, first.index, "The record is reused");
        assert!(!task.is_active());
        assert!(!task.has_started());
        assert_eq!(task.delay(), 0.0);
        assert_eq!(task.interval(), 0.0);
        assert_eq!(task.cancel_at(), None);
        assert_eq!(task.label(), None);
    }

    #[test]
    fn pool_grows_past_its_initial_capacity() {
        let mut pool = TaskRecordPool::with_capacity(1);
        let (_a, _) = pool.acquire();
        let (_b, _) = pool.acquire();

        let stats = pool.stats();
        assert_eq!(stats.capacity, 2);
        assert_eq!(stats.in_use, 2);
        assert_eq!(stats.free, 0);
    }

    #[test]
    fn stale_release_is_rejected() {
        let mut pool = TaskRecordPool::default();
        let (handle, _) = pool.acquire();
        assert!(pool.release(handle));
        assert!(!pool.release(handle));
    }
}
