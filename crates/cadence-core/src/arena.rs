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

//! A fixed-shape slot arena with index recycling and generation checks.

use crate::handle::SlotHandle;
use std::marker::PhantomData;

/// Occupancy counters of a pool, reported for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Total number of slots ever allocated.
    pub capacity: usize,
    /// Slots currently handed out.
    pub in_use: usize,
    /// Slots waiting on the free list.
    pub free: usize,
}

struct Slot<T> {
    generation: u32,
    occupied: bool,
    value: T,
}

/// Storage for pooled records addressed by generational handles.
///
/// The arena keeps a dense list of slots and a free list of indices available
/// for reuse. Values are reset to `T::default()` both when a slot is handed
/// out and when it is released, so a record never leaks state from its
/// previous occupant.
pub struct SlotArena<H, T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    _handle: PhantomData<fn() -> H>,
}

impl<H: SlotHandle, T: Default> SlotArena<H, T> {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an arena with `capacity` pre-allocated free slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut arena = Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::with_capacity(capacity),
            _handle: PhantomData,
        };
        for _ in 0..capacity {
            arena.slots.push(Slot {
                generation: 0,
                occupied: false,
                value: T::default(),
            });
        }
        // Lowest indices are handed out first.
        arena.free.extend((0..capacity as u32).rev());
        arena
    }

    /// Hands out a reset slot, recycling a free one when available.
    pub fn acquire(&mut self) -> (H, &mut T) {
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                log::trace!("SlotArena: growing to {} slot(s)", self.slots.len() + 1);
                self.slots.push(Slot {
                    generation: 0,
                    occupied: false,
                    value: T::default(),
                });
                (self.slots.len() - 1) as u32
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.occupied = true;
        slot.value = T::default();
        (H::from_parts(index, slot.generation), &mut slot.value)
    }

    /// Returns a slot to the free list and invalidates every handle to it.
    ///
    /// Returns the released value, or `None` if the handle was stale.
    pub fn release(&mut self, handle: H) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        slot.occupied = false;
        slot.generation = slot.generation.wrapping_add(1);
        let value = std::mem::take(&mut slot.value);
        self.free.push(handle.index());
        Some(value)
    }

    /// Returns a shared reference to a live slot's value.
    pub fn get(&self, handle: H) -> Option<&T> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation())
            .map(|slot| &slot.value)
    }

    /// Returns a mutable reference to a live slot's value.
    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.slot_mut(handle).map(|slot| &mut slot.value)
    }

    /// Returns `true` if the handle still refers to its original occupant.
    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Iterates over the handles of every occupied slot, in index order.
    pub fn handles(&self) -> impl Iterator<Item = H> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.occupied)
            .map(|(index, slot)| H::from_parts(index as u32, slot.generation))
    }

    /// Returns the number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the occupancy counters of the arena.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.slots.len(),
            in_use: self.len(),
            free: self.free.len(),
        }
    }

    fn slot_mut(&mut self, handle: H) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.occupied && slot.generation == handle.generation())
    }
}

impl<H: SlotHandle, T: Default> Default for SlotArena<H, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::TimerHandle;

    #[test]
    fn acquire_appends_when_no_free_slot() {
        let mut arena: SlotArena<TimerHandle, u32> = SlotArena::new();
        let (a, _) = arena.acquire();
        let (b, _) = arena.acquire();

        assert_eq!(a.index, 0);
        assert_eq!(b.index, 1);
        assert_eq!(a.generation, 0, "Fresh slots start at generation 0");
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn preallocated_slots_are_handed_out_lowest_first() {
        let mut arena: SlotArena<TimerHandle, u32> = SlotArena::with_capacity(4);
        assert_eq!(
            arena.stats(),
            PoolStats {
                capacity: 4,
                in_use: 0,
                free: 4
            }
        );

        let (first, _) = arena.acquire();
        assert_eq!(first.index, 0);
        assert_eq!(arena.stats().free, 3);
    }

    #[test]
    fn release_bumps_generation_and_rejects_stale_handles() {
        let mut arena: SlotArena<TimerHandle, u32> = SlotArena::new();
        let (old, value) = arena.acquire();
        *value = 42;

        assert_eq!(arena.release(old), Some(42));
        assert!(!arena.contains(old), "Released handle must be stale");
        assert_eq!(arena.release(old), None, "Double release is rejected");

        let (new, value) = arena.acquire();
        assert_eq!(new.index, old.index, "The slot index is recycled");
        assert_eq!(new.generation, old.generation + 1);
        assert_eq!(*value, 0, "A recycled slot is reset before reuse");
        assert!(arena.get(old).is_none());
        assert!(arena.get(new).is_some());
    }

    #[test]
    fn handles_lists_only_occupied_slots() {
        let mut arena: SlotArena<TimerHandle, u32> = SlotArena::new();
        let (a, _) = arena.acquire();
        let (b, _) = arena.acquire();
        let (c, _) = arena.acquire();
        arena.release(b);

        let live: Vec<_> = arena.handles().collect();
        assert_eq!(live, vec![a, c]);
    }

    #[test]
    fn exhausted_pool_grows_past_its_preallocation() {
        let mut arena: SlotArena<TimerHandle, u32> = SlotArena::with_capacity(2);
        arena.acquire();
        arena.acquire();

        let (grown, _) = arena.acquire();

        assert_eq!(grown.index, 2);
        assert_eq!(
            arena.stats(),
            PoolStats {
                capacity: 3,
                in_use: 3,
                free: 0
            }
        );
    }
}
