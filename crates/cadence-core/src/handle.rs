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

//! Opaque handles addressing pooled scheduling slots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Common interface of the generational handles stored in a
/// [`SlotArena`](crate::arena::SlotArena).
///
/// A handle combines a slot index with a generation count to solve the
/// "ABA problem". When a slot is released its index can be recycled for a new
/// occupant, but the generation is incremented, so handles that still point to
/// the old occupant become invalid and are rejected.
pub trait SlotHandle: Copy + Eq + fmt::Debug {
    /// Builds a handle from its raw parts.
    fn from_parts(index: u32, generation: u32) -> Self;
    /// The index of the slot in its arena.
    fn index(&self) -> u32;
    /// The generation of the slot at the time the handle was issued.
    fn generation(&self) -> u32;
}

macro_rules! slot_handle {
    ($(#[$meta:meta])* $name:ident, $tag:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            /// The index of the slot in its pool.
            pub index: u32,
            /// A generation counter that is incremented each time the slot is recycled.
            pub generation: u32,
        }

        impl SlotHandle for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(&self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(&self) -> u32 {
                self.generation
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($tag, "#{}v{}"), self.index, self.generation)
            }
        }
    };
}

slot_handle!(
    /// Identifies a timer task registered with the timer scheduler.
    TimerHandle,
    "timer"
);

slot_handle!(
    /// Identifies a cooperative sequence running on the sequence runner.
    SequenceHandle,
    "sequence"
);
