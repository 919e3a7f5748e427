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

//! The step-source interface and its adapters.

use super::StepContext;

/// What a sequence asks for after executing one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    /// Run the next step on the next tick.
    Yield,
    /// Sleep for the given number of seconds of logical time, then continue.
    WaitFor(f64),
    /// The sequence is finished; its slot is released.
    Done,
}

/// How a sequence's slot came to be released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceOutcome {
    /// The sequence returned [`Step::Done`].
    Completed,
    /// The sequence was stopped from outside.
    Stopped,
    /// A step returned an error.
    Failed,
}

/// A unit of work that advances one discrete step per tick.
pub trait Sequence {
    /// Executes one step.
    fn step(&mut self, ctx: &mut StepContext<'_>) -> anyhow::Result<Step>;
}

impl<S: Sequence + ?Sized> Sequence for Box<S> {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> anyhow::Result<Step> {
        (**self).step(ctx)
    }
}

/// A sequence driven by a closure. See [`from_fn`].
pub struct FromFn<F>(F);

/// Creates a sequence that calls `f` once per step.
pub fn from_fn<F>(f: F) -> FromFn<F>
where
    F: FnMut(&mut StepContext<'_>) -> anyhow::Result<Step>,
{
    FromFn(f)
}

impl<F> Sequence for FromFn<F>
where
    F: FnMut(&mut StepContext<'_>) -> anyhow::Result<Step>,
{
    fn step(&mut self, ctx: &mut StepContext<'_>) -> anyhow::Result<Step> {
        (self.0)(ctx)
    }
}

/// A sequence replaying a fixed list of steps. See [`from_steps`].
pub struct FromSteps<I>(I);

/// Creates a sequence that yields each item of `steps` in turn and finishes
/// when the iterator is exhausted.
pub fn from_steps<I>(steps: I) -> FromSteps<I::IntoIter>
where
    I: IntoIterator<Item = Step>,
{
    FromSteps(steps.into_iter())
}

impl<I: Iterator<Item = Step>> Sequence for FromSteps<I> {
    fn step(&mut self, _ctx: &mut StepContext<'_>) -> anyhow::Result<Step> {
        Ok(self.0.next().unwrap_or(Step::Done))
    }
}
