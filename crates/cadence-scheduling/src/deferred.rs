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

//! Priority-ordered, one-shot deferred initialization.
//!
//! Objects that need to finish setting up once every other object has been
//! created register here during the setup frame. The orderer schedules itself
//! on the sequence runner and, on the following tick, runs every hook in
//! ascending priority order, registration order breaking ties.

use crate::sequence::{CooperativeSequenceRunner, Sequence, Step, StepContext};
use cadence_core::{
    ConfigurationError, InitializationFailure, SchedulerContext, SchedulerError, SequenceHandle,
};
use std::borrow::Cow;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// An object with a one-shot hook run by the [`DeferredInitializationOrderer`].
pub trait DeferredInitialize {
    /// Name used in logs and failure reports.
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(std::any::type_name::<Self>())
    }

    /// The one-shot hook.
    fn initialize(&mut self) -> anyhow::Result<()>;
}

/// Shared reference to a registered initializer. Identity is the allocation.
pub type InitializableRef = Rc<RefCell<dyn DeferredInitialize>>;

struct InitializerEntry {
    initializable: InitializableRef,
    name: String,
    priority: i32,
    index: usize,
}

#[derive(Default)]
struct OrdererState {
    entries: Vec<InitializerEntry>,
    executed: bool,
    scheduled: Option<SequenceHandle>,
}

/// Collects initializers and runs them once, in priority order.
///
/// Cloning the orderer yields another handle to the same registry, so it can
/// be handed to every object that needs to register.
#[derive(Clone)]
pub struct DeferredInitializationOrderer {
    context: SchedulerContext,
    state: Rc<RefCell<OrdererState>>,
}

impl DeferredInitializationOrderer {
    /// Creates an empty orderer.
    pub fn new(context: SchedulerContext) -> Self {
        Self {
            context,
            state: Rc::new(RefCell::new(OrdererState::default())),
        }
    }

    /// Registers an initializer with an explicit priority. Lower runs first.
    ///
    /// Duplicates are not rejected here; [`execute`](Self::execute) reports them.
    pub fn register(
        &self,
        initializable: InitializableRef,
        priority: i32,
    ) -> Result<(), ConfigurationError> {
        let name = initializable.borrow().name().into_owned();
        let mut state = self.state.borrow_mut();
        if state.executed {
            log::warn!("DeferredInitializationOrderer: '{name}' registered too late");
            return Err(ConfigurationError::RegistrationAfterExecution { name });
        }

        let index = state.entries.len();
        log::debug!(
            "DeferredInitializationOrderer: registered '{name}' (priority={priority}, #{index})"
        );
        state.entries.push(InitializerEntry {
            initializable,
            name,
            priority,
            index,
        });
        Ok(())
    }

    /// Registers an initializer whose priority comes from its category.
    ///
    /// The priority is looked up in the configured category table now, at
    /// registration time. Unknown categories get priority 0.
    pub fn register_in_category(
        &self,
        initializable: InitializableRef,
        category: &str,
    ) -> Result<(), ConfigurationError> {
        let priority = self.context.config().priority_for(category);
        self.register(initializable, priority)
    }

    /// Schedules [`execute`](Self::execute) for the next tick of `runner`.
    ///
    /// While an earlier request is still pending, or once execution has run,
    /// the earlier handle is returned. A request whose sequence was stopped
    /// before executing is replaced by a new one.
    pub fn schedule_execution(&self, runner: &mut CooperativeSequenceRunner) -> SequenceHandle {
        {
            let state = self.state.borrow();
            if let Some(handle) = state.scheduled {
                if state.executed || runner.is_running(handle) {
                    log::warn!(
                        "DeferredInitializationOrderer: execution already scheduled as {handle}"
                    );
                    return handle;
                }
                log::debug!(
                    "DeferredInitializationOrderer: {handle} was stopped before executing, rescheduling"
                );
            }
        }

        let handle = runner.run_labeled(
            "deferred-initialization",
            DeferredExecution {
                orderer: self.clone(),
            },
            0.0,
        );
        self.state.borrow_mut().scheduled = Some(handle);
        handle
    }

    /// Runs every registered hook once, in ascending priority order.
    ///
    /// Fails with [`ConfigurationError::AlreadyExecuted`] on a second call and
    /// with [`ConfigurationError::DuplicateInitializer`] before running
    /// anything if the same object was registered twice. A failing hook stops
    /// the execution; the hooks after it are skipped.
    ///
    /// Returns the number of hooks run.
    pub fn execute(&self) -> Result<usize, SchedulerError> {
        let mut entries = {
            let mut state = self.state.borrow_mut();
            if state.executed {
                return Err(ConfigurationError::AlreadyExecuted.into());
            }
            state.executed = true;
            std::mem::take(&mut state.entries)
        };

        find_duplicate(&entries)?;

        // Stable: equal priorities keep registration order.
        entries.sort_by_key(|entry| entry.priority);

        log::info!(
            "DeferredInitializationOrderer: running {} initializer(s)",
            entries.len()
        );
        for entry in &entries {
            log::debug!(
                "DeferredInitializationOrderer: initializing '{}' (priority={})",
                entry.name,
                entry.priority
            );
            let result = match entry.initializable.try_borrow_mut() {
                Ok(mut initializable) => initializable.initialize(),
                Err(_) => Err(anyhow::anyhow!("initializer is already borrowed")),
            };
            if let Err(source) = result {
                let failure = InitializationFailure {
                    name: entry.name.clone(),
                    priority: entry.priority,
                    index: entry.index,
                    source,
                };
                log::error!("DeferredInitializationOrderer: {failure}");
                return Err(failure.into());
            }
        }
        Ok(entries.len())
    }

    /// Number of initializers waiting for execution.
    pub fn pending_count(&self) -> usize {
        self.state.borrow().entries.len()
    }

    /// Returns `true` once [`execute`](Self::execute) has been called.
    pub fn is_executed(&self) -> bool {
        self.state.borrow().executed
    }
}

fn find_duplicate(entries: &[InitializerEntry]) -> Result<(), ConfigurationError> {
    let mut seen: HashMap<*const (), usize> = HashMap::with_capacity(entries.len());
    for entry in entries {
        let address = Rc::as_ptr(&entry.initializable).cast::<()>();
        if let Some(&first) = seen.get(&address) {
            let error = ConfigurationError::DuplicateInitializer {
                name: entry.name.clone(),
                first,
                duplicate: entry.index,
            };
            log::error!("DeferredInitializationOrderer: {error}");
            return Err(error);
        }
        seen.insert(address, entry.index);
    }
    Ok(())
}

/// The sequence that runs the orderer on the tick after it was scheduled.
///
/// The runner only executes a sequence's first step on the tick following
/// `run`, so this single step already sits one tick after the request.
struct DeferredExecution {
    orderer: DeferredInitializationOrderer,
}

impl Sequence for DeferredExecution {
    fn step(&mut self, _ctx: &mut StepContext<'_>) -> anyhow::Result<Step> {
        self.orderer.execute()?;
        Ok(Step::Done)
    }
}
