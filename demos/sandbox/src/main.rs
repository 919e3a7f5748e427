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

// Cadence Sandbox
// Simulated host loop exercising timers, sequences and deferred initialization.
//
// Usage: sandbox [config.json]

use std::borrow::Cow;
use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use cadence_core::SchedulerConfig;
use cadence_scheduling::sequence::from_fn;
use cadence_scheduling::{DeferredInitialize, FrameDriver, Step};

const FRAME: f64 = 0.5;
const DURATION: f64 = 6.0;

struct Subsystem {
    name: &'static str,
}

impl DeferredInitialize for Subsystem {
    fn name(&self) -> Cow<'_, str> {
        Cow::Borrowed(self.name)
    }

    fn initialize(&mut self) -> Result<()> {
        log::info!("sandbox: {} ready", self.name);
        Ok(())
    }
}

fn load_config() -> Result<SchedulerConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(SchedulerConfig::default());
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read scheduler config '{path}'"))?;
    SchedulerConfig::from_json_str(&json)
        .with_context(|| format!("invalid scheduler config '{path}'"))
}

fn main() -> Result<()> {
    use env_logger::{Builder, Env};

    Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let mut driver = FrameDriver::new(config)?;

    // Setup frame: registrations only, nothing runs yet.
    let orderer = driver.deferred_orderer();
    orderer.register_in_category(Rc::new(RefCell::new(Subsystem { name: "renderer" })), "render")?;
    orderer.register(Rc::new(RefCell::new(Subsystem { name: "physics" })), -10)?;
    orderer.register(Rc::new(RefCell::new(Subsystem { name: "audio" })), 0)?;
    orderer.schedule_execution(driver.sequences_mut());

    let timers = driver.timers_mut();
    timers.invoke_labeled(
        "A",
        |ctx| {
            log::info!("sandbox: A fired at t={:.1}", ctx.now());
            Ok(())
        },
        1.0,
    );
    timers.invoke_repeating_labeled(
        "B",
        |ctx| {
            log::debug!("sandbox: B fired at t={:.1}", ctx.now());
            Ok(())
        },
        0.0,
        0.5,
        0.0,
    );
    timers.invoke_repeating_labeled(
        "C",
        |ctx| {
            log::info!("sandbox: C fired at t={:.1}", ctx.now());
            Ok(())
        },
        2.0,
        1.0,
        5.0,
    );

    let mut wave = 0;
    driver.sequences_mut().run_labeled(
        "waves",
        from_fn(move |ctx| {
            wave += 1;
            log::info!("sandbox: wave {wave} at t={:.1}", ctx.now());
            Ok(if wave < 3 { Step::WaitFor(1.5) } else { Step::Done })
        }),
        0.5,
    );

    let frames = (DURATION / FRAME).round() as u32;
    for _ in 0..frames {
        let report = driver.tick(FRAME)?;
        log::debug!("sandbox: {report:?}");
    }

    log::info!(
        "sandbox: finished at t={:.1} with {} timer(s) and {} sequence(s) active",
        driver.now(),
        driver.timers().active_count(),
        driver.sequences().active_count()
    );
    Ok(())
}
