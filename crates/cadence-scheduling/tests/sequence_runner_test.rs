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

use approx::assert_relative_eq;
use cadence_core::{
    CallbackOrigin, HandleError, SchedulerConfig, SchedulerContext, SchedulerError, SlotHandle,
};
use cadence_scheduling::sequence::{from_fn, from_steps};
use cadence_scheduling::{CooperativeSequenceRunner, FrameDriver, SequenceOutcome, Step};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

fn driver() -> FrameDriver {
    FrameDriver::new(SchedulerConfig::default()).unwrap()
}

/// A sequence that counts its steps and never finishes.
fn counting(steps: &Rc<Cell<u32>>) -> impl cadence_scheduling::Sequence + 'static {
    let steps = steps.clone();
    from_fn(move |_| {
        steps.set(steps.get() + 1);
        Ok(Step::Yield)
    })
}

#[test]
fn sequence_advances_one_step_per_tick_and_is_released_when_done() {
    // --- ARRANGE ---
    let mut driver = driver();
    let outcome = Rc::new(Cell::new(None));
    let seen = outcome.clone();
    let handle = driver.sequences_mut().run_with_completion(
        from_steps([Step::Yield, Step::Yield]),
        0.0,
        move |_, result| seen.set(Some(result)),
    );

    // --- ACT & ASSERT ---
    assert_eq!(driver.tick(0.1).unwrap().sequences_advanced, 1);
    assert_eq!(driver.tick(0.1).unwrap().sequences_advanced, 1);
    assert!(driver.sequences().is_running(handle));
    assert_eq!(outcome.get(), None);

    let report = driver.tick(0.1).unwrap();
    assert_eq!(report.sequences_finished, 1);
    assert_eq!(outcome.get(), Some(SequenceOutcome::Completed));
    assert!(!driver.sequences().is_running(handle));
    assert_eq!(driver.sequences().active_count(), 0);
}

#[test]
fn run_does_not_step_before_the_next_tick() {
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));

    driver.sequences_mut().run(counting(&steps), 0.0);

    assert_eq!(steps.get(), 0);
    driver.tick(0.1).unwrap();
    assert_eq!(steps.get(), 1);
}

#[test]
fn pause_for_holds_progress_until_the_resume_time() {
    // --- ARRANGE ---
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));
    let handle = driver.sequences_mut().run(counting(&steps), 0.0);

    // --- ACT ---
    driver.sequences_mut().pause_for(handle, 2.0).unwrap();
    for _ in 0..3 {
        driver.tick(0.5).unwrap();
    }

    // --- ASSERT ---
    assert_eq!(steps.get(), 0, "No progress before cumulative 2.0");
    assert_eq!(driver.sequences().is_paused(handle), Some(true));

    driver.tick(0.5).unwrap();
    assert_eq!(steps.get(), 1, "Resumes on the tick reaching 2.0");
    assert_eq!(driver.sequences().is_paused(handle), Some(false));

    driver.tick(0.5).unwrap();
    assert_eq!(steps.get(), 2);
}

#[test]
fn delayed_run_starts_paused() {
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));

    let handle = driver.sequences_mut().run(counting(&steps), 1.0);
    assert_eq!(driver.sequences().is_paused(handle), Some(true));

    driver.tick(0.5).unwrap();
    assert_eq!(steps.get(), 0);
    driver.tick(0.5).unwrap();
    assert_eq!(steps.get(), 1);
}

#[test]
fn pause_and_resume_are_explicit() {
    // --- ARRANGE ---
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));
    let handle = driver.sequences_mut().run(counting(&steps), 0.0);
    driver.tick(0.5).unwrap();

    // --- ACT ---
    driver.sequences_mut().pause(handle).unwrap();
    for _ in 0..4 {
        driver.tick(0.5).unwrap();
    }
    assert_eq!(steps.get(), 1, "Indefinite pause holds progress");

    driver.sequences_mut().resume(handle).unwrap();
    driver.tick(0.5).unwrap();

    // --- ASSERT ---
    assert_eq!(steps.get(), 2);
}

#[test]
fn resume_clears_a_pending_resume_time() {
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));
    let handle = driver.sequences_mut().run(counting(&steps), 0.0);

    driver.sequences_mut().pause_for(handle, 10.0).unwrap();
    driver.sequences_mut().resume(handle).unwrap();
    driver.sequences_mut().pause(handle).unwrap();
    for _ in 0..30 {
        driver.tick(0.5).unwrap();
    }

    assert_eq!(steps.get(), 0, "The cleared resume time must not un-pause it");
}

#[test]
fn wait_for_sleeps_in_logical_time() {
    // --- ARRANGE ---
    let mut driver = driver();
    let stamps = Rc::new(RefCell::new(Vec::new()));
    let record = stamps.clone();
    let mut step = 0;
    driver.sequences_mut().run(
        from_fn(move |ctx| {
            record.borrow_mut().push(ctx.now());
            step += 1;
            Ok(match step {
                1 => Step::WaitFor(1.0),
                2 => Step::Yield,
                _ => Step::Done,
            })
        }),
        0.0,
    );

    // --- ACT ---
    for _ in 0..8 {
        driver.tick(0.25).unwrap();
    }

    // --- ASSERT ---
    let stamps = stamps.borrow();
    assert_eq!(stamps.len(), 3);
    assert_relative_eq!(stamps[0], 0.25);
    assert_relative_eq!(stamps[1], 1.25);
    assert_relative_eq!(stamps[2], 1.5);
}

#[test]
fn stop_releases_the_slot_and_invalidates_the_handle() {
    // --- ARRANGE ---
    let mut driver = driver();
    let steps = Rc::new(Cell::new(0));
    let outcome = Rc::new(Cell::new(None));
    let seen = outcome.clone();
    let handle = driver.sequences_mut().run_with_completion(
        counting(&steps),
        0.0,
        move |_, result| seen.set(Some(result)),
    );
    driver.tick(0.1).unwrap();

    // --- ACT ---
    driver.sequences_mut().stop(handle).unwrap();

    // --- ASSERT ---
    assert_eq!(outcome.get(), Some(SequenceOutcome::Stopped), "Notified at stop time");
    assert_eq!(
        driver.sequences_mut().pause(handle),
        Err(HandleError::StaleSequence(handle))
    );
    assert_eq!(driver.sequences_mut().stop(handle), Err(HandleError::StaleSequence(handle)));
    assert_eq!(driver.sequences().is_paused(handle), None);

    driver.tick(0.1).unwrap();
    assert_eq!(steps.get(), 1);
}

#[test]
fn reused_slot_does_not_notify_the_previous_occupant() {
    // --- ARRANGE ---
    let mut driver = driver();
    let notifications = Rc::new(Cell::new(0));
    let count = notifications.clone();
    let first = driver.sequences_mut().run_with_completion(
        from_steps([Step::Done]),
        0.0,
        move |_, _| count.set(count.get() + 1),
    );
    driver.tick(0.1).unwrap();
    assert_eq!(notifications.get(), 1);

    // --- ACT ---
    let steps = Rc::new(Cell::new(0));
    let second = driver.sequences_mut().run(counting(&steps), 0.0);
    driver.tick(0.1).unwrap();

    // --- ASSERT ---
    assert_eq!(second.index(), first.index());
    assert_ne!(second.generation(), first.generation());
    assert_eq!(notifications.get(), 1);
    assert!(!driver.sequences().is_running(first));
    assert!(driver.sequences().is_running(second));
}

#[test]
fn failing_step_is_reported_and_the_sequence_released() {
    // --- ARRANGE ---
    let mut driver = driver();
    let outcome = Rc::new(Cell::new(None));
    let seen = outcome.clone();
    let steps = Rc::new(Cell::new(0));
    driver.sequences_mut().run(counting(&steps), 0.0);
    let failing = driver.sequences_mut().run_with_completion(
        from_fn(|_| Err(anyhow::anyhow!("step failed"))),
        0.0,
        move |_, result| seen.set(Some(result)),
    );

    // --- ACT ---
    let error = driver.tick(0.1).unwrap_err();

    // --- ASSERT ---
    match error {
        SchedulerError::TickFailed { frame, failures } => {
            assert_eq!(frame, 1);
            assert_eq!(failures.len(), 1);
            assert!(matches!(
                failures[0].origin,
                CallbackOrigin::Sequence { handle, .. } if handle == failing
            ));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(outcome.get(), Some(SequenceOutcome::Failed));
    assert!(!driver.sequences().is_running(failing));
    assert_eq!(steps.get(), 1, "The healthy sequence still stepped");
}

#[test]
fn sequences_spawned_from_a_step_start_on_the_next_tick() {
    // --- ARRANGE ---
    let mut driver = driver();
    let child_steps = Rc::new(Cell::new(0));
    let child = child_steps.clone();
    driver.sequences_mut().run(
        from_fn(move |ctx| {
            ctx.run(counting(&child), 0.0);
            Ok(Step::Done)
        }),
        0.0,
    );

    // --- ACT ---
    let report = driver.tick(0.1).unwrap();

    // --- ASSERT ---
    assert_eq!(report.sequences_advanced, 1);
    assert_eq!(child_steps.get(), 0);
    assert_eq!(driver.sequences().active_count(), 1);

    driver.tick(0.1).unwrap();
    assert_eq!(child_steps.get(), 1);
}

#[test]
fn stop_all_notifies_every_sequence() {
    let mut driver = driver();
    let stopped = Rc::new(Cell::new(0));
    for _ in 0..3 {
        let count = stopped.clone();
        driver.sequences_mut().run_with_completion(
            from_steps(std::iter::repeat(Step::Yield)),
            0.0,
            move |_, outcome| {
                assert_eq!(outcome, SequenceOutcome::Stopped);
                count.set(count.get() + 1);
            },
        );
    }

    driver.sequences_mut().stop_all();

    assert_eq!(stopped.get(), 3);
    assert_eq!(driver.sequences().active_count(), 0);
    assert_eq!(driver.sequences().pool_stats().in_use, 0);
}

#[test]
fn runner_ticked_alone_only_resumes_when_the_clock_moves() {
    // --- ARRANGE ---
    let context = SchedulerContext::default();
    let mut runner = CooperativeSequenceRunner::new(context.clone());
    let steps = Rc::new(Cell::new(0));
    let handle = runner.run(counting(&steps), 0.0);
    runner.pause_for(handle, 1.0).unwrap();

    // --- ACT ---
    for _ in 0..10 {
        let _ = runner.tick();
    }
    assert_eq!(steps.get(), 0, "The clock never moved");
    context.clock().advance(1.0);
    let _ = runner.tick();

    // --- ASSERT ---
    assert_eq!(steps.get(), 1);
    assert_eq!(runner.is_paused(handle), Some(false));
}
