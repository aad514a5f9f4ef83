// tests/registry_lifecycle.rs

use std::error::Error;
use std::time::Duration;

use rendertrack::display::DisplayNotice;
use rendertrack::registry::RegistryOptions;
use rendertrack::types::{Remaining, TaskState};
use rendertrack_test_utils::builders::TaskSpecBuilder;
use rendertrack_test_utils::{init_tracing, manual_registry};

type TestResult = Result<(), Box<dyn Error>>;

fn state_of(registry: &rendertrack::registry::TaskRegistry, id: &str) -> Option<TaskState> {
    registry.task(id).map(|row| row.state)
}

#[test]
fn start_creates_running_task_with_generation_zero() -> TestResult {
    init_tracing();
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());

    let generation = registry.start_task(TaskSpecBuilder::new("beauty").message("Beauty pass").build());

    assert_eq!(generation, 0);
    let row = registry.task("beauty").ok_or("missing row")?;
    assert_eq!(row.state, TaskState::Running);
    assert_eq!(row.progress, 0.0);
    assert_eq!(row.message, "Beauty pass");
    assert_eq!(row.remaining, Remaining::Indeterminate);

    let notices = registry.take_notices();
    assert!(matches!(notices.first(), Some(DisplayNotice::RowAdded(r)) if r.id == "beauty"));
    Ok(())
}

#[test]
fn half_done_after_ten_seconds_estimates_ten_seconds() -> TestResult {
    init_tracing();
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());

    clock.advance(Duration::from_secs(10));
    assert!(registry.update_task("a", 0.5));

    let row = registry.task("a").ok_or("missing row")?;
    assert_eq!(row.progress, 0.5);
    let remaining = row.remaining.as_duration().ok_or("estimate expected")?;
    assert!((remaining.as_secs_f64() - 10.0).abs() < 1e-6, "got {remaining:?}");
    Ok(())
}

#[test]
fn progress_is_clamped_and_never_regresses() -> TestResult {
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    clock.advance(Duration::from_secs(1));

    assert!(registry.update_task("a", 0.6));
    // A lower value is ignored but the job may keep going.
    assert!(registry.update_task("a", 0.2));
    assert_eq!(registry.task("a").ok_or("missing")?.progress, 0.6);

    assert!(registry.update_task("a", 7.0));
    assert_eq!(registry.task("a").ok_or("missing")?.progress, 1.0);
    Ok(())
}

#[test]
fn full_progress_finishes_the_task() -> TestResult {
    init_tracing();
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    clock.advance(Duration::from_secs(1));
    assert!(registry.update_task("a", 0.5));
    registry.take_notices();

    assert!(registry.update_task("a", 1.0));
    let row = registry.task("a").ok_or("missing")?;
    assert_eq!(row.state, TaskState::Finished);
    assert_eq!(row.progress, 1.0);
    assert_eq!(row.remaining, Remaining::Estimated(Duration::ZERO));
    assert!(registry.is_idle());

    // The job reporting its end afterwards changes nothing.
    registry.end_task("a");
    assert!(!registry.update_task("a", 1.0));
    let notices = registry.take_notices();
    assert!(matches!(&notices[..], [DisplayNotice::RowUpdated(row)]
        if row.state == TaskState::Finished));
    Ok(())
}

#[test]
fn full_progress_honours_auto_remove() {
    let options = RegistryOptions {
        remove_finished: true,
        ..RegistryOptions::default()
    };
    let (mut registry, _clock) = manual_registry(options);
    registry.start_task(TaskSpecBuilder::new("a").build());

    assert!(registry.update_task("a", 2.5));

    assert!(registry.task("a").is_none());
    assert!(registry
        .take_notices()
        .iter()
        .any(|n| matches!(n, DisplayNotice::RowRemoved(id) if id == "a")));
}

#[test]
fn ending_a_running_task_fills_its_progress() -> TestResult {
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    clock.advance(Duration::from_secs(1));
    assert!(registry.update_task("a", 0.4));

    registry.end_task("a");
    let row = registry.task("a").ok_or("missing")?;
    assert_eq!(row.state, TaskState::Finished);
    assert_eq!(row.progress, 1.0);
    assert_eq!(row.remaining, Remaining::Estimated(Duration::ZERO));
    Ok(())
}

#[test]
fn unknown_task_update_is_rejected_without_effect() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());

    assert!(!registry.update_task("ghost", 0.5));
    registry.end_task("ghost");

    assert!(registry.is_empty());
    assert!(registry.take_notices().is_empty());
}

#[test]
fn duplicate_start_restarts_with_next_generation() -> TestResult {
    init_tracing();
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    clock.advance(Duration::from_secs(2));
    assert!(registry.update_task("a", 0.4));

    let generation = registry.start_task(TaskSpecBuilder::new("a").message("again").build());

    assert_eq!(generation, 1);
    assert_eq!(registry.len(), 1);
    let row = registry.task("a").ok_or("missing")?;
    assert_eq!(row.state, TaskState::Running);
    assert_eq!(row.progress, 0.0);
    assert_eq!(row.generation, 1);
    assert_eq!(row.message, "again");
    assert_eq!(row.remaining, Remaining::Indeterminate);
    Ok(())
}

#[test]
fn stale_generation_update_is_discarded() -> TestResult {
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    let current = registry
        .on_task_restarted("a", None)
        .ok_or("restart of a running task must succeed")?;
    assert_eq!(current, 1);
    clock.advance(Duration::from_secs(1));

    assert!(!registry.apply_update("a", 0, 0.9));
    assert_eq!(registry.task("a").ok_or("missing")?.progress, 0.0);

    assert!(registry.apply_update("a", 1, 0.3));
    assert_eq!(registry.task("a").ok_or("missing")?.progress, 0.3);

    // Ending the old run does not end the new one.
    registry.end_task_at("a", 0);
    assert_eq!(state_of(&registry, "a"), Some(TaskState::Running));
    Ok(())
}

#[test]
fn restart_of_finished_task_is_refused() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.end_task("a");

    assert_eq!(registry.on_task_restarted("a", None), None);
    assert_eq!(registry.on_task_restarted("ghost", None), None);
    assert_eq!(state_of(&registry, "a"), Some(TaskState::Finished));
}

#[test]
fn starting_a_finished_identity_replaces_its_row() -> TestResult {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.end_task("a");
    registry.take_notices();

    let generation = registry.start_task(TaskSpecBuilder::new("a").build());

    assert_eq!(generation, 1);
    assert_eq!(registry.len(), 1);
    assert_eq!(state_of(&registry, "a"), Some(TaskState::Running));
    let notices = registry.take_notices();
    assert!(matches!(notices.first(), Some(DisplayNotice::RowRemoved(id)) if id == "a"));
    assert!(notices.iter().any(|n| matches!(n, DisplayNotice::RowAdded(r) if r.generation == 1)));
    Ok(())
}

#[test]
fn generations_keep_counting_after_removal() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.end_task("a");
    assert!(registry.remove_task_from_table("a"));

    let generation = registry.start_task(TaskSpecBuilder::new("a").build());
    assert_eq!(generation, 1);
}

#[test]
fn removing_rows_is_idempotent_and_rejects_active_tasks() {
    init_tracing();
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.start_task(TaskSpecBuilder::new("b").build());

    assert!(!registry.remove_task_from_table("a"), "running task must not be removed");

    registry.end_task("a");
    registry.take_notices();
    assert!(registry.remove_task_from_table("a"));
    assert!(!registry.remove_task_from_table("a"));
    assert!(registry.task("a").is_none());
    assert_eq!(
        registry.take_notices(),
        vec![DisplayNotice::RowRemoved("a".to_string())]
    );

    registry.end_task("b");
    assert_eq!(registry.remove_tasks_from_table(&["b", "b", "ghost"]), 1);
    assert!(registry.is_empty());
}

#[test]
fn clear_finished_keeps_active_rows() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    for id in ["a", "b", "c"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }
    registry.end_task("a");
    registry.cancel_request("c");

    assert_eq!(registry.clear_finished(), 2);
    let ids: Vec<String> = registry.rows().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b".to_string()]);
}

#[test]
fn finished_rows_are_dropped_when_auto_remove_is_on() {
    let options = RegistryOptions {
        remove_finished: true,
        ..RegistryOptions::default()
    };
    let (mut registry, _clock) = manual_registry(options);
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.take_notices();

    registry.end_task("a");

    assert!(registry.task("a").is_none());
    let notices = registry.take_notices();
    assert!(matches!(&notices[..], [
        DisplayNotice::RowUpdated(row),
        DisplayNotice::RowRemoved(id),
    ] if row.state == TaskState::Finished && id == "a"));
}

#[test]
fn rows_keep_insertion_order() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    for id in ["c", "a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }
    let ids: Vec<String> = registry.rows().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["c", "a", "b"]);
}

#[test]
fn idle_once_every_task_ended() {
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    assert!(registry.is_idle());

    registry.start_task(TaskSpecBuilder::new("a").build());
    assert!(!registry.is_idle());

    registry.end_task("a");
    assert!(registry.is_idle());
}

#[test]
fn stale_estimate_flips_to_indeterminate_on_refresh() -> TestResult {
    let (mut registry, clock) = manual_registry(RegistryOptions::default());
    registry.start_task(TaskSpecBuilder::new("a").build());
    clock.advance(Duration::from_secs(4));
    registry.update_task("a", 0.5);
    registry.take_notices();

    clock.advance(Duration::from_secs(5));
    registry.refresh_estimates();
    assert!(registry.take_notices().is_empty(), "still fresh; nothing to redraw");

    clock.advance(Duration::from_secs(6));
    registry.refresh_estimates();
    let notices = registry.take_notices();
    assert!(matches!(&notices[..], [DisplayNotice::RowUpdated(row)]
        if row.remaining == Remaining::Indeterminate));

    // A new sample brings the estimate back.
    registry.update_task("a", 0.6);
    assert!(!registry.task("a").ok_or("missing")?.remaining.is_indeterminate());
    Ok(())
}
