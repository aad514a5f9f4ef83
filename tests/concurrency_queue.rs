// tests/concurrency_queue.rs

use rendertrack::engine::ConcurrencyQueue;
use rendertrack::registry::{RegistryOptions, TaskRegistry};
use rendertrack::types::{QueueMode, TaskState};
use rendertrack_test_utils::builders::TaskSpecBuilder;
use rendertrack_test_utils::{init_tracing, manual_registry};

fn queued_options(max_concurrent: usize) -> RegistryOptions {
    RegistryOptions {
        queue_mode: QueueMode::Queued,
        max_concurrent,
        ..RegistryOptions::default()
    }
}

fn states(registry: &TaskRegistry) -> Vec<(String, TaskState)> {
    registry.rows().into_iter().map(|r| (r.id, r.state)).collect()
}

fn s(id: &str, state: TaskState) -> (String, TaskState) {
    (id.to_string(), state)
}

#[test]
fn queue_admits_oldest_first_up_to_the_limit() {
    let mut queue = ConcurrencyQueue::new(Some(2));
    for id in ["a", "b", "c"] {
        queue.request(id);
    }

    assert_eq!(queue.admit(), vec!["a", "b"]);
    assert!(queue.is_waiting("c"));
    assert!(!queue.slot_available());

    queue.release("a");
    assert_eq!(queue.admit(), vec!["c"]);
    assert_eq!(queue.running_count(), 2);
}

#[test]
fn queue_ignores_duplicate_requests_and_drops_waiting_on_release() {
    let mut queue = ConcurrencyQueue::new(Some(1));
    queue.request("a");
    queue.request("a");
    assert_eq!(queue.admit(), vec!["a"]);
    queue.request("a");
    assert_eq!(queue.waiting().count(), 0);

    queue.request("b");
    queue.release("b");
    queue.release("a");
    assert!(queue.admit().is_empty());
    assert_eq!(queue.running_count(), 0);
}

#[test]
fn zero_limit_is_clamped_and_none_is_unbounded() {
    let mut clamped = ConcurrencyQueue::new(Some(0));
    assert_eq!(clamped.limit(), Some(1));
    clamped.request("a");
    assert_eq!(clamped.admit(), vec!["a"]);

    let mut open = ConcurrencyQueue::new(None);
    for id in ["a", "b", "c", "d"] {
        open.request(id);
    }
    assert_eq!(open.admit().len(), 4);
}

#[test]
fn queued_renders_run_one_at_a_time_in_fifo_order() {
    init_tracing();
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b", "c"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }
    assert_eq!(
        states(&registry),
        vec![
            s("a", TaskState::Running),
            s("b", TaskState::Queued),
            s("c", TaskState::Queued),
        ]
    );

    registry.end_task("a");
    assert_eq!(
        states(&registry),
        vec![
            s("a", TaskState::Finished),
            s("b", TaskState::Running),
            s("c", TaskState::Queued),
        ]
    );

    registry.end_task("b");
    assert_eq!(registry.task("c").map(|r| r.state), Some(TaskState::Running));
}

#[test]
fn queued_task_rejects_progress() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.start_task(TaskSpecBuilder::new("b").build());

    assert!(!registry.update_task("b", 0.5));
    assert_eq!(registry.task("b").map(|r| r.progress), Some(0.0));
}

#[test]
fn canceled_task_holds_its_slot_until_the_job_ends() {
    init_tracing();
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b", "c"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }

    // The canceled job only stops at its next update; it still renders.
    registry.cancel_request("a");
    assert_eq!(registry.task("a").map(|r| r.state), Some(TaskState::Canceled));
    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Queued));
    assert!(registry.queue().holds_slot("a"));

    assert!(!registry.update_task("a", 0.5));
    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Queued));

    registry.end_task("a");
    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Running));
    assert_eq!(registry.task("a").map(|r| r.state), Some(TaskState::Canceled));
}

#[test]
fn process_failure_frees_the_slot_at_once() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }

    registry.fail_task("a", 0, "exit code 2");

    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Running));
}

#[test]
fn canceled_job_whose_process_dies_frees_the_slot() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }
    registry.cancel_request("a");

    registry.fail_task("a", 0, "terminated by signal");

    let a = registry.task("a");
    assert_eq!(a.as_ref().map(|r| r.state), Some(TaskState::Canceled));
    assert_eq!(a.and_then(|r| r.failure), None, "a user cancel stays a cancel");
    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Running));
}

#[test]
fn repeated_end_of_a_canceled_job_frees_no_extra_slot() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }
    registry.cancel_request("a");
    registry.end_task("a");
    registry.start_task(TaskSpecBuilder::new("c").build());

    registry.end_task("a");

    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Running));
    assert_eq!(registry.task("c").map(|r| r.state), Some(TaskState::Queued));
}

#[test]
fn full_progress_hands_the_slot_to_the_next_task() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }

    assert!(registry.update_task("a", 1.0));

    assert_eq!(
        states(&registry),
        vec![s("a", TaskState::Finished), s("b", TaskState::Running)]
    );
    registry.end_task("a");
    assert!(registry.queue().holds_slot("b"));
    assert_eq!(registry.queue().running_count(), 1);
}

#[test]
fn paused_task_keeps_its_slot() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.start_task(TaskSpecBuilder::new("b").build());

    registry.pause_request("a");

    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Queued));
}

#[test]
fn disabling_queue_renders_admits_everyone_waiting() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    for id in ["a", "b", "c"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }

    registry.set_queue_renders(false);

    assert!(registry.rows().iter().all(|r| r.state == TaskState::Running));
}

#[test]
fn enabling_queue_renders_never_preempts_running_tasks() {
    init_tracing();
    let (mut registry, _clock) = manual_registry(RegistryOptions::default());
    for id in ["a", "b"] {
        registry.start_task(TaskSpecBuilder::new(id).build());
    }

    registry.set_queue_renders(true);
    registry.start_task(TaskSpecBuilder::new("c").build());

    assert_eq!(
        states(&registry),
        vec![
            s("a", TaskState::Running),
            s("b", TaskState::Running),
            s("c", TaskState::Queued),
        ]
    );

    registry.end_task("a");
    assert_eq!(registry.task("c").map(|r| r.state), Some(TaskState::Queued));
    registry.end_task("b");
    assert_eq!(registry.task("c").map(|r| r.state), Some(TaskState::Running));
}

#[test]
fn restarting_a_queued_task_keeps_it_waiting() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.start_task(TaskSpecBuilder::new("b").build());

    assert_eq!(registry.start_task(TaskSpecBuilder::new("b").build()), 1);
    let row = registry.task("b");
    assert_eq!(row.as_ref().map(|r| r.state), Some(TaskState::Queued));
    assert_eq!(row.map(|r| r.generation), Some(1));
    assert!(registry.queue().is_waiting("b"));
}

#[test]
fn finished_queued_task_leaves_the_queue() {
    let (mut registry, _clock) = manual_registry(queued_options(1));
    registry.start_task(TaskSpecBuilder::new("a").build());
    registry.start_task(TaskSpecBuilder::new("b").build());

    registry.end_task("b");

    assert_eq!(registry.task("b").map(|r| r.state), Some(TaskState::Finished));
    assert!(!registry.queue().is_waiting("b"));
}
