mod common;

use common::*;
use coframe::{Body, Error, Exception, Flow, START, Step, SuspendAlways, Task, TaskPromise};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

fn gated(gate: &Gate, value: i32) -> Task<i32> {
    coframe::create(
        TaskPromise::new(),
        await_then(gate.wait(), move |outcome: Result<(), Exception>| -> Result<i32, Exception> {
            outcome?;
            Ok(value)
        }),
    )
}

fn plus_one(outcome: Result<i32, Exception>) -> Result<i32, Exception> {
    outcome.map(|value| value + 1)
}

#[test]
fn test_ready_task_from_value() {
    let mut task = Task::from_value(3);

    assert!(task.is_ready());
    assert_eq!(task.try_take().unwrap().unwrap(), 3);
}

#[test]
fn test_result_can_only_be_taken_once() {
    let mut task = Task::from_value(3);
    task.try_take();

    let error = task.try_take().unwrap().unwrap_err();
    assert_eq!(error.downcast_ref::<Error>(), Some(&Error::ResultTaken));
}

#[test]
fn test_ready_task_from_exception() {
    let mut task = Task::<i32>::from_exception(Exception::msg("nope"));

    assert_eq!(task.try_take().unwrap().unwrap_err().to_string(), "nope");
}

#[test]
fn test_pending_task_has_no_result() {
    let gate = Gate::new();
    let mut task = gated(&gate, 1);

    assert!(!task.is_ready());
    assert!(task.try_take().is_none());

    gate.fire();

    assert!(task.is_ready());
    assert_eq!(task.try_take().unwrap().unwrap(), 1);
}

#[test]
fn test_body_starts_eagerly() {
    let mut task: Task<i32> = coframe::create(
        TaskPromise::new(),
        immediate(|| -> Result<i32, Exception> { Ok(9) }),
    );

    assert!(task.is_ready());
    assert_eq!(task.try_take().unwrap().unwrap(), 9);
}

#[test]
fn test_consumer_resumed_once_on_completion() {
    let log = Log::new();
    let gate = Gate::new();
    let task = gated(&gate, 41);

    let mut consumer = coframe::create(Recorder::new(&log), await_then(task, plus_one));
    consumer.resume().unwrap();

    assert!(consumer.is_empty());
    assert_eq!(log.entries(), ["suspend"]);

    gate.fire();

    assert_eq!(log.entries(), ["suspend", "result:42", "final"]);
    assert_eq!(log.count("result:42"), 1);
}

#[test]
fn test_completed_task_does_not_suspend_consumer() {
    let log = Log::new();

    let mut consumer = coframe::create(
        Recorder::new(&log),
        await_then(Task::from_value(5), plus_one),
    );
    consumer.resume().unwrap();

    assert_eq!(log.entries(), ["result:6", "final"]);
}

#[test]
fn test_error_delivered_to_consumer() {
    let log = Log::new();
    let gate = Gate::new();

    let task: Task<i32> = coframe::create(
        TaskPromise::new(),
        await_then(gate.wait(), |_: Result<(), Exception>| -> Result<i32, Exception> {
            Err(Exception::msg("producer failed"))
        }),
    );

    let mut consumer = coframe::create(Recorder::new(&log), await_then(task, plus_one));
    consumer.resume().unwrap();
    gate.fire();

    assert_eq!(log.entries(), ["suspend", "exception:producer failed", "final"]);
}

#[test]
fn test_dropped_task_cancels_producer() {
    let gate = Gate::new();
    let drops = Drops::new();
    let token = drops.token();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = ran.clone();

    let task: Task<i32> = coframe::create(
        TaskPromise::new(),
        await_then(gate.wait(), move |_: Result<(), Exception>| -> Result<i32, Exception> {
            let _token = token;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(1)
        }),
    );
    drop(task);

    assert_eq!(drops.count(), 0);

    gate.fire();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(drops.count(), 1);
}

#[test]
fn test_missing_return_reported_to_consumer() {
    let mut task: Task<i32> = coframe::create(TaskPromise::new(), FallThrough);

    let error = task.try_take().unwrap().unwrap_err();
    assert_eq!(error.downcast_ref::<Error>(), Some(&Error::MissingReturn));
}

#[test]
fn test_unit_task_completes_on_fall_through() {
    let mut task: Task<()> = coframe::create(TaskPromise::new(), FallThrough);

    assert!(task.is_ready());
    assert!(matches!(task.try_take(), Some(Ok(()))));
}

/// Waits on a gate, then ends without an explicit return.
struct WaitThenEnd {
    wait: Option<GateWait>,
}

impl Body<TaskPromise<()>> for WaitThenEnd {
    fn resume(&mut self, cx: &mut Step<'_, TaskPromise<()>>) -> Result<Flow, Exception> {
        loop {
            match cx.label() {
                START => {
                    let wait = self.wait.take().expect("started once");
                    if let Some(flow) = cx.await_on(RESUMED, wait) {
                        return Ok(flow);
                    }
                }
                RESUMED => {
                    cx.take::<GateWait>()?;
                    return Ok(Flow::End);
                }
                label => panic!("unexpected label {label}"),
            }
        }
    }
}

#[test]
fn test_unit_task_fall_through_resumes_consumer() {
    let log = Log::new();
    let gate = Gate::new();

    let producer: Task<()> = coframe::create(
        TaskPromise::new(),
        WaitThenEnd {
            wait: Some(gate.wait()),
        },
    );
    let consumer: Task<()> = coframe::create(TaskPromise::new(), {
        let log = log.clone();
        await_then(producer, move |outcome: Result<(), Exception>| -> Result<(), Exception> {
            outcome?;
            log.push("resumed");
            Ok(())
        })
    });

    assert!(!consumer.is_ready());
    gate.fire();

    assert_eq!(log.entries(), ["resumed"]);
    assert!(consumer.is_ready());
}

#[test]
fn test_body_parked_without_waker_is_cancelled() {
    let mut task: Task<i32> = coframe::create(
        TaskPromise::new(),
        await_then(SuspendAlways::default(), |_: Result<(), Exception>| -> Result<i32, Exception> {
            Ok(1)
        }),
    );

    let error = task.try_take().unwrap().unwrap_err();
    assert_eq!(error.downcast_ref::<Error>(), Some(&Error::Cancelled));
}

#[test]
fn test_chained_tasks() {
    let gate = Gate::new();
    let first = gated(&gate, 1);

    let second: Task<i32> = coframe::create(TaskPromise::new(), await_then(first, plus_one));
    let mut third: Task<i32> = coframe::create(TaskPromise::new(), await_then(second, plus_one));

    assert!(!third.is_ready());

    gate.fire();

    assert_eq!(third.try_take().unwrap().unwrap(), 3);
}

#[test]
fn test_completion_on_another_thread() {
    let log = Log::new();
    let gate = Gate::new();
    let task = gated(&gate, 10);

    let mut consumer = coframe::create(Recorder::new(&log), await_then(task, plus_one));
    consumer.resume().unwrap();

    let firing = gate.clone();
    thread::spawn(move || firing.fire()).join().unwrap();

    assert_eq!(log.entries(), ["suspend", "result:11", "final"]);
}
