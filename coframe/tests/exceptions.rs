mod common;

use common::*;
use coframe::{
    Awaitable, Awaiter, Body, Coroutine, Exception, Flow, Label, SENTINEL, START, Step, Task,
    TaskPromise, TryRegion,
};

const PARKED: Label = 2;
const OUTER_CATCH: Label = 10;
const INNER_CATCH: Label = 20;

const OUTER: TryRegion = TryRegion::new(OUTER_CATCH);
const INNER: TryRegion = OUTER.nested(INNER_CATCH);

/// Enters two nested regions, suspends, then fails after resumption.
struct Nested {
    wait: Option<GateWait>,
    log: Log,
    rethrow_inner: bool,
}

impl Body<Recorder> for Nested {
    fn resume(&mut self, cx: &mut Step<'_, Recorder>) -> Result<Flow, Exception> {
        loop {
            match cx.label() {
                START => {
                    cx.enter(OUTER);
                    cx.enter(INNER);

                    let wait = self.wait.take().expect("started once");
                    if let Some(flow) = cx.await_on(PARKED, wait) {
                        return Ok(flow);
                    }
                }
                PARKED => {
                    cx.take::<GateWait>()?;
                    return Err(Exception::msg("inner failure"));
                }
                INNER_CATCH => {
                    let error = cx.catch(INNER);
                    self.log.push(format!("inner caught {error} (handler {})", cx.handler()));

                    if self.rethrow_inner {
                        return Err(error);
                    }

                    cx.leave(OUTER);
                    return cx.ret(1);
                }
                OUTER_CATCH => {
                    let error = cx.catch(OUTER);
                    self.log.push(format!("outer caught {error} (handler {})", cx.handler()));
                    return cx.ret(2);
                }
                label => panic!("unexpected label {label}"),
            }
        }
    }
}

#[test]
fn test_innermost_region_catches_across_suspension() {
    let log = Log::new();
    let gate = Gate::new();

    let mut coro = coframe::create(
        Recorder::new(&log),
        Nested {
            wait: Some(gate.wait()),
            log: log.clone(),
            rethrow_inner: false,
        },
    );
    coro.resume().unwrap();
    gate.fire();

    assert_eq!(
        log.entries(),
        [
            "suspend".to_string(),
            format!("inner caught inner failure (handler {OUTER_CATCH})"),
            "result:1".to_string(),
            "final".to_string(),
        ]
    );
}

#[test]
fn test_rethrow_from_handler_reaches_enclosing_region() {
    let log = Log::new();
    let gate = Gate::new();

    let mut coro = coframe::create(
        Recorder::new(&log),
        Nested {
            wait: Some(gate.wait()),
            log: log.clone(),
            rethrow_inner: true,
        },
    );
    coro.resume().unwrap();
    gate.fire();

    assert_eq!(
        log.entries(),
        [
            "suspend".to_string(),
            format!("inner caught inner failure (handler {OUTER_CATCH})"),
            format!("outer caught inner failure (handler {SENTINEL})"),
            "result:2".to_string(),
            "final".to_string(),
        ]
    );
}

/// Fails after leaving the inner region but while the outer one is active.
struct LeftInner {
    log: Log,
}

impl Body<Recorder> for LeftInner {
    fn resume(&mut self, cx: &mut Step<'_, Recorder>) -> Result<Flow, Exception> {
        match cx.label() {
            START => {
                cx.enter(OUTER);
                cx.enter(INNER);
                cx.leave(INNER);
                assert_eq!(cx.handler(), OUTER_CATCH);

                Err(Exception::msg("late failure"))
            }
            INNER_CATCH => {
                cx.catch(INNER);
                self.log.push("inner");
                cx.ret(1)
            }
            OUTER_CATCH => {
                let error = cx.catch(OUTER);
                self.log.push(format!("outer caught {error}"));
                cx.ret(2)
            }
            label => panic!("unexpected label {label}"),
        }
    }
}

#[test]
fn test_error_after_leaving_region_skips_its_handler() {
    let log = Log::new();

    let mut coro = coframe::create(Recorder::new(&log), LeftInner { log: log.clone() });
    coro.resume().unwrap();

    assert_eq!(log.entries(), ["outer caught late failure", "result:2", "final"]);
}

/// Leaves every region before failing.
struct Unguarded;

impl Body<Recorder> for Unguarded {
    fn resume(&mut self, cx: &mut Step<'_, Recorder>) -> Result<Flow, Exception> {
        cx.enter(OUTER);
        cx.leave(OUTER);
        assert_eq!(cx.handler(), SENTINEL);

        Err(Exception::msg("unguarded"))
    }
}

#[test]
fn test_error_outside_regions_reaches_promise() {
    let log = Log::new();

    let mut coro = coframe::create(Recorder::new(&log), Unguarded);
    coro.resume().unwrap();

    assert_eq!(log.entries(), ["exception:unguarded", "final"]);
}

/// An awaiter that is satisfied with a failure.
struct Failing;

impl Awaitable for Failing {
    fn ready(&mut self) -> bool {
        true
    }

    fn register(&mut self, _: &mut Coroutine) -> bool {
        unreachable!("always ready");
    }
}

impl Awaiter for Failing {
    type Output = i32;

    fn resume(&mut self) -> Result<i32, Exception> {
        Err(Exception::msg("awaiter failed"))
    }
}

/// Catches the failure of an awaited value.
struct Guarded {
    log: Log,
}

impl Body<Recorder> for Guarded {
    fn resume(&mut self, cx: &mut Step<'_, Recorder>) -> Result<Flow, Exception> {
        loop {
            match cx.label() {
                START => {
                    cx.enter(OUTER);
                    if let Some(flow) = cx.await_on(PARKED, Failing) {
                        return Ok(flow);
                    }
                }
                PARKED => {
                    let value = cx.take::<Failing>()?;
                    cx.leave(OUTER);
                    return cx.ret(value);
                }
                OUTER_CATCH => {
                    let error = cx.catch(OUTER);
                    self.log.push(format!("caught {error}"));
                    return cx.ret(-1);
                }
                label => panic!("unexpected label {label}"),
            }
        }
    }
}

#[test]
fn test_awaited_failure_is_rethrown_at_extraction() {
    let log = Log::new();

    let mut coro = coframe::create(Recorder::new(&log), Guarded { log: log.clone() });
    coro.resume().unwrap();

    assert_eq!(log.entries(), ["caught awaiter failed", "result:-1", "final"]);
}

#[test]
fn test_task_error_caught_by_consumer_region() {
    let log = Log::new();
    let failed: Task<i32> = coframe::create(
        TaskPromise::new(),
        immediate(|| -> Result<i32, Exception> { Err(Exception::msg("producer failed")) }),
    );

    let mut consumer = coframe::create(
        Recorder::new(&log),
        await_then(failed, |outcome: Result<i32, Exception>| -> Result<i32, Exception> {
            match outcome {
                Ok(value) => Ok(value),
                Err(error) if error.to_string() == "producer failed" => Ok(0),
                Err(error) => Err(error),
            }
        }),
    );
    consumer.resume().unwrap();

    assert_eq!(log.entries(), ["result:0", "final"]);
}
