#![allow(dead_code)]

use coframe::{
    Awaitable, Awaiter, Body, Coroutine, Error, Exception, Flow, FrameAlloc, Global, Label,
    Promise, START, Step,
};

use std::alloc::Layout;
use std::mem;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A manually fired event coroutines can wait on.
#[derive(Clone, Default)]
pub struct Gate {
    inner: Arc<Mutex<GateState>>,
}

#[derive(Default)]
struct GateState {
    open: bool,
    waiters: Vec<Coroutine>,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wait(&self) -> GateWait {
        GateWait { gate: self.clone() }
    }

    pub fn waiting(&self) -> usize {
        self.inner.lock().unwrap().waiters.len()
    }

    /// Opens the gate and resumes every waiter, in registration order.
    pub fn fire(&self) {
        let waiters = {
            let mut state = self.inner.lock().unwrap();
            state.open = true;
            mem::take(&mut state.waiters)
        };

        for mut coro in waiters {
            coro.run();
        }
    }
}

pub struct GateWait {
    gate: Gate,
}

impl Awaitable for GateWait {
    fn ready(&mut self) -> bool {
        self.gate.inner.lock().unwrap().open
    }

    fn register(&mut self, coro: &mut Coroutine) -> bool {
        let mut state = self.gate.inner.lock().unwrap();
        if state.open {
            return false;
        }

        state.waiters.push(coro.take());
        true
    }
}

impl Awaiter for GateWait {
    type Output = ();

    fn resume(&mut self) -> Result<(), Exception> {
        Ok(())
    }
}

/// Ordered record of events observed by a test.
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// Counts how many tokens were dropped.
#[derive(Clone, Default)]
pub struct Drops(Arc<AtomicUsize>);

impl Drops {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> DropToken {
        DropToken(self.0.clone())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct DropToken(Arc<AtomicUsize>);

impl Drop for DropToken {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Global allocator wrapper counting frame allocations.
#[derive(Clone, Default)]
pub struct CountingAlloc {
    pub allocs: Arc<AtomicUsize>,
    pub frees: Arc<AtomicUsize>,
}

unsafe impl FrameAlloc for CountingAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        self.allocs.fetch_add(1, Ordering::SeqCst);
        Global.allocate(layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.frees.fetch_add(1, Ordering::SeqCst);
        unsafe { Global.deallocate(ptr, layout) }
    }
}

/// Allocator that always fails.
#[derive(Clone, Copy, Default)]
pub struct Exhausted;

unsafe impl FrameAlloc for Exhausted {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, Error> {
        Err(Error::AllocFailed(layout))
    }

    unsafe fn deallocate(&self, _: NonNull<u8>, _: Layout) {
        unreachable!("nothing was allocated");
    }
}

/// A promise recording every hook the engine calls.
pub struct Recorder {
    log: Log,
    lazy: bool,
    keep: bool,
    rethrow: bool,
    cancel: Arc<AtomicBool>,
    token: Option<DropToken>,
}

impl Recorder {
    pub fn new(log: &Log) -> Self {
        Self {
            log: log.clone(),
            lazy: false,
            keep: false,
            rethrow: false,
            cancel: Arc::new(AtomicBool::new(false)),
            token: None,
        }
    }

    pub fn lazy(mut self) -> Self {
        self.lazy = true;
        self
    }

    /// Keeps the frame alive after completion.
    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    pub fn rethrow(mut self) -> Self {
        self.rethrow = true;
        self
    }

    pub fn cancel_on(mut self, flag: &Arc<AtomicBool>) -> Self {
        self.cancel = flag.clone();
        self
    }

    /// Records the promise's own destruction.
    pub fn tracked(mut self, drops: &Drops) -> Self {
        self.token = Some(drops.token());
        self
    }
}

impl Promise for Recorder {
    type Output = i32;
    type Object = Coroutine<Recorder>;

    fn get_return_object(coro: Coroutine<Self>) -> Coroutine<Self> {
        coro
    }

    fn initial_suspend(&mut self) -> bool {
        self.lazy
    }

    fn final_suspend(&mut self) -> bool {
        self.log.push("final");
        self.keep
    }

    fn cancellation_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    fn on_suspend(&mut self) {
        self.log.push("suspend");
    }

    fn set_result(&mut self, value: i32) {
        self.log.push(format!("result:{value}"));
    }

    fn set_exception(&mut self, error: Exception) -> Result<(), Exception> {
        self.log.push(format!("exception:{error}"));

        if self.rethrow { Err(error) } else { Ok(()) }
    }

    fn cancel(&mut self) {
        self.log.push("cancel");
    }
}

pub const RESUMED: Label = 2;

/// Awaits one awaiter, then returns what `then` makes of its outcome.
pub struct AwaitThen<A, F> {
    awaiter: Option<A>,
    then: Option<F>,
}

pub fn await_then<A, F>(awaiter: A, then: F) -> AwaitThen<A, F> {
    AwaitThen {
        awaiter: Some(awaiter),
        then: Some(then),
    }
}

impl<P, A, F> Body<P> for AwaitThen<A, F>
where
    P: Promise,
    A: Awaiter + Send + 'static,
    F: FnOnce(Result<A::Output, Exception>) -> Result<P::Output, Exception> + Send + 'static,
{
    fn resume(&mut self, cx: &mut Step<'_, P>) -> Result<Flow, Exception> {
        loop {
            match cx.label() {
                START => {
                    let awaiter = self.awaiter.take().expect("started once");
                    if let Some(flow) = cx.await_on(RESUMED, awaiter) {
                        return Ok(flow);
                    }
                }
                RESUMED => {
                    let outcome = cx.take::<A>();
                    let then = self.then.take().expect("resumed once");
                    let value = then(outcome)?;
                    return cx.ret(value);
                }
                label => panic!("unexpected label {label}"),
            }
        }
    }
}

/// Runs `f` straight away and returns its value.
pub struct Immediate<F>(Option<F>);

pub fn immediate<F>(f: F) -> Immediate<F> {
    Immediate(Some(f))
}

impl<P, F> Body<P> for Immediate<F>
where
    P: Promise,
    F: FnOnce() -> Result<P::Output, Exception> + Send + 'static,
{
    fn resume(&mut self, cx: &mut Step<'_, P>) -> Result<Flow, Exception> {
        let f = self.0.take().expect("started once");
        let value = f()?;
        cx.ret(value)
    }
}

/// A body that falls off its end without returning.
pub struct FallThrough;

impl<P: Promise> Body<P> for FallThrough {
    fn resume(&mut self, _: &mut Step<'_, P>) -> Result<Flow, Exception> {
        Ok(Flow::End)
    }
}
