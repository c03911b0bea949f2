#![forbid(unsafe_code)]

//! The render context: where mapper computations and sink calls execute.
//!
//! Work crosses from the control context to the render context as
//! [`RenderJob`]s: boxed `Send` closures that own everything they need.
//! Nothing is shared implicitly; a job carries its own snapshot.
//!
//! Three implementations of [`RenderContext`] are provided:
//!
//! - [`RenderThread`]: a dedicated named thread fed by a bounded FIFO
//!   channel. This is the production shape.
//! - [`ImmediateContext`]: runs each job inline on the caller. For hosts that
//!   drive rendering from a single thread.
//! - [`ManualContext`]: queues jobs until [`ManualContext::run_pending`] is
//!   called. For deterministic tests of asynchronous hand-off.
//!
//! # Ordering
//!
//! Every implementation executes jobs in dispatch order. `dispatch_sync`
//! waits for all previously dispatched jobs as well as its own.
//!
//! # Panics
//!
//! A panicking job does not take down the [`RenderThread`]: the panic is
//! caught, logged, and reported through [`RenderThread::check_panic`].
//!
//! # Self-dispatch
//!
//! A job running on the [`RenderThread`] may dispatch more work (a cell write
//! made there dispatches mapper runs). Those messages never go through the
//! bounded channel, which the thread would be waiting on itself to drain.
//! They land in a backlog owned by the thread, behind everything already
//! sent on the channel.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use weft_core::{Error, Result};

use crate::config::RuntimeConfig;

/// Work executed on the render context.
pub type RenderJob = Box<dyn FnOnce() + Send + 'static>;

/// Executes [`RenderJob`]s in order, off the control context.
pub trait RenderContext: Send + Sync {
    /// Queue `job` without waiting for it.
    fn dispatch(&self, job: RenderJob) -> Result<()>;

    /// Run `job` and block until it has completed.
    ///
    /// Runs inline when the caller is already on this render context.
    fn dispatch_sync(&self, job: RenderJob) -> Result<()>;
}

thread_local! {
    static RENDER_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Whether the current thread is executing on a render context.
#[must_use]
pub fn on_render_context() -> bool {
    RENDER_DEPTH.with(|depth| depth.get() > 0)
}

/// Marks the current thread as on the render context until dropped.
struct RenderScope;

impl RenderScope {
    fn enter() -> Self {
        RENDER_DEPTH.with(|depth| depth.set(depth.get() + 1));
        Self
    }
}

impl Drop for RenderScope {
    fn drop(&mut self) {
        RENDER_DEPTH.with(|depth| depth.set(depth.get().saturating_sub(1)));
    }
}

fn run_scoped(job: RenderJob) {
    let _scope = RenderScope::enter();
    job();
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// RenderThread
// ---------------------------------------------------------------------------

/// Capacity of the panic report channel.
const PANIC_CHANNEL_CAPACITY: usize = 8;

/// Messages sent from the control context to the render thread.
enum RenderMsg {
    Run(RenderJob),
    /// Run, then acknowledge on the paired channel.
    RunSync(RenderJob, mpsc::SyncSender<()>),
    /// Finish queued jobs, then exit.
    Shutdown,
}

/// The render thread's receiving side, reachable from jobs running on it.
struct Inbox {
    rx: mpsc::Receiver<RenderMsg>,
    backlog: VecDeque<RenderMsg>,
}

impl Inbox {
    fn next(&mut self) -> Option<RenderMsg> {
        match self.backlog.pop_front() {
            Some(msg) => Some(msg),
            None => self.rx.recv().ok(),
        }
    }

    fn try_next(&mut self) -> Option<RenderMsg> {
        match self.backlog.pop_front() {
            Some(msg) => Some(msg),
            None => self.rx.try_recv().ok(),
        }
    }

    /// Queue `msg` behind everything already sent on the channel.
    fn push(&mut self, msg: RenderMsg) {
        while let Ok(earlier) = self.rx.try_recv() {
            self.backlog.push_back(earlier);
        }
        self.backlog.push_back(msg);
    }
}

thread_local! {
    static INBOX: RefCell<Option<Inbox>> = const { RefCell::new(None) };
}

/// Queue `msg` on the render thread that is running the caller.
fn push_local(msg: RenderMsg) -> Result<()> {
    INBOX.with(|inbox| match inbox.borrow_mut().as_mut() {
        Some(inbox) => {
            inbox.push(msg);
            Ok(())
        }
        None => Err(Error::RenderContextClosed),
    })
}

/// Handle to a running render thread.
///
/// The thread is the only place jobs run, so mapper computations never race
/// each other and sink calls never interleave.
pub struct RenderThread {
    sender: mpsc::SyncSender<RenderMsg>,
    handle: Option<JoinHandle<()>>,
    thread: ThreadId,
    panic_rx: Mutex<mpsc::Receiver<String>>,
}

impl std::fmt::Debug for RenderThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderThread")
            .field("thread", &self.thread)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl RenderThread {
    /// Spawn the render thread using the name and queue capacity in `config`.
    pub fn start(config: &RuntimeConfig) -> Self {
        let (tx, rx) = mpsc::sync_channel::<RenderMsg>(config.channel_capacity);
        let (panic_tx, panic_rx) = mpsc::sync_channel::<String>(PANIC_CHANNEL_CAPACITY);

        let handle = thread::Builder::new()
            .name(config.render_thread_name.clone())
            .spawn(move || {
                let _scope = RenderScope::enter();
                render_loop(rx, panic_tx);
            })
            .expect("failed to spawn render thread");
        let thread = handle.thread().id();

        Self {
            sender: tx,
            handle: Some(handle),
            thread,
            panic_rx: Mutex::new(panic_rx),
        }
    }

    fn is_current(&self) -> bool {
        thread::current().id() == self.thread
    }

    /// Poll for a panic message reported by a job. Non-blocking.
    pub fn check_panic(&self) -> Option<String> {
        lock(&self.panic_rx).try_recv().ok()
    }

    /// Run every queued job, then join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if self.is_current() {
            let _ = push_local(RenderMsg::Shutdown);
        } else {
            let _ = self.sender.send(RenderMsg::Shutdown);
        }
        if let Some(handle) = self.handle.take() {
            // Joining from the render thread itself would never return.
            if !self.is_current() {
                let _ = handle.join();
            }
        }
    }
}

impl RenderContext for RenderThread {
    fn dispatch(&self, job: RenderJob) -> Result<()> {
        if self.is_current() {
            return push_local(RenderMsg::Run(job));
        }
        self.sender
            .send(RenderMsg::Run(job))
            .map_err(|_| Error::RenderContextClosed)
    }

    fn dispatch_sync(&self, job: RenderJob) -> Result<()> {
        if self.is_current() {
            job();
            return Ok(());
        }
        let (ack_tx, ack_rx) = mpsc::sync_channel(1);
        self.sender
            .send(RenderMsg::RunSync(job, ack_tx))
            .map_err(|_| Error::RenderContextClosed)?;
        ack_rx.recv().map_err(|_| Error::RenderContextClosed)
    }
}

impl Drop for RenderThread {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The render thread's main loop: run jobs in arrival order until shutdown.
fn render_loop(rx: mpsc::Receiver<RenderMsg>, panic_tx: mpsc::SyncSender<String>) {
    INBOX.with(|inbox| {
        *inbox.borrow_mut() = Some(Inbox {
            rx,
            backlog: VecDeque::new(),
        });
    });
    // The borrow ends before the message is handled, so jobs can push.
    while let Some(msg) = INBOX.with(|inbox| inbox.borrow_mut().as_mut().and_then(Inbox::next)) {
        if let RenderMsg::Shutdown = msg {
            // Drain what was queued before the shutdown request.
            while let Some(msg) =
                INBOX.with(|inbox| inbox.borrow_mut().as_mut().and_then(Inbox::try_next))
            {
                handle_msg(msg, &panic_tx);
            }
            tracing::debug!("render thread shutting down");
            break;
        }
        handle_msg(msg, &panic_tx);
    }
    INBOX.with(|inbox| inbox.borrow_mut().take());
}

fn handle_msg(msg: RenderMsg, panic_tx: &mpsc::SyncSender<String>) {
    match msg {
        RenderMsg::Run(job) => run_guarded(job, panic_tx),
        RenderMsg::RunSync(job, ack) => {
            run_guarded(job, panic_tx);
            let _ = ack.send(());
        }
        RenderMsg::Shutdown => {}
    }
}

fn run_guarded(job: RenderJob, panic_tx: &mpsc::SyncSender<String>) {
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
        let message = panic_message(payload.as_ref());
        tracing::error!(%message, "render job panicked");
        let _ = panic_tx.try_send(message);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("<non-string panic payload>")
    }
}

// ---------------------------------------------------------------------------
// ImmediateContext
// ---------------------------------------------------------------------------

/// Runs every job inline, on the dispatching thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateContext;

impl RenderContext for ImmediateContext {
    fn dispatch(&self, job: RenderJob) -> Result<()> {
        run_scoped(job);
        Ok(())
    }

    fn dispatch_sync(&self, job: RenderJob) -> Result<()> {
        run_scoped(job);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ManualContext
// ---------------------------------------------------------------------------

/// Queues jobs until the owner pumps them with [`run_pending`](Self::run_pending).
///
/// `dispatch_sync` first runs everything queued ahead of it, preserving FIFO
/// order.
#[derive(Default)]
pub struct ManualContext {
    queue: Mutex<VecDeque<RenderJob>>,
}

impl std::fmt::Debug for ManualContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualContext")
            .field("pending", &self.pending())
            .finish()
    }
}

impl ManualContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued jobs.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.queue).len()
    }

    /// Run queued jobs, including any queued while running, until empty.
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Release the queue lock before running so jobs can dispatch.
            let next = lock(&self.queue).pop_front();
            match next {
                Some(job) => {
                    run_scoped(job);
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl RenderContext for ManualContext {
    fn dispatch(&self, job: RenderJob) -> Result<()> {
        lock(&self.queue).push_back(job);
        Ok(())
    }

    fn dispatch_sync(&self, job: RenderJob) -> Result<()> {
        self.run_pending();
        run_scoped(job);
        Ok(())
    }
}
