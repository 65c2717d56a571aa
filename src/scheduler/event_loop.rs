use std::{
  num::NonZeroUsize,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  },
  thread,
};

use once_cell::sync::OnceCell;
use tracing::trace;

use super::{clock_now, Duration, RunLoop, Scheduler, Worker};
use crate::{error::RxError, subscription::Subscription};

struct Inner {
  loops: Vec<RunLoop>,
  next: AtomicUsize,
}

/// A pool of [`RunLoop`] threads. Each new worker is bound to one loop,
/// picked round-robin, and keeps it for its whole lifetime.
#[derive(Clone)]
pub struct EventLoop(Arc<Inner>);

/// Configures an [`EventLoop`].
#[derive(Clone, Debug)]
pub struct EventLoopBuilder {
  threads: usize,
  name: String,
}

impl Default for EventLoopBuilder {
  fn default() -> Self {
    let threads = thread::available_parallelism().map_or(1, NonZeroUsize::get);
    EventLoopBuilder { threads, name: "rx-event-loop".to_owned() }
  }
}

impl EventLoopBuilder {
  /// Number of run-loop threads. Defaults to the available parallelism.
  pub fn threads(mut self, threads: usize) -> Self {
    self.threads = threads;
    self
  }

  /// Thread name prefix, each thread gets `{name}-{index}`.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn build(self) -> Result<EventLoop, RxError> {
    if self.threads == 0 {
      return Err(RxError::NoThreads);
    }
    let loops = (0..self.threads)
      .map(|idx| RunLoop::spawn(format!("{}-{idx}", self.name)))
      .collect::<Result<Vec<_>, _>>()?;
    Ok(EventLoop(Arc::new(Inner { loops, next: AtomicUsize::new(0) })))
  }
}

static GLOBAL: OnceCell<EventLoop> = OnceCell::new();

impl EventLoop {
  pub fn builder() -> EventLoopBuilder { EventLoopBuilder::default() }

  pub fn new(threads: usize) -> Result<Self, RxError> { Self::builder().threads(threads).build() }

  /// The process-wide event loop, started on first use with the default
  /// configuration.
  pub fn global() -> Result<Self, RxError> {
    GLOBAL
      .get_or_try_init(|| Self::builder().build())
      .cloned()
  }

  pub fn threads(&self) -> usize { self.0.loops.len() }
}

impl Scheduler for EventLoop {
  fn now(&self) -> Duration { clock_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    let idx = self.0.next.fetch_add(1, Ordering::Relaxed) % self.0.loops.len();
    let run_loop = &self.0.loops[idx];
    trace!(run_loop = run_loop.name(), "worker created");
    run_loop.worker(lifetime)
  }
}
