//! Execution contexts.
//!
//! A [`Scheduler`] decides *where* work runs and hands out [`Worker`]s. A
//! worker executes its tasks one at a time, in due order. Tasks are plain
//! state machines: every run returns a [`TaskState`] telling the worker
//! whether the task is done or wants to run again. Continuing a loop is a
//! queue push, never a nested call, so a logically recursive producer does
//! not grow the stack. [`Immediate`] is the exception: it runs everything
//! inline on the calling thread.
//!
//! | Scheduler         | Runs tasks on                          |
//! |-------------------|----------------------------------------|
//! | [`Immediate`]     | the calling thread, inline             |
//! | [`CurrentThread`] | the calling thread, trampolined        |
//! | [`EventLoop`]     | a pool of dedicated run-loop threads   |
//! | [`TestScheduler`] | whoever advances its virtual clock     |
//!
//! Every worker is bound to a lifetime [`Subscription`]. Once it is disposed,
//! queued tasks are dropped and a running task is not rescheduled.

use std::{cmp::Ordering, collections::BinaryHeap, sync::Arc, time::Instant};

use once_cell::sync::Lazy;

pub use std::time::Duration;

use crate::subscription::Subscription;

mod current_thread;
#[cfg(feature = "event-loop")]
mod event_loop;
mod immediate;
#[cfg(feature = "event-loop")]
mod run_loop;
pub mod test_scheduler;

pub use current_thread::CurrentThread;
#[cfg(feature = "event-loop")]
pub use event_loop::{EventLoop, EventLoopBuilder};
pub use immediate::Immediate;
#[cfg(feature = "event-loop")]
pub use run_loop::RunLoop;
pub use test_scheduler::{ticks, TestScheduler};

// ==================== Task Model ====================

/// What a task asks of its worker after one run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
  /// Done, drop the task.
  Finished,
  /// Run again once the work that is already due has run.
  Yield,
  /// Run again after the given delay.
  Sleeping(Duration),
}

/// A unit of work. Called once per step until it returns
/// [`TaskState::Finished`].
pub type Task = Box<dyn FnMut() -> TaskState + Send>;

/// A task together with the lifetime of the worker that owns it.
pub struct ScheduledTask {
  task: Task,
  lifetime: Subscription,
}

impl ScheduledTask {
  pub fn new(task: Task, lifetime: Subscription) -> Self { ScheduledTask { task, lifetime } }

  #[inline]
  pub fn is_cancelled(&self) -> bool { self.lifetime.is_disposed() }

  /// Runs one step. Returns the delay after which the task must run again,
  /// or `None` when it is finished or its lifetime has been disposed.
  pub fn step(&mut self) -> Option<Duration> {
    if self.is_cancelled() {
      return None;
    }
    let delay = match (self.task)() {
      TaskState::Finished => return None,
      TaskState::Yield => Duration::ZERO,
      TaskState::Sleeping(delay) => delay,
    };
    (!self.is_cancelled()).then_some(delay)
  }
}

/// The queue behind a [`Worker`]. Implemented by each scheduler.
pub trait TaskQueue: Send + Sync {
  fn now(&self) -> Duration;

  /// Queues `task` to run once `delay` has elapsed.
  fn enqueue(&self, delay: Duration, task: ScheduledTask);
}

// ==================== Worker ====================

/// Handle used to schedule work on one serialized lane of a scheduler.
#[derive(Clone)]
pub struct Worker {
  queue: Arc<dyn TaskQueue>,
  lifetime: Subscription,
}

impl Worker {
  pub fn new(queue: Arc<dyn TaskQueue>, lifetime: Subscription) -> Self { Worker { queue, lifetime } }

  #[inline]
  pub fn now(&self) -> Duration { self.queue.now() }

  #[inline]
  pub fn lifetime(&self) -> &Subscription { &self.lifetime }

  #[inline]
  pub fn is_disposed(&self) -> bool { self.lifetime.is_disposed() }

  pub fn schedule(&self, task: impl FnMut() -> TaskState + Send + 'static) {
    self.schedule_after(Duration::ZERO, task)
  }

  pub fn schedule_after(&self, delay: Duration, task: impl FnMut() -> TaskState + Send + 'static) {
    if self.is_disposed() {
      return;
    }
    let task = ScheduledTask::new(Box::new(task), self.lifetime.clone());
    self.queue.enqueue(delay, task);
  }

  /// Schedules a task that runs once.
  pub fn schedule_once(&self, f: impl FnOnce() + Send + 'static) {
    self.schedule_once_after(Duration::ZERO, f)
  }

  pub fn schedule_once_after(&self, delay: Duration, f: impl FnOnce() + Send + 'static) {
    let mut f = Some(f);
    self.schedule_after(delay, move || {
      if let Some(f) = f.take() {
        f();
      }
      TaskState::Finished
    })
  }
}

// ==================== Scheduler ====================

/// A Scheduler is an object to order task and schedule their execution.
pub trait Scheduler: Clone + Send + Sync + 'static {
  /// Elapsed time on this scheduler's clock.
  fn now(&self) -> Duration;

  /// Creates a worker whose queued work lives as long as `lifetime`.
  fn create_worker(&self, lifetime: Subscription) -> Worker;
}

static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);

/// Wall clock shared by the real schedulers.
pub(crate) fn clock_now() -> Duration { EPOCH.elapsed() }

// ==================== Due-time Queue ====================

pub(crate) struct TimedEntry {
  pub(crate) due: Duration,
  seq: u64,
  pub(crate) task: ScheduledTask,
}

impl PartialEq for TimedEntry {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for TimedEntry {}

impl PartialOrd for TimedEntry {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl Ord for TimedEntry {
  fn cmp(&self, other: &Self) -> Ordering {
    // Min-heap: earlier times first, then FIFO by seq
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

/// Tasks ordered by due time, FIFO among equal due times.
#[derive(Default)]
pub(crate) struct TimedQueue {
  heap: BinaryHeap<TimedEntry>,
  next_seq: u64,
}

impl TimedQueue {
  pub(crate) fn push(&mut self, due: Duration, task: ScheduledTask) {
    let seq = self.next_seq;
    self.next_seq += 1;
    self.heap.push(TimedEntry { due, seq, task });
  }

  /// Pops the earliest entry if it is due at or before `limit`; any entry
  /// when `limit` is `None`.
  pub(crate) fn pop_due(&mut self, limit: Option<Duration>) -> Option<TimedEntry> {
    let due = self.heap.peek()?.due;
    if limit.is_some_and(|limit| due > limit) {
      return None;
    }
    self.heap.pop()
  }

  pub(crate) fn next_due(&self) -> Option<Duration> { self.heap.peek().map(|e| e.due) }

  /// Removes the entries whose lifetime has been disposed. They are handed
  /// back so the caller can drop them outside its lock.
  pub(crate) fn take_cancelled(&mut self) -> Vec<TimedEntry> {
    let (cancelled, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.heap)
      .into_vec()
      .into_iter()
      .partition(|e| e.task.is_cancelled());
    self.heap = live.into();
    cancelled
  }

  pub(crate) fn len(&self) -> usize { self.heap.len() }
}
