//! Test Scheduler for deterministic testing.
//!
//! Provides virtual time that only advances when explicitly instructed. Tasks
//! execute synchronously, on the thread that advances the clock, in order of
//! their due time and FIFO among tasks due at the same time.
//!
//! Every `TestScheduler` value owns an independent clock and queue; clones
//! share them. One tick is one virtual millisecond, see [`ticks`].
//!
//! ```rust
//! use rxcore::scheduler::{ticks, Scheduler, TaskState, TestScheduler};
//! use rxcore::subscription::Subscription;
//!
//! let scheduler = TestScheduler::new();
//! let worker = scheduler.create_worker(Subscription::new());
//! worker.schedule_after(ticks(100), || TaskState::Finished);
//!
//! scheduler.advance_by(ticks(100));
//! assert!(scheduler.is_empty());
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use super::{Duration, ScheduledTask, Scheduler, TaskQueue, TimedQueue, Worker};
use crate::subscription::Subscription;

/// Converts virtual ticks to the clock unit of [`TestScheduler`].
pub fn ticks(n: u64) -> Duration { Duration::from_millis(n) }

#[derive(Default)]
struct TestState {
  virtual_time: Duration,
  queue: TimedQueue,
}

#[derive(Default)]
struct TestQueue {
  state: Mutex<TestState>,
}

impl TestQueue {
  fn purge_cancelled(&self) {
    let cancelled = self.state.lock().queue.take_cancelled();
    drop(cancelled);
  }
}

impl TaskQueue for TestQueue {
  fn now(&self) -> Duration { self.state.lock().virtual_time }

  fn enqueue(&self, delay: Duration, task: ScheduledTask) {
    let mut state = self.state.lock();
    let due = state.virtual_time + delay;
    state.queue.push(due, task);
  }
}

// ==================== TestScheduler ====================

/// A virtual time scheduler for deterministic testing.
#[derive(Clone, Default)]
pub struct TestScheduler(Arc<TestQueue>);

impl TestScheduler {
  pub fn new() -> Self { Self::default() }

  /// Current virtual time in ticks.
  pub fn now_ticks(&self) -> u64 { self.now().as_millis() as u64 }

  /// Get the number of pending tasks in the queue.
  pub fn pending_count(&self) -> usize { self.0.state.lock().queue.len() }

  /// Check if there are no pending tasks.
  pub fn is_empty(&self) -> bool { self.pending_count() == 0 }

  /// Advance virtual time by the specified duration and execute due tasks.
  ///
  /// A task that yields or sleeps within the window runs again inside the
  /// same call. Tasks due later stay queued.
  pub fn advance_by(&self, duration: Duration) {
    let target = self.now() + duration;
    self.advance_to(target);
  }

  /// Executes every task due at or before `target`, then sets the clock to
  /// `target`. Moving the clock backwards is ignored.
  pub fn advance_to(&self, target: Duration) {
    self.execute_tasks_until(Some(target));
    let mut state = self.0.state.lock();
    if state.virtual_time < target {
      state.virtual_time = target;
    }
  }

  /// Execute all pending tasks by advancing time to each task's due time.
  ///
  /// Tasks that reschedule themselves keep running until they finish or
  /// their lifetime is disposed.
  pub fn flush(&self) { self.execute_tasks_until(None); }

  /// Runs `f` at the absolute virtual time `tick`, or right away on the
  /// next advance if that time has already passed.
  pub fn schedule_at(&self, tick: u64, f: impl FnOnce() + Send + 'static) {
    let delay = ticks(tick).saturating_sub(self.now());
    self
      .create_worker(Subscription::new())
      .schedule_once_after(delay, f);
  }

  fn execute_tasks_until(&self, limit: Option<Duration>) {
    loop {
      let entry = {
        let mut state = self.0.state.lock();
        let Some(entry) = state.queue.pop_due(limit) else {
          break;
        };
        if state.virtual_time < entry.due {
          state.virtual_time = entry.due;
        }
        entry
      };

      let mut task = entry.task;
      // Runs without the lock, tasks schedule more work
      if let Some(delay) = task.step() {
        let mut state = self.0.state.lock();
        let due = state.virtual_time + delay;
        state.queue.push(due, task);
      }
    }
  }
}

impl Scheduler for TestScheduler {
  fn now(&self) -> Duration { self.0.now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    let queue = Arc::downgrade(&self.0);
    lifetime.add(move || {
      if let Some(queue) = queue.upgrade() {
        queue.purge_cancelled();
      }
    });
    Worker::new(self.0.clone(), lifetime)
  }
}
