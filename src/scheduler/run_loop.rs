use std::{
  sync::Arc,
  thread::{self, JoinHandle},
};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use super::{clock_now, Duration, ScheduledTask, TaskQueue, TimedQueue, Worker};
use crate::{error::RxError, subscription::Subscription};

#[derive(Default)]
struct RunLoopState {
  queue: TimedQueue,
  stopped: bool,
}

struct Shared {
  name: String,
  state: Mutex<RunLoopState>,
  wake: Condvar,
}

impl Shared {
  fn purge_cancelled(&self) {
    let cancelled = self.state.lock().queue.take_cancelled();
    drop(cancelled);
  }
}

impl TaskQueue for Shared {
  fn now(&self) -> Duration { clock_now() }

  fn enqueue(&self, delay: Duration, task: ScheduledTask) {
    let mut state = self.state.lock();
    if state.stopped {
      drop(state);
      warn!(run_loop = %self.name, "run loop stopped, task dropped");
      return;
    }
    state.queue.push(clock_now() + delay, task);
    self.wake.notify_one();
  }
}

/// One dedicated thread executing tasks in due order.
///
/// Dropping the `RunLoop` stops the thread after the task it is running, and
/// drops whatever is still queued.
pub struct RunLoop {
  shared: Arc<Shared>,
  thread: Option<JoinHandle<()>>,
}

impl RunLoop {
  pub fn spawn(name: impl Into<String>) -> Result<Self, RxError> {
    let name = name.into();
    let shared = Arc::new(Shared {
      name: name.clone(),
      state: Mutex::new(RunLoopState::default()),
      wake: Condvar::new(),
    });
    let c_shared = shared.clone();
    let thread = thread::Builder::new()
      .name(name.clone())
      .spawn(move || run(c_shared))
      .map_err(|source| RxError::SpawnThread { name, source })?;
    Ok(RunLoop { shared, thread: Some(thread) })
  }

  pub fn name(&self) -> &str { &self.shared.name }

  /// Creates a worker running on this loop. Its queued tasks are removed as
  /// soon as `lifetime` is disposed.
  pub fn worker(&self, lifetime: Subscription) -> Worker {
    let shared = Arc::downgrade(&self.shared);
    lifetime.add(move || {
      if let Some(shared) = shared.upgrade() {
        shared.purge_cancelled();
      }
    });
    Worker::new(self.shared.clone(), lifetime)
  }

  pub fn pending_count(&self) -> usize { self.shared.state.lock().queue.len() }
}

impl Drop for RunLoop {
  fn drop(&mut self) {
    self.shared.state.lock().stopped = true;
    self.shared.wake.notify_all();
    if let Some(handle) = self.thread.take() {
      // A task may own the last handle to its own loop
      if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
      }
    }
    let rest = std::mem::take(&mut self.shared.state.lock().queue);
    drop(rest);
  }
}

fn run(shared: Arc<Shared>) {
  debug!(run_loop = %shared.name, "run loop started");
  loop {
    let entry = {
      let mut state = shared.state.lock();
      loop {
        if state.stopped {
          debug!(run_loop = %shared.name, "run loop stopped");
          return;
        }
        let now = clock_now();
        if let Some(entry) = state.queue.pop_due(Some(now)) {
          break entry;
        }
        match state.queue.next_due() {
          Some(due) => {
            shared.wake.wait_for(&mut state, due - now);
          }
          None => shared.wake.wait(&mut state),
        }
      }
    };

    let mut task = entry.task;
    if let Some(delay) = task.step() {
      let mut state = shared.state.lock();
      if !state.stopped {
        state.queue.push(clock_now() + delay, task);
      }
    }
  }
}
