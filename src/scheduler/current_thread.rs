use std::{cell::RefCell, sync::Arc, thread};

use super::{clock_now, Duration, ScheduledTask, Scheduler, TaskQueue, TimedQueue, Worker};
use crate::subscription::Subscription;

thread_local! {
  // Present while a drain loop owns the calling thread.
  static TRAMPOLINE: RefCell<Option<TimedQueue>> = const { RefCell::new(None) };
}

/// Trampolining scheduler bound to the calling thread.
///
/// The first task scheduled on a thread becomes the owner of a drain loop
/// and runs immediately. Work scheduled while that loop runs, from any
/// task, is queued and executed in due order before the outermost
/// `schedule` returns. Recursive producers therefore run iteratively.
#[derive(Clone, Copy, Debug, Default)]
pub struct CurrentThread;

impl CurrentThread {
  /// Whether a drain loop is already running on this thread.
  pub fn is_draining() -> bool { TRAMPOLINE.with(|t| t.borrow().is_some()) }
}

struct CurrentThreadQueue;

impl TaskQueue for CurrentThreadQueue {
  fn now(&self) -> Duration { clock_now() }

  fn enqueue(&self, delay: Duration, task: ScheduledTask) {
    let due = clock_now() + delay;
    let owner = TRAMPOLINE.with(|cell| {
      let mut slot = cell.borrow_mut();
      let owner = slot.is_none();
      slot.get_or_insert_with(TimedQueue::default).push(due, task);
      owner
    });
    if owner {
      drain();
    }
  }
}

// Removes the queue when the loop exits, also on unwind.
struct ResetOnExit;

impl Drop for ResetOnExit {
  fn drop(&mut self) {
    let rest = TRAMPOLINE.with(|cell| cell.borrow_mut().take());
    drop(rest);
  }
}

fn drain() {
  let _reset = ResetOnExit;
  while let Some(entry) =
    TRAMPOLINE.with(|cell| cell.borrow_mut().as_mut().and_then(|q| q.pop_due(None)))
  {
    if entry.task.is_cancelled() {
      continue;
    }
    let now = clock_now();
    if entry.due > now {
      thread::sleep(entry.due - now);
    }
    let mut task = entry.task;
    if let Some(delay) = task.step() {
      let due = clock_now() + delay;
      TRAMPOLINE.with(|cell| {
        if let Some(queue) = cell.borrow_mut().as_mut() {
          queue.push(due, task);
        }
      });
    }
  }
}

impl Scheduler for CurrentThread {
  fn now(&self) -> Duration { clock_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    Worker::new(Arc::new(CurrentThreadQueue), lifetime)
  }
}

#[cfg(test)]
mod test {
  use parking_lot::Mutex;

  use super::*;
  use crate::scheduler::TaskState;

  #[rxcore_macro::test]
  fn nested_schedule_is_queued_not_nested() {
    let worker = CurrentThread.create_worker(Subscription::new());
    let log = Arc::new(Mutex::new(vec![]));
    let (l, w) = (log.clone(), worker.clone());
    assert!(!CurrentThread::is_draining());
    worker.schedule_once(move || {
      assert!(CurrentThread::is_draining());
      l.lock().push("outer start");
      let inner = l.clone();
      w.schedule_once(move || inner.lock().push("inner"));
      l.lock().push("outer end");
    });
    assert_eq!(*log.lock(), vec!["outer start", "outer end", "inner"]);
    assert!(!CurrentThread::is_draining());
  }

  #[rxcore_macro::test]
  fn deep_recursion_does_not_grow_the_stack() {
    fn countdown(worker: Worker, left: Arc<Mutex<u32>>) {
      let w = worker.clone();
      worker.schedule_once(move || {
        let remaining = {
          let mut left = left.lock();
          *left -= 1;
          *left
        };
        if remaining > 0 {
          countdown(w, left);
        }
      });
    }
    let left = Arc::new(Mutex::new(100_000));
    countdown(CurrentThread.create_worker(Subscription::new()), left.clone());
    assert_eq!(*left.lock(), 0);
  }

  #[rxcore_macro::test]
  fn yielding_tasks_interleave() {
    let worker = CurrentThread.create_worker(Subscription::new());
    let log = Arc::new(Mutex::new(vec![]));
    let (l, w) = (log.clone(), worker.clone());
    worker.schedule_once(move || {
      for name in ["a", "b"] {
        let l = l.clone();
        let mut n = 0;
        w.schedule(move || {
          n += 1;
          l.lock().push(format!("{name}{n}"));
          if n < 2 { TaskState::Yield } else { TaskState::Finished }
        });
      }
    });
    assert_eq!(*log.lock(), vec!["a1", "b1", "a2", "b2"]);
  }

  #[rxcore_macro::test]
  fn disposed_worker_work_is_skipped() {
    let lifetime = Subscription::new();
    let worker = CurrentThread.create_worker(lifetime.clone());
    let log = Arc::new(Mutex::new(vec![]));
    let (l, w) = (log.clone(), worker.clone());
    worker.schedule_once(move || {
      let inner = l.clone();
      w.schedule_once(move || inner.lock().push("dropped"));
      w.lifetime().dispose();
      l.lock().push("ran");
    });
    assert_eq!(*log.lock(), vec!["ran"]);
  }

  #[rxcore_macro::test]
  fn cancelled_delayed_task_does_not_block() {
    let worker = CurrentThread.create_worker(Subscription::new());
    let w = worker.clone();
    let start = clock_now();
    worker.schedule_once(move || {
      let delayed = CurrentThread.create_worker(Subscription::new());
      delayed.schedule_once_after(Duration::from_secs(2), || unreachable!());
      delayed.lifetime().dispose();
      w.schedule_once_after(Duration::from_millis(5), || {});
    });
    let elapsed = clock_now() - start;
    assert!(elapsed >= Duration::from_millis(5));
    assert!(elapsed < Duration::from_secs(1));
  }
}
