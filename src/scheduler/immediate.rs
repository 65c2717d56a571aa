use std::{sync::Arc, thread};

use super::{clock_now, Duration, ScheduledTask, Scheduler, TaskQueue, Worker};
use crate::subscription::Subscription;

/// Runs every task inline, on the thread that schedules it.
///
/// A delay blocks the calling thread. A yielding task runs again right away,
/// so `schedule` only returns once the task has finished or its worker was
/// disposed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

struct ImmediateQueue;

impl TaskQueue for ImmediateQueue {
  fn now(&self) -> Duration { clock_now() }

  fn enqueue(&self, delay: Duration, mut task: ScheduledTask) {
    let mut delay = delay;
    loop {
      if !delay.is_zero() {
        thread::sleep(delay);
      }
      match task.step() {
        Some(next) => delay = next,
        None => break,
      }
    }
  }
}

impl Scheduler for Immediate {
  fn now(&self) -> Duration { clock_now() }

  fn create_worker(&self, lifetime: Subscription) -> Worker {
    Worker::new(Arc::new(ImmediateQueue), lifetime)
  }
}
