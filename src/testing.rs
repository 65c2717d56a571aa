//! Virtual-time test helpers.
//!
//! [`ColdObservable`] replays a script of [`Recorded`] signals relative to
//! each subscription and logs when it was subscribed and disposed.
//! [`TestObserver`] records what it receives together with the virtual time.
//! [`TestScheduler::start`] wires both into the usual harness: the
//! observable is created at tick 100, subscribed at 200 and disposed at
//! 1000.
//!
//! ```rust
//! use rxcore::{prelude::*, testing::*};
//!
//! let scheduler = TestScheduler::new();
//! let xs = scheduler.cold_observable::<i32, ()>(vec![on_next(10, 1), on_completed(20)]);
//! let c_xs = xs.clone();
//!
//! let res = scheduler.start(move || c_xs);
//!
//! assert_eq!(res.messages(), vec![on_next(210, 1), on_completed(220)]);
//! assert_eq!(xs.subscriptions(), vec![subscribed(200, 220)]);
//! ```

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  observable::{Observable, ObservableExt},
  observer::{Notification, Observer},
  scheduler::{ticks, Scheduler, TestScheduler},
  subscriber::Subscriber,
  subscription::Subscription,
};

pub const CREATED: u64 = 100;
pub const SUBSCRIBED: u64 = 200;
pub const DISPOSED: u64 = 1000;

/// Marks a subscription that was never disposed.
pub const NEVER: u64 = u64::MAX;

/// A signal stamped with the virtual time it happened at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recorded<Item, Err> {
  pub time: u64,
  pub value: Notification<Item, Err>,
}

pub fn on_next<Item, Err>(time: u64, value: Item) -> Recorded<Item, Err> {
  Recorded { time, value: Notification::Next(value) }
}

pub fn on_error<Item, Err>(time: u64, err: Err) -> Recorded<Item, Err> {
  Recorded { time, value: Notification::Error(err) }
}

pub fn on_completed<Item, Err>(time: u64) -> Recorded<Item, Err> {
  Recorded { time, value: Notification::Completed }
}

/// Virtual times at which a subscription started and ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubscriptionLog {
  pub subscribe: u64,
  pub unsubscribe: u64,
}

pub fn subscribed(subscribe: u64, unsubscribe: u64) -> SubscriptionLog {
  SubscriptionLog { subscribe, unsubscribe }
}

// ==================== ColdObservable ====================

/// Replays its script for every subscriber, offsets counted from the time of
/// subscription.
pub struct ColdObservable<Item, Err> {
  scheduler: TestScheduler,
  messages: Arc<Vec<Recorded<Item, Err>>>,
  logs: Arc<Mutex<Vec<SubscriptionLog>>>,
}

impl<Item, Err> Clone for ColdObservable<Item, Err> {
  fn clone(&self) -> Self {
    ColdObservable {
      scheduler: self.scheduler.clone(),
      messages: self.messages.clone(),
      logs: self.logs.clone(),
    }
  }
}

impl<Item, Err> ColdObservable<Item, Err> {
  pub fn subscriptions(&self) -> Vec<SubscriptionLog> { self.logs.lock().clone() }
}

impl<Item, Err> Observable for ColdObservable<Item, Err>
where
  Item: Clone + Send + Sync + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    let index = {
      let mut logs = self.logs.lock();
      logs.push(subscribed(self.scheduler.now_ticks(), NEVER));
      logs.len() - 1
    };
    let (logs, scheduler) = (self.logs.clone(), self.scheduler.clone());
    subscriber.subscription().add(move || {
      logs.lock()[index].unsubscribe = scheduler.now_ticks();
    });

    let worker = self.scheduler.create_worker(subscriber.subscription().clone());
    let subscriber = Arc::new(Mutex::new(subscriber));
    for message in self.messages.iter() {
      let subscriber = subscriber.clone();
      let value = message.value.clone();
      worker.schedule_once_after(ticks(message.time), move || value.accept(&mut *subscriber.lock()));
    }
  }
}

// ==================== TestObserver ====================

/// Records every signal with the virtual time it arrived at. Clones share
/// the record.
pub struct TestObserver<Item, Err> {
  scheduler: TestScheduler,
  messages: Arc<Mutex<Vec<Recorded<Item, Err>>>>,
}

impl<Item, Err> Clone for TestObserver<Item, Err> {
  fn clone(&self) -> Self {
    TestObserver { scheduler: self.scheduler.clone(), messages: self.messages.clone() }
  }
}

impl<Item: Clone, Err: Clone> TestObserver<Item, Err> {
  pub fn messages(&self) -> Vec<Recorded<Item, Err>> { self.messages.lock().clone() }
}

impl<Item, Err> TestObserver<Item, Err> {
  fn record(&self, value: Notification<Item, Err>) {
    let time = self.scheduler.now_ticks();
    self.messages.lock().push(Recorded { time, value });
  }
}

impl<Item, Err> Observer<Item, Err> for TestObserver<Item, Err> {
  fn next(&mut self, value: Item) { self.record(Notification::Next(value)); }

  fn error(&mut self, err: Err) { self.record(Notification::Error(err)); }

  fn complete(&mut self) { self.record(Notification::Completed); }
}

// ==================== Harness ====================

impl TestScheduler {
  pub fn cold_observable<Item, Err>(&self, messages: Vec<Recorded<Item, Err>>) -> ColdObservable<Item, Err> {
    ColdObservable { scheduler: self.clone(), messages: Arc::new(messages), logs: Arc::default() }
  }

  pub fn create_observer<Item, Err>(&self) -> TestObserver<Item, Err> {
    TestObserver { scheduler: self.clone(), messages: Arc::default() }
  }

  /// Runs the standard harness, see [`start_with`](TestScheduler::start_with).
  pub fn start<S, F>(&self, create: F) -> TestObserver<S::Item, S::Err>
  where
    S: Observable,
    F: FnOnce() -> S + Send + 'static,
  {
    self.start_with(CREATED, SUBSCRIBED, DISPOSED, create)
  }

  /// Calls `create` at tick `created`, subscribes a [`TestObserver`] to the
  /// result at `subscribed`, disposes that subscription at `disposed`, then
  /// runs the scheduler until nothing is left.
  pub fn start_with<S, F>(
    &self, created: u64, subscribed: u64, disposed: u64, create: F,
  ) -> TestObserver<S::Item, S::Err>
  where
    S: Observable,
    F: FnOnce() -> S + Send + 'static,
  {
    let observer = self.create_observer();
    let source = Arc::new(Mutex::new(None));
    let subscription = Subscription::new();

    let c_source = source.clone();
    self.schedule_at(created, move || *c_source.lock() = Some(create()));

    let (c_source, c_observer, c_subscription) = (source, observer.clone(), subscription.clone());
    self.schedule_at(subscribed, move || {
      let source = c_source.lock().clone();
      if let Some(source) = source {
        source.subscribe_with(c_observer, c_subscription);
      }
    });

    self.schedule_at(disposed, move || subscription.dispose());

    self.flush();
    observer
  }
}
