//! Coordinations decide where the signals of a stream run.
//!
//! A [`Coordination`] is a factory that an operator or source asks for a
//! [`Coordinator`] once per subscription. The coordinator provides the
//! [`Worker`] that producers schedule on, and adapts the downstream
//! subscriber through [`Coordinator::out`] so that calls into it happen in
//! the right place:
//!
//! - [`IdentityOneWorker`] passes signals straight through.
//! - [`ObserveOnOneWorker`] re-schedules every signal onto the worker.
//! - [`SerializeOneWorker`] delivers on the calling thread, one at a time.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
  error::RxError,
  observer::{BoxObserver, Observer},
  scheduler::{CurrentThread, Duration, Immediate, Scheduler, TestScheduler, Worker},
  subscriber::{SerializedSubscriber, Subscriber},
  subscription::Subscription,
};
#[cfg(feature = "event-loop")]
use crate::scheduler::EventLoop;

/// Factory of per-subscription [`Coordinator`]s.
pub trait Coordination: Clone + Send + Sync + 'static {
  type Coordinator: Coordinator;

  fn now(&self) -> Duration;

  /// Creates a coordinator whose worker lives as long as `lifetime`.
  fn create_coordinator(&self, lifetime: &Subscription) -> Self::Coordinator;
}

pub trait Coordinator: Send + 'static {
  /// The worker producers of this subscription schedule on.
  fn worker(&self) -> &Worker;

  /// Adapts the downstream subscriber. The returned subscriber's
  /// subscription is disposed with the downstream one.
  fn out<Item, Err, O>(&self, subscriber: Subscriber<O>) -> Subscriber<BoxObserver<Item, Err>>
  where
    Item: Send + 'static,
    Err: Send + 'static,
    O: Observer<Item, Err> + Send + 'static;
}

// ==================== Identity ====================

/// Signals are delivered wherever they are produced.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentityOneWorker<S> {
  scheduler: S,
}

impl<S> IdentityOneWorker<S> {
  pub fn new(scheduler: S) -> Self { IdentityOneWorker { scheduler } }
}

pub struct IdentityCoordinator {
  worker: Worker,
}

impl<S: Scheduler> Coordination for IdentityOneWorker<S> {
  type Coordinator = IdentityCoordinator;

  fn now(&self) -> Duration { self.scheduler.now() }

  fn create_coordinator(&self, lifetime: &Subscription) -> IdentityCoordinator {
    IdentityCoordinator { worker: self.scheduler.create_worker(lifetime.clone()) }
  }
}

impl Coordinator for IdentityCoordinator {
  fn worker(&self) -> &Worker { &self.worker }

  fn out<Item, Err, O>(&self, subscriber: Subscriber<O>) -> Subscriber<BoxObserver<Item, Err>>
  where
    Item: Send + 'static,
    Err: Send + 'static,
    O: Observer<Item, Err> + Send + 'static,
  {
    subscriber.map_observer(|o| Box::new(o) as BoxObserver<Item, Err>)
  }
}

// ==================== ObserveOn ====================

/// Every signal is queued onto the coordinator's worker, preserving order.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObserveOnOneWorker<S> {
  scheduler: S,
}

impl<S> ObserveOnOneWorker<S> {
  pub fn new(scheduler: S) -> Self { ObserveOnOneWorker { scheduler } }
}

pub struct ObserveOnCoordinator {
  worker: Worker,
}

impl<S: Scheduler> Coordination for ObserveOnOneWorker<S> {
  type Coordinator = ObserveOnCoordinator;

  fn now(&self) -> Duration { self.scheduler.now() }

  fn create_coordinator(&self, lifetime: &Subscription) -> ObserveOnCoordinator {
    ObserveOnCoordinator { worker: self.scheduler.create_worker(lifetime.clone()) }
  }
}

impl Coordinator for ObserveOnCoordinator {
  fn worker(&self) -> &Worker { &self.worker }

  fn out<Item, Err, O>(&self, subscriber: Subscriber<O>) -> Subscriber<BoxObserver<Item, Err>>
  where
    Item: Send + 'static,
    Err: Send + 'static,
    O: Observer<Item, Err> + Send + 'static,
  {
    // The proxy stops accepting signals at the first terminal one, while the
    // terminal signal itself still waits in the worker queue.
    let proxy = Subscription::new();
    subscriber.subscription().add_child(proxy.clone());
    let observer = ObserveOnObserver { dest: Arc::new(Mutex::new(subscriber)), worker: self.worker.clone() };
    Subscriber::new(Box::new(observer), proxy)
  }
}

struct ObserveOnObserver<O> {
  dest: Arc<Mutex<Subscriber<O>>>,
  worker: Worker,
}

impl<O> ObserveOnObserver<O> {
  fn forward(&self, f: impl FnOnce(&mut Subscriber<O>) + Send + 'static)
  where
    O: Send + 'static,
  {
    let dest = self.dest.clone();
    self.worker.schedule_once(move || f(&mut dest.lock()));
  }
}

impl<Item, Err, O> Observer<Item, Err> for ObserveOnObserver<O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err> + Send + 'static,
{
  fn next(&mut self, value: Item) { self.forward(move |dest| dest.next(value)); }

  fn error(&mut self, err: Err) { self.forward(move |dest| dest.error(err)); }

  fn complete(&mut self) { self.forward(|dest| dest.complete()); }
}

// ==================== Serialize ====================

/// Signals run on the producing thread, never two at once.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerializeOneWorker<S> {
  scheduler: S,
}

impl<S> SerializeOneWorker<S> {
  pub fn new(scheduler: S) -> Self { SerializeOneWorker { scheduler } }
}

pub struct SerializeCoordinator {
  worker: Worker,
}

impl<S: Scheduler> Coordination for SerializeOneWorker<S> {
  type Coordinator = SerializeCoordinator;

  fn now(&self) -> Duration { self.scheduler.now() }

  fn create_coordinator(&self, lifetime: &Subscription) -> SerializeCoordinator {
    SerializeCoordinator { worker: self.scheduler.create_worker(lifetime.clone()) }
  }
}

impl Coordinator for SerializeCoordinator {
  fn worker(&self) -> &Worker { &self.worker }

  fn out<Item, Err, O>(&self, subscriber: Subscriber<O>) -> Subscriber<BoxObserver<Item, Err>>
  where
    Item: Send + 'static,
    Err: Send + 'static,
    O: Observer<Item, Err> + Send + 'static,
  {
    let subscription = subscriber.subscription().clone();
    Subscriber::new(Box::new(SerializedSubscriber::new(subscriber)), subscription)
  }
}

// ==================== Factories ====================

pub fn identity_immediate() -> IdentityOneWorker<Immediate> { IdentityOneWorker::new(Immediate) }

/// The default for operators: trampolined on the subscribing thread.
pub fn identity_current_thread() -> IdentityOneWorker<CurrentThread> {
  IdentityOneWorker::new(CurrentThread)
}

pub fn identity_test(scheduler: &TestScheduler) -> IdentityOneWorker<TestScheduler> {
  IdentityOneWorker::new(scheduler.clone())
}

#[cfg(feature = "event-loop")]
pub fn observe_on_event_loop() -> Result<ObserveOnOneWorker<EventLoop>, RxError> {
  EventLoop::global().map(ObserveOnOneWorker::new)
}

#[cfg(feature = "event-loop")]
pub fn serialize_event_loop() -> Result<SerializeOneWorker<EventLoop>, RxError> {
  EventLoop::global().map(SerializeOneWorker::new)
}

// ==================== Runtime selection ====================

/// Coordination choices that can be picked at runtime, e.g. from
/// configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Schedulers {
  Immediate,
  #[default]
  CurrentThread,
  #[cfg(feature = "event-loop")]
  EventLoop,
  #[cfg(feature = "event-loop")]
  SerializedEventLoop,
}

impl Schedulers {
  pub fn coordination(self) -> Result<AnyCoordination, RxError> {
    Ok(match self {
      Schedulers::Immediate => AnyCoordination::Immediate(identity_immediate()),
      Schedulers::CurrentThread => AnyCoordination::CurrentThread(identity_current_thread()),
      #[cfg(feature = "event-loop")]
      Schedulers::EventLoop => AnyCoordination::EventLoop(observe_on_event_loop()?),
      #[cfg(feature = "event-loop")]
      Schedulers::SerializedEventLoop => {
        AnyCoordination::SerializedEventLoop(serialize_event_loop()?)
      }
    })
  }
}

#[derive(Clone)]
pub enum AnyCoordination {
  Immediate(IdentityOneWorker<Immediate>),
  CurrentThread(IdentityOneWorker<CurrentThread>),
  #[cfg(feature = "event-loop")]
  EventLoop(ObserveOnOneWorker<EventLoop>),
  #[cfg(feature = "event-loop")]
  SerializedEventLoop(SerializeOneWorker<EventLoop>),
}

pub enum AnyCoordinator {
  Identity(IdentityCoordinator),
  ObserveOn(ObserveOnCoordinator),
  Serialize(SerializeCoordinator),
}

impl Coordination for AnyCoordination {
  type Coordinator = AnyCoordinator;

  fn now(&self) -> Duration {
    match self {
      AnyCoordination::Immediate(c) => c.now(),
      AnyCoordination::CurrentThread(c) => c.now(),
      #[cfg(feature = "event-loop")]
      AnyCoordination::EventLoop(c) => c.now(),
      #[cfg(feature = "event-loop")]
      AnyCoordination::SerializedEventLoop(c) => c.now(),
    }
  }

  fn create_coordinator(&self, lifetime: &Subscription) -> AnyCoordinator {
    match self {
      AnyCoordination::Immediate(c) => AnyCoordinator::Identity(c.create_coordinator(lifetime)),
      AnyCoordination::CurrentThread(c) => AnyCoordinator::Identity(c.create_coordinator(lifetime)),
      #[cfg(feature = "event-loop")]
      AnyCoordination::EventLoop(c) => AnyCoordinator::ObserveOn(c.create_coordinator(lifetime)),
      #[cfg(feature = "event-loop")]
      AnyCoordination::SerializedEventLoop(c) => {
        AnyCoordinator::Serialize(c.create_coordinator(lifetime))
      }
    }
  }
}

impl Coordinator for AnyCoordinator {
  fn worker(&self) -> &Worker {
    match self {
      AnyCoordinator::Identity(c) => c.worker(),
      AnyCoordinator::ObserveOn(c) => c.worker(),
      AnyCoordinator::Serialize(c) => c.worker(),
    }
  }

  fn out<Item, Err, O>(&self, subscriber: Subscriber<O>) -> Subscriber<BoxObserver<Item, Err>>
  where
    Item: Send + 'static,
    Err: Send + 'static,
    O: Observer<Item, Err> + Send + 'static,
  {
    match self {
      AnyCoordinator::Identity(c) => c.out(subscriber),
      AnyCoordinator::ObserveOn(c) => c.out(subscriber),
      AnyCoordinator::Serialize(c) => c.out(subscriber),
    }
  }
}
