//! Observable trait and the subscribe entry points.
//!
//! An [`Observable`] is a description of a stream. Nothing happens until it
//! is subscribed; every subscription starts an independent run of the
//! producer. Operators are values too: they wrap their source and are
//! themselves `Observable`, so a pipeline is a plain nested struct.

use std::fmt::Debug;

use crate::{
  coordination::{identity_current_thread, Coordination, IdentityOneWorker},
  observer::{FnObserver, Observer},
  ops::{concat_map::ConcatMapOp, flat_map::FlatMapOp, observe_on::ObserveOnOp},
  scheduler::CurrentThread,
  selector::{WithErr, WithoutErr},
  subscriber::Subscriber,
  subscription::Subscription,
};

mod create;
mod iterate;
mod trivial;

pub use create::{create, Create};
pub use iterate::{from_iter, iterate, Iterate};
pub use trivial::{empty, never, throw_err, Empty, Never, Throw};

/// A source of values over time.
///
/// Implementations must honor the observer contract: zero or more `next`
/// signals, then at most one terminal signal, never two calls at once on the
/// same subscriber. [`Subscriber`] drops anything sent after a terminal
/// signal or after its subscription is disposed.
pub trait Observable: Clone + Send + Sync + 'static {
  type Item: Send + 'static;
  type Err: Send + 'static;

  /// Starts one run of the producer, delivering into `subscriber`.
  ///
  /// The producer should register its own teardown on
  /// `subscriber.subscription()` and stop once it is disposed.
  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static;
}

/// Subscribe methods and operators, available on every [`Observable`].
pub trait ObservableExt: Observable {
  /// Subscribes `observer` under `subscription` and returns it, so the
  /// caller can cancel the run or add it to a larger tree.
  fn subscribe_with<O>(&self, observer: O, subscription: Subscription) -> Subscription
  where
    O: Observer<Self::Item, Self::Err> + Send + 'static,
  {
    self.actual_subscribe(Subscriber::new(observer, subscription.clone()));
    subscription
  }

  fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Subscription
  where
    N: FnMut(Self::Item) + Send + 'static,
    E: FnMut(Self::Err) + Send + 'static,
    C: FnMut() + Send + 'static,
  {
    self.subscribe_with(FnObserver::new(next, error, complete), Subscription::new())
  }

  /// Subscribes to values only. An error that reaches this subscriber is
  /// logged.
  fn subscribe<N>(&self, next: N) -> Subscription
  where
    N: FnMut(Self::Item) + Send + 'static,
    Self::Err: Debug,
  {
    self.subscribe_all(next, |err| tracing::warn!(?err, "unhandled error in subscriber"), || {})
  }

  // ==================== Merge family ====================

  /// For each upstream value, subscribes to the observable chosen by
  /// `collection_selector` and emits `result_selector(value, inner_item)`
  /// for every inner item, interleaved in arrival order.
  ///
  /// Completes once upstream and every inner observable have completed.
  /// The first error from any of them is forwarded and ends the stream.
  fn flat_map<F, Inner, RF, R>(
    self, collection_selector: F, result_selector: RF,
  ) -> FlatMapOp<Self, WithoutErr<F>, WithoutErr<RF>, IdentityOneWorker<CurrentThread>>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Inner + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    self.flat_map_on(collection_selector, result_selector, identity_current_thread())
  }

  fn flat_map_on<F, Inner, RF, R, C>(
    self, collection_selector: F, result_selector: RF, coordination: C,
  ) -> FlatMapOp<Self, WithoutErr<F>, WithoutErr<RF>, C>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Inner + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
    C: Coordination,
  {
    FlatMapOp::new(self, WithoutErr(collection_selector), WithoutErr(result_selector), coordination)
  }

  /// [`flat_map`](ObservableExt::flat_map) with selectors that may fail. A
  /// selector error is forwarded downstream like a source error.
  fn try_flat_map<F, Inner, RF, R>(
    self, collection_selector: F, result_selector: RF,
  ) -> FlatMapOp<Self, WithErr<F>, WithErr<RF>, IdentityOneWorker<CurrentThread>>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Result<Inner, Self::Err> + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
  {
    self.try_flat_map_on(collection_selector, result_selector, identity_current_thread())
  }

  fn try_flat_map_on<F, Inner, RF, R, C>(
    self, collection_selector: F, result_selector: RF, coordination: C,
  ) -> FlatMapOp<Self, WithErr<F>, WithErr<RF>, C>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Result<Inner, Self::Err> + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
    C: Coordination,
  {
    FlatMapOp::new(self, WithErr(collection_selector), WithErr(result_selector), coordination)
  }

  /// Like [`flat_map`](ObservableExt::flat_map), but inner observables run
  /// one after another: the next one is subscribed only after the previous
  /// completed. Upstream values that arrive meanwhile are queued.
  fn concat_map<F, Inner, RF, R>(
    self, collection_selector: F, result_selector: RF,
  ) -> ConcatMapOp<Self, WithoutErr<F>, WithoutErr<RF>, IdentityOneWorker<CurrentThread>>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Inner + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
  {
    self.concat_map_on(collection_selector, result_selector, identity_current_thread())
  }

  fn concat_map_on<F, Inner, RF, R, C>(
    self, collection_selector: F, result_selector: RF, coordination: C,
  ) -> ConcatMapOp<Self, WithoutErr<F>, WithoutErr<RF>, C>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Inner + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> R + Send + Sync + 'static,
    R: Send + 'static,
    C: Coordination,
  {
    ConcatMapOp::new(self, WithoutErr(collection_selector), WithoutErr(result_selector), coordination)
  }

  fn try_concat_map<F, Inner, RF, R>(
    self, collection_selector: F, result_selector: RF,
  ) -> ConcatMapOp<Self, WithErr<F>, WithErr<RF>, IdentityOneWorker<CurrentThread>>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Result<Inner, Self::Err> + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
  {
    self.try_concat_map_on(collection_selector, result_selector, identity_current_thread())
  }

  fn try_concat_map_on<F, Inner, RF, R, C>(
    self, collection_selector: F, result_selector: RF, coordination: C,
  ) -> ConcatMapOp<Self, WithErr<F>, WithErr<RF>, C>
  where
    Self::Item: Clone,
    F: Fn(Self::Item) -> Result<Inner, Self::Err> + Send + Sync + 'static,
    Inner: Observable<Err = Self::Err>,
    RF: Fn(Self::Item, Inner::Item) -> Result<R, Self::Err> + Send + Sync + 'static,
    R: Send + 'static,
    C: Coordination,
  {
    ConcatMapOp::new(self, WithErr(collection_selector), WithErr(result_selector), coordination)
  }

  // ==================== Scheduling ====================

  /// Re-emits every signal through a coordinator of `coordination`, e.g.
  /// onto an event-loop thread.
  fn observe_on<C: Coordination>(self, coordination: C) -> ObserveOnOp<Self, C> {
    ObserveOnOp::new(self, coordination)
  }
}

impl<T: Observable> ObservableExt for T {}
