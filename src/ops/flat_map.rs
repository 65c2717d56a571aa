use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use tracing::debug;

use crate::{
  coordination::{Coordination, Coordinator},
  observable::Observable,
  observer::{BoxObserver, Observer},
  selector::{CollectionSelector, MergeSelectors, ResultSelector},
  subscriber::{SerializedSubscriber, Subscriber},
  subscription::Subscription,
};

/// Merges the inner observables selected for each upstream value.
///
/// Created by [`ObservableExt::flat_map`](crate::observable::ObservableExt::flat_map)
/// and its variants.
pub struct FlatMapOp<S, CS, RS, C> {
  source: S,
  selectors: Arc<MergeSelectors<CS, RS>>,
  coordination: C,
}

impl<S, CS, RS, C> FlatMapOp<S, CS, RS, C> {
  pub(crate) fn new(source: S, collection: CS, result: RS, coordination: C) -> Self {
    FlatMapOp { source, selectors: Arc::new(MergeSelectors { collection, result }), coordination }
  }
}

impl<S: Clone, CS, RS, C: Clone> Clone for FlatMapOp<S, CS, RS, C> {
  fn clone(&self) -> Self {
    FlatMapOp {
      source: self.source.clone(),
      selectors: self.selectors.clone(),
      coordination: self.coordination.clone(),
    }
  }
}

impl<S, CS, RS, C> Observable for FlatMapOp<S, CS, RS, C>
where
  S: Observable,
  S::Item: Clone,
  CS: CollectionSelector<S::Item, S::Err>,
  RS: ResultSelector<S::Item, <CS::Collection as Observable>::Item, S::Err>,
  C: Coordination,
{
  type Item = RS::Output;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<RS::Output, S::Err> + Send + 'static,
  {
    let coordinator = self.coordination.create_coordinator(subscriber.subscription());
    let out = coordinator.out(subscriber);
    let lifetime = out.subscription().clone();
    let upstream = lifetime.new_child();
    let state = Arc::new(FlatMapState {
      out: SerializedSubscriber::new(out),
      lifetime,
      // upstream counts as one
      pending: AtomicUsize::new(1),
      selectors: self.selectors.clone(),
    });
    self
      .source
      .actual_subscribe(Subscriber::new(OuterObserver { state }, upstream));
  }
}

struct FlatMapState<CS, RS, Item, Err> {
  out: SerializedSubscriber<BoxObserver<Item, Err>>,
  lifetime: Subscription,
  pending: AtomicUsize,
  selectors: Arc<MergeSelectors<CS, RS>>,
}

impl<CS, RS, Item, Err> FlatMapState<CS, RS, Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn error(&self, err: Err) { self.out.with(move |out| out.error(err)); }

  fn complete_one(&self) {
    if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
      self.out.with(|out| out.complete());
    }
  }
}

struct OuterObserver<CS, RS, Item, Err> {
  state: Arc<FlatMapState<CS, RS, Item, Err>>,
}

impl<T, CS, RS, Item, Err> Observer<T, Err> for OuterObserver<CS, RS, Item, Err>
where
  T: Clone + Send + 'static,
  CS: CollectionSelector<T, Err>,
  RS: ResultSelector<T, <CS::Collection as Observable>::Item, Err, Output = Item>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: T) {
    let state = &self.state;
    if state.lifetime.is_disposed() {
      return;
    }
    let inner = match state.selectors.collection.select(value.clone()) {
      Ok(inner) => inner,
      Err(err) => {
        debug!("flat_map collection selector failed");
        state.error(err);
        return;
      }
    };
    state.pending.fetch_add(1, Ordering::AcqRel);
    let subscription = state.lifetime.new_child();
    inner.actual_subscribe(Subscriber::new(InnerObserver { state: state.clone(), value }, subscription));
  }

  fn error(&mut self, err: Err) { self.state.error(err); }

  fn complete(&mut self) { self.state.complete_one(); }
}

struct InnerObserver<CS, RS, T, Item, Err> {
  state: Arc<FlatMapState<CS, RS, Item, Err>>,
  value: T,
}

impl<U, CS, RS, T, Item, Err> Observer<U, Err> for InnerObserver<CS, RS, T, Item, Err>
where
  T: Clone,
  RS: ResultSelector<T, U, Err, Output = Item>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, item: U) {
    match self.state.selectors.result.select(self.value.clone(), item) {
      Ok(value) => {
        self.state.out.with(move |out| out.next(value));
      }
      Err(err) => {
        debug!("flat_map result selector failed");
        self.state.error(err);
      }
    }
  }

  fn error(&mut self, err: Err) { self.state.error(err); }

  fn complete(&mut self) { self.state.complete_one(); }
}
