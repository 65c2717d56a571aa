use std::{collections::VecDeque, mem, sync::Arc};

use parking_lot::Mutex;
use tracing::debug;

use crate::{
  coordination::{Coordination, Coordinator},
  observable::Observable,
  observer::{BoxObserver, Observer},
  selector::{CollectionSelector, MergeSelectors, ResultSelector},
  subscriber::{SerializedSubscriber, Subscriber},
  subscription::Subscription,
};

/// Concatenates the inner observables selected for each upstream value,
/// subscribing to one at a time.
///
/// Created by [`ObservableExt::concat_map`](crate::observable::ObservableExt::concat_map)
/// and its variants.
pub struct ConcatMapOp<S, CS, RS, C> {
  source: S,
  selectors: Arc<MergeSelectors<CS, RS>>,
  coordination: C,
}

impl<S, CS, RS, C> ConcatMapOp<S, CS, RS, C> {
  pub(crate) fn new(source: S, collection: CS, result: RS, coordination: C) -> Self {
    ConcatMapOp { source, selectors: Arc::new(MergeSelectors { collection, result }), coordination }
  }
}

impl<S: Clone, CS, RS, C: Clone> Clone for ConcatMapOp<S, CS, RS, C> {
  fn clone(&self) -> Self {
    ConcatMapOp {
      source: self.source.clone(),
      selectors: self.selectors.clone(),
      coordination: self.coordination.clone(),
    }
  }
}

impl<S, CS, RS, C> Observable for ConcatMapOp<S, CS, RS, C>
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
    let state = Arc::new(ConcatMapState {
      out: SerializedSubscriber::new(out),
      lifetime,
      selectors: self.selectors.clone(),
      queue: Mutex::new(ConcatQueue {
        waiting: VecDeque::new(),
        active: false,
        subscribing: false,
        handoff: false,
        upstream_completed: false,
      }),
    });
    self
      .source
      .actual_subscribe(Subscriber::new(OuterObserver { state }, upstream));
  }
}

// `waiting` is only non-empty while an inner observable is active. An inner
// that completes while it is still being subscribed only sets `handoff`; the
// subscribing call then moves on to the next value in a loop.
struct ConcatQueue<T> {
  waiting: VecDeque<T>,
  active: bool,
  subscribing: bool,
  handoff: bool,
  upstream_completed: bool,
}

struct ConcatMapState<CS, RS, T, Item, Err> {
  out: SerializedSubscriber<BoxObserver<Item, Err>>,
  lifetime: Subscription,
  selectors: Arc<MergeSelectors<CS, RS>>,
  queue: Mutex<ConcatQueue<T>>,
}

impl<CS, RS, T, Item, Err> ConcatMapState<CS, RS, T, Item, Err>
where
  T: Clone + Send + 'static,
  CS: CollectionSelector<T, Err>,
  RS: ResultSelector<T, <CS::Collection as Observable>::Item, Err, Output = Item>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn error(&self, err: Err) { self.out.with(move |out| out.error(err)); }

  fn upstream_next(self: &Arc<Self>, value: T) {
    let start = {
      let mut queue = self.queue.lock();
      if queue.active {
        queue.waiting.push_back(value);
        None
      } else {
        queue.active = true;
        Some(value)
      }
    };
    if let Some(value) = start {
      self.run_inners(value);
    }
  }

  fn upstream_complete(&self) {
    let done = {
      let mut queue = self.queue.lock();
      queue.upstream_completed = true;
      !queue.active
    };
    if done {
      self.out.with(|out| out.complete());
    }
  }

  fn inner_complete(self: &Arc<Self>) {
    let (next, upstream_completed) = {
      let mut queue = self.queue.lock();
      if queue.subscribing {
        queue.handoff = true;
        return;
      }
      let next = queue.waiting.pop_front();
      if next.is_none() {
        queue.active = false;
      }
      (next, queue.upstream_completed)
    };
    match next {
      Some(value) => self.run_inners(value),
      None if upstream_completed => {
        self.out.with(|out| out.complete());
      }
      None => {}
    }
  }

  // Subscribes to the inner observable of `value`, then to the next waiting
  // one for as long as each inner completes before its subscribe returns.
  fn run_inners(self: &Arc<Self>, mut value: T) {
    loop {
      self.queue.lock().subscribing = true;
      self.subscribe_inner(value);
      let mut queue = self.queue.lock();
      queue.subscribing = false;
      if !mem::take(&mut queue.handoff) {
        return;
      }
      match queue.waiting.pop_front() {
        Some(next) => value = next,
        None => {
          queue.active = false;
          let upstream_completed = queue.upstream_completed;
          drop(queue);
          if upstream_completed {
            self.out.with(|out| out.complete());
          }
          return;
        }
      }
    }
  }

  fn subscribe_inner(self: &Arc<Self>, value: T) {
    if self.lifetime.is_disposed() {
      return;
    }
    let inner = match self.selectors.collection.select(value.clone()) {
      Ok(inner) => inner,
      Err(err) => {
        debug!("concat_map collection selector failed");
        self.error(err);
        return;
      }
    };
    let subscription = self.lifetime.new_child();
    inner.actual_subscribe(Subscriber::new(InnerObserver { state: self.clone(), value }, subscription));
  }
}

struct OuterObserver<CS, RS, T, Item, Err> {
  state: Arc<ConcatMapState<CS, RS, T, Item, Err>>,
}

impl<CS, RS, T, Item, Err> Observer<T, Err> for OuterObserver<CS, RS, T, Item, Err>
where
  T: Clone + Send + 'static,
  CS: CollectionSelector<T, Err>,
  RS: ResultSelector<T, <CS::Collection as Observable>::Item, Err, Output = Item>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, value: T) { self.state.upstream_next(value); }

  fn error(&mut self, err: Err) { self.state.error(err); }

  fn complete(&mut self) { self.state.upstream_complete(); }
}

struct InnerObserver<CS, RS, T, Item, Err> {
  state: Arc<ConcatMapState<CS, RS, T, Item, Err>>,
  value: T,
}

impl<U, CS, RS, T, Item, Err> Observer<U, Err> for InnerObserver<CS, RS, T, Item, Err>
where
  T: Clone + Send + 'static,
  CS: CollectionSelector<T, Err>,
  RS: ResultSelector<T, <CS::Collection as Observable>::Item, Err, Output = Item>
    + ResultSelector<T, U, Err, Output = Item>,
  Item: Send + 'static,
  Err: Send + 'static,
{
  fn next(&mut self, item: U) {
    match ResultSelector::<T, U, Err>::select(&self.state.selectors.result, self.value.clone(), item)
    {
      Ok(value) => {
        self.state.out.with(move |out| out.next(value));
      }
      Err(err) => {
        debug!("concat_map result selector failed");
        self.state.error(err);
      }
    }
  }

  fn error(&mut self, err: Err) { self.state.error(err); }

  fn complete(&mut self) { self.state.inner_complete(); }
}
