use std::marker::PhantomData;

use crate::{
  coordination::{identity_current_thread, Coordination, Coordinator, IdentityOneWorker},
  observable::Observable,
  observer::Observer,
  scheduler::{CurrentThread, TaskState},
  subscriber::Subscriber,
};

/// Emits every item of `collection`, then completes.
///
/// Each item is emitted from its own step on the coordinator's worker, so a
/// long collection never blocks other work on the same worker and
/// cancellation is observed between items. Every subscription iterates a
/// fresh clone of `collection`.
pub fn iterate<I, C, Err>(collection: I, coordination: C) -> Iterate<I, C, Err>
where
  I: IntoIterator,
  C: Coordination,
{
  Iterate { collection, coordination, _marker: PhantomData }
}

/// [`iterate`] on the current thread.
///
/// ```rust
/// use std::convert::Infallible;
/// use rxcore::prelude::*;
///
/// observable::from_iter::<_, Infallible>(0..10).subscribe(|v| println!("{v}"));
/// ```
pub fn from_iter<I, Err>(collection: I) -> Iterate<I, IdentityOneWorker<CurrentThread>, Err>
where
  I: IntoIterator,
{
  iterate(collection, identity_current_thread())
}

pub struct Iterate<I, C, Err> {
  collection: I,
  coordination: C,
  _marker: PhantomData<fn() -> Err>,
}

impl<I: Clone, C: Clone, Err> Clone for Iterate<I, C, Err> {
  fn clone(&self) -> Self {
    Iterate {
      collection: self.collection.clone(),
      coordination: self.coordination.clone(),
      _marker: PhantomData,
    }
  }
}

impl<I, C, Err> Observable for Iterate<I, C, Err>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
  C: Coordination,
  Err: Send + 'static,
{
  type Item = I::Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<I::Item, Err> + Send + 'static,
  {
    let coordinator = self.coordination.create_coordinator(subscriber.subscription());
    let mut out = coordinator.out(subscriber);
    let mut cursor = self.collection.clone().into_iter().peekable();
    coordinator.worker().schedule(move || {
      if out.is_disposed() {
        return TaskState::Finished;
      }
      if let Some(value) = cursor.next() {
        out.next(value);
      }
      if cursor.peek().is_none() {
        out.complete();
        return TaskState::Finished;
      }
      TaskState::Yield
    });
  }
}

#[cfg(test)]
mod test {
  use std::{
    convert::Infallible,
    sync::{Arc, Mutex},
  };

  use crate::{prelude::*, testing::*};

  #[rxcore_macro::test]
  fn emits_all_then_completes() {
    let values = Arc::new(Mutex::new(vec![]));
    let completed = Arc::new(Mutex::new(false));
    let (v, c) = (values.clone(), completed.clone());
    observable::from_iter::<_, Infallible>(vec![1, 2, 3]).subscribe_all(
      move |x| v.lock().unwrap().push(x),
      |_| {},
      move || *c.lock().unwrap() = true,
    );
    assert_eq!(*values.lock().unwrap(), vec![1, 2, 3]);
    assert!(*completed.lock().unwrap());
  }

  #[rxcore_macro::test]
  fn empty_collection_completes_right_away() {
    let completed = Arc::new(Mutex::new(false));
    let c = completed.clone();
    observable::from_iter::<Vec<i32>, ()>(vec![]).subscribe_all(
      |_| unreachable!(),
      |_| {},
      move || *c.lock().unwrap() = true,
    );
    assert!(*completed.lock().unwrap());
  }

  #[rxcore_macro::test]
  fn one_item_per_step_on_virtual_time() {
    let scheduler = TestScheduler::new();
    let observer = scheduler.create_observer::<char, ()>();
    let source = observable::iterate(vec!['a', 'b'], identity_test(&scheduler));
    scheduler.schedule_at(10, {
      let observer = observer.clone();
      move || {
        source.subscribe_with(observer, Subscription::new());
      }
    });
    scheduler.flush();
    assert_eq!(
      observer.messages(),
      vec![on_next(10, 'a'), on_next(10, 'b'), on_completed(10)]
    );
  }

  #[rxcore_macro::test]
  fn cancellation_stops_between_items() {
    let scheduler = TestScheduler::new();
    let seen = Arc::new(Mutex::new(vec![]));
    let subscription = Subscription::new();
    let (s, c_subscription) = (seen.clone(), subscription.clone());
    observable::iterate(0..100, identity_test(&scheduler)).subscribe_with(
      FnObserver::new(
        move |v: i32| {
          s.lock().unwrap().push(v);
          if v == 2 {
            c_subscription.dispose();
          }
        },
        |_: ()| {},
        || {},
      ),
      subscription,
    );
    scheduler.flush();
    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
    assert!(scheduler.is_empty());
  }

  #[rxcore_macro::test]
  fn disposed_before_the_first_step_emits_nothing() {
    let scheduler = TestScheduler::new();
    let observer = scheduler.create_observer::<i32, ()>();
    let subscription = observable::iterate(0..100, identity_test(&scheduler))
      .subscribe_with(observer.clone(), Subscription::new());
    subscription.dispose();
    scheduler.flush();
    assert!(observer.messages().is_empty());
    assert!(scheduler.is_empty());
  }

  #[rxcore_macro::test]
  fn every_subscription_restarts() {
    let sum = Arc::new(Mutex::new(0));
    let source = observable::from_iter::<_, Infallible>(1..=3);
    for _ in 0..2 {
      let s = sum.clone();
      source.subscribe(move |v| *s.lock().unwrap() += v);
    }
    assert_eq!(*sum.lock().unwrap(), 12);
  }
}
