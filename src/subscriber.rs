use std::{cell::RefCell, collections::VecDeque, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{observer::Observer, subscription::Subscription};

/// Pairs an Observer with the Subscription that governs it. Every source
/// receives its downstream as a `Subscriber`.
///
/// Signals are dropped once the subscription is disposed. A terminal signal
/// is forwarded once, then the subscription is disposed, which tears down
/// everything registered below it (upstream work, scheduled tasks).
pub struct Subscriber<O> {
  observer: O,
  subscription: Subscription,
}

impl<O> Subscriber<O> {
  pub fn new(observer: O, subscription: Subscription) -> Self { Subscriber { observer, subscription } }

  #[inline]
  pub fn subscription(&self) -> &Subscription { &self.subscription }

  #[inline]
  pub fn is_disposed(&self) -> bool { self.subscription.is_disposed() }

  /// Swaps the observer while keeping the subscription.
  pub fn map_observer<P>(self, f: impl FnOnce(O) -> P) -> Subscriber<P> {
    Subscriber { observer: f(self.observer), subscription: self.subscription }
  }
}

impl<Item, Err, O> Observer<Item, Err> for Subscriber<O>
where
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) {
    if !self.is_disposed() {
      self.observer.next(value)
    }
  }

  fn error(&mut self, err: Err) {
    if !self.is_disposed() {
      self.observer.error(err);
      self.subscription.dispose();
    }
  }

  fn complete(&mut self) {
    if !self.is_disposed() {
      self.observer.complete();
      self.subscription.dispose();
    }
  }
}

// ==================== SerializedSubscriber ====================

type Deferred<O> = Box<dyn FnOnce(&mut Subscriber<O>) + Send>;

struct Serialized<O> {
  subscriber: RefCell<Subscriber<O>>,
  pending: RefCell<VecDeque<Deferred<O>>>,
}

/// A [`Subscriber`] that several producers can drive, from any thread.
///
/// Clones share one subscriber behind a reentrant lock, so at most one
/// signal is in flight at a time. A signal sent from inside a delivery on
/// the same thread is queued and delivered right after the running one
/// returns, before the lock is released.
pub struct SerializedSubscriber<O> {
  inner: Arc<ReentrantMutex<Serialized<O>>>,
  subscription: Subscription,
}

impl<O> Clone for SerializedSubscriber<O> {
  fn clone(&self) -> Self {
    SerializedSubscriber { inner: self.inner.clone(), subscription: self.subscription.clone() }
  }
}

impl<O> SerializedSubscriber<O> {
  pub fn new(subscriber: Subscriber<O>) -> Self {
    let subscription = subscriber.subscription().clone();
    let inner = Serialized { subscriber: RefCell::new(subscriber), pending: RefCell::new(VecDeque::new()) };
    SerializedSubscriber { inner: Arc::new(ReentrantMutex::new(inner)), subscription }
  }

  #[inline]
  pub fn subscription(&self) -> &Subscription { &self.subscription }

  #[inline]
  pub fn is_disposed(&self) -> bool { self.subscription.is_disposed() }

  /// Runs `f` with exclusive access to the subscriber. A re-entrant call is
  /// deferred until the outer call has finished.
  pub fn with(&self, f: impl FnOnce(&mut Subscriber<O>) + Send + 'static) {
    let guard = self.inner.lock();
    let Ok(mut subscriber) = guard.subscriber.try_borrow_mut() else {
      guard.pending.borrow_mut().push_back(Box::new(f));
      return;
    };
    f(&mut subscriber);
    loop {
      let deferred = guard.pending.borrow_mut().pop_front();
      match deferred {
        Some(f) => f(&mut subscriber),
        None => break,
      }
    }
  }
}

impl<Item, Err, O> Observer<Item, Err> for SerializedSubscriber<O>
where
  Item: Send + 'static,
  Err: Send + 'static,
  O: Observer<Item, Err>,
{
  fn next(&mut self, value: Item) { self.with(move |s| s.next(value)); }

  fn error(&mut self, err: Err) { self.with(move |s| s.error(err)); }

  fn complete(&mut self) { self.with(|s| s.complete()); }
}
