//! Cancellation tree.
//!
//! A [`Subscription`] is one node of a tree of teardown registrations.
//! Disposing a node runs every registration exactly once: plain actions are
//! called, child nodes are disposed in turn. Registrations added after the
//! node is disposed run immediately, so no cancellation is ever missed.

use std::{
  fmt::{Debug, Formatter},
  mem,
  sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
  },
};

use parking_lot::Mutex;
use smallvec::SmallVec;

/// Identifies one registration on a [`Subscription`], see
/// [`Subscription::remove`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

enum TearDown {
  Action(Box<dyn FnOnce() + Send>),
  Child(Subscription),
}

impl TearDown {
  fn run(self) {
    match self {
      TearDown::Action(action) => action(),
      TearDown::Child(child) => child.dispose(),
    }
  }

  fn is_finished(&self) -> bool {
    match self {
      TearDown::Action(_) => false,
      TearDown::Child(child) => child.is_disposed(),
    }
  }
}

type TearDowns = SmallVec<[(u64, TearDown); 2]>;

// Finished children are swept once the list doubles past the last sweep.
const MIN_PRUNE_LEN: usize = 16;

#[derive(Default)]
struct TearDownList {
  next_id: u64,
  items: TearDowns,
  prune_at: usize,
}

impl TearDownList {
  fn next_token(&mut self) -> SubscriptionToken {
    let id = self.next_id;
    self.next_id += 1;
    SubscriptionToken(id)
  }

  fn prune(&mut self) -> TearDowns {
    if self.items.len() < self.prune_at.max(MIN_PRUNE_LEN) {
      return TearDowns::new();
    }
    let (finished, live): (TearDowns, TearDowns) =
      mem::take(&mut self.items).into_iter().partition(|(_, v)| v.is_finished());
    self.items = live;
    self.prune_at = self.items.len() * 2;
    finished
  }
}

#[derive(Default)]
struct Inner {
  // Only written while `teardown` is locked, read without it.
  disposed: AtomicBool,
  teardown: Mutex<TearDownList>,
}

/// Shared handle to a node of the cancellation tree.
///
/// Cloning is cheap and every clone refers to the same node. All operations
/// are safe to call from several threads at once.
#[derive(Clone, Default)]
pub struct Subscription(Arc<Inner>);

impl Subscription {
  pub fn new() -> Self { Self::default() }

  /// Returns a node that is already disposed. Anything added to it runs
  /// immediately.
  pub fn disposed() -> Self {
    let subscription = Self::new();
    subscription.dispose();
    subscription
  }

  #[inline]
  pub fn is_disposed(&self) -> bool { self.0.disposed.load(Ordering::Acquire) }

  /// Registers `action` to run when this node is disposed.
  ///
  /// If the node is already disposed, `action` runs before `add` returns and
  /// is not retained.
  pub fn add(&self, action: impl FnOnce() + Send + 'static) -> SubscriptionToken {
    self.register(TearDown::Action(Box::new(action)))
  }

  /// Makes `child` part of this tree: disposing `self` disposes `child`.
  ///
  /// Adding a node to itself is ignored.
  pub fn add_child(&self, child: Subscription) -> SubscriptionToken {
    if self.ptr_eq(&child) {
      return self.0.teardown.lock().next_token();
    }
    self.register(TearDown::Child(child))
  }

  /// Creates a child of this node that unregisters itself once disposed,
  /// so short-lived children do not pile up on a long-lived parent.
  pub fn new_child(&self) -> Subscription {
    let child = Subscription::new();
    let token = self.add_child(child.clone());
    let parent = self.clone();
    child.add(move || parent.remove(token));
    child
  }

  fn register(&self, item: TearDown) -> SubscriptionToken {
    let mut list = self.0.teardown.lock();
    let token = list.next_token();
    if self.is_disposed() {
      drop(list);
      item.run();
    } else {
      let pruned = list.prune();
      list.items.push((token.0, item));
      drop(list);
      drop(pruned);
    }
    token
  }

  /// Drops the registration behind `token` without running it. Unknown or
  /// already consumed tokens are ignored.
  pub fn remove(&self, token: SubscriptionToken) {
    let removed = {
      let mut list = self.0.teardown.lock();
      list
        .items
        .iter()
        .position(|(id, _)| *id == token.0)
        .map(|idx| list.items.remove(idx))
    };
    // Released outside the lock, the registration may own other nodes.
    drop(removed);
  }

  /// Runs every registration exactly once and releases them.
  ///
  /// Registrations run with the internal lock released, so a registration
  /// that disposes this same node (or adds to it) does not deadlock; the
  /// nested call is a no-op.
  pub fn dispose(&self) {
    let items = {
      let mut list = self.0.teardown.lock();
      if self.0.disposed.swap(true, Ordering::AcqRel) {
        return;
      }
      mem::take(&mut list.items)
    };
    tracing::trace!(registrations = items.len(), "subscription disposed");
    for (_, item) in items {
      item.run();
    }
  }

  /// Number of live registrations on this node.
  pub fn teardown_len(&self) -> usize { self.0.teardown.lock().items.len() }

  #[inline]
  pub fn ptr_eq(&self, other: &Subscription) -> bool { Arc::ptr_eq(&self.0, &other.0) }

  /// Activates "RAII" behavior for this subscription. That means `dispose()`
  /// will be called automatically as soon as the returned value goes out of
  /// scope.
  ///
  /// **Attention:** If you don't assign the return value to a variable,
  /// `dispose()` is called immediately, which is probably not what you want!
  pub fn dispose_when_dropped(self) -> SubscriptionGuard { SubscriptionGuard(self) }
}

impl Debug for Subscription {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Subscription")
      .field("disposed", &self.is_disposed())
      .field("teardown_count", &self.teardown_len())
      .finish()
  }
}

/// An RAII implementation of a "scoped subscribed" of a subscription.
/// When this structure is dropped (falls out of scope), the subscription will
/// be disposed.
///
/// If you want to drop it immediately, wrap it in its own scope.
#[derive(Debug)]
#[must_use]
pub struct SubscriptionGuard(Subscription);

impl Drop for SubscriptionGuard {
  #[inline]
  fn drop(&mut self) { self.0.dispose() }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{atomic::AtomicUsize, Barrier},
    thread,
  };

  use super::*;

  fn counter() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let c_count = count.clone();
    (count, move || {
      c_count.fetch_add(1, Ordering::SeqCst);
    })
  }

  #[rxcore_macro::test]
  fn dispose_runs_every_action_once() {
    let subscription = Subscription::new();
    let (count, action) = counter();
    subscription.add(action);
    let (count2, action2) = counter();
    subscription.add(action2);
    assert_eq!(subscription.teardown_len(), 2);

    subscription.dispose();
    subscription.dispose();

    assert!(subscription.is_disposed());
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(count2.load(Ordering::SeqCst), 1);
    assert_eq!(subscription.teardown_len(), 0);
  }

  #[rxcore_macro::test]
  fn add_after_dispose_runs_immediately() {
    let subscription = Subscription::disposed();
    let (count, action) = counter();
    subscription.add(action);
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(subscription.teardown_len(), 0);

    let child = Subscription::new();
    subscription.add_child(child.clone());
    assert!(child.is_disposed());
  }

  #[rxcore_macro::test]
  fn removed_action_never_runs() {
    let subscription = Subscription::new();
    let (count, action) = counter();
    let token = subscription.add(action);
    subscription.remove(token);
    subscription.remove(token);
    subscription.dispose();
    assert_eq!(count.load(Ordering::SeqCst), 0);
  }

  #[rxcore_macro::test]
  fn disposing_parent_disposes_children() {
    let parent = Subscription::new();
    let child = Subscription::new();
    let grand_child = Subscription::new();
    parent.add_child(child.clone());
    child.add_child(grand_child.clone());
    let (count, action) = counter();
    grand_child.add(action);

    parent.dispose();

    assert!(child.is_disposed());
    assert!(grand_child.is_disposed());
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[rxcore_macro::test]
  fn disposing_child_keeps_parent_alive() {
    let parent = Subscription::new();
    let children: Vec<_> = (0..32).map(|_| Subscription::new()).collect();
    for child in &children {
      parent.add_child(child.clone());
    }
    children.iter().for_each(Subscription::dispose);
    assert!(!parent.is_disposed());
    assert_eq!(parent.teardown_len(), 32);

    // the list has doubled since the last sweep, so this registration sweeps
    parent.add(|| {});
    assert_eq!(parent.teardown_len(), 1);
  }

  #[rxcore_macro::test]
  fn new_child_unregisters_itself() {
    let parent = Subscription::new();
    let child = parent.new_child();
    assert_eq!(parent.teardown_len(), 1);
    child.dispose();
    assert_eq!(parent.teardown_len(), 0);
    assert!(!parent.is_disposed());

    let child = parent.new_child();
    parent.dispose();
    assert!(child.is_disposed());
    assert!(parent.new_child().is_disposed());
  }

  #[rxcore_macro::test]
  fn reentrant_dispose_is_a_no_op() {
    let subscription = Subscription::new();
    let c_subscription = subscription.clone();
    let (count, action) = counter();
    subscription.add(move || {
      c_subscription.dispose();
      action();
    });
    subscription.dispose();
    assert_eq!(count.load(Ordering::SeqCst), 1);
  }

  #[rxcore_macro::test]
  fn self_child_is_ignored() {
    let subscription = Subscription::new();
    subscription.add_child(subscription.clone());
    assert_eq!(subscription.teardown_len(), 0);
    subscription.dispose();
  }

  #[rxcore_macro::test]
  fn guard_disposes_on_drop() {
    let subscription = Subscription::new();
    {
      let _guard = subscription.clone().dispose_when_dropped();
      assert!(!subscription.is_disposed());
    }
    assert!(subscription.is_disposed());
  }

  #[cfg(not(target_arch = "wasm32"))]
  #[rxcore_macro::test]
  fn concurrent_add_and_dispose_never_miss_an_action() {
    for _ in 0..50 {
      let subscription = Subscription::new();
      let count = Arc::new(AtomicUsize::new(0));
      let barrier = Arc::new(Barrier::new(5));

      let handles: Vec<_> = (0..4)
        .map(|_| {
          let subscription = subscription.clone();
          let count = count.clone();
          let barrier = barrier.clone();
          thread::spawn(move || {
            barrier.wait();
            for _ in 0..25 {
              let count = count.clone();
              subscription.add(move || {
                count.fetch_add(1, Ordering::SeqCst);
              });
            }
          })
        })
        .collect();

      barrier.wait();
      subscription.dispose();
      for h in handles {
        h.join().unwrap();
      }
      assert_eq!(count.load(Ordering::SeqCst), 100);
    }
  }

  #[cfg(not(target_arch = "wasm32"))]
  #[rxcore_macro::test]
  fn concurrent_dispose_runs_actions_once() {
    for _ in 0..200 {
      let subscription = Subscription::new();
      let child = subscription.new_child();
      let (count, action) = counter();
      let (child_count, child_action) = counter();
      subscription.add(action);
      child.add(child_action);
      let barrier = Arc::new(Barrier::new(8));

      let handles: Vec<_> = (0..8)
        .map(|i| {
          let (subscription, child, barrier) = (subscription.clone(), child.clone(), barrier.clone());
          thread::spawn(move || {
            barrier.wait();
            if i % 2 == 0 { subscription.dispose() } else { child.dispose() }
          })
        })
        .collect();
      for h in handles {
        h.join().unwrap();
      }

      assert!(subscription.is_disposed() && child.is_disposed());
      assert_eq!(count.load(Ordering::SeqCst), 1);
      assert_eq!(child_count.load(Ordering::SeqCst), 1);
    }
  }
}
