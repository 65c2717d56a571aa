//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Coordination
#[cfg(feature = "event-loop")]
pub use crate::coordination::{observe_on_event_loop, serialize_event_loop};
pub use crate::coordination::{
  identity_current_thread, identity_immediate, identity_test, AnyCoordination, Coordination,
  Coordinator, IdentityOneWorker, ObserveOnOneWorker, Schedulers, SerializeOneWorker,
};
// Errors
pub use crate::error::RxError;
// Core traits and sources
pub use crate::observable::{self, Observable, ObservableExt};
// Observer
pub use crate::observer::{BoxObserver, FnObserver, Notification, Observer};
// Schedulers
#[cfg(feature = "event-loop")]
pub use crate::scheduler::{EventLoop, RunLoop};
pub use crate::scheduler::{
  ticks, CurrentThread, Duration, Immediate, Scheduler, TaskState, TestScheduler, Worker,
};
// Selectors
pub use crate::selector::{CollectionSelector, ResultSelector, WithErr, WithoutErr};
// Subscriber and Subscription
pub use crate::subscriber::{SerializedSubscriber, Subscriber};
pub use crate::subscription::{Subscription, SubscriptionGuard, SubscriptionToken};
