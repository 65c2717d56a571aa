//! # rxcore: a reactive-streams engine
//!
//! Push-based streams with explicit cancellation, pluggable execution
//! contexts and the merge family of operators.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::convert::Infallible;
//! use rxcore::prelude::*;
//!
//! observable::from_iter::<_, Infallible>(1..=3)
//!   .concat_map(|n| observable::from_iter(0..n), |n, i| n * 10 + i)
//!   .subscribe(|v| println!("Value: {}", v));
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Observable`] | A stream description, subscribed to start a run |
//! | [`Observer`] | Consumes `next`, `error`, and `complete` events |
//! | [`Subscription`] | Node of the cancellation tree, disposes a run |
//! | [`Scheduler`] | Where work runs: inline, trampolined, run loops, virtual time |
//! | [`Coordination`] | How a stream's signals are delivered onto a scheduler |
//!
//! ## Feature Flags
//!
//! - **`event-loop`** (default): thread-backed `RunLoop` and `EventLoop`
//!   schedulers
//!
//! [`Observable`]: observable::Observable
//! [`Observer`]: observer::Observer
//! [`Subscription`]: subscription::Subscription
//! [`Scheduler`]: scheduler::Scheduler
//! [`Coordination`]: coordination::Coordination

pub mod coordination;
pub mod error;
pub mod observable;
pub mod observer;
pub mod ops;
pub mod prelude;
pub mod scheduler;
pub mod selector;
pub mod subscriber;
pub mod subscription;
pub mod testing;

// Re-export the prelude module
pub use prelude::*;
