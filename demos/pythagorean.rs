//! Example: Pythagorean triples with nested `concat_map`
//!
//! For every `z`, every `x < z` is expanded into the `y` in `x..z` with
//! `x² + y² = z²`. The outer subscription is disposed after the first
//! `TRIPLES` results, which cancels the ranges still in flight.
//!
//! Pick the scheduler with the first argument: `immediate`,
//! `current-thread` (default), `event-loop` or `serialized`.
//!
//! ```text
//! cargo run --example pythagorean -- event-loop
//! ```

use std::{
  convert::Infallible,
  sync::{
    atomic::{AtomicUsize, Ordering},
    mpsc, Arc,
  },
  time::{Duration, Instant},
};

use rxcore::prelude::*;

const TRIPLES: usize = 100;

fn parse(arg: Option<String>) -> Schedulers {
  match arg.as_deref() {
    Some("immediate") => Schedulers::Immediate,
    Some("event-loop") => Schedulers::EventLoop,
    Some("serialized") => Schedulers::SerializedEventLoop,
    _ => Schedulers::CurrentThread,
  }
}

fn main() -> Result<(), RxError> {
  let choice = parse(std::env::args().nth(1));
  let so = choice.coordination()?;
  let (mid, inner) = (so.clone(), so.clone());

  let tested = Arc::new(AtomicUsize::new(0));
  let c_tested = tested.clone();

  let triples = observable::iterate::<_, _, Infallible>(1.., so.clone()).concat_map_on(
    move |z: u64| {
      let (inner, tested) = (inner.clone(), c_tested.clone());
      observable::iterate(1..z, mid.clone()).concat_map_on(
        move |x: u64| {
          let tested = tested.clone();
          let ys = (x..z).filter(move |y| {
            tested.fetch_add(1, Ordering::Relaxed);
            x * x + y * y == z * z
          });
          observable::iterate(ys, inner.clone())
        },
        move |x, y| (x, y, z),
        mid.clone(),
      )
    },
    |_, triple| triple,
    so,
  );

  let (tx, rx) = mpsc::channel();
  let tx_done = tx.clone();
  let subscription = Subscription::new();
  let c_subscription = subscription.clone();
  let mut count = 0;
  let start = Instant::now();

  triples.subscribe_with(
    FnObserver::new(
      move |(x, y, z): (u64, u64, u64)| {
        count += 1;
        println!("{count:>3}: {x}² + {y}² = {z}²");
        if count == TRIPLES {
          c_subscription.dispose();
          let _ = tx.send(());
        }
      },
      |_: Infallible| {},
      move || {
        let _ = tx_done.send(());
      },
    ),
    subscription,
  );

  if rx.recv_timeout(Duration::from_secs(60)).is_err() {
    eprintln!("gave up waiting for {TRIPLES} triples");
  }
  println!(
    "{choice:?}: {} candidates tested in {:?}",
    tested.load(Ordering::Relaxed),
    start.elapsed()
  );
  Ok(())
}
