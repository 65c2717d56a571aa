//! Integration tests for the merge family.
//!
//! Virtual-time timelines, cancellation, error isolation and the same
//! pipelines driven by every scheduler choice.

use std::{
  convert::Infallible,
  sync::{Arc, Mutex},
};

use rand::{rngs::StdRng, Rng, SeedableRng};
use rxcore::{prelude::*, testing::*};

type Script = Vec<Recorded<i32, &'static str>>;

fn foo_bar_baz_qux(scheduler: &TestScheduler) -> ColdObservable<&'static str, &'static str> {
  scheduler.cold_observable(vec![
    on_next(50, "foo"),
    on_next(100, "bar"),
    on_next(150, "baz"),
    on_next(200, "qux"),
    on_completed(250),
  ])
}

#[rxcore_macro::test]
fn concat_map_runs_inner_streams_back_to_back() {
  let scheduler = TestScheduler::new();
  let xs = scheduler.cold_observable(vec![on_next(100, 4), on_next(200, 2), on_completed(500)]);
  let ys = foo_bar_baz_qux(&scheduler);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());

  let res = scheduler.start(move || c_xs.concat_map(move |_| c_ys.clone(), |_, y| y));

  assert_eq!(
    res.messages(),
    vec![
      on_next(350, "foo"),
      on_next(400, "bar"),
      on_next(450, "baz"),
      on_next(500, "qux"),
      on_next(600, "foo"),
      on_next(650, "bar"),
      on_next(700, "baz"),
      on_next(750, "qux"),
      on_completed(800),
    ]
  );
  assert_eq!(xs.subscriptions(), vec![subscribed(200, 700)]);
  assert_eq!(ys.subscriptions(), vec![subscribed(300, 550), subscribed(550, 800)]);
}

#[rxcore_macro::test]
fn flat_map_overlaps_inner_streams() {
  let scheduler = TestScheduler::new();
  let xs = scheduler.cold_observable(vec![on_next(100, 4), on_next(200, 2), on_completed(500)]);
  let ys = foo_bar_baz_qux(&scheduler);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());

  let res = scheduler.start(move || c_xs.flat_map(move |_| c_ys.clone(), |_, y| y));

  let values: Vec<_> = res.messages().into_iter().filter(|m| !m.value.is_terminal()).collect();
  assert_eq!(values.len(), 8);
  assert_eq!(res.messages().last(), Some(&on_completed(700)));
  assert_eq!(ys.subscriptions(), vec![subscribed(300, 550), subscribed(400, 650)]);
}

#[rxcore_macro::test]
fn completion_waits_for_upstream_and_every_inner() {
  let scheduler = TestScheduler::new();
  let xs = scheduler.cold_observable::<i32, &'static str>(vec![on_next(10, 1), on_completed(20)]);
  let short = scheduler.cold_observable(vec![on_next(5, 'a'), on_completed(10)]);
  let long = scheduler.cold_observable(vec![on_next(5, 'b'), on_completed(300)]);
  let (c_xs, c_short, c_long) = (xs.clone(), short.clone(), long.clone());

  // Upstream completes first, the long inner keeps the stream alive.
  let res = scheduler.start(move || {
    let (short, long) = (c_short.clone(), c_long.clone());
    c_xs
      .flat_map(move |_| short.clone(), |_, y| y)
      .flat_map(move |_| long.clone(), |x, y| (x, y))
  });

  assert_eq!(res.messages(), vec![on_next(220, ('a', 'b')), on_completed(515)]);
  assert_eq!(xs.subscriptions(), vec![subscribed(200, 220)]);
  assert_eq!(short.subscriptions(), vec![subscribed(210, 220)]);
  assert_eq!(long.subscriptions(), vec![subscribed(215, 515)]);
}

#[rxcore_macro::test]
fn result_selector_failure_ends_the_stream() {
  let scheduler = TestScheduler::new();
  let xs = scheduler.cold_observable(vec![on_next(100, 1), on_next(150, 2), on_completed(500)]);
  let ys = foo_bar_baz_qux(&scheduler);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());

  let res = scheduler.start(move || {
    c_xs.try_flat_map(
      move |_| Ok(c_ys.clone()),
      |x, y| if x == 2 && y == "bar" { Err("rejected") } else { Ok((x, y)) },
    )
  });

  assert_eq!(
    res.messages(),
    vec![
      on_next(350, (1, "foo")),
      on_next(400, (1, "bar")),
      on_next(400, (2, "foo")),
      on_next(450, (1, "baz")),
      on_error(450, "rejected"),
    ]
  );
  assert_eq!(xs.subscriptions(), vec![subscribed(200, 450)]);
  assert_eq!(ys.subscriptions(), vec![subscribed(300, 450), subscribed(350, 450)]);
}

#[rxcore_macro::test]
fn disposed_stream_stays_silent() {
  let scheduler = TestScheduler::new();
  let xs = scheduler.cold_observable(vec![on_next(100, 4), on_next(200, 2), on_completed(500)]);
  let ys = foo_bar_baz_qux(&scheduler);
  let (c_xs, c_ys) = (xs.clone(), ys.clone());

  let res = scheduler.start_with(CREATED, SUBSCRIBED, 420, move || {
    c_xs.concat_map(move |_| c_ys.clone(), |_, y| y)
  });

  assert_eq!(res.messages(), vec![on_next(350, "foo"), on_next(400, "bar")]);
  assert_eq!(xs.subscriptions(), vec![subscribed(200, 420)]);
  assert_eq!(ys.subscriptions(), vec![subscribed(300, 420)]);
}

fn random_script(rng: &mut StdRng, base: i32) -> Script {
  let mut time = 0;
  let mut script: Script = (0..rng.random_range(0..5))
    .map(|i| {
      time += rng.random_range(1..30);
      on_next(time, base + i)
    })
    .collect();
  time += rng.random_range(1..30);
  if rng.random_bool(0.2) {
    script.push(on_error(time, "boom"));
  } else {
    script.push(on_completed(time));
  }
  script
}

#[rxcore_macro::test]
fn exactly_one_terminal_under_random_timelines() {
  let mut rng = StdRng::seed_from_u64(0x5eed);
  for round in 0..200 {
    let scheduler = TestScheduler::new();
    let xs = scheduler.cold_observable(random_script(&mut rng, 0));
    let inners: Arc<Vec<_>> = Arc::new(
      (0..5).map(|i| scheduler.cold_observable(random_script(&mut rng, i * 100))).collect(),
    );
    let concat = rng.random_bool(0.5);
    let (c_xs, c_inners) = (xs.clone(), inners.clone());

    let res = scheduler.start(move || {
      let select = move |x: i32| c_inners[x as usize % c_inners.len()].clone();
      let pick = |_: i32, y: i32| y;
      if concat {
        AnyMerge::Concat(c_xs.concat_map(select, pick))
      } else {
        AnyMerge::Flat(c_xs.flat_map(select, pick))
      }
    });

    let messages = res.messages();
    let terminals: Vec<_> = messages.iter().filter(|m| m.value.is_terminal()).collect();
    assert_eq!(terminals.len(), 1, "round {round}: {messages:?}");
    let last = messages.last().map(|m| m.time).unwrap_or_default();
    assert!(messages.last().is_some_and(|m| m.value.is_terminal()), "round {round}");
    assert!(messages.windows(2).all(|w| w[0].time <= w[1].time), "round {round}");
    for log in inners.iter().flat_map(|ys| ys.subscriptions()).chain(xs.subscriptions()) {
      assert!(log.unsubscribe <= last, "round {round}: {log:?} outlived the stream");
    }
  }
}

// Lets one closure return either operator.
#[derive(Clone)]
enum AnyMerge<A, B> {
  Flat(A),
  Concat(B),
}

impl<A, B> Observable for AnyMerge<A, B>
where
  A: Observable,
  B: Observable<Item = A::Item, Err = A::Err>,
{
  type Item = A::Item;
  type Err = A::Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<A::Item, A::Err> + Send + 'static,
  {
    match self {
      AnyMerge::Flat(a) => a.actual_subscribe(subscriber),
      AnyMerge::Concat(b) => b.actual_subscribe(subscriber),
    }
  }
}

fn all_schedulers() -> Vec<Schedulers> {
  vec![
    Schedulers::Immediate,
    Schedulers::CurrentThread,
    #[cfg(all(feature = "event-loop", not(target_arch = "wasm32")))]
    Schedulers::EventLoop,
    #[cfg(all(feature = "event-loop", not(target_arch = "wasm32")))]
    Schedulers::SerializedEventLoop,
  ]
}

// Runs the pipeline and blocks until it completes.
fn collect<S>(source: S) -> Vec<S::Item>
where
  S: Observable<Err = Infallible>,
{
  use std::{sync::mpsc, time::Duration};

  let (tx, rx) = mpsc::channel();
  let values = Arc::new(Mutex::new(vec![]));
  let c_values = values.clone();
  source.subscribe_all(
    move |v| c_values.lock().unwrap().push(v),
    |_| {},
    move || {
      let _ = tx.send(());
    },
  );
  rx.recv_timeout(Duration::from_secs(5)).expect("pipeline did not complete");
  let mut values = values.lock().unwrap();
  std::mem::take(&mut *values)
}

#[rxcore_macro::test]
fn every_scheduler_yields_the_same_values() {
  for choice in all_schedulers() {
    let coordination = choice.coordination().unwrap();
    let inner = coordination.clone();
    let mut merged = collect(
      observable::iterate::<_, _, Infallible>(1..=3, coordination.clone()).flat_map_on(
        move |x| observable::iterate(0..x, inner.clone()),
        |x, y| x * 10 + y,
        coordination.clone(),
      ),
    );
    merged.sort();
    assert_eq!(merged, vec![10, 20, 21, 30, 31, 32], "{choice:?}");

    let inner = coordination.clone();
    let concatenated = collect(
      observable::iterate::<_, _, Infallible>(1..=3, coordination.clone()).concat_map_on(
        move |x| observable::iterate(0..x, inner.clone()),
        |x, y| x * 10 + y,
        coordination,
      ),
    );
    assert_eq!(concatenated, vec![10, 20, 21, 30, 31, 32], "{choice:?}");
  }
}

#[cfg(all(feature = "event-loop", not(target_arch = "wasm32")))]
mod event_loop {
  use std::{thread, time::Duration};

  use futures::channel::oneshot;

  use super::*;

  #[rxcore_macro::test]
  async fn flat_map_emits_all_eight_strings_then_completes() {
    let outer = observe_on_event_loop().unwrap();
    let inner = outer.clone();
    let values = Arc::new(Mutex::new(vec![]));
    let c_values = values.clone();
    let (tx, rx) = oneshot::channel();
    let mut tx = Some(tx);

    observable::iterate::<_, _, Infallible>(vec![4, 2], outer)
      .flat_map_on(
        move |_| observable::iterate(vec!["foo", "bar", "baz", "qux"], inner.clone()),
        |_, s| s,
        serialize_event_loop().unwrap(),
      )
      .subscribe_all(
        move |s| c_values.lock().unwrap().push(s),
        |_| {},
        move || {
          if let Some(tx) = tx.take() {
            let _ = tx.send(());
          }
        },
      );

    rx.await.unwrap();
    let mut values = values.lock().unwrap().clone();
    assert_eq!(values.len(), 8);
    values.sort();
    assert_eq!(values, vec!["bar", "bar", "baz", "baz", "foo", "foo", "qux", "qux"]);
  }

  #[rxcore_macro::test]
  fn disposing_stops_delivery_across_threads() {
    let coordination = serialize_event_loop().unwrap();
    let inner = coordination.clone();
    let count = Arc::new(Mutex::new(0_u64));
    let c_count = count.clone();

    let subscription = observable::iterate::<_, _, Infallible>(0..u64::MAX, coordination.clone())
      .flat_map_on(
        move |x| observable::iterate(vec![x], inner.clone()),
        |_, y| y,
        coordination,
      )
      .subscribe(move |_| *c_count.lock().unwrap() += 1);

    while *count.lock().unwrap() < 10 {
      thread::sleep(Duration::from_millis(1));
    }
    subscription.dispose();
    // A delivery that was already running may still land.
    thread::sleep(Duration::from_millis(20));
    let settled = *count.lock().unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(*count.lock().unwrap(), settled);
  }
}
