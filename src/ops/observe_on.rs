use crate::{
  coordination::{Coordination, Coordinator},
  observable::Observable,
  observer::Observer,
  subscriber::Subscriber,
};

/// Re-delivers the signals of `source` through a coordinator, e.g. onto a
/// worker of another scheduler.
#[derive(Clone)]
pub struct ObserveOnOp<S, C> {
  source: S,
  coordination: C,
}

impl<S, C> ObserveOnOp<S, C> {
  pub(crate) fn new(source: S, coordination: C) -> Self { ObserveOnOp { source, coordination } }
}

impl<S, C> Observable for ObserveOnOp<S, C>
where
  S: Observable,
  C: Coordination,
{
  type Item = S::Item;
  type Err = S::Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<S::Item, S::Err> + Send + 'static,
  {
    let coordinator = self.coordination.create_coordinator(subscriber.subscription());
    self.source.actual_subscribe(coordinator.out(subscriber));
  }
}
