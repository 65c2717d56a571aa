use std::{marker::PhantomData, sync::Arc};

use crate::{
  observable::Observable,
  observer::{BoxObserver, Observer},
  subscriber::Subscriber,
};

/// Creates an observable from a subscribe function. `subscribe` runs once
/// per subscription and is handed the (type-erased) subscriber to emit
/// into. Long running producers should watch
/// [`Subscriber::is_disposed`] and stop early.
///
/// ```rust
/// use std::convert::Infallible;
/// use rxcore::prelude::*;
///
/// let source = observable::create(|mut subscriber: Subscriber<BoxObserver<i32, Infallible>>| {
///   subscriber.next(1);
///   subscriber.next(2);
///   subscriber.complete();
/// });
/// source.subscribe(|v| println!("{v}"));
/// ```
pub fn create<Item, Err, F>(subscribe: F) -> Create<F, Item, Err>
where
  F: Fn(Subscriber<BoxObserver<Item, Err>>) + Send + Sync + 'static,
{
  Create { subscribe: Arc::new(subscribe), _marker: PhantomData }
}

pub struct Create<F, Item, Err> {
  subscribe: Arc<F>,
  _marker: PhantomData<fn() -> (Item, Err)>,
}

impl<F, Item, Err> Clone for Create<F, Item, Err> {
  fn clone(&self) -> Self { Create { subscribe: self.subscribe.clone(), _marker: PhantomData } }
}

impl<F, Item, Err> Observable for Create<F, Item, Err>
where
  F: Fn(Subscriber<BoxObserver<Item, Err>>) + Send + Sync + 'static,
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, subscriber: Subscriber<O>)
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    (self.subscribe)(subscriber.map_observer(|o| Box::new(o) as BoxObserver<Item, Err>))
  }
}
