use std::marker::PhantomData;

use crate::{observable::Observable, observer::Observer, subscriber::Subscriber};

/// Creates an observable that produces no values and completes.
pub fn empty<Item, Err>() -> Empty<Item, Err> { Empty(PhantomData) }

/// Creates an observable that produces no values and errors with `err`.
pub fn throw_err<Item, Err>(err: Err) -> Throw<Item, Err> { Throw { err, _marker: PhantomData } }

/// Creates an observable that never emits anything, nor terminates.
pub fn never<Item, Err>() -> Never<Item, Err> { Never(PhantomData) }

pub struct Empty<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for Empty<Item, Err> {
  fn clone(&self) -> Self { Empty(PhantomData) }
}

impl<Item, Err> Observable for Empty<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut subscriber: Subscriber<O>)
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    subscriber.complete();
  }
}

pub struct Throw<Item, Err> {
  err: Err,
  _marker: PhantomData<fn() -> Item>,
}

impl<Item, Err: Clone> Clone for Throw<Item, Err> {
  fn clone(&self) -> Self { Throw { err: self.err.clone(), _marker: PhantomData } }
}

impl<Item, Err> Observable for Throw<Item, Err>
where
  Item: Send + 'static,
  Err: Clone + Send + Sync + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, mut subscriber: Subscriber<O>)
  where
    O: Observer<Item, Err> + Send + 'static,
  {
    subscriber.error(self.err.clone());
  }
}

pub struct Never<Item, Err>(PhantomData<fn() -> (Item, Err)>);

impl<Item, Err> Clone for Never<Item, Err> {
  fn clone(&self) -> Self { Never(PhantomData) }
}

impl<Item, Err> Observable for Never<Item, Err>
where
  Item: Send + 'static,
  Err: Send + 'static,
{
  type Item = Item;
  type Err = Err;

  fn actual_subscribe<O>(&self, _subscriber: Subscriber<O>)
  where
    O: Observer<Item, Err> + Send + 'static,
  {
  }
}
