//! The two selector functions of the merge family of operators.
//!
//! A collection selector maps an upstream value to the inner observable to
//! merge. A result selector combines the upstream value with each item of
//! that inner observable. Both come in two flavours: [`WithoutErr`] wraps a
//! plain closure, [`WithErr`] one that returns `Result` so a failing
//! selector turns into an `error` signal downstream.

use crate::observable::Observable;

pub trait CollectionSelector<T, Err>: Send + Sync + 'static {
  type Collection: Observable<Err = Err>;

  fn select(&self, value: T) -> Result<Self::Collection, Err>;
}

pub trait ResultSelector<T, U, Err>: Send + Sync + 'static {
  type Output: Send + 'static;

  fn select(&self, value: T, item: U) -> Result<Self::Output, Err>;
}

/// Selector that cannot fail.
#[derive(Clone, Copy, Debug)]
pub struct WithoutErr<F>(pub F);

/// Selector whose failures become the stream's error.
#[derive(Clone, Copy, Debug)]
pub struct WithErr<F>(pub F);

impl<T, Err, F, C> CollectionSelector<T, Err> for WithoutErr<F>
where
  F: Fn(T) -> C + Send + Sync + 'static,
  C: Observable<Err = Err>,
{
  type Collection = C;

  #[inline]
  fn select(&self, value: T) -> Result<C, Err> { Ok((self.0)(value)) }
}

impl<T, Err, F, C> CollectionSelector<T, Err> for WithErr<F>
where
  F: Fn(T) -> Result<C, Err> + Send + Sync + 'static,
  C: Observable<Err = Err>,
{
  type Collection = C;

  #[inline]
  fn select(&self, value: T) -> Result<C, Err> { (self.0)(value) }
}

impl<T, U, Err, F, R> ResultSelector<T, U, Err> for WithoutErr<F>
where
  F: Fn(T, U) -> R + Send + Sync + 'static,
  R: Send + 'static,
{
  type Output = R;

  #[inline]
  fn select(&self, value: T, item: U) -> Result<R, Err> { Ok((self.0)(value, item)) }
}

impl<T, U, Err, F, R> ResultSelector<T, U, Err> for WithErr<F>
where
  F: Fn(T, U) -> Result<R, Err> + Send + Sync + 'static,
  R: Send + 'static,
{
  type Output = R;

  #[inline]
  fn select(&self, value: T, item: U) -> Result<R, Err> { (self.0)(value, item) }
}

/// Both selectors of one operator instance, shared by all its
/// subscriptions.
pub(crate) struct MergeSelectors<CS, RS> {
  pub(crate) collection: CS,
  pub(crate) result: RS,
}
