//! Operators. Construct them through
//! [`ObservableExt`](crate::observable::ObservableExt).

pub mod concat_map;
pub mod flat_map;
pub mod observe_on;
