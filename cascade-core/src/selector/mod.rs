//! Derived props.
//!
//! This module turns `(state, own_props)` into the props a node renders
//! with:
//!
//! - `value`: the dynamic [`Props`] record and its shallow equality
//! - `map_to_props`: state and dispatch mapping stages, with own-props
//!   dependency inference and first-call factories
//! - `merge`: the merge stage
//! - `equality`: the predicates that gate recomputation
//! - `pipeline`: the memoized three-stage pipeline
//! - `derived`: the per-node [`DerivedSelector`]

mod derived;
mod equality;
mod map_to_props;
mod merge;
mod pipeline;
mod value;

pub use derived::{DerivedSelector, SelectorPhase};
pub use equality::{Equality, PropsEq, StatesEq, ValuesEq};
pub use map_to_props::{infer_dependency, Arity, MapToProps, Mapped};
pub use merge::{default_merge, MergeProps};
pub use value::{shallow_equal, shallow_equal_values, Callback, Opaque, Props, Value};

pub(crate) use map_to_props::StageProxy;
pub(crate) use merge::MergeProxy;
pub(crate) use pipeline::{PropsPipeline, Stages};
