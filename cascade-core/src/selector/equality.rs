//! Equality predicates used by the memoized pipeline.

use std::fmt;
use std::sync::Arc;

use super::value::{shallow_equal, shallow_equal_values, Props, Value};

/// Compares two state snapshots.
pub type StatesEq<S> = Arc<dyn Fn(&Arc<S>, &Arc<S>) -> bool + Send + Sync>;
/// Compares two props records.
pub type PropsEq = Arc<dyn Fn(&Props, &Props) -> bool + Send + Sync>;
/// Compares two stage outputs.
pub type ValuesEq = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// The four comparisons that gate recomputation.
///
/// Defaults: state snapshots by identity, everything else shallowly.
pub struct Equality<S> {
    pub are_states_equal: StatesEq<S>,
    pub are_own_props_equal: PropsEq,
    pub are_state_props_equal: ValuesEq,
    pub are_merged_props_equal: PropsEq,
}

impl<S> Equality<S> {
    pub fn states(mut self, eq: impl Fn(&Arc<S>, &Arc<S>) -> bool + Send + Sync + 'static) -> Self {
        self.are_states_equal = Arc::new(eq);
        self
    }

    pub fn own_props(mut self, eq: impl Fn(&Props, &Props) -> bool + Send + Sync + 'static) -> Self {
        self.are_own_props_equal = Arc::new(eq);
        self
    }

    pub fn state_props(mut self, eq: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.are_state_props_equal = Arc::new(eq);
        self
    }

    pub fn merged_props(
        mut self,
        eq: impl Fn(&Props, &Props) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.are_merged_props_equal = Arc::new(eq);
        self
    }
}

impl<S: 'static> Default for Equality<S> {
    fn default() -> Self {
        Self {
            are_states_equal: Arc::new(|a: &Arc<S>, b: &Arc<S>| Arc::ptr_eq(a, b)),
            are_own_props_equal: Arc::new(shallow_equal),
            are_state_props_equal: Arc::new(shallow_equal_values),
            are_merged_props_equal: Arc::new(shallow_equal),
        }
    }
}

impl<S> Clone for Equality<S> {
    fn clone(&self) -> Self {
        Self {
            are_states_equal: Arc::clone(&self.are_states_equal),
            are_own_props_equal: Arc::clone(&self.are_own_props_equal),
            are_state_props_equal: Arc::clone(&self.are_state_props_equal),
            are_merged_props_equal: Arc::clone(&self.are_merged_props_equal),
        }
    }
}

impl<S> fmt::Debug for Equality<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equality").finish_non_exhaustive()
    }
}
