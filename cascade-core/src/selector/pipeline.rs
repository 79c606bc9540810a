//! The three-stage props pipeline.
//!
//! `state → map_state_to_props`, `dispatch → map_dispatch_to_props`, then
//! `merge_props(state_props, dispatch_props, own_props)`. A pure pipeline
//! remembers its last inputs and outputs and only re-runs the stages an
//! input change can affect; an impure one runs every stage every time.

use std::sync::Arc;

use crate::error::Result;
use crate::store::Dispatch;

use super::equality::Equality;
use super::map_to_props::StageProxy;
use super::merge::MergeProxy;
use super::value::{Props, Value};

/// Per-node stage instances.
pub(crate) struct Stages<S, A> {
    pub(crate) map_state: StageProxy<S>,
    pub(crate) map_dispatch: StageProxy<Dispatch<A>>,
    pub(crate) merge: MergeProxy,
    pub(crate) dispatch: Dispatch<A>,
}

struct Memo<S> {
    state: Arc<S>,
    own_props: Props,
    state_props: Value,
    dispatch_props: Value,
    merged: Props,
}

/// Final-props selector for one node.
pub(crate) struct PropsPipeline<S, A> {
    stages: Stages<S, A>,
    equality: Equality<S>,
    pure: bool,
    memo: Option<Memo<S>>,
}

impl<S, A> PropsPipeline<S, A> {
    pub(crate) fn new(stages: Stages<S, A>, equality: Equality<S>, pure: bool) -> Self {
        Self {
            stages,
            equality,
            pure,
            memo: None,
        }
    }

    /// Compute final props for `(state, own_props)`.
    pub(crate) fn select(&mut self, state: Arc<S>, own_props: &Props) -> Result<Props> {
        if !self.pure {
            return Self::run_all(&mut self.stages, &state, own_props).map(|memo| memo.merged);
        }

        if let Some(memo) = self.memo.as_mut() {
            return Self::subsequent(&mut self.stages, &self.equality, memo, state, own_props);
        }

        let memo = Self::run_all(&mut self.stages, &state, own_props)?;
        let merged = memo.merged.clone();
        self.memo = Some(memo);
        Ok(merged)
    }

    fn run_all(stages: &mut Stages<S, A>, state: &Arc<S>, own_props: &Props) -> Result<Memo<S>> {
        let state_props = stages.map_state.call(state, own_props)?;
        let dispatch_props = stages.map_dispatch.call(&stages.dispatch, own_props)?;
        let merged = stages.merge.call(&state_props, &dispatch_props, own_props)?;
        Ok(Memo {
            state: Arc::clone(state),
            own_props: own_props.clone(),
            state_props,
            dispatch_props,
            merged,
        })
    }

    fn subsequent(
        stages: &mut Stages<S, A>,
        equality: &Equality<S>,
        memo: &mut Memo<S>,
        state: Arc<S>,
        own_props: &Props,
    ) -> Result<Props> {
        let props_changed = !(equality.are_own_props_equal)(own_props, &memo.own_props);
        let state_changed = !(equality.are_states_equal)(&state, &memo.state);
        // Inputs are committed before any stage runs. A stage error leaves
        // them recorded, so the same inputs next time hit the cached props.
        memo.state = state;
        memo.own_props = own_props.clone();

        match (props_changed, state_changed) {
            (true, true) => {
                memo.state_props = stages.map_state.call(&memo.state, own_props)?;
                if stages.map_dispatch.depends_on_own_props() {
                    memo.dispatch_props = stages.map_dispatch.call(&stages.dispatch, own_props)?;
                }
                Self::merge(stages, memo)
            }
            (true, false) => {
                if stages.map_state.depends_on_own_props() {
                    memo.state_props = stages.map_state.call(&memo.state, own_props)?;
                }
                if stages.map_dispatch.depends_on_own_props() {
                    memo.dispatch_props = stages.map_dispatch.call(&stages.dispatch, own_props)?;
                }
                Self::merge(stages, memo)
            }
            (false, true) => {
                let next = stages.map_state.call(&memo.state, own_props)?;
                let unchanged = (equality.are_state_props_equal)(&next, &memo.state_props);
                memo.state_props = next;
                if unchanged {
                    Ok(memo.merged.clone())
                } else {
                    Self::merge(stages, memo)
                }
            }
            (false, false) => Ok(memo.merged.clone()),
        }
    }

    fn merge(stages: &mut Stages<S, A>, memo: &mut Memo<S>) -> Result<Props> {
        memo.merged = stages
            .merge
            .call(&memo.state_props, &memo.dispatch_props, &memo.own_props)?;
        Ok(memo.merged.clone())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
