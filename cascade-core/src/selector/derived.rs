//! Derived Selector
//!
//! A `DerivedSelector` is the per-node cache of derived props. It owns the
//! node's [`PropsPipeline`](super::pipeline) and remembers the last props it
//! produced.
//!
//! # How a Run Works
//!
//! 1. Read the current state snapshot from the store.
//!
//! 2. Evaluate the pipeline against `(state, own_props)`.
//!
//! 3. If the pipeline handed back the same props record as last time, the
//!    run is unchanged. The pipeline already applied the merged-props
//!    equality, so identity is the only test needed here.
//!
//! 4. If the props differ, store them and raise `should_update`.
//!
//! 5. If the pipeline failed, keep the last props, capture the error and
//!    raise `should_update` anyway, so the next render can surface it.
//!
//! # Flags
//!
//! `changed()` describes the most recent run only. `should_update()` is
//! sticky: once raised it stays raised until a render consumes it with
//! [`take_should_update`](DerivedSelector::take_should_update). That is the
//! flag the owning node consults before propagating.
//!
//! After [`retire`](DerivedSelector::retire) the selector is inert: `run`
//! does nothing and `changed()` stays false.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::store::Store;

use super::pipeline::PropsPipeline;
use super::value::Props;

/// Whether a selector still responds to `run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorPhase {
    Active,
    /// The owning node unmounted. Terminal.
    Retired,
}

/// Memoized derived-props state for one consumer node.
pub struct DerivedSelector<St: Store> {
    pipeline: PropsPipeline<St::State, St::Action>,
    store: Arc<St>,
    props: Option<Props>,
    changed: bool,
    should_update: bool,
    error: Option<Error>,
    phase: SelectorPhase,
}

impl<St: Store> DerivedSelector<St> {
    pub(crate) fn new(pipeline: PropsPipeline<St::State, St::Action>, store: Arc<St>) -> Self {
        Self {
            pipeline,
            store,
            props: None,
            changed: false,
            should_update: false,
            error: None,
            phase: SelectorPhase::Active,
        }
    }

    /// Recompute derived props for `own_props`.
    pub fn run(&mut self, own_props: &Props) {
        if self.phase == SelectorPhase::Retired {
            self.changed = false;
            return;
        }

        let state = self.store.get_state();
        match self.pipeline.select(state, own_props) {
            Ok(next) => {
                let same = self.props.as_ref().is_some_and(|last| last.ptr_eq(&next));
                self.changed = !same || self.error.is_some();
                if self.changed {
                    self.props = Some(next);
                    self.error = None;
                    self.should_update = true;
                }
            }
            Err(err) => {
                tracing::trace!(error = %err, "selector run failed");
                self.changed = true;
                self.should_update = true;
                self.error = Some(err);
            }
        }
    }

    /// Whether the most recent run produced new props or an error.
    pub fn changed(&self) -> bool {
        self.changed
    }

    /// Whether a render is owed since the last one.
    pub fn should_update(&self) -> bool {
        self.should_update
    }

    /// Consume the pending-render flag.
    pub fn take_should_update(&mut self) -> bool {
        std::mem::take(&mut self.should_update)
    }

    /// Error captured by the most recent failing run, if not yet recovered.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Last successfully derived props.
    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    /// Stop responding to `run`. Idempotent.
    pub fn retire(&mut self) {
        self.phase = SelectorPhase::Retired;
        self.changed = false;
        self.should_update = false;
    }

    pub fn phase(&self) -> SelectorPhase {
        self.phase
    }
}

impl<St: Store> fmt::Debug for DerivedSelector<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedSelector")
            .field("props", &self.props)
            .field("changed", &self.changed)
            .field("should_update", &self.should_update)
            .field("error", &self.error)
            .field("phase", &self.phase)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
