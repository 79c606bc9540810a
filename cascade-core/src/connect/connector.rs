//! Connector configuration.
//!
//! [`connect`] starts a builder that collects the mapping stages, the merge
//! function, equality predicates and options for one wrapped component.
//! The resulting [`Connector`] is shared by every node mounted from it and
//! stamps out a fresh [`DerivedSelector`] per node, so factories and caches
//! never leak between instances.

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::selector::{
    DerivedSelector, Equality, MapToProps, MergeProps, MergeProxy, Props, PropsPipeline,
    StageProxy, Stages, Value,
};
use crate::store::{Dispatch, Store};

use super::options::ConnectOptions;

const MAP_STATE: &str = "map_state_to_props";
const MAP_DISPATCH: &str = "map_dispatch_to_props";

/// Start configuring a connector for the component called `wrapped_name`.
pub fn connect<St: Store>(wrapped_name: impl Into<String>) -> ConnectBuilder<St> {
    ConnectBuilder {
        wrapped_name: wrapped_name.into(),
        map_state: None,
        map_dispatch: None,
        merge: None,
        equality: Equality::default(),
        options: ConnectOptions::default(),
    }
}

/// Builder returned by [`connect`].
pub struct ConnectBuilder<St: Store> {
    wrapped_name: String,
    map_state: Option<MapToProps<St::State>>,
    map_dispatch: Option<MapToProps<Dispatch<St::Action>>>,
    merge: Option<MergeProps>,
    equality: Equality<St::State>,
    options: ConnectOptions,
}

impl<St: Store> ConnectBuilder<St> {
    pub fn map_state(mut self, map: MapToProps<St::State>) -> Self {
        self.map_state = Some(map);
        self
    }

    pub fn map_dispatch(mut self, map: MapToProps<Dispatch<St::Action>>) -> Self {
        self.map_dispatch = Some(map);
        self
    }

    pub fn merge(mut self, merge: MergeProps) -> Self {
        self.merge = Some(merge);
        self
    }

    pub fn equality(mut self, equality: Equality<St::State>) -> Self {
        self.equality = equality;
        self
    }

    pub fn options(mut self, options: ConnectOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<Arc<Connector<St>>> {
        self.options.validate()?;

        let handles_state_changes = self
            .options
            .should_handle_state_changes
            .unwrap_or(self.map_state.is_some());
        let display_name: Arc<str> = Arc::from(format!("Connect({})", self.wrapped_name));

        tracing::debug!(
            display_name = %display_name,
            pure = self.options.pure,
            handles_state_changes,
            "connector built"
        );

        Ok(Arc::new(Connector {
            display_name,
            wrapped_name: self.wrapped_name,
            map_state: self.map_state,
            map_dispatch: self.map_dispatch,
            merge: self.merge,
            equality: self.equality,
            options: self.options,
            handles_state_changes,
        }))
    }
}

/// Frozen connect configuration for one wrapped component.
pub struct Connector<St: Store> {
    display_name: Arc<str>,
    wrapped_name: String,
    map_state: Option<MapToProps<St::State>>,
    map_dispatch: Option<MapToProps<Dispatch<St::Action>>>,
    merge: Option<MergeProps>,
    equality: Equality<St::State>,
    options: ConnectOptions,
    handles_state_changes: bool,
}

impl<St: Store> Connector<St> {
    /// `Connect(<wrapped name>)`.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn wrapped_name(&self) -> &str {
        &self.wrapped_name
    }

    pub fn options(&self) -> &ConnectOptions {
        &self.options
    }

    /// Whether nodes from this connector subscribe to state changes.
    pub fn handles_state_changes(&self) -> bool {
        self.handles_state_changes
    }

    /// Fresh selector bound to `store`.
    pub fn make_selector(&self, store: Arc<St>) -> DerivedSelector<St> {
        let name = &self.display_name;
        let dispatch = Dispatch::from_store(Arc::clone(&store));

        let map_state = match &self.map_state {
            Some(map) => StageProxy::new(MAP_STATE, Arc::clone(name), map.clone()),
            None => StageProxy::constant(MAP_STATE, Arc::clone(name), Value::Record(Props::new())),
        };
        let map_dispatch = match &self.map_dispatch {
            Some(map) => StageProxy::new(MAP_DISPATCH, Arc::clone(name), map.clone()),
            None => {
                let props = Props::from([("dispatch", Value::opaque(dispatch.clone()))]);
                StageProxy::constant(MAP_DISPATCH, Arc::clone(name), Value::Record(props))
            }
        };
        let merge = MergeProxy::new(
            Arc::clone(name),
            self.merge.clone(),
            self.options.pure,
            Arc::clone(&self.equality.are_merged_props_equal),
        );

        let stages = Stages {
            map_state,
            map_dispatch,
            merge,
            dispatch,
        };
        let pipeline = PropsPipeline::new(stages, self.equality.clone(), self.options.pure);
        DerivedSelector::new(pipeline, store)
    }
}

impl<St: Store> fmt::Debug for Connector<St> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connector")
            .field("display_name", &self.display_name)
            .field("has_map_state", &self.map_state.is_some())
            .field("has_map_dispatch", &self.map_dispatch.is_some())
            .field("has_merge", &self.merge.is_some())
            .field("options", &self.options)
            .field("handles_state_changes", &self.handles_state_changes)
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
