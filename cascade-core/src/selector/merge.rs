//! Merge stage: combines state props, dispatch props and own props.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};

use super::equality::PropsEq;
use super::map_to_props::verify_record;
use super::value::{Props, Value};

type MergeFn = Arc<dyn Fn(&Value, &Value, &Props) -> Result<Value, BoxError> + Send + Sync>;

/// User-supplied merge function.
#[derive(Clone)]
pub struct MergeProps {
    func: MergeFn,
}

impl MergeProps {
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&Value, &Value, &Props) -> Value + Send + Sync + 'static,
    {
        Self::try_new(move |state, dispatch, own| Ok(func(state, dispatch, own)))
    }

    pub fn try_new<F>(func: F) -> Self
    where
        F: Fn(&Value, &Value, &Props) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for MergeProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeProps").finish_non_exhaustive()
    }
}

/// `{ ...own_props, ...state_props, ...dispatch_props }`.
///
/// Stage outputs that are not records contribute nothing.
pub fn default_merge(state_props: &Value, dispatch_props: &Value, own_props: &Props) -> Props {
    let mut merged = own_props.clone();
    for value in [state_props, dispatch_props] {
        if let Value::Record(record) = value {
            merged.extend_from(record);
        }
    }
    // Never hand back the caller's own-props handle.
    if merged.ptr_eq(own_props) {
        merged = own_props.iter().map(|(k, v)| (k, v.clone())).collect();
    }
    merged
}

/// Per-node merge stage with its cached result.
pub(crate) struct MergeProxy {
    display_name: Arc<str>,
    merge: Option<MergeProps>,
    pure: bool,
    are_merged_props_equal: PropsEq,
    cached: Option<Props>,
}

impl MergeProxy {
    pub(crate) fn new(
        display_name: Arc<str>,
        merge: Option<MergeProps>,
        pure: bool,
        are_merged_props_equal: PropsEq,
    ) -> Self {
        Self {
            display_name,
            merge,
            pure,
            are_merged_props_equal,
            cached: None,
        }
    }

    /// Merge and return the cached record if the result compares equal.
    pub(crate) fn call(
        &mut self,
        state_props: &Value,
        dispatch_props: &Value,
        own_props: &Props,
    ) -> Result<Props> {
        let next = match &self.merge {
            None => default_merge(state_props, dispatch_props, own_props),
            Some(merge) => {
                let value = (merge.func)(state_props, dispatch_props, own_props)
                    .map_err(|err| Error::mapping("merge_props", &self.display_name, err))?;
                self.coerce(value)?
            }
        };

        match &self.cached {
            Some(cached) if self.pure && (self.are_merged_props_equal)(&next, cached) => {
                Ok(cached.clone())
            }
            _ => {
                self.cached = Some(next.clone());
                Ok(next)
            }
        }
    }

    fn coerce(&self, value: Value) -> Result<Props> {
        if self.cached.is_none() {
            verify_record(&value, "merge_props", &self.display_name);
        }
        match value {
            Value::Record(props) => Ok(props),
            Value::Null => Ok(Props::new()),
            other => Err(Error::NotARecord {
                method: "merge_props",
                display_name: self.display_name.to_string(),
                found: other.kind(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
