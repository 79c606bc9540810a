//! Mapping functions for the state and dispatch stages.
//!
//! A [`MapToProps`] turns a stage input (a state snapshot or a dispatch
//! handle) plus the node's own props into a props value. Each mapping also
//! carries its declared [`Arity`], from which the pipeline infers whether
//! the stage reads own props at all; stages that do not are skipped when
//! only own props change.
//!
//! On its first call a mapping may return [`Mapped::Factory`] instead of a
//! value. The returned mapping then permanently replaces the stage for that
//! node, and the dependency flag is inferred again from the replacement.

use std::fmt;
use std::sync::Arc;

use crate::error::{BoxError, Error, Result};

use super::value::{Props, Value};

/// Declared positional parameter count of a mapping function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    /// Takes its arguments as a rest list.
    Variadic,
}

/// Decide whether a stage depends on own props.
///
/// An explicit flag always wins. Otherwise a mapping that takes exactly one
/// parameter is assumed not to read own props, and anything else, including
/// zero parameters and variadic mappings, is assumed to read them.
///
/// This is an approximation: a variadic mapping cannot be told apart from
/// one that really ignores its arguments, so both are treated as dependent.
pub fn infer_dependency(explicit: Option<bool>, arity: Arity) -> bool {
    match explicit {
        Some(flag) => flag,
        None => arity != Arity::Fixed(1),
    }
}

/// Result of one mapping call.
pub enum Mapped<I> {
    /// A props value; normally a record.
    Value(Value),
    /// A replacement mapping for this node. Only honored on the first call.
    Factory(MapToProps<I>),
}

impl<I> Mapped<I> {
    pub fn factory(map: MapToProps<I>) -> Self {
        Mapped::Factory(map)
    }
}

impl<I> From<Props> for Mapped<I> {
    fn from(props: Props) -> Self {
        Mapped::Value(Value::Record(props))
    }
}

impl<I> From<Value> for Mapped<I> {
    fn from(value: Value) -> Self {
        Mapped::Value(value)
    }
}

type MapFn<I> = Arc<dyn Fn(&I, &Props) -> Result<Mapped<I>, BoxError> + Send + Sync>;

/// A mapping function plus its dependency metadata.
pub struct MapToProps<I> {
    func: MapFn<I>,
    arity: Arity,
    explicit: Option<bool>,
}

impl<I: 'static> MapToProps<I> {
    /// General constructor for a fallible mapping with a declared arity.
    pub fn from_fn<F>(arity: Arity, func: F) -> Self
    where
        F: Fn(&I, &Props) -> Result<Mapped<I>, BoxError> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(func),
            arity,
            explicit: None,
        }
    }

    /// Mapping that takes no parameters.
    pub fn nullary<F>(func: F) -> Self
    where
        F: Fn() -> Mapped<I> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Fixed(0), move |_, _| Ok(func()))
    }

    /// Mapping that reads only the stage input.
    pub fn unary<F>(func: F) -> Self
    where
        F: Fn(&I) -> Mapped<I> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Fixed(1), move |input, _| Ok(func(input)))
    }

    /// Mapping that reads the stage input and own props.
    pub fn binary<F>(func: F) -> Self
    where
        F: Fn(&I, &Props) -> Mapped<I> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Fixed(2), move |input, props| Ok(func(input, props)))
    }

    /// Mapping that takes its arguments as a rest list.
    pub fn variadic<F>(func: F) -> Self
    where
        F: Fn(&I, &Props) -> Mapped<I> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Variadic, move |input, props| Ok(func(input, props)))
    }

    /// Fallible [`unary`](Self::unary).
    pub fn try_unary<F>(func: F) -> Self
    where
        F: Fn(&I) -> Result<Mapped<I>, BoxError> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Fixed(1), move |input, _| func(input))
    }

    /// Fallible [`binary`](Self::binary).
    pub fn try_binary<F>(func: F) -> Self
    where
        F: Fn(&I, &Props) -> Result<Mapped<I>, BoxError> + Send + Sync + 'static,
    {
        Self::from_fn(Arity::Fixed(2), func)
    }
}

impl<I> MapToProps<I> {
    /// Declare the own-props dependency instead of inferring it.
    pub fn depends_on_own_props(mut self, flag: bool) -> Self {
        self.explicit = Some(flag);
        self
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// Effective dependency flag.
    pub fn dependency(&self) -> bool {
        infer_dependency(self.explicit, self.arity)
    }

    fn call(&self, input: &I, own_props: &Props) -> Result<Mapped<I>, BoxError> {
        (self.func)(input, own_props)
    }
}

impl<I> Clone for MapToProps<I> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            arity: self.arity,
            explicit: self.explicit,
        }
    }
}

impl<I> fmt::Debug for MapToProps<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MapToProps")
            .field("arity", &self.arity)
            .field("explicit", &self.explicit)
            .finish()
    }
}

/// Warn (debug builds only) when a stage produced something other than a
/// record.
pub(crate) fn verify_record(value: &Value, method: &'static str, display_name: &str) {
    if cfg!(debug_assertions) && !matches!(value, Value::Record(_)) {
        tracing::warn!(
            method,
            display_name,
            found = value.kind(),
            "mapping should return a record"
        );
    }
}

enum StageKind<I> {
    Constant(Value),
    /// Not called yet; factory detection still pending.
    Pending(MapToProps<I>),
    Ready {
        map: MapToProps<I>,
        depends_on_own_props: bool,
    },
}

/// Per-node wrapper around one mapping stage.
pub(crate) struct StageProxy<I> {
    method: &'static str,
    display_name: Arc<str>,
    kind: StageKind<I>,
}

impl<I> StageProxy<I> {
    /// Stage that always yields `value` and never reads own props.
    pub(crate) fn constant(method: &'static str, display_name: Arc<str>, value: Value) -> Self {
        Self {
            method,
            display_name,
            kind: StageKind::Constant(value),
        }
    }

    pub(crate) fn new(method: &'static str, display_name: Arc<str>, map: MapToProps<I>) -> Self {
        Self {
            method,
            display_name,
            kind: StageKind::Pending(map),
        }
    }

    /// Whether a props-only change must re-run this stage.
    ///
    /// A stage that has not run yet reports `true` so its first call sees
    /// own props.
    pub(crate) fn depends_on_own_props(&self) -> bool {
        match &self.kind {
            StageKind::Constant(_) => false,
            StageKind::Pending(_) => true,
            StageKind::Ready {
                depends_on_own_props,
                ..
            } => *depends_on_own_props,
        }
    }

    pub(crate) fn call(&mut self, input: &I, own_props: &Props) -> Result<Value> {
        let map = match &mut self.kind {
            StageKind::Constant(value) => return Ok(value.clone()),
            StageKind::Ready {
                map,
                depends_on_own_props,
            } => {
                let mapped = Self::invoke(map, *depends_on_own_props, input, own_props)
                    .map_err(|err| Error::mapping(self.method, &self.display_name, err))?;
                return self.expect_value(mapped);
            }
            StageKind::Pending(map) => map.clone(),
        };
        self.first_call(map, input, own_props)
    }

    fn first_call(&mut self, map: MapToProps<I>, input: &I, own_props: &Props) -> Result<Value> {
        // Settle on the real mapping before invoking it, so a failure here
        // does not retry factory detection on the next call.
        let depends_on_own_props = map.dependency();
        self.kind = StageKind::Ready {
            map: map.clone(),
            depends_on_own_props,
        };

        let mapped = Self::invoke(&map, depends_on_own_props, input, own_props)
            .map_err(|err| Error::mapping(self.method, &self.display_name, err))?;

        let value = match mapped {
            Mapped::Value(value) => value,
            Mapped::Factory(replacement) => {
                let depends_on_own_props = replacement.dependency();
                tracing::trace!(
                    method = self.method,
                    depends_on_own_props,
                    "stage specialized by factory"
                );
                self.kind = StageKind::Ready {
                    map: replacement.clone(),
                    depends_on_own_props,
                };
                let mapped = Self::invoke(&replacement, depends_on_own_props, input, own_props)
                    .map_err(|err| Error::mapping(self.method, &self.display_name, err))?;
                self.expect_value(mapped)?
            }
        };

        verify_record(&value, self.method, &self.display_name);
        Ok(value)
    }

    fn invoke(
        map: &MapToProps<I>,
        depends_on_own_props: bool,
        input: &I,
        own_props: &Props,
    ) -> Result<Mapped<I>, BoxError> {
        if depends_on_own_props {
            map.call(input, own_props)
        } else {
            map.call(input, &Props::new())
        }
    }

    fn expect_value(&self, mapped: Mapped<I>) -> Result<Value> {
        match mapped {
            Mapped::Value(value) => Ok(value),
            Mapped::Factory(_) => Err(Error::UnexpectedFactory {
                method: self.method,
                display_name: self.display_name.to_string(),
            }),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
