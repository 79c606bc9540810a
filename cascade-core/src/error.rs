//! Error types for the consumer tree.
//!
//! Errors fall into three groups:
//!
//! - configuration and topology errors, returned eagerly from
//!   [`connect`](crate::connect::connect) or from mounting a node;
//! - selector runtime errors, captured by the
//!   [`DerivedSelector`](crate::selector::DerivedSelector) and returned from
//!   the next render;
//! - usage problems that are not errors at all and only show up as
//!   `tracing` warnings in debug builds.

use std::sync::Arc;

/// Boxed error returned by fallible mapping closures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced while configuring, mounting or rendering consumer nodes.
///
/// The type is `Clone` so a captured selector error can be handed out by
/// every render until the selector recovers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// No store reachable from a node that needs one.
    #[error(
        "could not find \"{store_key}\" in either the ambient context or the explicit \
         store of \"{display_name}\"; mount it under a Provider or pass the store explicitly"
    )]
    MissingStore {
        display_name: String,
        store_key: String,
    },

    /// A connect option failed validation.
    #[error("invalid option `{option}` for {method_name}(): {reason}")]
    InvalidOption {
        method_name: String,
        option: &'static str,
        reason: String,
    },

    /// Options document could not be parsed.
    #[error("failed to parse connect options: {0}")]
    Config(Arc<serde_json::Error>),

    /// A mapping stage failed while computing props.
    #[error("{method} failed in \"{display_name}\": {source}")]
    Mapping {
        method: &'static str,
        display_name: String,
        #[source]
        source: Arc<dyn std::error::Error + Send + Sync + 'static>,
    },

    /// A value that must be a record was something else.
    #[error("{method} in \"{display_name}\" must produce a record, got {found}")]
    NotARecord {
        method: &'static str,
        display_name: String,
        found: &'static str,
    },

    /// A stage returned a factory after its first invocation.
    #[error("{method} in \"{display_name}\" returned a factory after its first call")]
    UnexpectedFactory {
        method: &'static str,
        display_name: String,
    },
}

impl Error {
    pub(crate) fn mapping(method: &'static str, display_name: &str, source: BoxError) -> Self {
        Self::Mapping {
            method,
            display_name: display_name.to_owned(),
            source: Arc::from(source),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(Arc::new(err))
    }
}
