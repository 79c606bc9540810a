//! Connect options.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-connector configuration.
///
/// Deserializable so options can live in a config file:
///
/// ```
/// use cascade_core::connect::ConnectOptions;
///
/// let options = ConnectOptions::from_json(r#"{ "pure": false, "render_count_prop": "renders" }"#)
///     .unwrap();
/// assert!(!options.pure);
/// assert_eq!(options.store_key, "store");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectOptions {
    /// Memoize the pipeline. With `false` every stage runs on every call.
    pub pure: bool,
    /// Name of the store in the ambient context, used in diagnostics.
    pub store_key: String,
    /// Name of the connecting function, used in diagnostics.
    pub method_name: String,
    /// If set, render output carries the node's render count under this key.
    pub render_count_prop: Option<String>,
    /// Subscribe to the store. `None` means "only if a state stage exists".
    pub should_handle_state_changes: Option<bool>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            pure: true,
            store_key: String::from("store"),
            method_name: String::from("connect"),
            render_count_prop: None,
            should_handle_state_changes: None,
        }
    }
}

impl ConnectOptions {
    /// Parse and validate options from a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    /// Reject options that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.store_key.is_empty() {
            return Err(self.invalid("store_key", "must not be empty"));
        }
        if self.method_name.is_empty() {
            return Err(self.invalid("method_name", "must not be empty"));
        }
        if self.render_count_prop.as_deref() == Some("") {
            return Err(self.invalid("render_count_prop", "must not be empty when set"));
        }
        Ok(())
    }

    fn invalid(&self, option: &'static str, reason: &str) -> Error {
        Error::InvalidOption {
            method_name: self.method_name.clone(),
            option,
            reason: reason.to_owned(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
