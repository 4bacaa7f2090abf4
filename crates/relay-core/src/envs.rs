//! Environment variables and the two-tier environment snapshot.
//!
//! Request templates and scripts read variables through an [`Envs`]
//! snapshot: the `global` set plus the currently `selected` environment.
//! Both tiers are ordered sequences, not maps — keys may repeat within and
//! across tiers, and lookups always take the first match.

use serde::{Deserialize, Serialize};

/// A single environment variable.
///
/// `key` must be non-empty. The `secret` flag is carried for the UI layer
/// (masked rendering); it is not enforced here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Variable name.
    pub key: String,
    /// Raw value; may contain `{{other}}` placeholders.
    pub value: String,
    /// Whether the UI should mask this value.
    #[serde(default)]
    pub secret: bool,
}

impl Variable {
    /// Create a non-secret variable.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            secret: false,
        }
    }
}

/// A two-tier environment snapshot.
///
/// Lookup scans `selected` first, then `global`; the first match wins, so a
/// `selected` entry shadows a `global` entry with the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envs {
    /// Variables from the global environment.
    pub global: Vec<Variable>,
    /// Variables from the currently selected environment.
    pub selected: Vec<Variable>,
}

impl Envs {
    /// Look up a variable by key, `selected` tier first.
    ///
    /// Absence is a normal empty result, not an error.
    pub fn get(&self, key: &str) -> Option<&Variable> {
        self.selected
            .iter()
            .chain(self.global.iter())
            .find(|v| v.key == key)
    }

    /// Copy-on-write update: returns a new snapshot with `key` set to
    /// `value`, leaving `self` untouched.
    ///
    /// The selected tier is the write target: an existing `selected` entry is
    /// updated in place, and any other key — including one shadowing a
    /// `global` entry — is appended to `selected`. The `global` tier is never
    /// written through this operation.
    #[must_use]
    pub fn with_var(&self, key: &str, value: &str) -> Envs {
        let mut next = self.clone();
        if let Some(var) = next.selected.iter_mut().find(|v| v.key == key) {
            var.value = value.to_string();
        } else {
            next.selected.push(Variable::new(key, value));
        }
        next
    }
}
