// crates/dialog-state-core/src/core/identifiers.rs
// ============================================================================
// Module: Dialog State Identifiers
// Description: State identifiers and substate key derivation.
// Purpose: Provide a typed key for sessions with a stable wire form.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`StateId`] names one conversation's session row. Substates (for example
//! a context blob) live under derived keys of the form
//! `<parent>___<substate>`, so deleting a conversation can remove its
//! substates without a secondary index.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Separator between a parent state id and a substate name.
pub const SUBSTATE_SEPARATOR: &str = "___";

/// Substate removed alongside its parent when the caller does not specify any.
pub const DEFAULT_SUBSTATE: &str = "context";

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Identifier of a persisted session.
///
/// # Invariants
/// - Opaque UTF-8 string; emptiness is rejected by the state store, not here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    /// Creates a new state identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the identifier is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Derives the key for a named substate of this session.
    #[must_use]
    pub fn substate(&self, name: &str) -> Self {
        Self(format!("{}{SUBSTATE_SEPARATOR}{name}", self.0))
    }

    /// Builds the full set of keys removed when deleting this session.
    ///
    /// The parent key comes first, followed by one derived key per substate in
    /// input order. Duplicate substate names collapse to a single key.
    #[must_use]
    pub fn deletion_keys<S: AsRef<str>>(&self, substates: &[S]) -> Vec<Self> {
        let mut keys = Vec::with_capacity(substates.len() + 1);
        keys.push(self.clone());
        for name in substates {
            let key = self.substate(name.as_ref());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for StateId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for StateId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn substate_key_uses_triple_underscore() {
        let id = StateId::new("conv1");
        assert_eq!(id.substate("context").as_str(), "conv1___context");
    }

    #[test]
    fn deletion_keys_without_substates_is_parent_only() {
        let id = StateId::new("conv1");
        let keys = id.deletion_keys::<&str>(&[]);
        assert_eq!(keys, vec![StateId::new("conv1")]);
    }

    #[test]
    fn deletion_keys_collapse_duplicates() {
        let id = StateId::new("conv1");
        let keys = id.deletion_keys(&["context", "context", "slots"]);
        let raw: Vec<&str> = keys.iter().map(StateId::as_str).collect();
        assert_eq!(raw, vec!["conv1", "conv1___context", "conv1___slots"]);
    }

    #[test]
    fn blank_ids_are_detected() {
        assert!(StateId::new("").is_blank());
        assert!(StateId::new("  ").is_blank());
        assert!(!StateId::new("a").is_blank());
    }

    proptest! {
        #[test]
        fn deletion_keys_always_start_with_parent(
            parent in "[a-z0-9-]{1,16}",
            names in proptest::collection::vec("[a-z]{1,8}", 0..6),
        ) {
            let id = StateId::new(parent.clone());
            let keys = id.deletion_keys(&names);
            prop_assert_eq!(keys[0].as_str(), parent.as_str());
            for name in &names {
                let expected = format!("{parent}___{name}");
                prop_assert!(keys.iter().any(|key| key.as_str() == expected));
            }
            prop_assert!(keys.len() <= names.len() + 1);
        }
    }
}
