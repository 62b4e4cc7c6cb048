// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name newtypes for states and triggers.
//!
//! States and triggers are identified by strings end to end (they come
//! in over the wire and go out in history records), so the newtypes
//! exist to keep the two namespaces from mixing and to hang the
//! recovery-trigger naming scheme off a type instead of ad-hoc string
//! munging at call sites.

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around `String`.
///
/// Generates `new()`, `as_str()`, `short()`, `Display`, `From<String>`,
/// `From<&str>`, `PartialEq<str>`, `PartialEq<&str>`, and `Borrow<str>`
/// implementations.
///
/// ```ignore
/// define_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId;
/// }
/// ```
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Returns a string slice truncated to at most `n` characters.
            pub fn short(&self, n: usize) -> &str {
                if self.0.len() <= n {
                    &self.0
                } else {
                    &self.0[..n]
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

crate::define_id! {
    /// Fully-qualified state name.
    ///
    /// Child states are underscore-joined onto their parent at graph
    /// build time (`operation` + `picking` → `operation_picking`), so a
    /// `StateName` is always unique within one graph.
    pub struct StateName;
}

impl StateName {
    /// Join a child's short name onto this state's full name.
    pub fn child(&self, short: &str) -> Self {
        Self(format!("{}_{}", self.0, short))
    }
}

crate::define_id! {
    /// Named input event for the state machine.
    pub struct TriggerName;
}

/// Prefix for the synthetic per-leaf recovery triggers.
const RECOVERY_PREFIX: &str = "recover__";

impl TriggerName {
    /// Synthetic trigger that re-enters `leaf` from `ready`.
    pub fn recovery(leaf: &StateName) -> Self {
        Self(format!("{}{}", RECOVERY_PREFIX, leaf))
    }

    /// Returns true if this is a synthetic recovery trigger.
    pub fn is_recovery(&self) -> bool {
        self.0.starts_with(RECOVERY_PREFIX)
    }

    /// Returns the leaf a recovery trigger re-enters, if this is one.
    pub fn recovery_target(&self) -> Option<&str> {
        self.0.strip_prefix(RECOVERY_PREFIX)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
