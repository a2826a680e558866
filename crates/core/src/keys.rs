//! Validated string keys authored in process definitions.
//!
//! Unlike the runtime identifiers in [`crate::id`], keys are chosen by the
//! author of a definition and survive across engine restarts, so they are
//! kept as readable strings. Construction trims surrounding whitespace and
//! rejects empty, oversized, or control-character input.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Maximum allowed length of any definition key, in bytes.
pub const KEY_MAX_LEN: usize = 128;

/// Errors from constructing a definition key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    /// The input was empty or contained only whitespace.
    #[error("key cannot be empty or whitespace")]
    Empty,
    /// The key contains control characters.
    #[error("key contains control characters")]
    InvalidCharacters,
    /// The key exceeds [`KEY_MAX_LEN`] bytes.
    #[error("key exceeds maximum length of {KEY_MAX_LEN} bytes")]
    TooLong,
}

fn validate(raw: &str) -> Result<String, KeyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(KeyError::Empty);
    }
    if trimmed.chars().any(char::is_control) {
        return Err(KeyError::InvalidCharacters);
    }
    if trimmed.len() > KEY_MAX_LEN {
        return Err(KeyError::TooLong);
    }
    Ok(trimmed.to_owned())
}

macro_rules! string_key {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Create a new key, trimming and validating the input.
            pub fn new(raw: &str) -> Result<Self, KeyError> {
                validate(raw).map(Self)
            }

            /// Return the inner string slice.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = KeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }

        impl TryFrom<&str> for $name {
            type Error = KeyError;

            fn try_from(value: &str) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl TryFrom<String> for $name {
            type Error = KeyError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(&value)
            }
        }

        impl From<$name> for String {
            fn from(key: $name) -> Self {
                key.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
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
    };
}

string_key!(
    /// Identifier of a registered process definition (e.g. `"order-fulfilment"`).
    ProcessKey
);

string_key!(
    /// Identifier of a node within one process definition.
    NodeKey
);

string_key!(
    /// Task-type key a work item handler is registered under (e.g. `"Human Task"`).
    TaskType
);
