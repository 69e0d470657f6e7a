//! Logical type names for payloads and aggregates.
//!
//! Names are dot-separated segments (`accounts.funds_deposited`). Each segment
//! is made of ASCII alphanumerics, `_` or `-`. The single character `*` is
//! reserved for wildcard subscriptions and is never a valid type name.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest accepted type name, in bytes.
pub const MAX_TYPE_NAME_LEN: usize = 255;

/// Reserved marker for "every event type".
pub const WILDCARD: &str = "*";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid type name '{name}': {reason}")]
pub struct InvalidTypeName {
    pub name: String,
    pub reason: &'static str,
}

/// Check a name against the type-name grammar.
pub fn validate_type_name(name: &str) -> Result<(), InvalidTypeName> {
    let fail = |reason| {
        Err(InvalidTypeName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return fail("name is empty");
    }
    if name == WILDCARD {
        return fail("'*' is reserved for wildcard subscriptions");
    }
    if name.len() > MAX_TYPE_NAME_LEN {
        return fail("name is longer than 255 bytes");
    }
    for segment in name.split('.') {
        if segment.is_empty() {
            return fail("name contains an empty segment");
        }
        if !segment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
        {
            return fail("segments may only contain ASCII alphanumerics, '_' or '-'");
        }
    }
    Ok(())
}

macro_rules! impl_type_name {
    ($t:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $t(Cow<'static, str>);

        impl $t {
            /// Validated constructor.
            pub fn new(name: impl Into<String>) -> Result<Self, InvalidTypeName> {
                let name = name.into();
                validate_type_name(&name)?;
                Ok(Self(Cow::Owned(name)))
            }

            /// Unchecked constructor for compile-time constants.
            ///
            /// The name is validated again wherever it is registered.
            pub const fn from_static(name: &'static str) -> Self {
                Self(Cow::Borrowed(name))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Re-run grammar validation (relevant for `from_static` names).
            pub fn validate(&self) -> Result<(), InvalidTypeName> {
                validate_type_name(&self.0)
            }
        }

        impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl TryFrom<String> for $t {
            type Error = InvalidTypeName;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0.into_owned()
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_type_name!(PayloadType);
impl_type_name!(AggregateType);
