//! Identity types for Student Wall entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Textual form of the distinguished anonymous principal.
pub const ANONYMOUS_PRINCIPAL_TEXT: &str = "2vxsx-fae";

/// Opaque identifier naming a caller to the remote service.
///
/// The client never interprets the text beyond comparing it against the
/// anonymous principal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    /// Wrap the textual form of a principal.
    pub fn from_text(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    /// The anonymous principal used by unauthenticated callers.
    pub fn anonymous() -> Self {
        Self(ANONYMOUS_PRINCIPAL_TEXT.to_string())
    }

    pub fn is_anonymous(&self) -> bool {
        self.0 == ANONYMOUS_PRINCIPAL_TEXT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Shared behaviour for the numeric identifiers assigned by the backend.
pub trait NumericId: Copy + fmt::Display {
    /// Entity name used in error messages and log fields.
    const ENTITY: &'static str;

    fn new(value: u64) -> Self;

    fn value(&self) -> u64;
}

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $entity:literal) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl NumericId for $name {
            const ENTITY: &'static str = $entity;

            fn new(value: u64) -> Self {
                Self(value)
            }

            fn value(&self) -> u64 {
                self.0
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>().map(Self)
            }
        }
    };
}

numeric_id!(
    /// Identifier of a message on the wall.
    MessageId,
    "message"
);

numeric_id!(
    /// Identifier of a homework diary entry.
    HomeworkId,
    "homework"
);
