//! Strong type definitions for Quill.
//!
//! Identifiers are newtypes to prevent mixing them with row counts or
//! schema versions at compile time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// A message identifier assigned by the store on insert.
///
/// Ids are positive, monotonically increasing and never reused while the
/// table exists.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

impl MessageId {
    /// Create a new MessageId from a raw row id.
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    /// Get the raw row id.
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for MessageId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl FromStr for MessageId {
    type Err = CoreError;

    /// Parse a decimal, strictly positive id. Signs and leading zeros are
    /// rejected so that every id has exactly one textual form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = !s.is_empty()
            && s.bytes().all(|b| b.is_ascii_digit())
            && !s.starts_with('0');
        if !well_formed {
            return Err(CoreError::InvalidId(s.to_string()));
        }
        s.parse::<i64>()
            .map(Self)
            .map_err(|_| CoreError::InvalidId(s.to_string()))
    }
}
