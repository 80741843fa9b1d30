//! Content addresses and routing.
//!
//! An [`Address`] has the shape `scheme://authority/segment/segment...`.
//! The [`Contract`] for a provider recognizes exactly two shapes under its
//! authority: the collection (`content://<authority>/messages`) and a single
//! record (`content://<authority>/messages/<id>`). Everything else has no
//! [`Route`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::types::MessageId;

/// Scheme used by every provider address.
pub const CONTENT_SCHEME: &str = "content";

/// Default provider authority.
pub const DEFAULT_AUTHORITY: &str = "quill.messages.provider";

/// Path segment naming the messages collection.
pub const PATH_MESSAGES: &str = "messages";

/// A parsed content address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    scheme: String,
    authority: String,
    segments: Vec<String>,
}

impl Address {
    /// Parse an address string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let invalid = || CoreError::InvalidAddress(s.to_string());

        let (scheme, rest) = s.split_once("://").ok_or_else(invalid)?;
        let scheme_ok = !scheme.is_empty()
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if !scheme_ok {
            return Err(invalid());
        }

        let (authority, path) = match rest.split_once('/') {
            Some((authority, path)) => (authority, Some(path)),
            None => (rest, None),
        };
        if authority.is_empty() || authority.contains(char::is_whitespace) {
            return Err(invalid());
        }

        let mut segments = Vec::new();
        if let Some(path) = path {
            for segment in path.split('/') {
                if segment.is_empty() || segment.contains(char::is_whitespace) {
                    return Err(invalid());
                }
                segments.push(segment.to_string());
            }
        }

        Ok(Self {
            scheme: scheme.to_string(),
            authority: authority.to_string(),
            segments,
        })
    }

    /// The address of the bare authority, with no path.
    pub fn root(authority: &str) -> Self {
        Self {
            scheme: CONTENT_SCHEME.to_string(),
            authority: authority.to_string(),
            segments: Vec::new(),
        }
    }

    /// Append a path segment.
    pub fn join(&self, segment: impl fmt::Display) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.to_string());
        Self {
            scheme: self.scheme.clone(),
            authority: self.authority.clone(),
            segments,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The last path segment, if any.
    pub fn last_segment(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// True if `self` lies strictly below `ancestor` in the path hierarchy.
    ///
    /// Comparison is by whole segments: `.../messages/7` is below
    /// `.../messages`, `.../messages7` is not.
    pub fn is_descendant_of(&self, ancestor: &Address) -> bool {
        self.scheme == ancestor.scheme
            && self.authority == ancestor.authority
            && self.segments.len() > ancestor.segments.len()
            && self.segments.starts_with(&ancestor.segments)
    }

    /// True if a publish on `self` concerns an observer registered on
    /// `watched`.
    pub fn notifies(&self, watched: &Address, include_descendants: bool) -> bool {
        self == watched || (include_descendants && self.is_descendant_of(watched))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority)?;
        for segment in &self.segments {
            write!(f, "/{}", segment)?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Address {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_string()
    }
}

/// What an address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// The whole messages collection.
    Collection,
    /// One message by id.
    Item(MessageId),
}

/// The addressing contract of one provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    collection: Address,
}

impl Contract {
    /// Contract for a provider registered under `authority`.
    ///
    /// The authority must survive a round trip through [`Address::parse`]:
    /// non-empty, with no `/` and no whitespace.
    pub fn new(authority: &str) -> Result<Self, CoreError> {
        if authority.is_empty() || authority.contains(|c: char| c == '/' || c.is_whitespace()) {
            return Err(CoreError::InvalidAddress(format!(
                "{}://{}",
                CONTENT_SCHEME, authority
            )));
        }
        Ok(Self::unchecked(authority))
    }

    fn unchecked(authority: &str) -> Self {
        Self {
            collection: Address::root(authority).join(PATH_MESSAGES),
        }
    }

    pub fn authority(&self) -> &str {
        self.collection.authority()
    }

    /// `content://<authority>/messages`
    pub fn collection(&self) -> &Address {
        &self.collection
    }

    /// `content://<authority>/messages/<id>`
    pub fn item(&self, id: MessageId) -> Address {
        self.collection.join(id)
    }

    /// Map an address onto a route. Pure; `None` means unroutable.
    pub fn resolve(&self, address: &Address) -> Option<Route> {
        if address == &self.collection {
            return Some(Route::Collection);
        }
        if !address.is_descendant_of(&self.collection)
            || address.segments().len() != self.collection.segments().len() + 1
        {
            return None;
        }
        address
            .last_segment()
            .and_then(|segment| segment.parse::<MessageId>().ok())
            .map(Route::Item)
    }
}

impl Default for Contract {
    fn default() -> Self {
        Self::unchecked(DEFAULT_AUTHORITY)
    }
}
