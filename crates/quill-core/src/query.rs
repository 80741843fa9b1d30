//! Query descriptions: equality filters and a single sort key.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;
use crate::message::Message;
use crate::types::MessageId;

/// A column of the messages table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Column {
    Id,
    Text,
    Author,
    Favorite,
}

impl Column {
    /// The SQL column name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Text => "text",
            Self::Author => "author",
            Self::Favorite => "favorite",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Column {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "id" => Ok(Self::Id),
            "text" => Ok(Self::Text),
            "author" => Ok(Self::Author),
            "favorite" => Ok(Self::Favorite),
            other => Err(CoreError::UnknownColumn(other.to_string())),
        }
    }
}

/// Equality filter. Unset fields match every row; set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl Filter {
    /// Select every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = Some(favorite);
        self
    }

    pub fn is_all(&self) -> bool {
        self.text.is_none() && self.author.is_none() && self.favorite.is_none()
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.text.as_ref().map_or(true, |t| *t == message.text)
            && self.author.as_ref().map_or(true, |a| *a == message.author)
            && self.favorite.map_or(true, |f| f == message.favorite)
    }
}

/// A sort key. Ties are always broken by ascending id so that results are
/// deterministic across backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: Column,
    #[serde(default)]
    pub descending: bool,
}

impl SortOrder {
    pub fn asc(column: Column) -> Self {
        Self {
            column,
            descending: false,
        }
    }

    pub fn desc(column: Column) -> Self {
        Self {
            column,
            descending: true,
        }
    }

    /// Compare two messages under this order.
    pub fn compare(&self, a: &Message, b: &Message) -> Ordering {
        let primary = match self.column {
            Column::Id => a.id.cmp(&b.id),
            Column::Text => a.text.cmp(&b.text),
            Column::Author => a.author.cmp(&b.author),
            Column::Favorite => a.favorite.cmp(&b.favorite),
        };
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }

    /// The SQL `ORDER BY` clause body.
    pub fn to_sql(&self) -> String {
        let direction = if self.descending { "DESC" } else { "ASC" };
        if self.column == Column::Id {
            format!("id {}", direction)
        } else {
            format!("{} {}, id ASC", self.column, direction)
        }
    }
}

impl FromStr for SortOrder {
    type Err = CoreError;

    /// Parse `column`, `column:asc` or `column:desc`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, direction) = s.split_once(':').unwrap_or((s, "asc"));
        let column = column.parse()?;
        match direction {
            "asc" => Ok(Self::asc(column)),
            "desc" => Ok(Self::desc(column)),
            other => Err(CoreError::UnknownColumn(format!("{}:{}", s, other))),
        }
    }
}

/// A full store query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Restrict to a single row.
    pub id: Option<MessageId>,
    pub filter: Filter,
    /// `None` keeps storage order (ascending id).
    pub sort: Option<SortOrder>,
}

impl Query {
    /// Every row in storage order.
    pub fn all() -> Self {
        Self::default()
    }

    /// The single row with `id`.
    pub fn by_id(id: MessageId) -> Self {
        Self {
            id: Some(id),
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn sort(mut self, sort: Option<SortOrder>) -> Self {
        self.sort = sort;
        self
    }

    pub fn matches(&self, message: &Message) -> bool {
        self.id.map_or(true, |id| id == message.id) && self.filter.matches(message)
    }
}
