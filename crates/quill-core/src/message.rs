//! Message: the single record type.
//!
//! A [`NewMessage`] is what a caller hands to the store; the store answers
//! with a [`MessageId`] and from then on the row reads back as a [`Message`].
//! Mutation goes through a [`MessagePatch`], which names only the columns
//! to replace.

use serde::{Deserialize, Serialize};

use crate::types::MessageId;

/// A persisted message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub text: String,
    pub author: String,
    pub favorite: bool,
}

impl Message {
    /// The insertable part of this message, without its id.
    pub fn content(&self) -> NewMessage {
        NewMessage {
            text: self.text.clone(),
            author: self.author.clone(),
            favorite: self.favorite,
        }
    }

    /// Apply a patch in place. Returns whether any field was supplied.
    pub fn apply(&mut self, patch: &MessagePatch) -> bool {
        if let Some(text) = &patch.text {
            self.text.clone_from(text);
        }
        if let Some(author) = &patch.author {
            self.author.clone_from(author);
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
        !patch.is_empty()
    }
}

/// A message that has not been persisted yet.
///
/// The store accepts any strings here, including empty ones; trimming and
/// rejecting blank input is the job of [`NewMessage::from_form`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewMessage {
    pub text: String,
    pub author: String,
    #[serde(default)]
    pub favorite: bool,
}

impl NewMessage {
    /// Create a non-favorite message.
    pub fn new(text: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            author: author.into(),
            favorite: false,
        }
    }

    /// Set the favorite flag.
    pub fn favorite(mut self, favorite: bool) -> Self {
        self.favorite = favorite;
        self
    }

    /// Attach the id the store assigned.
    pub fn with_id(self, id: MessageId) -> Message {
        Message {
            id,
            text: self.text,
            author: self.author,
            favorite: self.favorite,
        }
    }
}

/// A partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favorite: Option<bool>,
}

impl MessagePatch {
    pub fn new() -> Self {
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

    /// True when no column is supplied.
    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.author.is_none() && self.favorite.is_none()
    }

    /// A patch replacing every column with the values of `message`.
    pub fn replace_all(message: &NewMessage) -> Self {
        Self {
            text: Some(message.text.clone()),
            author: Some(message.author.clone()),
            favorite: Some(message.favorite),
        }
    }
}
