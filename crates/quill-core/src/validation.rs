//! Form input validation.
//!
//! The store takes whatever strings it is given. Surfaces that collect input
//! from a person run it through here first: fields are trimmed and must not
//! be blank afterwards.

use crate::error::CoreError;
use crate::message::{MessagePatch, NewMessage};

/// Validate raw form input and build an insertable message.
pub fn validate_form(text: &str, author: &str, favorite: bool) -> Result<NewMessage, CoreError> {
    let text = required("text", text)?;
    let author = required("author", author)?;
    Ok(NewMessage {
        text,
        author,
        favorite,
    })
}

/// Validate the text fields of an edit form. Absent fields stay absent.
pub fn validate_patch(patch: MessagePatch) -> Result<MessagePatch, CoreError> {
    Ok(MessagePatch {
        text: patch.text.as_deref().map(|t| required("text", t)).transpose()?,
        author: patch
            .author
            .as_deref()
            .map(|a| required("author", a))
            .transpose()?,
        favorite: patch.favorite,
    })
}

fn required(field: &'static str, value: &str) -> Result<String, CoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CoreError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

impl NewMessage {
    /// Build a message from form input. See [`validate_form`].
    pub fn from_form(text: &str, author: &str, favorite: bool) -> Result<Self, CoreError> {
        validate_form(text, author, favorite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_form_trims_fields() {
        let msg = NewMessage::from_form("  hello ", "\tana\n", true).unwrap();
        assert_eq!(msg, NewMessage::new("hello", "ana").favorite(true));
    }

    #[test]
    fn test_form_rejects_blank_fields() {
        assert_eq!(
            NewMessage::from_form("   ", "ana", false),
            Err(CoreError::EmptyField("text"))
        );
        assert_eq!(
            NewMessage::from_form("hi", "", false),
            Err(CoreError::EmptyField("author"))
        );
    }

    #[test]
    fn test_patch_validation() {
        let patch = validate_patch(MessagePatch::new().text(" x ").favorite(true)).unwrap();
        assert_eq!(patch, MessagePatch::new().text("x").favorite(true));

        assert!(validate_patch(MessagePatch::new().author("  ")).is_err());
        assert_eq!(validate_patch(MessagePatch::new()).unwrap(), MessagePatch::new());
    }

    proptest! {
        #[test]
        fn validated_fields_are_trimmed_and_non_empty(
            text in "\\PC{0,40}",
            author in "\\PC{0,40}",
        ) {
            match validate_form(&text, &author, false) {
                Ok(msg) => {
                    prop_assert!(!msg.text.is_empty());
                    prop_assert!(!msg.author.is_empty());
                    prop_assert_eq!(msg.text.trim(), msg.text.as_str());
                    prop_assert_eq!(msg.author.trim(), msg.author.as_str());
                }
                Err(_) => {
                    prop_assert!(text.trim().is_empty() || author.trim().is_empty());
                }
            }
        }
    }
}
