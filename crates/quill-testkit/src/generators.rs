//! Proptest generators for property-based testing.

use proptest::prelude::*;

use quill_core::{Column, Filter, MessageId, MessagePatch, NewMessage, SortOrder};

/// Generate message text, including the empty string.
pub fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?]{0,40}".prop_map(String::from)
}

/// Generate an author name from a small pool so filters hit.
pub fn author() -> impl Strategy<Value = String> {
    prop_oneof![Just("ana"), Just("bob"), Just("caio"), Just("dora")].prop_map(String::from)
}

/// Generate an insertable message.
pub fn new_message() -> impl Strategy<Value = NewMessage> {
    (text(), author(), any::<bool>())
        .prop_map(|(text, author, favorite)| NewMessage::new(text, author).favorite(favorite))
}

/// Generate a patch touching any subset of columns.
pub fn message_patch() -> impl Strategy<Value = MessagePatch> {
    (
        prop::option::of(text()),
        prop::option::of(author()),
        prop::option::of(any::<bool>()),
    )
        .prop_map(|(text, author, favorite)| MessagePatch {
            text,
            author,
            favorite,
        })
}

/// Generate a sortable column.
pub fn column() -> impl Strategy<Value = Column> {
    prop_oneof![
        Just(Column::Id),
        Just(Column::Text),
        Just(Column::Author),
        Just(Column::Favorite),
    ]
}

/// Generate a sort order, or none.
pub fn sort_order() -> impl Strategy<Value = Option<SortOrder>> {
    prop::option::of((column(), any::<bool>()).prop_map(|(column, descending)| SortOrder {
        column,
        descending,
    }))
}

/// Generate a filter over author and favorite.
pub fn filter() -> impl Strategy<Value = Filter> {
    (prop::option::of(author()), prop::option::of(any::<bool>())).prop_map(|(author, favorite)| {
        let mut filter = Filter::all();
        filter.author = author;
        filter.favorite = favorite;
        filter
    })
}

/// One write against the messages table.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Insert(NewMessage),
    Update(MessageId, MessagePatch),
    Delete(MessageId),
}

impl Arbitrary for WriteOp {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Ids stay small so updates and deletes mostly hit existing rows.
        let id = (1i64..=8).prop_map(MessageId);
        prop_oneof![
            3 => new_message().prop_map(WriteOp::Insert),
            2 => (id.clone(), message_patch()).prop_map(|(id, patch)| WriteOp::Update(id, patch)),
            1 => id.prop_map(WriteOp::Delete),
        ]
        .boxed()
    }
}

/// Generate a sequence of writes.
pub fn write_ops(max_len: usize) -> impl Strategy<Value = Vec<WriteOp>> {
    prop::collection::vec(any::<WriteOp>(), 0..=max_len)
}
