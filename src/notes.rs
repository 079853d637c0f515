//!
//! The Notes module contains the in-memory representation of a note and its cards.  The
//! NoteId and CardId types are re-exported to the public interface.
//!

use crate::templates::TemplateId;

/// The reserved one-byte separator between consecutive field values in a note's packed
/// field blob.  Field text must never contain this byte; the collection's editor strips it
/// on save, so the storage layer doesn't escape it.
pub const FIELD_SEPARATOR : char = '\u{1f}';

/// A unique identifier for a note within a [Collection](crate::Collection)
#[derive(Copy, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, derive_more::Display)]
pub struct NoteId(pub i64);

/// A unique identifier for a card within a [Collection](crate::Collection).  Every card
/// belongs to exactly one note, and review history is logged against cards.
#[derive(Copy, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, derive_more::Display)]
pub struct CardId(pub i64);

/// A note loaded from the collection, with its packed field blob already split and paired
/// with the field names declared by the note's template
///
/// This is the richer object available on the display path.  The query path never sees a
/// [Note]; it works from the raw `(mid, flds)` row the storage engine hands it.
#[derive(Debug, Clone)]
pub struct Note {
    pub id : NoteId,
    pub template : TemplateId,
    pub tags : Vec<String>,
    fields : Vec<(String, String)>,
}

impl Note {

    /// Assembles a Note from named field values, in template-declared order
    pub fn new(id : NoteId, template : TemplateId, fields : Vec<(String, String)>, tags : Vec<String>) -> Self {
        Self { id, template, tags, fields }
    }

    /// Returns the raw (unstripped) text of the named field, or None if the note's
    /// template declares no field by that name
    pub fn field(&self, name : &str) -> Option<&str> {
        self.fields.iter()
            .find(|(field_name, _)| field_name == name)
            .map(|(_, text)| text.as_str())
    }

    /// Joins the note's field values back into a packed field blob
    pub fn packed_fields(&self) -> String {
        pack_fields(self.fields.iter().map(|(_, text)| text.as_str()))
    }

    /// The note's tags as a single space-joined string, the way the Tags column shows them
    pub fn joined_tags(&self) -> String {
        self.tags.join(" ")
    }
}

/// Joins field values into a packed field blob, in the order given
pub fn pack_fields<'a, I : IntoIterator<Item=&'a str>>(values : I) -> String {
    let mut blob = String::new();
    for (idx, value) in values.into_iter().enumerate() {
        if idx > 0 {
            blob.push(FIELD_SEPARATOR);
        }
        blob.push_str(value);
    }
    blob
}
