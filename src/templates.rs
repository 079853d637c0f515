//!
//! The Templates module contains the note template (model) data types.  A template owns an
//! ordered list of named fields, and every note is an instance of exactly one template.
//!

use serde::{Serialize, Deserialize};

/// A unique identifier for a note template
///
/// Template ids are assigned from millisecond timestamps, so they exceed 32 bits in
/// practice.  Some storage-engine evaluation contexts narrow integers to 32 bits, which is
/// why [wrapped32](TemplateId::wrapped32) exists; see [FieldIndex](crate::FieldIndex).
#[derive(Copy, Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, derive_more::Display, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateId(pub i64);

impl TemplateId {
    /// Returns the id with its low 32 bits reinterpreted as a two's-complement signed
    /// integer, i.e. `((id + 2^31) mod 2^32) - 2^31`
    pub fn wrapped32(self) -> Self {
        Self(i64::from(self.0 as u32 as i32))
    }
}

/// One named field within a template.  `ord` is the zero-based position of the field's
/// text within the packed field blob of every note using the template.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name : String,
    pub ord : usize,
}

/// A note template: the schema shared by a class of notes
///
/// Field names are unique within a template but not across templates; two unrelated
/// templates may both declare a "Front" field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteTemplate {
    pub id : TemplateId,
    pub name : String,
    pub fields : Vec<FieldDef>,
}

impl NoteTemplate {

    /// Convenience constructor that assigns field ordinals from the order of `field_names`
    pub fn new(id : i64, name : &str, field_names : &[&str]) -> Self {
        Self {
            id : TemplateId(id),
            name : name.to_string(),
            fields : field_names.iter().enumerate()
                .map(|(ord, field_name)| FieldDef { name : field_name.to_string(), ord })
                .collect(),
        }
    }

    /// Returns the field names in ordinal order, regardless of declaration order
    pub fn ordered_field_names(&self) -> Vec<&str> {
        let mut fields : Vec<&FieldDef> = self.fields.iter().collect();
        fields.sort_by_key(|field| field.ord);
        fields.into_iter().map(|field| field.name.as_str()).collect()
    }
}
