//!
//! The FieldIndex module contains the per-template field position index.  We build this
//! index once (and again after any schema change) to avoid re-deriving the field order of
//! a template for every single row while sorting.  It's significantly faster that way.
//!

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::templates::NoteTemplate;

/// The prefix used to namespace field-derived column types, so a field named e.g. "Tags"
/// can't collide with a built-in statistic column's type
pub const FIELD_COLUMN_PREFIX : &str = "_field_";

/// A [FieldIndex] shared between the host integration layer and the scalar function
/// registered with the storage engine
pub type SharedFieldIndex = Arc<RwLock<FieldIndex>>;

/// An index from template id and field name to the field's ordinal position within the
/// packed field blob
///
/// Each template is indexed under two keys: its canonical 64-bit id, and the same bit
/// pattern narrowed to a signed 32-bit integer.  On some platforms the storage engine
/// hands our registered scalar function a template id that has been narrowed this way, and
/// both forms must resolve to the same field positions.
///
/// The index does not watch the template catalog for changes.  Callers must invoke
/// [rebuild](FieldIndex::rebuild) after any template is added, removed, or has its fields
/// renamed or reordered, or lookups will silently return stale positions.
pub struct FieldIndex {
    /// { mid -> { field name -> ordinal } }, keyed under both id forms
    positions : HashMap<i64, HashMap<String, usize>>,

    /// Every distinct field name observed across all templates, as (column type, field
    /// name) pairs in first-seen order.  The first template to declare a name wins the
    /// column identity; later templates reuse it.
    field_columns : Vec<(String, String)>,

    /// The column types in `field_columns`, for O(1) membership tests
    field_column_types : HashSet<String>,
}

impl FieldIndex {

    pub fn new() -> Self {
        Self {
            positions : HashMap::new(),
            field_columns : Vec::new(),
            field_column_types : HashSet::new(),
        }
    }

    /// Clears the index and repopulates it from a snapshot of the template catalog
    pub fn rebuild(&mut self, templates : &[NoteTemplate]) {

        self.positions.clear();
        self.field_columns.clear();
        self.field_column_types.clear();

        for template in templates {

            let by_name : HashMap<String, usize> = template.fields.iter()
                .map(|field| (field.name.clone(), field.ord))
                .collect();

            //Index the template under its canonical id and under the 32-bit wrapped form.
            //For small ids the two coincide and the second insert is a harmless overwrite.
            self.positions.insert(template.id.0, by_name.clone());
            self.positions.insert(template.id.wrapped32().0, by_name);

            for field in &template.fields {
                let column_type = format!("{}{}", FIELD_COLUMN_PREFIX, field.name);
                if self.field_column_types.insert(column_type.clone()) {
                    self.field_columns.push((column_type, field.name.clone()));
                }
            }
        }
    }

    /// Returns the ordinal of `field_name` within the packed field blob of notes using
    /// template `mid`, or None if the template or field is unknown
    ///
    /// `mid` may be either the canonical template id or its 32-bit wrapped form.
    pub fn lookup(&self, mid : i64, field_name : &str) -> Option<usize> {
        self.positions.get(&mid)?.get(field_name).copied()
    }

    /// The distinct field names across all indexed templates, as (column type, field name)
    /// pairs in first-seen order
    pub fn field_columns(&self) -> &[(String, String)] {
        &self.field_columns
    }

    /// Returns `true` if `column_type` identifies a note-field column (as opposed to a
    /// built-in statistic or tags column)
    pub fn is_field_column(&self, column_type : &str) -> bool {
        self.field_column_types.contains(column_type)
    }
}

impl Default for FieldIndex {
    fn default() -> Self {
        Self::new()
    }
}
