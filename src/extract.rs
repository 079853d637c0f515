//!
//! The Extract module contains the field value extractor: the one piece of logic that must
//! run in two very different contexts.  The storage engine calls it as a registered scalar
//! function while evaluating a sort or filter expression, where it only has the raw
//! `(mid, flds)` row columns to work from.  The display path calls it with a fully loaded
//! [Note], which already knows its field names.  Both produce the same stripped value.
//!

use rusqlite::Connection;
use rusqlite::functions::{Context, FunctionFlags};
use tracing::warn;

use crate::field_index::{FieldIndex, SharedFieldIndex};
use crate::markup;
use crate::notes::{Note, FIELD_SEPARATOR};

/// The name under which the query-path extractor is registered with the storage engine.
/// Generated sort expressions embed calls to this function by name.
pub const SQL_FUNCTION_NAME : &str = "value_for_field";

/// Extracts the stripped value of a named field from a packed field blob (the query path)
///
/// The field's ordinal is resolved through the [FieldIndex]; `mid` may be the canonical
/// template id or its 32-bit wrapped form.  Splitting the blob is limited to `ordinal + 2`
/// parts since fields past the one we want never need to be parsed.
///
/// Returns None when the template or field name is unknown, or when the blob has fewer
/// fields than the template declares.  None is "no value", not an error.
pub fn value_for_field(index : &FieldIndex, mid : i64, flds : &str, field_name : &str) -> Option<String> {

    let ordinal = index.lookup(mid, field_name)?;
    let raw = flds.splitn(ordinal + 2, FIELD_SEPARATOR).nth(ordinal)?;
    Some(markup::strip(raw))
}

/// Extracts the stripped value of a named field from a loaded note (the display path)
///
/// No index lookup is needed here; the note already exposes named-field access.
pub fn display_value(note : &Note, field_name : &str) -> Option<String> {
    note.field(field_name).map(markup::strip)
}

/// Registers [value_for_field] with the storage engine as a deterministic scalar function
/// of three arguments: `(mid, flds, field_name)`
///
/// This must happen before any column's sort expression is evaluated.  The function shares
/// the live [FieldIndex] with the host, so an index rebuild is immediately visible to
/// queries without re-registering.
pub fn register_value_for_field(conn : &Connection, index : SharedFieldIndex) -> rusqlite::Result<()> {

    conn.create_scalar_function(
        SQL_FUNCTION_NAME,
        3,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        move |ctx| Ok(scalar_value_for_field(&index, ctx)),
    )
}

/// The body of the registered scalar function.  Nothing may escape this boundary as an
/// error: a malformed argument is reported to the diagnostic channel and resolved to NULL
/// so the enclosing query keeps running.
fn scalar_value_for_field(index : &SharedFieldIndex, ctx : &Context<'_>) -> Option<String> {

    let mid : i64 = match ctx.get(0) {
        Ok(mid) => mid,
        Err(error) => {
            warn!(%error, "non-integer template id passed to {}", SQL_FUNCTION_NAME);
            return None;
        },
    };
    let flds : String = match ctx.get(1) {
        Ok(flds) => flds,
        Err(error) => {
            warn!(mid, %error, "unreadable field blob passed to {}", SQL_FUNCTION_NAME);
            return None;
        },
    };
    let field_name : String = match ctx.get(2) {
        Ok(field_name) => field_name,
        Err(error) => {
            warn!(mid, flds = %flds, %error, "unreadable field name passed to {}", SQL_FUNCTION_NAME);
            return None;
        },
    };

    //A poisoned lock means a rebuild panicked somewhere; degrade to NULL rather than
    //aborting the whole query
    let index = index.read().ok()?;
    value_for_field(&index, mid, &flds, &field_name)
}
