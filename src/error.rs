//!
//! The Error module contains the crate-wide error type.  Lookup misses are deliberately
//! not errors anywhere in this crate; they are `None`, so one bad row never aborts a
//! browse or a query.
//!

use crate::notes::{NoteId, CardId};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {

    /// An error reported by the storage engine itself
    #[error("storage engine error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The template catalog blob in the collection is not valid JSON
    #[error("template catalog is not valid JSON: {0}")]
    TemplateCatalog(#[from] serde_json::Error),

    /// A note id that doesn't exist in the collection
    #[error("no note with id {0}")]
    NoteNotFound(NoteId),

    /// A card id that doesn't exist in the collection
    #[error("no card with id {0}")]
    CardNotFound(CardId),
}
