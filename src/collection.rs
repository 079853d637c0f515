//!
//! The Collection module contains the wrapper around the storage engine (SQLite)
//! connection, and the functions for getting notes, templates, and review statistics out
//! of it.  Nothing should be re-exported except [Collection] itself.
//!

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};
use tracing::warn;

use crate::error::{Error, Result};
use crate::notes::{Note, NoteId, CardId, FIELD_SEPARATOR, pack_fields};
use crate::templates::{NoteTemplate, TemplateId};

/// The metadata row id.  The collection keeps exactly one metadata row, holding the
/// template catalog as a JSON blob.
const METADATA_ROW_ID : i64 = 1;

/// Encapsulates a connection to a collection database
///
/// The schema is the storage contract the statistic columns depend on verbatim: `notes`
/// holds the packed field blob (`flds`) and template id (`mid`), `cards` ties rows back to
/// notes, and `revlog` is the append-only review event log keyed by card id, with the
/// event timestamp (milliseconds since epoch) doubling as its primary key and the review
/// duration in the `time` column.
pub struct Collection {
    conn : Connection,
}

impl Collection {

    /// Opens (and if necessary bootstraps) a collection at the given path
    pub fn open<P : AsRef<Path>>(path : P) -> Result<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Opens a fresh in-memory collection.  Used heavily by tests and benches.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn : Connection) -> Result<Self> {

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS col (
                id INTEGER PRIMARY KEY,
                models TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notes (
                id INTEGER PRIMARY KEY,
                mid INTEGER NOT NULL,
                flds TEXT NOT NULL,
                tags TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS cards (
                id INTEGER PRIMARY KEY,
                nid INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS revlog (
                id INTEGER PRIMARY KEY,
                cid INTEGER NOT NULL,
                time INTEGER NOT NULL
            );",
        )?;
        conn.execute(
            "INSERT OR IGNORE INTO col (id, models) VALUES (?1, '[]')",
            params![METADATA_ROW_ID],
        )?;

        Ok(Self { conn })
    }

    /// The raw connection, for registering scalar functions against this collection
    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    //
    // Template catalog
    //

    /// Returns a snapshot of every template in the catalog
    ///
    /// Decoding is best-effort per template: an entry that doesn't decode is reported and
    /// skipped, so one malformed template can't hide the rest of the catalog.
    pub fn templates(&self) -> Result<Vec<NoteTemplate>> {

        let blob : String = self.conn.query_row(
            "SELECT models FROM col WHERE id = ?1",
            params![METADATA_ROW_ID],
            |row| row.get(0),
        )?;
        let entries : Vec<serde_json::Value> = serde_json::from_str(&blob)?;

        let mut templates = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<NoteTemplate>(entry) {
                Ok(template) => templates.push(template),
                Err(error) => warn!(%error, "skipping malformed template catalog entry"),
            }
        }
        Ok(templates)
    }

    /// Adds a template to the catalog
    pub fn add_template(&self, template : &NoteTemplate) -> Result<()> {

        let blob : String = self.conn.query_row(
            "SELECT models FROM col WHERE id = ?1",
            params![METADATA_ROW_ID],
            |row| row.get(0),
        )?;
        let mut entries : Vec<serde_json::Value> = serde_json::from_str(&blob)?;
        entries.push(serde_json::to_value(template)?);

        self.conn.execute(
            "UPDATE col SET models = ?1 WHERE id = ?2",
            params![serde_json::to_string(&entries)?, METADATA_ROW_ID],
        )?;
        Ok(())
    }

    //
    // Notes and cards
    //

    /// Inserts a note whose field values are given in template-ordinal order, plus one
    /// card for it, and returns the new ids
    pub fn add_note(&self, template : TemplateId, field_values : &[&str], tags : &[&str]) -> Result<(NoteId, CardId)> {

        self.conn.execute(
            "INSERT INTO notes (mid, flds, tags) VALUES (?1, ?2, ?3)",
            params![template.0, pack_fields(field_values.iter().copied()), tags.join(" ")],
        )?;
        let note_id = NoteId(self.conn.last_insert_rowid());

        self.conn.execute("INSERT INTO cards (nid) VALUES (?1)", params![note_id.0])?;
        let card_id = CardId(self.conn.last_insert_rowid());

        Ok((note_id, card_id))
    }

    /// Loads a note, pairing its packed field values with the field names its template
    /// declares.  Names come up empty if the template is missing from the catalog, in
    /// which case the note still loads but has no addressable fields.
    pub fn note(&self, note_id : NoteId) -> Result<Note> {

        let row : Option<(i64, String, String)> = self.conn.query_row(
            "SELECT mid, flds, tags FROM notes WHERE id = ?1",
            params![note_id.0],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        ).optional()?;

        let (mid, flds, tags) = row.ok_or(Error::NoteNotFound(note_id))?;
        let template_id = TemplateId(mid);

        let field_names : Vec<String> = self.templates()?.iter()
            .find(|template| template.id == template_id)
            .map(|template| template.ordered_field_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default();

        let fields = field_names.into_iter()
            .zip(flds.split(FIELD_SEPARATOR).map(str::to_string))
            .collect();
        let tags = tags.split_whitespace().map(str::to_string).collect();

        Ok(Note::new(note_id, template_id, fields, tags))
    }

    /// Loads the note that a card belongs to
    pub fn card_note(&self, card_id : CardId) -> Result<Note> {

        let nid : Option<i64> = self.conn.query_row(
            "SELECT nid FROM cards WHERE id = ?1",
            params![card_id.0],
            |row| row.get(0),
        ).optional()?;

        match nid {
            Some(nid) => self.note(NoteId(nid)),
            None => Err(Error::CardNotFound(card_id)),
        }
    }

    //
    // Review event log
    //

    /// Logs a review event for a card.  `timestamp_ms` becomes the revlog row id, per the
    /// event log's schema contract; `duration_ms` is how long the review took.
    pub fn add_review(&self, card_id : CardId, timestamp_ms : i64, duration_ms : i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO revlog (id, cid, time) VALUES (?1, ?2, ?3)",
            params![timestamp_ms, card_id.0, duration_ms],
        )?;
        Ok(())
    }

    /// The earliest review timestamp for a card, in milliseconds, or None if the card has
    /// never been reviewed
    pub fn first_review_ms(&self, card_id : CardId) -> Result<Option<i64>> {
        self.revlog_scalar_i64("SELECT min(id) FROM revlog WHERE cid = ?1", card_id)
    }

    /// The latest review timestamp for a card, in milliseconds
    pub fn last_review_ms(&self, card_id : CardId) -> Result<Option<i64>> {
        self.revlog_scalar_i64("SELECT max(id) FROM revlog WHERE cid = ?1", card_id)
    }

    /// The mean review duration for a card, in milliseconds
    pub fn average_time_ms(&self, card_id : CardId) -> Result<Option<f64>> {
        let avg : Option<f64> = self.conn.query_row(
            "SELECT avg(time) FROM revlog WHERE cid = ?1",
            params![card_id.0],
            |row| row.get(0),
        )?;
        Ok(avg)
    }

    /// The summed review duration for a card, in milliseconds
    pub fn total_time_ms(&self, card_id : CardId) -> Result<Option<i64>> {
        self.revlog_scalar_i64("SELECT sum(time) FROM revlog WHERE cid = ?1", card_id)
    }

    fn revlog_scalar_i64(&self, sql : &str, card_id : CardId) -> Result<Option<i64>> {
        //Aggregates over an empty row set come back as a single NULL, so the row always
        //exists and Option is carried in the column value
        let value : Option<i64> = self.conn.query_row(sql, params![card_id.0], |row| row.get(0))?;
        Ok(value)
    }

    //
    // Query-path evaluation
    //

    /// Returns every card id, ordered by a column's sort expression
    ///
    /// This is the same query shape the host browser generates: cards aliased `c`, their
    /// notes aliased `n`, and the column's sort expression dropped in verbatim.  The
    /// expression may call any scalar function registered against this collection.
    pub fn cards_sorted_by(&self, sort_expr : &str) -> Result<Vec<CardId>> {

        let sql = format!(
            "SELECT c.id FROM cards c, notes n WHERE c.nid = n.id ORDER BY {sort_expr} ASC, c.id ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let cards = stmt.query_map([], |row| row.get(0).map(CardId))?
            .collect::<rusqlite::Result<Vec<CardId>>>()?;
        Ok(cards)
    }
}
