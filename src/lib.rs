
//! # note_columns Overview
//!
//! Custom browser columns for a note collection backed by [SQLite](https://sqlite.org):
//! review statistics aggregated from the collection's event log, plus one column per
//! distinct note field, extracted at query time from each note's packed field blob.
//!
//! The interesting problem this crate solves is making the *same* field value available
//! in two evaluation contexts:
//! - the display path, where the host browser renders one loaded [Note] at a time, and
//! - the query path, where the storage engine sorts and filters rows declaratively and
//! only ever sees the raw `(mid, flds)` columns.
//!
//! A note's fields are stored as one delimited blob, in the order declared by the note's
//! template (model).  To keep field access O(1) per row, the per-template field order is
//! computed once into a [FieldIndex] instead of being re-derived for every row of a sort.
//! The extractor is then registered with the storage engine as a scalar SQL function, so
//! generated sort expressions can call it row by row.  Extracted values have their markup
//! stripped before display.
//!
//! ## Usage Example
//!
//! ```
//! use note_columns::{*};
//!
//! //Open an in-memory collection and define a template
//! let collection = Collection::open_in_memory().unwrap();
//! collection.add_template(&NoteTemplate::new(1414296099999, "Basic", &["Front", "Back"])).unwrap();
//!
//! //Add a note and review its card twice
//! let (_note, card) = collection
//!     .add_note(TemplateId(1414296099999), &["<b>Hello</b>", "World"], &["greeting"])
//!     .unwrap();
//! collection.add_review(card, 1_700_000_000_000, 3000).unwrap();
//! collection.add_review(card, 1_700_100_000_000, 1000).unwrap();
//!
//! //Load the column subsystem; this registers the field extractor with the engine
//! //and builds the field index
//! let browser = BrowserColumns::new(collection).unwrap();
//! let catalog = browser.catalog();
//!
//! //Display the "Front" field column; markup is stripped
//! let front = catalog.iter().find(|col| col.column_type == "_field_Front").unwrap();
//! assert_eq!(browser.display(front, card).unwrap(), Some("Hello".to_string()));
//!
//! //Display the average review time
//! let avg = catalog.iter().find(|col| col.column_type == "cavgtime").unwrap();
//! assert_eq!(browser.display(avg, card).unwrap(), Some("2.0s".to_string()));
//!
//! //Sort by the field column, evaluated inside the storage engine
//! let ordered = browser.cards_sorted_by(front).unwrap();
//! assert_eq!(ordered, vec![card]);
//! ```
//!
//! ## Template ids and 32-bit narrowing
//!
//! Template ids are minted from millisecond timestamps and exceed 32 bits.  On some
//! platforms the storage engine hands the registered scalar function an id narrowed to a
//! signed 32-bit integer, so the [FieldIndex] stores every template under both the
//! canonical id and the narrowed form.  See [TemplateId::wrapped32].
//!
//! ## Staleness
//!
//! The [FieldIndex] does not watch the template catalog.  After any schema change the
//! host must trigger [BrowserColumns::rebuild_index]; the context-menu builder does this
//! on every open, trading a small recomputation for an always-correct field list.

mod markup;
pub use markup::strip;
mod notes;
pub use notes::{Note, NoteId, CardId, pack_fields, FIELD_SEPARATOR};
mod templates;
pub use templates::{FieldDef, NoteTemplate, TemplateId};
mod field_index;
pub use field_index::{FieldIndex, SharedFieldIndex, FIELD_COLUMN_PREFIX};
mod extract;
pub use extract::{display_value, register_value_for_field, value_for_field, SQL_FUNCTION_NAME};
mod collection;
pub use collection::Collection;
mod columns;
pub use columns::{build_catalog, build_menu, ColumnDescriptor, ColumnKind, ColumnMenu};
mod browser;
pub use browser::BrowserColumns;
mod error;
pub use error::{Error, Result};


#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::{*};

    //Template ids in the style the collection mints them: millisecond timestamps, which
    //don't fit in 32 bits and therefore exercise the dual-keyed index
    const BASIC_MID : i64 = 1414296099999;
    const CLOZE_MID : i64 = 1500000000000;

    fn reviewed_collection() -> (Collection, CardId, CardId) {

        let collection = Collection::open_in_memory().unwrap();
        collection.add_template(&NoteTemplate::new(BASIC_MID, "Basic", &["Front", "Back"])).unwrap();

        let (_note, reviewed) = collection
            .add_note(TemplateId(BASIC_MID), &["hello", "world"], &["alpha", "beta"])
            .unwrap();
        let (_note, fresh) = collection
            .add_note(TemplateId(BASIC_MID), &["goodbye", "world"], &[])
            .unwrap();

        //Two reviews a day apart: 2020-09-13 and 2020-09-14 (UTC), 1s and 3s long
        collection.add_review(reviewed, 1_600_000_000_000, 1000).unwrap();
        collection.add_review(reviewed, 1_600_086_400_000, 3000).unwrap();

        (collection, reviewed, fresh)
    }

    fn find<'a>(catalog : &'a [ColumnDescriptor], column_type : &str) -> &'a ColumnDescriptor {
        catalog.iter().find(|col| col.column_type == column_type).unwrap()
    }

    #[test]
    fn markup_strip_test() {

        //Tags are removed, entities decoded
        assert_eq!(strip("<b>Hi</b> &amp; bye"), "Hi & bye");

        //Numeric references, decimal and hex (either case)
        assert_eq!(strip("a &#65; b"), "a A b");
        assert_eq!(strip("a &#x41; b"), "a A b");
        assert_eq!(strip("a &#X41; b"), "a A b");

        //Style and script blocks go away with their contents, including across newlines
        assert_eq!(strip("<style>p\n{color: red}</style>plain"), "plain");
        assert_eq!(strip("one<script>var x = 1;\nalert(x);</script>two"), "onetwo");

        //A sampling of the named entity table
        assert_eq!(strip("x&nbsp;y"), "x\u{a0}y");
        assert_eq!(strip("caf&eacute;"), "café");
        assert_eq!(strip("3 &lt; 4 &gt; 2"), "3 < 4 > 2");
        assert_eq!(strip("&hellip;"), "\u{2026}");

        //Anything undecodable stays verbatim rather than erroring
        assert_eq!(strip("x &notareal; y"), "x &notareal; y");
        assert_eq!(strip("bad &#99999999999; ref"), "bad &#99999999999; ref");
        assert_eq!(strip("surrogate &#xD800; stays"), "surrogate &#xD800; stays");

        //Entity names are case-sensitive, like the reference table they come from
        assert_eq!(strip("&Eacute;&eacute;"), "Éé");
    }

    #[test]
    fn field_index_test() {

        let templates = vec![
            NoteTemplate::new(BASIC_MID, "Basic", &["Front", "Back", "Extra"]),
            NoteTemplate::new(CLOZE_MID, "Cloze", &["Front", "Notes"]),
        ];

        let mut index = FieldIndex::new();
        index.rebuild(&templates);

        //Every declared field resolves to its declared ordinal
        for template in &templates {
            for field in &template.fields {
                assert_eq!(index.lookup(template.id.0, &field.name), Some(field.ord));
            }
        }

        //Lookups are invariant under the 32-bit wraparound transform
        for template in &templates {
            let wrapped = template.id.wrapped32();
            assert_ne!(wrapped, template.id); //ids above are big enough to actually wrap
            for field in &template.fields {
                assert_eq!(
                    index.lookup(wrapped.0, &field.name),
                    index.lookup(template.id.0, &field.name),
                );
            }
        }

        //Misses are None, not errors
        assert_eq!(index.lookup(BASIC_MID, "Nope"), None);
        assert_eq!(index.lookup(12345, "Front"), None);

        //"Front" appears in both templates but collapses to one column, owned by the
        //template seen first; field columns keep first-seen order
        let columns : Vec<&str> = index.field_columns().iter()
            .map(|(column_type, _)| column_type.as_str())
            .collect();
        assert_eq!(columns, vec!["_field_Front", "_field_Back", "_field_Extra", "_field_Notes"]);
        assert!(index.is_field_column("_field_Front"));
        assert!(!index.is_field_column("cfirst"));

        //Rebuilding from a smaller snapshot drops stale entries
        index.rebuild(&templates[1..]);
        assert_eq!(index.lookup(BASIC_MID, "Front"), None);
        assert_eq!(index.lookup(CLOZE_MID, "Notes"), Some(1));
        assert_eq!(index.field_columns().len(), 2);
    }

    #[test]
    fn value_for_field_test() {

        let templates = vec![NoteTemplate::new(BASIC_MID, "Basic", &["Front", "Back", "Extra"])];
        let mut index = FieldIndex::new();
        index.rebuild(&templates);

        let values = ["<i>a</i>", "b &amp; c", "d"];
        let blob = pack_fields(values.iter().copied());

        //Extraction at every ordinal matches stripping the packed value directly
        for (ordinal, value) in values.iter().enumerate() {
            let name = &templates[0].fields[ordinal].name;
            assert_eq!(value_for_field(&index, BASIC_MID, &blob, name), Some(strip(value)));
        }

        //The wrapped template id resolves identically
        let wrapped = TemplateId(BASIC_MID).wrapped32().0;
        assert_eq!(value_for_field(&index, wrapped, &blob, "Back"), Some("b & c".to_string()));

        //Unknown field name or template id is absent, not a failure
        assert_eq!(value_for_field(&index, BASIC_MID, &blob, "Nope"), None);
        assert_eq!(value_for_field(&index, 77, &blob, "Front"), None);

        //A blob with fewer fields than the template declares is absent too
        assert_eq!(value_for_field(&index, BASIC_MID, "only-one", "Extra"), None);
    }

    #[test]
    fn display_path_test() {

        let (collection, reviewed, _fresh) = reviewed_collection();
        let note = collection.card_note(reviewed).unwrap();

        assert_eq!(note.field("Front"), Some("hello"));
        assert_eq!(note.field("Back"), Some("world"));
        assert_eq!(note.field("Nope"), None);
        assert_eq!(display_value(&note, "Front"), Some("hello".to_string()));
        assert_eq!(display_value(&note, "Nope"), None);

        //The note can reproduce its own packed blob
        assert_eq!(note.packed_fields(), format!("hello{FIELD_SEPARATOR}world"));
        assert_eq!(note.joined_tags(), "alpha beta");
    }

    #[test]
    fn statistic_columns_test() {

        let (collection, reviewed, fresh) = reviewed_collection();
        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();

        //Reviewed card: dates from the min/max event timestamps, durations averaged and
        //summed in seconds with one decimal
        assert_eq!(browser.display(find(&catalog, "cfirst"), reviewed).unwrap(), Some("2020-09-13".to_string()));
        assert_eq!(browser.display(find(&catalog, "clast"), reviewed).unwrap(), Some("2020-09-14".to_string()));
        assert_eq!(browser.display(find(&catalog, "cavgtime"), reviewed).unwrap(), Some("2.0s".to_string()));
        assert_eq!(browser.display(find(&catalog, "ctottime"), reviewed).unwrap(), Some("4.0s".to_string()));
        assert_eq!(browser.display(find(&catalog, "ntags"), reviewed).unwrap(), Some("alpha beta".to_string()));

        //A card with no review history renders blank, not zero
        assert_eq!(browser.display(find(&catalog, "cfirst"), fresh).unwrap(), None);
        assert_eq!(browser.display(find(&catalog, "clast"), fresh).unwrap(), None);
        assert_eq!(browser.display(find(&catalog, "cavgtime"), fresh).unwrap(), None);
        assert_eq!(browser.display(find(&catalog, "ctottime"), fresh).unwrap(), None);
    }

    #[test]
    fn catalog_and_menu_test() {

        let collection = Collection::open_in_memory().unwrap();
        collection.add_template(&NoteTemplate::new(BASIC_MID, "Basic", &["Front", "Back"])).unwrap();
        collection.add_template(&NoteTemplate::new(CLOZE_MID, "Cloze", &["Front", "Notes"])).unwrap();

        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();

        //5 built-ins plus one column per distinct field name ("Front" is shared)
        assert_eq!(catalog.len(), 5 + 3);

        //Column types are pairwise unique
        let types : HashSet<&str> = catalog.iter().map(|col| col.column_type.as_str()).collect();
        assert_eq!(types.len(), catalog.len());

        //The menu puts every field column in the fields group and everything else on top
        let menu = browser.context_menu().unwrap();
        assert_eq!(menu.top_level.len(), 5);
        assert_eq!(menu.fields.len(), 3);
        assert!(menu.fields.iter().all(|col| col.column_type.starts_with(FIELD_COLUMN_PREFIX)));
        assert!(menu.top_level.iter().all(|col| !col.column_type.starts_with(FIELD_COLUMN_PREFIX)));

        //Add a template after load; the next menu build picks up the new field without
        //any explicit rebuild call
        let extra = NoteTemplate::new(1600000000001, "Extra", &["Hint"]);
        browser.collection().add_template(&extra).unwrap();
        let menu = browser.context_menu().unwrap();
        assert_eq!(menu.fields.len(), 4);
        assert!(menu.fields.iter().any(|col| col.column_type == "_field_Hint"));
    }

    #[test]
    fn sort_by_field_test() {

        let collection = Collection::open_in_memory().unwrap();
        collection.add_template(&NoteTemplate::new(BASIC_MID, "Basic", &["Front", "Back"])).unwrap();

        //"<b>zebra</b>" must sort as "zebra" (last), not as markup (first); proving the
        //engine strips markup while sorting, not just the display path
        let (_n, banana) = collection.add_note(TemplateId(BASIC_MID), &["banana", "1"], &[]).unwrap();
        let (_n, zebra) = collection.add_note(TemplateId(BASIC_MID), &["<b>zebra</b>", "2"], &[]).unwrap();
        let (_n, apple) = collection.add_note(TemplateId(BASIC_MID), &["apple", "3"], &[]).unwrap();

        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();
        let front = find(&catalog, "_field_Front");

        assert_eq!(browser.cards_sorted_by(front).unwrap(), vec![apple, banana, zebra]);
    }

    #[test]
    fn sort_by_statistics_test() {

        let (collection, reviewed, fresh) = reviewed_collection();
        let (_n, later) = collection
            .add_note(TemplateId(BASIC_MID), &["middle", "note"], &[])
            .unwrap();
        collection.add_review(later, 1_650_000_000_000, 9000).unwrap();

        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();

        //SQLite sorts the NULL aggregate of the unreviewed card first in ascending order
        assert_eq!(
            browser.cards_sorted_by(find(&catalog, "cfirst")).unwrap(),
            vec![fresh, reviewed, later],
        );
        assert_eq!(
            browser.cards_sorted_by(find(&catalog, "ctottime")).unwrap(),
            vec![fresh, reviewed, later],
        );
    }

    #[test]
    fn sort_expression_quoting_test() {

        //A field name containing a quote must not break the generated sub-select
        let collection = Collection::open_in_memory().unwrap();
        collection.add_template(&NoteTemplate::new(BASIC_MID, "People", &["O'Brien", "Notes"])).unwrap();
        let (_n, second) = collection.add_note(TemplateId(BASIC_MID), &["walnut", "x"], &[]).unwrap();
        let (_n, first) = collection.add_note(TemplateId(BASIC_MID), &["acorn", "y"], &[]).unwrap();

        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();
        let column = find(&catalog, "_field_O'Brien");

        assert!(column.sort_expr().contains("'O''Brien'"));
        assert_eq!(browser.cards_sorted_by(column).unwrap(), vec![first, second]);
    }

    #[test]
    fn scalar_function_robustness_test() {

        //Drive the registered function through SQL directly, including with arguments a
        //well-behaved host would never pass; it must come back NULL, never error
        let (collection, _reviewed, _fresh) = reviewed_collection();
        let browser = BrowserColumns::new(collection).unwrap();
        let conn = browser.collection().conn();

        let value : Option<String> = conn.query_row(
            &format!("SELECT {SQL_FUNCTION_NAME}(mid, flds, 'Front') FROM notes LIMIT 1"),
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(value, Some("hello".to_string()));

        //Narrowed template id, as a 32-bit platform's engine would supply it
        let value : Option<String> = conn.query_row(
            &format!("SELECT {SQL_FUNCTION_NAME}(?1, flds, 'Front') FROM notes LIMIT 1"),
            [TemplateId(BASIC_MID).wrapped32().0],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(value, Some("hello".to_string()));

        //Unknown field name resolves to NULL
        let value : Option<String> = conn.query_row(
            &format!("SELECT {SQL_FUNCTION_NAME}(mid, flds, 'Nope') FROM notes LIMIT 1"),
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(value, None);

        //Malformed arguments (non-integer mid, NULL blob) degrade to NULL instead of
        //failing the query
        let value : Option<String> = conn.query_row(
            &format!("SELECT {SQL_FUNCTION_NAME}('pancake', 'a\u{1f}b', 'Front')"),
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(value, None);
        let value : Option<String> = conn.query_row(
            &format!("SELECT {SQL_FUNCTION_NAME}(mid, NULL, 'Front') FROM notes LIMIT 1"),
            [],
            |row| row.get(0),
        ).unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn malformed_template_catalog_test() {

        //One bad catalog entry must not take the good ones down with it
        let collection = Collection::open_in_memory().unwrap();
        collection.add_template(&NoteTemplate::new(BASIC_MID, "Basic", &["Front"])).unwrap();
        collection.conn().execute(
            "UPDATE col SET models = ?1 WHERE id = 1",
            [format!(
                r#"[{{"id": "not-an-integer", "name": "Broken"}}, {{"id": {BASIC_MID}, "name": "Basic", "fields": [{{"name": "Front", "ord": 0}}]}}]"#
            )],
        ).unwrap();

        let templates = collection.templates().unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name, "Basic");

        //And the browser still comes up with the surviving template indexed
        let browser = BrowserColumns::new(collection).unwrap();
        let catalog = browser.catalog();
        assert!(catalog.iter().any(|col| col.column_type == "_field_Front"));
    }
}
