//!
//! The Columns module contains the column descriptors handed to the host browser: the
//! built-in review statistic columns, the tags column, and one column per distinct note
//! field name.  It also contains the catalog and context-menu builders.
//!

use time::OffsetDateTime;
use time::macros::format_description;

use crate::collection::Collection;
use crate::error::Result;
use crate::extract::{display_value, SQL_FUNCTION_NAME};
use crate::field_index::FieldIndex;
use crate::notes::CardId;
use crate::templates::NoteTemplate;

/// What a column computes.  Field columns carry their bound field name as plain data and
/// dispatch through the one shared extractor, rather than each capturing a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKind {
    /// Earliest review of the card, shown as a calendar date
    FirstReview,
    /// Latest review of the card, shown as a calendar date
    LastReview,
    /// Mean review duration in seconds
    AverageTime,
    /// Summed review duration in seconds
    TotalTime,
    /// The note's tags, space-joined
    Tags,
    /// The named note field, markup-stripped
    Field(String),
}

/// One column as registered with the host browser
///
/// `column_type` is the unique internal identifier; `display_name` is what the user sees
/// in the header and the context menu.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub column_type : String,
    pub display_name : String,
    pub kind : ColumnKind,
}

impl ColumnDescriptor {

    /// Computes the cell value for one card (the display path)
    ///
    /// None means a blank cell: a card with no reviews has no review dates or durations,
    /// and a note shows nothing under a field its template doesn't declare.
    pub fn display(&self, collection : &Collection, card_id : CardId) -> Result<Option<String>> {

        let value = match &self.kind {
            ColumnKind::FirstReview => {
                collection.first_review_ms(card_id)?.and_then(format_review_date)
            },
            ColumnKind::LastReview => {
                collection.last_review_ms(card_id)?.and_then(format_review_date)
            },
            ColumnKind::AverageTime => {
                collection.average_time_ms(card_id)?.map(format_seconds)
            },
            ColumnKind::TotalTime => {
                collection.total_time_ms(card_id)?.map(|ms| format_seconds(ms as f64))
            },
            ColumnKind::Tags => {
                Some(collection.card_note(card_id)?.joined_tags())
            },
            ColumnKind::Field(field_name) => {
                display_value(&collection.card_note(card_id)?, field_name)
            },
        };
        Ok(value)
    }

    /// The SQL expression the host embeds in its browse query to sort by this column
    ///
    /// The statistic expressions are correlated sub-selects against the review event log;
    /// the field expression is a correlated sub-select calling the registered scalar
    /// function with the bound field name as a string literal.
    pub fn sort_expr(&self) -> String {

        match &self.kind {
            ColumnKind::FirstReview => "(select min(id) from revlog where cid = c.id)".to_string(),
            ColumnKind::LastReview => "(select max(id) from revlog where cid = c.id)".to_string(),
            ColumnKind::AverageTime => "(select avg(time) from revlog where cid = c.id)".to_string(),
            ColumnKind::TotalTime => "(select sum(time) from revlog where cid = c.id)".to_string(),
            ColumnKind::Tags => "n.tags".to_string(),
            ColumnKind::Field(field_name) => format!(
                "(select {}(mid, flds, '{}') from notes where id = c.nid)",
                SQL_FUNCTION_NAME,
                field_name.replace('\'', "''"),
            ),
        }
    }
}

/// The context menu structure handed to the host browser: statistic and tags columns at
/// the top level, note-field columns gathered into a "Fields" submenu
#[derive(Debug, Clone)]
pub struct ColumnMenu {
    pub top_level : Vec<ColumnDescriptor>,
    pub fields : Vec<ColumnDescriptor>,
}

/// Assembles the full ordered column catalog: the four review statistics, the tags
/// column, then one column per distinct field name known to the index
///
/// Column types are unique across the catalog; the field-name namespace prefix keeps a
/// field that happens to be named e.g. "ntags" from colliding with a built-in type.
pub fn build_catalog(index : &FieldIndex) -> Vec<ColumnDescriptor> {

    let mut catalog = vec![
        ColumnDescriptor {
            column_type : "cfirst".to_string(),
            display_name : "First Review".to_string(),
            kind : ColumnKind::FirstReview,
        },
        ColumnDescriptor {
            column_type : "clast".to_string(),
            display_name : "Last Review".to_string(),
            kind : ColumnKind::LastReview,
        },
        ColumnDescriptor {
            column_type : "cavgtime".to_string(),
            display_name : "Time (Average)".to_string(),
            kind : ColumnKind::AverageTime,
        },
        ColumnDescriptor {
            column_type : "ctottime".to_string(),
            display_name : "Time (Total)".to_string(),
            kind : ColumnKind::TotalTime,
        },
        ColumnDescriptor {
            column_type : "ntags".to_string(),
            display_name : "Tags".to_string(),
            kind : ColumnKind::Tags,
        },
    ];

    for (column_type, field_name) in index.field_columns() {
        catalog.push(ColumnDescriptor {
            column_type : column_type.clone(),
            display_name : field_name.clone(),
            kind : ColumnKind::Field(field_name.clone()),
        });
    }

    catalog
}

/// Partitions a catalog into the context menu structure
///
/// The index is rebuilt from the supplied template snapshot first, because templates may
/// have changed since the catalog was built (the user can add or rename fields at any
/// time).  The menu is rebuilt on every open rather than cached.
pub fn build_menu(index : &mut FieldIndex, templates : &[NoteTemplate], catalog : Vec<ColumnDescriptor>) -> ColumnMenu {

    index.rebuild(templates);

    let mut menu = ColumnMenu { top_level : Vec::new(), fields : Vec::new() };
    for column in catalog {
        if index.is_field_column(&column.column_type) {
            menu.fields.push(column);
        } else {
            menu.top_level.push(column);
        }
    }
    menu
}

/// Formats a millisecond epoch timestamp as a calendar date, e.g. "2024-03-17"
///
/// Returns None for a timestamp outside the representable range instead of failing the
/// row.
fn format_review_date(timestamp_ms : i64) -> Option<String> {
    let datetime = OffsetDateTime::from_unix_timestamp(timestamp_ms / 1000).ok()?;
    datetime.format(format_description!("[year]-[month]-[day]")).ok()
}

/// Formats a millisecond duration as seconds with one decimal place, e.g. "2.0s"
fn format_seconds(duration_ms : f64) -> String {
    format!("{:.1}s", duration_ms / 1000.0)
}
