//!
//! The Browser module contains the main [BrowserColumns] object: the integration point a
//! host record browser drives.  It owns the collection and the shared field index, and it
//! sequences the load-time ordering dependency (the scalar function must be registered
//! and the index built before any column sorts or displays).
//!

use std::sync::{Arc, RwLock};

use crate::collection::Collection;
use crate::columns::{build_catalog, build_menu, ColumnDescriptor, ColumnMenu};
use crate::error::Result;
use crate::extract::register_value_for_field;
use crate::field_index::{FieldIndex, SharedFieldIndex};
use crate::notes::CardId;

/// The custom-column subsystem for one open collection
///
/// All calls are driven sequentially by the host from one control flow; nothing here
/// spawns background work.  The only ordering requirement is the one [new](Self::new)
/// already takes care of: function registration and the first index build happen before
/// anything else.
pub struct BrowserColumns {
    collection : Collection,
    index : SharedFieldIndex,
}

impl BrowserColumns {

    /// Wraps a collection, registers the field extractor with its storage engine, and
    /// builds the field index from the current template catalog
    pub fn new(collection : Collection) -> Result<Self> {

        let index : SharedFieldIndex = Arc::new(RwLock::new(FieldIndex::new()));
        register_value_for_field(collection.conn(), index.clone())?;

        let browser = Self { collection, index };
        browser.rebuild_index()?;
        Ok(browser)
    }

    /// Rebuilds the field index from a fresh snapshot of the template catalog
    ///
    /// The index never invalidates itself.  The host must call this after any schema
    /// change (and [context_menu](Self::context_menu) does so on every open).
    pub fn rebuild_index(&self) -> Result<()> {
        let templates = self.collection.templates()?;
        self.write_index().rebuild(&templates);
        Ok(())
    }

    /// Assembles the ordered column catalog from the current index contents
    pub fn catalog(&self) -> Vec<ColumnDescriptor> {
        build_catalog(&self.read_index())
    }

    /// Builds the columns context menu, re-reading the template catalog first so the
    /// field list reflects any schema edits since the last open
    pub fn context_menu(&self) -> Result<ColumnMenu> {

        let templates = self.collection.templates()?;
        let mut index = self.write_index();

        //Rebuild before assembling the catalog so fields added since load get columns;
        //build_menu rebuilds again by contract before partitioning
        index.rebuild(&templates);
        let catalog = build_catalog(&index);
        Ok(build_menu(&mut index, &templates, catalog))
    }

    /// Computes the display value of one column for one card.  None renders as a blank
    /// cell.
    pub fn display(&self, column : &ColumnDescriptor, card_id : CardId) -> Result<Option<String>> {
        column.display(&self.collection, card_id)
    }

    /// Evaluates a column's sort expression inside the storage engine and returns every
    /// card in that order
    pub fn cards_sorted_by(&self, column : &ColumnDescriptor) -> Result<Vec<CardId>> {
        self.collection.cards_sorted_by(&column.sort_expr())
    }

    /// The wrapped collection
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn read_index(&self) -> std::sync::RwLockReadGuard<'_, FieldIndex> {
        //A poisoned lock means a rebuild panicked; there is no useful recovery
        self.index.read().expect("field index lock poisoned")
    }

    fn write_index(&self) -> std::sync::RwLockWriteGuard<'_, FieldIndex> {
        self.index.write().expect("field index lock poisoned")
    }
}
