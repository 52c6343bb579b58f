//! Minimal catalog: the subject's catalog is an out-of-scope collaborator
//! (spec.md §1); this is just enough of one to let `Scan`/`IndexScan`
//! members and the explorer answer "does an index exist, and what ordering
//! does it provide" without a real SQL front end.

use std::collections::HashMap;

use crate::expr::{ColumnId, IndexId, TableId};
use crate::ordering::{Ordering, OrderingColumn};

#[derive(Clone, Debug)]
pub struct IndexDef {
    pub id: IndexId,
    pub name: String,
    pub ordering: Ordering,
}

#[derive(Clone, Debug, Default)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnId>,
    pub indexes: Vec<IndexDef>,
}

/// A fixed, in-memory catalog. Real catalogs resolve names dynamically;
/// this one is built up-front by whoever constructs a `SearchDriver` for a
/// given query, mirroring how `optd-core` consumers hand the optimizer a
/// pre-resolved binding.
#[derive(Clone, Debug, Default)]
pub struct Catalog {
    tables: HashMap<TableId, TableDef>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, id: TableId, def: TableDef) {
        self.tables.insert(id, def);
    }

    pub fn table(&self, id: TableId) -> Option<&TableDef> {
        self.tables.get(&id)
    }

    /// Orderings an index-backed scan of `table` can produce without a
    /// Sort enforcer — fed to `deriveInterestingOrderings` for `Scan`
    /// members and directly consulted by `IndexScan::can_provide`.
    pub fn index_orderings(&self, table: TableId) -> Vec<Ordering> {
        self.tables
            .get(&table)
            .map(|t| t.indexes.iter().map(|ix| ix.ordering.clone()).collect())
            .unwrap_or_default()
    }

    pub fn index(&self, table: TableId, index: IndexId) -> Option<&IndexDef> {
        self.tables
            .get(&table)
            .and_then(|t| t.indexes.iter().find(|ix| ix.id == index))
    }
}

pub fn single_column_index(id: IndexId, name: &str, col: ColumnId) -> IndexDef {
    IndexDef {
        id,
        name: name.to_string(),
        ordering: Ordering::new(vec![OrderingColumn::asc(col)]),
    }
}
