//! Published catalog with copy-on-write merges.
//!
//! Readers hold an `Arc` snapshot and never observe a half-merged catalog:
//! a merge pass works on its own copy and publishes it with one pointer swap.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::catalog::Catalog;
use crate::merge::{merge_into, Staged};
use crate::report::MergeReport;

pub struct CatalogStore {
    current: RwLock<Arc<Catalog>>,
    /// Serializes merge passes so the tie-break order stays well defined.
    writer: Mutex<()>,
}

impl CatalogStore {
    pub fn new(catalog: Catalog) -> Self {
        Self {
            current: RwLock::new(Arc::new(catalog)),
            writer: Mutex::new(()),
        }
    }

    /// The currently published catalog.
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read())
    }

    /// Merge `batch` and publish the result.
    pub fn merge(&self, batch: Vec<Staged>) -> MergeReport {
        let _guard = self.writer.lock();
        let mut next = Catalog::clone(&self.snapshot());
        let mut report = MergeReport::default();
        merge_into(&mut next, batch, &mut report);
        self.publish(next);
        report
    }

    /// Replace the published catalog wholesale.
    pub fn publish(&self, catalog: Catalog) {
        *self.current.write() = Arc::new(catalog);
    }
}
