//! The per-UUID symbol-table cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crashsym_symbols::{DsymBundle, SymbolProvider, SymbolTable};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::error::Error;

/// Caches loaded symbol tables, keyed by build UUID.
///
/// Loads for the same UUID are mutually exclusive: concurrent
/// [`get_or_load`](SymbolStore::get_or_load) calls for one UUID perform the
/// underlying bundle read once and share the result. A failed load commits
/// nothing; the next request retries.
#[derive(Default)]
pub struct SymbolStore {
    entries: Mutex<HashMap<Uuid, Arc<OnceCell<Arc<SymbolTable>>>>>,
    load_count: AtomicU64,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached table for `uuid`, if a load has completed.
    pub fn get(&self, uuid: Uuid) -> Option<Arc<SymbolTable>> {
        let entries = self.entries.lock().unwrap();
        entries.get(&uuid).and_then(|cell| cell.get().cloned())
    }

    /// Returns the cached table for `uuid` or loads it from `bundle` on the
    /// blocking pool.
    pub async fn get_or_load(
        &self,
        uuid: Uuid,
        bundle: &DsymBundle,
    ) -> Result<Arc<SymbolTable>, Error> {
        let cell = {
            let mut entries = self.entries.lock().unwrap();
            entries.entry(uuid).or_default().clone()
        };
        let table = cell
            .get_or_try_init(|| async {
                self.load_count.fetch_add(1, Ordering::Relaxed);
                let bundle = bundle.clone();
                let table = tokio::task::spawn_blocking(move || {
                    bundle.load_symbol_table(Some(uuid))
                })
                .await
                .map_err(|_| Error::TaskAborted)??;
                Ok::<Arc<SymbolTable>, Error>(Arc::new(table))
            })
            .await?;
        Ok(table.clone())
    }

    /// Adds an already-built table, e.g. one loaded synchronously.
    pub fn insert(&self, table: Arc<SymbolTable>) {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(table.uuid(), Arc::new(OnceCell::new_with(Some(table))));
    }

    /// Discards the working set. Called when a new crash file replaces the
    /// old one.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
    }

    /// How many underlying bundle reads have happened. Used by tests to
    /// observe cache behavior.
    pub fn load_count(&self) -> u64 {
        self.load_count.load(Ordering::Relaxed)
    }
}

impl SymbolProvider for SymbolStore {
    fn table_for_uuid(&self, uuid: Uuid) -> Option<Arc<SymbolTable>> {
        self.get(uuid)
    }
}
