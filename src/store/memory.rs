use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use tracing::debug;

use super::{ExceptionRecord, RecordStatus, SourceTable, StatusStore, TableSource};
use crate::core::{CxmlError, InvoiceBundle, InvoiceId, Sheet, Table};

/// In-process store for tests, demos, and offline runs.
///
/// Tables that were never inserted load as empty.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: HashMap<SourceTable, Table>,
    statuses: Mutex<BTreeMap<InvoiceId, RecordStatus>>,
    exceptions: Mutex<Vec<ExceptionRecord>>,
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> CxmlError {
    CxmlError::Store("memory store lock poisoned".into())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store holding every sheet of `bundle`.
    pub fn from_bundle(bundle: &InvoiceBundle) -> Self {
        let mut store = Self::new();
        for sheet in Sheet::ALL {
            store.insert(sheet.into(), bundle.table(sheet).clone());
        }
        store
    }

    pub fn insert(&mut self, which: SourceTable, table: Table) {
        self.tables.insert(which, table);
    }

    pub fn with(mut self, which: SourceTable, table: Table) -> Self {
        self.insert(which, table);
        self
    }

    /// Last status written for `id`.
    pub fn status(&self, id: &InvoiceId) -> Option<RecordStatus> {
        self.lock_statuses().ok()?.get(id).copied()
    }

    /// Every exception recorded so far, in insertion order.
    pub fn exceptions(&self) -> Vec<ExceptionRecord> {
        self.exceptions
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    fn lock_statuses(
        &self,
    ) -> Result<MutexGuard<'_, BTreeMap<InvoiceId, RecordStatus>>, CxmlError> {
        self.statuses.lock().map_err(poisoned)
    }
}

impl TableSource for MemoryStore {
    fn load(&self, which: SourceTable) -> Result<Table, CxmlError> {
        let table = self.tables.get(&which).cloned().unwrap_or_default();
        debug!(table = ?which, rows = table.len(), columns = table.columns().len(), "loaded table");
        Ok(table)
    }
}

impl StatusStore for MemoryStore {
    fn set_record_status(&self, id: &InvoiceId, status: RecordStatus) -> Result<(), CxmlError> {
        self.lock_statuses()?.insert(id.clone(), status);
        Ok(())
    }

    fn insert_exception(&self, record: &ExceptionRecord) -> Result<(), CxmlError> {
        self.exceptions.lock().map_err(poisoned)?.push(record.clone());
        Ok(())
    }
}
