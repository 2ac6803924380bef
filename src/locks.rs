//! Exclusive row locks with a bounded wait, giving `SELECT ... FOR UPDATE`
//! semantics on top of sled's optimistic transactions.
use crate::error::{LedgerError, LedgerResult};
use parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

type RowMutex = Arc<Mutex<()>>;

/// Table of row mutexes. An entry lives only while someone holds or waits on it.
#[derive(Debug, Default)]
pub struct LockTable {
    rows: Mutex<HashMap<String, RowMutex>>,
}

/// Held row lock. Dropping it releases the row and forgets idle entries.
pub struct RowGuard<'a> {
    table: &'a LockTable,
    row_key: String,
    guard: Option<ArcMutexGuard<RawMutex, ()>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the row is ours or `timeout` elapses.
    pub fn lock_row(&self, row_key: &str, timeout: Duration) -> LedgerResult<RowGuard<'_>> {
        // waiters hold a clone of the Arc, which keeps the entry alive for them
        let row = {
            let mut rows = self.rows.lock();
            rows.entry(row_key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        match row.try_lock_arc_for(timeout) {
            Some(guard) => Ok(RowGuard {
                table: self,
                row_key: row_key.to_string(),
                guard: Some(guard),
            }),
            None => {
                drop(row);
                self.forget_if_idle(row_key);
                tracing::warn!(row = row_key, ?timeout, "row lock wait timed out");
                Err(LedgerError::Contention(format!("could not lock {row_key}")))
            }
        }
    }

    /// Number of rows currently held or waited on.
    pub fn tracked_rows(&self) -> usize {
        self.rows.lock().len()
    }

    fn forget_if_idle(&self, row_key: &str) {
        let mut rows = self.rows.lock();
        if rows
            .get(row_key)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            rows.remove(row_key);
        }
    }
}

impl Drop for RowGuard<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.table.forget_if_idle(&self.row_key);
    }
}

impl std::fmt::Debug for RowGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowGuard").field("row_key", &self.row_key).finish()
    }
}
