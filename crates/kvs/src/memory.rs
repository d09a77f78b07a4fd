//! Reference in-memory `Database` implementation. Not the production KVS —
//! the real store is external — but sufficient to drive every testable
//! scenario end-to-end, the way the original engine's test suite links
//! against an in-memory `kvs::database` for the same purpose.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ahash::RandomState;
use common::{DbError, DbResult, TransactionId};
use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};

use crate::traits::{Database, PutOption, ScanBound, Storage, Transaction, TransactionKind, TransactionMode};

type Map<K, V> = HashMap<K, V, RandomState>;
type Set<K> = HashSet<K, RandomState>;

#[derive(Clone, Debug)]
struct VersionedEntry {
    value: Vec<u8>,
    version: u64,
}

struct Inner {
    tables: RwLock<Map<String, std::collections::BTreeMap<Vec<u8>, VersionedEntry>>>,
    commit_version: AtomicU64,
    next_tx_id: AtomicU64,
}

impl Inner {
    fn table_exists(&self, name: &str) -> bool {
        self.tables.read().contains_key(name)
    }
}

/// An in-memory `Database`. Cloning shares the same underlying store.
#[derive(Clone)]
pub struct InMemoryDatabase(Arc<Inner>);

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self(Arc::new(Inner {
            tables: RwLock::new(Map::default()),
            commit_version: AtomicU64::new(0),
            next_tx_id: AtomicU64::new(1),
        }))
    }

    fn normalize_mode(&self, mode: TransactionMode) -> DbResult<TransactionMode> {
        for name in mode
            .write_preserve
            .iter()
            .chain(mode.read_area_inclusive.iter())
            .chain(mode.read_area_exclusive.iter())
        {
            if !self.0.table_exists(name) {
                return Err(DbError::Catalog(format!(
                    "unknown table '{name}' in transaction begin parameters"
                )));
            }
        }
        match &mode.kind {
            TransactionKind::Short { .. } => {
                if !mode.write_preserve.is_empty() {
                    return Err(DbError::WritePreserveViolation(
                        "write_preserve is only valid on a long transaction".into(),
                    ));
                }
                // Read areas are ignored (not validated further) for short tx.
                Ok(TransactionMode {
                    kind: mode.kind,
                    write_preserve: Vec::new(),
                    read_area_inclusive: Vec::new(),
                    read_area_exclusive: Vec::new(),
                })
            }
            TransactionKind::Long => {
                let mut inclusive: Vec<String> = dedupe(&mode.read_area_inclusive);
                let exclusive: Vec<String> = dedupe(&mode.read_area_exclusive);
                // A table on both lists loses the inclusive grant.
                inclusive.retain(|name| !exclusive.contains(name));
                Ok(TransactionMode {
                    kind: TransactionKind::Long,
                    write_preserve: dedupe(&mode.write_preserve),
                    read_area_inclusive: inclusive,
                    read_area_exclusive: exclusive,
                })
            }
        }
    }
}

impl Default for InMemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

fn dedupe(names: &[String]) -> Vec<String> {
    let mut seen = Set::default();
    let mut out = Vec::new();
    for name in names {
        if seen.insert(name.clone()) {
            out.push(name.clone());
        }
    }
    out
}

impl Database for InMemoryDatabase {
    fn get_or_create_storage(&self, name: &str) -> DbResult<Arc<dyn Storage>> {
        self.0
            .tables
            .write()
            .entry(name.to_string())
            .or_default();
        Ok(Arc::new(InMemoryStorage {
            name: name.to_string(),
            inner: self.0.clone(),
        }))
    }

    fn begin_transaction(&self, mode: TransactionMode) -> DbResult<Arc<dyn Transaction>> {
        let mode = self.normalize_mode(mode)?;
        let tx_id = self.0.next_tx_id.fetch_add(1, Ordering::Relaxed);
        let begin_version = self.0.commit_version.load(Ordering::Acquire);
        tracing::debug!(tx_id, ?mode, "begin_transaction");
        Ok(Arc::new(InMemoryTransaction {
            id: TransactionId(format!("tx{tx_id}")),
            mode,
            inner: self.0.clone(),
            begin_version,
            active: AtomicBool::new(true),
            overlay: Mutex::new(Map::default()),
            read_set: Mutex::new(Set::default()),
        }))
    }
}

struct InMemoryTransaction {
    id: TransactionId,
    mode: TransactionMode,
    inner: Arc<Inner>,
    begin_version: u64,
    active: AtomicBool,
    overlay: Mutex<Map<(String, Vec<u8>), Option<Vec<u8>>>>,
    read_set: Mutex<Set<(String, Vec<u8>)>>,
}

impl InMemoryTransaction {
    fn check_active(&self) -> DbResult<()> {
        if self.is_active() {
            Ok(())
        } else {
            Err(DbError::InactiveTransaction(format!(
                "transaction {} is not active",
                self.id
            )))
        }
    }

    fn check_write_preserve(&self, table: &str) -> DbResult<()> {
        if self.mode.is_long() && !self.mode.write_preserve.iter().any(|t| t == table) {
            return Err(DbError::WritePreserveViolation(format!(
                "table '{table}' is not in this transaction's write-preserve set"
            )));
        }
        Ok(())
    }

    fn check_read_area(&self, table: &str) -> DbResult<()> {
        if !self.mode.is_long() {
            return Ok(());
        }
        if self.mode.read_area_exclusive.iter().any(|t| t == table) {
            return Err(DbError::RestrictedReadArea(format!(
                "table '{table}' is excluded from this transaction's read area"
            )));
        }
        if !self.mode.read_area_inclusive.is_empty()
            && !self.mode.read_area_inclusive.iter().any(|t| t == table)
        {
            return Err(DbError::RestrictedReadArea(format!(
                "table '{table}' is not in this transaction's read area"
            )));
        }
        Ok(())
    }

    fn visible(&self, table: &str, key: &[u8]) -> Option<Vec<u8>> {
        let overlay_key = (table.to_string(), key.to_vec());
        if let Some(entry) = self.overlay.lock().get(&overlay_key) {
            return entry.clone();
        }
        self.read_set.lock().insert(overlay_key);
        self.inner
            .tables
            .read()
            .get(table)
            .and_then(|t| t.get(key))
            .map(|e| e.value.clone())
    }
}

impl Transaction for InMemoryTransaction {
    fn id(&self) -> &TransactionId {
        &self.id
    }

    fn mode(&self) -> &TransactionMode {
        &self.mode
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn commit(&self) -> DbResult<()> {
        self.check_active()?;
        if !self.mode.is_long() {
            let read_set = self.read_set.lock();
            let tables = self.inner.tables.read();
            for (table, key) in read_set.iter() {
                let current_version = tables
                    .get(table)
                    .and_then(|t| t.get(key))
                    .map(|e| e.version)
                    .unwrap_or(0);
                if current_version > self.begin_version {
                    drop(tables);
                    self.active.store(false, Ordering::Release);
                    return Err(DbError::SerializationFailure(format!(
                        "key in table '{table}' was modified by a concurrent transaction"
                    )));
                }
            }
        }
        let overlay = self.overlay.lock();
        let new_version = self.inner.commit_version.fetch_add(1, Ordering::AcqRel) + 1;
        let mut tables = self.inner.tables.write();
        for ((table, key), value) in overlay.iter() {
            let entries = tables.entry(table.clone()).or_default();
            match value {
                Some(bytes) => {
                    entries.insert(
                        key.clone(),
                        VersionedEntry {
                            value: bytes.clone(),
                            version: new_version,
                        },
                    );
                }
                None => {
                    entries.remove(key);
                }
            }
        }
        drop(tables);
        self.active.store(false, Ordering::Release);
        tracing::debug!(tx_id = %self.id, "commit");
        Ok(())
    }

    fn abort(&self) -> DbResult<()> {
        self.active.store(false, Ordering::Release);
        tracing::debug!(tx_id = %self.id, "abort");
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

struct InMemoryStorage {
    name: String,
    inner: Arc<Inner>,
}

fn downcast(tx: &dyn Transaction) -> DbResult<&InMemoryTransaction> {
    tx.as_any()
        .downcast_ref::<InMemoryTransaction>()
        .ok_or_else(|| DbError::Kvs("transaction does not belong to this database".into()))
}

impl Storage for InMemoryStorage {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, tx: &dyn Transaction, key: &[u8]) -> DbResult<Option<Vec<u8>>> {
        let tx = downcast(tx)?;
        tx.check_active()?;
        tx.check_read_area(&self.name)?;
        Ok(tx.visible(&self.name, key))
    }

    fn put(
        &self,
        tx: &dyn Transaction,
        key: &[u8],
        value: &[u8],
        option: PutOption,
    ) -> DbResult<()> {
        let tx = downcast(tx)?;
        tx.check_active()?;
        tx.check_write_preserve(&self.name)?;
        if option == PutOption::Create && tx.visible(&self.name, key).is_some() {
            return Err(DbError::UniqueConstraintViolation(format!(
                "key already exists in storage '{}'",
                self.name
            )));
        }
        tx.overlay
            .lock()
            .insert((self.name.clone(), key.to_vec()), Some(value.to_vec()));
        Ok(())
    }

    fn remove(&self, tx: &dyn Transaction, key: &[u8]) -> DbResult<()> {
        let tx = downcast(tx)?;
        tx.check_active()?;
        tx.check_write_preserve(&self.name)?;
        tx.overlay
            .lock()
            .insert((self.name.clone(), key.to_vec()), None);
        Ok(())
    }

    fn scan(
        &self,
        tx: &dyn Transaction,
        lo: ScanBound,
        hi: ScanBound,
    ) -> DbResult<Box<dyn Iterator<Item = (Vec<u8>, Vec<u8>)> + '_>> {
        let tx = downcast(tx)?;
        tx.check_active()?;
        tx.check_read_area(&self.name)?;

        let mut keys: std::collections::BTreeSet<Vec<u8>> = self
            .inner
            .tables
            .read()
            .get(&self.name)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        for (table, key) in tx.overlay.lock().keys() {
            if table == &self.name {
                keys.insert(key.clone());
            }
        }

        let in_range = move |key: &[u8]| -> bool {
            let above_lo = match &lo {
                ScanBound::Unbounded => true,
                ScanBound::Inclusive(b) => key >= b.as_slice(),
                ScanBound::Exclusive(b) => key > b.as_slice(),
            };
            let below_hi = match &hi {
                ScanBound::Unbounded => true,
                ScanBound::Inclusive(b) => key <= b.as_slice(),
                ScanBound::Exclusive(b) => key < b.as_slice(),
            };
            above_lo && below_hi
        };

        let rows: Vec<(Vec<u8>, Vec<u8>)> = keys
            .into_iter()
            .filter(|k| in_range(k))
            .filter_map(|k| tx.visible(&self.name, &k).map(|v| (k, v)))
            .collect();
        Ok(Box::new(rows.into_iter()))
    }
}
