//! StateStore: redb-backed persistence for stack runs.
//!
//! Both tables hold JSON in `&[u8]` value columns. Every write is its own
//! transaction, so a record put right after a resource is realized survives
//! a later failure in the same run.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::{RESOURCES, STACKS};
use crate::types::{ResourceRecord, StackState, resource_key};

macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) the state database at `path`.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Ephemeral store, used by tests and `preview` without a state file.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(STACKS).map_err(map_err!(Table))?;
        txn.open_table(RESOURCES).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            table
                .insert(key, bytes.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => {
                let value = serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Every value whose key starts with `prefix`, in key order.
    fn scan<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().starts_with(prefix) {
                results.push(serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?);
            }
        }
        Ok(results)
    }

    fn remove(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(table).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    // ── Stacks ─────────────────────────────────────────────────────

    pub fn put_stack(&self, state: &StackState) -> StateResult<()> {
        let key = state.table_key();
        self.put(STACKS, &key, state)?;
        debug!(%key, outputs = state.outputs.len(), "stack state stored");
        Ok(())
    }

    pub fn get_stack(&self, name: &str) -> StateResult<Option<StackState>> {
        self.get(STACKS, name)
    }

    pub fn list_stacks(&self) -> StateResult<Vec<StackState>> {
        self.scan(STACKS, "")
    }

    /// Delete a stack's state row. Returns true if it existed.
    pub fn delete_stack(&self, name: &str) -> StateResult<bool> {
        let existed = self.remove(STACKS, name)?;
        debug!(key = %name, existed, "stack state deleted");
        Ok(existed)
    }

    // ── Resources ──────────────────────────────────────────────────

    pub fn put_resource(&self, record: &ResourceRecord) -> StateResult<()> {
        let key = record.table_key();
        self.put(RESOURCES, &key, record)?;
        debug!(%key, hash = %record.spec_hash, "resource record stored");
        Ok(())
    }

    pub fn get_resource(&self, stack: &str, name: &str) -> StateResult<Option<ResourceRecord>> {
        self.get(RESOURCES, &resource_key(stack, name))
    }

    /// All records of one stack (prefix scan on `{stack}:`).
    pub fn list_resources(&self, stack: &str) -> StateResult<Vec<ResourceRecord>> {
        self.scan(RESOURCES, &resource_key(stack, ""))
    }

    pub fn delete_resource(&self, stack: &str, name: &str) -> StateResult<bool> {
        let key = resource_key(stack, name);
        let existed = self.remove(RESOURCES, &key)?;
        debug!(%key, existed, "resource record deleted");
        Ok(existed)
    }
}
