use crate::batch::{BatchOp, WriteBatch};
use dashmap::DashMap;
use heed::types::Bytes;
use heed::{Env, EnvOpenOptions};
use oakplane_core::ResourceKind;
use oakplane_errors::StoreError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::collections::BTreeSet;
use std::path::Path;
#[cfg(feature = "testing")]
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

const LMDB_MAP_SIZE: usize = 1024 * 1024 * 1024 * 8;
const LMDB_MAX_DBS: u32 = 32;

/// Key/value engine backing the resource store.
pub struct Memory {
    kind: MemoryKind,
    #[cfg(feature = "testing")]
    failing_commits: AtomicUsize,
}

enum MemoryKind {
    LMDB {
        env: Env,
        dbs: DashMap<String, heed::Database<Bytes, Bytes>>,
    },
    Memory {
        map: DashMap<String, Vec<u8>>,
        // Batches take it exclusively so readers never see half of one.
        gate: RwLock<()>,
    },
}

pub(crate) fn decode<T: DeserializeOwned>(db: &str, bytes: &[u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Decode {
        table: db.to_string(),
        message: e.to_string(),
    })
}

impl Memory {
    /// Open LMDB storage at given path, creating one named database per resource table.
    pub fn open_lmdb<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path.as_ref())?;
        let env = unsafe {
            EnvOpenOptions::new()
                .max_dbs(LMDB_MAX_DBS)
                .map_size(LMDB_MAP_SIZE)
                .open(path.as_ref())
                .map_err(StoreError::engine)?
        };
        let memory = Self::with_kind(MemoryKind::LMDB {
            env,
            dbs: DashMap::new(),
        });
        if let MemoryKind::LMDB { env, dbs } = &memory.kind {
            for kind in ResourceKind::ALL {
                Self::get_db(env, dbs, kind.table())?;
            }
        }
        debug!(path = %path.as_ref().display(), "opened lmdb store");
        Ok(memory)
    }

    /// Open in-memory storage
    pub fn memory() -> Self {
        Self::with_kind(MemoryKind::Memory {
            map: DashMap::new(),
            gate: RwLock::new(()),
        })
    }

    fn with_kind(kind: MemoryKind) -> Self {
        Self {
            kind,
            #[cfg(feature = "testing")]
            failing_commits: AtomicUsize::new(0),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        match self.kind {
            MemoryKind::LMDB { .. } => "lmdb",
            MemoryKind::Memory { .. } => "memory",
        }
    }

    fn make_key(db: &str, key: &str) -> String {
        format!("{}/{}", db, key)
    }

    fn get_db(
        env: &Env,
        dbs: &DashMap<String, heed::Database<Bytes, Bytes>>,
        db_name: &str,
    ) -> Result<heed::Database<Bytes, Bytes>, StoreError> {
        if let Some(dbi) = dbs.get(db_name) {
            return Ok(*dbi);
        }
        let mut wtxn = env.write_txn().map_err(StoreError::engine)?;
        let dbi: heed::Database<Bytes, Bytes> = env
            .create_database::<Bytes, Bytes>(&mut wtxn, Some(db_name))
            .map_err(StoreError::engine)?;
        wtxn.commit().map_err(StoreError::engine)?;
        dbs.insert(db_name.to_string(), dbi);
        Ok(dbi)
    }

    /// Get by key
    pub fn get<T: DeserializeOwned>(&self, db: &str, key: &str) -> Result<Option<T>, StoreError> {
        match &self.kind {
            MemoryKind::LMDB { env, dbs } => {
                let dbi = Self::get_db(env, dbs, db)?;
                let rtxn = env.read_txn().map_err(StoreError::engine)?;
                match dbi.get(&rtxn, key.as_bytes()).map_err(StoreError::engine)? {
                    Some(bytes) => Ok(Some(decode(db, bytes)?)),
                    None => Ok(None),
                }
            }
            MemoryKind::Memory { map, gate } => {
                let _read = gate.read();
                match map.get(&Self::make_key(db, key)) {
                    Some(bytes) => Ok(Some(decode(db, bytes.value())?)),
                    None => Ok(None),
                }
            }
        }
    }

    /// Get all records
    pub fn all<T: DeserializeOwned>(&self, db: &str) -> Result<Vec<T>, StoreError> {
        match &self.kind {
            MemoryKind::LMDB { env, dbs } => {
                let dbi = Self::get_db(env, dbs, db)?;
                let rtxn = env.read_txn().map_err(StoreError::engine)?;
                let mut result = Vec::new();
                for item in dbi.iter(&rtxn).map_err(StoreError::engine)? {
                    let (_k, v) = item.map_err(StoreError::engine)?;
                    result.push(decode(db, v)?);
                }
                Ok(result)
            }
            MemoryKind::Memory { map, gate } => {
                let _read = gate.read();
                let prefix = format!("{}/", db);
                let mut result = Vec::new();
                for v in map.iter() {
                    if v.key().starts_with(&prefix) {
                        result.push(decode(db, v.value())?);
                    }
                }
                Ok(result)
            }
        }
    }

    /// Filter records by predicate
    pub fn filter<T, F>(&self, db: &str, mut pred: F) -> Result<Vec<T>, StoreError>
    where
        T: DeserializeOwned,
        F: FnMut(&T) -> bool,
    {
        Ok(self.all(db)?.into_iter().filter(|x| pred(x)).collect())
    }

    /// Apply every operation of the batch atomically.
    pub fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        #[cfg(feature = "testing")]
        if self
            .failing_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::engine("injected commit failure"));
        }

        let ops = batch.into_ops();
        match &self.kind {
            MemoryKind::LMDB { env, dbs } => {
                // Resolve handles first: creating a database opens its own write txn.
                let names: BTreeSet<&str> = ops.iter().map(BatchOp::db).collect();
                let mut handles = std::collections::HashMap::with_capacity(names.len());
                for name in names {
                    handles.insert(name, Self::get_db(env, dbs, name)?);
                }

                let mut wtxn = env.write_txn().map_err(StoreError::engine)?;
                for op in &ops {
                    let dbi = handles[op.db()];
                    match op {
                        BatchOp::Put { key, bytes, .. } => {
                            dbi.put(&mut wtxn, key.as_bytes(), bytes).map_err(StoreError::engine)?;
                        }
                        BatchOp::Delete { key, .. } => {
                            dbi.delete(&mut wtxn, key.as_bytes()).map_err(StoreError::engine)?;
                        }
                    }
                }
                wtxn.commit().map_err(StoreError::engine)?;
                Ok(())
            }
            MemoryKind::Memory { map, gate } => {
                let _write = gate.write();
                for op in ops {
                    match op {
                        BatchOp::Put { db, key, bytes } => {
                            map.insert(Self::make_key(db, &key), bytes);
                        }
                        BatchOp::Delete { db, key } => {
                            map.remove(&Self::make_key(db, &key));
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// Make the next `n` batch commits fail without touching any data.
    #[cfg(feature = "testing")]
    pub fn fail_next_commits(&self, n: usize) {
        self.failing_commits.store(n, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Row {
        id: String,
        weight: u16,
    }

    fn row(id: &str, weight: u16) -> Row {
        Row { id: id.into(), weight }
    }

    fn exercise(memory: &Memory) {
        let mut batch = WriteBatch::new();
        batch.put_raw("service_nodes", "a", &row("a", 1)).unwrap();
        batch.put_raw("service_nodes", "b", &row("b", 2)).unwrap();
        batch.put_raw("service_domains", "a", &row("a", 9)).unwrap();
        memory.apply(batch).unwrap();

        assert_eq!(memory.get::<Row>("service_nodes", "a").unwrap(), Some(row("a", 1)));
        assert_eq!(memory.all::<Row>("service_nodes").unwrap().len(), 2);
        assert_eq!(memory.get::<Row>("service_domains", "a").unwrap(), Some(row("a", 9)));

        let mut batch = WriteBatch::new();
        batch.delete_raw("service_nodes", "a");
        batch.put_raw("service_nodes", "b", &row("b", 5)).unwrap();
        memory.apply(batch).unwrap();

        assert_eq!(memory.get::<Row>("service_nodes", "a").unwrap(), None);
        let heavy: Vec<Row> = memory.filter("service_nodes", |r: &Row| r.weight > 3).unwrap();
        assert_eq!(heavy, vec![row("b", 5)]);
    }

    #[test]
    fn in_memory_engine_applies_batches() {
        exercise(&Memory::memory());
    }

    #[test]
    fn lmdb_engine_applies_batches() {
        let dir = tempfile::tempdir().unwrap();
        let memory = Memory::open_lmdb(dir.path().join("store")).unwrap();
        assert_eq!(memory.engine_name(), "lmdb");
        exercise(&memory);
    }

    #[test]
    fn tables_are_isolated_by_prefix() {
        let memory = Memory::memory();
        let mut batch = WriteBatch::new();
        batch.put_raw("routes", "x", &row("x", 1)).unwrap();
        batch.put_raw("routes_archive", "y", &row("y", 1)).unwrap();
        memory.apply(batch).unwrap();
        assert_eq!(memory.all::<Row>("routes").unwrap(), vec![row("x", 1)]);
    }
}
