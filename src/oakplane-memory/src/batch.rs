use oakplane_core::{Record, ResourceKind};
use oakplane_errors::StoreError;
use serde::Serialize;

#[derive(Debug, Clone)]
pub(crate) enum BatchOp {
    Put { db: &'static str, key: String, bytes: Vec<u8> },
    Delete { db: &'static str, key: String },
}

impl BatchOp {
    pub(crate) fn db(&self) -> &'static str {
        match self {
            BatchOp::Put { db, .. } | BatchOp::Delete { db, .. } => db,
        }
    }
}

/// Ordered set of writes applied all-or-nothing by [`crate::Memory::apply`].
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put<R: Record>(&mut self, record: &R) -> Result<&mut Self, StoreError> {
        self.put_raw(R::KIND.table(), record.id(), record)
    }

    pub fn put_all<'r, R: Record + 'r>(
        &mut self,
        records: impl IntoIterator<Item = &'r R>,
    ) -> Result<&mut Self, StoreError> {
        for record in records {
            self.put(record)?;
        }
        Ok(self)
    }

    pub fn delete<R: Record>(&mut self, id: &str) -> &mut Self {
        self.delete_kind(R::KIND, id)
    }

    pub fn delete_kind(&mut self, kind: ResourceKind, id: &str) -> &mut Self {
        self.delete_raw(kind.table(), id)
    }

    pub(crate) fn put_raw<T: Serialize>(
        &mut self,
        db: &'static str,
        key: &str,
        value: &T,
    ) -> Result<&mut Self, StoreError> {
        let bytes = rmp_serde::to_vec_named(value).map_err(|e| StoreError::Encode {
            table: db.to_string(),
            message: e.to_string(),
        })?;
        self.ops.push(BatchOp::Put { db, key: key.to_string(), bytes });
        Ok(self)
    }

    pub(crate) fn delete_raw(&mut self, db: &'static str, key: &str) -> &mut Self {
        self.ops.push(BatchOp::Delete { db, key: key.to_string() });
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub(crate) fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}
