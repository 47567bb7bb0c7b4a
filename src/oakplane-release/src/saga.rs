//! Store/registry transactions.
//!
//! The store and the registry cannot share a transaction, so each release is
//! a two step saga with an explicit compensating step:
//!
//! * [`ReleaseSaga`]: the data is already committed with the fallback status.
//!   Push the document; on success advance to Published, on failure write the
//!   fallback status back and report the publish error.
//! * [`DeleteSaga`]: remove the registry documents first, then delete the
//!   rows. If the store refuses, the documents are pushed again (best effort)
//!   and the store error is returned.

use crate::ControlPlane;
use oakplane_core::{Releasable, ReleaseStatus, ResourceKind};
use oakplane_errors::{ControlError, ControlResult, StoreError};
use oakplane_memory::{StoreRead, StoreWriter, WriteBatch};
use serde_json::Value;
use std::marker::PhantomData;
use tracing::{error, info, warn};

pub struct ReleaseSaga<'a, R: Releasable> {
    plane: &'a ControlPlane,
    id: &'a str,
    fallback: ReleaseStatus,
    _record: PhantomData<R>,
}

impl<'a, R: Releasable> ReleaseSaga<'a, R> {
    /// `fallback` is the status the record holds if the push does not succeed.
    pub fn new(plane: &'a ControlPlane, id: &'a str, fallback: ReleaseStatus) -> Self {
        Self { plane, id, fallback, _record: PhantomData }
    }

    pub async fn run(self, document: Value) -> ControlResult<()> {
        match self.plane.publisher().publish(R::KIND, self.id, Some(&document)).await {
            Ok(()) => {
                self.set_status(ReleaseStatus::Published).await?;
                info!(kind = %R::KIND, id = self.id, status = %ReleaseStatus::Published, "resource released");
                Ok(())
            }
            Err(source) => {
                warn!(kind = %R::KIND, id = self.id, error = %source, "release push failed, restoring status");
                self.compensate().await;
                Err(ControlError::publish(R::KIND, self.id, source))
            }
        }
    }

    async fn compensate(&self) {
        if let Err(e) = self.set_status(self.fallback).await {
            error!(kind = %R::KIND, id = self.id, status = %self.fallback, "failed to restore release status: {e}");
        }
    }

    async fn set_status(&self, status: ReleaseStatus) -> Result<(), StoreError> {
        let writer = self.plane.store().writer().await;
        // A concurrent delete wins; nothing left to mark.
        let Some(mut record) = writer.get::<R>(self.id)? else {
            return Ok(());
        };
        if record.release_status() == status {
            return Ok(());
        }
        record.set_release_status(status);
        writer.put(&record)
    }
}

/// One registry document removed by a delete, with what to push back if the
/// store delete fails.
pub struct RegistryEntry {
    pub kind: ResourceKind,
    pub id: String,
    pub restore: Value,
}

pub struct DeleteSaga<'a> {
    plane: &'a ControlPlane,
    kind: ResourceKind,
    id: &'a str,
    entries: Vec<RegistryEntry>,
}

impl<'a> DeleteSaga<'a> {
    pub fn new(plane: &'a ControlPlane, kind: ResourceKind, id: &'a str) -> Self {
        Self { plane, kind, id, entries: Vec::new() }
    }

    /// Registry documents to remove, in removal order.
    pub fn with_entry(mut self, entry: RegistryEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// `build` assembles the store delete under the write section it is committed in.
    pub async fn run<F>(self, build: F) -> ControlResult<()>
    where
        F: FnOnce(&StoreWriter<'_>) -> ControlResult<WriteBatch>,
    {
        let publisher = self.plane.publisher();
        for (done, entry) in self.entries.iter().enumerate() {
            if let Err(source) = publisher.publish(entry.kind, &entry.id, None).await {
                warn!(kind = %entry.kind, id = %entry.id, error = %source, "registry delete failed");
                self.restore(&self.entries[..done]).await;
                return Err(ControlError::publish(entry.kind, &entry.id, source));
            }
        }

        let result = {
            let writer = self.plane.store().writer().await;
            build(&writer).and_then(|batch| writer.commit(batch).map_err(ControlError::from))
        };
        if let Err(e) = result {
            warn!(kind = %self.kind, id = self.id, error = %e, "store delete failed, re-pushing configuration");
            self.restore(&self.entries).await;
            return Err(e);
        }
        info!(kind = %self.kind, id = self.id, "resource deleted");
        Ok(())
    }

    async fn restore(&self, entries: &[RegistryEntry]) {
        for entry in entries.iter().rev() {
            if let Err(e) = self.plane.publisher().publish(entry.kind, &entry.id, Some(&entry.restore)).await {
                error!(kind = %entry.kind, id = %entry.id, "failed to re-push configuration: {e}");
            }
        }
    }
}
