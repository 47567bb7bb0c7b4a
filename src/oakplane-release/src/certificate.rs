use crate::inputs::CertificateInput;
use crate::saga::{DeleteSaga, RegistryEntry, ReleaseSaga};
use crate::{ControlPlane, matches_search, render, validator};
use chrono::{DateTime, Utc};
use oakplane_core::{Certificate, Page, Paged, Releasable, ReleaseStatus, ResourceKind, new_id};
use oakplane_errors::ControlResult;
use oakplane_memory::{StoreRead, WriteBatch};
use serde::Serialize;
use tracing::info;

/// Certificate as shown to operators; key material stays in the store.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    pub id: String,
    pub sni: String,
    pub expired_at: DateTime<Utc>,
    pub is_enable: bool,
    pub release_status: ReleaseStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Certificate> for CertificateInfo {
    fn from(c: &Certificate) -> Self {
        Self {
            id: c.id.clone(),
            sni: c.sni.clone(),
            expired_at: c.expired_at,
            is_enable: c.is_enable,
            release_status: c.release_status,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

impl ControlPlane {
    pub async fn certificate_create(&self, input: CertificateInput) -> ControlResult<Certificate> {
        let facts = input.validate()?;
        let now = Utc::now();
        let certificate = Certificate {
            id: new_id(ResourceKind::Certificate),
            sni: facts.sni,
            certificate: input.certificate,
            private_key: input.private_key,
            expired_at: facts.not_after,
            is_enable: input.is_enable,
            release_status: ReleaseStatus::Unpublished,
            created_at: now,
            updated_at: now,
        };

        {
            let writer = self.store.writer().await;
            validator::certificate_uniqueness(&writer, &certificate.sni, None)?;
            validator::domain_not_covered_by_certificate(&writer, &certificate.sni, None)?;
            writer.put(&certificate)?;
        }
        info!(id = %certificate.id, sni = %certificate.sni, expired_at = %certificate.expired_at, "certificate created");

        if input.is_release {
            ReleaseSaga::<Certificate>::new(self, &certificate.id, ReleaseStatus::Unpublished)
                .run(render::certificate_document(&certificate))
                .await?;
        }
        validator::require(self.store.as_ref(), &certificate.id)
    }

    /// Certificates follow the delete rule for updates too: a published and
    /// enabled or a pending certificate cannot be edited.
    pub async fn certificate_update(&self, id: &str, input: CertificateInput) -> ControlResult<Certificate> {
        let facts = input.validate()?;
        let sni = facts.sni;
        let certificate = {
            let writer = self.store.writer().await;
            let prior = validator::require::<Certificate>(&writer, id)?;
            validator::releasable_deletable(&prior)?;
            validator::certificate_uniqueness(&writer, &sni, Some(id))?;
            validator::domain_not_covered_by_certificate(&writer, &sni, Some(id))?;
            if prior.sni != sni || !input.is_enable {
                validator::certificate_domains_in_use(&writer, &prior)?;
            }

            let certificate = Certificate {
                sni,
                certificate: input.certificate,
                private_key: input.private_key,
                expired_at: facts.not_after,
                is_enable: input.is_enable,
                release_status: prior.release_status.after_edit(),
                updated_at: Utc::now(),
                ..prior
            };
            writer.put(&certificate)?;
            certificate
        };
        info!(id, sni = %certificate.sni, status = %certificate.release_status, "certificate updated");

        if input.is_release {
            ReleaseSaga::<Certificate>::new(self, id, certificate.release_status)
                .run(render::certificate_document(&certificate))
                .await?;
        }
        validator::require(self.store.as_ref(), id)
    }

    pub async fn certificate_delete(&self, id: &str) -> ControlResult<()> {
        let mut saga = DeleteSaga::new(self, ResourceKind::Certificate, id);
        {
            let writer = self.store.writer().await;
            let certificate = validator::require::<Certificate>(&writer, id)?;
            validator::releasable_deletable(&certificate)?;
            validator::certificate_domains_in_use(&writer, &certificate)?;
            if certificate.release_status.in_registry() {
                saga = saga.with_entry(RegistryEntry {
                    kind: ResourceKind::Certificate,
                    id: id.to_string(),
                    restore: render::certificate_document(&certificate),
                });
            }
        }

        saga.run(|writer| {
            let certificate = validator::require::<Certificate>(writer, id)?;
            validator::releasable_deletable(&certificate)?;
            validator::certificate_domains_in_use(writer, &certificate)?;
            let mut batch = WriteBatch::new();
            batch.delete::<Certificate>(id);
            Ok(batch)
        })
        .await
    }

    pub async fn certificate_release(&self, id: &str) -> ControlResult<()> {
        let certificate = validator::require::<Certificate>(self.store.as_ref(), id)?;
        validator::not_yet_published(&certificate)?;
        ReleaseSaga::<Certificate>::new(self, id, certificate.release_status)
            .run(render::certificate_document(&certificate))
            .await
    }

    pub async fn certificate_switch_enable(&self, id: &str, on: bool) -> ControlResult<Certificate> {
        let writer = self.store.writer().await;
        let mut certificate = validator::require::<Certificate>(&writer, id)?;
        validator::switch_changes(certificate.is_enable, on)?;
        if on {
            validator::domain_not_covered_by_certificate(&writer, &certificate.sni, Some(id))?;
        } else {
            validator::certificate_domains_in_use(&writer, &certificate)?;
        }
        certificate.is_enable = on;
        let status = certificate.release_status.after_edit();
        certificate.set_release_status(status);
        writer.put(&certificate)?;
        info!(id, on, status = %status, "certificate switched");
        Ok(certificate)
    }

    pub fn certificate_info(&self, id: &str) -> ControlResult<CertificateInfo> {
        let certificate = validator::require::<Certificate>(self.store.as_ref(), id)?;
        Ok(CertificateInfo::from(&certificate))
    }

    /// Soonest expiry first; `search` matches id or SNI.
    pub fn certificate_list(&self, search: Option<&str>, page: Page) -> ControlResult<Paged<CertificateInfo>> {
        let mut certificates = self
            .store
            .list_where(|c: &Certificate| matches_search(search, &[c.id.as_str(), c.sni.as_str()]))?;
        certificates.sort_by(|a, b| (a.expired_at, &a.id).cmp(&(b.expired_at, &b.id)));
        let infos = certificates.iter().map(CertificateInfo::from).collect();
        Ok(Paged::from_vec(infos, page))
    }
}
