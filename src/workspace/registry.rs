//! Read access to clients and matters, plus matter titles.
//!
//! Clients and matters are only ever created by booking (`booking::reconcile`).

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{ClientRecord, Database, MatterRecord};
use crate::error::{ServiceError, ServiceResult};

pub struct Registry {
    db: Arc<dyn Database>,
}

impl Registry {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn get_client(&self, id: Uuid) -> ServiceResult<ClientRecord> {
        self.db
            .get_client(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Client"))
    }

    pub async fn get_client_by_email(&self, email: &str) -> ServiceResult<Option<ClientRecord>> {
        Ok(self.db.get_client_by_email(email).await?)
    }

    pub async fn get_matter(&self, id: Uuid) -> ServiceResult<MatterRecord> {
        self.db
            .get_matter(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Matter"))
    }

    /// Most recently active first.
    pub async fn list_matters_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> ServiceResult<Vec<MatterRecord>> {
        Ok(self.db.list_matters_for_attorney(attorney_id).await?)
    }

    pub async fn list_matters_for_client(&self, client_id: Uuid) -> ServiceResult<Vec<MatterRecord>> {
        Ok(self.db.list_matters_for_client(client_id).await?)
    }

    /// Set or clear (blank / `None`) the matter title.
    pub async fn rename_matter(&self, id: Uuid, title: Option<&str>) -> ServiceResult<MatterRecord> {
        let title = title.map(str::trim).filter(|t| !t.is_empty());
        self.db
            .set_matter_title(id, title)
            .await?
            .ok_or_else(|| ServiceError::not_found("Matter"))
    }
}
