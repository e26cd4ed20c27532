//! Messages and file attachments inside a matter.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{
    CreateFileParams, CreateMessageParams, Database, FileRecord, MatterRecord, MessageRecord,
    Participant,
};
use crate::error::{ServiceError, ServiceResult};

/// Metadata for a file already placed in blob storage.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub uploaded_by: Participant,
    pub file_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

pub struct Relay {
    db: Arc<dyn Database>,
}

impl Relay {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    async fn require_matter(&self, matter_id: Uuid) -> ServiceResult<MatterRecord> {
        self.db
            .get_matter(matter_id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Matter"))
    }

    /// Append a message and bump the matter's activity timestamps.
    pub async fn post_message(
        &self,
        matter_id: Uuid,
        sender: Participant,
        sender_id: Uuid,
        content: &str,
    ) -> ServiceResult<MessageRecord> {
        self.require_matter(matter_id).await?;
        if content.trim().is_empty() {
            return Err(ServiceError::validation("Message content is required"));
        }

        let message = self
            .db
            .create_message(&CreateMessageParams {
                matter_id,
                sender,
                sender_id,
                content: content.to_string(),
            })
            .await?;
        self.db
            .touch_matter(matter_id, Some(message.created_at))
            .await?;
        tracing::debug!(%matter_id, message_id = %message.id, sender = sender.as_str(), "message posted");
        Ok(message)
    }

    /// Record an attachment. Touches `updated_at` but not `last_message_at`.
    pub async fn attach_file(
        &self,
        matter_id: Uuid,
        upload: FileUpload,
    ) -> ServiceResult<FileRecord> {
        self.require_matter(matter_id).await?;
        let file_name = upload.file_name.trim();
        if file_name.is_empty() {
            return Err(ServiceError::validation("File name is required"));
        }
        if upload.size_bytes < 0 {
            return Err(ServiceError::validation("File size cannot be negative"));
        }

        let file = self
            .db
            .create_file(&CreateFileParams {
                matter_id,
                uploaded_by: upload.uploaded_by,
                file_name: file_name.to_string(),
                content_type: upload.content_type,
                size_bytes: upload.size_bytes,
                storage_key: upload.storage_key,
            })
            .await?;
        self.db.touch_matter(matter_id, None).await?;
        tracing::debug!(%matter_id, file_id = %file.id, "file attached");
        Ok(file)
    }

    pub async fn list_messages(&self, matter_id: Uuid) -> ServiceResult<Vec<MessageRecord>> {
        self.require_matter(matter_id).await?;
        Ok(self.db.list_messages(matter_id).await?)
    }

    pub async fn list_files(&self, matter_id: Uuid) -> ServiceResult<Vec<FileRecord>> {
        self.require_matter(matter_id).await?;
        Ok(self.db.list_files(matter_id).await?)
    }
}
