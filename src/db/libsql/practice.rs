use chrono::{DateTime, Utc};
use libsql::params;
use uuid::Uuid;

use crate::db::{
    ClientRecord, ClientStore, ConsultationRecord, ConsultationStatus, ConsultationStore,
    ConsultationType, CreateClientParams, CreateFileParams, CreateMessageParams, FileRecord,
    MatterRecord, MatterStore, MessageRecord, NewConsultationParams, Participant, RelayStore,
};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_ts, get_i32, get_i64, get_opt_text, get_text, opt_text, opt_text_owned,
    parse_decimal, parse_dt_opt, parse_timestamp, parse_uuid,
};

const CLIENT_COLUMNS: &str = "id, full_name, email, phone, created_at, updated_at";

const MATTER_COLUMNS: &str =
    "id, attorney_id, client_id, title, last_message_at, created_at, updated_at";

const CONSULTATION_COLUMNS: &str = "id, attorney_id, client_id, matter_id, scheduled_at, duration_minutes, \
     price, status, consultation_type, package_id, notes, slot_key, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, matter_id, sender, sender_id, content, created_at, updated_at";

const FILE_COLUMNS: &str = "id, matter_id, uploaded_by, file_name, content_type, size_bytes, \
     storage_key, created_at, updated_at";

fn parse_status(raw: &str) -> Result<ConsultationStatus, DatabaseError> {
    ConsultationStatus::from_db_value(raw).ok_or_else(|| {
        DatabaseError::Serialization(format!("invalid consultation status '{}'", raw))
    })
}

fn parse_consultation_type(raw: &str) -> Result<ConsultationType, DatabaseError> {
    ConsultationType::from_db_value(raw).ok_or_else(|| {
        DatabaseError::Serialization(format!("invalid consultation type '{}'", raw))
    })
}

fn parse_participant(raw: &str) -> Result<Participant, DatabaseError> {
    Participant::from_db_value(raw)
        .ok_or_else(|| DatabaseError::Serialization(format!("invalid participant '{}'", raw)))
}

fn row_to_client_record(row: &libsql::Row) -> Result<ClientRecord, DatabaseError> {
    Ok(ClientRecord {
        id: parse_uuid(&get_text(row, 0), "clients.id")?,
        full_name: get_text(row, 1),
        email: get_text(row, 2),
        phone: get_opt_text(row, 3),
        created_at: parse_timestamp(&get_text(row, 4))?,
        updated_at: parse_timestamp(&get_text(row, 5))?,
    })
}

fn row_to_matter_record(row: &libsql::Row) -> Result<MatterRecord, DatabaseError> {
    Ok(MatterRecord {
        id: parse_uuid(&get_text(row, 0), "matters.id")?,
        attorney_id: parse_uuid(&get_text(row, 1), "matters.attorney_id")?,
        client_id: parse_uuid(&get_text(row, 2), "matters.client_id")?,
        title: get_opt_text(row, 3),
        last_message_at: parse_dt_opt(get_opt_text(row, 4))?,
        created_at: parse_timestamp(&get_text(row, 5))?,
        updated_at: parse_timestamp(&get_text(row, 6))?,
    })
}

fn row_to_consultation_record(row: &libsql::Row) -> Result<ConsultationRecord, DatabaseError> {
    Ok(ConsultationRecord {
        id: parse_uuid(&get_text(row, 0), "consultations.id")?,
        attorney_id: parse_uuid(&get_text(row, 1), "consultations.attorney_id")?,
        client_id: parse_uuid(&get_text(row, 2), "consultations.client_id")?,
        matter_id: parse_uuid(&get_text(row, 3), "consultations.matter_id")?,
        scheduled_at: parse_timestamp(&get_text(row, 4))?,
        duration_minutes: get_i32(row, 5, "duration_minutes")?,
        price: parse_decimal(&get_text(row, 6), "consultations.price")?,
        status: parse_status(&get_text(row, 7))?,
        consultation_type: parse_consultation_type(&get_text(row, 8))?,
        package_id: get_opt_text(row, 9),
        notes: get_opt_text(row, 10),
        slot_key: get_text(row, 11),
        created_at: parse_timestamp(&get_text(row, 12))?,
        updated_at: parse_timestamp(&get_text(row, 13))?,
    })
}

fn row_to_message_record(row: &libsql::Row) -> Result<MessageRecord, DatabaseError> {
    Ok(MessageRecord {
        id: parse_uuid(&get_text(row, 0), "messages.id")?,
        matter_id: parse_uuid(&get_text(row, 1), "messages.matter_id")?,
        sender: parse_participant(&get_text(row, 2))?,
        sender_id: parse_uuid(&get_text(row, 3), "messages.sender_id")?,
        content: get_text(row, 4),
        created_at: parse_timestamp(&get_text(row, 5))?,
        updated_at: parse_timestamp(&get_text(row, 6))?,
    })
}

fn row_to_file_record(row: &libsql::Row) -> Result<FileRecord, DatabaseError> {
    Ok(FileRecord {
        id: parse_uuid(&get_text(row, 0), "files.id")?,
        matter_id: parse_uuid(&get_text(row, 1), "files.matter_id")?,
        uploaded_by: parse_participant(&get_text(row, 2))?,
        file_name: get_text(row, 3),
        content_type: get_text(row, 4),
        size_bytes: get_i64(row, 5),
        storage_key: get_text(row, 6),
        created_at: parse_timestamp(&get_text(row, 7))?,
        updated_at: parse_timestamp(&get_text(row, 8))?,
    })
}

impl LibSqlBackend {
    async fn query_consultations(
        &self,
        clause: &str,
        value: String,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE {clause} = ?1 \
                     ORDER BY scheduled_at ASC"
                ),
                params![value],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_consultation_record(&row)?);
        }
        Ok(out)
    }

    async fn query_matters(
        &self,
        clause: &str,
        value: String,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {MATTER_COLUMNS} FROM matters WHERE {clause} = ?1 ORDER BY updated_at DESC"
                ),
                params![value],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_matter_record(&row)?);
        }
        Ok(out)
    }
}

#[async_trait::async_trait]
impl ClientStore for LibSqlBackend {
    async fn upsert_client_by_email(
        &self,
        input: &CreateClientParams,
    ) -> Result<ClientRecord, DatabaseError> {
        let now = fmt_ts(&Utc::now());
        let conn = self.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO clients ({CLIENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?5) \
                 ON CONFLICT (email) DO NOTHING"
            ),
            params![
                Uuid::new_v4().to_string(),
                input.full_name.as_str(),
                input.email.as_str(),
                opt_text(input.phone.as_deref()),
                now,
            ],
        )
        .await?;

        self.get_client_by_email(&input.email)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to resolve upserted client".to_string()))
    }

    async fn get_client(&self, id: Uuid) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_client_record(&row)).transpose()
    }

    async fn get_client_by_email(
        &self,
        email: &str,
    ) -> Result<Option<ClientRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {CLIENT_COLUMNS} FROM clients WHERE email = ?1 LIMIT 1"),
                params![email],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_client_record(&row)).transpose()
    }
}

#[async_trait::async_trait]
impl MatterStore for LibSqlBackend {
    async fn find_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<Option<MatterRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!(
                    "SELECT {MATTER_COLUMNS} FROM matters WHERE attorney_id = ?1 AND client_id = ?2 LIMIT 1"
                ),
                params![attorney_id.to_string(), client_id.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_matter_record(&row)).transpose()
    }

    async fn ensure_matter(
        &self,
        attorney_id: Uuid,
        client_id: Uuid,
    ) -> Result<MatterRecord, DatabaseError> {
        let conn = self.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO matters ({MATTER_COLUMNS}) VALUES (?1, ?2, ?3, NULL, NULL, ?4, ?4) \
                 ON CONFLICT (attorney_id, client_id) DO NOTHING"
            ),
            params![
                Uuid::new_v4().to_string(),
                attorney_id.to_string(),
                client_id.to_string(),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        self.find_matter(attorney_id, client_id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to resolve ensured matter".to_string()))
    }

    async fn get_matter(&self, id: Uuid) -> Result<Option<MatterRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {MATTER_COLUMNS} FROM matters WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_matter_record(&row)).transpose()
    }

    async fn list_matters_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        self.query_matters("attorney_id", attorney_id.to_string())
            .await
    }

    async fn list_matters_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<MatterRecord>, DatabaseError> {
        self.query_matters("client_id", client_id.to_string()).await
    }

    async fn set_matter_title(
        &self,
        id: Uuid,
        title: Option<&str>,
    ) -> Result<Option<MatterRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE matters SET title = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), opt_text(title), fmt_ts(&Utc::now())],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_matter(id).await
    }

    async fn touch_matter(
        &self,
        id: Uuid,
        last_message_at: Option<DateTime<Utc>>,
    ) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE matters SET updated_at = ?2, last_message_at = COALESCE(?3, last_message_at) \
                 WHERE id = ?1",
                params![
                    id.to_string(),
                    fmt_ts(&Utc::now()),
                    opt_text_owned(last_message_at.as_ref().map(fmt_ts)),
                ],
            )
            .await?;
        Ok(updated > 0)
    }
}

#[async_trait::async_trait]
impl ConsultationStore for LibSqlBackend {
    async fn insert_consultation(
        &self,
        input: &NewConsultationParams,
    ) -> Result<ConsultationRecord, DatabaseError> {
        // idx_consultations_active_slot turns a concurrent double booking
        // into a Constraint error here instead of a second row.
        let id = Uuid::new_v4();
        let conn = self.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO consultations ({CONSULTATION_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10, ?11, ?12, ?12)"
            ),
            params![
                id.to_string(),
                input.attorney_id.to_string(),
                input.client_id.to_string(),
                input.matter_id.to_string(),
                fmt_ts(&input.scheduled_at),
                i64::from(input.duration_minutes),
                input.price.to_string(),
                input.consultation_type.as_str(),
                opt_text(input.package_id.as_deref()),
                opt_text(input.notes.as_deref()),
                input.slot_key.as_str(),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        self.get_consultation(id).await?.ok_or_else(|| {
            DatabaseError::Query("failed to load created consultation".to_string())
        })
    }

    async fn get_consultation(
        &self,
        id: Uuid,
    ) -> Result<Option<ConsultationRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {CONSULTATION_COLUMNS} FROM consultations WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_consultation_record(&row)).transpose()
    }

    async fn list_attorney_consultations_between(
        &self,
        attorney_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {CONSULTATION_COLUMNS} FROM consultations \
                     WHERE attorney_id = ?1 AND scheduled_at >= ?2 AND scheduled_at <= ?3 \
                     ORDER BY scheduled_at ASC"
                ),
                params![attorney_id.to_string(), fmt_ts(&start), fmt_ts(&end)],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_consultation_record(&row)?);
        }
        Ok(out)
    }

    async fn list_consultations_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        self.query_consultations("attorney_id", attorney_id.to_string())
            .await
    }

    async fn list_consultations_for_client(
        &self,
        client_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        self.query_consultations("client_id", client_id.to_string())
            .await
    }

    async fn list_consultations_for_matter(
        &self,
        matter_id: Uuid,
    ) -> Result<Vec<ConsultationRecord>, DatabaseError> {
        self.query_consultations("matter_id", matter_id.to_string())
            .await
    }

    async fn set_consultation_status(
        &self,
        id: Uuid,
        status: ConsultationStatus,
    ) -> Result<Option<ConsultationRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE consultations SET status = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), status.as_str(), fmt_ts(&Utc::now())],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_consultation(id).await
    }
}

#[async_trait::async_trait]
impl RelayStore for LibSqlBackend {
    async fn create_message(
        &self,
        input: &CreateMessageParams,
    ) -> Result<MessageRecord, DatabaseError> {
        let id = Uuid::new_v4();
        let conn = self.connect().await?;
        conn.execute(
            &format!("INSERT INTO messages ({MESSAGE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"),
            params![
                id.to_string(),
                input.matter_id.to_string(),
                input.sender.as_str(),
                input.sender_id.to_string(),
                input.content.as_str(),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        let row = conn
            .query(
                &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created message".to_string()))?;
        row_to_message_record(&row)
    }

    async fn list_messages(&self, matter_id: Uuid) -> Result<Vec<MessageRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {MESSAGE_COLUMNS} FROM messages WHERE matter_id = ?1 ORDER BY created_at ASC"
                ),
                params![matter_id.to_string()],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_message_record(&row)?);
        }
        Ok(out)
    }

    async fn create_file(&self, input: &CreateFileParams) -> Result<FileRecord, DatabaseError> {
        let id = Uuid::new_v4();
        let conn = self.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO files ({FILE_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)"
            ),
            params![
                id.to_string(),
                input.matter_id.to_string(),
                input.uploaded_by.as_str(),
                input.file_name.as_str(),
                input.content_type.as_str(),
                input.size_bytes,
                input.storage_key.as_str(),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        let row = conn
            .query(
                &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created file".to_string()))?;
        row_to_file_record(&row)
    }

    async fn list_files(&self, matter_id: Uuid) -> Result<Vec<FileRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {FILE_COLUMNS} FROM files WHERE matter_id = ?1 ORDER BY created_at DESC"
                ),
                params![matter_id.to_string()],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_file_record(&row)?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use crate::db::{
        CONSULTATION_SLOT_INDEX, ClientStore, ConsultationStatus, ConsultationStore,
        ConsultationType, CreateClientParams, MatterStore, NewConsultationParams,
    };
    use crate::error::DatabaseError;
    use crate::testing::setup_libsql;

    fn booking(attorney_id: Uuid, hour: u32, slot_key: &str) -> NewConsultationParams {
        NewConsultationParams {
            attorney_id,
            client_id: Uuid::new_v4(),
            matter_id: Uuid::new_v4(),
            scheduled_at: Utc
                .with_ymd_and_hms(2031, 1, 15, hour, 0, 0)
                .single()
                .expect("valid timestamp"),
            duration_minutes: 60,
            price: Decimal::new(15000, 2),
            consultation_type: ConsultationType::Hourly,
            package_id: None,
            notes: Some("intake".to_string()),
            slot_key: slot_key.to_string(),
        }
    }

    #[tokio::test]
    async fn schema_contains_marketplace_tables() {
        let fixture = setup_libsql().await;
        let conn = fixture.backend.connect().await.expect("connect");

        for table in [
            "attorneys",
            "clients",
            "matters",
            "consultations",
            "reviews",
            "messages",
            "files",
        ] {
            let row = conn
                .query(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    libsql::params![table],
                )
                .await
                .expect("query sqlite_master")
                .next()
                .await
                .expect("row read");
            assert!(row.is_some(), "missing table {table}");
        }
    }

    #[tokio::test]
    async fn upsert_client_by_email_keeps_first_record() {
        let fixture = setup_libsql().await;
        let first = fixture
            .backend
            .upsert_client_by_email(&CreateClientParams {
                full_name: "Ada Client".to_string(),
                email: "ada@example.test".to_string(),
                phone: None,
            })
            .await
            .expect("first upsert");
        let second = fixture
            .backend
            .upsert_client_by_email(&CreateClientParams {
                full_name: "Ada Renamed".to_string(),
                email: "ada@example.test".to_string(),
                phone: Some("555-0100".to_string()),
            })
            .await
            .expect("second upsert");
        assert_eq!(first.id, second.id);
        assert_eq!(second.full_name, "Ada Client");

        let other_case = fixture
            .backend
            .upsert_client_by_email(&CreateClientParams {
                full_name: "Ada Client".to_string(),
                email: "ADA@example.test".to_string(),
                phone: None,
            })
            .await
            .expect("case variant");
        assert_ne!(first.id, other_case.id);
    }

    #[tokio::test]
    async fn ensure_matter_returns_existing_pair() {
        let fixture = setup_libsql().await;
        let (attorney, client) = (Uuid::new_v4(), Uuid::new_v4());
        let a = fixture
            .backend
            .ensure_matter(attorney, client)
            .await
            .expect("first");
        let b = fixture
            .backend
            .ensure_matter(attorney, client)
            .await
            .expect("second");
        assert_eq!(a.id, b.id);
        assert!(a.title.is_none());
        assert!(a.last_message_at.is_none());
    }

    #[tokio::test]
    async fn partial_slot_index_rejects_active_duplicates_only() {
        let fixture = setup_libsql().await;
        let attorney = Uuid::new_v4();
        let first = fixture
            .backend
            .insert_consultation(&booking(attorney, 10, "2031-01-15T10"))
            .await
            .expect("first booking");
        assert_eq!(first.status, ConsultationStatus::Pending);
        assert_eq!(first.price, Decimal::new(15000, 2));

        let err = fixture
            .backend
            .insert_consultation(&booking(attorney, 10, "2031-01-15T10"))
            .await
            .expect_err("duplicate slot");
        assert!(
            matches!(err, DatabaseError::Constraint(ref index) if index == CONSULTATION_SLOT_INDEX),
            "unexpected error: {err:?}"
        );

        fixture
            .backend
            .set_consultation_status(first.id, ConsultationStatus::Cancelled)
            .await
            .expect("cancel")
            .expect("exists");
        fixture
            .backend
            .insert_consultation(&booking(attorney, 10, "2031-01-15T10"))
            .await
            .expect("cancelled slot is free again");
    }

    #[tokio::test]
    async fn range_query_is_inclusive_and_ordered() {
        let fixture = setup_libsql().await;
        let attorney = Uuid::new_v4();
        for (hour, key) in [(15, "2031-01-15T15"), (9, "2031-01-15T09")] {
            fixture
                .backend
                .insert_consultation(&booking(attorney, hour, key))
                .await
                .expect("insert");
        }
        let day_start = Utc
            .with_ymd_and_hms(2031, 1, 15, 9, 0, 0)
            .single()
            .expect("valid");
        let rows = fixture
            .backend
            .list_attorney_consultations_between(
                attorney,
                day_start,
                day_start + Duration::hours(6),
            )
            .await
            .expect("range");
        assert_eq!(rows.len(), 2);
        assert!(rows[0].scheduled_at < rows[1].scheduled_at);
    }
}
