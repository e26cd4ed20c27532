//! Client and matter resolution for bookings.
//!
//! Both steps are idempotent upserts, so a booking that failed after either
//! step can be retried and will reuse the rows it already created.

use uuid::Uuid;

use crate::db::{ClientRecord, CreateClientParams, Database, MatterRecord};
use crate::error::DatabaseError;

/// Find the client with this exact email, or create one. An existing client
/// keeps its stored name and phone.
pub async fn ensure_client(
    db: &dyn Database,
    full_name: &str,
    email: &str,
    phone: Option<&str>,
) -> Result<ClientRecord, DatabaseError> {
    if let Some(existing) = db.get_client_by_email(email).await? {
        return Ok(existing);
    }
    let client = db
        .upsert_client_by_email(&CreateClientParams {
            full_name: full_name.to_string(),
            email: email.to_string(),
            phone: phone.map(str::to_string),
        })
        .await?;
    tracing::debug!(client_id = %client.id, "client resolved");
    Ok(client)
}

/// The single matter for this attorney/client pair.
pub async fn ensure_matter(
    db: &dyn Database,
    attorney_id: Uuid,
    client_id: Uuid,
) -> Result<MatterRecord, DatabaseError> {
    if let Some(existing) = db.find_matter(attorney_id, client_id).await? {
        return Ok(existing);
    }
    let matter = db.ensure_matter(attorney_id, client_id).await?;
    tracing::debug!(matter_id = %matter.id, %attorney_id, %client_id, "matter resolved");
    Ok(matter)
}
