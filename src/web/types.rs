//! Request and response DTOs for the HTTP API.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::booking::Slot;
use crate::db::{
    ConsultationStatus, CreateAttorneyParams, FeePackage, Location, Participant,
    UpdateAttorneyParams, UpdateReviewParams,
};

/// `null` becomes `Some(None)`; an absent field stays `None` via `#[serde(default)]`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// --- Envelope ---

/// Result of a mutation.
#[derive(Debug, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    pub message: String,
}

impl ActionResponse {
    pub fn ok(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            success: true,
            id: Some(id),
            message: message.into(),
        }
    }
}

// --- Attorneys ---

#[derive(Debug, Deserialize)]
pub struct RegisterAttorneyRequest {
    pub full_name: String,
    pub email: String,
    pub bar_association_id: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub years_of_experience: i32,
    #[serde(default)]
    pub practice_areas: Vec<String>,
    #[serde(default)]
    pub hourly_rate: Decimal,
    #[serde(default)]
    pub fixed_fee_packages: Vec<FeePackage>,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl From<RegisterAttorneyRequest> for CreateAttorneyParams {
    fn from(req: RegisterAttorneyRequest) -> Self {
        Self {
            full_name: req.full_name,
            email: req.email,
            bar_association_id: req.bar_association_id,
            bio: req.bio,
            education: req.education,
            years_of_experience: req.years_of_experience,
            practice_areas: req.practice_areas,
            hourly_rate: req.hourly_rate,
            fixed_fee_packages: req.fixed_fee_packages,
            location: req.location,
            languages: req.languages,
            profile_image: req.profile_image,
            timezone: req.timezone,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAttorneyRequest {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub bar_association_id: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub years_of_experience: Option<i32>,
    #[serde(default)]
    pub practice_areas: Option<Vec<String>>,
    #[serde(default)]
    pub hourly_rate: Option<Decimal>,
    #[serde(default)]
    pub fixed_fee_packages: Option<Vec<FeePackage>>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub languages: Option<Vec<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub profile_image: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub timezone: Option<Option<String>>,
}

impl From<UpdateAttorneyRequest> for UpdateAttorneyParams {
    fn from(req: UpdateAttorneyRequest) -> Self {
        Self {
            full_name: req.full_name,
            email: req.email,
            bar_association_id: req.bar_association_id,
            bio: req.bio,
            education: req.education,
            years_of_experience: req.years_of_experience,
            practice_areas: req.practice_areas,
            hourly_rate: req.hourly_rate,
            fixed_fee_packages: req.fixed_fee_packages,
            location: req.location,
            languages: req.languages,
            profile_image: req.profile_image,
            timezone: req.timezone,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct VerifyAttorneyRequest {
    #[serde(default = "default_true")]
    pub verified: bool,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

// --- Scheduling ---

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct SlotsResponse {
    pub attorney_id: Uuid,
    pub date: NaiveDate,
    pub slots: Vec<Slot>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpcomingQuery {
    pub days: Option<i64>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdateRequest {
    pub status: ConsultationStatus,
}

// --- Reviews ---

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub client_name: String,
    pub client_email: String,
    pub rating: i32,
    pub comment: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateReviewRequest {
    #[serde(default)]
    pub rating: Option<i32>,
    #[serde(default)]
    pub comment: Option<String>,
}

impl From<UpdateReviewRequest> for UpdateReviewParams {
    fn from(req: UpdateReviewRequest) -> Self {
        Self {
            rating: req.rating,
            comment: req.comment,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReviewsByEmailQuery {
    pub client_email: String,
}

// --- Matters ---

#[derive(Debug, Deserialize)]
pub struct RenameMatterRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub sender: Participant,
    pub sender_id: Uuid,
    pub content: String,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Deserialize)]
pub struct AttachFileRequest {
    pub uploaded_by: Participant,
    pub file_name: String,
    #[serde(default = "default_content_type")]
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
}

// --- Health ---

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_attorney_distinguishes_null_from_absent() {
        let cleared: UpdateAttorneyRequest =
            serde_json::from_str(r#"{"timezone":null}"#).expect("parse");
        assert_eq!(cleared.timezone, Some(None));
        assert_eq!(cleared.profile_image, None);

        let set: UpdateAttorneyRequest =
            serde_json::from_str(r#"{"timezone":"-07:00","hourly_rate":"275.50"}"#)
                .expect("parse");
        assert_eq!(set.timezone, Some(Some("-07:00".to_string())));
        assert_eq!(set.hourly_rate, Some(Decimal::new(27550, 2)));
    }

    #[test]
    fn register_request_fills_defaults() {
        let req: RegisterAttorneyRequest = serde_json::from_str(
            r#"{"full_name":"A","email":"a@b.test","bar_association_id":"B-1","hourly_rate":200}"#,
        )
        .expect("parse");
        let params = CreateAttorneyParams::from(req);
        assert!(params.practice_areas.is_empty());
        assert_eq!(params.hourly_rate, Decimal::from(200));
        assert_eq!(params.location, Location::default());
    }

    #[test]
    fn action_response_omits_missing_id() {
        let body = serde_json::to_value(ActionResponse {
            success: false,
            id: None,
            message: "nope".to_string(),
        })
        .expect("serialize");
        assert!(body.get("id").is_none());
    }
}
