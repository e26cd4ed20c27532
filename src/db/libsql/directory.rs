use chrono::Utc;
use libsql::params;
use uuid::Uuid;

use crate::db::{
    AttorneyRecord, AttorneySearch, AttorneyStore, CreateAttorneyParams, CreateReviewParams,
    FeePackage, Location, ReviewRecord, ReviewStore, UpdateAttorneyParams, UpdateReviewParams,
};
use crate::error::DatabaseError;

use super::{
    LibSqlBackend, fmt_ts, from_json, get_i32, get_i64, get_opt_text, get_text, opt_text,
    parse_decimal, parse_timestamp, parse_uuid, to_json,
};

const ATTORNEY_COLUMNS: &str = "id, full_name, email, bar_association_id, bio, education, years_of_experience, \
     practice_areas, hourly_rate, fixed_fee_packages, city, state, country, languages, is_verified, \
     profile_image, timezone, created_at, updated_at";

const REVIEW_COLUMNS: &str =
    "id, attorney_id, client_name, client_email, rating, comment, created_at, updated_at";

fn row_to_attorney_record(row: &libsql::Row) -> Result<AttorneyRecord, DatabaseError> {
    let fixed_fee_packages: Vec<FeePackage> = from_json(&get_text(row, 9))?;
    Ok(AttorneyRecord {
        id: parse_uuid(&get_text(row, 0), "attorneys.id")?,
        full_name: get_text(row, 1),
        email: get_text(row, 2),
        bar_association_id: get_text(row, 3),
        bio: get_text(row, 4),
        education: get_text(row, 5),
        years_of_experience: get_i32(row, 6, "years_of_experience")?,
        practice_areas: from_json(&get_text(row, 7))?,
        hourly_rate: parse_decimal(&get_text(row, 8), "attorneys.hourly_rate")?,
        fixed_fee_packages,
        location: Location {
            city: get_text(row, 10),
            state: get_text(row, 11),
            country: get_text(row, 12),
        },
        languages: from_json(&get_text(row, 13))?,
        is_verified: get_i64(row, 14) != 0,
        profile_image: get_opt_text(row, 15),
        timezone: get_opt_text(row, 16),
        created_at: parse_timestamp(&get_text(row, 17))?,
        updated_at: parse_timestamp(&get_text(row, 18))?,
    })
}

fn row_to_review_record(row: &libsql::Row) -> Result<ReviewRecord, DatabaseError> {
    Ok(ReviewRecord {
        id: parse_uuid(&get_text(row, 0), "reviews.id")?,
        attorney_id: parse_uuid(&get_text(row, 1), "reviews.attorney_id")?,
        client_name: get_text(row, 2),
        client_email: get_text(row, 3),
        rating: get_i32(row, 4, "rating")?,
        comment: get_text(row, 5),
        created_at: parse_timestamp(&get_text(row, 6))?,
        updated_at: parse_timestamp(&get_text(row, 7))?,
    })
}

impl LibSqlBackend {
    async fn attorney_where(
        &self,
        clause: &str,
        value: String,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {ATTORNEY_COLUMNS} FROM attorneys WHERE {clause} = ?1 LIMIT 1"),
                params![value],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_attorney_record(&row)).transpose()
    }
}

#[async_trait::async_trait]
impl AttorneyStore for LibSqlBackend {
    async fn create_attorney(
        &self,
        input: &CreateAttorneyParams,
    ) -> Result<AttorneyRecord, DatabaseError> {
        let id = Uuid::new_v4();
        let now = fmt_ts(&Utc::now());
        let conn = self.connect().await?;
        conn.execute(
            &format!(
                "INSERT INTO attorneys ({ATTORNEY_COLUMNS}) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, 0, ?15, ?16, ?17, ?17)"
            ),
            params![
                id.to_string(),
                input.full_name.as_str(),
                input.email.as_str(),
                input.bar_association_id.as_str(),
                input.bio.as_str(),
                input.education.as_str(),
                i64::from(input.years_of_experience),
                to_json(&input.practice_areas)?,
                input.hourly_rate.to_string(),
                to_json(&input.fixed_fee_packages)?,
                input.location.city.as_str(),
                input.location.state.as_str(),
                input.location.country.as_str(),
                to_json(&input.languages)?,
                opt_text(input.profile_image.as_deref()),
                opt_text(input.timezone.as_deref()),
                now,
            ],
        )
        .await?;

        self.get_attorney(id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created attorney".to_string()))
    }

    async fn get_attorney(&self, id: Uuid) -> Result<Option<AttorneyRecord>, DatabaseError> {
        self.attorney_where("id", id.to_string()).await
    }

    async fn get_attorney_by_email(
        &self,
        email: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        self.attorney_where("email", email.to_string()).await
    }

    async fn get_attorney_by_bar_id(
        &self,
        bar_association_id: &str,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        self.attorney_where("bar_association_id", bar_association_id.to_string())
            .await
    }

    async fn search_attorneys(
        &self,
        filters: &AttorneySearch,
    ) -> Result<Vec<AttorneyRecord>, DatabaseError> {
        // Verification and location narrow through indexes; list-valued and
        // free-text filters are applied to the decoded rows.
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {ATTORNEY_COLUMNS} FROM attorneys \
                     WHERE (?1 = 0 OR is_verified = 1) \
                       AND (?2 = '' OR lower(city) = lower(?2)) \
                       AND (?3 = '' OR lower(state) = lower(?3)) \
                     ORDER BY full_name ASC"
                ),
                params![
                    i64::from(filters.verified_only),
                    filters.city.as_deref().unwrap_or("").trim(),
                    filters.state.as_deref().unwrap_or("").trim(),
                ],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            let attorney = row_to_attorney_record(&row)?;
            if filters.matches(&attorney) {
                out.push(attorney);
            }
        }
        Ok(out)
    }

    async fn update_attorney(
        &self,
        id: Uuid,
        input: &UpdateAttorneyParams,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let Some(existing) = self.get_attorney(id).await? else {
            return Ok(None);
        };

        let merged_location = input.location.clone().unwrap_or(existing.location);
        let merged_profile_image = input
            .profile_image
            .clone()
            .unwrap_or(existing.profile_image);
        let merged_timezone = input.timezone.clone().unwrap_or(existing.timezone);

        let conn = self.connect().await?;
        conn.execute(
            "UPDATE attorneys SET \
               full_name = ?2, \
               email = ?3, \
               bar_association_id = ?4, \
               bio = ?5, \
               education = ?6, \
               years_of_experience = ?7, \
               practice_areas = ?8, \
               hourly_rate = ?9, \
               fixed_fee_packages = ?10, \
               city = ?11, \
               state = ?12, \
               country = ?13, \
               languages = ?14, \
               profile_image = ?15, \
               timezone = ?16, \
               updated_at = ?17 \
             WHERE id = ?1",
            params![
                id.to_string(),
                input.full_name.clone().unwrap_or(existing.full_name),
                input.email.clone().unwrap_or(existing.email),
                input
                    .bar_association_id
                    .clone()
                    .unwrap_or(existing.bar_association_id),
                input.bio.clone().unwrap_or(existing.bio),
                input.education.clone().unwrap_or(existing.education),
                i64::from(
                    input
                        .years_of_experience
                        .unwrap_or(existing.years_of_experience)
                ),
                to_json(
                    input
                        .practice_areas
                        .as_ref()
                        .unwrap_or(&existing.practice_areas)
                )?,
                input
                    .hourly_rate
                    .unwrap_or(existing.hourly_rate)
                    .to_string(),
                to_json(
                    input
                        .fixed_fee_packages
                        .as_ref()
                        .unwrap_or(&existing.fixed_fee_packages)
                )?,
                merged_location.city,
                merged_location.state,
                merged_location.country,
                to_json(input.languages.as_ref().unwrap_or(&existing.languages))?,
                opt_text(merged_profile_image.as_deref()),
                opt_text(merged_timezone.as_deref()),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        self.get_attorney(id).await
    }

    async fn set_attorney_verified(
        &self,
        id: Uuid,
        verified: bool,
    ) -> Result<Option<AttorneyRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let updated = conn
            .execute(
                "UPDATE attorneys SET is_verified = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), i64::from(verified), fmt_ts(&Utc::now())],
            )
            .await?;
        if updated == 0 {
            return Ok(None);
        }
        self.get_attorney(id).await
    }
}

#[async_trait::async_trait]
impl ReviewStore for LibSqlBackend {
    async fn create_review(
        &self,
        input: &CreateReviewParams,
    ) -> Result<ReviewRecord, DatabaseError> {
        let id = Uuid::new_v4();
        let conn = self.connect().await?;
        conn.execute(
            &format!("INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)"),
            params![
                id.to_string(),
                input.attorney_id.to_string(),
                input.client_name.as_str(),
                input.client_email.as_str(),
                i64::from(input.rating),
                input.comment.as_str(),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        self.get_review(id)
            .await?
            .ok_or_else(|| DatabaseError::Query("failed to load created review".to_string()))
    }

    async fn get_review(&self, id: Uuid) -> Result<Option<ReviewRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let row = conn
            .query(
                &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1 LIMIT 1"),
                params![id.to_string()],
            )
            .await?
            .next()
            .await?;
        row.map(|row| row_to_review_record(&row)).transpose()
    }

    async fn list_reviews_for_attorney(
        &self,
        attorney_id: Uuid,
    ) -> Result<Vec<ReviewRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {REVIEW_COLUMNS} FROM reviews WHERE attorney_id = ?1 ORDER BY created_at DESC"
                ),
                params![attorney_id.to_string()],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_review_record(&row)?);
        }
        Ok(out)
    }

    async fn list_reviews_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<ReviewRecord>, DatabaseError> {
        let conn = self.connect().await?;
        let mut rows = conn
            .query(
                &format!(
                    "SELECT {REVIEW_COLUMNS} FROM reviews WHERE client_email = ?1 ORDER BY created_at DESC"
                ),
                params![email],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_review_record(&row)?);
        }
        Ok(out)
    }

    async fn update_review(
        &self,
        id: Uuid,
        input: &UpdateReviewParams,
    ) -> Result<Option<ReviewRecord>, DatabaseError> {
        let Some(existing) = self.get_review(id).await? else {
            return Ok(None);
        };

        let conn = self.connect().await?;
        conn.execute(
            "UPDATE reviews SET rating = ?2, comment = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                id.to_string(),
                i64::from(input.rating.unwrap_or(existing.rating)),
                input.comment.clone().unwrap_or(existing.comment),
                fmt_ts(&Utc::now()),
            ],
        )
        .await?;

        self.get_review(id).await
    }

    async fn delete_review(&self, id: Uuid) -> Result<bool, DatabaseError> {
        let conn = self.connect().await?;
        let deleted = conn
            .execute("DELETE FROM reviews WHERE id = ?1", params![id.to_string()])
            .await?;
        Ok(deleted > 0)
    }
}
