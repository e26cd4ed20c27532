use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::db::{CreateReviewParams, Database, ReviewRecord, UpdateReviewParams};
use crate::error::{ServiceError, ServiceResult};

const MIN_RATING: i32 = 1;
const MAX_RATING: i32 = 5;
const MIN_COMMENT_CHARS: usize = 10;
const MAX_COMMENT_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    /// Mean rating rounded to one decimal; 0 with no reviews.
    pub average_rating: f64,
    pub total_reviews: usize,
}

pub struct ReviewLedger {
    db: Arc<dyn Database>,
}

fn check_rating(rating: i32) -> ServiceResult<()> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ServiceError::validation("Rating must be between 1 and 5"));
    }
    Ok(())
}

fn check_comment(comment: &str) -> ServiceResult<()> {
    let chars = comment.chars().count();
    if !(MIN_COMMENT_CHARS..=MAX_COMMENT_CHARS).contains(&chars) {
        return Err(ServiceError::validation(
            "Comment must be between 10 and 1000 characters",
        ));
    }
    Ok(())
}

impl ReviewLedger {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self { db }
    }

    pub async fn create(&self, input: CreateReviewParams) -> ServiceResult<ReviewRecord> {
        check_rating(input.rating)?;
        check_comment(&input.comment)?;
        if self.db.get_attorney(input.attorney_id).await?.is_none() {
            return Err(ServiceError::not_found("Attorney"));
        }

        let review = self
            .db
            .create_review(&CreateReviewParams {
                client_name: input.client_name.trim().to_string(),
                client_email: input.client_email.trim().to_string(),
                ..input
            })
            .await?;
        tracing::info!(
            review_id = %review.id,
            attorney_id = %review.attorney_id,
            rating = review.rating,
            "review recorded"
        );
        Ok(review)
    }

    pub async fn list_for_attorney(&self, attorney_id: Uuid) -> ServiceResult<Vec<ReviewRecord>> {
        Ok(self.db.list_reviews_for_attorney(attorney_id).await?)
    }

    pub async fn list_by_client_email(&self, email: &str) -> ServiceResult<Vec<ReviewRecord>> {
        Ok(self.db.list_reviews_by_email(email.trim()).await?)
    }

    pub async fn update(&self, id: Uuid, patch: UpdateReviewParams) -> ServiceResult<ReviewRecord> {
        if let Some(rating) = patch.rating {
            check_rating(rating)?;
        }
        if let Some(comment) = patch.comment.as_deref() {
            check_comment(comment)?;
        }
        self.db
            .update_review(id, &patch)
            .await?
            .ok_or_else(|| ServiceError::not_found("Review"))
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        if !self.db.delete_review(id).await? {
            return Err(ServiceError::not_found("Review"));
        }
        tracing::info!(review_id = %id, "review deleted");
        Ok(())
    }

    pub async fn get_average_rating(&self, attorney_id: Uuid) -> ServiceResult<RatingSummary> {
        let reviews = self.db.list_reviews_for_attorney(attorney_id).await?;
        Ok(summarize(reviews.iter().map(|review| review.rating)))
    }
}

fn summarize(ratings: impl Iterator<Item = i32>) -> RatingSummary {
    let (sum, count) = ratings.fold((0i64, 0usize), |(sum, count), rating| {
        (sum + i64::from(rating), count + 1)
    });
    if count == 0 {
        return RatingSummary {
            average_rating: 0.0,
            total_reviews: 0,
        };
    }
    let mean = sum as f64 / count as f64;
    RatingSummary {
        average_rating: (mean * 10.0).round() / 10.0,
        total_reviews: count,
    }
}
