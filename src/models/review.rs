use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::tour::{round_rating, DEFAULT_RATINGS_AVERAGE};
use super::{Field, FieldKind, Resource};
use crate::error::{AppError, Violations};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: Uuid,
    pub review: String,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
    #[serde(rename = "tour")]
    pub tour_id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    #[serde(skip_serializing)]
    pub user_name: String,
    #[serde(skip_serializing)]
    pub user_photo: String,
}

/// Create and update body. On update only `review` and `rating` are honored.
#[derive(Debug, Default, Deserialize)]
pub struct ReviewInput {
    pub review: Option<String>,
    pub rating: Option<i32>,
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
}

#[derive(sqlx::FromRow)]
struct RatingSummary {
    quantity: i64,
    average: Option<f64>,
}

/// Recompute a tour's ratingsQuantity and ratingsAverage from its reviews
pub async fn recalculate_tour_ratings(pool: &PgPool, tour_id: Uuid) -> Result<(), AppError> {
    let summary = sqlx::query_as::<_, RatingSummary>(
        "SELECT COUNT(*) AS quantity, AVG(rating)::float8 AS average FROM reviews WHERE tour_id = $1",
    )
    .bind(tour_id)
    .fetch_one(pool)
    .await?;

    let (quantity, average) = match summary.average {
        Some(average) if summary.quantity > 0 => (summary.quantity, round_rating(average)),
        _ => (0, DEFAULT_RATINGS_AVERAGE),
    };

    sqlx::query("UPDATE tours SET ratings_quantity = $2, ratings_average = $3 WHERE id = $1")
        .bind(tour_id)
        .bind(quantity as i32)
        .bind(average)
        .execute(pool)
        .await?;

    tracing::debug!(%tour_id, quantity, average, "Tour ratings recalculated");
    Ok(())
}

impl Review {
    fn validate(&self) -> Result<(), AppError> {
        let mut violations = Violations::new();
        violations
            .check(!self.review.is_empty(), "Review can not be empty!")
            .check(self.rating >= 1, "Rating must be above or equal 1")
            .check(self.rating <= 5, "Rating must be below or equal 5");
        violations.into_result()
    }

    /// Reviews of one tour, newest first
    pub async fn find_for_tour(pool: &PgPool, tour_id: Uuid) -> Result<Vec<Review>, AppError> {
        let sql = format!(
            "{} WHERE reviews.tour_id = $1 ORDER BY reviews.created_at DESC, reviews.id",
            Self::SELECT
        );
        let reviews = sqlx::query_as::<_, Review>(&sql)
            .bind(tour_id)
            .fetch_all(pool)
            .await?;
        Ok(reviews)
    }
}

#[async_trait]
impl Resource for Review {
    type Create = ReviewInput;
    type Patch = ReviewInput;

    const TABLE: &'static str = "reviews";
    const SELECT: &'static str = "SELECT reviews.*, users.name AS user_name, users.photo AS user_photo \
         FROM reviews JOIN users ON users.id = reviews.user_id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "reviews.id", FieldKind::Uuid),
        Field::new("rating", "reviews.rating", FieldKind::Integer),
        Field::new("createdAt", "reviews.created_at", FieldKind::Timestamp),
        Field::new("tour", "reviews.tour_id", FieldKind::Uuid),
        Field::new("user", "reviews.user_id", FieldKind::Uuid),
    ];
    const SINGULAR: &'static str = "review";
    const PLURAL: &'static str = "reviews";

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_document(&self) -> Result<serde_json::Value, AppError> {
        let mut document = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize review: {}", e)))?;
        if let Some(object) = document.as_object_mut() {
            object.insert(
                "user".to_string(),
                json!({ "id": self.user_id, "name": self.user_name, "photo": self.user_photo }),
            );
        }
        Ok(document)
    }

    async fn insert(pool: &PgPool, input: ReviewInput) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        let text = input.review.unwrap_or_default().trim().to_string();
        let rating = input.rating.unwrap_or_default();
        violations
            .check(!text.is_empty(), "Review can not be empty!")
            .check(input.rating.is_some(), "A review must have a rating.")
            .check(
                input.rating.is_none() || (1..=5).contains(&rating),
                "Rating must be between 1 and 5",
            )
            .check(input.tour.is_some(), "Review must belong to a tour.")
            .check(input.user.is_some(), "Review must belong to a user");
        violations.into_result()?;

        let (tour_id, user_id) = match (input.tour, input.user) {
            (Some(tour), Some(user)) => (tour, user),
            _ => return Err(AppError::BadRequest("Review must belong to a tour.".to_string())),
        };

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO reviews (id, review, rating, created_at, tour_id, user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&text)
        .bind(rating)
        .bind(Utc::now())
        .bind(tour_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        let created = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(AppError::document_not_found)?;
        tracing::info!(review_id = %created.id, %tour_id, %user_id, "Review created");
        Ok(created)
    }

    fn apply(&mut self, patch: ReviewInput) -> Result<(), AppError> {
        if let Some(review) = patch.review {
            self.review = review.trim().to_string();
        }
        if let Some(rating) = patch.rating {
            self.rating = rating;
        }
        self.validate()
    }

    async fn save(&self, pool: &PgPool) -> Result<(), AppError> {
        sqlx::query("UPDATE reviews SET review = $2, rating = $3 WHERE id = $1")
            .bind(self.id)
            .bind(&self.review)
            .bind(self.rating)
            .execute(pool)
            .await?;
        Ok(())
    }

    async fn after_save(&self, pool: &PgPool) -> Result<(), AppError> {
        recalculate_tour_ratings(pool, self.tour_id).await
    }

    async fn after_delete(&self, pool: &PgPool) -> Result<(), AppError> {
        recalculate_tour_ratings(pool, self.tour_id).await
    }
}
