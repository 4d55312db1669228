use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{Field, FieldKind, Resource};
use crate::error::{AppError, Violations};

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    #[serde(skip_serializing)]
    pub tour_id: Uuid,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub paid: bool,
    #[serde(skip_serializing)]
    pub tour_name: String,
    #[serde(skip_serializing)]
    pub user_name: String,
    #[serde(skip_serializing)]
    pub user_email: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct BookingInput {
    pub tour: Option<Uuid>,
    pub user: Option<Uuid>,
    pub price: Option<f64>,
    pub paid: Option<bool>,
}

impl Booking {
    /// Record a paid booking after a completed checkout
    pub async fn create_from_checkout(
        pool: &PgPool,
        tour_id: Uuid,
        user_id: Uuid,
        price: f64,
    ) -> Result<Booking, AppError> {
        let input = BookingInput {
            tour: Some(tour_id),
            user: Some(user_id),
            price: Some(price),
            paid: Some(true),
        };
        Self::insert(pool, input).await
    }

    fn validate_price(price: f64, violations: &mut Violations) {
        violations.check(price > 0.0, "Booking must have a price.");
    }
}

#[async_trait]
impl Resource for Booking {
    type Create = BookingInput;
    type Patch = BookingInput;

    const TABLE: &'static str = "bookings";
    const SELECT: &'static str = "SELECT bookings.*, tours.name AS tour_name, \
         users.name AS user_name, users.email AS user_email \
         FROM bookings \
         JOIN tours ON tours.id = bookings.tour_id \
         JOIN users ON users.id = bookings.user_id";
    const FIELDS: &'static [Field] = &[
        Field::new("id", "bookings.id", FieldKind::Uuid),
        Field::new("price", "bookings.price", FieldKind::Float),
        Field::new("paid", "bookings.paid", FieldKind::Bool),
        Field::new("createdAt", "bookings.created_at", FieldKind::Timestamp),
        Field::new("tour", "bookings.tour_id", FieldKind::Uuid),
        Field::new("user", "bookings.user_id", FieldKind::Uuid),
    ];
    const SINGULAR: &'static str = "booking";
    const PLURAL: &'static str = "bookings";

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_document(&self) -> Result<serde_json::Value, AppError> {
        let mut document = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize booking: {}", e)))?;
        if let Some(object) = document.as_object_mut() {
            object.insert(
                "tour".to_string(),
                json!({ "id": self.tour_id, "name": self.tour_name }),
            );
            object.insert(
                "user".to_string(),
                json!({ "id": self.user_id, "name": self.user_name, "email": self.user_email }),
            );
        }
        Ok(document)
    }

    async fn insert(pool: &PgPool, input: BookingInput) -> Result<Self, AppError> {
        let mut violations = Violations::new();
        violations
            .check(input.tour.is_some(), "Booking must belong to a Tour!")
            .check(input.user.is_some(), "Booking must belong to a User!");
        Self::validate_price(input.price.unwrap_or_default(), &mut violations);
        violations.into_result()?;

        let (tour_id, user_id) = match (input.tour, input.user) {
            (Some(tour), Some(user)) => (tour, user),
            _ => return Err(AppError::BadRequest("Booking must belong to a Tour!".to_string())),
        };

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bookings (id, tour_id, user_id, price, created_at, paid)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tour_id)
        .bind(user_id)
        .bind(input.price.unwrap_or_default())
        .bind(Utc::now())
        .bind(input.paid.unwrap_or(true))
        .fetch_one(pool)
        .await?;

        let created = Self::find_by_id(pool, id)
            .await?
            .ok_or_else(AppError::document_not_found)?;
        tracing::info!(booking_id = %created.id, %tour_id, %user_id, "Booking created");
        Ok(created)
    }

    fn apply(&mut self, patch: BookingInput) -> Result<(), AppError> {
        if let Some(tour) = patch.tour {
            self.tour_id = tour;
        }
        if let Some(user) = patch.user {
            self.user_id = user;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(paid) = patch.paid {
            self.paid = paid;
        }

        let mut violations = Violations::new();
        Self::validate_price(self.price, &mut violations);
        violations.into_result()
    }

    async fn save(&self, pool: &PgPool) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE bookings SET tour_id = $2, user_id = $3, price = $4, paid = $5 WHERE id = $1",
        )
        .bind(self.id)
        .bind(self.tour_id)
        .bind(self.user_id)
        .bind(self.price)
        .bind(self.paid)
        .execute(pool)
        .await?;
        Ok(())
    }
}
