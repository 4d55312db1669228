use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::{Field, FieldKind, Resource};
use crate::error::{AppError, Violations};
use crate::validators::slugify;

const MIN_NAME_LENGTH: usize = 10;
const MAX_NAME_LENGTH: usize = 40;
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

impl Difficulty {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "difficult" => Some(Difficulty::Difficult),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub duration: i32,
    pub max_group_size: i32,
    pub difficulty: String,
    pub ratings_average: f64,
    pub ratings_quantity: i32,
    pub price: f64,
    pub price_discount: Option<f64>,
    pub summary: String,
    pub description: String,
    pub image_cover: String,
    pub images: Vec<String>,
    #[serde(skip_serializing)]
    pub created_at: DateTime<Utc>,
    pub start_dates: Vec<DateTime<Utc>>,
    pub secret_tour: bool,
}

/// Create and update body; every field is optional so that missing
/// required fields surface as validation messages
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TourInput {
    pub name: Option<String>,
    pub duration: Option<i32>,
    pub max_group_size: Option<i32>,
    pub difficulty: Option<String>,
    pub ratings_average: Option<f64>,
    pub ratings_quantity: Option<i32>,
    pub price: Option<f64>,
    pub price_discount: Option<f64>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub image_cover: Option<String>,
    pub images: Option<Vec<String>>,
    pub start_dates: Option<Vec<DateTime<Utc>>>,
    pub secret_tour: Option<bool>,
}

/// Aggregate of highly rated tours per difficulty
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TourStats {
    pub difficulty: String,
    pub num_tours: i64,
    pub num_ratings: i64,
    pub avg_rating: f64,
    pub avg_price: f64,
    pub min_price: f64,
    pub max_price: f64,
}

/// Tour starts in one month of a year
#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyPlan {
    pub month: i32,
    pub num_tour_starts: i64,
    pub tours: Vec<String>,
}

/// Round to one decimal place, 4.666 -> 4.7
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

impl Tour {
    fn from_input(input: TourInput) -> Self {
        let name = input.name.unwrap_or_default().trim().to_string();
        Self {
            id: Uuid::new_v4(),
            slug: slugify(&name),
            name,
            duration: input.duration.unwrap_or_default(),
            max_group_size: input.max_group_size.unwrap_or_default(),
            difficulty: input.difficulty.unwrap_or_default(),
            ratings_average: round_rating(input.ratings_average.unwrap_or(DEFAULT_RATINGS_AVERAGE)),
            ratings_quantity: input.ratings_quantity.unwrap_or(0),
            price: input.price.unwrap_or_default(),
            price_discount: input.price_discount,
            summary: input.summary.unwrap_or_default().trim().to_string(),
            description: input.description.unwrap_or_default().trim().to_string(),
            image_cover: input.image_cover.unwrap_or_default(),
            images: input.images.unwrap_or_default(),
            created_at: Utc::now(),
            start_dates: input.start_dates.unwrap_or_default(),
            secret_tour: input.secret_tour.unwrap_or(false),
        }
    }

    pub fn duration_weeks(&self) -> f64 {
        f64::from(self.duration) / 7.0
    }

    pub fn validate(&self) -> Result<(), AppError> {
        let mut violations = Violations::new();
        let name_length = self.name.chars().count();

        violations
            .check(!self.name.is_empty(), "A tour must have a name.")
            .check(
                self.name.is_empty() || name_length <= MAX_NAME_LENGTH,
                "A tour name must have less or equal than 40 characters",
            )
            .check(
                self.name.is_empty() || name_length >= MIN_NAME_LENGTH,
                "A tour name must have more or equal than 10 characters",
            )
            .check(self.duration > 0, "A tour must have a duration.")
            .check(self.max_group_size > 0, "A tour must have a group size.")
            .check(
                Difficulty::parse(&self.difficulty).is_some(),
                "Difficulty must be easy, medium or difficult",
            )
            .check(
                self.ratings_average >= 1.0,
                "Rating must be above or equal 1.0",
            )
            .check(
                self.ratings_average <= 5.0,
                "Rating must be below or equal 5.0",
            )
            .check(self.price > 0.0, "A tour must have a price.")
            .check(!self.summary.is_empty(), "A tour must have a summary")
            .check(!self.description.is_empty(), "A tour must have a description")
            .check(!self.image_cover.is_empty(), "A tour must have a cover image");

        if let Some(discount) = self.price_discount {
            if discount >= self.price {
                violations.push(format!(
                    "Discount price ({}) should be below regular price",
                    discount
                ));
            }
        }

        violations.into_result()
    }

    /// Find a public tour by its slug
    pub async fn find_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Tour>, AppError> {
        let tour = sqlx::query_as::<_, Tour>(
            "SELECT tours.* FROM tours WHERE tours.secret_tour = false AND tours.slug = $1",
        )
        .bind(slug)
        .fetch_optional(pool)
        .await?;
        Ok(tour)
    }

    /// All public tours, newest first
    pub async fn find_all(pool: &PgPool) -> Result<Vec<Tour>, AppError> {
        let tours = sqlx::query_as::<_, Tour>(
            "SELECT tours.* FROM tours WHERE tours.secret_tour = false ORDER BY tours.created_at DESC",
        )
        .fetch_all(pool)
        .await?;
        Ok(tours)
    }

    /// Public tours the user holds a booking for
    pub async fn find_booked_by(pool: &PgPool, user_id: Uuid) -> Result<Vec<Tour>, AppError> {
        let tours = sqlx::query_as::<_, Tour>(
            r#"
            SELECT tours.* FROM tours
            WHERE tours.secret_tour = false
              AND tours.id IN (SELECT tour_id FROM bookings WHERE user_id = $1)
            ORDER BY tours.name
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(tours)
    }

    /// Per-difficulty statistics of tours rated 4.5 or better, cheapest first
    pub async fn stats(pool: &PgPool) -> Result<Vec<TourStats>, AppError> {
        let stats = sqlx::query_as::<_, TourStats>(
            r#"
            SELECT UPPER(difficulty) AS difficulty,
                   COUNT(*) AS num_tours,
                   COALESCE(SUM(ratings_quantity), 0)::int8 AS num_ratings,
                   AVG(ratings_average) AS avg_rating,
                   AVG(price) AS avg_price,
                   MIN(price) AS min_price,
                   MAX(price) AS max_price
            FROM tours
            WHERE ratings_average >= 4.5 AND secret_tour = false
            GROUP BY UPPER(difficulty)
            ORDER BY avg_price ASC
            "#,
        )
        .fetch_all(pool)
        .await?;
        Ok(stats)
    }

    /// Tour starts per month within `year`, busiest month first
    pub async fn monthly_plan(pool: &PgPool, year: i32) -> Result<Vec<MonthlyPlan>, AppError> {
        let (from, to) = year_bounds(year)?;

        let plan = sqlx::query_as::<_, MonthlyPlan>(
            r#"
            SELECT EXTRACT(MONTH FROM start_date)::int4 AS month,
                   COUNT(*) AS num_tour_starts,
                   ARRAY_AGG(tours.name ORDER BY tours.name) AS tours
            FROM tours
            CROSS JOIN LATERAL UNNEST(tours.start_dates) AS start_date
            WHERE tours.secret_tour = false
              AND start_date >= $1 AND start_date < $2
            GROUP BY month
            ORDER BY num_tour_starts DESC, month ASC
            LIMIT 12
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(pool)
        .await?;
        Ok(plan)
    }

    /// Insert a tour under a fixed id, used when seeding
    pub async fn insert_with_id(pool: &PgPool, id: Uuid, input: TourInput) -> Result<Tour, AppError> {
        let mut tour = Tour::from_input(input);
        tour.id = id;
        Tour::create(pool, tour).await
    }

    async fn create(pool: &PgPool, tour: Tour) -> Result<Tour, AppError> {
        tour.validate()?;

        let created = sqlx::query_as::<_, Tour>(
            r#"
            INSERT INTO tours (id, name, slug, duration, max_group_size, difficulty,
                ratings_average, ratings_quantity, price, price_discount, summary,
                description, image_cover, images, created_at, start_dates, secret_tour)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            RETURNING *
            "#,
        )
        .bind(tour.id)
        .bind(&tour.name)
        .bind(&tour.slug)
        .bind(tour.duration)
        .bind(tour.max_group_size)
        .bind(&tour.difficulty)
        .bind(tour.ratings_average)
        .bind(tour.ratings_quantity)
        .bind(tour.price)
        .bind(tour.price_discount)
        .bind(&tour.summary)
        .bind(&tour.description)
        .bind(&tour.image_cover)
        .bind(&tour.images)
        .bind(tour.created_at)
        .bind(&tour.start_dates)
        .bind(tour.secret_tour)
        .fetch_one(pool)
        .await?;

        tracing::info!(tour_id = %created.id, slug = %created.slug, "Tour created");
        Ok(created)
    }

    pub async fn update_images(
        pool: &PgPool,
        id: Uuid,
        image_cover: Option<&str>,
        images: Option<&[String]>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tours
            SET image_cover = COALESCE($2, image_cover),
                images = COALESCE($3, images)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(image_cover)
        .bind(images)
        .execute(pool)
        .await?;
        Ok(())
    }
}

fn year_bounds(year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), AppError> {
    let start = |y: i32| {
        NaiveDate::from_ymd_opt(y, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| Utc.from_utc_datetime(&naive))
    };

    match (start(year), year.checked_add(1).and_then(start)) {
        (Some(from), Some(to)) => Ok((from, to)),
        _ => Err(AppError::cast("year", &year.to_string())),
    }
}

#[async_trait]
impl Resource for Tour {
    type Create = TourInput;
    type Patch = TourInput;

    const TABLE: &'static str = "tours";
    const SELECT: &'static str = "SELECT tours.* FROM tours";
    const BASE_FILTER: Option<&'static str> = Some("tours.secret_tour = false");
    const FIELDS: &'static [Field] = &[
        Field::new("id", "tours.id", FieldKind::Uuid),
        Field::new("name", "tours.name", FieldKind::Text),
        Field::new("slug", "tours.slug", FieldKind::Text),
        Field::new("duration", "tours.duration", FieldKind::Integer),
        Field::new("maxGroupSize", "tours.max_group_size", FieldKind::Integer),
        Field::new("difficulty", "tours.difficulty", FieldKind::Text),
        Field::new("ratingsAverage", "tours.ratings_average", FieldKind::Float),
        Field::new("ratingsQuantity", "tours.ratings_quantity", FieldKind::Integer),
        Field::new("price", "tours.price", FieldKind::Float),
        Field::new("priceDiscount", "tours.price_discount", FieldKind::Float),
        Field::new("createdAt", "tours.created_at", FieldKind::Timestamp),
    ];
    const SINGULAR: &'static str = "tour";
    const PLURAL: &'static str = "tours";

    fn id(&self) -> Uuid {
        self.id
    }

    fn to_document(&self) -> Result<serde_json::Value, AppError> {
        let mut document = serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize tour: {}", e)))?;
        if let Some(object) = document.as_object_mut() {
            object.insert("durationWeeks".to_string(), self.duration_weeks().into());
        }
        Ok(document)
    }

    async fn insert(pool: &PgPool, input: TourInput) -> Result<Self, AppError> {
        Tour::create(pool, Tour::from_input(input)).await
    }

    fn apply(&mut self, patch: TourInput) -> Result<(), AppError> {
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
            self.slug = slugify(&self.name);
        }
        if let Some(duration) = patch.duration {
            self.duration = duration;
        }
        if let Some(size) = patch.max_group_size {
            self.max_group_size = size;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(average) = patch.ratings_average {
            self.ratings_average = round_rating(average);
        }
        if let Some(quantity) = patch.ratings_quantity {
            self.ratings_quantity = quantity;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if patch.price_discount.is_some() {
            self.price_discount = patch.price_discount;
        }
        if let Some(summary) = patch.summary {
            self.summary = summary.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description.trim().to_string();
        }
        if let Some(cover) = patch.image_cover {
            self.image_cover = cover;
        }
        if let Some(images) = patch.images {
            self.images = images;
        }
        if let Some(dates) = patch.start_dates {
            self.start_dates = dates;
        }
        if let Some(secret) = patch.secret_tour {
            self.secret_tour = secret;
        }

        self.validate()
    }

    async fn save(&self, pool: &PgPool) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tours
            SET name = $2, slug = $3, duration = $4, max_group_size = $5, difficulty = $6,
                ratings_average = $7, ratings_quantity = $8, price = $9, price_discount = $10,
                summary = $11, description = $12, image_cover = $13, images = $14,
                start_dates = $15, secret_tour = $16
            WHERE id = $1
            "#,
        )
        .bind(self.id)
        .bind(&self.name)
        .bind(&self.slug)
        .bind(self.duration)
        .bind(self.max_group_size)
        .bind(&self.difficulty)
        .bind(self.ratings_average)
        .bind(self.ratings_quantity)
        .bind(self.price)
        .bind(self.price_discount)
        .bind(&self.summary)
        .bind(&self.description)
        .bind(&self.image_cover)
        .bind(&self.images)
        .bind(&self.start_dates)
        .bind(self.secret_tour)
        .execute(pool)
        .await?;
        Ok(())
    }
}
