/// Domain models
///
/// Every model stored in its own table implements [`Resource`], which is
/// what the generic handlers in `routes::factory` and the query builder in
/// `api_features` work against.

mod booking;
mod review;
pub(crate) mod tour;
pub(crate) mod user;

pub use booking::{Booking, BookingInput};
pub use review::{recalculate_tour_ratings, Review, ReviewInput};
pub use tour::{Difficulty, MonthlyPlan, Tour, TourInput, TourStats};
pub use user::{Role, SignupInput, User, UserPatch, DEFAULT_PHOTO};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AppError;

/// How a query string value is converted before being bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Bool,
    Timestamp,
    Uuid,
}

/// A queryable attribute: the name clients use and the SQL expression behind it
#[derive(Debug, Clone, Copy)]
pub struct Field {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind }
    }
}

/// A model persisted in its own table and exposed through the CRUD handlers
#[async_trait]
pub trait Resource:
    for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + Sized + 'static
{
    /// Body accepted on create
    type Create: DeserializeOwned + Send + 'static;
    /// Body accepted on partial update
    type Patch: DeserializeOwned + Send + 'static;

    const TABLE: &'static str;
    /// `SELECT ... FROM <TABLE> [JOIN ...]` without a WHERE clause
    const SELECT: &'static str;
    /// Condition every query carries, e.g. hiding secret tours
    const BASE_FILTER: Option<&'static str> = None;
    const FIELDS: &'static [Field];
    /// Key used in the response envelope for one document
    const SINGULAR: &'static str;
    /// Key used in the response envelope for a list
    const PLURAL: &'static str;

    fn id(&self) -> Uuid;

    fn field(name: &str) -> Option<&'static Field> {
        Self::FIELDS.iter().find(|f| f.name == name)
    }

    /// JSON representation sent to clients
    fn to_document(&self) -> Result<serde_json::Value, AppError> {
        serde_json::to_value(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize {}: {}", Self::SINGULAR, e)))
    }

    async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, AppError> {
        let sql = match Self::BASE_FILTER {
            Some(filter) => format!("{} WHERE {} AND {}.id = $1", Self::SELECT, filter, Self::TABLE),
            None => format!("{} WHERE {}.id = $1", Self::SELECT, Self::TABLE),
        };

        let document = sqlx::query_as::<_, Self>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(document)
    }

    /// Validate and insert a new document
    async fn insert(pool: &PgPool, input: Self::Create) -> Result<Self, AppError>;

    /// Merge a partial update into `self` and validate the result
    fn apply(&mut self, patch: Self::Patch) -> Result<(), AppError>;

    /// Persist every mutable column of `self`
    async fn save(&self, pool: &PgPool) -> Result<(), AppError>;

    async fn delete_by_id(pool: &PgPool, id: Uuid) -> Result<bool, AppError> {
        let sql = format!("DELETE FROM {} WHERE id = $1", Self::TABLE);
        let result = sqlx::query(&sql).bind(id).execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Runs after insert and save
    async fn after_save(&self, _pool: &PgPool) -> Result<(), AppError> {
        Ok(())
    }

    /// Runs after a successful delete
    async fn after_delete(&self, _pool: &PgPool) -> Result<(), AppError> {
        Ok(())
    }
}

/// Parse a path id, reporting a malformed one as a cast error
pub fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::cast("id", raw))
}
