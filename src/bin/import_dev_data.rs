//! Seed or wipe the development database.
//!
//! ```text
//! cargo run --bin import_dev_data -- --import
//! cargo run --bin import_dev_data -- --delete
//! ```

use natours::configuration::get_configuration;
use natours::error::AppError;
use natours::models::{
    recalculate_tour_ratings, Resource, Review, ReviewInput, Role, SignupInput, Tour, TourInput,
    User,
};
use natours::telemetry::init_telemetry;
use serde::{de::DeserializeOwned, Deserialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::path::Path;
use uuid::Uuid;

const DATA_DIR: &str = "dev-data/data";

#[derive(Deserialize)]
struct DevTour {
    id: Uuid,
    #[serde(flatten)]
    tour: TourInput,
}

#[derive(Deserialize)]
struct DevUser {
    id: Uuid,
    name: String,
    email: String,
    role: String,
    photo: Option<String>,
    password: String,
}

fn read_json<T: DeserializeOwned>(name: &str) -> Result<Vec<T>, AppError> {
    let path = Path::new(DATA_DIR).join(name);
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| AppError::Internal(format!("Failed to read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| AppError::Internal(format!("Failed to parse {}: {}", path.display(), e)))
}

async fn import_data(pool: &PgPool) -> Result<(), AppError> {
    let tours: Vec<DevTour> = read_json("tours.json")?;
    let users: Vec<DevUser> = read_json("users.json")?;
    let reviews: Vec<ReviewInput> = read_json("reviews.json")?;

    for DevTour { id, tour } in tours {
        Tour::insert_with_id(pool, id, tour).await?;
    }

    for user in users {
        let role = Role::parse(&user.role)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown role: {}", user.role)))?;
        let input = SignupInput {
            name: Some(user.name),
            email: Some(user.email),
            password: Some(user.password.clone()),
            password_confirm: Some(user.password),
        };
        User::create(pool, user.id, input, role, user.photo).await?;
    }

    let mut rated_tours = BTreeSet::new();
    for review in reviews {
        let created = Review::insert(pool, review).await?;
        rated_tours.insert(created.tour_id);
    }
    for tour_id in rated_tours {
        recalculate_tour_ratings(pool, tour_id).await?;
    }

    Ok(())
}

async fn delete_data(pool: &PgPool) -> Result<(), AppError> {
    for table in ["bookings", "reviews", "tours", "users"] {
        let result = sqlx::query(&format!("DELETE FROM {}", table))
            .execute(pool)
            .await?;
        tracing::info!(table, rows = result.rows_affected(), "Table cleared");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    let action = std::env::args().nth(1).unwrap_or_default();
    if action != "--import" && action != "--delete" {
        eprintln!("use --import to import data or --delete to delete all data");
        return Ok(());
    }

    let configuration = get_configuration().map_err(|e| {
        tracing::error!("Failed to read configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "Configuration error")
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(configuration.database.max_connections)
        .connect(&configuration.database.connection_string())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create connection pool: {}", e);
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Database connection error")
        })?;

    let result = if action == "--import" {
        import_data(&pool).await.map(|_| "Data successfully loaded!")
    } else {
        delete_data(&pool).await.map(|_| "Data successfully deleted!")
    };

    match result {
        Ok(message) => {
            tracing::info!("{}", message);
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Dev data command failed");
            Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        }
    }
}
