//! API tests against a real Postgres.
//!
//! Every test creates its own database, so run them with a local server up:
//! `cargo test -- --ignored`
//!
//! The email API and the payment provider are replaced by a local stub that
//! records what the application sends.

use actix_web::http::StatusCode;
use actix_web::{web, App, HttpResponse, HttpServer};
use natours::configuration::{get_configuration, DatabaseSettings};
use natours::startup::run;
use serde_json::{json, Value};
use sqlx::{Connection, Executor, PgConnection, PgPool, Row};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::{Arc, Mutex};

pub struct TestApp {
    pub address: String,
    pub db_pool: PgPool,
    pub client: reqwest::Client,
    pub outer: OuterServices,
}

/// Requests received by the stub email API and payment provider
#[derive(Clone)]
pub struct OuterServices {
    pub address: String,
    pub emails: Arc<Mutex<Vec<Value>>>,
    pub checkouts: Arc<Mutex<Vec<HashMap<String, String>>>>,
    email_status: StatusCode,
}

async fn receive_email(body: web::Json<Value>, outer: web::Data<OuterServices>) -> HttpResponse {
    outer.emails.lock().unwrap().push(body.into_inner());
    HttpResponse::build(outer.email_status).finish()
}

async fn create_checkout_session(
    form: web::Form<HashMap<String, String>>,
    outer: web::Data<OuterServices>,
) -> HttpResponse {
    outer.checkouts.lock().unwrap().push(form.into_inner());
    HttpResponse::Ok().json(json!({
        "id": "cs_test_1",
        "url": "https://checkout.example.com/pay/cs_test_1"
    }))
}

fn spawn_outer_services(email_status: u16) -> OuterServices {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let outer = OuterServices {
        address: format!("http://127.0.0.1:{}", port),
        emails: Arc::new(Mutex::new(Vec::new())),
        checkouts: Arc::new(Mutex::new(Vec::new())),
        email_status: StatusCode::from_u16(email_status).unwrap(),
    };

    let state = outer.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .route("/email", web::post().to(receive_email))
            .route("/v1/checkout/sessions", web::post().to(create_checkout_session))
    })
    .listen(listener)
    .expect("Failed to listen")
    .run();
    let _ = tokio::spawn(server);

    outer
}

async fn spawn_app() -> TestApp {
    spawn_app_with_email_status(200).await
}

async fn spawn_app_with_email_status(email_status: u16) -> TestApp {
    let outer = spawn_outer_services(email_status);

    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    let mut configuration = get_configuration().expect("Failed to read configuration.");
    configuration.database.database_name = uuid::Uuid::new_v4().to_string();
    configuration.email_client.base_url = outer.address.clone();
    configuration.payments.api_base_url = outer.address.clone();
    let connection_pool = configure_database(&configuration.database).await;

    let server = run(listener, connection_pool.clone(), configuration)
        .expect("Failed to bind address");
    let _ = tokio::spawn(server);

    TestApp {
        address,
        db_pool: connection_pool,
        client: reqwest::Client::new(),
        outer,
    }
}

pub async fn configure_database(config: &DatabaseSettings) -> PgPool {
    let mut connection = PgConnection::connect(&config.connection_string_without_db())
        .await
        .expect("Failed to connect to Postgres");
    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, config.database_name))
        .await
        .expect("Failed to create database.");

    let connection_pool = PgPool::connect(&config.connection_string())
        .await
        .expect("Failed to connect to Postgres.");
    sqlx::migrate!("./migrations")
        .run(&connection_pool)
        .await
        .expect("Failed to migrate the database.");
    connection_pool
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.address, path)
    }

    async fn signup(&self, name: &str, email: &str) -> (String, Value) {
        let response = self
            .client
            .post(&self.url("/users/signup"))
            .json(&json!({
                "name": name,
                "email": email,
                "password": "pass1234",
                "passwordConfirm": "pass1234"
            }))
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(201, response.status().as_u16());

        let body: Value = response.json().await.unwrap();
        let token = body["token"].as_str().unwrap().to_string();
        (token, body["data"]["user"].clone())
    }

    async fn set_role(&self, email: &str, role: &str) {
        sqlx::query("UPDATE users SET role = $1 WHERE email = $2")
            .bind(role)
            .bind(email)
            .execute(&self.db_pool)
            .await
            .expect("Failed to update role");
    }

    async fn admin_token(&self) -> String {
        let (token, _) = self.signup("Ada Admin", "admin@example.com").await;
        self.set_role("admin@example.com", "admin").await;
        token
    }

    async fn create_tour(&self, token: &str, name: &str, price: f64) -> Value {
        self.create_tour_from(token, tour_body(name, price)).await
    }

    async fn create_tour_from(&self, token: &str, body: Value) -> Value {
        let response = self
            .client
            .post(&self.url("/tours"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.");
        assert_eq!(201, response.status().as_u16());

        let body: Value = response.json().await.unwrap();
        body["data"]["tour"].clone()
    }

    async fn forgot_password(&self, email: &str) -> reqwest::Response {
        self.client
            .post(&self.url("/users/forgotPassword"))
            .json(&json!({ "email": email }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn reset_password(&self, token: &str, password: &str) -> reqwest::Response {
        self.client
            .patch(&self.url(&format!("/users/resetPassword/{}", token)))
            .json(&json!({ "password": password, "passwordConfirm": password }))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// The plaintext token from the last reset email the stub received
    fn reset_token_from_email(&self) -> String {
        let emails = self.outer.emails.lock().unwrap();
        let email = emails
            .iter()
            .rev()
            .find(|e| {
                e["Subject"]
                    .as_str()
                    .unwrap()
                    .starts_with("Your password reset token")
            })
            .expect("No reset email was sent");
        let text = email["TextBody"].as_str().unwrap();
        let (_, rest) = text.split_once("/resetPassword/").unwrap();
        rest.chars().take_while(|c| c.is_ascii_alphanumeric()).collect()
    }

    async fn stored_reset_token(&self, email: &str) -> Option<String> {
        sqlx::query("SELECT password_reset_token FROM users WHERE email = $1")
            .bind(email)
            .fetch_one(&self.db_pool)
            .await
            .expect("Failed to fetch user")
            .get("password_reset_token")
    }

    async fn set_ratings(&self, tour_id: &str, average: f64, quantity: i32) {
        sqlx::query(
            "UPDATE tours SET ratings_average = $1, ratings_quantity = $2 WHERE id = $3::uuid",
        )
        .bind(average)
        .bind(quantity)
        .bind(tour_id)
        .execute(&self.db_pool)
        .await
        .expect("Failed to update ratings");
    }
}

fn tour_body(name: &str, price: f64) -> Value {
    json!({
        "name": name,
        "duration": 5,
        "maxGroupSize": 25,
        "difficulty": "easy",
        "price": price,
        "summary": "Breathtaking hike through the Canadian Banff National Park",
        "description": "Ut enim ad minim veniam, quis nostrud exercitation.",
        "imageCover": "tour-1-cover.jpg",
        "startDates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"]
    })
}

#[tokio::test]
#[ignore]
async fn signup_stores_the_user_without_trusting_the_role() {
    let app = spawn_app().await;

    let response = app
        .client
        .post(&app.url("/users/signup"))
        .json(&json!({
            "name": "Leo Gillespie",
            "email": "LEO@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234",
            "role": "admin"
        }))
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(201, response.status().as_u16());
    assert!(response.headers().get("set-cookie").is_some());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["role"], "user");
    assert!(body["data"]["user"].get("password").is_none());

    let row = sqlx::query("SELECT email, role, password_hash FROM users")
        .fetch_one(&app.db_pool)
        .await
        .expect("Failed to fetch created user");
    assert_eq!(row.get::<String, _>("email"), "leo@example.com");
    assert_eq!(row.get::<String, _>("role"), "user");
    assert_ne!(row.get::<String, _>("password_hash"), "pass1234");
}

#[tokio::test]
#[ignore]
async fn signup_rejects_mismatched_passwords_and_duplicates() {
    let app = spawn_app().await;
    app.signup("Leo Gillespie", "leo@example.com").await;

    let mismatch = app
        .client
        .post(&app.url("/users/signup"))
        .json(&json!({
            "name": "Other",
            "email": "other@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass4321"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, mismatch.status().as_u16());

    let duplicate = app
        .client
        .post(&app.url("/users/signup"))
        .json(&json!({
            "name": "Leo Again",
            "email": "leo@example.com",
            "password": "pass1234",
            "passwordConfirm": "pass1234"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, duplicate.status().as_u16());
    let body: Value = duplicate.json().await.unwrap();
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("Duplicate field value"));
}

#[tokio::test]
#[ignore]
async fn login_checks_the_password() {
    let app = spawn_app().await;
    app.signup("Leo Gillespie", "leo@example.com").await;

    let wrong = app
        .client
        .post(&app.url("/users/login"))
        .json(&json!({ "email": "leo@example.com", "password": "nope12345" }))
        .send()
        .await
        .unwrap();
    assert_eq!(401, wrong.status().as_u16());
    let body: Value = wrong.json().await.unwrap();
    assert_eq!(body["message"], "Incorrect email or password");

    let right = app
        .client
        .post(&app.url("/users/login"))
        .json(&json!({ "email": "leo@example.com", "password": "pass1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, right.status().as_u16());
    let body: Value = right.json().await.unwrap();
    let token = body["token"].as_str().unwrap();

    let me = app
        .client
        .get(&app.url("/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, me.status().as_u16());
    let body: Value = me.json().await.unwrap();
    assert_eq!(body["data"]["user"]["email"], "leo@example.com");
}

#[tokio::test]
#[ignore]
async fn old_token_is_rejected_after_password_change() {
    let app = spawn_app().await;
    let (token, _) = app.signup("Leo Gillespie", "leo@example.com").await;

    // iat has second precision and the change is backdated by one second
    tokio::time::sleep(std::time::Duration::from_millis(2100)).await;

    let response = app
        .client
        .patch(&app.url("/users/updateMyPassword"))
        .bearer_auth(&token)
        .json(&json!({
            "passwordCurrent": "pass1234",
            "password": "newpass1234",
            "passwordConfirm": "newpass1234"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let fresh = body["token"].as_str().unwrap().to_string();

    let stale = app
        .client
        .get(&app.url("/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(401, stale.status().as_u16());

    let ok = app
        .client
        .get(&app.url("/users/me"))
        .bearer_auth(&fresh)
        .send()
        .await
        .unwrap();
    assert_eq!(200, ok.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn regular_users_cannot_create_tours() {
    let app = spawn_app().await;
    let (token, _) = app.signup("Leo Gillespie", "leo@example.com").await;

    let response = app
        .client
        .post(&app.url("/tours"))
        .bearer_auth(&token)
        .json(&tour_body("The Forest Hiker", 397.0))
        .send()
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "You do not have permission to perform this action"
    );
}

#[tokio::test]
#[ignore]
async fn tour_crud_round() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let tour = app.create_tour(&token, "The Forest Hiker", 397.0).await;
    assert_eq!(tour["slug"], "the-forest-hiker");
    assert_eq!(tour["durationWeeks"], json!(5.0 / 7.0));
    let id = tour["id"].as_str().unwrap().to_string();

    let updated = app
        .client
        .patch(&app.url(&format!("/tours/{}", id)))
        .bearer_auth(&token)
        .json(&json!({ "price": 497 }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, updated.status().as_u16());
    let body: Value = updated.json().await.unwrap();
    assert_eq!(body["data"]["tour"]["price"], json!(497.0));

    let invalid = app
        .client
        .patch(&app.url(&format!("/tours/{}", id)))
        .bearer_auth(&token)
        .json(&json!({ "difficulty": "extreme" }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, invalid.status().as_u16());

    let deleted = app
        .client
        .delete(&app.url(&format!("/tours/{}", id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(204, deleted.status().as_u16());

    let missing = app
        .client
        .get(&app.url(&format!("/tours/{}", id)))
        .send()
        .await
        .unwrap();
    assert_eq!(404, missing.status().as_u16());
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["message"], "No document found with that ID");
}

#[tokio::test]
#[ignore]
async fn tour_listing_filters_sorts_and_projects() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    app.create_tour(&token, "The Forest Hiker", 397.0).await;
    app.create_tour(&token, "The Sea Explorer", 497.0).await;
    app.create_tour(&token, "The Snow Adventurer", 997.0).await;

    let response = app
        .client
        .get(&app.url("/tours?price[lt]=900&sort=-price&fields=name,price"))
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["results"], 2);
    let tours = body["data"]["tours"].as_array().unwrap();
    assert_eq!(tours[0]["name"], "The Sea Explorer");
    assert_eq!(tours[1]["name"], "The Forest Hiker");
    assert!(tours[0].get("summary").is_none());
    assert!(tours[0].get("id").is_some());

    let page = app
        .client
        .get(&app.url("/tours?sort=price&page=2&limit=2"))
        .send()
        .await
        .unwrap();
    let body: Value = page.json().await.unwrap();
    assert_eq!(body["results"], 1);
    assert_eq!(body["data"]["tours"][0]["name"], "The Snow Adventurer");
}

#[tokio::test]
#[ignore]
async fn secret_tours_are_hidden() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let mut body = tour_body("The Secret Garden", 300.0);
    body["secretTour"] = json!(true);
    let response = app
        .client
        .post(&app.url("/tours"))
        .bearer_auth(&token)
        .json(&body)
        .send()
        .await
        .unwrap();
    assert_eq!(201, response.status().as_u16());
    app.create_tour(&token, "The Forest Hiker", 397.0).await;

    let listing: Value = app
        .client
        .get(&app.url("/tours"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listing["results"], 1);
    assert_eq!(listing["data"]["tours"][0]["name"], "The Forest Hiker");
}

#[tokio::test]
#[ignore]
async fn reviews_update_tour_ratings() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tour = app.create_tour(&admin, "The Forest Hiker", 397.0).await;
    let tour_id = tour["id"].as_str().unwrap().to_string();

    let (first, _) = app.signup("Leo Gillespie", "leo@example.com").await;
    let (second, _) = app.signup("Jennifer Hardy", "jennifer@example.com").await;

    for (token, rating) in [(&first, 4), (&second, 5)] {
        let response = app
            .client
            .post(&app.url(&format!("/tours/{}/reviews", tour_id)))
            .bearer_auth(token)
            .json(&json!({ "review": "Great tour", "rating": rating }))
            .send()
            .await
            .unwrap();
        assert_eq!(201, response.status().as_u16());
    }

    let again = app
        .client
        .post(&app.url(&format!("/tours/{}/reviews", tour_id)))
        .bearer_auth(&first)
        .json(&json!({ "review": "Still great", "rating": 3 }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, again.status().as_u16());

    let tour: Value = app
        .client
        .get(&app.url(&format!("/tours/{}", tour_id)))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(tour["data"]["tour"]["ratingsQuantity"], 2);
    assert_eq!(tour["data"]["tour"]["ratingsAverage"], json!(4.5));

    let reviews: Value = app
        .client
        .get(&app.url(&format!("/tours/{}/reviews", tour_id)))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(reviews["results"], 2);
    assert!(reviews["data"]["reviews"][0]["user"]["name"].is_string());
}

#[tokio::test]
#[ignore]
async fn admins_cannot_write_reviews() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tour = app.create_tour(&admin, "The Forest Hiker", 397.0).await;

    let response = app
        .client
        .post(&app.url(&format!(
            "/tours/{}/reviews",
            tour["id"].as_str().unwrap()
        )))
        .bearer_auth(&admin)
        .json(&json!({ "review": "Nice", "rating": 5 }))
        .send()
        .await
        .unwrap();

    assert_eq!(403, response.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn delete_me_deactivates_the_account() {
    let app = spawn_app().await;
    let (token, _) = app.signup("Leo Gillespie", "leo@example.com").await;

    let response = app
        .client
        .delete(&app.url("/users/deleteMe"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(204, response.status().as_u16());

    let active: bool = sqlx::query("SELECT active FROM users WHERE email = 'leo@example.com'")
        .fetch_one(&app.db_pool)
        .await
        .unwrap()
        .get("active");
    assert!(!active);

    let me = app
        .client
        .get(&app.url("/users/me"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(401, me.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn update_me_refuses_password_changes() {
    let app = spawn_app().await;
    let (token, _) = app.signup("Leo Gillespie", "leo@example.com").await;

    let refused = app
        .client
        .patch(&app.url("/users/updateMe"))
        .bearer_auth(&token)
        .json(&json!({ "password": "newpass1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(400, refused.status().as_u16());

    let renamed = app
        .client
        .patch(&app.url("/users/updateMe"))
        .bearer_auth(&token)
        .json(&json!({ "name": "Leo G", "role": "admin" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, renamed.status().as_u16());
    let body: Value = renamed.json().await.unwrap();
    assert_eq!(body["data"]["user"]["name"], "Leo G");
    assert_eq!(body["data"]["user"]["role"], "user");
}

#[tokio::test]
#[ignore]
async fn forgot_password_stores_a_hashed_token_and_reset_consumes_it() {
    let app = spawn_app().await;
    app.signup("Leo Gillespie", "leo@example.com").await;

    let unknown = app.forgot_password("nobody@example.com").await;
    assert_eq!(404, unknown.status().as_u16());
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["message"], "There is no user with email address.");

    let response = app.forgot_password("leo@example.com").await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Token sent to email!");

    let token = app.reset_token_from_email();
    assert_eq!(token.len(), 64);
    let stored = app.stored_reset_token("leo@example.com").await.unwrap();
    assert_ne!(stored, token);
    assert_eq!(stored.len(), 64);

    let reset = app.reset_password(&token, "newpass1234").await;
    assert_eq!(200, reset.status().as_u16());
    let body: Value = reset.json().await.unwrap();
    assert!(body["token"].is_string());

    let row = sqlx::query(
        "SELECT password_reset_token, password_reset_expires IS NULL AS expires_cleared \
         FROM users WHERE email = 'leo@example.com'",
    )
    .fetch_one(&app.db_pool)
    .await
    .unwrap();
    assert!(row.get::<Option<String>, _>("password_reset_token").is_none());
    assert!(row.get::<bool, _>("expires_cleared"));

    let login = app
        .client
        .post(&app.url("/users/login"))
        .json(&json!({ "email": "leo@example.com", "password": "newpass1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, login.status().as_u16());

    let reused = app.reset_password(&token, "otherpass1234").await;
    assert_eq!(400, reused.status().as_u16());
    let body: Value = reused.json().await.unwrap();
    assert_eq!(body["message"], "Token is invalid or has expired");
}

#[tokio::test]
#[ignore]
async fn unknown_or_expired_reset_tokens_are_rejected() {
    let app = spawn_app().await;
    app.signup("Leo Gillespie", "leo@example.com").await;

    let unknown = app.reset_password(&"a".repeat(64), "newpass1234").await;
    assert_eq!(400, unknown.status().as_u16());
    let body: Value = unknown.json().await.unwrap();
    assert_eq!(body["message"], "Token is invalid or has expired");

    let response = app.forgot_password("leo@example.com").await;
    assert_eq!(200, response.status().as_u16());
    let token = app.reset_token_from_email();

    sqlx::query(
        "UPDATE users SET password_reset_expires = NOW() - INTERVAL '1 minute' \
         WHERE email = 'leo@example.com'",
    )
    .execute(&app.db_pool)
    .await
    .unwrap();

    let expired = app.reset_password(&token, "newpass1234").await;
    assert_eq!(400, expired.status().as_u16());
    let body: Value = expired.json().await.unwrap();
    assert_eq!(body["message"], "Token is invalid or has expired");

    let login = app
        .client
        .post(&app.url("/users/login"))
        .json(&json!({ "email": "leo@example.com", "password": "pass1234" }))
        .send()
        .await
        .unwrap();
    assert_eq!(200, login.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn failed_reset_email_clears_the_token() {
    let app = spawn_app_with_email_status(500).await;
    app.signup("Leo Gillespie", "leo@example.com").await;

    let response = app.forgot_password("leo@example.com").await;
    assert_eq!(500, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body["message"],
        "There was an error sending the email. Try again later!"
    );

    // the reset email did reach the stub before it answered 500
    let token = app.reset_token_from_email();
    assert!(app.stored_reset_token("leo@example.com").await.is_none());

    let reset = app.reset_password(&token, "newpass1234").await;
    assert_eq!(400, reset.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn tour_stats_group_highly_rated_tours_by_difficulty() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    let forest = app.create_tour(&token, "The Forest Hiker", 400.0).await;
    let sea = app.create_tour(&token, "The Sea Explorer", 600.0).await;
    let mut body = tour_body("The Snow Adventurer", 300.0);
    body["difficulty"] = json!("medium");
    let snow = app.create_tour_from(&token, body).await;
    let mut body = tour_body("The Star Gazer", 1000.0);
    body["difficulty"] = json!("difficult");
    let stars = app.create_tour_from(&token, body).await;

    app.set_ratings(forest["id"].as_str().unwrap(), 4.8, 10).await;
    app.set_ratings(sea["id"].as_str().unwrap(), 4.6, 5).await;
    app.set_ratings(snow["id"].as_str().unwrap(), 4.9, 7).await;
    app.set_ratings(stars["id"].as_str().unwrap(), 4.0, 3).await;

    let response = app.client.get(&app.url("/tours/tour-stats")).send().await.unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let stats = body["data"]["stats"].as_array().unwrap();
    assert_eq!(stats.len(), 2);

    assert_eq!(stats[0]["difficulty"], "MEDIUM");
    assert_eq!(stats[0]["numTours"], 1);
    assert_eq!(stats[0]["avgPrice"], json!(300.0));

    assert_eq!(stats[1]["difficulty"], "EASY");
    assert_eq!(stats[1]["numTours"], 2);
    assert_eq!(stats[1]["numRatings"], 15);
    assert_eq!(stats[1]["avgPrice"], json!(500.0));
    assert_eq!(stats[1]["minPrice"], json!(400.0));
    assert_eq!(stats[1]["maxPrice"], json!(600.0));
    let avg_rating = stats[1]["avgRating"].as_f64().unwrap();
    assert!((avg_rating - 4.7).abs() < 1e-9);
}

#[tokio::test]
#[ignore]
async fn monthly_plan_counts_starts_busiest_month_first() {
    let app = spawn_app().await;
    let token = app.admin_token().await;

    app.create_tour(&token, "The Forest Hiker", 397.0).await;
    let mut body = tour_body("The Sea Explorer", 497.0);
    body["startDates"] = json!(["2021-07-01T09:00:00Z", "2022-01-10T09:00:00Z"]);
    app.create_tour_from(&token, body).await;

    let response = app
        .client
        .get(&app.url("/tours/monthly-plan/2021"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    let plan = body["data"]["plan"].as_array().unwrap();

    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0]["month"], 7);
    assert_eq!(plan[0]["numTourStarts"], 2);
    assert_eq!(
        plan[0]["tours"],
        json!(["The Forest Hiker", "The Sea Explorer"])
    );
    assert_eq!(plan[1]["month"], 4);
    assert_eq!(plan[1]["numTourStarts"], 1);

    let bad_year = app
        .client
        .get(&app.url("/tours/monthly-plan/twenty"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(400, bad_year.status().as_u16());
    let body: Value = bad_year.json().await.unwrap();
    assert_eq!(body["message"], "Invalid year: twenty.");

    let (user_token, _) = app.signup("Leo Gillespie", "leo@example.com").await;
    let forbidden = app
        .client
        .get(&app.url("/tours/monthly-plan/2021"))
        .bearer_auth(&user_token)
        .send()
        .await
        .unwrap();
    assert_eq!(403, forbidden.status().as_u16());
}

#[tokio::test]
#[ignore]
async fn nested_reviews_are_scoped_to_their_tour() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let forest = app.create_tour(&admin, "The Forest Hiker", 397.0).await;
    let sea = app.create_tour(&admin, "The Sea Explorer", 497.0).await;
    let forest_id = forest["id"].as_str().unwrap().to_string();
    let sea_id = sea["id"].as_str().unwrap().to_string();

    let (token, _) = app.signup("Leo Gillespie", "leo@example.com").await;
    for (tour_id, text) in [(&forest_id, "Loved the forest"), (&sea_id, "Loved the sea")] {
        let response = app
            .client
            .post(&app.url(&format!("/tours/{}/reviews", tour_id)))
            .bearer_auth(&token)
            .json(&json!({ "review": text, "rating": 5 }))
            .send()
            .await
            .unwrap();
        assert_eq!(201, response.status().as_u16());
    }

    let nested: Value = app
        .client
        .get(&app.url(&format!("/tours/{}/reviews", sea_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(nested["results"], 1);
    assert_eq!(nested["data"]["reviews"][0]["review"], "Loved the sea");
    assert_eq!(nested["data"]["reviews"][0]["tour"], sea_id.as_str());

    let all: Value = app
        .client
        .get(&app.url("/reviews"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(all["results"], 2);
}

#[tokio::test]
#[ignore]
async fn checkout_session_is_created_at_the_payment_provider() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tour = app.create_tour(&admin, "The Forest Hiker", 397.0).await;
    let tour_id = tour["id"].as_str().unwrap().to_string();
    let (token, user) = app.signup("Leo Gillespie", "leo@example.com").await;

    let response = app
        .client
        .get(&app.url(&format!("/bookings/checkout-session/{}", tour_id)))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["session"]["id"], "cs_test_1");
    assert_eq!(
        body["session"]["url"],
        "https://checkout.example.com/pay/cs_test_1"
    );

    let checkouts = app.outer.checkouts.lock().unwrap().clone();
    assert_eq!(checkouts.len(), 1);
    let form = &checkouts[0];
    assert_eq!(form["customer_email"], "leo@example.com");
    assert_eq!(form["client_reference_id"], tour_id);
    assert_eq!(form["line_items[0][price_data][unit_amount]"], "39700");
    assert_eq!(
        form["line_items[0][price_data][product_data][name]"],
        "The Forest Hiker Tour"
    );
    let success_url = &form["success_url"];
    assert!(success_url.contains(&format!("tour={}", tour_id)));
    assert!(success_url.contains(&format!("user={}", user["id"].as_str().unwrap())));

    let missing = app
        .client
        .get(&app.url(&format!(
            "/bookings/checkout-session/{}",
            uuid::Uuid::new_v4()
        )))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(404, missing.status().as_u16());
    assert_eq!(app.outer.checkouts.lock().unwrap().len(), 1);
}

#[tokio::test]
#[ignore]
async fn overview_with_checkout_params_books_and_redirects() {
    let app = spawn_app().await;
    let admin = app.admin_token().await;
    let tour = app.create_tour(&admin, "The Forest Hiker", 397.0).await;
    let tour_id = tour["id"].as_str().unwrap().to_string();
    let (_, user) = app.signup("Leo Gillespie", "leo@example.com").await;
    let user_id = user["id"].as_str().unwrap().to_string();

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();
    let response = client
        .get(&format!(
            "{}/?tour={}&user={}&price=397",
            app.address, tour_id, user_id
        ))
        .send()
        .await
        .unwrap();

    assert_eq!(302, response.status().as_u16());
    assert_eq!(response.headers().get("location").unwrap(), "/");

    let row = sqlx::query(
        "SELECT tour_id::text AS tour_id, user_id::text AS user_id, price, paid FROM bookings",
    )
    .fetch_one(&app.db_pool)
    .await
    .expect("No booking was created");
    assert_eq!(row.get::<String, _>("tour_id"), tour_id);
    assert_eq!(row.get::<String, _>("user_id"), user_id);
    assert_eq!(row.get::<f64, _>("price"), 397.0);
    assert!(row.get::<bool, _>("paid"));

    let plain = client.get(&app.address).send().await.unwrap();
    assert_eq!(200, plain.status().as_u16());
    let count: i64 = sqlx::query("SELECT COUNT(*) AS count FROM bookings")
        .fetch_one(&app.db_pool)
        .await
        .unwrap()
        .get("count");
    assert_eq!(count, 1);
}
