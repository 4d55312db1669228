mod auth;
mod bookings;
mod factory;
mod health_check;
mod reviews;
mod tours;
mod users;
mod views;

pub use auth::{
    create_send_token, forgot_password, login, logout, reset_password, signup, update_password,
};
pub use bookings::bookings_scope;
pub use factory::{
    create_document, create_one, delete_document, delete_one, find_document, get_all, get_one,
    list_documents, update_document, update_one,
};
pub use health_check::health_check;
pub use reviews::{review_routes, reviews_scope};
pub use tours::tours_scope;
pub use users::users_scope;
pub use views::{not_found, views_config};

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::{json, Value};

/// `{ "status": "success", "data": { key: value } }`
pub fn respond(status: StatusCode, key: &str, value: Value) -> HttpResponse {
    HttpResponse::build(status).json(json!({
        "status": "success",
        "data": { key: value }
    }))
}

/// Same envelope with a `results` count
pub fn respond_list(key: &str, values: Vec<Value>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "success",
        "results": values.len(),
        "data": { key: values }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_respond_list_counts_results() {
        let resp = respond_list("tours", vec![json!({"id": 1}), json!({"id": 2})]);
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["results"], 2);
        assert_eq!(value["data"]["tours"][1]["id"], 2);
    }

    #[actix_web::test]
    async fn test_respond_single_document() {
        let resp = respond(StatusCode::CREATED, "review", json!({"rating": 5}));
        assert_eq!(resp.status(), StatusCode::CREATED);

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert!(value.get("results").is_none());
        assert_eq!(value["data"]["review"]["rating"], 5);
    }
}
