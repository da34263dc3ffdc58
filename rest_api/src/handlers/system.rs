// rest_api/src/handlers/system.rs
use axum::{http::StatusCode, Json};
use serde_json::{json, Value};

pub const API_LEVEL: u32 = 1;

pub async fn health_check_handler() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "ok", "message": "Medcor API is healthy" })))
}

pub async fn version_handler() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "version": env!("CARGO_PKG_VERSION"), "api_level": API_LEVEL })))
}
