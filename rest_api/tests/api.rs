// rest_api/tests/api.rs
// Drives the HTTP API end to end over a real socket.

use std::sync::Arc;

use chrono::{Duration, Utc};
use lib::billing::ManualGateway;
use lib::notifications::LogTransport;
use lib::storage_engine::InMemoryStorage;
use lib::{AppConfig, Platform};
use models::medical::{NewUser, UserRole};
use reqwest::{Client, StatusCode};
use rest_api::{AppState, TENANT_HEADER};
use security::RolesConfig;
use serde_json::{json, Value};
use tokio::net::TcpListener;

const ROOT_PASSWORD: &str = "root-password";

struct TestApp {
    base: String,
    client: Client,
}

impl TestApp {
    async fn spawn() -> Self {
        let (platform, _mail_worker) = Platform::new(
            AppConfig::for_tests(),
            Arc::new(InMemoryStorage::new()),
            Arc::new(LogTransport),
            Arc::new(ManualGateway),
        );
        platform
            .users
            .bootstrap_admin(NewUser {
                first: "Root".into(),
                last: "Admin".into(),
                username: "root".into(),
                email: "root@example.org".into(),
                password: ROOT_PASSWORD.into(),
                phone: None,
                role: UserRole::Admin,
                tenant_id: None,
            })
            .await
            .unwrap();
        let state = AppState::new(platform, RolesConfig::bundled().unwrap());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(rest_api::serve(listener, state, std::future::pending()));
        TestApp { base: format!("http://{}/api/v1", addr), client: Client::new() }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = response.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    async fn post(&self, token: &str, path: &str, body: Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .header(TENANT_HEADER, "clinic")
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, token: &str, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .header(TENANT_HEADER, "clinic")
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap_or(Value::Null))
    }

    /// Creates the "clinic" hospital and a doctor in it.
    async fn with_clinic(&self) -> (String, Value) {
        let root = self.login("root", ROOT_PASSWORD).await;
        let (status, _) = self
            .post(&root, "/tenants", json!({ "name": "Clinic", "schema_name": "clinic", "domains": ["clinic.example.org"] }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, doctor) = self
            .post(
                &root,
                "/users",
                json!({
                    "first": "Meredith", "last": "Grey", "username": "drgrey",
                    "email": "grey@clinic.example.org", "password": "password123", "role": "doctor"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        (root, doctor)
    }

    async fn register_patient(&self, username: &str) -> String {
        let response = self
            .client
            .post(self.url("/auth/register"))
            .header(TENANT_HEADER, "clinic.example.org")
            .json(&json!({
                "first": "Pat", "last": "Ient", "username": username,
                "email": format!("{username}@example.org"), "password": "password123", "role": "patient"
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        self.login(username, "password123").await
    }
}

#[tokio::test]
async fn health_and_version_are_public() {
    let app = TestApp::spawn().await;
    let health: Value = app.client.get(app.url("/health")).send().await.unwrap().json().await.unwrap();
    assert_eq!(health["status"], "ok");
    let version: Value = app.client.get(app.url("/version")).send().await.unwrap().json().await.unwrap();
    assert_eq!(version["api_level"], 1);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let app = TestApp::spawn().await;
    let response = app.client.get(app.url("/auth/me")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");

    let response = app.client.get(app.url("/auth/me")).bearer_auth("not-a-jwt").send().await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bad_login = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "username": "root", "password": "wrong-password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_bodies_get_the_error_envelope() {
    let app = TestApp::spawn().await;
    let response = app
        .client
        .post(app.url("/auth/login"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn patients_book_and_doctors_confirm() {
    let app = TestApp::spawn().await;
    let (_, doctor) = app.with_clinic().await;
    let doctor_token = app.login("drgrey", "password123").await;
    let patient_token = app.register_patient("pat").await;

    let start = Utc::now() + Duration::days(2);
    let (status, slot) = app
        .post(
            &doctor_token,
            "/slots",
            json!({ "start": start, "end": start + Duration::minutes(30), "max_appointments": 1 }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(slot["doctor_id"], doctor["id"]);

    // Patients cannot publish availability.
    let (status, _) = app
        .post(&patient_token, "/slots", json!({ "start": start, "end": start + Duration::minutes(30) }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, slots) = app.get(&patient_token, "/slots").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slots.as_array().unwrap().len(), 1);

    let booking = json!({ "doctor_id": doctor["id"], "slot_id": slot["id"], "reason": "checkup" });
    let (status, appointment) = app.post(&patient_token, "/appointments", booking.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(appointment["status"], "pending");

    let (status, _) = app.post(&patient_token, "/appointments", booking).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let id = appointment["id"].as_str().unwrap();
    let (status, confirmed) = app.post(&doctor_token, &format!("/appointments/{id}/confirm"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (status, cancelled) = app
        .post(&patient_token, &format!("/appointments/{id}/cancel"), json!({ "reason": "feeling better" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "cancelled");

    let (_, slots) = app.get(&patient_token, "/slots").await;
    assert_eq!(slots[0]["current_appointments"], 0);
}

#[tokio::test]
async fn other_hospitals_are_off_limits() {
    let app = TestApp::spawn().await;
    let (root, _) = app.with_clinic().await;
    let (status, _) = app.post(&root, "/tenants", json!({ "name": "Other", "schema_name": "other" })).await;
    assert_eq!(status, StatusCode::CREATED);
    let patient_token = app.register_patient("pat").await;

    let response = app
        .client
        .get(app.url("/slots"))
        .bearer_auth(&patient_token)
        .header(TENANT_HEADER, "other")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let (status, visible) = app.get(&patient_token, "/tenants").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(visible.as_array().unwrap().len(), 1);
    assert_eq!(visible[0]["schema_name"], "clinic");
}

#[tokio::test]
async fn assistant_endpoints_answer() {
    let app = TestApp::spawn().await;
    app.with_clinic().await;
    let patient_token = app.register_patient("pat").await;

    let (status, report) = app.post(&patient_token, "/ai/analyze", json!({ "symptoms": "crushing chest pain" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["urgency"], "emergency");

    let (status, reply) = app.post(&patient_token, "/ai/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    let session = reply["session_id"].as_str().unwrap();
    let (status, history) = app.get(&patient_token, &format!("/ai/chat/{session}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 2);

    let (status, rpc) = app.post(&patient_token, "/mcp", json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" })).await;
    assert_eq!(status, StatusCode::OK);
    assert!(rpc["result"]["tools"].as_array().is_some_and(|tools| !tools.is_empty()));
}

#[tokio::test]
async fn members_of_a_deactivated_hospital_are_shut_out() {
    let app = TestApp::spawn().await;
    let (root, _) = app.with_clinic().await;
    let patient_token = app.register_patient("pat").await;
    let doctor_token = app.login("drgrey", "password123").await;

    let (_, tenants) = app.get(&root, "/tenants").await;
    let clinic = tenants[0]["id"].as_str().unwrap().to_string();
    let (status, _) = app.post(&root, &format!("/tenants/{clinic}/deactivate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post(&patient_token, "/ai/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["status"], "error");
    let (status, _) = app.get(&doctor_token, "/auth/me").await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Platform administrators keep working and can bring the hospital back.
    let (status, _) = app.post(&root, &format!("/tenants/{clinic}/activate"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.post(&patient_token, "/ai/chat", json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
}
