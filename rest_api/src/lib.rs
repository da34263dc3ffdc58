// rest_api/src/lib.rs
// HTTP interface of the Medcor platform.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use std::future::Future;
use std::net::SocketAddr;

use anyhow::{Context, Error as AnyhowError};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::handlers::{ai, auth, billing, scheduling, system, tenants, treatments, users};

pub use crate::error::{ApiResult, RestApiError};
pub use crate::extract::TENANT_HEADER;
pub use crate::state::AppState;

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(system::health_check_handler))
        .route("/version", get(system::version_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/me", get(auth::me_handler))
        .route("/auth/change-password", post(auth::change_password_handler))
        .route("/tenants", get(tenants::list_tenants).post(tenants::create_tenant))
        .route("/tenants/:id", get(tenants::get_tenant).patch(tenants::update_tenant))
        .route("/tenants/:id/domains", post(tenants::add_domain))
        .route("/tenants/:id/activate", post(tenants::activate_tenant))
        .route("/tenants/:id/deactivate", post(tenants::deactivate_tenant))
        .route("/users", get(users::list_users).post(users::create_user))
        .route("/users/:id", get(users::get_user).patch(users::update_user))
        .route("/users/:id/activate", post(users::activate_user))
        .route("/users/:id/deactivate", post(users::deactivate_user))
        .route("/doctors", get(users::list_doctors))
        .route("/doctors/:id/profile", get(users::get_doctor_profile).put(users::put_doctor_profile))
        .route("/patients/:id/profile", get(users::get_patient_profile).put(users::put_patient_profile))
        .route("/slots", get(scheduling::list_slots).post(scheduling::create_slot))
        .route("/slots/recurring", post(scheduling::create_recurring_slots))
        .route("/slots/:id", axum::routing::delete(scheduling::deactivate_slot))
        .route("/appointments", get(scheduling::list_appointments).post(scheduling::book_appointment))
        .route("/appointments/:id", get(scheduling::get_appointment))
        .route("/appointments/:id/confirm", post(scheduling::confirm_appointment))
        .route("/appointments/:id/complete", post(scheduling::complete_appointment))
        .route("/appointments/:id/cancel", post(scheduling::cancel_appointment))
        .route("/appointments/:id/no-show", post(scheduling::no_show_appointment))
        .route("/appointments/:id/reschedule", post(scheduling::reschedule_appointment))
        .route("/treatments", get(treatments::list_treatments).post(treatments::create_treatment))
        .route("/treatments/:id", get(treatments::get_treatment))
        .route("/treatments/:id/status", post(treatments::update_treatment_status))
        .route(
            "/treatments/:id/prescriptions",
            get(treatments::list_prescriptions).post(treatments::add_prescription),
        )
        .route("/prescriptions/:id/refill", post(treatments::refill_prescription))
        .route("/prescriptions/:id/cancel", post(treatments::cancel_prescription))
        .route("/plans", get(billing::list_plans).post(billing::create_plan))
        .route("/plans/:id/deactivate", post(billing::deactivate_plan))
        .route("/subscription", get(billing::current_subscription).post(billing::subscribe))
        .route("/subscription/cancel", post(billing::cancel_subscription))
        .route("/subscription/renew", post(billing::renew_subscription))
        .route("/payments", get(billing::list_payments))
        .route("/payments/:id/refund", post(billing::refund_payment))
        .route("/ai/chat", post(ai::chat_handler))
        .route("/ai/chat/:session_id", get(ai::chat_history_handler))
        .route("/ai/analyze", post(ai::analyze_handler))
        .route("/mcp", post(ai::mcp_handler))
}

/// The complete application with tracing and CORS applied.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::HeaderName::from_static(TENANT_HEADER)])
        .allow_origin(Any);

    Router::new()
        .nest("/api/v1", api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<(), AnyhowError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().context("listener has no local address")?;
    info!("REST API listening on {}", local);
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
        .context("REST API server failed")?;
    info!("REST API server stopped");
    Ok(())
}

pub async fn start_server<F>(state: AppState, addr: SocketAddr, shutdown: F) -> Result<(), AnyhowError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to address: {}", addr))?;
    serve(listener, state, shutdown).await
}
