//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! One Axum router carries the JSON API under `/api`, serves uploaded
//! home-check photos from `PHOTO_DIR` at `/photos`, and exposes `/healthz`
//! for load balancers. Every `/api` route except the two sign-in endpoints
//! requires a session (cookie or bearer token).

pub mod auth;
pub mod dashboard;
pub mod home_checks;
pub mod messages;
pub mod payments;
pub mod properties;
pub mod users;
pub mod vendors;
pub mod work_orders;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::services::photo::PHOTO_URL_PREFIX;
use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let photo_dir = state.config.photo_dir.clone();

    api_routes(&state)
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .nest_service(PHOTO_URL_PREFIX, ServeDir::new(photo_dir))
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let photo_limit = DefaultBodyLimit::max(state.config.photo_max_bytes);

    Router::new()
        .route("/api/auth/request-code", post(auth::request_code))
        .route("/api/auth/verify-code", post(auth::verify_code))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/users", post(users::create_user))
        .route("/api/users/{id}", get(users::get_user))
        .route("/api/users/{id}/role", patch(users::set_role))
        .route("/api/dashboard", get(dashboard::get_dashboard))
        .route(
            "/api/properties",
            get(properties::list_properties).post(properties::create_property),
        )
        .route(
            "/api/properties/{id}",
            get(properties::get_property)
                .patch(properties::update_property)
                .delete(properties::delete_property),
        )
        .route("/api/properties/{id}/watcher", put(properties::assign_watcher))
        .route(
            "/api/properties/{id}/tenants",
            get(properties::list_tenants).post(properties::create_tenant),
        )
        .route(
            "/api/tenants/{id}",
            get(properties::get_tenant)
                .patch(properties::update_tenant)
                .delete(properties::delete_tenant),
        )
        .route(
            "/api/properties/{id}/payments",
            get(payments::list_for_property).post(payments::create_charge),
        )
        .route("/api/properties/{id}/payments/summary", get(payments::property_summary))
        .route("/api/payments", get(payments::list_mine))
        .route("/api/payments/summary", get(payments::my_summary))
        .route("/api/payments/{id}", delete(payments::delete_charge))
        .route("/api/payments/{id}/pay", post(payments::pay))
        .route(
            "/api/properties/{id}/work-orders",
            get(work_orders::list_for_property).post(work_orders::create_work_order),
        )
        .route("/api/work-orders", get(work_orders::list_visible))
        .route(
            "/api/work-orders/{id}",
            get(work_orders::get_work_order).patch(work_orders::update_work_order),
        )
        .route("/api/work-orders/{id}/status", post(work_orders::set_status))
        .route("/api/vendors", get(vendors::list_vendors).post(vendors::create_vendor))
        .route(
            "/api/vendors/{id}",
            get(vendors::get_vendor)
                .patch(vendors::update_vendor)
                .delete(vendors::delete_vendor),
        )
        .route("/api/messages", post(messages::send_message))
        .route("/api/messages/inbox", get(messages::inbox))
        .route("/api/messages/sent", get(messages::sent))
        .route("/api/messages/unread-count", get(messages::unread_count))
        .route("/api/messages/with/{user_id}", get(messages::conversation))
        .route("/api/messages/{id}/read", post(messages::mark_read))
        .route(
            "/api/properties/{id}/home-checks",
            get(home_checks::list_for_property).post(home_checks::schedule_check),
        )
        .route("/api/home-checks", get(home_checks::list_assigned))
        .route(
            "/api/home-checks/{id}",
            get(home_checks::get_check)
                .patch(home_checks::update_details)
                .delete(home_checks::delete_check),
        )
        .route("/api/home-checks/{id}/summary", get(home_checks::summary))
        .route("/api/home-checks/{id}/start", post(home_checks::start_check))
        .route("/api/home-checks/{id}/save", post(home_checks::save_check))
        .route("/api/home-checks/{id}/submit", post(home_checks::submit_check))
        .route("/api/home-checks/{id}/items", post(home_checks::add_item))
        .route(
            "/api/home-checks/{id}/items/{item_id}",
            patch(home_checks::update_item).delete(home_checks::remove_item),
        )
        .route(
            "/api/home-checks/{id}/items/{item_id}/photos",
            post(home_checks::upload_photo).layer(photo_limit),
        )
        .route(
            "/api/home-checks/{id}/items/{item_id}/photos/{photo_id}",
            delete(home_checks::delete_photo),
        )
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
