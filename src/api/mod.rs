pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    auth::TokenService,
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    tokens: Arc<TokenService>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, tokens, settings);

    Router::new()
        .route("/health", get(handlers::root::health_check))
        .nest("/api", api_routes(app_state.clone()))
        .with_state(app_state)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Authenticated by signature, not by bearer token
        .route("/webhooks/gateway", post(handlers::webhooks::gateway))
        .nest("/checkout", checkout_routes(state.clone()))
        .nest("/wallet", wallet_routes(state.clone()))
        .nest("/admin", admin_routes(state))
}

fn checkout_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/orders", post(handlers::checkout::create_order))
        .route("/verify", post(handlers::checkout::verify))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn wallet_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/balance", get(handlers::wallet::balance))
        .route("/transactions", get(handlers::wallet::transactions))
        .route(
            "/withdrawals",
            get(handlers::wallet::withdrawals).post(handlers::wallet::request_withdrawal),
        )
        .route("/commissions", get(handlers::wallet::commissions))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/withdrawals", get(handlers::admin::list_withdrawals))
        .route("/withdrawals/:id/approve", post(handlers::admin::approve_withdrawal))
        .route("/withdrawals/:id/reject", post(handlers::admin::reject_withdrawal))
        .route("/payments/:id/refund", post(handlers::admin::refund_payment))
        .route("/orders/:id/accrue", post(handlers::admin::accrue_order))
        .route("/orders/:id/settle", post(handlers::admin::settle_order))
        .route("/discrepancies", get(handlers::admin::discrepancies))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_admin,
        ))
}
