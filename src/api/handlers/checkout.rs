use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{extract::ApiJson, middleware::auth::CurrentUser, state::AppState},
    domain::CaptureOutcome,
    error::Result,
    service::capture_service::{CheckoutSession, VerifyPaymentRequest},
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCheckoutRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub payment_id: Uuid,
    pub order_id: Uuid,
    pub already_captured: bool,
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(request): ApiJson<CreateCheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutSession>)> {
    let session = state
        .service_context
        .capture_service
        .create_gateway_order(request.order_id, user.claims.sub)
        .await?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn verify(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(request): ApiJson<VerifyPaymentRequest>,
) -> Result<Json<VerifyPaymentResponse>> {
    let outcome = state
        .service_context
        .capture_service
        .verify_and_capture(user.claims.sub, request)
        .await?;

    let already_captured = matches!(outcome, CaptureOutcome::AlreadyCaptured(_));
    let payment = outcome.into_payment();

    Ok(Json(VerifyPaymentResponse {
        success: true,
        payment_id: payment.id,
        order_id: payment.order_id,
        already_captured,
    }))
}
