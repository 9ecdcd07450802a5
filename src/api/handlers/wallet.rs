use axum::{
    extract::State,
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    api::{
        extract::{ApiJson, ApiQuery},
        middleware::auth::CurrentUser,
        state::AppState,
    },
    domain::{PayoutMethod, WithdrawalRequest},
    error::{AppError, Result},
    service::{commission_service::CommissionSummary, wallet_service::TransactionPage},
};

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Settled funds available for withdrawal.
    pub balance: i64,
    /// Accrued commissions not yet credited.
    pub pending: i64,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalBody {
    pub amount: i64,
    pub payment_method: String,
}

pub async fn balance(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<BalanceResponse>> {
    let balance = state
        .service_context
        .wallet_service
        .balance(user.beneficiary()?)
        .await?;

    Ok(Json(BalanceResponse {
        balance: balance.available,
        pending: balance.pending,
    }))
}

pub async fn transactions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<TransactionPage>> {
    let page = state
        .service_context
        .wallet_service
        .transactions(user.beneficiary()?, query.page, query.limit)
        .await?;

    Ok(Json(page))
}

pub async fn request_withdrawal(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
    ApiJson(body): ApiJson<WithdrawalBody>,
) -> Result<(StatusCode, Json<WithdrawalRequest>)> {
    let method = PayoutMethod::from_str(&body.payment_method)
        .ok_or_else(|| AppError::Validation(format!("Invalid payment method: {}", body.payment_method)))?;

    let request = state
        .service_context
        .wallet_service
        .request_withdrawal(user.beneficiary()?, body.amount, method)
        .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

pub async fn withdrawals(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<Vec<WithdrawalRequest>>> {
    let requests = state
        .service_context
        .wallet_service
        .withdrawals(user.beneficiary()?)
        .await?;

    Ok(Json(requests))
}

pub async fn commissions(
    State(state): State<AppState>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<CommissionSummary>> {
    let summary = state
        .service_context
        .commission_service
        .summary(user.beneficiary()?)
        .await?;

    Ok(Json(summary))
}
