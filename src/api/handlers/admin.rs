use axum::{
    extract::State,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{
        extract::{ApiJson, ApiPath, ApiQuery, OptionalJson},
        state::AppState,
    },
    domain::{ApprovalOutcome, Commission, Payment, PaymentDiscrepancy, WalletTransaction, WithdrawalRequest, WithdrawalStatus},
    error::{AppError, Result},
    repository::PaymentRepository,
    service::wallet_service::paging,
};

#[derive(Debug, Deserialize)]
pub struct WithdrawalQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ApproveBody {
    pub remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RejectBody {
    pub remarks: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundBody {
    pub amount: Option<i64>,
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApprovalResponse {
    pub withdrawal: WithdrawalRequest,
    pub transaction: Option<WalletTransaction>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn list_withdrawals(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<WithdrawalQuery>,
) -> Result<Json<Vec<WithdrawalRequest>>> {
    let status = query
        .status
        .as_deref()
        .map(|s| {
            WithdrawalStatus::from_str(s)
                .ok_or_else(|| AppError::Validation(format!("Unknown withdrawal status: {}", s)))
        })
        .transpose()?;

    let requests = state
        .service_context
        .wallet_service
        .withdrawals_by_status(status, query.page, query.limit)
        .await?;

    Ok(Json(requests))
}

pub async fn approve_withdrawal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<ApproveBody>,
) -> Result<Json<ApprovalResponse>> {
    let remarks = body.remarks;

    let response = match state.service_context.wallet_service.approve_withdrawal(id, remarks).await? {
        ApprovalOutcome::Completed { request, transaction } => ApprovalResponse {
            withdrawal: request,
            transaction: Some(transaction),
        },
        ApprovalOutcome::Rejected(request) => ApprovalResponse {
            withdrawal: request,
            transaction: None,
        },
    };

    Ok(Json(response))
}

pub async fn reject_withdrawal(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<RejectBody>,
) -> Result<Json<WithdrawalRequest>> {
    let request = state
        .service_context
        .wallet_service
        .reject_withdrawal(id, body.remarks)
        .await?;

    Ok(Json(request))
}

pub async fn refund_payment(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<RefundBody>,
) -> Result<Json<Payment>> {
    let payment = state
        .service_context
        .refund_service
        .refund(id, body.amount, body.reason)
        .await?;

    Ok(Json(payment))
}

/// Runs accrual now instead of waiting for the outbox worker.
pub async fn accrue_order(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<Vec<Commission>>> {
    let commissions = state
        .service_context
        .commission_service
        .accrue_for_order(order_id)
        .await?;

    Ok(Json(commissions))
}

pub async fn settle_order(
    State(state): State<AppState>,
    ApiPath(order_id): ApiPath<Uuid>,
) -> Result<Json<Vec<WalletTransaction>>> {
    let credited = state
        .service_context
        .commission_service
        .settle_order(order_id)
        .await?;

    Ok(Json(credited))
}

pub async fn discrepancies(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<PageQuery>,
) -> Result<Json<Vec<PaymentDiscrepancy>>> {
    let (_, limit, offset) = paging(query.page, query.limit);
    let discrepancies = state
        .service_context
        .payment_repo
        .list_discrepancies(limit, offset)
        .await?;

    Ok(Json(discrepancies))
}
