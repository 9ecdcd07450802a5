use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::*,
    error::{AppError, Result},
    repository::WalletRepository,
};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct TransactionPage {
    pub transactions: Vec<WalletTransaction>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

/// Clamps 1-based paging input and returns `(page, limit, offset)`.
pub fn paging(page: Option<i64>, limit: Option<i64>) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit, (page - 1) * limit)
}

pub struct WalletService {
    wallet_repo: Arc<dyn WalletRepository>,
}

impl WalletService {
    pub fn new(wallet_repo: Arc<dyn WalletRepository>) -> Self {
        Self { wallet_repo }
    }

    pub async fn balance(&self, beneficiary: Beneficiary) -> Result<WalletBalance> {
        self.wallet_repo.balance(beneficiary).await
    }

    pub async fn transactions(
        &self,
        beneficiary: Beneficiary,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<TransactionPage> {
        let (page, limit, offset) = paging(page, limit);
        let transactions = self.wallet_repo.list_transactions(beneficiary, limit, offset).await?;
        let total = self.wallet_repo.count_transactions(beneficiary).await?;

        Ok(TransactionPage {
            transactions,
            page,
            limit,
            total,
        })
    }

    pub async fn request_withdrawal(
        &self,
        beneficiary: Beneficiary,
        amount: i64,
        payment_method: PayoutMethod,
    ) -> Result<WithdrawalRequest> {
        if amount <= 0 {
            return Err(AppError::Validation("Invalid amount".to_string()));
        }

        let request = self
            .wallet_repo
            .create_withdrawal(NewWithdrawal {
                beneficiary,
                amount,
                payment_method,
            })
            .await?;

        tracing::info!(
            withdrawal_id = %request.id,
            beneficiary_id = %beneficiary.id,
            amount,
            "Withdrawal requested"
        );
        Ok(request)
    }

    pub async fn withdrawals(&self, beneficiary: Beneficiary) -> Result<Vec<WithdrawalRequest>> {
        self.wallet_repo.list_withdrawals(beneficiary).await
    }

    pub async fn withdrawals_by_status(
        &self,
        status: Option<WithdrawalStatus>,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<WithdrawalRequest>> {
        let (_, limit, offset) = paging(page, limit);
        self.wallet_repo.list_withdrawals_by_status(status, limit, offset).await
    }

    pub async fn approve_withdrawal(&self, id: Uuid, remarks: Option<String>) -> Result<ApprovalOutcome> {
        let outcome = self.wallet_repo.approve_withdrawal(id, remarks).await?;

        match &outcome {
            ApprovalOutcome::Completed { request, transaction } => tracing::info!(
                withdrawal_id = %request.id,
                transaction_id = %transaction.id,
                amount = request.amount,
                "Withdrawal completed"
            ),
            ApprovalOutcome::Rejected(request) => tracing::warn!(
                withdrawal_id = %request.id,
                amount = request.amount,
                "Withdrawal rejected at approval: insufficient balance"
            ),
        }

        Ok(outcome)
    }

    pub async fn reject_withdrawal(&self, id: Uuid, remarks: String) -> Result<WithdrawalRequest> {
        if remarks.trim().is_empty() {
            return Err(AppError::Validation("Remarks are required to reject a withdrawal".to_string()));
        }
        self.wallet_repo.reject_withdrawal(id, remarks).await
    }
}
