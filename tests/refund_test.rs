mod common;

use bazaar::{
    domain::{Beneficiary, CommissionStatus, OrderPaymentStatus, PaymentStatus, TransactionType},
    error::AppError,
    repository::{CommissionRepository, PaymentRepository},
};
use common::setup;
use uuid::Uuid;

#[tokio::test]
async fn test_full_refund_by_default_and_only_once() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 50_000, 1)], None).await?;
    let payment = app.pay(&order).await?;

    let refunded = app
        .ctx
        .refund_service
        .refund(payment.id, None, Some("Damaged in transit".to_string()))
        .await?;

    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_amount, Some(50_000));
    assert_eq!(refunded.refund_reason.as_deref(), Some("Damaged in transit"));
    assert!(refunded.refunded_at.is_some());
    assert!(refunded.gateway_refund_id.is_some());
    assert_eq!(app.order(order.id).await?.payment_status, OrderPaymentStatus::Refunded);

    let gateway_refunds = app.gateway.refunds()?;
    assert_eq!(gateway_refunds.len(), 1);
    assert_eq!(gateway_refunds[0].amount, 50_000);

    let again = app.ctx.refund_service.refund(payment.id, None, None).await;
    assert!(matches!(again, Err(AppError::InvalidState(_))));
    assert_eq!(app.gateway.refunds()?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_refund_reverses_settled_commissions() -> anyhow::Result<()> {
    let app = setup().await?;
    let seller = Uuid::new_v4();
    let partner = Uuid::new_v4();
    let order = app.create_order(Uuid::new_v4(), &[(seller, 40_000, 1)], Some(partner)).await?;
    let payment = app.pay(&order).await?;
    app.ctx.commission_service.accrue_for_order(order.id).await?;
    app.ctx.commission_service.settle_order(order.id).await?;

    assert_eq!(app.available(Beneficiary::seller(seller)).await?, 36_000);
    assert_eq!(app.available(Beneficiary::delivery_partner(partner)).await?, 2_000);

    app.ctx.refund_service.refund(payment.id, None, None).await?;

    assert_eq!(app.available(Beneficiary::seller(seller)).await?, 0);
    assert_eq!(app.available(Beneficiary::delivery_partner(partner)).await?, 0);

    // Commission rows are not rewritten; the ledger carries the reversal
    let commissions = app.ctx.commission_repo.list_by_order(order.id).await?;
    assert!(commissions.iter().all(|c| c.status == CommissionStatus::Paid));
    assert_eq!(commissions.iter().find(|c| c.beneficiary_id == seller).map(|c| c.net_amount), Some(36_000));

    let history = app
        .ctx
        .wallet_service
        .transactions(Beneficiary::seller(seller), None, None)
        .await?;
    assert_eq!(history.total, 2);
    assert_eq!(history.transactions[0].txn_type, TransactionType::Debit);
    assert_eq!(history.transactions[0].amount, 36_000);
    Ok(())
}

#[tokio::test]
async fn test_partial_refund_of_unsettled_commissions() -> anyhow::Result<()> {
    let app = setup().await?;
    let seller = Uuid::new_v4();
    let order = app.create_order(Uuid::new_v4(), &[(seller, 50_000, 1)], None).await?;
    let payment = app.pay(&order).await?;
    app.ctx.commission_service.accrue_for_order(order.id).await?;

    let refunded = app.ctx.refund_service.refund(payment.id, Some(20_000), None).await?;
    assert_eq!(refunded.refund_amount, Some(20_000));

    // Pending 45_000 is credited, then 45_000 * 20_000 / 50_000 is taken back
    let balance = app.ctx.wallet_service.balance(Beneficiary::seller(seller)).await?;
    assert_eq!(balance.available, 27_000);
    assert_eq!(balance.pending, 0);

    // Settlement after the refund has nothing left to credit
    assert!(app.ctx.commission_service.settle_order(order.id).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_refund_preconditions() -> anyhow::Result<()> {
    let app = setup().await?;

    let result = app.ctx.refund_service.refund(Uuid::new_v4(), None, None).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    // Checkout opened but never paid: nothing at the gateway to refund
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 10_000, 1)], None).await?;
    let (session, _) = app.start_checkout(&order).await?;
    let pending = app
        .ctx
        .payment_repo
        .find_by_gateway_order_id(&session.gateway_order_id)
        .await?
        .expect("pending payment");
    let result = app.ctx.refund_service.refund(pending.id, None, None).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));

    let payment = app.pay(&app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 10_000, 1)], None).await?).await?;
    for amount in [0, -1, 10_001] {
        let result = app.ctx.refund_service.refund(payment.id, Some(amount), None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
    assert!(app.gateway.refunds()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_gateway_refund_failure_leaves_payment_captured() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 10_000, 1)], None).await?;
    let payment = app.pay(&order).await?;

    app.gateway.fail_next("refund declined")?;
    let result = app.ctx.refund_service.refund(payment.id, None, None).await;
    assert!(matches!(result, Err(AppError::Gateway(_))));

    let stored = app.ctx.payment_repo.find_by_id(payment.id).await?.expect("payment");
    assert_eq!(stored.status, PaymentStatus::Completed);
    assert_eq!(app.order(order.id).await?.payment_status, OrderPaymentStatus::Paid);
    Ok(())
}

#[tokio::test]
async fn test_refund_webhook_after_refund_is_duplicate() -> anyhow::Result<()> {
    let app = setup().await?;
    let seller = Uuid::new_v4();
    let order = app.create_order(Uuid::new_v4(), &[(seller, 10_000, 1)], None).await?;
    let payment = app.pay(&order).await?;
    app.ctx.commission_service.accrue_for_order(order.id).await?;

    let refunded = app.ctx.refund_service.refund(payment.id, None, None).await?;
    let body = common::refund_event(
        payment.gateway_payment_id.as_deref().unwrap_or_default(),
        refunded.gateway_refund_id.as_deref().unwrap_or_default(),
        10_000,
    );
    assert_eq!(
        app.deliver(&body).await?,
        bazaar::service::webhook_service::WebhookOutcome::Duplicate
    );
    assert_eq!(app.available(Beneficiary::seller(seller)).await?, 0);
    Ok(())
}
