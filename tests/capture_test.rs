mod common;

use bazaar::{
    domain::{CaptureOutcome, OrderPaymentStatus, OrderStatus, PaymentStatus},
    error::AppError,
    repository::{outbox_repository::TaskStatus, OutboxRepository, PaymentRepository, TaskKind},
};
use common::{setup, setup_on_disk};
use uuid::Uuid;

#[tokio::test]
async fn test_capture_marks_order_paid_and_queues_accrual() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 50_000, 1)], None).await?;

    let (session, checkout) = app.start_checkout(&order).await?;
    assert_eq!(session.amount_minor_units, 50_000);
    assert_eq!(session.publishable_key, "rzp_test_sandbox");

    let outcome = app
        .ctx
        .capture_service
        .verify_and_capture(order.customer_id, app.verify_request(&order, &checkout))
        .await?;
    let payment = match outcome {
        CaptureOutcome::Captured(p) => p,
        other => panic!("expected capture, got {:?}", other),
    };

    assert_eq!(payment.status, PaymentStatus::Completed);
    assert!(payment.paid_at.is_some());
    assert_eq!(payment.gateway_payment_id.as_deref(), Some(checkout.gateway_payment_id.as_str()));

    let order = app.order(order.id).await?;
    assert_eq!(order.payment_status, OrderPaymentStatus::Paid);
    assert_eq!(order.status, OrderStatus::Received);

    let task = app
        .ctx
        .outbox_repo
        .find_for_order(TaskKind::CommissionAccrual, order.id)
        .await?
        .expect("accrual task written with the capture");
    assert_eq!(task.status, TaskStatus::Pending);

    // Accrual is decoupled: nothing exists until the worker runs
    assert_eq!(app.commission_count(order.id).await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_tampered_signature_changes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 50_000, 1)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;

    let mut request = app.verify_request(&order, &checkout);
    request.signature = "0".repeat(64);

    let result = app.ctx.capture_service.verify_and_capture(order.customer_id, request).await;
    assert!(matches!(result, Err(AppError::InvalidSignature)));

    let payments = app.ctx.payment_repo.list_by_order(order.id).await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].status, PaymentStatus::Pending);
    assert_eq!(app.order(order.id).await?.payment_status, OrderPaymentStatus::Pending);
    assert_eq!(app.count("outbox_tasks").await?, 0);
    Ok(())
}

#[tokio::test]
async fn test_signature_for_another_payment_rejected() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 10_000, 1)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;

    let mut request = app.verify_request(&order, &checkout);
    request.gateway_payment_id = "pay_someone_else".to_string();

    let result = app.ctx.capture_service.verify_and_capture(order.customer_id, request).await;
    assert!(matches!(result, Err(AppError::InvalidSignature)));
    Ok(())
}

#[tokio::test]
async fn test_repeated_verify_is_idempotent() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 50_000, 1)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;

    let first = app
        .ctx
        .capture_service
        .verify_and_capture(order.customer_id, app.verify_request(&order, &checkout))
        .await?;
    let second = app
        .ctx
        .capture_service
        .verify_and_capture(order.customer_id, app.verify_request(&order, &checkout))
        .await?;

    assert!(matches!(first, CaptureOutcome::Captured(_)));
    assert!(matches!(second, CaptureOutcome::AlreadyCaptured(_)));
    assert_eq!(first.payment().id, second.payment().id);

    let completed = app
        .ctx
        .payment_repo
        .list_by_order(order.id)
        .await?
        .into_iter()
        .filter(|p| p.status == PaymentStatus::Completed)
        .count();
    assert_eq!(completed, 1);
    assert_eq!(app.count("outbox_tasks").await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_verify_has_one_winner() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 20_000, 2)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;

    let capture = app.ctx.capture_service.clone();
    let (a, b) = tokio::join!(
        capture.verify_and_capture(order.customer_id, app.verify_request(&order, &checkout)),
        capture.verify_and_capture(order.customer_id, app.verify_request(&order, &checkout)),
    );
    let (a, b) = (a?, b?);

    let captured = [&a, &b]
        .iter()
        .filter(|o| matches!(o, CaptureOutcome::Captured(_)))
        .count();
    assert_eq!(captured, 1);
    assert_eq!(a.payment().id, b.payment().id);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_verify_across_connections() -> anyhow::Result<()> {
    let app = setup_on_disk().await?;
    let mut racers = Vec::new();
    let mut orders = Vec::new();

    for _ in 0..10 {
        let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 7_500, 1)], None).await?;
        let (_, checkout) = app.start_checkout(&order).await?;
        for _ in 0..4 {
            let capture = app.ctx.capture_service.clone();
            let request = app.verify_request(&order, &checkout);
            let customer = order.customer_id;
            racers.push(tokio::spawn(async move { capture.verify_and_capture(customer, request).await }));
        }
        orders.push(order);
    }

    let (mut captured, mut already) = (0, 0);
    for racer in racers {
        match racer.await?? {
            CaptureOutcome::Captured(_) => captured += 1,
            CaptureOutcome::AlreadyCaptured(_) => already += 1,
        }
    }
    assert_eq!(captured, 10);
    assert_eq!(already, 30);

    for order in &orders {
        let completed = app
            .ctx
            .payment_repo
            .list_by_order(order.id)
            .await?
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Completed)
            .count();
        assert_eq!(completed, 1);
        assert_eq!(app.order(order.id).await?.payment_status, OrderPaymentStatus::Paid);
    }
    assert_eq!(app.count("outbox_tasks").await?, 10);
    Ok(())
}

#[tokio::test]
async fn test_second_gateway_order_cannot_pay_twice() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 5_000, 1)], None).await?;

    // Customer opened checkout twice before paying either
    let (_, first) = app.start_checkout(&order).await?;
    let (_, second) = app.start_checkout(&order).await?;

    app.ctx
        .capture_service
        .verify_and_capture(order.customer_id, app.verify_request(&order, &first))
        .await?;
    let result = app
        .ctx
        .capture_service
        .verify_and_capture(order.customer_id, app.verify_request(&order, &second))
        .await;

    assert!(matches!(result, Err(AppError::InvalidState(_))));
    Ok(())
}

#[tokio::test]
async fn test_ownership_and_existence_checks() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 5_000, 1)], None).await?;

    let stranger = Uuid::new_v4();
    let result = app.ctx.capture_service.create_gateway_order(order.id, stranger).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));

    let result = app.ctx.capture_service.create_gateway_order(Uuid::new_v4(), stranger).await;
    assert!(matches!(result, Err(AppError::NotFound(_))));

    let (_, checkout) = app.start_checkout(&order).await?;
    let result = app
        .ctx
        .capture_service
        .verify_and_capture(stranger, app.verify_request(&order, &checkout))
        .await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
    Ok(())
}

#[tokio::test]
async fn test_paid_order_cannot_open_checkout() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 5_000, 1)], None).await?;
    app.pay(&order).await?;

    let result = app.ctx.capture_service.create_gateway_order(order.id, order.customer_id).await;
    assert!(matches!(result, Err(AppError::InvalidState(_))));
    Ok(())
}

#[tokio::test]
async fn test_gateway_failure_writes_nothing() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 5_000, 1)], None).await?;

    app.gateway.fail_next("gateway timed out")?;
    let result = app.ctx.capture_service.create_gateway_order(order.id, order.customer_id).await;
    assert!(matches!(result, Err(AppError::Gateway(_))));
    assert!(app.ctx.payment_repo.list_by_order(order.id).await?.is_empty());

    // Retrying after the outage works normally
    app.pay(&order).await?;
    Ok(())
}

#[tokio::test]
async fn test_missing_fields_are_validation_errors() -> anyhow::Result<()> {
    let app = setup().await?;
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 5_000, 1)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;

    let mut request = app.verify_request(&order, &checkout);
    request.gateway_payment_id = String::new();

    let result = app.ctx.capture_service.verify_and_capture(order.customer_id, request).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    Ok(())
}
