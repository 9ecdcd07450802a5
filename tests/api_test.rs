mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use bazaar::{
    api::create_app,
    auth::{Role, TokenService},
    domain::OrderPaymentStatus,
};
use chrono::Duration;
use common::{captured_event, setup, TestApp};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

fn app_router(app: &TestApp) -> (Router, TokenService) {
    let tokens = TokenService::new(&app.settings.auth);
    let router = create_app(app.ctx.clone(), Arc::new(tokens.clone()), Arc::new(app.settings.clone()));
    (router, tokens)
}

fn bearer(tokens: &TokenService, subject: Uuid, role: Role) -> String {
    format!("Bearer {}", tokens.issue(subject, role, Duration::hours(1)).unwrap())
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, _) = app_router(&app);

    let (status, body) = send(&router, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn test_wallet_requires_earning_role() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);

    let (status, body) = send(&router, get("/api/wallet/balance", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = send(&router, get("/api/wallet/balance", Some("Bearer not-a-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let customer = bearer(&tokens, Uuid::new_v4(), Role::Customer);
    let (status, _) = send(&router, get("/api/wallet/balance", Some(&customer))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let seller = bearer(&tokens, Uuid::new_v4(), Role::Seller);
    let (status, body) = send(&router, get("/api/wallet/balance", Some(&seller))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "balance": 0, "pending": 0 }));
    Ok(())
}

#[tokio::test]
async fn test_checkout_over_http() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);
    let customer = Uuid::new_v4();
    let auth = bearer(&tokens, customer, Role::Customer);
    let order = app.create_order(customer, &[(Uuid::new_v4(), 50_000, 1)], None).await?;

    let (status, session) = send(
        &router,
        json_request("POST", "/api/checkout/orders", Some(&auth), json!({ "orderId": order.id })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(session["amountMinorUnits"], 50_000);
    assert_eq!(session["currency"], "INR");
    let gateway_order_id = session["gatewayOrderId"].as_str().unwrap_or_default().to_string();

    let checkout = app.gateway.complete_checkout(&gateway_order_id)?;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/api/checkout/verify",
            Some(&auth),
            json!({
                "orderId": order.id,
                "gatewayOrderId": gateway_order_id,
                "gatewayPaymentId": checkout.gateway_payment_id,
                "signature": "f".repeat(64),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/api/checkout/verify",
            Some(&auth),
            json!({
                "orderId": order.id,
                "gatewayOrderId": gateway_order_id,
                "gatewayPaymentId": checkout.gateway_payment_id,
                "signature": checkout.signature,
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["orderId"], order.id.to_string());
    assert_eq!(body["alreadyCaptured"], false);

    let other = bearer(&tokens, Uuid::new_v4(), Role::Customer);
    let (status, _) = send(
        &router,
        json_request("POST", "/api/checkout/orders", Some(&other), json!({ "orderId": order.id })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &router,
        json_request("POST", "/api/checkout/orders", Some(&auth), json!({ "orderId": Uuid::new_v4() })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_webhook_endpoint_signature() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, _) = app_router(&app);
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 10_000, 1)], None).await?;
    let (_, checkout) = app.start_checkout(&order).await?;
    let body = captured_event(&checkout.gateway_order_id, &checkout.gateway_payment_id, 10_000, Some(order.id));

    let request = Request::builder()
        .method("POST")
        .uri("/api/webhooks/gateway")
        .header(header::CONTENT_TYPE, "application/json")
        .header("x-razorpay-signature", "00")
        .body(Body::from(body.clone()))?;
    let (status, response) = send(&router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["success"], false);

    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/api/webhooks/gateway")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-razorpay-signature", app.sign_webhook(&body))
            .body(Body::from(body.clone()))?;
        let (status, response) = send(&router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response, json!({ "success": true }));
    }

    assert_eq!(app.count("payments").await?, 1);
    Ok(())
}

#[tokio::test]
async fn test_withdrawal_flow_over_http() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);
    let seller = Uuid::new_v4();
    let seller_auth = bearer(&tokens, seller, Role::Seller);
    let admin_auth = bearer(&tokens, Uuid::new_v4(), Role::Admin);
    app.fund_seller(seller, 20_000).await?;

    let (status, _) = send(
        &router,
        json_request("POST", "/api/wallet/withdrawals", Some(&seller_auth), json!({ "amount": 50_000, "paymentMethod": "upi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &router,
        json_request("POST", "/api/wallet/withdrawals", Some(&seller_auth), json!({ "amount": 1_000, "paymentMethod": "cheque" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, created) = send(
        &router,
        json_request("POST", "/api/wallet/withdrawals", Some(&seller_auth), json!({ "amount": 10_000, "paymentMethod": "bank_transfer" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "Pending");
    let id = created["id"].as_str().unwrap_or_default().to_string();

    // Sellers cannot approve their own withdrawals
    let uri = format!("/api/admin/withdrawals/{}/approve", id);
    let (status, _) = send(&router, json_request("POST", &uri, Some(&seller_auth), json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, pending) = send(&router, get("/api/admin/withdrawals?status=Pending", Some(&admin_auth))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pending.as_array().map(|a| a.len()), Some(1));

    let (status, approved) = send(&router, json_request("POST", &uri, Some(&admin_auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(approved["withdrawal"]["status"], "Completed");
    assert_eq!(approved["transaction"]["amount"], 10_000);

    let (status, again) = send(&router, json_request("POST", &uri, Some(&admin_auth), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(again["success"], false);

    let (_, balance) = send(&router, get("/api/wallet/balance", Some(&seller_auth))).await;
    assert_eq!(balance["balance"], 8_000);

    let (_, history) = send(&router, get("/api/wallet/transactions?page=1&limit=10", Some(&seller_auth))).await;
    assert_eq!(history["total"], 2);
    assert_eq!(history["limit"], 10);

    let (_, summary) = send(&router, get("/api/wallet/commissions", Some(&seller_auth))).await;
    assert_eq!(summary["total"], 18_000);
    assert_eq!(summary["paid"], 18_000);
    assert_eq!(summary["commissions"].as_array().map(|a| a.len()), Some(1));
    Ok(())
}

#[tokio::test]
async fn test_admin_refund_over_http() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);
    let admin_auth = bearer(&tokens, Uuid::new_v4(), Role::Admin);
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 50_000, 1)], None).await?;
    let payment = app.pay(&order).await?;

    let uri = format!("/api/admin/payments/{}/refund", payment.id);
    let (status, refunded) = send(&router, json_request("POST", &uri, Some(&admin_auth), json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "Refunded");
    assert_eq!(refunded["refundAmount"], 50_000);

    let (status, _) = send(&router, json_request("POST", &uri, Some(&admin_auth), json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn test_malformed_bodies_get_json_400() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);
    let customer = Uuid::new_v4();
    let customer_auth = bearer(&tokens, customer, Role::Customer);
    let seller_auth = bearer(&tokens, Uuid::new_v4(), Role::Seller);
    let admin_auth = bearer(&tokens, Uuid::new_v4(), Role::Admin);
    let order = app.create_order(customer, &[(Uuid::new_v4(), 10_000, 1)], None).await?;

    let (status, body) = send(
        &router,
        json_request(
            "POST",
            "/api/checkout/verify",
            Some(&customer_auth),
            json!({ "orderId": order.id, "gatewayOrderId": "order_x", "gatewayPaymentId": "pay_x" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap_or_default().contains("signature"));

    let (status, body) = send(
        &router,
        json_request("POST", "/api/wallet/withdrawals", Some(&seller_auth), json!({ "amount": 10.5, "paymentMethod": "upi" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(&router, get("/api/wallet/transactions?page=first", Some(&seller_auth))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = send(
        &router,
        json_request("POST", "/api/admin/payments/not-a-uuid/refund", Some(&admin_auth), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn test_refund_body_is_optional_but_checked() -> anyhow::Result<()> {
    let app = setup().await?;
    let (router, tokens) = app_router(&app);
    let admin_auth = bearer(&tokens, Uuid::new_v4(), Role::Admin);
    let order = app.create_order(Uuid::new_v4(), &[(Uuid::new_v4(), 30_000, 1)], None).await?;
    let payment = app.pay(&order).await?;
    let uri = format!("/api/admin/payments/{}/refund", payment.id);

    // A garbled amount must not fall back to a full refund
    let (status, body) = send(&router, json_request("POST", &uri, Some(&admin_auth), json!({ "amount": "lots" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(app.order(order.id).await?.payment_status, OrderPaymentStatus::Paid);

    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header(header::AUTHORIZATION, &admin_auth)
        .body(Body::empty())?;
    let (status, refunded) = send(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["refundAmount"], 30_000);
    Ok(())
}
