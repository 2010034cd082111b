//! Tests for the payment leg: redirect construction, callback
//! authentication, settlement, and duplicate-delivery safety.

mod common;

use std::collections::HashMap;

use assert_matches::assert_matches;
use common::TestApp;
use rust_decimal_macros::dec;
use uuid::Uuid;

use orderflow::entities::{Order, OrderStatus, PaymentMethod, PaymentStatus};
use orderflow::errors::ServiceError;
use orderflow::gateway::signature::{self, SIGNATURE_FIELD};
use orderflow::services::orders::{CreateOrderItemRequest, CreateOrderRequest};
use orderflow::services::payments::PaymentRequest;

async fn gateway_order(app: &TestApp, qty: i32) -> (Order, Uuid) {
    let owner = Uuid::new_v4();
    let product = app.seed_product("widget", dec!(10.00), 5).await;
    let order = app
        .orders
        .create_order(
            CreateOrderRequest {
                items: vec![CreateOrderItemRequest {
                    product_id: product.id,
                    quantity: qty,
                }],
                shipping_address: "12 Main St, Springfield".to_string(),
                phone: "0123456789".to_string(),
                payment_method: PaymentMethod::Gateway,
            },
            owner,
        )
        .await
        .unwrap();
    (order, product.id)
}

/// A callback as the gateway would send it: response fields signed with the
/// shared secret.
fn signed_callback(app: &TestApp, order: &Order, response_code: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    params.insert("vnp_TxnRef".to_string(), order.tracking_number.clone());
    params.insert("vnp_ResponseCode".to_string(), response_code.to_string());
    params.insert("vnp_TmnCode".to_string(), app.gateway.merchant_code.clone());
    params.insert("vnp_Amount".to_string(), "5000".to_string());
    let sig = signature::sign(&params, &app.gateway.hash_secret);
    params.insert(SIGNATURE_FIELD.to_string(), sig);
    params
}

// ==================== Redirect construction ====================

#[tokio::test]
async fn gateway_payment_builds_a_signed_redirect() {
    let app = TestApp::new();
    let (order, _) = gateway_order(&app, 5).await;

    let response = app
        .payments
        .process_payment(PaymentRequest {
            order_id: order.id,
            amount: order.total,
            payment_method: PaymentMethod::Gateway,
            client_ip: Some("203.0.113.9".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(response.status, PaymentStatus::Pending);
    assert_eq!(response.transaction_id, order.tracking_number);

    let url = response.payment_url.expect("gateway redirect");
    let (base, query) = url.split_once('?').expect("query string");
    assert_eq!(base, app.gateway.base_url);

    // Decode the query back into a parameter map; the signature over the
    // remaining fields must verify with the shared secret.
    let params: HashMap<String, String> = url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    assert_eq!(params["vnp_TxnRef"], order.tracking_number);
    assert_eq!(params["vnp_Amount"], "5000"); // 50.00 in minor units
    assert_eq!(params["vnp_CurrCode"], app.gateway.currency_code);
    assert_eq!(params["vnp_TmnCode"], app.gateway.merchant_code);
    assert_eq!(params["vnp_IpAddr"], "203.0.113.9");
    assert_eq!(params["vnp_CreateDate"].len(), 14);
    assert_eq!(params["vnp_ExpireDate"].len(), 14);
    assert!(params.contains_key(SIGNATURE_FIELD));
    assert!(signature::verify(&params, &app.gateway.hash_secret));

    // The signature is appended last, after the sorted query.
    assert!(url.contains(&format!("&{}=", SIGNATURE_FIELD)));
}

#[tokio::test]
async fn amount_mismatch_fails_before_any_request_is_built() {
    let app = TestApp::new();
    let (order, _) = gateway_order(&app, 5).await;

    let err = app
        .payments
        .process_payment(PaymentRequest {
            order_id: order.id,
            amount: order.total + dec!(0.01),
            payment_method: PaymentMethod::Gateway,
            client_ip: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::PaymentFailed(_));
}

#[tokio::test]
async fn payment_for_unknown_order_is_not_found() {
    let app = TestApp::new();
    let err = app
        .payments
        .process_payment(PaymentRequest {
            order_id: Uuid::new_v4(),
            amount: dec!(1.00),
            payment_method: PaymentMethod::Gateway,
            client_ip: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn cod_payment_settles_later_with_no_redirect() {
    let app = TestApp::new();
    let (order, _) = gateway_order(&app, 5).await;

    let response = app
        .payments
        .process_payment(PaymentRequest {
            order_id: order.id,
            amount: order.total,
            payment_method: PaymentMethod::Cod,
            client_ip: None,
        })
        .await
        .unwrap();

    assert_eq!(response.status, PaymentStatus::Pending);
    assert!(response.payment_url.is_none());
    assert!(response.message.is_some());
}

// ==================== Callback handling ====================

#[tokio::test]
async fn authenticated_success_callback_settles_the_order() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;

    let outcome = app
        .payments
        .handle_callback(&signed_callback(&app, &order, "00"))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(outcome.order_id, order.id);
    assert_eq!(outcome.redirect_url, app.gateway.success_redirect_url);

    let settled = app.order_by_id(order.id).await;
    assert_eq!(settled.status, OrderStatus::Processing);
    assert_eq!(settled.payment_status, PaymentStatus::Paid);
    // Settled orders keep their reservation.
    assert_eq!(app.stock_of(product_id).await, 0);
}

#[tokio::test]
async fn authenticated_failure_code_cancels_and_releases_stock() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;

    let outcome = app
        .payments
        .handle_callback(&signed_callback(&app, &order, "24"))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert_eq!(outcome.redirect_url, app.gateway.failure_redirect_url);

    let cancelled = app.order_by_id(order.id).await;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(cancelled.payment_status, PaymentStatus::Cancelled);
    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn tampered_response_code_fails_verification_and_cancels() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;

    // Signed as a failure, then flipped to success in transit: the response
    // code is part of the signed set, so verification must fail and the
    // reported "00" must not be trusted.
    let mut params = signed_callback(&app, &order, "24");
    params.insert("vnp_ResponseCode".to_string(), "00".to_string());

    let outcome = app.payments.handle_callback(&params).await.unwrap();
    assert!(!outcome.accepted);
    assert_eq!(outcome.redirect_url, app.gateway.failure_redirect_url);

    let cancelled = app.order_by_id(order.id).await;
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn missing_signature_fails_closed() {
    let app = TestApp::new();
    let (order, _) = gateway_order(&app, 5).await;

    let mut params = signed_callback(&app, &order, "00");
    params.remove(SIGNATURE_FIELD);

    let outcome = app.payments.handle_callback(&params).await.unwrap();
    assert!(!outcome.accepted);
    assert_eq!(
        app.order_by_id(order.id).await.status,
        OrderStatus::Cancelled
    );
}

#[tokio::test]
async fn duplicate_success_callbacks_are_idempotent() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;
    let params = signed_callback(&app, &order, "00");

    let first = app.payments.handle_callback(&params).await.unwrap();
    let second = app.payments.handle_callback(&params).await.unwrap();

    assert!(first.accepted);
    assert!(second.accepted);
    assert_eq!(
        app.order_by_id(order.id).await.status,
        OrderStatus::Processing
    );
    assert_eq!(app.stock_of(product_id).await, 0);
}

#[tokio::test]
async fn duplicate_failure_callbacks_do_not_double_release() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;
    let params = signed_callback(&app, &order, "24");

    app.payments.handle_callback(&params).await.unwrap();
    app.payments.handle_callback(&params).await.unwrap();

    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn late_success_after_cancellation_leaves_the_order_cancelled() {
    let app = TestApp::new();
    let (order, product_id) = gateway_order(&app, 5).await;

    app.payments
        .handle_callback(&signed_callback(&app, &order, "24"))
        .await
        .unwrap();

    // Gateway retries with a success report for an order that is already
    // terminally cancelled: the state graph has no such edge.
    let outcome = app
        .payments
        .handle_callback(&signed_callback(&app, &order, "00"))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert_eq!(
        app.order_by_id(order.id).await.status,
        OrderStatus::Cancelled
    );
    assert_eq!(app.stock_of(product_id).await, 5);
}

#[tokio::test]
async fn callback_for_unknown_tracking_number_is_not_found() {
    let app = TestApp::new();
    let mut params = HashMap::new();
    params.insert("vnp_TxnRef".to_string(), "TXN_GATEWAY_0_NOPE".to_string());

    let err = app.payments.handle_callback(&params).await.unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}

#[tokio::test]
async fn callback_without_transaction_reference_is_rejected() {
    let app = TestApp::new();
    let err = app
        .payments
        .handle_callback(&HashMap::new())
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}
