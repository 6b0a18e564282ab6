use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use feira_api::middleware::auth::Claims;
use feira_api::state::{AppState, AuthConfig};
use feira_api::app;
use feira_catalog::pricing::{PricingConfig, PricingEngine};
use feira_catalog::product::{ProductSnapshot, StorefrontInfo};
use feira_catalog::shipping::ShippingOptions;
use feira_core::identity::{CallerProfile, Role};
use feira_core::payment::MockGateway;
use feira_order::checkout::CheckoutService;
use feira_order::repository::OrderStore;
use feira_order::tracking::PlainFormatter;
use feira_order::workflow::DeliveryWorkflow;
use feira_store::app_config::BusinessRules;
use feira_store::MemStore;

const TEST_SECRET: &str = "integration-test-secret";

struct Harness {
    app: Router,
    store: Arc<MemStore>,
    buyer: CallerProfile,
    seller: CallerProfile,
    courier: CallerProfile,
    store_id: Uuid,
    product_id: Uuid,
}

fn person(role: Role, name: &str) -> CallerProfile {
    CallerProfile {
        id: Uuid::new_v4(),
        role,
        full_name: name.to_string(),
        email: Some(format!("{}@example.com", name.to_lowercase().replace(' ', "."))),
        city_id: Some(1),
        district_id: None,
        street: Some("Rua das Flores".to_string()),
        number: Some("120".to_string()),
        landmark: None,
        whatsapp: Some("5511999990000".to_string()),
        is_available: false,
        pending_balance: dec!(0),
        payment_token: None,
    }
}

async fn harness() -> Harness {
    let store = Arc::new(MemStore::new());

    let mut seller = person(Role::Seller, "Seu Jorge");
    seller.payment_token = Some("tok_seller".to_string().into());
    let buyer = person(Role::Buyer, "Ana Souza");
    let mut courier = person(Role::Courier, "Carlos Lima");
    courier.is_available = true;

    let storefront = StorefrontInfo {
        id: Uuid::new_v4(),
        seller_id: seller.id,
        name: "Dona Rosa".to_string(),
        street: Some("Rua Central".to_string()),
        number: Some("45".to_string()),
        contracted_courier_id: None,
    };
    let product = ProductSnapshot {
        id: Uuid::new_v4(),
        name: "Guava jam".to_string(),
        unit_price: dec!(10.00),
        store_id: storefront.id,
        store_name: storefront.name.clone(),
        seller_id: seller.id,
        shipping: ShippingOptions::default(),
    };

    store.seed_user(seller.clone()).await;
    store.seed_user(buyer.clone()).await;
    store.seed_user(courier.clone()).await;
    store.seed_store(storefront.clone()).await;
    store.seed_product(product.clone(), 10).await;

    let business_rules = BusinessRules {
        marketplace_fee_rate: dec!(0.08),
        default_shipping_fee: dec!(5.00),
        code_retry_attempts: 3,
    };
    let pricing = Arc::new(PricingEngine::new(PricingConfig {
        fallback_shipping_fee: business_rules.default_shipping_fee,
    }));
    let checkout = Arc::new(CheckoutService::new(
        store.clone(),
        store.clone(),
        Arc::new(MockGateway::new()),
        store.clone(),
        pricing.clone(),
        business_rules.marketplace_fee_rate,
        business_rules.code_retry_attempts,
    ));
    let workflow = Arc::new(DeliveryWorkflow::new(
        store.clone(),
        store.clone(),
        Arc::new(PlainFormatter),
        business_rules.marketplace_fee_rate,
    ));

    let state = AppState {
        catalog: store.clone(),
        directory: store.clone(),
        pricing,
        checkout,
        workflow,
        business_rules,
        auth: AuthConfig {
            secret: TEST_SECRET.to_string(),
            expiration: 3600,
        },
    };

    Harness {
        app: app(state),
        store,
        buyer,
        seller,
        courier,
        store_id: storefront.id,
        product_id: product.id,
    }
}

fn token_for(profile: &CallerProfile) -> String {
    let claims = Claims {
        sub: profile.id.to_string(),
        role: profile.role.as_str().to_string(),
        exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn cart_body(product_id: Uuid, quantity: i32) -> Value {
    json!({ "items": [{ "product_id": product_id, "quantity": quantity }] })
}

/// Drive one order to `Processing` through the simulate route.
async fn place_simulated_order(h: &Harness) -> Uuid {
    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/orders/simulate",
        Some(&token_for(&h.buyer)),
        Some(cart_body(h.product_id, 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    Uuid::parse_str(body["order_id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_rejects_missing_invalid_and_wrong_role_tokens() {
    let h = harness().await;

    let (status, _) = send(&h.app, Method::GET, "/v1/orders/mine", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/orders/mine",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], json!(false));

    // seller token on a buyer route
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/orders/mine",
        Some(&token_for(&h.seller)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], json!("Access denied."));
}

#[tokio::test]
async fn test_cart_price_preview() {
    let h = harness().await;

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/cart/price",
        Some(&token_for(&h.buyer)),
        Some(cart_body(h.product_id, 2)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["items_subtotal"], json!("20.00"));
    assert_eq!(body["shipping_total"], json!("5.00"));
    assert_eq!(body["grand_total"], json!("25.00"));
    assert_eq!(body["store_count"], json!(1));
}

#[tokio::test]
async fn test_checkout_stages_payment_and_reserves_stock() {
    let h = harness().await;

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/orders",
        Some(&token_for(&h.buyer)),
        Some(cart_body(h.product_id, 2)),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["status"], json!("Pending Payment"));
    assert_eq!(body["total_amount"], json!("25.00"));
    assert!(body["init_point"].as_str().unwrap().starts_with("https://"));
    assert_eq!(h.store.stock_of(h.product_id).await, Some(8));
}

#[tokio::test]
async fn test_empty_cart_is_rejected() {
    let h = harness().await;

    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/orders",
        Some(&token_for(&h.buyer)),
        Some(json!({ "items": [] })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["message"], json!("Cart is empty."));
}

#[tokio::test]
async fn test_delivery_method_gating_and_validation() {
    let h = harness().await;
    let order_id = place_simulated_order(&h).await;

    // buyer cannot pick the delivery method
    let (status, _) = send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&token_for(&h.buyer)),
        Some(json!({ "method": "Marketplace" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // self-delivery goes through dispatch, not this route
    let (status, body) = send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&token_for(&h.seller)),
        Some(json!({ "method": "Seller" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid delivery method."));

    let (status, body) = send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&token_for(&h.seller)),
        Some(json!({ "method": "Marketplace" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
}

#[tokio::test]
async fn test_courier_sees_and_accepts_open_jobs() {
    let h = harness().await;
    let order_id = place_simulated_order(&h).await;
    send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&token_for(&h.seller)),
        Some(json!({ "method": "Marketplace" })),
    )
    .await;

    let courier_token = token_for(&h.courier);
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/delivery/available",
        Some(&courier_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["jobs"].as_array().unwrap().len(), 1);
    assert_eq!(body["jobs"][0]["store_name"], json!("Dona Rosa"));

    let (status, body) = send(
        &h.app,
        Method::POST,
        &format!("/v1/delivery/accept/{order_id}"),
        Some(&courier_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pickup_code"].as_str().unwrap().len(), 5);

    // now busy: the listing turns into an empty list plus a notice
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/delivery/available",
        Some(&courier_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["jobs"].as_array().unwrap().is_empty());
    assert!(body["message"].as_str().is_some());

    // and the run sheet shows the claimed order
    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/delivery/current",
        Some(&courier_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["delivery"]["order_id"],
        json!(order_id.to_string())
    );
    assert_eq!(body["delivery"]["store_address"], json!("Rua Central, 45"));
}

#[tokio::test]
async fn test_full_delivery_settles_the_seller() {
    let h = harness().await;
    let order_id = place_simulated_order(&h).await;
    let seller_token = token_for(&h.seller);
    let courier_token = token_for(&h.courier);

    send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&seller_token),
        Some(json!({ "method": "Marketplace" })),
    )
    .await;
    let (_, body) = send(
        &h.app,
        Method::POST,
        &format!("/v1/delivery/accept/{order_id}"),
        Some(&courier_token),
        None,
    )
    .await;
    let pickup_code = body["pickup_code"].as_str().unwrap().to_string();

    // wrong pickup code leaves the handoff open
    let (status, body) = send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/confirm-pickup"),
        Some(&seller_token),
        Some(json!({ "pickup_code": "WRONG" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], json!("Invalid pickup code."));

    let (status, _) = send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/confirm-pickup"),
        Some(&seller_token),
        Some(json!({ "pickup_code": pickup_code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let order = h.store.load_order(order_id).await.unwrap().unwrap();
    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/delivery/confirm",
        Some(&courier_token),
        Some(json!({
            "order_id": order_id,
            "confirmation_code": order.delivery_code,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["settlement"]["seller_earnings"], json!("23.00"));
    assert_eq!(body["settlement"]["marketplace_fee"], json!("2.00"));

    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/sellers/me/balance",
        Some(&seller_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pending_balance"], json!("23.00"));
    assert_eq!(body["marketplace_fee_rate"], json!("0.08"));

    // replaying the confirmation is opaque
    let (status, body) = send(
        &h.app,
        Method::POST,
        "/v1/delivery/confirm",
        Some(&courier_token),
        Some(json!({
            "order_id": order_id,
            "confirmation_code": order.delivery_code,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], json!("Invalid code or order."));
}

#[tokio::test]
async fn test_buyer_views_carry_the_code_store_views_do_not() {
    let h = harness().await;
    let order_id = place_simulated_order(&h).await;
    send(
        &h.app,
        Method::POST,
        &format!("/v1/orders/{order_id}/delivery-method"),
        Some(&token_for(&h.seller)),
        Some(json!({ "method": "Marketplace" })),
    )
    .await;

    let (status, body) = send(
        &h.app,
        Method::GET,
        "/v1/orders/mine",
        Some(&token_for(&h.buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let mine = &body["orders"][0];
    assert_eq!(mine["delivery_code"].as_str().unwrap().len(), 6);
    assert!(mine["tracking_message"].as_str().is_some());

    let (status, body) = send(
        &h.app,
        Method::GET,
        &format!("/v1/orders/store/{}", h.store_id),
        Some(&token_for(&h.seller)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let entry = &body["orders"][0];
    assert!(entry.get("delivery_code").is_none());
    assert_eq!(entry["status"], json!("Delivering"));

    let (status, body) = send(
        &h.app,
        Method::GET,
        &format!("/v1/orders/{order_id}/status"),
        Some(&token_for(&h.buyer)),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("Delivering"));
    assert_eq!(body["delivery_status"], json!("Requested"));
}
