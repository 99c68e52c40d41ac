mod common;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use storefront_api::{
    dto::{
        admin::{InventoryAdjustRequest, LowStockQuery, UpdateOrderStatusRequest},
        cart::{AddToCartRequest, GuestCartLine, MergeCartRequest, UpdateCartItemRequest},
        coupons::{CreateCouponRequest, ValidateCouponRequest},
        orders::{CheckoutRequest, PayOrderRequest},
    },
    entity::{Coupons, Products, coupons::ActiveModel as CouponActive},
    error::AppError,
    pricing::ShippingMethod,
    services::{admin_service, cart_service, coupon_service, order_service},
};
use uuid::Uuid;

use common::{create_product, create_user, database_url, setup_state};

// Every scenario truncates the tables, so they run one after another.
#[tokio::test]
async fn order_flows() -> anyhow::Result<()> {
    let Some(database_url) = database_url() else {
        return Ok(());
    };
    checkout_with_coupon_pay_ship_and_cancel(&database_url).await?;
    stock_payment_and_coupon_release(&database_url).await?;
    duplicate_inserts_map_to_conflict(&database_url).await?;
    Ok(())
}

// Customer merges a guest cart, checks out with a coupon and pays; admin ships,
// sees low stock; a second order is cancelled and its stock comes back.
async fn checkout_with_coupon_pay_ship_and_cancel(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let customer = create_user(&state, "customer", "customer@example.com").await?;
    let admin = create_user(&state, "admin", "admin@example.com").await?;
    let seller = create_user(&state, "seller", "seller@example.com").await?;

    let product_id = create_product(&state, Some(seller.user_id), "Test Widget", 3_000, 10).await?;

    let coupon = coupon_service::create_coupon(
        &state,
        &admin,
        CreateCouponRequest {
            code: "save10".into(),
            discount_type: "percent".into(),
            value: 10,
            min_order_amount: 1_000,
            max_uses: Some(1),
            expires_at: None,
        },
    )
    .await?
    .data
    .expect("coupon");
    assert_eq!(coupon.code, "SAVE10");

    // Server cart has 2, guest cart brings 3 more plus an unknown product.
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 2,
        },
    )
    .await?;

    let unknown = Uuid::new_v4();
    let merged = cart_service::merge_cart(
        &state,
        &customer,
        MergeCartRequest {
            items: vec![
                GuestCartLine {
                    product_id,
                    quantity: 3,
                },
                GuestCartLine {
                    product_id: unknown,
                    quantity: 1,
                },
            ],
        },
    )
    .await?
    .data
    .expect("merged cart");
    assert_eq!(merged.skipped, vec![unknown]);
    assert_eq!(merged.cart.items.len(), 1);
    assert_eq!(merged.cart.items[0].quantity, 5);

    let too_many = cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 11,
        },
    )
    .await;
    assert!(matches!(too_many, Err(AppError::BadRequest(_))));

    let cart = cart_service::update_quantity(
        &state,
        &customer,
        product_id,
        UpdateCartItemRequest { quantity: 2 },
    )
    .await?
    .data
    .expect("cart");
    assert_eq!(cart.summary.subtotal, 6_000);
    assert_eq!(cart.summary.shipping_estimate, 0);

    let checkout = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "1 Crab Street".into(),
            shipping_method: ShippingMethod::Standard,
            coupon_code: Some("save10".into()),
        },
    )
    .await?
    .data
    .expect("order");
    let order = checkout.order;
    assert_eq!(order.subtotal, 6_000);
    assert_eq!(order.discount_amount, 600);
    assert_eq!(order.shipping_fee, 0);
    assert_eq!(order.total_amount, 5_400);
    assert_eq!(order.status, "pending");
    assert_eq!(checkout.items.len(), 1);
    assert_eq!(checkout.items[0].product_name, "Test Widget");
    assert!(order.invoice_number.starts_with("INV-"));

    let empty = cart_service::list_cart(&state, &customer).await?.data.expect("cart");
    assert!(empty.items.is_empty());

    let stored = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(stored.stock, 8);

    let used = Coupons::find_by_id(coupon.id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(used.used_count, 1);
    let exhausted = coupon_service::validate_coupon(
        &state,
        ValidateCouponRequest {
            code: "SAVE10".into(),
            subtotal: 5_000,
        },
    )
    .await;
    assert!(matches!(exhausted, Err(AppError::BadRequest(_))));

    let wrong_invoice = order_service::pay_order(
        &state,
        &customer,
        order.id,
        PayOrderRequest {
            invoice_number: "INV-00000000-deadbeef".into(),
        },
    )
    .await;
    assert!(matches!(wrong_invoice, Err(AppError::BadRequest(_))));

    let paid = order_service::pay_order(
        &state,
        &customer,
        order.id,
        PayOrderRequest {
            invoice_number: order.invoice_number.clone(),
        },
    )
    .await?
    .data
    .expect("paid order")
    .order;
    assert_eq!(paid.status, "paid");
    assert_eq!(paid.payment_status, "paid");
    assert!(paid.paid_at.is_some());

    let not_admin = admin_service::update_order_status(
        &state,
        &customer,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await;
    assert!(matches!(not_admin, Err(AppError::Forbidden)));

    let shipped = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "shipped".into(),
        },
    )
    .await?
    .data
    .expect("shipped order");
    assert_eq!(shipped.order.status, "shipped");

    let backwards = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "pending".into(),
        },
    )
    .await;
    assert!(matches!(backwards, Err(AppError::BadRequest(_))));

    let low = admin_service::list_low_stock(
        &state,
        &admin,
        LowStockQuery {
            page: Some(1),
            per_page: Some(20),
            threshold: Some(10),
        },
    )
    .await?;
    assert!(
        low.data.expect("low stock").items.iter().any(|p| p.id == product_id),
        "expected product to appear in low-stock list"
    );

    // Second order, express shipping, cancelled before payment.
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id,
            quantity: 1,
        },
    )
    .await?;
    let second = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "1 Crab Street".into(),
            shipping_method: ShippingMethod::Express,
            coupon_code: None,
        },
    )
    .await?
    .data
    .expect("second order")
    .order;
    assert_eq!(second.shipping_fee, 1_500);
    assert_eq!(second.total_amount, 4_500);

    let cancelled = order_service::cancel_order(&state, &customer, second.id)
        .await?
        .data
        .expect("cancelled order")
        .order;
    assert_eq!(cancelled.status, "cancelled");

    let restocked = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(restocked.stock, 8);

    let again = order_service::cancel_order(&state, &customer, second.id).await;
    assert!(matches!(again, Err(AppError::BadRequest(_))));

    let empty_checkout = order_service::checkout(
        &state,
        &customer,
        CheckoutRequest {
            shipping_address: "1 Crab Street".into(),
            shipping_method: ShippingMethod::Standard,
            coupon_code: None,
        },
    )
    .await;
    assert!(matches!(empty_checkout, Err(AppError::BadRequest(_))));

    Ok(())
}

fn checkout_request(coupon_code: Option<&str>) -> CheckoutRequest {
    CheckoutRequest {
        shipping_address: "9 Harbour Road".into(),
        shipping_method: ShippingMethod::Standard,
        coupon_code: coupon_code.map(str::to_string),
    }
}

// Sold-out guest lines are skipped, a stock drop blocks checkout, repeated or
// late payments are refused, and an admin cancel hands the coupon use back.
async fn stock_payment_and_coupon_release(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let customer = create_user(&state, "customer", "buyer@example.com").await?;
    let admin = create_user(&state, "admin", "boss@example.com").await?;

    let kettle = create_product(&state, None, "Kettle", 2_000, 5).await?;
    let sold_out = create_product(&state, None, "Sold Out Teapot", 4_000, 0).await?;

    let coupon = coupon_service::create_coupon(
        &state,
        &admin,
        CreateCouponRequest {
            code: "back5".into(),
            discount_type: "fixed".into(),
            value: 500,
            min_order_amount: 0,
            max_uses: Some(1),
            expires_at: None,
        },
    )
    .await?
    .data
    .expect("coupon");

    let merged = cart_service::merge_cart(
        &state,
        &customer,
        MergeCartRequest {
            items: vec![
                GuestCartLine {
                    product_id: kettle,
                    quantity: 2,
                },
                GuestCartLine {
                    product_id: sold_out,
                    quantity: 1,
                },
            ],
        },
    )
    .await?
    .data
    .expect("merged cart");
    assert_eq!(merged.skipped, vec![sold_out]);
    assert_eq!(merged.cart.items.len(), 1);
    assert_eq!(merged.cart.items[0].product.id, kettle);
    assert_eq!(merged.cart.items[0].quantity, 2);

    // Stock drops after the item was carted.
    admin_service::adjust_inventory(&state, &admin, kettle, InventoryAdjustRequest { delta: -4 })
        .await?;
    let short = order_service::checkout(&state, &customer, checkout_request(Some("BACK5"))).await;
    assert!(matches!(short, Err(AppError::BadRequest(_))));

    let untouched = Coupons::find_by_id(coupon.id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(untouched.used_count, 0);
    let cart = cart_service::list_cart(&state, &customer).await?.data.expect("cart");
    assert_eq!(cart.items.len(), 1);

    admin_service::adjust_inventory(&state, &admin, kettle, InventoryAdjustRequest { delta: 4 })
        .await?;
    let order = order_service::checkout(&state, &customer, checkout_request(Some("BACK5")))
        .await?
        .data
        .expect("order")
        .order;
    assert_eq!(order.discount_amount, 500);
    assert_eq!(order.total_amount, 4_000 - 500 + order.shipping_fee);

    let pay = || PayOrderRequest {
        invoice_number: order.invoice_number.clone(),
    };
    order_service::pay_order(&state, &customer, order.id, pay()).await?;
    let twice = order_service::pay_order(&state, &customer, order.id, pay()).await;
    assert!(matches!(twice, Err(AppError::BadRequest(_))));

    let spent = Coupons::find_by_id(coupon.id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(spent.used_count, 1);

    let cancelled = admin_service::update_order_status(
        &state,
        &admin,
        order.id,
        UpdateOrderStatusRequest {
            status: "cancelled".into(),
        },
    )
    .await?
    .data
    .expect("cancelled order");
    assert_eq!(cancelled.order.status, "cancelled");

    let released = Coupons::find_by_id(coupon.id)
        .one(&state.orm)
        .await?
        .expect("coupon");
    assert_eq!(released.used_count, 0);
    let restocked = Products::find_by_id(kettle)
        .one(&state.orm)
        .await?
        .expect("product");
    assert_eq!(restocked.stock, 5);
    coupon_service::validate_coupon(
        &state,
        ValidateCouponRequest {
            code: "BACK5".into(),
            subtotal: 2_000,
        },
    )
    .await?;

    // A customer-cancelled order cannot be paid afterwards.
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: kettle,
            quantity: 1,
        },
    )
    .await?;
    let abandoned = order_service::checkout(&state, &customer, checkout_request(None))
        .await?
        .data
        .expect("order")
        .order;
    order_service::cancel_order(&state, &customer, abandoned.id).await?;
    let late = order_service::pay_order(
        &state,
        &customer,
        abandoned.id,
        PayOrderRequest {
            invoice_number: abandoned.invoice_number.clone(),
        },
    )
    .await;
    assert!(matches!(late, Err(AppError::BadRequest(_))));

    Ok(())
}

// Unique-index violations that slip past the pre-checks come back as 409s.
async fn duplicate_inserts_map_to_conflict(database_url: &str) -> anyhow::Result<()> {
    let state = setup_state(database_url).await?;

    let coupon = |code: &str| CouponActive {
        id: Set(Uuid::new_v4()),
        code: Set(code.into()),
        discount_type: Set("fixed".into()),
        value: Set(100),
        min_order_amount: Set(0),
        max_uses: Set(None),
        used_count: Set(0),
        expires_at: Set(None),
        active: Set(true),
        created_at: Set(Utc::now().into()),
    };
    coupon("TWICE").insert(&state.orm).await?;
    let err = coupon("TWICE")
        .insert(&state.orm)
        .await
        .expect_err("duplicate coupon code");
    assert!(matches!(AppError::from(err), AppError::Conflict(_)));

    create_user(&state, "customer", "dup@example.com").await?;
    let err = sqlx::query(
        "INSERT INTO users (id, email, password_hash, name, role) VALUES ($1, $2, 'x', 'dup', 'customer')",
    )
    .bind(Uuid::new_v4())
    .bind("dup@example.com")
    .execute(&state.pool)
    .await
    .expect_err("duplicate email");
    let err = AppError::from(err);
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(err.status(), axum::http::StatusCode::CONFLICT);

    Ok(())
}
