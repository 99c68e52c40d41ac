use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::orders::{CheckoutRequest, OrderList, OrderWithItems, PayOrderRequest},
    email,
    entity::{
        cart_items::{self, Column as CartCol, Entity as CartItems},
        coupons::{Column as CouponCol, Entity as Coupons},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        products::{Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    order_status::{CANCELLED, PAID, PAYMENT_PAID, PAYMENT_UNPAID, PENDING, validate_order_status},
    pricing::{OrderTotals, cart_subtotal},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::coupon_service::{check_coupon, normalize_code},
    state::AppState,
};

#[derive(Debug, FromQueryResult)]
struct CartProductRow {
    product_id: Uuid,
    quantity: i32,
    name: String,
    price: i64,
    stock: i32,
}

pub fn build_invoice_number(order_id: Uuid) -> String {
    let date = Utc::now().format("%Y%m%d");
    let suffix = order_id.simple().to_string();
    format!("INV-{}-{}", date, &suffix[..8])
}

/// Paged order listing. `user_id` of `None` lists every customer's orders.
pub async fn query_orders<C: ConnectionTrait>(
    conn: &C,
    user_id: Option<Uuid>,
    query: &OrderListQuery,
) -> AppResult<(Vec<Order>, Meta)> {
    let (page, limit, offset) = query.pagination().normalize();
    let mut condition = Condition::all();
    if let Some(user_id) = user_id {
        condition = condition.add(OrderCol::UserId.eq(user_id));
    }
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        validate_order_status(status)?;
        condition = condition.add(OrderCol::Status.eq(status.clone()));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);

    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(conn).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok((orders, Meta::new(page, limit, total)))
}

pub async fn load_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<Vec<OrderItem>> {
    Ok(OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .order_by_asc(OrderItemCol::CreatedAt)
        .all(conn)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect())
}

/// Puts the quantities of a cancelled order back on the shelf.
pub async fn restock_order(txn: &DatabaseTransaction, order: &OrderModel) -> AppResult<()> {
    let items = load_items(txn, order.id).await?;
    for item in &items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(txn)
            .await?;
    }

    if let Some(code) = order.coupon_code.as_ref() {
        Coupons::update_many()
            .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).sub(1))
            .filter(CouponCol::Code.eq(code.as_str()))
            .filter(CouponCol::UsedCount.gt(0))
            .exec(txn)
            .await?;
    }
    Ok(())
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (items, meta) = query_orders(&state.orm, Some(user.user_id), &query).await?;
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let shipping_address = payload.shipping_address.trim().to_string();
    if shipping_address.is_empty() {
        return Err(AppError::BadRequest("shipping_address is required".into()));
    }

    let txn = state.orm.begin().await?;

    let rows = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .column_as(ProdCol::Name, "name")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Stock, "stock")
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_asc(CartCol::CreatedAt)
        .lock(LockType::Update)
        .into_model::<CartProductRow>()
        .all(&txn)
        .await?;

    if rows.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    for row in &rows {
        if row.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if row.stock < row.quantity {
            return Err(AppError::BadRequest(format!(
                "Insufficient stock for {}",
                row.name
            )));
        }
    }
    let subtotal = cart_subtotal(rows.iter().map(|row| (row.price, row.quantity)))
        .ok_or_else(|| AppError::BadRequest("Order total is too large".into()))?;

    let coupon = match payload.coupon_code.as_deref().map(str::trim) {
        Some(code) if !code.is_empty() => {
            let coupon = Coupons::find()
                .filter(CouponCol::Code.eq(normalize_code(code)))
                .lock(LockType::Update)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::BadRequest("Coupon not found".into()))?;
            let discount = check_coupon(&coupon, subtotal, Utc::now())?;

            Coupons::update_many()
                .col_expr(CouponCol::UsedCount, Expr::col(CouponCol::UsedCount).add(1))
                .filter(CouponCol::Id.eq(coupon.id))
                .exec(&txn)
                .await?;

            Some((coupon.code, discount))
        }
        _ => None,
    };

    let totals = OrderTotals::compute(
        subtotal,
        payload.shipping_method,
        coupon.as_ref().map(|(_, discount)| *discount),
    );

    let order_id = Uuid::new_v4();
    let now = Utc::now();

    let order = OrderActive {
        id: Set(order_id),
        user_id: Set(user.user_id),
        subtotal: Set(totals.subtotal),
        shipping_fee: Set(totals.shipping_fee),
        discount_amount: Set(totals.discount),
        total_amount: Set(totals.total),
        coupon_code: Set(coupon.map(|(code, _)| code)),
        shipping_address: Set(shipping_address),
        shipping_method: Set(payload.shipping_method.as_str().to_string()),
        status: Set(PENDING.into()),
        payment_status: Set(PAYMENT_UNPAID.into()),
        invoice_number: Set(build_invoice_number(order_id)),
        paid_at: Set(None),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&txn)
    .await?;

    let mut order_items: Vec<OrderItem> = Vec::with_capacity(rows.len());

    for row in &rows {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(row.product_id),
            product_name: Set(row.name.clone()),
            quantity: Set(row.quantity),
            price: Set(row.price),
            created_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        order_items.push(OrderItem::from(item));

        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(row.quantity))
            .col_expr(ProdCol::UpdatedAt, Expr::current_timestamp().into())
            .filter(ProdCol::Id.eq(row.product_id))
            .exec(&txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&txn)
        .await?;

    txn.commit().await?;

    let order = Order::from(order);
    tracing::info!(
        order_id = %order.id,
        invoice = %order.invoice_number,
        total = order.total_amount,
        "order placed"
    );

    send_confirmation(state, user.user_id, &order, &order_items).await;

    audit::record(
        &state.pool,
        user.user_id,
        "checkout",
        "orders",
        serde_json::json!({ "order_id": order.id, "total": order.total_amount }),
    )
    .await;

    Ok(ApiResponse::success(
        "Checkout success",
        OrderWithItems {
            order,
            items: order_items,
        },
        Some(Meta::empty()),
    ))
}

/// A failed confirmation email never fails the order.
async fn send_confirmation(state: &AppState, user_id: Uuid, order: &Order, items: &[OrderItem]) {
    let customer = match Users::find_by_id(user_id).one(&state.orm).await {
        Ok(Some(customer)) => customer,
        Ok(None) => return,
        Err(err) => {
            tracing::warn!(error = %err, "could not load customer for confirmation email");
            return;
        }
    };

    let sent = match email::order_confirmation(&state.config.shop_name, order, items) {
        Ok(content) => state.mailer.send(&customer.email, &content).await,
        Err(err) => Err(err),
    };
    if let Err(err) = sent {
        tracing::warn!(error = %err, order_id = %order.id, "order confirmation email failed");
    }
}

async fn find_own_order_locked(
    txn: &DatabaseTransaction,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<OrderModel> {
    Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or(AppError::NotFound)
}

pub async fn pay_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: PayOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = find_own_order_locked(&txn, user, id).await?;

    if order.invoice_number != payload.invoice_number.trim() {
        return Err(AppError::BadRequest("Invoice number does not match".into()));
    }
    if order.payment_status == PAYMENT_PAID {
        return Err(AppError::BadRequest("Order already paid".into()));
    }
    if order.status == CANCELLED {
        return Err(AppError::BadRequest("Order is cancelled".into()));
    }

    let now = Utc::now();
    let mut active: OrderActive = order.into();
    active.payment_status = Set(PAYMENT_PAID.into());
    active.status = Set(PAID.into());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_paid",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Payment recorded",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn cancel_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;
    let order = find_own_order_locked(&txn, user, id).await?;

    if order.status != PENDING || order.payment_status != PAYMENT_UNPAID {
        return Err(AppError::BadRequest(
            "Only pending unpaid orders can be cancelled".into(),
        ));
    }

    restock_order(&txn, &order).await?;

    let mut active: OrderActive = order.into();
    active.status = Set(CANCELLED.into());
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    let items = load_items(&txn, order.id).await?;

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "order_cancel",
        "orders",
        serde_json::json!({ "order_id": order.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order cancelled",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = load_items(&state.orm, order.id).await?;

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invoice_number_has_date_and_short_id() {
        let id = Uuid::new_v4();
        let invoice = build_invoice_number(id);
        let parts: Vec<&str> = invoice.split('-').collect();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "INV");
        assert_eq!(parts[1].len(), 8);
        assert!(parts[1].chars().all(|c| c.is_ascii_digit()));
        assert_eq!(parts[2], &id.simple().to_string()[..8]);
    }
}
