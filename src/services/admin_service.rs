use chrono::Utc;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::{
        admin::{DashboardStats, InventoryAdjustRequest, LowStockQuery, UpdateOrderStatusRequest},
        orders::{OrderList, OrderWithItems},
        products::ProductList,
    },
    entity::{
        orders::{ActiveModel as OrderActive, Entity as Orders},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, Product},
    order_status::{CANCELLED, PAID, PAYMENT_PAID, ensure_transition},
    response::{ApiResponse, Meta},
    routes::params::OrderListQuery,
    services::order_service::{load_items, query_orders, restock_order},
    state::AppState,
};

pub const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;
    let (items, meta) = query_orders(&state.orm, None, &query).await?;
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn get_order_admin(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let order = Orders::find_by_id(id)
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

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;
    let next = payload.status.trim().to_lowercase();

    let txn = state.orm.begin().await?;
    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    ensure_transition(&order.status, &next)?;
    let previous = order.status.clone();

    if next == CANCELLED {
        restock_order(&txn, &order).await?;
    }

    let now = Utc::now();
    let already_paid = order.payment_status == PAYMENT_PAID;
    let mut active: OrderActive = order.into();
    if next == PAID && !already_paid {
        active.payment_status = Set(PAYMENT_PAID.into());
        active.paid_at = Set(Some(now.into()));
    }
    active.status = Set(next.clone());
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    let items = load_items(&txn, order.id).await?;
    txn.commit().await?;

    tracing::info!(order_id = %order.id, from = %previous, to = %next, "order status changed");

    audit::record(
        &state.pool,
        user.user_id,
        "order_status_update",
        "orders",
        serde_json::json!({ "order_id": order.id, "from": previous, "to": next }),
    )
    .await;

    Ok(ApiResponse::success(
        "Order status updated",
        OrderWithItems {
            order: Order::from(order),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn list_low_stock(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;
    let threshold = query.threshold.unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD);
    if threshold < 0 {
        return Err(AppError::BadRequest("threshold must not be negative".into()));
    }
    let (page, limit, offset) = query.pagination().normalize();

    let finder = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_asc(ProdCol::Name);

    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success(
        "Low stock products",
        ProductList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub fn apply_stock_delta(stock: i32, delta: i32) -> AppResult<i32> {
    if delta == 0 {
        return Err(AppError::BadRequest("delta must not be zero".into()));
    }
    match stock.checked_add(delta) {
        Some(next) if next >= 0 => Ok(next),
        _ => Err(AppError::BadRequest("stock cannot go below zero".into())),
    }
}

pub async fn adjust_inventory(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: InventoryAdjustRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let stock = apply_stock_delta(product.stock, payload.delta)?;

    let mut active: ProductActive = product.into();
    active.stock = Set(stock);
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "inventory_adjust",
        "products",
        serde_json::json!({ "product_id": product.id, "delta": payload.delta, "stock": stock }),
    )
    .await;

    Ok(ApiResponse::success(
        "Inventory adjusted",
        Product::from(product),
        Some(Meta::empty()),
    ))
}

pub async fn dashboard_stats(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<DashboardStats>> {
    ensure_admin(user)?;

    let (users, products, orders, pending_orders, revenue): (i64, i64, i64, i64, i64) =
        sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users),
                (SELECT COUNT(*) FROM products),
                (SELECT COUNT(*) FROM orders),
                (SELECT COUNT(*) FROM orders WHERE status = 'pending'),
                (SELECT COALESCE(SUM(total_amount), 0)::BIGINT FROM orders
                    WHERE status IN ('paid', 'shipped', 'completed'))
            "#,
        )
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Dashboard",
        DashboardStats {
            users,
            products,
            orders,
            pending_orders,
            revenue,
        },
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_delta_rules() {
        assert_eq!(apply_stock_delta(3, 2).expect("restock"), 5);
        assert_eq!(apply_stock_delta(3, -3).expect("sell out"), 0);
        assert!(apply_stock_delta(3, -4).is_err());
        assert!(apply_stock_delta(3, 0).is_err());
    }
}
