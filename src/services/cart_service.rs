use std::collections::{BTreeMap, HashMap};

use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use crate::{
    audit,
    dto::cart::{
        AddToCartRequest, CartItemDto, CartList, CartSummary, GuestCartLine, MergeCartRequest,
        MergeCartResponse, UpdateCartItemRequest,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{CartItem, Product},
    pricing::{ShippingMethod, cart_subtotal, line_total, shipping_fee},
    response::{ApiResponse, Meta},
    state::AppState,
};

#[derive(FromRow)]
struct CartWithProductRow {
    cart_id: Uuid,
    quantity: i32,
    #[sqlx(flatten)]
    product: Product,
}

/// Outcome of reconciling a guest cart with the stored one.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct MergePlan {
    /// Final quantity per product, to be upserted.
    pub upserts: Vec<(Uuid, i32)>,
    pub skipped: Vec<Uuid>,
}

/// Sums guest quantities onto the stored cart, capped at stock.
///
/// `stock` holds every product that exists; a guest line for a product
/// missing from it, with a non-positive quantity, or with no stock left is
/// reported in `skipped`.
pub fn plan_merge(
    existing: &HashMap<Uuid, i32>,
    stock: &HashMap<Uuid, i32>,
    guest: &[GuestCartLine],
) -> MergePlan {
    let mut plan = MergePlan::default();
    let mut wanted: BTreeMap<Uuid, i64> = BTreeMap::new();

    for line in guest {
        if line.quantity <= 0 || !stock.contains_key(&line.product_id) {
            if !plan.skipped.contains(&line.product_id) {
                plan.skipped.push(line.product_id);
            }
            continue;
        }
        *wanted.entry(line.product_id).or_default() += line.quantity as i64;
    }

    for (product_id, guest_qty) in wanted {
        let available = stock.get(&product_id).copied().unwrap_or(0);
        if available <= 0 {
            if !plan.skipped.contains(&product_id) {
                plan.skipped.push(product_id);
            }
            continue;
        }
        let current = existing.get(&product_id).copied().unwrap_or(0) as i64;
        let merged = (current + guest_qty).min(available as i64) as i32;
        plan.upserts.push((product_id, merged));
    }

    plan
}

fn amount_too_large() -> AppError {
    AppError::BadRequest("cart total is too large".to_string())
}

pub fn summarize(items: &[CartItemDto]) -> AppResult<CartSummary> {
    let item_count = items.iter().map(|i| i64::from(i.quantity)).sum();
    let subtotal = cart_subtotal(items.iter().map(|i| (i.product.price, i.quantity)))
        .ok_or_else(amount_too_large)?;
    let shipping_estimate = shipping_fee(ShippingMethod::Standard, subtotal);
    Ok(CartSummary {
        item_count,
        subtotal,
        shipping_estimate,
        total: subtotal.saturating_add(shipping_estimate),
    })
}

pub async fn load_cart<'e, E: PgExecutor<'e>>(executor: E, user_id: Uuid) -> AppResult<CartList> {
    let rows = sqlx::query_as::<_, CartWithProductRow>(
        r#"
        SELECT ci.id AS cart_id, ci.quantity, p.*
        FROM cart_items ci
        JOIN products p ON p.id = ci.product_id
        WHERE ci.user_id = $1
        ORDER BY ci.created_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    let items = rows
        .into_iter()
        .map(|row| {
            let line_total =
                line_total(row.product.price, row.quantity).ok_or_else(amount_too_large)?;
            Ok(CartItemDto {
                id: row.cart_id,
                line_total,
                product: row.product,
                quantity: row.quantity,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let summary = summarize(&items)?;
    Ok(CartList { items, summary })
}

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let cart = load_cart(&state.pool, user.user_id).await?;
    Ok(ApiResponse::success("OK", cart, None))
}

async fn product_stock<'e, E: PgExecutor<'e>>(executor: E, product_id: Uuid) -> AppResult<i32> {
    let found: Option<(i32,)> = sqlx::query_as("SELECT stock FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(executor)
        .await?;
    found
        .map(|(stock,)| stock)
        .ok_or_else(|| AppError::BadRequest("product not found".to_string()))
}

fn ensure_in_stock(quantity: i32, stock: i32) -> AppResult<()> {
    if quantity > stock {
        return Err(AppError::BadRequest(format!(
            "only {stock} left in stock"
        )));
    }
    Ok(())
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity <= 0 {
        return Err(AppError::BadRequest(
            "quantity must be greater than 0".to_string(),
        ));
    }

    let stock = product_stock(&state.pool, payload.product_id).await?;
    ensure_in_stock(payload.quantity, stock)?;

    let cart_item = sqlx::query_as::<_, CartItem>(
        r#"
        INSERT INTO cart_items (id, user_id, product_id, quantity)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, product_id)
        DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
        RETURNING id, product_id, user_id, quantity, created_at, updated_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user.user_id)
    .bind(payload.product_id)
    .bind(payload.quantity)
    .fetch_one(&state.pool)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": payload.product_id, "quantity": payload.quantity }),
    )
    .await;

    Ok(ApiResponse::success("OK", cart_item, None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<CartList>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest("quantity must not be negative".into()));
    }

    if payload.quantity == 0 {
        delete_line(&state.pool, user.user_id, product_id).await?;
    } else {
        let stock = product_stock(&state.pool, product_id).await?;
        ensure_in_stock(payload.quantity, stock)?;

        let result = sqlx::query(
            r#"
            UPDATE cart_items
            SET quantity = $3, updated_at = NOW()
            WHERE user_id = $1 AND product_id = $2
            "#,
        )
        .bind(user.user_id)
        .bind(product_id)
        .bind(payload.quantity)
        .execute(&state.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound);
        }
    }

    audit::record(
        &state.pool,
        user.user_id,
        "cart_update",
        "cart_items",
        serde_json::json!({ "product_id": product_id, "quantity": payload.quantity }),
    )
    .await;

    let cart = load_cart(&state.pool, user.user_id).await?;
    Ok(ApiResponse::success("Cart updated", cart, None))
}

async fn delete_line<'e, E: PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<()> {
    let result = sqlx::query("DELETE FROM cart_items WHERE product_id = $1 AND user_id = $2")
        .bind(product_id)
        .bind(user_id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }
    Ok(())
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    delete_line(&state.pool, user.user_id, product_id).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_remove",
        "cart_items",
        serde_json::json!({ "product_id": product_id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user.user_id)
        .execute(&state.pool)
        .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "cart_clear",
        "cart_items",
        serde_json::json!({ "removed": result.rows_affected() }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({ "removed": result.rows_affected() }),
        Some(Meta::empty()),
    ))
}

pub async fn merge_cart(
    state: &AppState,
    user: &AuthUser,
    payload: MergeCartRequest,
) -> AppResult<ApiResponse<MergeCartResponse>> {
    let mut tx = state.pool.begin().await?;

    let existing: HashMap<Uuid, i32> = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT product_id, quantity FROM cart_items WHERE user_id = $1 FOR UPDATE",
    )
    .bind(user.user_id)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    let ids: Vec<Uuid> = payload.items.iter().map(|line| line.product_id).collect();
    let stock: HashMap<Uuid, i32> = sqlx::query_as::<_, (Uuid, i32)>(
        "SELECT id, stock FROM products WHERE id = ANY($1) FOR UPDATE",
    )
    .bind(&ids)
    .fetch_all(&mut *tx)
    .await?
    .into_iter()
    .collect();

    let plan = plan_merge(&existing, &stock, &payload.items);

    for (product_id, quantity) in &plan.upserts {
        sqlx::query(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, quantity)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, product_id)
            DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = NOW()
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user.user_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }

    let cart = load_cart(&mut *tx, user.user_id).await?;
    tx.commit().await?;

    tracing::debug!(
        user_id = %user.user_id,
        merged = plan.upserts.len(),
        skipped = plan.skipped.len(),
        "guest cart merged"
    );

    audit::record(
        &state.pool,
        user.user_id,
        "cart_merge",
        "cart_items",
        serde_json::json!({ "merged": plan.upserts.len(), "skipped": plan.skipped }),
    )
    .await;

    Ok(ApiResponse::success(
        "Cart merged",
        MergeCartResponse {
            cart,
            skipped: plan.skipped,
        },
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product_id: Uuid, quantity: i32) -> GuestCartLine {
        GuestCartLine {
            product_id,
            quantity,
        }
    }

    #[test]
    fn merge_sums_and_caps_at_stock() {
        let mug = Uuid::new_v4();
        let lamp = Uuid::new_v4();
        let existing = HashMap::from([(mug, 2)]);
        let stock = HashMap::from([(mug, 4), (lamp, 10)]);

        let plan = plan_merge(&existing, &stock, &[line(mug, 3), line(lamp, 1), line(lamp, 2)]);

        assert!(plan.skipped.is_empty());
        assert!(plan.upserts.contains(&(mug, 4)));
        assert!(plan.upserts.contains(&(lamp, 3)));
    }

    #[test]
    fn merge_skips_unknown_bad_and_sold_out_lines() {
        let known = Uuid::new_v4();
        let sold_out = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let stock = HashMap::from([(known, 5), (sold_out, 0)]);

        let plan = plan_merge(
            &HashMap::new(),
            &stock,
            &[line(known, 0), line(unknown, 1), line(sold_out, 2)],
        );

        assert!(plan.upserts.is_empty());
        assert_eq!(plan.skipped.len(), 3);
        assert!(plan.skipped.contains(&known));
        assert!(plan.skipped.contains(&unknown));
        assert!(plan.skipped.contains(&sold_out));
    }

    #[test]
    fn merge_keeps_server_only_lines_untouched() {
        let server_only = Uuid::new_v4();
        let existing = HashMap::from([(server_only, 7)]);
        let plan = plan_merge(&existing, &HashMap::new(), &[]);
        assert_eq!(plan, MergePlan::default());
    }

    fn mug(price: i64) -> Product {
        Product {
            id: Uuid::new_v4(),
            seller_id: None,
            name: "Mug".into(),
            description: None,
            price,
            stock: 10,
            image_url: None,
            ai_metadata: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn summary_adds_standard_shipping_below_threshold() {
        let items = vec![CartItemDto {
            id: Uuid::new_v4(),
            product: mug(1_200),
            quantity: 2,
            line_total: 2_400,
        }];

        let summary = summarize(&items).expect("summary");
        assert_eq!(summary.item_count, 2);
        assert_eq!(summary.subtotal, 2_400);
        assert_eq!(summary.shipping_estimate, 500);
        assert_eq!(summary.total, 2_900);

        let empty = summarize(&[]).expect("empty summary");
        assert_eq!(empty.shipping_estimate, 0);
        assert_eq!(empty.total, 0);
    }

    #[test]
    fn summary_rejects_totals_that_overflow() {
        let items = vec![CartItemDto {
            id: Uuid::new_v4(),
            product: mug(i64::MAX / 2),
            quantity: 3,
            line_total: 0,
        }];

        assert!(matches!(summarize(&items), Err(AppError::BadRequest(_))));
    }
}
