use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit,
    dto::coupons::{CouponList, CouponPreview, CreateCouponRequest, ValidateCouponRequest},
    entity::coupons::{ActiveModel, Column, Entity as Coupons, Model as CouponModel},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Coupon,
    pricing::{Discount, coupon_discount},
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Codes are stored and compared upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Checks that a coupon can be applied to `subtotal` at `now`.
pub fn check_coupon(coupon: &CouponModel, subtotal: i64, now: DateTime<Utc>) -> AppResult<Discount> {
    if !coupon.active {
        return Err(AppError::BadRequest("Coupon is not active".into()));
    }
    if coupon.expires_at.is_some_and(|at| at.with_timezone(&Utc) <= now) {
        return Err(AppError::BadRequest("Coupon has expired".into()));
    }
    if coupon.max_uses.is_some_and(|max| coupon.used_count >= max) {
        return Err(AppError::BadRequest("Coupon usage limit reached".into()));
    }
    if subtotal < coupon.min_order_amount {
        return Err(AppError::BadRequest(format!(
            "Order subtotal must be at least {}",
            coupon.min_order_amount
        )));
    }
    Discount::from_parts(&coupon.discount_type, coupon.value)
        .ok_or_else(|| AppError::BadRequest("Coupon is misconfigured".into()))
}

pub async fn find_by_code<C: ConnectionTrait>(conn: &C, code: &str) -> AppResult<CouponModel> {
    Coupons::find()
        .filter(Column::Code.eq(normalize_code(code)))
        .one(conn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Coupon not found".into()))
}

pub async fn validate_coupon(
    state: &AppState,
    payload: ValidateCouponRequest,
) -> AppResult<ApiResponse<CouponPreview>> {
    if payload.subtotal < 0 {
        return Err(AppError::BadRequest("subtotal must not be negative".into()));
    }

    let coupon = find_by_code(&state.orm, &payload.code).await?;
    let discount = check_coupon(&coupon, payload.subtotal, Utc::now())?;
    let amount = coupon_discount(discount, payload.subtotal);

    Ok(ApiResponse::success(
        "Coupon is valid",
        CouponPreview {
            code: coupon.code,
            discount: amount,
            subtotal_after_discount: payload.subtotal - amount,
        },
        None,
    ))
}

fn validate_new_coupon(payload: &CreateCouponRequest) -> AppResult<String> {
    let code = normalize_code(&payload.code);
    if code.is_empty() {
        return Err(AppError::BadRequest("code must not be empty".into()));
    }
    if payload.value <= 0 {
        return Err(AppError::BadRequest("value must be greater than 0".into()));
    }
    if Discount::from_parts(&payload.discount_type, payload.value).is_none() {
        return Err(AppError::BadRequest(
            "discount_type must be percent (1-100) or fixed".into(),
        ));
    }
    if payload.min_order_amount < 0 {
        return Err(AppError::BadRequest(
            "min_order_amount must not be negative".into(),
        ));
    }
    if payload.max_uses.is_some_and(|max| max <= 0) {
        return Err(AppError::BadRequest("max_uses must be greater than 0".into()));
    }
    Ok(code)
}

pub async fn create_coupon(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCouponRequest,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let code = validate_new_coupon(&payload)?;

    let existing = Coupons::find()
        .filter(Column::Code.eq(code.as_str()))
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(format!("coupon {code} already exists")));
    }

    let coupon = ActiveModel {
        id: Set(Uuid::new_v4()),
        code: Set(code),
        discount_type: Set(payload.discount_type),
        value: Set(payload.value),
        min_order_amount: Set(payload.min_order_amount),
        max_uses: Set(payload.max_uses),
        used_count: Set(0),
        expires_at: Set(payload.expires_at.map(Into::into)),
        active: Set(true),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "coupon_create",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id, "code": coupon.code }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon created",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

pub async fn list_coupons(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<CouponList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = Coupons::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Coupon::from)
        .collect();

    Ok(ApiResponse::success(
        "Coupons",
        CouponList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn deactivate_coupon(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Coupon>> {
    ensure_admin(user)?;
    let coupon = Coupons::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ActiveModel = coupon.into();
    active.active = Set(false);
    let coupon = active.update(&state.orm).await?;

    audit::record(
        &state.pool,
        user.user_id,
        "coupon_deactivate",
        "coupons",
        serde_json::json!({ "coupon_id": coupon.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Coupon deactivated",
        Coupon::from(coupon),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon() -> CouponModel {
        CouponModel {
            id: Uuid::new_v4(),
            code: "SAVE10".into(),
            discount_type: "percent".into(),
            value: 10,
            min_order_amount: 1_000,
            max_uses: Some(2),
            used_count: 0,
            expires_at: None,
            active: true,
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(normalize_code(" save10 "), "SAVE10");
    }

    #[test]
    fn valid_coupon_yields_discount() {
        let discount = check_coupon(&coupon(), 2_000, Utc::now()).expect("valid coupon");
        assert_eq!(discount, Discount::Percent(10));
    }

    #[test]
    fn rejects_inactive_expired_exhausted_and_small_orders() {
        let now = Utc::now();

        let mut inactive = coupon();
        inactive.active = false;
        assert!(check_coupon(&inactive, 2_000, now).is_err());

        let mut expired = coupon();
        expired.expires_at = Some((now - Duration::hours(1)).into());
        assert!(check_coupon(&expired, 2_000, now).is_err());

        let mut exhausted = coupon();
        exhausted.used_count = 2;
        assert!(check_coupon(&exhausted, 2_000, now).is_err());

        assert!(check_coupon(&coupon(), 999, now).is_err());
    }

    #[test]
    fn new_coupon_validation() {
        let mut payload = CreateCouponRequest {
            code: "welcome".into(),
            discount_type: "percent".into(),
            value: 150,
            min_order_amount: 0,
            max_uses: None,
            expires_at: None,
        };
        assert!(validate_new_coupon(&payload).is_err());

        payload.value = 15;
        assert_eq!(validate_new_coupon(&payload).expect("valid"), "WELCOME");

        payload.discount_type = "bogus".into();
        assert!(validate_new_coupon(&payload).is_err());
    }
}
