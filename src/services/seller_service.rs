use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, IntoActiveModel, Set, TransactionTrait};
use validator::Validate;

use crate::{
    audit,
    dto::seller::{
        OnboardingComplete, SellerDashboard, SellerOrderLine, SellerOrderList,
        StartOnboardingRequest,
    },
    entity::{
        seller_profiles::{ActiveModel as ProfileActive, Entity as SellerProfiles},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ROLE_SELLER, ensure_seller, issue_token},
    models::SellerProfile,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    services::admin_service::DEFAULT_LOW_STOCK_THRESHOLD,
    state::AppState,
};

pub async fn start_onboarding(
    state: &AppState,
    user: &AuthUser,
    payload: StartOnboardingRequest,
) -> AppResult<ApiResponse<SellerProfile>> {
    let payload = StartOnboardingRequest {
        store_name: payload.store_name.trim().to_string(),
        contact_email: payload
            .contact_email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty()),
        ..payload
    };
    payload.validate()?;
    let StartOnboardingRequest {
        store_name,
        description,
        contact_email,
    } = payload;

    let existing = SellerProfiles::find_by_id(user.user_id)
        .one(&state.orm)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("Seller profile already exists".into()));
    }

    let now = Utc::now();
    let profile = ProfileActive {
        user_id: Set(user.user_id),
        store_name: Set(store_name),
        description: Set(description),
        contact_email: Set(contact_email),
        onboarding_completed: Set(false),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "seller_onboarding_start",
        "seller_profiles",
        serde_json::json!({ "store_name": profile.store_name }),
    )
    .await;

    Ok(ApiResponse::success(
        "Onboarding started",
        SellerProfile::from(profile),
        Some(Meta::empty()),
    ))
}

pub async fn complete_onboarding(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<OnboardingComplete>> {
    let txn = state.orm.begin().await?;

    let profile = SellerProfiles::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or_else(|| AppError::BadRequest("Start onboarding first".into()))?;

    let mut active: ProfileActive = profile.into();
    active.onboarding_completed = Set(true);
    active.updated_at = Set(Utc::now().into());
    let profile = active.update(&txn).await?;

    let account = Users::find_by_id(user.user_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    // Admins keep their role.
    let role = if user.is_admin() {
        account.role.clone()
    } else {
        let mut active = account.into_active_model();
        active.role = Set(ROLE_SELLER.to_string());
        active.update(&txn).await?.role
    };

    txn.commit().await?;

    let token = issue_token(
        &state.config.jwt_secret,
        state.config.jwt_ttl_hours,
        user.user_id,
        &role,
    )?;

    audit::record(
        &state.pool,
        user.user_id,
        "seller_onboarding_complete",
        "seller_profiles",
        serde_json::json!({ "role": role }),
    )
    .await;

    Ok(ApiResponse::success(
        "Onboarding complete",
        OnboardingComplete {
            profile: SellerProfile::from(profile),
            token: format!("Bearer {token}"),
        },
        Some(Meta::empty()),
    ))
}

pub async fn get_profile(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SellerProfile>> {
    let profile = SellerProfiles::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", SellerProfile::from(profile), None))
}

pub async fn seller_dashboard(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SellerDashboard>> {
    ensure_seller(user)?;

    let (product_count, low_stock_count): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*), COUNT(*) FILTER (WHERE stock <= $2)
        FROM products
        WHERE seller_id = $1
        "#,
    )
    .bind(user.user_id)
    .bind(DEFAULT_LOW_STOCK_THRESHOLD)
    .fetch_one(&state.pool)
    .await?;

    let (units_sold, revenue): (i64, i64) = sqlx::query_as(
        r#"
        SELECT COALESCE(SUM(oi.quantity), 0)::BIGINT,
               COALESCE(SUM(oi.price * oi.quantity), 0)::BIGINT
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        JOIN orders o ON o.id = oi.order_id
        WHERE p.seller_id = $1 AND o.status <> 'cancelled'
        "#,
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Dashboard",
        SellerDashboard {
            product_count,
            units_sold,
            revenue,
            low_stock_count,
        },
        None,
    ))
}

pub async fn list_seller_orders(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<SellerOrderList>> {
    ensure_seller(user)?;
    let (page, limit, offset) = pagination.normalize();

    let items = sqlx::query_as::<_, SellerOrderLine>(
        r#"
        SELECT o.id AS order_id, o.invoice_number, o.status,
               oi.product_id, oi.product_name, oi.quantity, oi.price,
               o.created_at AS ordered_at
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        JOIN orders o ON o.id = oi.order_id
        WHERE p.seller_id = $1
        ORDER BY o.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user.user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(&state.pool)
    .await?;

    let total: (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM order_items oi
        JOIN products p ON p.id = oi.product_id
        WHERE p.seller_id = $1
        "#,
    )
    .bind(user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Seller orders",
        SellerOrderList { items },
        Some(Meta::new(page, limit, total.0)),
    ))
}
