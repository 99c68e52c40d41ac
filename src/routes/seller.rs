use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};

use crate::{
    dto::seller::{OnboardingComplete, SellerDashboard, SellerOrderList, StartOnboardingRequest},
    error::AppResult,
    middleware::auth::AuthUser,
    models::SellerProfile,
    response::ApiResponse,
    routes::params::Pagination,
    services::seller_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/onboarding", post(start_onboarding))
        .route("/onboarding/complete", post(complete_onboarding))
        .route("/profile", get(get_profile))
        .route("/dashboard", get(seller_dashboard))
        .route("/orders", get(list_seller_orders))
}

#[utoipa::path(
    post,
    path = "/api/seller/onboarding",
    request_body = StartOnboardingRequest,
    responses(
        (status = 200, description = "Seller profile created", body = ApiResponse<SellerProfile>),
        (status = 409, description = "Profile already exists")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn start_onboarding(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<StartOnboardingRequest>,
) -> AppResult<Json<ApiResponse<SellerProfile>>> {
    let resp = seller_service::start_onboarding(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/seller/onboarding/complete",
    responses(
        (status = 200, description = "Onboarding finished, new token issued", body = ApiResponse<OnboardingComplete>),
        (status = 400, description = "Onboarding not started")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn complete_onboarding(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<OnboardingComplete>>> {
    let resp = seller_service::complete_onboarding(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/profile",
    responses(
        (status = 200, description = "Seller profile", body = ApiResponse<SellerProfile>),
        (status = 404, description = "No profile")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SellerProfile>>> {
    let resp = seller_service::get_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/dashboard",
    responses(
        (status = 200, description = "Sales figures for the seller", body = ApiResponse<SellerDashboard>),
        (status = 403, description = "Seller only")
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn seller_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SellerDashboard>>> {
    let resp = seller_service::seller_dashboard(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/seller/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20")
    ),
    responses(
        (status = 200, description = "Order lines for the seller's products", body = ApiResponse<SellerOrderList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Seller"
)]
pub async fn list_seller_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(pagination): Query<Pagination>,
) -> AppResult<Json<ApiResponse<SellerOrderList>>> {
    let resp = seller_service::list_seller_orders(&state, &user, pagination).await?;
    Ok(Json(resp))
}
