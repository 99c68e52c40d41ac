use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
};

use crate::{
    ai::RecognizedProduct,
    dto::ai::{AiSearchRequest, AiSearchResponse, AiUploadForm, AiUploadResponse},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::ai_service,
    state::AppState,
    storage::MAX_IMAGE_BYTES,
};

/// Room for the image plus multipart framing and text fields.
pub const MAX_UPLOAD_BODY: usize = MAX_IMAGE_BYTES + 64 * 1024;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/search", post(ai_search))
        .route("/recognize", post(recognize_product))
        .route("/products", post(ai_upload_product))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY))
}

#[utoipa::path(
    post,
    path = "/api/ai/search",
    request_body = AiSearchRequest,
    responses(
        (status = 200, description = "Interpreted filters and matching products", body = ApiResponse<AiSearchResponse>),
        (status = 502, description = "The AI service failed or replied with garbage"),
        (status = 503, description = "AI is not configured")
    ),
    tag = "AI"
)]
pub async fn ai_search(
    State(state): State<AppState>,
    Json(payload): Json<AiSearchRequest>,
) -> AppResult<Json<ApiResponse<AiSearchResponse>>> {
    let resp = ai_service::ai_search(&state, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/ai/recognize",
    request_body(content = AiUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "What the model sees in the photo", body = ApiResponse<RecognizedProduct>),
        (status = 400, description = "Missing or unsupported image")
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
pub async fn recognize_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<RecognizedProduct>>> {
    let image = ai_service::read_image(multipart).await?;
    let resp = ai_service::recognize_product(&state, &user, image).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/ai/products",
    request_body(content = AiUploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Product created from the photo", body = ApiResponse<AiUploadResponse>),
        (status = 400, description = "Missing fields or unsupported image"),
        (status = 403, description = "Seller only")
    ),
    security(("bearer_auth" = [])),
    tag = "AI"
)]
pub async fn ai_upload_product(
    State(state): State<AppState>,
    user: AuthUser,
    multipart: Multipart,
) -> AppResult<Json<ApiResponse<AiUploadResponse>>> {
    let form = ai_service::read_upload_form(multipart).await?;
    let resp = ai_service::ai_upload_product(&state, &user, form).await?;
    Ok(Json(resp))
}
