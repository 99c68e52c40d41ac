use axum::{
    Json, Router,
    extract::State,
    routing::post,
};

use crate::{
    dto::contact::ContactRequest,
    error::AppResult,
    models::ContactSubmission,
    response::ApiResponse,
    services::contact_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(submit_contact))
}

#[utoipa::path(
    post,
    path = "/api/contact",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message stored and forwarded to the shop", body = ApiResponse<ContactSubmission>),
        (status = 400, description = "Missing fields, bad email or message too long")
    ),
    tag = "Contact"
)]
pub async fn submit_contact(
    State(state): State<AppState>,
    Json(payload): Json<ContactRequest>,
) -> AppResult<Json<ApiResponse<ContactSubmission>>> {
    let resp = contact_service::submit_contact(&state, payload).await?;
    Ok(Json(resp))
}
