use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, QuerySelect, Set};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::contact::{ContactList, ContactRequest},
    email,
    entity::contact_submissions::{ActiveModel, Column, Entity as ContactSubmissions},
    error::AppResult,
    middleware::auth::{AuthUser, ensure_admin},
    models::ContactSubmission,
    response::{ApiResponse, Meta},
    routes::params::Pagination,
    state::AppState,
};

/// Same limit as the `message` rule on [`ContactRequest`].
pub const MAX_MESSAGE_CHARS: usize = 5_000;

/// Trims every field and checks the submission is complete.
pub fn validate_contact(payload: ContactRequest) -> AppResult<ContactRequest> {
    let request = ContactRequest {
        name: payload.name.trim().to_string(),
        email: payload.email.trim().to_lowercase(),
        subject: payload.subject.trim().to_string(),
        message: payload.message.trim().to_string(),
    };
    request.validate()?;
    Ok(request)
}

pub async fn submit_contact(
    state: &AppState,
    payload: ContactRequest,
) -> AppResult<ApiResponse<ContactSubmission>> {
    let request = validate_contact(payload)?;

    let submission = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(request.name),
        email: Set(request.email),
        subject: Set(request.subject),
        message: Set(request.message),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;
    let submission = ContactSubmission::from(submission);

    match state.mailer.shop_inbox() {
        Some(inbox) => {
            let sent = match email::contact_notification(&state.config.shop_name, &submission) {
                Ok(content) => state.mailer.send(inbox, &content).await,
                Err(err) => Err(err),
            };
            if let Err(err) = sent {
                tracing::warn!(error = %err, submission_id = %submission.id, "contact notification failed");
            }
        }
        None => tracing::debug!("no shop inbox configured, skipping contact notification"),
    }

    Ok(ApiResponse::success(
        "Thanks, we will get back to you",
        submission,
        Some(Meta::empty()),
    ))
}

pub async fn list_contact_submissions(
    state: &AppState,
    user: &AuthUser,
    pagination: Pagination,
) -> AppResult<ApiResponse<ContactList>> {
    ensure_admin(user)?;
    let (page, limit, offset) = pagination.normalize();

    let finder = ContactSubmissions::find().order_by_desc(Column::CreatedAt);
    let total = finder.clone().count(&state.orm).await? as i64;
    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(ContactSubmission::from)
        .collect();

    Ok(ApiResponse::success(
        "Contact submissions",
        ContactList { items },
        Some(Meta::new(page, limit, total)),
    ))
}
