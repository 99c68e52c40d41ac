use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::ContactSubmission;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ContactRequest {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "subject is required"))]
    pub subject: String,
    #[validate(length(
        min = 1,
        max = 5000,
        message = "message is required and must be at most 5000 characters"
    ))]
    #[schema(max_length = 5000)]
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ContactList {
    #[schema(value_type = Vec<ContactSubmission>)]
    pub items: Vec<ContactSubmission>,
}
