use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// New customer account. Sellers start here too and onboard afterwards.
#[derive(Deserialize, Debug, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email address"))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    #[schema(example = "correct-horse", min_length = 8)]
    pub password: String,
    #[serde(default)]
    #[schema(example = "Jane Doe")]
    pub name: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Ready to use as the `Authorization` header value.
    #[schema(example = "Bearer eyJhbGciOiJIUzI1NiJ9...")]
    pub token: String,
    pub role: String,
}

/// JWT payload. `role` is one of customer, seller or admin.
#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub iat: usize,
    pub exp: usize,
}
