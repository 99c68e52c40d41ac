use axum::{extract::FromRequestParts, http::header};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError, state::AppState};

pub const ROLE_CUSTOMER: &str = "customer";
pub const ROLE_SELLER: &str = "seller";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

pub fn ensure_role(user: &AuthUser, role: &str) -> Result<(), AppError> {
    if user.role != role {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    ensure_role(user, ROLE_ADMIN)
}

/// Sellers and admins may manage catalogue entries.
pub fn ensure_seller(user: &AuthUser) -> Result<(), AppError> {
    if user.role == ROLE_SELLER || user.is_admin() {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

/// Owner of a resource, or an admin.
pub fn ensure_owner_or_admin(user: &AuthUser, owner_id: Option<Uuid>) -> Result<(), AppError> {
    if user.is_admin() || owner_id == Some(user.user_id) {
        return Ok(());
    }
    Err(AppError::Forbidden)
}

pub fn issue_token(
    secret: &str,
    ttl_hours: i64,
    user_id: Uuid,
    role: &str,
) -> Result<String, AppError> {
    let now = Utc::now();
    let expiration = now
        .checked_add_signed(Duration::hours(ttl_hours))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        iat: now.timestamp() as usize,
        exp: expiration.timestamp() as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))
}

pub fn verify_token(secret: &str, token: &str) -> Result<AuthUser, AppError> {
    let decoded = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized)?;

    let user_id = Uuid::parse_str(&decoded.claims.sub).map_err(|_| AppError::Unauthorized)?;

    Ok(AuthUser {
        user_id,
        role: decoded.claims.role,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or(AppError::Unauthorized)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::BadRequest("Invalid Authorization header".into()))?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::BadRequest("Invalid Authorization scheme".into()))?
            .trim();

        verify_token(&state.config.jwt_secret, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn issued_token_round_trips_claims() {
        let user_id = Uuid::new_v4();
        let token = issue_token(SECRET, 1, user_id, ROLE_SELLER).expect("token");
        let user = verify_token(SECRET, &token).expect("valid token");
        assert_eq!(user.user_id, user_id);
        assert_eq!(user.role, ROLE_SELLER);
    }

    #[test]
    fn token_signed_with_other_secret_is_rejected() {
        let token = issue_token("other", 1, Uuid::new_v4(), ROLE_CUSTOMER).expect("token");
        assert!(matches!(verify_token(SECRET, &token), Err(AppError::Unauthorized)));
    }

    #[test]
    fn admins_pass_seller_and_owner_checks() {
        let admin = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_ADMIN.into(),
        };
        assert!(ensure_seller(&admin).is_ok());
        assert!(ensure_owner_or_admin(&admin, Some(Uuid::new_v4())).is_ok());
    }

    #[test]
    fn customers_cannot_sell_or_touch_others_products() {
        let customer = AuthUser {
            user_id: Uuid::new_v4(),
            role: ROLE_CUSTOMER.into(),
        };
        assert!(ensure_seller(&customer).is_err());
        assert!(ensure_owner_or_admin(&customer, None).is_err());
        assert!(ensure_owner_or_admin(&customer, Some(customer.user_id)).is_ok());
    }
}
