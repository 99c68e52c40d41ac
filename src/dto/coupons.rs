use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::Coupon;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CouponPreview {
    pub code: String,
    pub discount: i64,
    pub subtotal_after_discount: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCouponRequest {
    pub code: String,
    /// `percent` or `fixed`.
    pub discount_type: String,
    pub value: i64,
    #[serde(default)]
    pub min_order_amount: i64,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
#[serde(transparent)]
pub struct CouponList {
    #[schema(value_type = Vec<Coupon>)]
    pub items: Vec<Coupon>,
}
