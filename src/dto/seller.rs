use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::SellerProfile;

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct StartOnboardingRequest {
    #[validate(length(min = 1, message = "store_name is required"))]
    pub store_name: String,
    pub description: Option<String>,
    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OnboardingComplete {
    pub profile: SellerProfile,
    /// Fresh token carrying the seller role.
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SellerDashboard {
    pub product_count: i64,
    pub units_sold: i64,
    pub revenue: i64,
    pub low_stock_count: i64,
}

#[derive(Debug, Serialize, ToSchema, sqlx::FromRow)]
pub struct SellerOrderLine {
    pub order_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub price: i64,
    pub ordered_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SellerOrderList {
    #[schema(value_type = Vec<SellerOrderLine>)]
    pub items: Vec<SellerOrderLine>,
}
