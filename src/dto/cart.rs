use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Product;

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateCartItemRequest {
    pub quantity: i32,
}

/// One line of the cart a shopper built before signing in.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct GuestCartLine {
    pub product_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MergeCartRequest {
    pub items: Vec<GuestCartLine>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartItemDto {
    pub id: Uuid,
    pub product: Product,
    pub quantity: i32,
    pub line_total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    pub item_count: i64,
    pub subtotal: i64,
    pub shipping_estimate: i64,
    pub total: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartList {
    pub items: Vec<CartItemDto>,
    pub summary: CartSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MergeCartResponse {
    pub cart: CartList,
    /// Guest lines that could not be merged (unknown product, no stock, bad quantity).
    pub skipped: Vec<Uuid>,
}
