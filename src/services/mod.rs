pub mod admin_service;
pub mod ai_service;
pub mod auth_service;
pub mod cart_service;
pub mod contact_service;
pub mod coupon_service;
pub mod order_service;
pub mod product_service;
pub mod seller_service;
pub mod wishlist_service;
