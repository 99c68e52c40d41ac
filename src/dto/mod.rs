pub mod admin;
pub mod ai;
pub mod auth;
pub mod cart;
pub mod contact;
pub mod coupons;
pub mod orders;
pub mod products;
pub mod seller;
pub mod wishlist;
