pub mod audit_logs;
pub mod cart_items;
pub mod categories;
pub mod contact_submissions;
pub mod coupons;
pub mod order_items;
pub mod orders;
pub mod product_categories;
pub mod products;
pub mod seller_profiles;
pub mod users;
pub mod wishlist_items;

pub use audit_logs::Entity as AuditLogs;
pub use cart_items::Entity as CartItems;
pub use categories::Entity as Categories;
pub use contact_submissions::Entity as ContactSubmissions;
pub use coupons::Entity as Coupons;
pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use product_categories::Entity as ProductCategories;
pub use products::Entity as Products;
pub use seller_profiles::Entity as SellerProfiles;
pub use users::Entity as Users;
pub use wishlist_items::Entity as WishlistItems;

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, EntityTrait, QuerySelect, QueryTrait};

    use super::*;

    #[test]
    fn product_category_links_join_both_sides() {
        let sql = ProductCategories::find()
            .inner_join(Categories)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"INNER JOIN "categories""#), "{sql}");

        let sql = ProductCategories::find()
            .inner_join(Products)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"INNER JOIN "products""#), "{sql}");
    }

    #[test]
    fn many_to_many_goes_through_link_table() {
        let sql = Products::find()
            .inner_join(Categories)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"INNER JOIN "product_categories""#), "{sql}");
        assert!(sql.contains(r#"INNER JOIN "categories""#), "{sql}");
    }

    #[test]
    fn wishlist_items_join_their_owner() {
        let sql = WishlistItems::find()
            .inner_join(Users)
            .build(DbBackend::Postgres)
            .to_string();
        assert!(
            sql.contains(r#""wishlist_items"."user_id" = "users"."id""#),
            "{sql}"
        );
    }
}
