use storefront_api::{
    config::AppConfig,
    db::create_pool,
    middleware::auth::{ROLE_ADMIN, ROLE_CUSTOMER, ROLE_SELLER},
    services::{auth_service::hash_password, product_service::slugify},
};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let pool = create_pool(&config.database_url).await?;
    // Ensure migrations are applied.
    sqlx::migrate!("./migrations").run(&pool).await?;

    let admin_id = ensure_user(&pool, "admin@example.com", "admin12345", "Admin", ROLE_ADMIN).await?;
    let seller_id =
        ensure_user(&pool, "seller@example.com", "seller12345", "Ferris Goods", ROLE_SELLER).await?;
    let customer_id =
        ensure_user(&pool, "customer@example.com", "customer12345", "Casey", ROLE_CUSTOMER).await?;

    ensure_seller_profile(&pool, seller_id).await?;
    seed_catalogue(&pool, seller_id).await?;
    seed_coupon(&pool).await?;

    println!(
        "Seed completed. Admin ID: {admin_id}, Seller ID: {seller_id}, Customer ID: {customer_id}"
    );
    Ok(())
}

async fn ensure_user(
    pool: &sqlx::PgPool,
    email: &str,
    password: &str,
    name: &str,
    role: &str,
) -> anyhow::Result<Uuid> {
    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let (user_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (id, email, password_hash, name, role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO UPDATE SET role = EXCLUDED.role
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(role)
    .fetch_one(pool)
    .await?;

    println!("Ensured user {email} (role={role})");
    Ok(user_id)
}

async fn ensure_seller_profile(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO seller_profiles (user_id, store_name, description, contact_email, onboarding_completed)
        VALUES ($1, $2, $3, $4, TRUE)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(seller_id)
    .bind("Ferris Goods")
    .bind("Gear for Rustaceans")
    .bind("seller@example.com")
    .execute(pool)
    .await?;
    Ok(())
}

async fn ensure_category(pool: &sqlx::PgPool, name: &str) -> anyhow::Result<Uuid> {
    let (id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO categories (id, name, slug)
        VALUES ($1, $2, $3)
        ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(slugify(name))
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_catalogue(pool: &sqlx::PgPool, seller_id: Uuid) -> anyhow::Result<()> {
    let apparel = ensure_category(pool, "Apparel").await?;
    let kitchen = ensure_category(pool, "Kitchen").await?;
    let stationery = ensure_category(pool, "Stationery").await?;
    let books = ensure_category(pool, "Books").await?;

    // Prices in cents.
    let products = vec![
        ("Axum Hoodie", "Warm hoodie for Rustaceans", 5_500, 50, apparel),
        ("Ferris Mug", "Coffee tastes better with Ferris", 1_200, 100, kitchen),
        ("Rust Sticker Pack", "Decorate your laptop", 500, 200, stationery),
        ("E-book: Async Rust", "Learn async Rust patterns", 2_500, 75, books),
        ("Borrow Checker Tee", "Limited run, almost gone", 2_000, 3, apparel),
    ];

    for (name, desc, price, stock, category_id) in products {
        let inserted: Option<(Uuid,)> = sqlx::query_as(
            r#"
            INSERT INTO products (id, seller_id, name, description, price, stock)
            SELECT $1, $2, $3, $4, $5, $6
            WHERE NOT EXISTS (SELECT 1 FROM products WHERE name = $3)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(seller_id)
        .bind(name)
        .bind(desc)
        .bind(price as i64)
        .bind(stock as i32)
        .fetch_optional(pool)
        .await?;

        if let Some((product_id,)) = inserted {
            sqlx::query(
                "INSERT INTO product_categories (product_id, category_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(product_id)
            .bind(category_id)
            .execute(pool)
            .await?;
        }
    }

    println!("Seeded catalogue");
    Ok(())
}

async fn seed_coupon(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO coupons (id, code, discount_type, value, min_order_amount, max_uses)
        VALUES ($1, 'WELCOME10', 'percent', 10, 2000, 100)
        ON CONFLICT (code) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .execute(pool)
    .await?;

    println!("Seeded coupon WELCOME10");
    Ok(())
}
