#![allow(dead_code)]

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Set, Statement};
use storefront_api::{
    config::{AppConfig, EmailConfig, LlmConfig, StorageConfig},
    db::{create_orm_conn, create_pool, run_migrations},
    entity::{products::ActiveModel as ProductActive, users::ActiveModel as UserActive},
    middleware::auth::AuthUser,
    state::AppState,
};
use uuid::Uuid;

/// Database URL for flow tests, or `None` to skip them.
pub fn database_url() -> Option<String> {
    match std::env::var("TEST_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL")) {
        Ok(url) => Some(url),
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests.");
            None
        }
    }
}

pub fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test-secret".into(),
        jwt_ttl_hours: 1,
        shop_name: "Test Shop".into(),
        llm: LlmConfig {
            api_key: None,
            api_url: "http://localhost/v1/messages".into(),
            model: "test-model".into(),
        },
        email: EmailConfig {
            api_key: None,
            api_url: "http://localhost/emails".into(),
            from_address: "shop@example.com".into(),
            shop_inbox: None,
        },
        storage: StorageConfig {
            endpoint: None,
            bucket: "test".into(),
            token: None,
            cdn_base_url: None,
        },
    }
}

/// Fresh schema and empty tables. External services stay disabled.
pub async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    setup_state_with(database_url, test_config(database_url)).await
}

/// Like [`setup_state`], with a caller-supplied config (e.g. pointing at mock services).
pub async fn setup_state_with(database_url: &str, config: AppConfig) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, wishlist_items, product_categories, \
         categories, coupons, seller_profiles, contact_submissions, audit_logs, products, users \
         RESTART IDENTITY CASCADE",
    ))
    .await?;

    let pool = create_pool(database_url).await?;
    AppState::new(pool, orm, config)
}

pub async fn create_user(state: &AppState, role: &str, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        name: Set(email.split('@').next().unwrap_or_default().to_string()),
        role: Set(role.into()),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role: user.role,
    })
}

pub async fn create_product(
    state: &AppState,
    seller_id: Option<Uuid>,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        name: Set(name.into()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        stock: Set(stock),
        image_url: Set(None),
        ai_metadata: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(product.id)
}
