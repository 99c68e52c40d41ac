use storefront_api::routes::health::health_check;

#[tokio::test]
async fn health_check_returns_ok() {
    let response = health_check().await;
    assert!(response.0.success);
    assert_eq!(response.0.message, "Health check");

    let data = response.0.data.expect("health data");
    assert_eq!(data.status, "ok");
}

#[test]
fn api_doc_lists_storefront_routes() {
    use utoipa::OpenApi;

    let doc = storefront_api::routes::doc::ApiDoc::openapi();
    for path in ["/api/cart/merge", "/api/orders/checkout", "/api/ai/search", "/health"] {
        assert!(doc.paths.paths.contains_key(path), "missing {path}");
    }
}

mod common;

#[tokio::test]
async fn unknown_route_returns_error_envelope_with_request_id() -> anyhow::Result<()> {
    use axum::{body::Body, http::{Request, StatusCode}};
    use storefront_api::{
        db::{create_orm_conn, create_pool},
        routes::build_app,
        state::AppState,
    };
    use tower::ServiceExt;

    let Some(url) = common::database_url() else {
        return Ok(());
    };
    let pool = create_pool(&url).await?;
    let orm = create_orm_conn(&url).await?;
    let app = build_app(AppState::new(pool, orm, common::test_config(&url))?);

    let response = app
        .oneshot(Request::builder().uri("/api/nope").body(Body::empty())?)
        .await?;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.headers().contains_key("x-request-id"));
    Ok(())
}
