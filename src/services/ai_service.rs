use axum::extract::Multipart;
use bytes::Bytes;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};

use crate::{
    ai::{RecognizedProduct, SearchInterpretation, extract_json, prompts},
    audit,
    dto::ai::{AiSearchRequest, AiSearchResponse, AiUploadResponse},
    entity::categories::{Column as CategoryCol, Entity as Categories},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_seller},
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductSortBy, SortOrder},
    services::product_service::{
        NewProduct, ProductFilter, insert_product, search_products, validate_product_fields,
    },
    state::AppState,
    storage::{StorageError, validate_image},
};

const MAX_SEARCH_RESULTS: i64 = 50;

/// An image posted as multipart form data.
pub struct ImageUpload {
    pub data: Bytes,
    pub content_type: String,
}

pub struct UploadForm {
    pub image: ImageUpload,
    pub price: Option<i64>,
    pub stock: i32,
}

async fn category_slugs(state: &AppState) -> AppResult<Vec<String>> {
    Ok(Categories::find()
        .order_by_asc(CategoryCol::Slug)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|c| c.slug)
        .collect())
}

pub async fn ai_search(
    state: &AppState,
    payload: AiSearchRequest,
) -> AppResult<ApiResponse<AiSearchResponse>> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err(AppError::BadRequest("query must not be empty".into()));
    }

    let slugs = category_slugs(state).await?;
    let reply = state
        .llm
        .complete(prompts::SEARCH_SYSTEM, &prompts::search_prompt(query, &slugs))
        .await?;
    let mut interpretation = SearchInterpretation::from_value(&extract_json(&reply)?)?;

    // Only filter on categories the shop actually has.
    if interpretation
        .category
        .as_ref()
        .is_some_and(|c| !slugs.contains(c))
    {
        interpretation.category = None;
    }

    tracing::debug!(query, ?interpretation, "AI search interpreted");

    let filter = ProductFilter {
        keywords: interpretation.keywords.clone(),
        min_price: interpretation.min_price,
        max_price: interpretation.max_price,
        category: interpretation.category.clone(),
        seller_id: None,
    };
    let limit = payload.limit.unwrap_or(20).clamp(1, MAX_SEARCH_RESULTS);
    let (items, total) = search_products(
        &state.orm,
        &filter,
        ProductSortBy::CreatedAt,
        SortOrder::Desc,
        Pagination::new(Some(1), Some(limit)),
    )
    .await?;

    Ok(ApiResponse::success(
        "AI search",
        AiSearchResponse {
            interpretation,
            items,
        },
        Some(Meta::new(1, limit, total)),
    ))
}

/// Runs the vision model over a product photo. Returns the parsed result and the raw JSON.
async fn recognize(
    state: &AppState,
    image: &ImageUpload,
) -> AppResult<(RecognizedProduct, serde_json::Value)> {
    validate_image(&image.content_type, image.data.len())?;

    let slugs = category_slugs(state).await?;
    let reply = state
        .llm
        .describe_image(
            prompts::RECOGNIZE_SYSTEM,
            &prompts::recognize_prompt(&slugs),
            &image.data,
            &image.content_type,
        )
        .await?;
    let raw = extract_json(&reply)?;
    let recognized = RecognizedProduct::from_value(&raw)?;
    Ok((recognized, raw))
}

pub async fn recognize_product(
    state: &AppState,
    user: &AuthUser,
    image: ImageUpload,
) -> AppResult<ApiResponse<RecognizedProduct>> {
    ensure_seller(user)?;
    let (recognized, _) = recognize(state, &image).await?;
    Ok(ApiResponse::success("Recognized", recognized, None))
}

pub async fn ai_upload_product(
    state: &AppState,
    user: &AuthUser,
    form: UploadForm,
) -> AppResult<ApiResponse<AiUploadResponse>> {
    ensure_seller(user)?;
    validate_product_fields(None, form.price, Some(form.stock))?;
    // Recognition is a paid call; refuse before making it if the photo cannot be stored.
    if !state.storage.is_enabled() {
        return Err(StorageError::NotConfigured.into());
    }

    let (recognized, raw) = recognize(state, &form.image).await?;
    let price = form
        .price
        .or(recognized.suggested_price)
        .ok_or_else(|| AppError::BadRequest("price is required".into()))?;
    validate_product_fields(Some(&recognized.name), Some(price), None)?;

    let stored = state
        .storage
        .upload(form.image.data, &form.image.content_type)
        .await?;

    let txn = state.orm.begin().await?;
    let categories = match recognized.category.as_deref() {
        Some(slug) => Categories::find()
            .filter(CategoryCol::Slug.eq(slug))
            .all(&txn)
            .await?,
        None => Vec::new(),
    };
    let detail = insert_product(
        &txn,
        NewProduct {
            seller_id: user.user_id,
            name: recognized.name.clone(),
            description: Some(recognized.description.clone()).filter(|d| !d.is_empty()),
            price,
            stock: form.stock,
            image_url: Some(stored.url),
            ai_metadata: Some(raw),
            categories,
        },
    )
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_ai_upload",
        "products",
        serde_json::json!({ "product_id": detail.product.id, "image_key": stored.key }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created from image",
        AiUploadResponse {
            product: detail.product,
            recognized,
        },
        Some(Meta::empty()),
    ))
}

fn multipart_error(err: impl std::fmt::Display) -> AppError {
    AppError::BadRequest(format!("invalid multipart body: {err}"))
}

/// Reads an `image` file field plus optional `price` and `stock` text fields.
pub async fn read_upload_form(mut multipart: Multipart) -> AppResult<UploadForm> {
    let mut image = None;
    let mut price = None;
    let mut stock = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(multipart_error)?;
                image = Some(ImageUpload { data, content_type });
            }
            "price" => {
                let text = field.text().await.map_err(multipart_error)?;
                price = Some(parse_number::<i64>("price", &text)?);
            }
            "stock" => {
                let text = field.text().await.map_err(multipart_error)?;
                stock = Some(parse_number::<i32>("stock", &text)?);
            }
            _ => {}
        }
    }

    Ok(UploadForm {
        image: image.ok_or_else(|| AppError::BadRequest("image field is required".into()))?,
        price,
        stock: stock.ok_or_else(|| AppError::BadRequest("stock field is required".into()))?,
    })
}

/// Reads just the `image` field.
pub async fn read_image(multipart: Multipart) -> AppResult<ImageUpload> {
    let mut multipart = multipart;
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() == Some("image") {
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let data = field.bytes().await.map_err(multipart_error)?;
            return Ok(ImageUpload { data, content_type });
        }
    }
    Err(AppError::BadRequest("image field is required".into()))
}

fn parse_number<T: std::str::FromStr>(field: &str, text: &str) -> AppResult<T> {
    text.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{field} must be a whole number")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_form_fields() {
        assert_eq!(parse_number::<i64>("price", " 1999 ").expect("number"), 1999);
        assert!(parse_number::<i32>("stock", "ten").is_err());
    }
}
