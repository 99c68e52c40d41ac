use std::collections::HashSet;

use chrono::Utc;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, ModelTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::Value;
use uuid::Uuid;

use crate::{
    audit,
    dto::products::{
        CategoryList, CompareRequest, CreateCategoryRequest, CreateProductRequest, ProductDetail,
        ProductList, UpdateProductRequest,
    },
    entity::{
        categories::{self, Entity as Categories},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        product_categories::{self, Entity as ProductCategories},
        products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_owner_or_admin, ensure_seller},
    models::{Category, Product},
    pricing::MAX_UNIT_PRICE,
    response::{ApiResponse, Meta},
    routes::params::{Pagination, ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

pub const MAX_COMPARE: usize = 4;

/// Filters shared by the catalogue listing and AI search.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Matched against name and description; any keyword may match.
    pub keywords: Vec<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub category: Option<String>,
    pub seller_id: Option<Uuid>,
}

impl From<&ProductQuery> for ProductFilter {
    fn from(query: &ProductQuery) -> Self {
        Self {
            keywords: query
                .q
                .iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            min_price: query.min_price,
            max_price: query.max_price,
            category: query.category.as_deref().and_then(normalize_slug),
            seller_id: query.seller_id,
        }
    }
}

/// Fields for a new catalogue entry, already validated.
pub struct NewProduct {
    pub seller_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: i64,
    pub stock: i32,
    pub image_url: Option<String>,
    pub ai_metadata: Option<Value>,
    pub categories: Vec<categories::Model>,
}

pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    for c in input.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.trim_end_matches('-').to_string()
}

fn normalize_slug(slug: &str) -> Option<String> {
    let slug = slug.trim().to_lowercase();
    (!slug.is_empty()).then_some(slug)
}

/// `%keyword%` with LIKE metacharacters escaped, so `50%` matches literally.
fn contains_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

fn filter_condition(filter: &ProductFilter) -> Condition {
    let mut condition = Condition::all();

    if !filter.keywords.is_empty() {
        let mut any = Condition::any();
        for keyword in &filter.keywords {
            let pattern = contains_pattern(keyword);
            any = any
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern));
        }
        condition = condition.add(any);
    }

    if let Some(min_price) = filter.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }

    if let Some(max_price) = filter.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(seller_id) = filter.seller_id {
        condition = condition.add(Column::SellerId.eq(seller_id));
    }

    if let Some(slug) = filter.category.as_deref().and_then(normalize_slug) {
        let in_category = Query::select()
            .column((ProductCategories, product_categories::Column::ProductId))
            .from(ProductCategories)
            .inner_join(
                Categories,
                Expr::col((Categories, categories::Column::Id))
                    .equals((ProductCategories, product_categories::Column::CategoryId)),
            )
            .and_where(Expr::col((Categories, categories::Column::Slug)).eq(slug.as_str()))
            .to_owned();
        condition = condition.add(Column::Id.in_subquery(in_category));
    }

    condition
}

/// Runs a filtered, sorted, paged product query. Returns the page and the total count.
pub async fn search_products<C: ConnectionTrait>(
    conn: &C,
    filter: &ProductFilter,
    sort_by: ProductSortBy,
    sort_order: SortOrder,
    pagination: Pagination,
) -> AppResult<(Vec<Product>, i64)> {
    let (_, limit, offset) = pagination.normalize();
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(filter_condition(filter));
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(conn).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(conn)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok((items, total))
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let pagination = query.pagination();
    let (page, limit, _) = pagination.normalize();
    let filter = ProductFilter::from(&query);

    let (items, total) = search_products(
        &state.orm,
        &filter,
        query.sort_by.unwrap_or(ProductSortBy::CreatedAt),
        query.sort_order.unwrap_or(SortOrder::Desc),
        pagination,
    )
    .await?;

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<ProductDetail>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let categories = product
        .find_related(Categories)
        .order_by_asc(categories::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    Ok(ApiResponse::success(
        "Product",
        ProductDetail {
            product: Product::from(product),
            categories,
        },
        None,
    ))
}

pub fn validate_product_fields(
    name: Option<&str>,
    price: Option<i64>,
    stock: Option<i32>,
) -> AppResult<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if price.is_some_and(|p| p < 0) {
        return Err(AppError::BadRequest("price must not be negative".into()));
    }
    if price.is_some_and(|p| p > MAX_UNIT_PRICE) {
        return Err(AppError::BadRequest(format!(
            "price must not exceed {MAX_UNIT_PRICE}"
        )));
    }
    if stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("stock must not be negative".into()));
    }
    Ok(())
}

/// Looks up categories by slug. Every slug must exist.
pub async fn resolve_categories<C: ConnectionTrait>(
    conn: &C,
    slugs: &[String],
) -> AppResult<Vec<categories::Model>> {
    let wanted: HashSet<String> = slugs
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    if wanted.is_empty() {
        return Ok(Vec::new());
    }

    let found = Categories::find()
        .filter(categories::Column::Slug.is_in(wanted.iter().cloned()))
        .all(conn)
        .await?;

    if found.len() != wanted.len() {
        let known: HashSet<&str> = found.iter().map(|c| c.slug.as_str()).collect();
        let mut missing: Vec<&str> = wanted
            .iter()
            .map(String::as_str)
            .filter(|slug| !known.contains(slug))
            .collect();
        missing.sort_unstable();
        return Err(AppError::BadRequest(format!(
            "Unknown categories: {}",
            missing.join(", ")
        )));
    }

    Ok(found)
}

async fn link_categories<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    categories: &[categories::Model],
) -> AppResult<()> {
    ProductCategories::delete_many()
        .filter(product_categories::Column::ProductId.eq(product_id))
        .exec(conn)
        .await?;

    if categories.is_empty() {
        return Ok(());
    }

    let rows = categories.iter().map(|c| product_categories::ActiveModel {
        product_id: Set(product_id),
        category_id: Set(c.id),
    });
    ProductCategories::insert_many(rows)
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

/// Inserts a product with its category links. Callers own the transaction.
pub async fn insert_product<C: ConnectionTrait>(
    conn: &C,
    new: NewProduct,
) -> AppResult<ProductDetail> {
    let now = Utc::now();
    let product = ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(Some(new.seller_id)),
        name: Set(new.name.trim().to_string()),
        description: Set(new.description),
        price: Set(new.price),
        stock: Set(new.stock),
        image_url: Set(new.image_url),
        ai_metadata: Set(new.ai_metadata),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(conn)
    .await?;

    link_categories(conn, product.id, &new.categories).await?;

    Ok(ProductDetail {
        product: Product::from(product),
        categories: new.categories.into_iter().map(Category::from).collect(),
    })
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    ensure_seller(user)?;
    validate_product_fields(Some(payload.name.as_str()), Some(payload.price), Some(payload.stock))?;

    let txn = state.orm.begin().await?;
    let categories = resolve_categories(&txn, &payload.categories).await?;
    let detail = insert_product(
        &txn,
        NewProduct {
            seller_id: user.user_id,
            name: payload.name,
            description: payload.description,
            price: payload.price,
            stock: payload.stock,
            image_url: payload.image_url,
            ai_metadata: None,
            categories,
        },
    )
    .await?;
    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_create",
        "products",
        serde_json::json!({ "product_id": detail.product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Product created",
        detail,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<ProductDetail>> {
    validate_product_fields(payload.name.as_deref(), payload.price, payload.stock)?;

    let txn = state.orm.begin().await?;
    let existing = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, existing.seller_id)?;

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        active.price = Set(price);
    }
    if let Some(stock) = payload.stock {
        active.stock = Set(stock);
    }
    if let Some(image_url) = payload.image_url {
        active.image_url = Set(Some(image_url));
    }
    active.updated_at = Set(Utc::now().into());
    let product = active.update(&txn).await?;

    if let Some(slugs) = payload.categories.as_ref() {
        let categories = resolve_categories(&txn, slugs).await?;
        link_categories(&txn, product.id, &categories).await?;
    }

    let categories = product
        .find_related(Categories)
        .order_by_asc(categories::Column::Name)
        .all(&txn)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    txn.commit().await?;

    audit::record(
        &state.pool,
        user.user_id,
        "product_update",
        "products",
        serde_json::json!({ "product_id": product.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Updated",
        ProductDetail {
            product: Product::from(product),
            categories,
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    ensure_owner_or_admin(user, existing.seller_id)?;

    let ordered = OrderItems::find()
        .filter(OrderItemCol::ProductId.eq(id))
        .count(&state.orm)
        .await?;
    if ordered > 0 {
        return Err(AppError::Conflict(
            "product appears in orders and cannot be deleted".into(),
        ));
    }

    let result = Products::delete_by_id(id).exec(&state.orm).await?;
    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    audit::record(
        &state.pool,
        user.user_id,
        "product_delete",
        "products",
        serde_json::json!({ "product_id": id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn validate_compare_ids(ids: &[Uuid]) -> AppResult<()> {
    if ids.len() < 2 || ids.len() > MAX_COMPARE {
        return Err(AppError::BadRequest(format!(
            "compare between 2 and {MAX_COMPARE} products"
        )));
    }
    let unique: HashSet<&Uuid> = ids.iter().collect();
    if unique.len() != ids.len() {
        return Err(AppError::BadRequest("duplicate product in comparison".into()));
    }
    Ok(())
}

pub async fn compare_products(
    state: &AppState,
    payload: CompareRequest,
) -> AppResult<ApiResponse<ProductList>> {
    validate_compare_ids(&payload.product_ids)?;

    let found: Vec<ProductModel> = Products::find()
        .filter(Column::Id.is_in(payload.product_ids.iter().copied()))
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(payload.product_ids.len());
    for id in &payload.product_ids {
        let model = found
            .iter()
            .find(|p| p.id == *id)
            .cloned()
            .ok_or(AppError::NotFound)?;
        items.push(Product::from(model));
    }

    Ok(ApiResponse::success("Comparison", ProductList { items }, None))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let items = Categories::find()
        .order_by_asc(categories::Column::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();
    Ok(ApiResponse::success("Categories", CategoryList { items }, None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    let name = payload.name.trim();
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(AppError::BadRequest("category name must not be empty".into()));
    }

    let exists = Categories::find()
        .filter(categories::Column::Slug.eq(slug.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Conflict(format!("category {slug} already exists")));
    }

    let category = categories::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        slug: Set(slug),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    audit::record(
        &state.pool,
        user.user_id,
        "category_create",
        "categories",
        serde_json::json!({ "category_id": category.id }),
    )
    .await;

    Ok(ApiResponse::success(
        "Category created",
        Category::from(category),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyword_patterns_escape_like_wildcards() {
        assert_eq!(contains_pattern("mug"), "%mug%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn category_filter_is_lowercased() {
        let query = ProductQuery {
            category: Some(" Home-Kitchen ".into()),
            ..Default::default()
        };
        assert_eq!(ProductFilter::from(&query).category.as_deref(), Some("home-kitchen"));

        let blank = ProductQuery {
            category: Some("  ".into()),
            ..Default::default()
        };
        assert_eq!(ProductFilter::from(&blank).category, None);
    }

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Home & Kitchen "), "home-kitchen");
        assert_eq!(slugify("Toys"), "toys");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn compare_needs_two_to_four_distinct_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_compare_ids(&[a]).is_err());
        assert!(validate_compare_ids(&[a, a]).is_err());
        assert!(validate_compare_ids(&[a, b]).is_ok());
        let five: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        assert!(validate_compare_ids(&five).is_err());
    }

    #[test]
    fn product_field_validation() {
        assert!(validate_product_fields(Some(" "), None, None).is_err());
        assert!(validate_product_fields(None, Some(-1), None).is_err());
        assert!(validate_product_fields(None, None, Some(-3)).is_err());
        assert!(validate_product_fields(Some("Mug"), Some(0), Some(0)).is_ok());
        assert!(validate_product_fields(None, Some(MAX_UNIT_PRICE), None).is_ok());
        assert!(validate_product_fields(None, Some(MAX_UNIT_PRICE + 1), None).is_err());
        assert!(validate_product_fields(None, Some(i64::MAX / 2), None).is_err());
    }

    #[test]
    fn query_maps_to_filter() {
        let query = ProductQuery {
            q: Some("  mug ".into()),
            category: Some(String::new()),
            min_price: Some(100),
            ..Default::default()
        };
        let filter = ProductFilter::from(&query);
        assert_eq!(filter.keywords, vec!["mug"]);
        assert!(filter.category.is_none());
        assert_eq!(filter.min_price, Some(100));
    }
}
