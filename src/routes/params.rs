use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

// Query structs keep page/per_page inline: `serde(flatten)` breaks numeric
// parsing of url-encoded queries.

#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
pub struct Pagination {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    /// Returns `(page, per_page, offset)`.
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1).saturating_mul(per_page);
        (page, per_page, offset)
    }
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub q: Option<String>,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    /// Category slug.
    pub category: Option<String>,
    pub seller_id: Option<Uuid>,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

impl ProductQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct OrderListQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub status: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl OrderListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page, self.per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        assert_eq!(Pagination::default().normalize(), (1, 20, 0));
        assert_eq!(Pagination::new(Some(0), Some(500)).normalize(), (1, 100, 0));
        assert_eq!(Pagination::new(Some(3), Some(10)).normalize(), (3, 10, 20));
    }

    #[test]
    fn product_query_parses_from_url() {
        let uri: axum::http::Uri = "/products?page=2&per_page=5&min_price=100&sort_by=price&sort_order=asc"
            .parse()
            .expect("valid uri");
        let axum::extract::Query(query) =
            axum::extract::Query::<ProductQuery>::try_from_uri(&uri).expect("valid query");
        assert_eq!(query.pagination().normalize(), (2, 5, 5));
        assert_eq!(query.min_price, Some(100));
        assert!(matches!(query.sort_by, Some(ProductSortBy::Price)));
    }

    #[test]
    fn huge_page_number_saturates_offset() {
        let uri: axum::http::Uri = "/products?page=9223372036854775807&per_page=100"
            .parse()
            .expect("valid uri");
        let axum::extract::Query(query) =
            axum::extract::Query::<ProductQuery>::try_from_uri(&uri).expect("valid query");
        let (page, per_page, offset) = query.pagination().normalize();
        assert_eq!(page, i64::MAX);
        assert_eq!(per_page, 100);
        assert_eq!(offset, i64::MAX);
    }
}
