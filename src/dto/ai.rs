use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    ai::{RecognizedProduct, SearchInterpretation},
    models::Product,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AiSearchRequest {
    pub query: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AiSearchResponse {
    pub interpretation: SearchInterpretation,
    pub items: Vec<Product>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AiUploadResponse {
    pub product: Product,
    pub recognized: RecognizedProduct,
}

/// Multipart form accepted by the AI upload endpoint (documentation only).
#[derive(Debug, ToSchema)]
pub struct AiUploadForm {
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
    /// Falls back to the recognized suggested price.
    pub price: Option<i64>,
    pub stock: i32,
}
