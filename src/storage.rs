//! Object storage uploads and image CDN URLs for product photos.

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

use crate::{config::StorageConfig, error::AppError};

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("image storage is not configured")]
    NotConfigured,

    #[error("unsupported image type {0}")]
    UnsupportedType(String),

    #[error("image must be between 1 byte and 5 MiB")]
    TooLarge,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage rejected upload ({0})")]
    Rejected(u16),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotConfigured => {
                AppError::ServiceUnavailable("image storage is not configured".into())
            }
            StorageError::UnsupportedType(_) | StorageError::TooLarge => {
                AppError::BadRequest(err.to_string())
            }
            other => {
                tracing::warn!(error = %other, "image upload failed");
                AppError::Upstream(other.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub key: String,
    pub url: String,
}

#[derive(Clone)]
pub struct ImageStorage {
    inner: Option<Arc<StorageInner>>,
    cdn_base_url: Option<String>,
}

struct StorageInner {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    token: Option<String>,
}

/// File extension for the image types we accept.
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}

pub fn validate_image(content_type: &str, len: usize) -> Result<&'static str, StorageError> {
    let ext = extension_for(content_type)
        .ok_or_else(|| StorageError::UnsupportedType(content_type.to_string()))?;
    if len == 0 || len > MAX_IMAGE_BYTES {
        return Err(StorageError::TooLarge);
    }
    Ok(ext)
}

impl ImageStorage {
    pub fn new(config: &StorageConfig) -> anyhow::Result<Self> {
        let inner = match config.endpoint.as_ref() {
            Some(endpoint) => Some(Arc::new(StorageInner {
                client: reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(30))
                    .build()?,
                endpoint: endpoint.trim_end_matches('/').to_string(),
                bucket: config.bucket.clone(),
                token: config.token.clone(),
            })),
            None => {
                tracing::info!("STORAGE_ENDPOINT not set, image uploads disabled");
                None
            }
        };
        Ok(Self {
            inner,
            cdn_base_url: config
                .cdn_base_url
                .as_ref()
                .map(|url| url.trim_end_matches('/').to_string()),
        })
    }

    pub fn disabled() -> Self {
        Self {
            inner: None,
            cdn_base_url: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn with_cdn(mut self, cdn_base_url: &str) -> Self {
        self.cdn_base_url = Some(cdn_base_url.trim_end_matches('/').to_string());
        self
    }

    pub async fn upload(&self, data: Bytes, content_type: &str) -> Result<StoredImage, StorageError> {
        let ext = validate_image(content_type, data.len())?;
        let inner = self.inner.as_ref().ok_or(StorageError::NotConfigured)?;

        let key = format!("products/{}.{ext}", Uuid::new_v4());
        let object_url = format!("{}/{}/{key}", inner.endpoint, inner.bucket);

        let mut request = inner
            .client
            .put(&object_url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data);
        if let Some(token) = inner.token.as_ref() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StorageError::Rejected(response.status().as_u16()));
        }

        tracing::info!(key = %key, "image uploaded");
        let url = self.cdn_url(&key, None).unwrap_or(object_url);
        Ok(StoredImage { key, url })
    }

    /// Public URL for a stored key, optionally resized by the CDN.
    pub fn cdn_url(&self, key: &str, width: Option<u32>) -> Option<String> {
        let base = match (&self.cdn_base_url, &self.inner) {
            (Some(cdn), _) => cdn.clone(),
            (None, Some(inner)) => format!("{}/{}", inner.endpoint, inner.bucket),
            (None, None) => return None,
        };
        let key = key.trim_start_matches('/');
        Some(match width {
            Some(w) => format!("{base}/{key}?w={w}&auto=format"),
            None => format!("{base}/{key}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_image_types() {
        assert_eq!(extension_for("image/png"), Some("png"));
        assert_eq!(extension_for("image/jpeg"), Some("jpg"));
        assert_eq!(extension_for("application/pdf"), None);
    }

    #[test]
    fn rejects_oversized_and_empty_images() {
        assert!(matches!(validate_image("image/png", 0), Err(StorageError::TooLarge)));
        assert!(matches!(
            validate_image("image/png", MAX_IMAGE_BYTES + 1),
            Err(StorageError::TooLarge)
        ));
        assert!(validate_image("image/webp", 1024).is_ok());
    }

    #[test]
    fn cdn_url_adds_transform_params() {
        let storage = ImageStorage::disabled().with_cdn("https://cdn.example.com/");
        assert_eq!(
            storage.cdn_url("/products/a.png", Some(400)).as_deref(),
            Some("https://cdn.example.com/products/a.png?w=400&auto=format")
        );
        assert_eq!(
            storage.cdn_url("products/a.png", None).as_deref(),
            Some("https://cdn.example.com/products/a.png")
        );
    }

    #[test]
    fn no_cdn_and_no_storage_means_no_url() {
        assert!(ImageStorage::disabled().cdn_url("products/a.png", None).is_none());
    }

    #[tokio::test]
    async fn upload_without_storage_is_unavailable() {
        let err = ImageStorage::disabled()
            .upload(Bytes::from_static(b"png"), "image/png")
            .await
            .expect_err("storage disabled");
        assert!(matches!(err, StorageError::NotConfigured));
    }

    fn storage_config(endpoint: String) -> StorageConfig {
        StorageConfig {
            endpoint: Some(endpoint),
            bucket: "media".into(),
            token: Some("store-token".into()),
            cdn_base_url: None,
        }
    }

    #[tokio::test]
    async fn upload_puts_object_under_products_prefix() {
        use wiremock::matchers::{header, method, path_regex};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/media/products/[0-9a-f-]{36}\.webp$"))
            .and(header("authorization", "Bearer store-token"))
            .and(header("content-type", "image/webp"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = ImageStorage::new(&storage_config(server.uri())).expect("storage");
        let stored = storage
            .upload(Bytes::from_static(b"webp-bytes"), "image/webp")
            .await
            .expect("uploaded");

        assert!(stored.key.starts_with("products/"));
        assert!(stored.key.ends_with(".webp"));
        // No CDN configured: the object URL itself is returned.
        assert_eq!(stored.url, format!("{}/media/{}", server.uri(), stored.key));
    }

    #[tokio::test]
    async fn rejected_upload_reports_status() {
        use wiremock::matchers::method;
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let storage = ImageStorage::new(&storage_config(server.uri())).expect("storage");
        let err = storage
            .upload(Bytes::from_static(b"png"), "image/png")
            .await
            .expect_err("rejected");
        assert!(matches!(err, StorageError::Rejected(403)));
        assert!(matches!(AppError::from(err), AppError::Upstream(_)));
    }
}
