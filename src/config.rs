use std::env;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub shop_name: String,
    pub llm: LlmConfig,
    pub email: EmailConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub from_address: String,
    /// Inbox that receives contact form notifications.
    pub shop_inbox: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub endpoint: Option<String>,
    pub bucket: String,
    pub token: Option<String>,
    pub cdn_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(3000);
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET is not set"))?;
        let jwt_ttl_hours = env::var("JWT_TTL_HOURS")
            .ok()
            .and_then(|h| h.parse::<i64>().ok())
            .unwrap_or(24);

        let llm = LlmConfig {
            api_key: non_empty("LLM_API_KEY"),
            api_url: env::var("LLM_API_URL")
                .unwrap_or_else(|_| "https://api.anthropic.com/v1/messages".to_string()),
            model: env::var("LLM_MODEL")
                .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string()),
        };

        let email = EmailConfig {
            api_key: non_empty("EMAIL_API_KEY"),
            api_url: env::var("EMAIL_API_URL")
                .unwrap_or_else(|_| "https://api.resend.com/emails".to_string()),
            from_address: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "orders@example.com".to_string()),
            shop_inbox: non_empty("EMAIL_SHOP_INBOX"),
        };

        let storage = StorageConfig {
            endpoint: non_empty("STORAGE_ENDPOINT"),
            bucket: env::var("STORAGE_BUCKET").unwrap_or_else(|_| "product-images".to_string()),
            token: non_empty("STORAGE_TOKEN"),
            cdn_base_url: non_empty("CDN_BASE_URL"),
        };

        Ok(Self {
            port,
            database_url,
            host,
            jwt_secret,
            jwt_ttl_hours,
            shop_name: env::var("SHOP_NAME").unwrap_or_else(|_| "Storefront".to_string()),
            llm,
            email,
            storage,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
