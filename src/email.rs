//! Transactional email over the provider's HTTP API.
//!
//! Sending is best-effort: callers log failures and carry on.

use std::sync::Arc;

use askama::Template;
use serde::Serialize;
use thiserror::Error;
use validator::ValidateEmail;

use crate::{
    config::EmailConfig,
    models::{ContactSubmission, Order, OrderItem},
};

#[derive(Debug, Error)]
pub enum EmailError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("email API rejected message ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
    text: &'a str,
}

#[derive(Clone)]
pub struct Mailer {
    inner: Option<Arc<MailerInner>>,
    shop_inbox: Option<String>,
}

struct MailerInner {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl Mailer {
    pub fn new(config: &EmailConfig) -> anyhow::Result<Self> {
        let inner = match config.api_key.as_ref() {
            Some(api_key) => {
                let client = reqwest::Client::builder()
                    .timeout(std::time::Duration::from_secs(15))
                    .build()?;
                Some(Arc::new(MailerInner {
                    client,
                    api_url: config.api_url.clone(),
                    api_key: api_key.clone(),
                    from_address: config.from_address.clone(),
                }))
            }
            None => {
                tracing::info!("EMAIL_API_KEY not set, outgoing email disabled");
                None
            }
        };
        Ok(Self {
            inner,
            shop_inbox: config.shop_inbox.clone(),
        })
    }

    pub fn disabled() -> Self {
        Self {
            inner: None,
            shop_inbox: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn shop_inbox(&self) -> Option<&str> {
        self.shop_inbox.as_deref()
    }

    pub async fn send(&self, to: &str, content: &EmailContent) -> Result<(), EmailError> {
        if !to.validate_email() {
            return Err(EmailError::InvalidAddress(to.to_string()));
        }
        let Some(inner) = self.inner.as_ref() else {
            tracing::debug!(to = %to, subject = %content.subject, "email disabled, skipping send");
            return Ok(());
        };

        let response = inner
            .client
            .post(&inner.api_url)
            .bearer_auth(&inner.api_key)
            .json(&SendRequest {
                from: &inner.from_address,
                to: [to],
                subject: &content.subject,
                html: &content.html,
                text: &content.text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EmailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::info!(to = %to, subject = %content.subject, "email sent");
        Ok(())
    }
}

pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let minor = minor.unsigned_abs();
    format!("{sign}{}.{:02}", minor / 100, minor % 100)
}

struct OrderLineView<'a> {
    name: &'a str,
    quantity: i32,
    total: String,
}

struct OrderView<'a> {
    shop_name: &'a str,
    invoice: &'a str,
    lines: Vec<OrderLineView<'a>>,
    subtotal: String,
    shipping: String,
    discount: String,
    total: String,
    address: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    order: &'a OrderView<'a>,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    order: &'a OrderView<'a>,
}

#[derive(Template)]
#[template(path = "email/contact_notification.html")]
struct ContactNotificationHtml<'a> {
    contact: &'a ContactSubmission,
}

#[derive(Template)]
#[template(path = "email/contact_notification.txt")]
struct ContactNotificationText<'a> {
    contact: &'a ContactSubmission,
}

pub fn order_confirmation(
    shop_name: &str,
    order: &Order,
    items: &[OrderItem],
) -> Result<EmailContent, EmailError> {
    let view = OrderView {
        shop_name,
        invoice: &order.invoice_number,
        lines: items
            .iter()
            .map(|item| OrderLineView {
                name: &item.product_name,
                quantity: item.quantity,
                total: format_amount(item.price.saturating_mul(i64::from(item.quantity))),
            })
            .collect(),
        subtotal: format_amount(order.subtotal),
        shipping: format_amount(order.shipping_fee),
        discount: format_amount(order.discount_amount),
        total: format_amount(order.total_amount),
        address: &order.shipping_address,
    };

    Ok(EmailContent {
        subject: format!("{shop_name}: order {} received", order.invoice_number),
        html: OrderConfirmationHtml { order: &view }.render()?,
        text: OrderConfirmationText { order: &view }.render()?,
    })
}

pub fn contact_notification(
    shop_name: &str,
    submission: &ContactSubmission,
) -> Result<EmailContent, EmailError> {
    Ok(EmailContent {
        subject: format!("[{shop_name}] Contact: {}", submission.subject),
        html: ContactNotificationHtml { contact: submission }.render()?,
        text: ContactNotificationText { contact: submission }.render()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn order() -> (Order, Vec<OrderItem>) {
        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let order = Order {
            id: order_id,
            user_id: Uuid::new_v4(),
            subtotal: 3_000,
            shipping_fee: 500,
            discount_amount: 300,
            total_amount: 3_200,
            coupon_code: Some("SAVE10".into()),
            shipping_address: "1 <Main> St".into(),
            shipping_method: "standard".into(),
            status: "pending".into(),
            payment_status: "unpaid".into(),
            invoice_number: "INV-20260101-abcdef12".into(),
            paid_at: None,
            created_at: now,
            updated_at: now,
        };
        let items = vec![OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            product_name: "Mug & Saucer".into(),
            quantity: 2,
            price: 1_500,
            created_at: now,
        }];
        (order, items)
    }

    fn submission(name: &str) -> ContactSubmission {
        ContactSubmission {
            id: Uuid::new_v4(),
            name: name.into(),
            email: "ada@example.com".into(),
            subject: "Hi".into(),
            message: "line1\nline2".into(),
            created_at: Utc::now(),
        }
    }

    fn config(api_url: String) -> EmailConfig {
        EmailConfig {
            api_key: Some("mail-key".into()),
            api_url,
            from_address: "shop@example.com".into(),
            shop_inbox: Some("inbox@example.com".into()),
        }
    }

    #[test]
    fn formats_minor_units() {
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(1_505), "15.05");
        assert_eq!(format_amount(-250), "-2.50");
        assert_eq!(format_amount(i64::MIN), "-92233720368547758.08");
    }

    #[test]
    fn order_confirmation_renders_both_bodies() {
        let (order, items) = order();
        let content = order_confirmation("Shop", &order, &items).expect("rendered");

        assert_eq!(content.subject, "Shop: order INV-20260101-abcdef12 received");
        assert!(content.text.contains("Mug & Saucer x2  30.00"));
        assert!(content.text.contains("Total: 32.00"));
        assert!(content.html.contains("Mug &amp; Saucer"));
        assert!(content.html.contains("1 &lt;Main&gt; St"));
        assert!(content.html.contains("Discount: -3.00"));
    }

    #[test]
    fn contact_notification_escapes_html_only() {
        let content = contact_notification("Shop", &submission("<script>")).expect("rendered");
        assert!(content.html.contains("&lt;script&gt;"));
        assert!(!content.html.contains("<script>"));
        assert!(content.text.starts_with("From: <script> <ada@example.com>"));
        assert!(content.text.contains("line1\nline2"));
        assert_eq!(content.subject, "[Shop] Contact: Hi");
    }

    #[tokio::test]
    async fn disabled_mailer_skips_valid_addresses() {
        let mailer = Mailer::disabled();
        let content = contact_notification("Shop", &submission("Ada")).expect("rendered");
        assert!(mailer.send("jane@example.com", &content).await.is_ok());
        assert!(matches!(
            mailer.send("nope", &content).await,
            Err(EmailError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn mailer_posts_message_to_provider() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/emails"))
            .and(header("authorization", "Bearer mail-key"))
            .and(body_partial_json(serde_json::json!({
                "from": "shop@example.com",
                "to": ["inbox@example.com"],
                "subject": "[Shop] Contact: Hi",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mailer = Mailer::new(&config(format!("{}/emails", server.uri()))).expect("mailer");
        assert!(mailer.is_enabled());
        let content = contact_notification("Shop", &submission("Ada")).expect("rendered");
        mailer
            .send("inbox@example.com", &content)
            .await
            .expect("sent");
    }

    #[tokio::test]
    async fn mailer_reports_provider_rejection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad sender"))
            .mount(&server)
            .await;

        let mailer = Mailer::new(&config(format!("{}/emails", server.uri()))).expect("mailer");
        let content = contact_notification("Shop", &submission("Ada")).expect("rendered");
        match mailer.send("inbox@example.com", &content).await {
            Err(EmailError::Rejected { status, body }) => {
                assert_eq!(status, 422);
                assert_eq!(body, "bad sender");
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
}
