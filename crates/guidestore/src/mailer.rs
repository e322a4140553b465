//! Transactional email delivery.
//!
//! The `Mailer` trait is the seam; `ApiMailer` posts to a hosted email API,
//! `NoopMailer` captures messages for tests. Sends are fire-and-forget at the
//! call sites: `send_best_effort` logs failures and never propagates them.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;

use guidestore_core::error::StoreError;
use guidestore_core::{Guide, Purchase};

/// A rendered transactional email.
#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub html: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync + fmt::Debug {
    async fn send(&self, email: Email) -> Result<(), StoreError>;
}

/// Send an email, logging instead of failing when delivery breaks.
pub async fn send_best_effort(mailer: &dyn Mailer, email: Email, context: &str) {
    let to = email.to.clone();
    if let Err(e) = mailer.send(email).await {
        tracing::warn!(error = %e, to = %to, context, "email send failed");
    }
}

// ─── API Mailer ──────────────────────────────────────────────────

/// Mailer backed by a hosted transactional email API (JSON POST, bearer key).
#[derive(Clone)]
pub struct ApiMailer {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    from: String,
}

impl fmt::Debug for ApiMailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiMailer")
            .field("api_url", &self.api_url)
            .field("from", &self.from)
            .finish()
    }
}

impl ApiMailer {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key: api_key.into(),
            from: from.into(),
        }
    }
}

#[async_trait]
impl Mailer for ApiMailer {
    async fn send(&self, email: Email) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "from": self.from,
            "to": [email.to],
            "subject": email.subject,
            "html": email.html,
            "text": email.text,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::Email(format!("email request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(StoreError::Email(format!(
                "email API rejected send ({status}): {detail}"
            )));
        }

        Ok(())
    }
}

// ─── Noop Mailer ─────────────────────────────────────────────────

/// Mailer that records every send. Test double.
#[derive(Debug, Default)]
pub struct NoopMailer {
    sent: Mutex<Vec<Email>>,
}

impl NoopMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, email: Email) -> Result<(), StoreError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

// ─── Templates ───────────────────────────────────────────────────

pub mod templates {
    use super::*;

    fn guide_link(base_url: &str, purchase: &Purchase) -> String {
        format!(
            "{base_url}/guides/{}?token={}",
            purchase.guide_id, purchase.access_token
        )
    }

    /// Receipt for a one-time purchase, one access link per guide.
    pub fn purchase_receipt(
        app_name: &str,
        base_url: &str,
        email: &str,
        purchases: &[Purchase],
        guides: &[Guide],
    ) -> Email {
        let mut html_items = String::new();
        let mut text_items = String::new();
        for purchase in purchases {
            let title = guides
                .iter()
                .find(|g| g.id == purchase.guide_id)
                .map(|g| g.title.as_str())
                .unwrap_or(purchase.guide_id.as_str());
            let link = guide_link(base_url, purchase);
            html_items.push_str(&format!("<li><a href=\"{link}\">{title}</a></li>"));
            text_items.push_str(&format!("- {title}: {link}\n"));
        }

        Email {
            to: email.to_string(),
            subject: format!("Your {app_name} guides are ready"),
            html: format!(
                "<p>Thanks for your purchase. Your guides:</p><ul>{html_items}</ul>\
                 <p>Keep this email — the links are your access keys.</p>"
            ),
            text: format!(
                "Thanks for your purchase. Your guides:\n{text_items}\
                 Keep this email — the links are your access keys.\n"
            ),
        }
    }

    /// Welcome for a new all-access subscription.
    pub fn subscription_welcome(app_name: &str, base_url: &str, email: &str) -> Email {
        Email {
            to: email.to_string(),
            subject: format!("Welcome to {app_name} All-Access"),
            html: format!(
                "<p>Your subscription is live. Every guide in the library is \
                 unlocked: <a href=\"{base_url}/guides\">browse the catalog</a>.</p>\
                 <p>Sign in with this email address to read on any device.</p>"
            ),
            text: format!(
                "Your subscription is live. Every guide in the library is unlocked: \
                 {base_url}/guides\nSign in with this email address to read on any device.\n"
            ),
        }
    }

    /// Admin reply to reader feedback.
    pub fn feedback_reply(app_name: &str, email: &str, original: &str, reply: &str) -> Email {
        Email {
            to: email.to_string(),
            subject: format!("Re: your note to {app_name}"),
            html: format!(
                "<p>{reply}</p><hr><p>You wrote:</p><blockquote>{original}</blockquote>"
            ),
            text: format!("{reply}\n\n---\nYou wrote:\n{original}\n"),
        }
    }

    /// Resend of access links for existing active purchases.
    pub fn lost_access(
        app_name: &str,
        base_url: &str,
        email: &str,
        purchases: &[Purchase],
    ) -> Email {
        let mut html_items = String::new();
        let mut text_items = String::new();
        for purchase in purchases {
            let link = guide_link(base_url, purchase);
            html_items.push_str(&format!(
                "<li><a href=\"{link}\">{}</a></li>",
                purchase.guide_id
            ));
            text_items.push_str(&format!("- {}: {link}\n", purchase.guide_id));
        }

        Email {
            to: email.to_string(),
            subject: format!("Your {app_name} access links"),
            html: format!("<p>Here are your guide access links:</p><ul>{html_items}</ul>"),
            text: format!("Here are your guide access links:\n{text_items}"),
        }
    }
}
