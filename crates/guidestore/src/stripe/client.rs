//! Thin client for the Stripe REST API.
//!
//! Covers the two calls the storefront needs: creating hosted checkout
//! sessions and fetching subscription objects. Requests are form-encoded
//! with Stripe's bracketed key syntax and bearer-authorized with the
//! secret key.

use async_trait::async_trait;

use guidestore_core::error::StoreError;
use guidestore_core::options::PlanOptions;
use guidestore_core::Guide;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// A created hosted checkout session.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

/// Fetches full subscription objects from the payment provider.
///
/// The reconciler depends on this seam rather than the concrete client so
/// subscription-mode checkout events can be processed against canned objects
/// in tests.
#[async_trait]
pub trait SubscriptionFetcher: Send + Sync {
    async fn subscription(&self, subscription_id: &str) -> Result<serde_json::Value, StoreError>;
}

/// Stripe API client.
#[derive(Debug, Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl StripeClient {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            secret_key: secret_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    /// Point the client at a different API base (stub servers in tests).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Create from `STRIPE_SECRET_KEY`.
    pub fn from_env() -> Result<Self, StoreError> {
        let secret_key = guidestore_core::env::get_stripe_secret_key_from_env()
            .ok_or_else(|| StoreError::Config("STRIPE_SECRET_KEY not set".into()))?;
        Ok(Self::new(secret_key))
    }

    /// Create a one-time checkout session with one line item per guide.
    ///
    /// The purchased guide ids and email ride along in the session metadata
    /// so the webhook reconciler can create purchase records without extra
    /// lookups.
    pub async fn create_guide_checkout(
        &self,
        email: &str,
        guides: &[Guide],
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("customer_email".into(), email.into()),
            ("success_url".into(), success_url.into()),
            ("cancel_url".into(), cancel_url.into()),
        ];

        for (i, guide) in guides.iter().enumerate() {
            form.push((format!("line_items[{i}][quantity]"), "1".into()));
            form.push((
                format!("line_items[{i}][price_data][currency]"),
                currency.into(),
            ));
            form.push((
                format!("line_items[{i}][price_data][unit_amount]"),
                guide.price.to_string(),
            ));
            form.push((
                format!("line_items[{i}][price_data][product_data][name]"),
                guide.title.clone(),
            ));
        }

        let guide_ids: Vec<&str> = guides.iter().map(|g| g.id.as_str()).collect();
        form.push(("metadata[guideIds]".into(), guide_ids.join(",")));
        form.push(("metadata[email]".into(), email.into()));

        self.create_checkout_session(form).await
    }

    /// Create a recurring checkout session for a subscription plan.
    pub async fn create_subscription_checkout(
        &self,
        plan: &PlanOptions,
        email: &str,
        user_id: Option<&str>,
        currency: &str,
        success_url: &str,
        cancel_url: &str,
    ) -> Result<CheckoutSession, StoreError> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "subscription".into()),
            ("customer_email".into(), email.into()),
            ("success_url".into(), success_url.into()),
            ("cancel_url".into(), cancel_url.into()),
            ("line_items[0][quantity]".into(), "1".into()),
            ("line_items[0][price_data][currency]".into(), currency.into()),
            (
                "line_items[0][price_data][unit_amount]".into(),
                plan.amount.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                plan.name.clone(),
            ),
            (
                "line_items[0][price_data][recurring][interval]".into(),
                plan.interval.clone(),
            ),
            ("metadata[plan]".into(), plan.id.clone()),
            ("metadata[email]".into(), email.into()),
        ];

        if let Some(user_id) = user_id {
            form.push(("metadata[userId]".into(), user_id.into()));
        }

        self.create_checkout_session(form).await
    }

    async fn create_checkout_session(
        &self,
        form: Vec<(String, String)>,
    ) -> Result<CheckoutSession, StoreError> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| StoreError::Payment(format!("checkout session request failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StoreError::Payment(format!("checkout session response unreadable: {e}")))?;

        if !status.is_success() {
            let detail = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(StoreError::Payment(format!(
                "checkout session rejected ({status}): {detail}"
            )));
        }

        let session_id = body["id"]
            .as_str()
            .ok_or_else(|| StoreError::Payment("checkout session missing id".into()))?
            .to_string();
        let checkout_url = body["url"]
            .as_str()
            .ok_or_else(|| StoreError::Payment("checkout session missing url".into()))?
            .to_string();

        Ok(CheckoutSession {
            session_id,
            url: checkout_url,
        })
    }
}

#[async_trait]
impl SubscriptionFetcher for StripeClient {
    async fn subscription(&self, subscription_id: &str) -> Result<serde_json::Value, StoreError> {
        let url = format!("{}/v1/subscriptions/{subscription_id}", self.api_base);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| StoreError::Payment(format!("subscription fetch failed: {e}")))?;

        let status = response.status();
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| StoreError::Payment(format!("subscription response unreadable: {e}")))?;

        if !status.is_success() {
            let detail = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(StoreError::Payment(format!(
                "subscription fetch rejected ({status}): {detail}"
            )));
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_base_override() {
        let client = StripeClient::new("sk_test_x").with_api_base("http://127.0.0.1:9");
        assert_eq!(client.api_base, "http://127.0.0.1:9");
    }

    #[test]
    fn checkout_session_serde() {
        let session = CheckoutSession {
            session_id: "cs_test_123".into(),
            url: "https://checkout.stripe.com/c/pay/cs_test_123".into(),
        };
        let v = serde_json::to_value(&session).unwrap();
        assert_eq!(v["session_id"], "cs_test_123");
    }
}
