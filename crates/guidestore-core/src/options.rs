// StoreOptions — the main configuration struct.
//
// One struct per concern (checkout, admin, rate limiting, email), assembled
// into the top-level options with builder methods for the common overrides.

use serde::{Deserialize, Serialize};

/// Top-level configuration for the storefront backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreOptions {
    /// Secret key for signing admin session cookies and identity tokens
    /// (min 32 chars in production).
    pub secret: String,

    /// Base URL of the storefront (e.g., "https://guides.example.com").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path prefix for all API routes (default: "/api/store").
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// App name used in email branding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    /// Checkout session configuration.
    #[serde(default)]
    pub checkout: CheckoutOptions,

    /// Admin back-office configuration.
    #[serde(default)]
    pub admin: AdminOptions,

    /// Rate limiting configuration.
    #[serde(default)]
    pub rate_limit: RateLimitOptions,

    /// Transactional email configuration.
    #[serde(default)]
    pub email: EmailOptions,

    /// Subscription plans offered at checkout.
    #[serde(default = "default_plans")]
    pub plans: Vec<PlanOptions>,
}

fn default_base_path() -> String {
    "/api/store".to_string()
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            secret: String::new(),
            base_url: None,
            base_path: default_base_path(),
            app_name: None,
            checkout: CheckoutOptions::default(),
            admin: AdminOptions::default(),
            rate_limit: RateLimitOptions::default(),
            email: EmailOptions::default(),
            plans: default_plans(),
        }
    }
}

impl StoreOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn admin_password(mut self, password: impl Into<String>) -> Self {
        self.admin.password = password.into();
        self
    }

    /// Find a subscription plan by id.
    pub fn find_plan(&self, plan_id: &str) -> Option<&PlanOptions> {
        self.plans.iter().find(|p| p.id == plan_id)
    }
}

// ─── Checkout Options ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOptions {
    /// URL the payment provider redirects to after a successful checkout.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// URL the payment provider redirects to when checkout is cancelled.
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    /// ISO currency code for all prices.
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_success_url() -> String {
    "/checkout/success".to_string()
}

fn default_cancel_url() -> String {
    "/checkout/cancel".to_string()
}

fn default_currency() -> String {
    "usd".to_string()
}

impl Default for CheckoutOptions {
    fn default() -> Self {
        Self {
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            currency: default_currency(),
        }
    }
}

// ─── Admin Options ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminOptions {
    /// Shared back-office password. Compared in constant time.
    #[serde(default)]
    pub password: String,

    /// Header carrying the shared password for header-based admin auth.
    #[serde(default = "default_admin_header")]
    pub password_header: String,

    /// Name of the signed admin session cookie.
    #[serde(default = "default_admin_cookie")]
    pub session_cookie: String,

    /// Header carrying the CSRF token for cookie-based admin auth.
    #[serde(default = "default_csrf_header")]
    pub csrf_header: String,

    /// Admin session TTL in seconds (default: 43200 = 12 hours).
    #[serde(default = "default_admin_session_ttl")]
    pub session_ttl: u64,
}

fn default_admin_header() -> String {
    "x-admin-key".to_string()
}

fn default_admin_cookie() -> String {
    "guidestore.admin_session".to_string()
}

fn default_csrf_header() -> String {
    "x-csrf-token".to_string()
}

fn default_admin_session_ttl() -> u64 {
    43_200
}

impl Default for AdminOptions {
    fn default() -> Self {
        Self {
            password: String::new(),
            password_header: default_admin_header(),
            session_cookie: default_admin_cookie(),
            csrf_header: default_csrf_header(),
            session_ttl: default_admin_session_ttl(),
        }
    }
}

// ─── Rate Limit Options ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    /// Enable rate limiting (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Admin login attempts: window in seconds / max attempts per window.
    #[serde(default = "default_login_window")]
    pub login_window: u64,
    #[serde(default = "default_login_max")]
    pub login_max: u64,

    /// Lost-access resend attempts: window in seconds / max per window.
    #[serde(default = "default_resend_window")]
    pub resend_window: u64,
    #[serde(default = "default_resend_max")]
    pub resend_max: u64,
}

fn default_true() -> bool {
    true
}

fn default_login_window() -> u64 {
    600
}

fn default_login_max() -> u64 {
    5
}

fn default_resend_window() -> u64 {
    3_600
}

fn default_resend_max() -> u64 {
    5
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            login_window: default_login_window(),
            login_max: default_login_max(),
            resend_window: default_resend_window(),
            resend_max: default_resend_max(),
        }
    }
}

// ─── Email Options ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailOptions {
    /// Endpoint of the hosted transactional email API.
    #[serde(default = "default_email_api_url")]
    pub api_url: String,

    /// Sender address for all transactional email.
    #[serde(default = "default_email_from")]
    pub from: String,
}

fn default_email_api_url() -> String {
    "https://api.resend.com/emails".to_string()
}

fn default_email_from() -> String {
    "Guidestore <no-reply@guidestore.app>".to_string()
}

impl Default for EmailOptions {
    fn default() -> Self {
        Self {
            api_url: default_email_api_url(),
            from: default_email_from(),
        }
    }
}

// ─── Plan Options ────────────────────────────────────────────────

/// A subscription plan offered at checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanOptions {
    /// Plan id used in checkout requests (e.g., "monthly").
    pub id: String,
    /// Display name used on the hosted checkout page.
    pub name: String,
    /// Price in cents.
    pub amount: i64,
    /// Billing interval: "month" or "year".
    pub interval: String,
}

fn default_plans() -> Vec<PlanOptions> {
    vec![
        PlanOptions {
            id: "monthly".into(),
            name: "All-Access Monthly".into(),
            amount: 1_499,
            interval: "month".into(),
        },
        PlanOptions {
            id: "yearly".into(),
            name: "All-Access Yearly".into(),
            amount: 9_900,
            interval: "year".into(),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = StoreOptions::default();
        assert_eq!(opts.base_path, "/api/store");
        assert_eq!(opts.checkout.currency, "usd");
        assert_eq!(opts.admin.password_header, "x-admin-key");
        assert!(opts.rate_limit.enabled);
        assert_eq!(opts.plans.len(), 2);
    }

    #[test]
    fn builder_chain() {
        let opts = StoreOptions::new("a-secret-of-at-least-32-characters!!")
            .base_url("https://guides.example.com")
            .admin_password("hunter2");
        assert_eq!(opts.base_url.as_deref(), Some("https://guides.example.com"));
        assert_eq!(opts.admin.password, "hunter2");
    }

    #[test]
    fn find_plan() {
        let opts = StoreOptions::default();
        assert!(opts.find_plan("monthly").is_some());
        assert!(opts.find_plan("weekly").is_none());
    }

    #[test]
    fn deserializes_with_partial_fields() {
        let opts: StoreOptions =
            serde_json::from_str(r#"{"secret":"s","admin":{"password":"p"}}"#).unwrap();
        assert_eq!(opts.admin.password, "p");
        assert_eq!(opts.admin.session_ttl, 43_200);
        assert_eq!(opts.email.from, "Guidestore <no-reply@guidestore.app>");
    }
}
