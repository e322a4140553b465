//! Admin identity — one capability, pluggable mechanisms.
//!
//! Every back-office endpoint authorizes through the single `AdminIdentity`
//! seam. Two mechanisms exist: a shared-secret header and a signed session
//! cookie paired with a CSRF header. The composite tries them in order; no
//! endpoint carries its own ad-hoc checks.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use guidestore_core::counter::{check_rate_limit, RateLimitRule, RateLimitStore};
use guidestore_core::error::{ApiError, ErrorCode};
use guidestore_core::options::{AdminOptions, RateLimitOptions};
use guidestore_core::utils::id::generate_session_token;

type HmacSha256 = Hmac<Sha256>;

/// The request material an admin mechanism inspects: headers, lowercased.
#[derive(Debug, Clone, Default)]
pub struct AdminRequestParts {
    headers: HashMap<String, String>,
}

impl AdminRequestParts {
    pub fn new(headers: HashMap<String, String>) -> Self {
        Self { headers }
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        Self {
            headers: pairs
                .into_iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Pull one cookie out of the `Cookie` header.
    pub fn cookie(&self, name: &str) -> Option<String> {
        let header = self.header("cookie")?;
        for cookie in header.split(';') {
            let cookie = cookie.trim();
            if let Some((cookie_name, value)) = cookie.split_once('=') {
                if cookie_name.trim() == name {
                    return Some(value.to_string());
                }
            }
        }
        None
    }
}

/// Outcome of one mechanism inspecting a request.
#[derive(Debug)]
pub enum AdminDecision {
    /// Credentials present and valid.
    Granted,
    /// This mechanism's credentials are absent; try the next one.
    NotApplicable,
    /// Credentials present but wrong.
    Denied(ApiError),
}

/// The admin identity capability.
#[async_trait]
pub trait AdminIdentity: Send + Sync + fmt::Debug {
    async fn authorize(&self, parts: &AdminRequestParts) -> AdminDecision;
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    subtle::ConstantTimeEq::ct_eq(a.as_bytes(), b.as_bytes()).into()
}

// ─── Password Header Mechanism ───────────────────────────────────

/// Shared-secret header, compared in constant time.
#[derive(Clone)]
pub struct PasswordHeaderIdentity {
    header: String,
    password: String,
}

impl fmt::Debug for PasswordHeaderIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHeaderIdentity")
            .field("header", &self.header)
            .finish()
    }
}

impl PasswordHeaderIdentity {
    pub fn new(options: &AdminOptions) -> Self {
        Self {
            header: options.password_header.clone(),
            password: options.password.clone(),
        }
    }
}

#[async_trait]
impl AdminIdentity for PasswordHeaderIdentity {
    async fn authorize(&self, parts: &AdminRequestParts) -> AdminDecision {
        let Some(presented) = parts.header(&self.header) else {
            return AdminDecision::NotApplicable;
        };
        if self.password.is_empty() {
            return AdminDecision::Denied(ApiError::unauthorized(
                ErrorCode::InvalidAdminCredentials,
            ));
        }
        if constant_time_eq(presented, &self.password) {
            AdminDecision::Granted
        } else {
            AdminDecision::Denied(ApiError::unauthorized(ErrorCode::InvalidAdminCredentials))
        }
    }
}

// ─── Signed Session Cookie Mechanism ─────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct AdminSessionPayload {
    token: String,
    csrf: String,
    /// Millis since epoch.
    expires_at: i64,
}

/// Sign a cookie value: `value.hex(hmac-sha256(value))`.
pub fn sign_value(value: &str, secret: &str) -> Result<String, ApiError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ApiError::internal(ErrorCode::InternalServerError))?;
    mac.update(value.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Ok(format!("{value}.{signature}"))
}

/// Verify a signed cookie value; returns the inner value.
pub fn verify_signed_value(signed: &str, secret: &str) -> Option<String> {
    let (value, signature) = signed.rsplit_once('.')?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(value.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    if constant_time_eq(&expected, signature) {
        Some(value.to_string())
    } else {
        None
    }
}

/// Signed session cookie + CSRF header.
#[derive(Clone)]
pub struct SessionCookieIdentity {
    secret: String,
    cookie_name: String,
    csrf_header: String,
}

impl fmt::Debug for SessionCookieIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookieIdentity")
            .field("cookie_name", &self.cookie_name)
            .field("csrf_header", &self.csrf_header)
            .finish()
    }
}

impl SessionCookieIdentity {
    pub fn new(secret: impl Into<String>, options: &AdminOptions) -> Self {
        Self {
            secret: secret.into(),
            cookie_name: options.session_cookie.clone(),
            csrf_header: options.csrf_header.clone(),
        }
    }
}

#[async_trait]
impl AdminIdentity for SessionCookieIdentity {
    async fn authorize(&self, parts: &AdminRequestParts) -> AdminDecision {
        let Some(cookie) = parts.cookie(&self.cookie_name) else {
            return AdminDecision::NotApplicable;
        };

        let expired = || {
            AdminDecision::Denied(ApiError::unauthorized(ErrorCode::AdminSessionExpired))
        };

        let Some(encoded) = verify_signed_value(&cookie, &self.secret) else {
            return expired();
        };
        let Ok(raw) = URL_SAFE_NO_PAD.decode(encoded.as_bytes()) else {
            return expired();
        };
        let Ok(payload) = serde_json::from_slice::<AdminSessionPayload>(&raw) else {
            return expired();
        };

        if Utc::now().timestamp_millis() > payload.expires_at {
            return expired();
        }

        match parts.header(&self.csrf_header) {
            Some(presented) if constant_time_eq(presented, &payload.csrf) => {
                AdminDecision::Granted
            }
            _ => AdminDecision::Denied(ApiError::forbidden(ErrorCode::InvalidCsrfToken)),
        }
    }
}

// ─── Composite ───────────────────────────────────────────────────

/// Tries each mechanism in order; the first grant wins, the first concrete
/// denial is surfaced, and a request carrying neither credential is 401.
#[derive(Debug)]
pub struct AdminAuth {
    mechanisms: Vec<Box<dyn AdminIdentity>>,
}

impl AdminAuth {
    /// The standard pair: password header, then session cookie.
    pub fn standard(secret: &str, options: &AdminOptions) -> Self {
        Self {
            mechanisms: vec![
                Box::new(PasswordHeaderIdentity::new(options)),
                Box::new(SessionCookieIdentity::new(secret, options)),
            ],
        }
    }

    pub fn with_mechanisms(mechanisms: Vec<Box<dyn AdminIdentity>>) -> Self {
        Self { mechanisms }
    }

    pub async fn authorize(&self, parts: &AdminRequestParts) -> Result<(), ApiError> {
        let mut denial: Option<ApiError> = None;
        for mechanism in &self.mechanisms {
            match mechanism.authorize(parts).await {
                AdminDecision::Granted => return Ok(()),
                AdminDecision::NotApplicable => {}
                AdminDecision::Denied(err) => {
                    denial.get_or_insert(err);
                }
            }
        }
        Err(denial.unwrap_or_else(|| ApiError::unauthorized(ErrorCode::Unauthorized)))
    }
}

// ─── Login / Session Issuance ────────────────────────────────────

/// An issued admin session: the signed cookie value plus the CSRF token the
/// client must echo in the configured header.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    #[serde(skip)]
    pub cookie_value: String,
    pub csrf_token: String,
    pub expires_at: i64,
}

/// Verify the shared password and issue a signed session.
///
/// Attempts are counted per client IP against the login rate-limit rule
/// before the password is even looked at.
pub async fn login(
    secret: &str,
    admin: &AdminOptions,
    rate_limit: &RateLimitOptions,
    store: &dyn RateLimitStore,
    client_ip: &str,
    password_attempt: &str,
) -> Result<AdminSession, ApiError> {
    if rate_limit.enabled {
        let rule = RateLimitRule {
            window: rate_limit.login_window,
            max: rate_limit.login_max,
        };
        check_rate_limit(store, &format!("admin-login:{client_ip}"), rule).await?;
    }

    if admin.password.is_empty() || !constant_time_eq(password_attempt, &admin.password) {
        return Err(ApiError::unauthorized(ErrorCode::InvalidAdminCredentials));
    }

    let expires_at = Utc::now().timestamp_millis() + (admin.session_ttl as i64) * 1000;
    let payload = AdminSessionPayload {
        token: generate_session_token(),
        csrf: generate_session_token(),
        expires_at,
    };

    let encoded = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&payload)
            .map_err(|_| ApiError::internal(ErrorCode::InternalServerError))?,
    );
    let cookie_value = sign_value(&encoded, secret)?;

    Ok(AdminSession {
        cookie_value,
        csrf_token: payload.csrf,
        expires_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidestore_core::MemoryRateLimitStore;

    const SECRET: &str = "a-secret-of-at-least-32-characters!!";

    fn admin_options() -> AdminOptions {
        AdminOptions {
            password: "correct-horse".into(),
            ..Default::default()
        }
    }

    async fn issue_session() -> AdminSession {
        let store = MemoryRateLimitStore::new();
        login(
            SECRET,
            &admin_options(),
            &RateLimitOptions::default(),
            &store,
            "127.0.0.1",
            "correct-horse",
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn header_mechanism_grants_with_correct_password() {
        let auth = AdminAuth::standard(SECRET, &admin_options());
        let parts = AdminRequestParts::from_pairs([("x-admin-key", "correct-horse")]);
        assert!(auth.authorize(&parts).await.is_ok());
    }

    #[tokio::test]
    async fn header_mechanism_denies_wrong_password() {
        let auth = AdminAuth::standard(SECRET, &admin_options());
        let parts = AdminRequestParts::from_pairs([("x-admin-key", "battery-staple")]);
        let err = auth.authorize(&parts).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAdminCredentials);
    }

    #[tokio::test]
    async fn empty_configured_password_never_grants() {
        let auth = AdminAuth::standard(SECRET, &AdminOptions::default());
        let parts = AdminRequestParts::from_pairs([("x-admin-key", "")]);
        assert!(auth.authorize(&parts).await.is_err());
    }

    #[tokio::test]
    async fn no_credentials_is_unauthorized() {
        let auth = AdminAuth::standard(SECRET, &admin_options());
        let err = auth
            .authorize(&AdminRequestParts::default())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.status.status_code(), 401);
    }

    #[tokio::test]
    async fn session_cookie_with_csrf_grants() {
        let session = issue_session().await;
        let auth = AdminAuth::standard(SECRET, &admin_options());

        let cookie = format!("guidestore.admin_session={}", session.cookie_value);
        let parts = AdminRequestParts::from_pairs([
            ("cookie", cookie.as_str()),
            ("x-csrf-token", session.csrf_token.as_str()),
        ]);
        assert!(auth.authorize(&parts).await.is_ok());
    }

    #[tokio::test]
    async fn session_cookie_without_csrf_is_forbidden() {
        let session = issue_session().await;
        let auth = AdminAuth::standard(SECRET, &admin_options());

        let cookie = format!("guidestore.admin_session={}", session.cookie_value);
        let parts = AdminRequestParts::from_pairs([("cookie", cookie.as_str())]);
        let err = auth.authorize(&parts).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidCsrfToken);
        assert_eq!(err.status.status_code(), 403);
    }

    #[tokio::test]
    async fn tampered_cookie_is_rejected() {
        let session = issue_session().await;
        let auth = AdminAuth::standard(SECRET, &admin_options());

        let mut tampered = session.cookie_value.clone();
        tampered.insert(0, 'x');
        let cookie = format!("guidestore.admin_session={tampered}");
        let parts = AdminRequestParts::from_pairs([
            ("cookie", cookie.as_str()),
            ("x-csrf-token", session.csrf_token.as_str()),
        ]);
        let err = auth.authorize(&parts).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::AdminSessionExpired);
    }

    #[tokio::test]
    async fn login_rejects_wrong_password() {
        let store = MemoryRateLimitStore::new();
        let err = login(
            SECRET,
            &admin_options(),
            &RateLimitOptions::default(),
            &store,
            "127.0.0.1",
            "wrong",
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAdminCredentials);
    }

    #[tokio::test]
    async fn login_attempts_are_rate_limited() {
        let store = MemoryRateLimitStore::new();
        let rate_limit = RateLimitOptions {
            login_max: 2,
            ..Default::default()
        };

        for _ in 0..2 {
            let _ = login(SECRET, &admin_options(), &rate_limit, &store, "10.0.0.1", "wrong").await;
        }
        let err = login(SECRET, &admin_options(), &rate_limit, &store, "10.0.0.1", "correct-horse")
            .await
            .unwrap_err();
        assert_eq!(err.status.status_code(), 429);

        // A different IP is unaffected.
        assert!(login(
            SECRET,
            &admin_options(),
            &rate_limit,
            &store,
            "10.0.0.2",
            "correct-horse"
        )
        .await
        .is_ok());
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let signed = sign_value("payload", SECRET).unwrap();
        assert_eq!(verify_signed_value(&signed, SECRET).as_deref(), Some("payload"));
        assert!(verify_signed_value(&signed, "another-secret-entirely!!!!!!!!!!").is_none());
    }
}
