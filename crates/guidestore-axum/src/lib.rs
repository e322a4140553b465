//! Axum integration for the guidestore backend.
//!
//! `GuideStore::router()` mounts every public and back-office endpoint under
//! the configured base path. Handlers stay thin: extract, call into the
//! application crate, map the result.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use guidestore::access::AccessCredential;
use guidestore::admin::AdminRequestParts;
use guidestore::context::StoreContext;
use guidestore::reconcile::webhook_error_response;
use guidestore::{backoffice, checkout, feedback, linking, resend};
use guidestore_core::error::{ApiError, ErrorCode, StoreError};

// ─── Error Mapping ───────────────────────────────────────────────

/// Local wrapper so application errors render as HTTP responses.
struct HttpError(ApiError);

impl From<ApiError> for HttpError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<StoreError> for HttpError {
    fn from(e: StoreError) -> Self {
        Self(e.into_api_error())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0.to_json())).into_response()
    }
}

// ─── Header Extraction ───────────────────────────────────────────

/// Pull the bearer token from the Authorization header.
fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Extract the client IP from proxy headers for rate limiting.
fn extract_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.split(',').next().unwrap_or("unknown").trim().to_string())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string())
}

/// Lower-case the header map into the admin capability's request parts.
fn admin_parts(headers: &HeaderMap) -> AdminRequestParts {
    let mut map = std::collections::HashMap::new();
    for (name, value) in headers.iter() {
        if let Ok(v) = value.to_str() {
            map.insert(name.as_str().to_lowercase(), v.to_string());
        }
    }
    AdminRequestParts::new(map)
}

/// The one admin gate: every back-office handler calls this first.
async fn authorize_admin(ctx: &StoreContext, headers: &HeaderMap) -> Result<(), HttpError> {
    ctx.admin
        .authorize(&admin_parts(headers))
        .await
        .map_err(HttpError::from)
}

// ─── Builder ─────────────────────────────────────────────────────

/// The main entry point for mounting the storefront API.
///
/// # Example
///
/// ```rust,ignore
/// let ctx = Arc::new(StoreContext::new(options, adapter, stripe, mailer, webhook_secret));
/// let app = GuideStore::new(ctx).router();
/// axum::serve(listener, app).await?;
/// ```
pub struct GuideStore {
    ctx: Arc<StoreContext>,
}

impl GuideStore {
    pub fn new(ctx: Arc<StoreContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<StoreContext> {
        &self.ctx
    }

    /// Build the router, nested under the configured base path.
    pub fn router(&self) -> Router {
        let base_path = self.ctx.options.base_path.clone();
        Router::new().nest(&base_path, self.store_routes())
    }

    /// Build the router with a permissive CORS layer. For production,
    /// configure CORS explicitly.
    pub fn router_with_cors(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        self.router().layer(cors)
    }

    fn store_routes(&self) -> Router {
        Router::new()
            // Catalog
            .route("/guides", get(handle_list_guides))
            .route("/guides/{slug}", get(handle_get_guide))
            // Checkout
            .route("/checkout/guides", post(handle_guide_checkout))
            .route("/checkout/subscription", post(handle_subscription_checkout))
            // Webhooks
            .route("/webhooks/stripe", post(handle_stripe_webhook))
            // Access
            .route("/access/validate", post(handle_validate_access))
            .route("/access/resend", post(handle_resend_access))
            // Subscription linking
            .route("/subscription/link", post(handle_link_subscription))
            // Public submissions
            .route("/feedback", post(handle_submit_feedback))
            .route("/guide-requests", post(handle_submit_guide_request))
            // Back-office
            .route("/admin/login", post(handle_admin_login))
            .route("/admin/purchases", get(handle_admin_list_purchases))
            .route("/admin/purchases/{id}/revoke", post(handle_admin_revoke_purchase))
            .route("/admin/purchases/{id}/resend", post(handle_admin_resend_purchase))
            .route("/admin/subscriptions", get(handle_admin_list_subscriptions))
            .route(
                "/admin/subscriptions/{id}/cancel",
                post(handle_admin_cancel_subscription),
            )
            .route("/admin/guides", get(handle_admin_list_guides))
            .route(
                "/admin/guides/{id}",
                put(handle_admin_upsert_guide).delete(handle_admin_delete_guide),
            )
            .route("/admin/feedback", get(handle_admin_list_feedback))
            .route("/admin/feedback/{id}/reply", post(handle_admin_reply_feedback))
            .route("/admin/feedback/{id}/archive", post(handle_admin_archive_feedback))
            .route("/admin/guide-requests", get(handle_admin_list_requests))
            .route(
                "/admin/guide-requests/{id}/status",
                post(handle_admin_set_request_status),
            )
            .with_state(self.ctx.clone())
    }
}

// ─── Catalog Handlers ────────────────────────────────────────────

async fn handle_list_guides(
    State(ctx): State<Arc<StoreContext>>,
) -> Result<impl IntoResponse, HttpError> {
    let guides = ctx.catalog.list().await?;
    Ok(Json(guides))
}

async fn handle_get_guide(
    State(ctx): State<Arc<StoreContext>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let guide = ctx
        .catalog
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| HttpError(ApiError::not_found(ErrorCode::GuideNotFound)))?;
    Ok(Json(guide))
}

// ─── Checkout Handlers ───────────────────────────────────────────

async fn handle_guide_checkout(
    State(ctx): State<Arc<StoreContext>>,
    Json(body): Json<checkout::GuideCheckoutRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = checkout::create_guide_checkout(&ctx, body).await?;
    Ok(Json(response))
}

async fn handle_subscription_checkout(
    State(ctx): State<Arc<StoreContext>>,
    Json(body): Json<checkout::SubscriptionCheckoutRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let response = checkout::create_subscription_checkout(&ctx, body).await?;
    Ok(Json(response))
}

// ─── Webhook Handler ─────────────────────────────────────────────

async fn handle_stripe_webhook(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, HttpError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HttpError(ApiError::bad_request(ErrorCode::WebhookSignatureInvalid)))?;

    ctx.reconciler()
        .process(&body, signature, &ctx.webhook_secret)
        .await
        .map_err(|e| HttpError(webhook_error_response(e)))?;

    Ok(Json(serde_json::json!({"received": true})))
}

// ─── Access Handlers ─────────────────────────────────────────────

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidateAccessRequest {
    #[serde(default)]
    access_token: Option<String>,
    guide_id: String,
}

async fn handle_validate_access(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Json(body): Json<ValidateAccessRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let credential = match (extract_bearer(&headers), body.access_token) {
        (Some(bearer), _) => AccessCredential::Bearer(bearer),
        (None, Some(token)) => AccessCredential::AccessToken(token),
        (None, None) => {
            return Err(HttpError(ApiError::bad_request(ErrorCode::CouldNotParseBody)))
        }
    };

    let valid = ctx
        .access_validator()
        .validate(&credential, &body.guide_id)
        .await?;
    Ok(Json(serde_json::json!({"valid": valid})))
}

#[derive(serde::Deserialize)]
struct ResendAccessRequest {
    email: String,
}

async fn handle_resend_access(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Json(body): Json<ResendAccessRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let ip = extract_ip(&headers);
    resend::resend_access_links(&ctx, &ip, &body.email).await?;
    // Never disclose whether purchases exist for the address.
    Ok(Json(serde_json::json!({"ok": true})))
}

// ─── Linking Handler ─────────────────────────────────────────────

async fn handle_link_subscription(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let bearer = extract_bearer(&headers)
        .ok_or_else(|| HttpError(ApiError::unauthorized(ErrorCode::Unauthorized)))?;
    let identity = ctx
        .identity
        .verify(&bearer)
        .await?
        .ok_or_else(|| HttpError(ApiError::unauthorized(ErrorCode::Unauthorized)))?;

    let subscription = linking::link_subscription(&ctx.repo, &identity).await?;
    Ok(Json(subscription))
}

// ─── Public Submission Handlers ──────────────────────────────────

async fn handle_submit_feedback(
    State(ctx): State<Arc<StoreContext>>,
    Json(body): Json<feedback::SubmitFeedbackRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let record = feedback::submit_feedback(&ctx.repo, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn handle_submit_guide_request(
    State(ctx): State<Arc<StoreContext>>,
    Json(body): Json<feedback::SubmitGuideRequestRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let record = feedback::submit_guide_request(&ctx.repo, body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

// ─── Admin Handlers ──────────────────────────────────────────────

#[derive(serde::Deserialize)]
struct AdminLoginRequest {
    password: String,
}

async fn handle_admin_login(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Json(body): Json<AdminLoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let ip = extract_ip(&headers);
    let session = backoffice::login(&ctx, &ip, &body.password).await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ctx.options.admin.session_cookie, session.cookie_value, ctx.options.admin.session_ttl
    );

    let mut response = Json(&session).into_response();
    if let Ok(value) = cookie.parse() {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    Ok(response)
}

#[derive(serde::Deserialize)]
struct PageQuery {
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    offset: Option<i64>,
}

async fn handle_admin_list_purchases(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let purchases = backoffice::list_purchases(&ctx, page.limit, page.offset).await?;
    Ok(Json(purchases))
}

async fn handle_admin_revoke_purchase(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let purchase = backoffice::revoke_purchase(&ctx, &id).await?;
    Ok(Json(purchase))
}

async fn handle_admin_resend_purchase(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    backoffice::resend_purchase_access(&ctx, &id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn handle_admin_list_subscriptions(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let subscriptions = backoffice::list_subscriptions(&ctx, page.limit, page.offset).await?;
    Ok(Json(subscriptions))
}

async fn handle_admin_cancel_subscription(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let subscription = backoffice::cancel_subscription(&ctx, &id).await?;
    Ok(Json(subscription))
}

async fn handle_admin_list_guides(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let docs = backoffice::list_guide_docs(&ctx).await?;
    Ok(Json(docs))
}

async fn handle_admin_upsert_guide(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut doc): Json<serde_json::Value>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    // The path owns the identity; the body may omit or contradict it.
    if let Some(obj) = doc.as_object_mut() {
        obj.insert("id".into(), serde_json::Value::String(id));
    }
    let stored = backoffice::upsert_guide(&ctx, doc).await?;
    Ok(Json(stored))
}

async fn handle_admin_delete_guide(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    backoffice::delete_guide(&ctx, &id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

async fn handle_admin_list_feedback(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let records = backoffice::list_feedback(&ctx, page.limit, page.offset).await?;
    Ok(Json(records))
}

async fn handle_admin_reply_feedback(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<backoffice::ReplyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let record = backoffice::reply_to_feedback(&ctx, &id, body).await?;
    Ok(Json(record))
}

async fn handle_admin_archive_feedback(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let record = backoffice::archive_feedback(&ctx, &id).await?;
    Ok(Json(record))
}

async fn handle_admin_list_requests(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let records = backoffice::list_guide_requests(&ctx, page.limit, page.offset).await?;
    Ok(Json(records))
}

async fn handle_admin_set_request_status(
    State(ctx): State<Arc<StoreContext>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<backoffice::SetStatusRequest>,
) -> Result<impl IntoResponse, HttpError> {
    authorize_admin(&ctx, &headers).await?;
    let record = backoffice::set_guide_request_status(&ctx, &id, body).await?;
    Ok(Json(record))
}

// ─── Tests ──────────────────────────────────────────────────────
