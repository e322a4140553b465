//! Webhook reconciler — converts payment-provider events into local state.
//!
//! Every handler must be safe to re-run from scratch: the provider redelivers
//! events on any non-2xx response, so transitions are idempotent upserts and
//! creation is guarded by existence checks. The provider is the single source
//! of ordering truth; there are no locks here.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use guidestore_core::db::records::BillingInterval;
use guidestore_core::error::{ApiError, Result, StoreError};
use guidestore_core::options::StoreOptions;
use guidestore_core::utils::id::{generate_access_token, generate_id};
use guidestore_core::{LinkState, Purchase, PurchaseStatus, Subscription, SubscriptionStatus};

use crate::catalog::Catalog;
use crate::mailer::{send_best_effort, templates, Mailer};
use crate::store::StoreRepo;
use crate::stripe::client::SubscriptionFetcher;
use crate::stripe::webhook::{verify_webhook_signature, WebhookEvent};

/// Applies webhook events to the purchase and subscription collections.
pub struct Reconciler {
    repo: StoreRepo,
    catalog: Catalog,
    subscriptions: Arc<dyn SubscriptionFetcher>,
    mailer: Arc<dyn Mailer>,
    options: Arc<StoreOptions>,
}

impl Reconciler {
    pub fn new(
        repo: StoreRepo,
        catalog: Catalog,
        subscriptions: Arc<dyn SubscriptionFetcher>,
        mailer: Arc<dyn Mailer>,
        options: Arc<StoreOptions>,
    ) -> Self {
        Self {
            repo,
            catalog,
            subscriptions,
            mailer,
            options,
        }
    }

    fn app_name(&self) -> &str {
        self.options.app_name.as_deref().unwrap_or("Guidestore")
    }

    fn base_url(&self) -> &str {
        self.options.base_url.as_deref().unwrap_or("")
    }

    /// Full webhook entry point: verify the signature, parse, and apply.
    ///
    /// Signature and parse failures surface as 400-class `ApiError`s; any
    /// other failure propagates as an internal error (the HTTP layer maps it
    /// to 500 and the provider retries).
    pub async fn process(
        &self,
        payload: &[u8],
        signature_header: &str,
        webhook_secret: &str,
    ) -> std::result::Result<(), StoreError> {
        verify_webhook_signature(payload, signature_header, webhook_secret)
            .map_err(StoreError::Api)?;
        let event = WebhookEvent::parse(payload).map_err(StoreError::Api)?;
        self.handle_event(event).await
    }

    /// Dispatch a verified event to its transition.
    pub async fn handle_event(&self, event: WebhookEvent) -> Result<()> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "processing webhook event");
        let object = event.data.object;

        match event.event_type.as_str() {
            "checkout.session.completed" => {
                match object["mode"].as_str().unwrap_or_default() {
                    "subscription" => self.on_subscription_checkout(&object).await,
                    _ => self.on_payment_checkout(&object).await,
                }
            }
            "charge.refunded" => self.on_charge_refunded(&object).await,
            "customer.subscription.created" | "customer.subscription.updated" => {
                self.upsert_subscription(&object, None).await.map(|_| ())
            }
            "customer.subscription.deleted" => {
                self.on_subscription_status(&object, SubscriptionStatus::Canceled)
                    .await
            }
            "invoice.payment_failed" => {
                self.on_invoice_status(&object, SubscriptionStatus::PastDue)
                    .await
            }
            "invoice.payment_succeeded" => {
                self.on_invoice_status(&object, SubscriptionStatus::Active)
                    .await
            }
            other => {
                tracing::debug!(event_type = %other, "ignoring unhandled webhook event");
                Ok(())
            }
        }
    }

    // ─── checkout.session.completed (payment mode) ───────────────

    /// Create one Purchase per guide under the session id, exactly once.
    ///
    /// Redelivery is detected by the existence of any purchase for the
    /// session id; the receipt email rides on first creation only.
    async fn on_payment_checkout(&self, session: &serde_json::Value) -> Result<()> {
        let session_id = require_str(session, "id")?;

        let existing = self.repo.purchases_by_session(session_id).await?;
        if !existing.is_empty() {
            tracing::info!(session_id, "checkout already reconciled, skipping redelivery");
            return Ok(());
        }

        let email = session["customer_email"]
            .as_str()
            .or_else(|| session["metadata"]["email"].as_str())
            .ok_or_else(|| StoreError::Payment("checkout session has no email".into()))?
            .to_string();
        let payment_intent = session["payment_intent"].as_str().map(str::to_string);

        let guide_ids: Vec<String> = session["metadata"]["guideIds"]
            .as_str()
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if guide_ids.is_empty() {
            tracing::warn!(session_id, "checkout session carries no guide ids");
            return Ok(());
        }

        let mut created = Vec::new();
        for guide_id in &guide_ids {
            let Some(guide) = self.catalog.find_by_id(guide_id).await? else {
                tracing::warn!(session_id, guide_id = %guide_id, "checkout references unknown guide");
                continue;
            };

            let purchase = Purchase {
                id: generate_id(),
                email: email.clone(),
                guide_id: guide.id.clone(),
                access_token: generate_access_token(),
                stripe_session_id: session_id.to_string(),
                stripe_payment_intent_id: payment_intent.clone(),
                amount: guide.price,
                status: PurchaseStatus::Active,
                access_count: 0,
                last_access_at: None,
                created_at: Utc::now(),
                refunded_at: None,
            };
            created.push(self.repo.create_purchase(&purchase).await?);
        }

        tracing::info!(session_id, count = created.len(), "created purchases");

        if !created.is_empty() {
            let guides = self.catalog.list().await?;
            let receipt = templates::purchase_receipt(
                self.app_name(),
                self.base_url(),
                &email,
                &created,
                &guides,
            );
            send_best_effort(self.mailer.as_ref(), receipt, "purchase receipt").await;
        }

        Ok(())
    }

    // ─── checkout.session.completed (subscription mode) ──────────

    /// Fetch the full subscription object and funnel it through the upsert
    /// transition. The welcome email is sent on every delivery; receipt-style
    /// idempotency guarding was never added here.
    async fn on_subscription_checkout(&self, session: &serde_json::Value) -> Result<()> {
        let subscription_id = require_str(session, "subscription")?;

        let email = session["customer_email"]
            .as_str()
            .or_else(|| session["metadata"]["email"].as_str())
            .map(str::to_string);
        let user_id = session["metadata"]["userId"].as_str().map(str::to_string);

        let object = self.subscriptions.subscription(subscription_id).await?;
        self.upsert_subscription(&object, Some(CheckoutHints { email, user_id }))
            .await?;

        if let Some(email) = session["customer_email"]
            .as_str()
            .or_else(|| session["metadata"]["email"].as_str())
        {
            let welcome = templates::subscription_welcome(self.app_name(), self.base_url(), email);
            send_best_effort(self.mailer.as_ref(), welcome, "subscription welcome").await;
        }

        Ok(())
    }

    // ─── charge.refunded ─────────────────────────────────────────

    /// Refund every purchase sharing the charge's payment intent. A refund
    /// with no matching purchases is logged and ignored, not an error.
    async fn on_charge_refunded(&self, charge: &serde_json::Value) -> Result<()> {
        let Some(intent_id) = charge["payment_intent"].as_str() else {
            tracing::warn!("refunded charge carries no payment intent");
            return Ok(());
        };

        let refunded = self
            .repo
            .mark_purchases_refunded(intent_id, Utc::now())
            .await?;

        if refunded == 0 {
            tracing::warn!(intent_id, "refund event matched no purchases");
        } else {
            tracing::info!(intent_id, count = refunded, "marked purchases refunded");
        }

        Ok(())
    }

    // ─── subscription upsert ─────────────────────────────────────

    /// Insert or update the local record for a provider subscription object.
    ///
    /// Insert stamps `createdAt` and resolves the owner: a concrete user id
    /// from checkout metadata links immediately, otherwise the email stands
    /// in as the documented placeholder. Updates overwrite only the mutable
    /// provider-owned fields and never touch `userId`/`linkState`.
    async fn upsert_subscription(
        &self,
        object: &serde_json::Value,
        hints: Option<CheckoutHints>,
    ) -> Result<Subscription> {
        let provider_id = require_str(object, "id")?;
        let status = SubscriptionStatus::from_provider(object["status"].as_str().unwrap_or_default());
        let interval = BillingInterval::from_provider(
            object["items"]["data"][0]["price"]["recurring"]["interval"]
                .as_str()
                .or_else(|| object["plan"]["interval"].as_str())
                .unwrap_or("month"),
        );
        let period_start = epoch_field(object, "current_period_start");
        let period_end = epoch_field(object, "current_period_end");
        let cancel_at_period_end = object["cancel_at_period_end"].as_bool().unwrap_or(false);

        if let Some(existing) = self.repo.subscription_by_provider_id(provider_id).await? {
            let updated = self
                .repo
                .update_subscription_fields(
                    provider_id,
                    json!({
                        "status": status,
                        "interval": interval,
                        "currentPeriodStart": period_start,
                        "currentPeriodEnd": period_end,
                        "cancelAtPeriodEnd": cancel_at_period_end,
                        "updatedAt": Utc::now(),
                    }),
                )
                .await?
                .unwrap_or(existing);
            tracing::info!(provider_id, status = ?updated.status, "updated subscription");
            return Ok(updated);
        }

        let hints = hints.unwrap_or_default();
        let email = hints
            .email
            .or_else(|| object["metadata"]["email"].as_str().map(str::to_string))
            .unwrap_or_default();
        let (user_id, link_state) = match hints.user_id {
            Some(user_id) if !user_id.is_empty() => (user_id, LinkState::Linked),
            // No account existed at purchase time: the email is the
            // placeholder owner until the link endpoint rewrites it.
            _ => (email.clone(), LinkState::Unlinked),
        };

        let subscription = Subscription {
            id: generate_id(),
            stripe_subscription_id: provider_id.to_string(),
            stripe_customer_id: object["customer"].as_str().unwrap_or_default().to_string(),
            user_id,
            email,
            status,
            interval,
            current_period_start: period_start,
            current_period_end: period_end,
            cancel_at_period_end,
            link_state,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let inserted = self.repo.insert_subscription(&subscription).await?;
        tracing::info!(provider_id, status = ?inserted.status, "inserted subscription");
        Ok(inserted)
    }

    async fn on_subscription_status(
        &self,
        object: &serde_json::Value,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let provider_id = require_str(object, "id")?;
        match self.repo.mark_subscription_status(provider_id, status).await? {
            Some(_) => tracing::info!(provider_id, ?status, "subscription status updated"),
            None => tracing::warn!(provider_id, ?status, "status event matched no subscription"),
        }
        Ok(())
    }

    /// Invoice events reference the subscription by id on the invoice object.
    async fn on_invoice_status(
        &self,
        invoice: &serde_json::Value,
        status: SubscriptionStatus,
    ) -> Result<()> {
        let provider_id = invoice["subscription"]
            .as_str()
            .or_else(|| invoice["subscription"]["id"].as_str());
        let Some(provider_id) = provider_id else {
            tracing::warn!("invoice event carries no subscription id");
            return Ok(());
        };

        match self.repo.mark_subscription_status(provider_id, status).await? {
            Some(_) => tracing::info!(provider_id, ?status, "subscription status updated from invoice"),
            None => tracing::warn!(provider_id, ?status, "invoice event matched no subscription"),
        }
        Ok(())
    }
}

/// Owner hints extracted from a subscription-mode checkout session.
#[derive(Debug, Default)]
struct CheckoutHints {
    email: Option<String>,
    user_id: Option<String>,
}

fn require_str<'a>(object: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    object[field]
        .as_str()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| StoreError::Payment(format!("event object missing `{field}`")))
}

fn epoch_field(object: &serde_json::Value, field: &str) -> DateTime<Utc> {
    object[field]
        .as_i64()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
        .unwrap_or_else(Utc::now)
}

/// Map a reconciler failure onto the webhook response contract: signature and
/// parse problems are client errors, everything else is a 500 that leans on
/// provider-side retry.
pub fn webhook_error_response(error: StoreError) -> ApiError {
    match error {
        StoreError::Api(api) => api,
        other => {
            tracing::error!(error = %other, "webhook processing failed");
            ApiError::internal(guidestore_core::ErrorCode::InternalServerError)
        }
    }
}
