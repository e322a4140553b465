//! Typed repository over the raw document adapter.
//!
//! The adapter speaks `serde_json::Value`; this layer owns the conversion to
//! the typed records and the application-specific queries. Everything above
//! it (reconciler, access validator, back-office) goes through these methods.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;

use guidestore_core::db::adapter::{Adapter, FindManyQuery, SortBy, WhereClause};
use guidestore_core::db::records::{collections, from_document, to_document};
use guidestore_core::error::Result;
use guidestore_core::{
    Feedback, FeedbackStatus, GuideRequest, GuideRequestStatus, LinkState, Purchase,
    PurchaseStatus, Subscription, SubscriptionStatus,
};

/// Typed store operations.
#[derive(Debug, Clone)]
pub struct StoreRepo {
    adapter: Arc<dyn Adapter>,
}

impl StoreRepo {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    fn docs_to<T: serde::de::DeserializeOwned>(docs: Vec<serde_json::Value>) -> Result<Vec<T>> {
        docs.into_iter().map(from_document).collect()
    }

    // ─── Purchases ───────────────────────────────────────────────

    pub async fn create_purchase(&self, purchase: &Purchase) -> Result<Purchase> {
        let doc = self
            .adapter
            .create(collections::PURCHASES, to_document(purchase)?)
            .await?;
        from_document(doc)
    }

    pub async fn purchases_by_session(&self, session_id: &str) -> Result<Vec<Purchase>> {
        let docs = self
            .adapter
            .find_many(
                collections::PURCHASES,
                FindManyQuery {
                    where_clauses: vec![WhereClause::eq("stripeSessionId", session_id)],
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    pub async fn purchases_by_payment_intent(&self, intent_id: &str) -> Result<Vec<Purchase>> {
        let docs = self
            .adapter
            .find_many(
                collections::PURCHASES,
                FindManyQuery {
                    where_clauses: vec![WhereClause::eq("stripePaymentIntentId", intent_id)],
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    pub async fn purchases_by_email(&self, email: &str) -> Result<Vec<Purchase>> {
        let docs = self
            .adapter
            .find_many(
                collections::PURCHASES,
                FindManyQuery {
                    where_clauses: vec![WhereClause::eq("email", email)],
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    pub async fn purchase_by_id(&self, id: &str) -> Result<Option<Purchase>> {
        let doc = self
            .adapter
            .find_one(collections::PURCHASES, &[WhereClause::eq("id", id)])
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn purchase_by_token_and_guide(
        &self,
        access_token: &str,
        guide_id: &str,
    ) -> Result<Option<Purchase>> {
        let doc = self
            .adapter
            .find_one(
                collections::PURCHASES,
                &[
                    WhereClause::eq("accessToken", access_token).and(),
                    WhereClause::eq("guideId", guide_id),
                ],
            )
            .await?;
        doc.map(from_document).transpose()
    }

    /// Mark every purchase sharing the payment intent as refunded.
    /// Returns the number of records transitioned.
    pub async fn mark_purchases_refunded(
        &self,
        intent_id: &str,
        refunded_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.adapter
            .update_many(
                collections::PURCHASES,
                &[WhereClause::eq("stripePaymentIntentId", intent_id)],
                json!({
                    "status": PurchaseStatus::Refunded,
                    "refundedAt": refunded_at,
                }),
            )
            .await
    }

    pub async fn revoke_purchase(&self, id: &str) -> Result<Option<Purchase>> {
        let doc = self
            .adapter
            .update(
                collections::PURCHASES,
                &[WhereClause::eq("id", id)],
                json!({"status": PurchaseStatus::Revoked}),
            )
            .await?;
        doc.map(from_document).transpose()
    }

    /// Bump the access counters on a purchase. Best-effort bookkeeping.
    pub async fn record_access(&self, purchase: &Purchase) -> Result<()> {
        self.adapter
            .update(
                collections::PURCHASES,
                &[WhereClause::eq("id", purchase.id.as_str())],
                json!({
                    "accessCount": purchase.access_count + 1,
                    "lastAccessAt": Utc::now(),
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn list_purchases(&self, limit: i64, offset: i64) -> Result<Vec<Purchase>> {
        let docs = self
            .adapter
            .find_many(
                collections::PURCHASES,
                FindManyQuery {
                    sort_by: Some(SortBy::desc("createdAt")),
                    limit: Some(limit),
                    offset: Some(offset),
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    // ─── Subscriptions ───────────────────────────────────────────

    pub async fn subscription_by_provider_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>> {
        let doc = self
            .adapter
            .find_one(
                collections::SUBSCRIPTIONS,
                &[WhereClause::eq("stripeSubscriptionId", stripe_subscription_id)],
            )
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn insert_subscription(&self, subscription: &Subscription) -> Result<Subscription> {
        let doc = self
            .adapter
            .create(collections::SUBSCRIPTIONS, to_document(subscription)?)
            .await?;
        from_document(doc)
    }

    /// Merge mutable fields into the record keyed by provider subscription id.
    pub async fn update_subscription_fields(
        &self,
        stripe_subscription_id: &str,
        fields: serde_json::Value,
    ) -> Result<Option<Subscription>> {
        let doc = self
            .adapter
            .update(
                collections::SUBSCRIPTIONS,
                &[WhereClause::eq("stripeSubscriptionId", stripe_subscription_id)],
                fields,
            )
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn mark_subscription_status(
        &self,
        stripe_subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>> {
        self.update_subscription_fields(
            stripe_subscription_id,
            json!({"status": status, "updatedAt": Utc::now()}),
        )
        .await
    }

    /// Subscriptions matching either the real user id or the email placeholder.
    pub async fn subscriptions_for_identity(
        &self,
        user_id: &str,
        email: &str,
    ) -> Result<Vec<Subscription>> {
        let docs = self
            .adapter
            .find_many(
                collections::SUBSCRIPTIONS,
                FindManyQuery {
                    where_clauses: vec![
                        WhereClause::eq("userId", user_id).or(),
                        WhereClause::eq("email", email),
                    ],
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    /// The most recent subscription for this email that is worth linking
    /// (active, trialing, or past_due).
    pub async fn latest_linkable_subscription(&self, email: &str) -> Result<Option<Subscription>> {
        let docs = self
            .adapter
            .find_many(
                collections::SUBSCRIPTIONS,
                FindManyQuery {
                    where_clauses: vec![
                        WhereClause::eq("email", email).and(),
                        WhereClause::is_in(
                            "status",
                            json!([
                                SubscriptionStatus::Active,
                                SubscriptionStatus::Trialing,
                                SubscriptionStatus::PastDue,
                            ]),
                        ),
                    ],
                    sort_by: Some(SortBy::desc("createdAt")),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .await?;
        docs.into_iter().next().map(from_document).transpose()
    }

    /// Rewrite the placeholder user id with the real one and mark linked.
    pub async fn link_subscription(
        &self,
        id: &str,
        user_id: &str,
    ) -> Result<Option<Subscription>> {
        let doc = self
            .adapter
            .update(
                collections::SUBSCRIPTIONS,
                &[WhereClause::eq("id", id)],
                json!({
                    "userId": user_id,
                    "linkState": LinkState::Linked,
                    "updatedAt": Utc::now(),
                }),
            )
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn list_subscriptions(&self, limit: i64, offset: i64) -> Result<Vec<Subscription>> {
        let docs = self
            .adapter
            .find_many(
                collections::SUBSCRIPTIONS,
                FindManyQuery {
                    sort_by: Some(SortBy::desc("createdAt")),
                    limit: Some(limit),
                    offset: Some(offset),
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    // ─── Feedback ────────────────────────────────────────────────

    pub async fn create_feedback(&self, feedback: &Feedback) -> Result<Feedback> {
        let doc = self
            .adapter
            .create(collections::FEEDBACK, to_document(feedback)?)
            .await?;
        from_document(doc)
    }

    pub async fn feedback_by_id(&self, id: &str) -> Result<Option<Feedback>> {
        let doc = self
            .adapter
            .find_one(collections::FEEDBACK, &[WhereClause::eq("id", id)])
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn list_feedback(&self, limit: i64, offset: i64) -> Result<Vec<Feedback>> {
        let docs = self
            .adapter
            .find_many(
                collections::FEEDBACK,
                FindManyQuery {
                    sort_by: Some(SortBy::desc("createdAt")),
                    limit: Some(limit),
                    offset: Some(offset),
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    pub async fn mark_feedback_replied(&self, id: &str) -> Result<Option<Feedback>> {
        let doc = self
            .adapter
            .update(
                collections::FEEDBACK,
                &[WhereClause::eq("id", id)],
                json!({"status": FeedbackStatus::Replied, "repliedAt": Utc::now()}),
            )
            .await?;
        doc.map(from_document).transpose()
    }

    pub async fn archive_feedback(&self, id: &str) -> Result<Option<Feedback>> {
        let doc = self
            .adapter
            .update(
                collections::FEEDBACK,
                &[WhereClause::eq("id", id)],
                json!({"status": FeedbackStatus::Archived}),
            )
            .await?;
        doc.map(from_document).transpose()
    }

    // ─── Guide Requests ──────────────────────────────────────────

    pub async fn create_guide_request(&self, request: &GuideRequest) -> Result<GuideRequest> {
        let doc = self
            .adapter
            .create(collections::GUIDE_REQUESTS, to_document(request)?)
            .await?;
        from_document(doc)
    }

    pub async fn list_guide_requests(&self, limit: i64, offset: i64) -> Result<Vec<GuideRequest>> {
        let docs = self
            .adapter
            .find_many(
                collections::GUIDE_REQUESTS,
                FindManyQuery {
                    sort_by: Some(SortBy::desc("createdAt")),
                    limit: Some(limit),
                    offset: Some(offset),
                    ..Default::default()
                },
            )
            .await?;
        Self::docs_to(docs)
    }

    pub async fn set_guide_request_status(
        &self,
        id: &str,
        status: GuideRequestStatus,
    ) -> Result<Option<GuideRequest>> {
        let doc = self
            .adapter
            .update(
                collections::GUIDE_REQUESTS,
                &[WhereClause::eq("id", id)],
                json!({"status": status}),
            )
            .await?;
        doc.map(from_document).transpose()
    }

    // ─── Guide Documents ─────────────────────────────────────────

    /// Upsert a guide override document by id. Partial documents are allowed;
    /// the catalog merges them over the static defaults.
    pub async fn upsert_guide_doc(&self, doc: serde_json::Value) -> Result<serde_json::Value> {
        let id = doc
            .get("id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_default();
        if !id.is_empty() {
            if let Some(updated) = self
                .adapter
                .update(collections::GUIDES, &[WhereClause::eq("id", id.as_str())], doc.clone())
                .await?
            {
                return Ok(updated);
            }
        }
        self.adapter.create(collections::GUIDES, doc).await
    }

    pub async fn delete_guide_doc(&self, id: &str) -> Result<()> {
        self.adapter
            .delete(collections::GUIDES, &[WhereClause::eq("id", id)])
            .await
    }

    pub async fn list_guide_docs(&self) -> Result<Vec<serde_json::Value>> {
        self.adapter
            .find_many(collections::GUIDES, FindManyQuery::default())
            .await
    }
}
