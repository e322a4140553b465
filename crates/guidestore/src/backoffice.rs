//! Back-office operations.
//!
//! Authorization happens once per request at the HTTP layer through the
//! `AdminIdentity` capability; these functions assume an authorized caller.

use serde::Deserialize;

use guidestore_core::error::{ApiError, ErrorCode, StoreError};
use guidestore_core::{
    Feedback, GuideRequest, GuideRequestStatus, Purchase, PurchaseStatus, Subscription,
    SubscriptionStatus,
};

use crate::admin::{self, AdminSession};
use crate::context::StoreContext;
use crate::mailer::{send_best_effort, templates};

const DEFAULT_PAGE: i64 = 100;

fn page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    (limit.unwrap_or(DEFAULT_PAGE).clamp(1, 500), offset.unwrap_or(0).max(0))
}

// ─── Login ───────────────────────────────────────────────────────

pub async fn login(
    ctx: &StoreContext,
    client_ip: &str,
    password_attempt: &str,
) -> Result<AdminSession, ApiError> {
    admin::login(
        &ctx.options.secret,
        &ctx.options.admin,
        &ctx.options.rate_limit,
        ctx.rate_limits.as_ref(),
        client_ip,
        password_attempt,
    )
    .await
}

// ─── Purchases ───────────────────────────────────────────────────

pub async fn list_purchases(
    ctx: &StoreContext,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Purchase>, StoreError> {
    let (limit, offset) = page(limit, offset);
    ctx.repo.list_purchases(limit, offset).await
}

pub async fn revoke_purchase(ctx: &StoreContext, id: &str) -> Result<Purchase, StoreError> {
    ctx.repo
        .revoke_purchase(id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::PurchaseNotFound).into())
}

/// Resend access links for the email behind a purchase. Covers all of that
/// reader's active purchases, not just the one the admin clicked.
pub async fn resend_purchase_access(ctx: &StoreContext, id: &str) -> Result<(), StoreError> {
    let purchase = ctx
        .repo
        .purchase_by_id(id)
        .await?
        .ok_or_else(|| StoreError::from(ApiError::not_found(ErrorCode::PurchaseNotFound)))?;

    let active: Vec<_> = ctx
        .repo
        .purchases_by_email(&purchase.email)
        .await?
        .into_iter()
        .filter(|p| p.status == PurchaseStatus::Active)
        .collect();

    if active.is_empty() {
        return Err(ApiError::bad_request(ErrorCode::PurchaseNotFound).into());
    }

    let message = templates::lost_access(ctx.app_name(), ctx.base_url(), &purchase.email, &active);
    send_best_effort(ctx.mailer.as_ref(), message, "admin access resend").await;
    Ok(())
}

// ─── Subscriptions ───────────────────────────────────────────────

pub async fn list_subscriptions(
    ctx: &StoreContext,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Subscription>, StoreError> {
    let (limit, offset) = page(limit, offset);
    ctx.repo.list_subscriptions(limit, offset).await
}

/// Mark the local record canceled. The provider-side cancellation is done in
/// the payment dashboard; this keeps the mirror consistent when support acts
/// there first.
pub async fn cancel_subscription(
    ctx: &StoreContext,
    stripe_subscription_id: &str,
) -> Result<Subscription, StoreError> {
    ctx.repo
        .mark_subscription_status(stripe_subscription_id, SubscriptionStatus::Canceled)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::SubscriptionNotFound).into())
}

// ─── Guides ──────────────────────────────────────────────────────

pub async fn list_guide_docs(ctx: &StoreContext) -> Result<Vec<serde_json::Value>, StoreError> {
    ctx.repo.list_guide_docs().await
}

/// Upsert a guide override document. The document must carry an `id`;
/// partial documents are merged over the static defaults by the catalog.
pub async fn upsert_guide(
    ctx: &StoreContext,
    doc: serde_json::Value,
) -> Result<serde_json::Value, StoreError> {
    let has_id = doc
        .get("id")
        .and_then(|v| v.as_str())
        .is_some_and(|s| !s.is_empty());
    if !has_id {
        return Err(ApiError::bad_request(ErrorCode::CouldNotParseBody).into());
    }
    ctx.repo.upsert_guide_doc(doc).await
}

pub async fn delete_guide(ctx: &StoreContext, id: &str) -> Result<(), StoreError> {
    ctx.repo.delete_guide_doc(id).await
}

// ─── Feedback ────────────────────────────────────────────────────

pub async fn list_feedback(
    ctx: &StoreContext,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<Feedback>, StoreError> {
    let (limit, offset) = page(limit, offset);
    ctx.repo.list_feedback(limit, offset).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplyRequest {
    pub message: String,
}

/// Reply to reader feedback: send the reply email, then mark the record.
/// The email is best-effort; the status transition is the primary write.
pub async fn reply_to_feedback(
    ctx: &StoreContext,
    id: &str,
    request: ReplyRequest,
) -> Result<Feedback, StoreError> {
    let feedback = ctx
        .repo
        .feedback_by_id(id)
        .await?
        .ok_or_else(|| StoreError::from(ApiError::not_found(ErrorCode::FeedbackNotFound)))?;

    let email = templates::feedback_reply(
        ctx.app_name(),
        &feedback.email,
        &feedback.message,
        &request.message,
    );
    send_best_effort(ctx.mailer.as_ref(), email, "feedback reply").await;

    ctx.repo
        .mark_feedback_replied(id)
        .await?
        .ok_or_else(|| StoreError::Database("feedback vanished during reply".into()))
}

pub async fn archive_feedback(ctx: &StoreContext, id: &str) -> Result<Feedback, StoreError> {
    ctx.repo
        .archive_feedback(id)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::FeedbackNotFound).into())
}

// ─── Guide Requests ──────────────────────────────────────────────

pub async fn list_guide_requests(
    ctx: &StoreContext,
    limit: Option<i64>,
    offset: Option<i64>,
) -> Result<Vec<GuideRequest>, StoreError> {
    let (limit, offset) = page(limit, offset);
    ctx.repo.list_guide_requests(limit, offset).await
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

pub async fn set_guide_request_status(
    ctx: &StoreContext,
    id: &str,
    request: SetStatusRequest,
) -> Result<GuideRequest, StoreError> {
    let status = GuideRequestStatus::parse(&request.status)
        .ok_or_else(|| StoreError::from(ApiError::bad_request(ErrorCode::CouldNotParseBody)))?;

    ctx.repo
        .set_guide_request_status(id, status)
        .await?
        .ok_or_else(|| ApiError::not_found(ErrorCode::GuideRequestNotFound).into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use guidestore_core::utils::id::{generate_access_token, generate_id};
    use guidestore_core::{Feedback, FeedbackStatus};

    use crate::context::test_support::test_context;

    fn purchase(email: &str, status: PurchaseStatus) -> Purchase {
        Purchase {
            id: generate_id(),
            email: email.into(),
            guide_id: "sleep-optimization".into(),
            access_token: generate_access_token(),
            stripe_session_id: "cs_1".into(),
            stripe_payment_intent_id: None,
            amount: 1_900,
            status,
            access_count: 0,
            last_access_at: None,
            created_at: Utc::now(),
            refunded_at: None,
        }
    }

    #[tokio::test]
    async fn revoke_transitions_status() {
        let ctx = test_context();
        let p = ctx
            .repo
            .create_purchase(&purchase("a@example.com", PurchaseStatus::Active))
            .await
            .unwrap();

        let revoked = revoke_purchase(&ctx, &p.id).await.unwrap();
        assert_eq!(revoked.status, PurchaseStatus::Revoked);
    }

    #[tokio::test]
    async fn revoke_missing_is_not_found() {
        let ctx = test_context();
        assert!(revoke_purchase(&ctx, "nope").await.is_err());
    }

    #[tokio::test]
    async fn admin_resend_reaches_the_reader() {
        let ctx = test_context();
        let p = ctx
            .repo
            .create_purchase(&purchase("a@example.com", PurchaseStatus::Active))
            .await
            .unwrap();

        resend_purchase_access(&ctx, &p.id).await.unwrap();
        let sent = ctx.test_mailer().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "a@example.com");
    }

    #[tokio::test]
    async fn resend_with_no_active_purchases_fails() {
        let ctx = test_context();
        let p = ctx
            .repo
            .create_purchase(&purchase("a@example.com", PurchaseStatus::Refunded))
            .await
            .unwrap();

        assert!(resend_purchase_access(&ctx, &p.id).await.is_err());
        assert_eq!(ctx.test_mailer().sent_count(), 0);
    }

    #[tokio::test]
    async fn reply_sends_email_and_marks_replied() {
        let ctx = test_context();
        let fb = ctx
            .repo
            .create_feedback(&Feedback {
                id: generate_id(),
                email: "a@example.com".into(),
                message: "loved it".into(),
                guide_id: None,
                status: FeedbackStatus::New,
                created_at: Utc::now(),
                replied_at: None,
            })
            .await
            .unwrap();

        let replied = reply_to_feedback(
            &ctx,
            &fb.id,
            ReplyRequest {
                message: "thank you!".into(),
            },
        )
        .await
        .unwrap();

        assert_eq!(replied.status, FeedbackStatus::Replied);
        let sent = ctx.test_mailer().sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].html.contains("thank you!"));
    }

    #[tokio::test]
    async fn guide_upsert_requires_id() {
        let ctx = test_context();
        assert!(upsert_guide(&ctx, serde_json::json!({"price": 100})).await.is_err());
        assert!(upsert_guide(&ctx, serde_json::json!({"id": "g1", "price": 100}))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn guide_request_status_transitions() {
        let ctx = test_context();
        let gr = crate::feedback::submit_guide_request(
            &ctx.repo,
            crate::feedback::SubmitGuideRequestRequest {
                email: "a@example.com".into(),
                topic: "cold exposure".into(),
                details: None,
            },
        )
        .await
        .unwrap();

        let updated = set_guide_request_status(
            &ctx,
            &gr.id,
            SetStatusRequest {
                status: "planned".into(),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.status, GuideRequestStatus::Planned);

        assert!(set_guide_request_status(
            &ctx,
            &gr.id,
            SetStatusRequest {
                status: "bogus".into(),
            },
        )
        .await
        .is_err());
    }

    #[tokio::test]
    async fn cancel_subscription_marks_local_record() {
        let ctx = test_context();
        let sub = guidestore_core::Subscription {
            id: generate_id(),
            stripe_subscription_id: "sub_1".into(),
            stripe_customer_id: "cus_1".into(),
            user_id: "a@example.com".into(),
            email: "a@example.com".into(),
            status: SubscriptionStatus::Active,
            interval: guidestore_core::BillingInterval::Month,
            current_period_start: Utc::now(),
            current_period_end: Utc::now(),
            cancel_at_period_end: false,
            link_state: guidestore_core::LinkState::Unlinked,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        ctx.repo.insert_subscription(&sub).await.unwrap();

        let canceled = cancel_subscription(&ctx, "sub_1").await.unwrap();
        assert_eq!(canceled.status, SubscriptionStatus::Canceled);
    }
}
