//! Lost-access resend — email a reader their existing access links.
//!
//! The response never discloses whether purchases exist for the address, and
//! attempts are rate-limited per client IP.

use guidestore_core::counter::{check_rate_limit, RateLimitRule};
use guidestore_core::error::StoreError;
use guidestore_core::PurchaseStatus;

use crate::context::StoreContext;
use crate::mailer::{send_best_effort, templates};

/// Resend access links for every active purchase tied to `email`.
/// Always resolves to `Ok(())` unless the caller is rate limited or the
/// store itself fails.
pub async fn resend_access_links(
    ctx: &StoreContext,
    client_ip: &str,
    email: &str,
) -> Result<(), StoreError> {
    if ctx.options.rate_limit.enabled {
        let rule = RateLimitRule {
            window: ctx.options.rate_limit.resend_window,
            max: ctx.options.rate_limit.resend_max,
        };
        check_rate_limit(
            ctx.rate_limits.as_ref(),
            &format!("access-resend:{client_ip}"),
            rule,
        )
        .await
        .map_err(StoreError::Api)?;
    }

    let active: Vec<_> = ctx
        .repo
        .purchases_by_email(email)
        .await?
        .into_iter()
        .filter(|p| p.status == PurchaseStatus::Active)
        .collect();

    if active.is_empty() {
        tracing::info!(email, "access resend requested for address with no active purchases");
        return Ok(());
    }

    let message = templates::lost_access(ctx.app_name(), ctx.base_url(), email, &active);
    send_best_effort(ctx.mailer.as_ref(), message, "lost access resend").await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use guidestore_core::utils::id::{generate_access_token, generate_id};
    use guidestore_core::Purchase;

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
    async fn resends_only_active_purchases() {
        let ctx = test_context();
        ctx.repo
            .create_purchase(&purchase("a@example.com", PurchaseStatus::Active))
            .await
            .unwrap();
        ctx.repo
            .create_purchase(&purchase("a@example.com", PurchaseStatus::Refunded))
            .await
            .unwrap();

        resend_access_links(&ctx, "127.0.0.1", "a@example.com")
            .await
            .unwrap();

        let sent = ctx.test_mailer().sent();
        assert_eq!(sent.len(), 1);
        // Exactly one link in the body: the refunded purchase is absent.
        assert_eq!(sent[0].text.matches("gat_").count(), 1);
    }

    #[tokio::test]
    async fn unknown_email_sends_nothing_but_succeeds() {
        let ctx = test_context();
        resend_access_links(&ctx, "127.0.0.1", "nobody@example.com")
            .await
            .unwrap();
        assert_eq!(ctx.test_mailer().sent_count(), 0);
    }

    #[tokio::test]
    async fn resends_are_rate_limited_per_ip() {
        let ctx = test_context();
        let max = ctx.options.rate_limit.resend_max;

        for _ in 0..max {
            resend_access_links(&ctx, "10.0.0.9", "a@example.com")
                .await
                .unwrap();
        }
        let err = resend_access_links(&ctx, "10.0.0.9", "a@example.com")
            .await
            .unwrap_err();
        match err {
            StoreError::Api(api) => assert_eq!(api.status.status_code(), 429),
            other => panic!("expected rate limit error, got {other}"),
        }
    }
}
