//! Subscription linking — attach a placeholder subscription to a real account.
//!
//! A subscription bought before any account existed carries the purchaser's
//! email as its `userId`. Once the user authenticates, this endpoint rewrites
//! the placeholder with the real id. A record already linked to a *different*
//! concrete user id is never overwritten.

use guidestore_core::error::{ApiError, ErrorCode, StoreError};
use guidestore_core::{LinkState, Subscription};

use crate::identity::Identity;
use crate::store::StoreRepo;

/// Link the newest active/trialing/past_due subscription matching the
/// authenticated email.
///
/// - No candidate → 404.
/// - Candidate linked to another user id → 409.
/// - Candidate already linked to this user → no-op success.
pub async fn link_subscription(
    repo: &StoreRepo,
    identity: &Identity,
) -> Result<Subscription, StoreError> {
    let Some(candidate) = repo.latest_linkable_subscription(&identity.email).await? else {
        return Err(ApiError::not_found(ErrorCode::SubscriptionNotFound).into());
    };

    if candidate.link_state == LinkState::Linked {
        if candidate.user_id == identity.user_id {
            return Ok(candidate);
        }
        return Err(ApiError::conflict(ErrorCode::SubscriptionAlreadyLinked).into());
    }

    let linked = repo
        .link_subscription(&candidate.id, &identity.user_id)
        .await?
        .ok_or_else(|| StoreError::Database("subscription vanished during link".into()))?;

    tracing::info!(
        subscription_id = %linked.stripe_subscription_id,
        user_id = %identity.user_id,
        "linked subscription to account"
    );

    Ok(linked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use guidestore_core::utils::id::generate_id;
    use guidestore_core::{BillingInterval, SubscriptionStatus};
    use guidestore_memory::MemoryAdapter;

    fn repo() -> StoreRepo {
        StoreRepo::new(Arc::new(MemoryAdapter::new()))
    }

    fn identity(user_id: &str, email: &str) -> Identity {
        Identity {
            user_id: user_id.into(),
            email: email.into(),
        }
    }

    fn subscription(email: &str, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: generate_id(),
            stripe_subscription_id: generate_id(),
            stripe_customer_id: "cus_1".into(),
            user_id: email.into(),
            email: email.into(),
            status,
            interval: BillingInterval::Month,
            current_period_start: Utc::now(),
            current_period_end: Utc::now(),
            cancel_at_period_end: false,
            link_state: LinkState::Unlinked,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn links_placeholder_to_real_user() {
        let repo = repo();
        repo.insert_subscription(&subscription("a@example.com", SubscriptionStatus::Active))
            .await
            .unwrap();

        let linked = link_subscription(&repo, &identity("user_123", "a@example.com"))
            .await
            .unwrap();
        assert_eq!(linked.user_id, "user_123");
        assert_eq!(linked.link_state, LinkState::Linked);
    }

    #[tokio::test]
    async fn no_candidate_is_not_found() {
        let repo = repo();
        let err = link_subscription(&repo, &identity("user_123", "a@example.com"))
            .await
            .unwrap_err();
        match err {
            StoreError::Api(api) => assert_eq!(api.status.status_code(), 404),
            other => panic!("expected ApiError, got {other}"),
        }
    }

    #[tokio::test]
    async fn canceled_subscription_is_not_linkable() {
        let repo = repo();
        repo.insert_subscription(&subscription("a@example.com", SubscriptionStatus::Canceled))
            .await
            .unwrap();

        assert!(link_subscription(&repo, &identity("user_123", "a@example.com"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn foreign_link_is_a_conflict() {
        let repo = repo();
        let sub = repo
            .insert_subscription(&subscription("a@example.com", SubscriptionStatus::Active))
            .await
            .unwrap();
        repo.link_subscription(&sub.id, "user_first").await.unwrap();

        let err = link_subscription(&repo, &identity("user_second", "a@example.com"))
            .await
            .unwrap_err();
        match err {
            StoreError::Api(api) => {
                assert_eq!(api.status.status_code(), 409);
                assert_eq!(api.code, ErrorCode::SubscriptionAlreadyLinked);
            }
            other => panic!("expected ApiError, got {other}"),
        }

        // The original link survived.
        let stored = repo
            .subscription_by_provider_id(&sub.stripe_subscription_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.user_id, "user_first");
    }

    #[tokio::test]
    async fn relinking_same_user_is_a_noop() {
        let repo = repo();
        let sub = repo
            .insert_subscription(&subscription("a@example.com", SubscriptionStatus::Active))
            .await
            .unwrap();
        repo.link_subscription(&sub.id, "user_123").await.unwrap();

        let linked = link_subscription(&repo, &identity("user_123", "a@example.com"))
            .await
            .unwrap();
        assert_eq!(linked.user_id, "user_123");
    }

    #[tokio::test]
    async fn past_due_is_still_linkable() {
        let repo = repo();
        repo.insert_subscription(&subscription("a@example.com", SubscriptionStatus::PastDue))
            .await
            .unwrap();

        let linked = link_subscription(&repo, &identity("user_123", "a@example.com"))
            .await
            .unwrap();
        assert_eq!(linked.link_state, LinkState::Linked);
    }
}
