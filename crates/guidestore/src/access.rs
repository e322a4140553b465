//! Access validation — may this caller view this guide?
//!
//! Two credentials are accepted: a per-purchase access token, or a bearer
//! identity token backed by an active/trialing subscription. No caching.

use std::sync::Arc;

use guidestore_core::error::Result;

use crate::identity::IdentityProvider;
use crate::store::StoreRepo;

/// The credential presented for a guide view.
#[derive(Debug, Clone)]
pub enum AccessCredential {
    /// Opaque per-purchase token from the receipt email.
    AccessToken(String),
    /// Bearer identity token from the auth provider.
    Bearer(String),
}

#[derive(Debug, Clone)]
pub struct AccessValidator {
    repo: StoreRepo,
    identity: Arc<dyn IdentityProvider>,
}

impl AccessValidator {
    pub fn new(repo: StoreRepo, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { repo, identity }
    }

    /// Validate a credential against a guide. Returns whether access is
    /// granted; all failure modes collapse to `false`.
    pub async fn validate(&self, credential: &AccessCredential, guide_id: &str) -> Result<bool> {
        match credential {
            AccessCredential::AccessToken(token) => self.validate_token(token, guide_id).await,
            AccessCredential::Bearer(token) => self.validate_bearer(token).await,
        }
    }

    /// A purchase grants access to exactly its guide while it stays active.
    async fn validate_token(&self, access_token: &str, guide_id: &str) -> Result<bool> {
        let Some(purchase) = self
            .repo
            .purchase_by_token_and_guide(access_token, guide_id)
            .await?
        else {
            return Ok(false);
        };

        if !purchase.grants_access() {
            return Ok(false);
        }

        // Counter bookkeeping must never block a legitimate read.
        if let Err(e) = self.repo.record_access(&purchase).await {
            tracing::warn!(error = %e, purchase_id = %purchase.id, "access counter update failed");
        }

        Ok(true)
    }

    /// A subscription grants access to the whole catalog, so the guide id
    /// only needs to exist on the request, not in the check.
    async fn validate_bearer(&self, bearer_token: &str) -> Result<bool> {
        let Some(identity) = self.identity.verify(bearer_token).await? else {
            return Ok(false);
        };

        let subscriptions = self
            .repo
            .subscriptions_for_identity(&identity.user_id, &identity.email)
            .await?;

        Ok(subscriptions.iter().any(|s| s.status.grants_access()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use guidestore_core::utils::id::{generate_access_token, generate_id};
    use guidestore_core::{
        BillingInterval, LinkState, Purchase, PurchaseStatus, Subscription, SubscriptionStatus,
    };
    use guidestore_memory::MemoryAdapter;

    use crate::identity::JwtIdentityProvider;

    const SECRET: &str = "a-secret-of-at-least-32-characters!!";

    fn setup() -> (AccessValidator, StoreRepo, JwtIdentityProvider) {
        let repo = StoreRepo::new(Arc::new(MemoryAdapter::new()));
        let provider = JwtIdentityProvider::new(SECRET);
        let validator = AccessValidator::new(repo.clone(), Arc::new(provider.clone()));
        (validator, repo, provider)
    }

    fn purchase(guide: &str, status: PurchaseStatus) -> Purchase {
        Purchase {
            id: generate_id(),
            email: "a@example.com".into(),
            guide_id: guide.into(),
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

    fn subscription(user_id: &str, email: &str, status: SubscriptionStatus) -> Subscription {
        Subscription {
            id: generate_id(),
            stripe_subscription_id: generate_id(),
            stripe_customer_id: "cus_1".into(),
            user_id: user_id.into(),
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
    async fn active_purchase_token_grants_access() {
        let (validator, repo, _) = setup();
        let p = repo
            .create_purchase(&purchase("sleep-optimization", PurchaseStatus::Active))
            .await
            .unwrap();

        let ok = validator
            .validate(
                &AccessCredential::AccessToken(p.access_token.clone()),
                "sleep-optimization",
            )
            .await
            .unwrap();
        assert!(ok);

        // The read was counted.
        let stored = repo.purchase_by_id(&p.id).await.unwrap().unwrap();
        assert_eq!(stored.access_count, 1);
        assert!(stored.last_access_at.is_some());
    }

    #[tokio::test]
    async fn token_is_scoped_to_its_guide() {
        let (validator, repo, _) = setup();
        let p = repo
            .create_purchase(&purchase("sleep-optimization", PurchaseStatus::Active))
            .await
            .unwrap();

        let ok = validator
            .validate(
                &AccessCredential::AccessToken(p.access_token),
                "gut-health-reset",
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn refunded_and_revoked_purchases_deny_access() {
        let (validator, repo, _) = setup();
        for status in [PurchaseStatus::Refunded, PurchaseStatus::Revoked] {
            let p = repo
                .create_purchase(&purchase("sleep-optimization", status))
                .await
                .unwrap();
            let ok = validator
                .validate(
                    &AccessCredential::AccessToken(p.access_token),
                    "sleep-optimization",
                )
                .await
                .unwrap();
            assert!(!ok, "{status:?} purchase must not grant access");
        }
    }

    #[tokio::test]
    async fn unknown_token_denies_access() {
        let (validator, _, _) = setup();
        let ok = validator
            .validate(
                &AccessCredential::AccessToken("gat_bogus".into()),
                "sleep-optimization",
            )
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn bearer_with_active_subscription_grants_access() {
        let (validator, repo, provider) = setup();
        repo.insert_subscription(&subscription(
            "user_123",
            "a@example.com",
            SubscriptionStatus::Active,
        ))
        .await
        .unwrap();

        let token = provider.issue("user_123", "a@example.com", 3600).unwrap();
        let ok = validator
            .validate(&AccessCredential::Bearer(token), "any-guide")
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn bearer_matches_unlinked_subscription_by_email() {
        let (validator, repo, provider) = setup();
        // Placeholder record: user id still holds the email.
        repo.insert_subscription(&subscription(
            "a@example.com",
            "a@example.com",
            SubscriptionStatus::Trialing,
        ))
        .await
        .unwrap();

        let token = provider.issue("user_123", "a@example.com", 3600).unwrap();
        let ok = validator
            .validate(&AccessCredential::Bearer(token), "any-guide")
            .await
            .unwrap();
        assert!(ok);
    }

    #[tokio::test]
    async fn past_due_and_canceled_deny_access() {
        let (validator, repo, provider) = setup();
        repo.insert_subscription(&subscription(
            "user_123",
            "a@example.com",
            SubscriptionStatus::PastDue,
        ))
        .await
        .unwrap();
        repo.insert_subscription(&subscription(
            "user_123",
            "a@example.com",
            SubscriptionStatus::Canceled,
        ))
        .await
        .unwrap();

        let token = provider.issue("user_123", "a@example.com", 3600).unwrap();
        let ok = validator
            .validate(&AccessCredential::Bearer(token), "any-guide")
            .await
            .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn invalid_bearer_denies_access() {
        let (validator, _, _) = setup();
        let ok = validator
            .validate(&AccessCredential::Bearer("garbage".into()), "any-guide")
            .await
            .unwrap();
        assert!(!ok);
    }
}
