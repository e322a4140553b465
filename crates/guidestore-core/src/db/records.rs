// Typed records for the storefront collections.
//
// Documents cross the adapter boundary as `serde_json::Value` with camelCase
// field names; these types are the in-process representation. Conversion
// helpers keep the serde round trip in one place.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::StoreError;

/// Collection names in the document store.
pub mod collections {
    pub const GUIDES: &str = "guides";
    pub const PURCHASES: &str = "purchases";
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const FEEDBACK: &str = "feedback";
    pub const GUIDE_REQUESTS: &str = "guide_requests";
}

/// Serialize a record into its document form.
pub fn to_document<T: Serialize>(record: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(record).map_err(|e| StoreError::Database(e.to_string()))
}

/// Deserialize a document into a typed record.
pub fn from_document<T: DeserializeOwned>(doc: serde_json::Value) -> Result<T, StoreError> {
    serde_json::from_value(doc).map_err(|e| StoreError::Database(e.to_string()))
}

// ─── Guide ───────────────────────────────────────────────────────

/// A catalog guide. The effective catalog is the static in-code list merged
/// with documents in the `guides` collection (document fields win).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    pub id: String,
    pub title: String,
    pub slug: String,
    /// Price in cents.
    pub price: i64,
    pub category: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub coming_soon: bool,
}

// ─── Purchase ────────────────────────────────────────────────────

/// Purchase lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Active,
    Refunded,
    Revoked,
}

/// One record per (checkout session, guide) pair.
///
/// `access_token` is the sole secret needed to view the guide without
/// authentication. It is generated once at creation and never regenerated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Purchase {
    pub id: String,
    pub email: String,
    pub guide_id: String,
    pub access_token: String,
    pub stripe_session_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_payment_intent_id: Option<String>,
    /// Amount paid for this guide, in cents.
    pub amount: i64,
    pub status: PurchaseStatus,
    #[serde(default)]
    pub access_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_access_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_at: Option<DateTime<Utc>>,
}

impl Purchase {
    /// Whether this purchase currently grants guide access.
    pub fn grants_access(&self) -> bool {
        self.status == PurchaseStatus::Active
    }
}

// ─── Subscription ────────────────────────────────────────────────

/// Subscription lifecycle states tracked locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    PastDue,
    Canceled,
}

impl SubscriptionStatus {
    /// Map a payment-provider status string into the local state set.
    /// Statuses that never grant access (incomplete, unpaid, paused, ...)
    /// collapse to `Canceled`.
    pub fn from_provider(status: &str) -> Self {
        match status {
            "trialing" => Self::Trialing,
            "active" => Self::Active,
            "past_due" => Self::PastDue,
            _ => Self::Canceled,
        }
    }

    /// Whether the subscription currently grants catalog-wide access.
    pub fn grants_access(&self) -> bool {
        matches!(self, Self::Active | Self::Trialing)
    }
}

/// Billing interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Month,
    Year,
}

impl BillingInterval {
    pub fn from_provider(interval: &str) -> Self {
        match interval {
            "year" => Self::Year,
            _ => Self::Month,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

/// Whether a subscription has been linked to a real user account.
///
/// While unlinked, `user_id` holds the purchaser's email as a placeholder;
/// this field makes linkage explicit so call sites never have to infer it by
/// comparing `user_id` to `email`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Unlinked,
    Linked,
}

/// One record per payment-provider subscription id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    /// Real user id once linked; the purchaser's email before that.
    pub user_id: String,
    pub email: String,
    pub status: SubscriptionStatus,
    pub interval: BillingInterval,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub link_state: LinkState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Feedback ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    New,
    Replied,
    Archived,
}

/// Reader feedback. Append-only; mutated only by admin action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub id: String,
    pub email: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guide_id: Option<String>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replied_at: Option<DateTime<Utc>>,
}

// ─── Guide Request ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideRequestStatus {
    New,
    Planned,
    Done,
    Dismissed,
}

impl GuideRequestStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "new" => Some(Self::New),
            "planned" => Some(Self::Planned),
            "done" => Some(Self::Done),
            "dismissed" => Some(Self::Dismissed),
            _ => None,
        }
    }
}

/// A reader request for a guide topic not yet in the catalog. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideRequest {
    pub id: String,
    pub email: String,
    pub topic: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    pub status: GuideRequestStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchase_wire_format_is_camel_case() {
        let purchase = Purchase {
            id: "p1".into(),
            email: "a@example.com".into(),
            guide_id: "sleep-optimization".into(),
            access_token: "gat_abc".into(),
            stripe_session_id: "cs_test_1".into(),
            stripe_payment_intent_id: Some("pi_1".into()),
            amount: 1_900,
            status: PurchaseStatus::Active,
            access_count: 0,
            last_access_at: None,
            created_at: Utc::now(),
            refunded_at: None,
        };
        let doc = to_document(&purchase).unwrap();
        assert_eq!(doc["guideId"], "sleep-optimization");
        assert_eq!(doc["stripeSessionId"], "cs_test_1");
        assert_eq!(doc["status"], "active");
        assert!(doc.get("refundedAt").is_none());
    }

    #[test]
    fn subscription_status_from_provider() {
        assert_eq!(
            SubscriptionStatus::from_provider("active"),
            SubscriptionStatus::Active
        );
        assert_eq!(
            SubscriptionStatus::from_provider("trialing"),
            SubscriptionStatus::Trialing
        );
        assert_eq!(
            SubscriptionStatus::from_provider("past_due"),
            SubscriptionStatus::PastDue
        );
        assert_eq!(
            SubscriptionStatus::from_provider("incomplete_expired"),
            SubscriptionStatus::Canceled
        );
    }

    #[test]
    fn access_granting_states() {
        assert!(SubscriptionStatus::Active.grants_access());
        assert!(SubscriptionStatus::Trialing.grants_access());
        assert!(!SubscriptionStatus::PastDue.grants_access());
        assert!(!SubscriptionStatus::Canceled.grants_access());
    }

    #[test]
    fn document_round_trip() {
        let sub = Subscription {
            id: "s1".into(),
            stripe_subscription_id: "sub_123".into(),
            stripe_customer_id: "cus_123".into(),
            user_id: "a@example.com".into(),
            email: "a@example.com".into(),
            status: SubscriptionStatus::Trialing,
            interval: BillingInterval::Month,
            current_period_start: Utc::now(),
            current_period_end: Utc::now(),
            cancel_at_period_end: false,
            link_state: LinkState::Unlinked,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let doc = to_document(&sub).unwrap();
        assert_eq!(doc["linkState"], "unlinked");
        let back: Subscription = from_document(doc).unwrap();
        assert_eq!(back.status, SubscriptionStatus::Trialing);
        assert_eq!(back.interval, BillingInterval::Month);
    }

    #[test]
    fn guide_request_status_parse() {
        assert_eq!(
            GuideRequestStatus::parse("planned"),
            Some(GuideRequestStatus::Planned)
        );
        assert_eq!(GuideRequestStatus::parse("bogus"), None);
    }
}
