//! Shared kernel for the guidestore backend.
//!
//! Holds everything the application and integration crates depend on:
//! the error taxonomy, configuration options, the document store adapter
//! contract, typed collection records, shared expiring counters, and id
//! generation utilities.

pub mod counter;
pub mod db;
pub mod env;
pub mod error;
pub mod options;
pub mod utils;

// Re-exports for convenience
pub use counter::{check_rate_limit, MemoryRateLimitStore, RateLimitRule, RateLimitStore};
pub use db::adapter::{Adapter, FindManyQuery, SortBy, SortDirection, WhereClause};
pub use db::records::{
    BillingInterval, Feedback, FeedbackStatus, Guide, GuideRequest, GuideRequestStatus, LinkState,
    Purchase, PurchaseStatus, Subscription, SubscriptionStatus,
};
pub use error::{ApiError, ErrorCode, HttpStatus, Result, StoreError};
pub use options::StoreOptions;
