//! Payment-provider plumbing: API client and webhook verification.

pub mod client;
pub mod webhook;

pub use client::{CheckoutSession, StripeClient, SubscriptionFetcher};
pub use webhook::{verify_webhook_signature, WebhookEvent};
