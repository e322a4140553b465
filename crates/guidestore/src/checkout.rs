//! Checkout initiation — validate the request, build the hosted session.

use serde::{Deserialize, Serialize};

use guidestore_core::error::{ApiError, ErrorCode, StoreError};

use crate::context::StoreContext;
use crate::stripe::CheckoutSession;

/// One-time purchase request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuideCheckoutRequest {
    pub email: String,
    pub guide_ids: Vec<String>,
}

/// Subscription checkout request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionCheckoutRequest {
    pub plan: String,
    pub email: String,
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Hosted checkout handle returned to the browser.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

impl From<CheckoutSession> for CheckoutResponse {
    fn from(session: CheckoutSession) -> Self {
        Self {
            session_id: session.session_id,
            url: session.url,
        }
    }
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.contains('@') && email.len() >= 3 {
        Ok(())
    } else {
        Err(ApiError::bad_request(ErrorCode::InvalidEmail))
    }
}

/// Build a one-time checkout session for the selected guides.
pub async fn create_guide_checkout(
    ctx: &StoreContext,
    request: GuideCheckoutRequest,
) -> Result<CheckoutResponse, StoreError> {
    validate_email(&request.email).map_err(StoreError::Api)?;

    if request.guide_ids.is_empty() {
        return Err(ApiError::bad_request(ErrorCode::EmptyCart).into());
    }

    let mut guides = Vec::with_capacity(request.guide_ids.len());
    for guide_id in &request.guide_ids {
        let guide = ctx
            .catalog
            .find_by_id(guide_id)
            .await?
            .ok_or_else(|| {
                ApiError::with_message(
                    guidestore_core::HttpStatus::BadRequest,
                    ErrorCode::GuideNotFound,
                    format!("Unknown guide: {guide_id}"),
                )
            })?;
        if guide.coming_soon {
            return Err(ApiError::with_message(
                guidestore_core::HttpStatus::BadRequest,
                ErrorCode::GuideNotPurchasable,
                format!("Guide is not yet available: {guide_id}"),
            )
            .into());
        }
        guides.push(guide);
    }

    let session = ctx
        .stripe
        .create_guide_checkout(
            &request.email,
            &guides,
            &ctx.options.checkout.currency,
            &ctx.options.checkout.success_url,
            &ctx.options.checkout.cancel_url,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "guide checkout session creation failed");
            StoreError::Api(ApiError::internal(ErrorCode::CheckoutFailed))
        })?;

    Ok(session.into())
}

/// Build a recurring checkout session for a subscription plan.
pub async fn create_subscription_checkout(
    ctx: &StoreContext,
    request: SubscriptionCheckoutRequest,
) -> Result<CheckoutResponse, StoreError> {
    validate_email(&request.email).map_err(StoreError::Api)?;

    let plan = ctx
        .options
        .find_plan(&request.plan)
        .ok_or_else(|| ApiError::bad_request(ErrorCode::InvalidPlan))?
        .clone();

    let session = ctx
        .stripe
        .create_subscription_checkout(
            &plan,
            &request.email,
            request.user_id.as_deref(),
            &ctx.options.checkout.currency,
            &ctx.options.checkout.success_url,
            &ctx.options.checkout.cancel_url,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "subscription checkout session creation failed");
            StoreError::Api(ApiError::internal(ErrorCode::CheckoutFailed))
        })?;

    Ok(session.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::test_support::test_context;

    fn api_code(err: StoreError) -> ErrorCode {
        match err {
            StoreError::Api(api) => api.code,
            other => panic!("expected ApiError, got {other}"),
        }
    }

    #[tokio::test]
    async fn rejects_empty_cart() {
        let ctx = test_context();
        let err = create_guide_checkout(
            &ctx,
            GuideCheckoutRequest {
                email: "a@example.com".into(),
                guide_ids: vec![],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(api_code(err), ErrorCode::EmptyCart);
    }

    #[tokio::test]
    async fn rejects_bad_email() {
        let ctx = test_context();
        let err = create_guide_checkout(
            &ctx,
            GuideCheckoutRequest {
                email: "nope".into(),
                guide_ids: vec!["sleep-optimization".into()],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(api_code(err), ErrorCode::InvalidEmail);
    }

    #[tokio::test]
    async fn rejects_unknown_guide() {
        let ctx = test_context();
        let err = create_guide_checkout(
            &ctx,
            GuideCheckoutRequest {
                email: "a@example.com".into(),
                guide_ids: vec!["no-such-guide".into()],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(api_code(err), ErrorCode::GuideNotFound);
    }

    #[tokio::test]
    async fn rejects_coming_soon_guide() {
        let ctx = test_context();
        let err = create_guide_checkout(
            &ctx,
            GuideCheckoutRequest {
                email: "a@example.com".into(),
                guide_ids: vec!["deep-focus".into()],
            },
        )
        .await
        .unwrap_err();
        assert_eq!(api_code(err), ErrorCode::GuideNotPurchasable);
    }

    #[tokio::test]
    async fn rejects_unknown_plan() {
        let ctx = test_context();
        let err = create_subscription_checkout(
            &ctx,
            SubscriptionCheckoutRequest {
                plan: "weekly".into(),
                email: "a@example.com".into(),
                user_id: None,
            },
        )
        .await
        .unwrap_err();
        assert_eq!(api_code(err), ErrorCode::InvalidPlan);
    }
}
