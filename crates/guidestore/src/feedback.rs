//! Public feedback and guide-request submission.
//!
//! Both collections are append-only from the public side; status changes are
//! admin actions (see `backoffice`).

use chrono::Utc;
use serde::Deserialize;

use guidestore_core::error::{ApiError, ErrorCode, StoreError};
use guidestore_core::utils::id::generate_id;
use guidestore_core::{Feedback, FeedbackStatus, GuideRequest, GuideRequestStatus};

use crate::store::StoreRepo;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitFeedbackRequest {
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub guide_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitGuideRequestRequest {
    pub email: String,
    pub topic: String,
    #[serde(default)]
    pub details: Option<String>,
}

fn require_nonempty(value: &str, code: ErrorCode) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        Err(ApiError::bad_request(code))
    } else {
        Ok(())
    }
}

pub async fn submit_feedback(
    repo: &StoreRepo,
    request: SubmitFeedbackRequest,
) -> Result<Feedback, StoreError> {
    require_nonempty(&request.email, ErrorCode::InvalidEmail).map_err(StoreError::Api)?;
    require_nonempty(&request.message, ErrorCode::CouldNotParseBody).map_err(StoreError::Api)?;

    let feedback = Feedback {
        id: generate_id(),
        email: request.email,
        message: request.message,
        guide_id: request.guide_id,
        status: FeedbackStatus::New,
        created_at: Utc::now(),
        replied_at: None,
    };
    repo.create_feedback(&feedback).await
}

pub async fn submit_guide_request(
    repo: &StoreRepo,
    request: SubmitGuideRequestRequest,
) -> Result<GuideRequest, StoreError> {
    require_nonempty(&request.email, ErrorCode::InvalidEmail).map_err(StoreError::Api)?;
    require_nonempty(&request.topic, ErrorCode::CouldNotParseBody).map_err(StoreError::Api)?;

    let guide_request = GuideRequest {
        id: generate_id(),
        email: request.email,
        topic: request.topic,
        details: request.details,
        status: GuideRequestStatus::New,
        created_at: Utc::now(),
    };
    repo.create_guide_request(&guide_request).await
}
