//! Wire types for the bookkeeping REST API.

use serde::{Deserialize, Serialize};

use ledgerbook_core::models::CustomCard;

/// Generic `{success:true}` acknowledgement body.
#[derive(Debug, Clone, Deserialize)]
pub struct SuccessResponse {
    #[serde(default)]
    pub success: bool,
}

/// Envelope for the custom-card endpoints. POST is a full replace: the
/// server deletes all cards and reinserts the posted list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardsEnvelope {
    pub cards: Vec<CustomCard>,
}

/// Body for POST /api/limits.
#[derive(Debug, Clone, Serialize)]
pub struct LimitLockRequest {
    pub locked: bool,
}

/// Structured error body some endpoints return alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub code: String,
    pub message: String,
}
