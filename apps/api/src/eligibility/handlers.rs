//! Axum route handlers for the Eligibility API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::eligibility::models::{LenderPolicy, Report, StudentProfile};
use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub profile: StudentProfile,
    /// Overrides the configured policies for this request.
    pub policies: Option<Vec<LenderPolicy>>,
}

#[derive(Debug, Serialize)]
pub struct PoliciesResponse {
    pub policies: Vec<LenderPolicy>,
    pub count: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/eligibility/analyze
///
/// Full pipeline: six sub-analyses → overall score → lender matching → recommendations.
/// Degraded sub-analyses are reported inside the `Report`, not as an HTTP error.
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<Json<Report>, AppError> {
    let policies = match request.policies {
        Some(policies) => policies,
        None => state.policies.policies().await?,
    };

    let report = state.engine.analyze(&request.profile, &policies).await?;

    Ok(Json(report))
}

/// GET /api/v1/eligibility/policies
pub async fn handle_list_policies(
    State(state): State<AppState>,
) -> Result<Json<PoliciesResponse>, AppError> {
    let policies = state.policies.policies().await?;
    Ok(Json(PoliciesResponse {
        count: policies.len(),
        policies,
    }))
}
