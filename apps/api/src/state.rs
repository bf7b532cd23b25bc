use std::sync::Arc;

use crate::eligibility::policies::PolicyProvider;
use crate::eligibility::EligibilityEngine;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<EligibilityEngine>,
    /// Default lender policies; a request may supply its own instead.
    pub policies: Arc<dyn PolicyProvider>,
}
