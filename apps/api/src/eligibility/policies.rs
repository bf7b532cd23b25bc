//! Lender policy provider.
//!
//! Policies are read-only input to the matcher. The default provider loads a
//! JSON array once at startup; requests may also carry their own list.

use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;

use crate::eligibility::engine::validate_policies;
use crate::eligibility::models::LenderPolicy;
use crate::errors::AppError;

/// Source of the lender policies a request is matched against.
///
/// Carried in `AppState` as `Arc<dyn PolicyProvider>`.
#[async_trait]
pub trait PolicyProvider: Send + Sync {
    async fn policies(&self) -> Result<Vec<LenderPolicy>, AppError>;
}

/// Fixed policy list held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticPolicyProvider {
    policies: Vec<LenderPolicy>,
}

impl StaticPolicyProvider {
    pub fn new(policies: Vec<LenderPolicy>) -> Self {
        Self { policies }
    }

    /// Loads and validates a JSON array of `LenderPolicy`.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read lender policies from {}", path.display()))?;
        let policies: Vec<LenderPolicy> = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid lender policy file {}", path.display()))?;
        validate_policies(&policies)
            .map_err(|e| anyhow::anyhow!("Invalid lender policy file {}: {e}", path.display()))?;
        Ok(Self::new(policies))
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}

#[async_trait]
impl PolicyProvider for StaticPolicyProvider {
    async fn policies(&self) -> Result<Vec<LenderPolicy>, AppError> {
        Ok(self.policies.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{name}-{}.json", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[tokio::test]
    async fn test_loads_policies_from_file() {
        let path = write_temp(
            "policies",
            r#"[
                {"id": "avanse", "name": "Avanse", "min_monthly_income": 25000,
                 "min_cibil_score": 650, "max_foir_percent": 60,
                 "roi_range": {"min": 10.5, "max": 13.0}, "max_loan_amount": 7500000},
                {"id": "credila", "name": "HDFC Credila", "min_monthly_income": 30000,
                 "min_cibil_score": 700, "max_foir_percent": 55,
                 "roi_range": {"min": 10.0, "max": 12.5}}
            ]"#,
        );

        let provider = StaticPolicyProvider::from_file(&path).unwrap();
        let policies = provider.policies().await.unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(provider.len(), 2);
        assert_eq!(policies[0].id, "avanse");
        assert_eq!(policies[1].max_loan_amount, None);
    }

    #[test]
    fn test_rejects_duplicate_ids_in_file() {
        let path = write_temp(
            "dup-policies",
            r#"[
                {"id": "a", "name": "A", "min_monthly_income": 1, "min_cibil_score": 600,
                 "max_foir_percent": 50, "roi_range": {"min": 10, "max": 12}},
                {"id": "a", "name": "A again", "min_monthly_income": 1, "min_cibil_score": 600,
                 "max_foir_percent": 50, "roi_range": {"min": 10, "max": 12}}
            ]"#,
        );

        let result = StaticPolicyProvider::from_file(&path);
        std::fs::remove_file(&path).ok();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(StaticPolicyProvider::from_file("/nonexistent/policies.json").is_err());
    }
}
