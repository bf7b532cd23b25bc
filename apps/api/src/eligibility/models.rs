//! Data model for the eligibility pipeline.
//!
//! `StudentProfile` and `LenderPolicy` are produced upstream and only read here.
//! `AnalysisResult`, `MatchResult` and `Report` are built fresh for each run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::eligibility::analyzers::{
    academic::AcademicDetails, admission::AdmissionDetails, cibil::CibilDetails,
    financial::FinancialDetails, kyc::KycDetails, work_experience::WorkExperienceDetails,
};
use crate::eligibility::recommendations::RecommendationBundle;

// ────────────────────────────────────────────────────────────────────────────
// Student profile (upstream snapshot)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentProfile {
    pub student_id: String,
    pub name: Option<String>,
    pub academics: Option<AcademicRecords>,
    pub kyc: Option<KycRecord>,
    #[serde(default)]
    pub co_borrowers: Vec<CoBorrower>,
    #[serde(default)]
    pub work_experience: Vec<WorkExperienceEntry>,
    pub admission_letter: Option<AdmissionLetter>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicRecords {
    pub class_10: Option<AcademicRecord>,
    pub class_12: Option<AcademicRecord>,
    pub graduation: Option<AcademicRecord>,
    pub gap_years: Option<u8>,
    #[serde(default)]
    pub backlogs: u32,
}

impl AcademicRecords {
    pub fn is_empty(&self) -> bool {
        [&self.class_10, &self.class_12, &self.graduation]
            .iter()
            .all(|record| {
                record
                    .as_ref()
                    .and_then(AcademicRecord::effective_percentage)
                    .is_none()
            })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AcademicRecord {
    pub percentage: Option<f64>,
    /// 10-point scale
    pub cgpa: Option<f64>,
    pub board: Option<String>,
    pub year_of_passing: Option<i32>,
}

/// Standard CGPA → percentage multiplier used by Indian boards and universities.
const CGPA_TO_PERCENTAGE: f64 = 9.5;

impl AcademicRecord {
    /// Percentage if reported, otherwise the CGPA converted to a percentage.
    pub fn effective_percentage(&self) -> Option<f64> {
        self.percentage
            .or_else(|| self.cgpa.map(|cgpa| cgpa * CGPA_TO_PERCENTAGE))
            .filter(|pct| pct.is_finite() && *pct >= 0.0)
            .map(|pct| pct.min(100.0))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KycStatus {
    #[default]
    NotStarted,
    Pending,
    Verified,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Aadhaar,
    Pan,
    Passport,
    #[serde(other)]
    Other,
}

impl DocumentKind {
    pub fn label(&self) -> &'static str {
        match self {
            DocumentKind::Aadhaar => "Aadhaar",
            DocumentKind::Pan => "PAN",
            DocumentKind::Passport => "Passport",
            DocumentKind::Other => "Other",
        }
    }
}

/// Documents every applicant must have verified before disbursal.
pub const REQUIRED_KYC_DOCUMENTS: [DocumentKind; 3] =
    [DocumentKind::Aadhaar, DocumentKind::Pan, DocumentKind::Passport];

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KycRecord {
    #[serde(default)]
    pub status: KycStatus,
    #[serde(default)]
    pub documents: Vec<KycDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KycDocument {
    pub kind: DocumentKind,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoBorrower {
    pub name: String,
    #[serde(default)]
    pub relation: String,
    pub financial: Option<CoBorrowerFinancials>,
    pub cibil_estimate: Option<u16>,
}

/// Figures pre-computed by the upstream document-extraction agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoBorrowerFinancials {
    pub avg_monthly_income: f64,
    #[serde(default)]
    pub total_existing_emi: f64,
    pub foir: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkExperienceEntry {
    pub company: String,
    #[serde(default)]
    pub role: String,
    pub duration_months: u32,
    #[serde(default)]
    pub verified: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdmissionLetter {
    pub university: String,
    pub country: String,
    pub course: String,
    pub intake: Option<String>,
    pub tuition_fee: Option<f64>,
    pub scholarship_amount: Option<f64>,
    #[serde(default)]
    pub is_conditional: bool,
    pub university_ranking: Option<u32>,
}

// ────────────────────────────────────────────────────────────────────────────
// Sub-analysis output
// ────────────────────────────────────────────────────────────────────────────

/// Which layer produced an analyzer's score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Llm,
    RuleBased,
    NoData,
    Failed,
}

/// Score plus explanations, before domain details are attached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub score: u8,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
}

/// Canonical output of one sub-analyzer. `D` carries the analyzer's
/// domain-specific figures and is flattened into the same JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult<D> {
    pub score: u8,
    pub strengths: Vec<String>,
    pub issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub source: ScoreSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: D,
}

impl<D> AnalysisResult<D> {
    pub fn from_assessment(assessment: Assessment, source: ScoreSource, details: D) -> Self {
        Self {
            score: assessment.score.min(100),
            strengths: assessment.strengths,
            issues: assessment.issues,
            recommendations: assessment.recommendations,
            source,
            error: None,
            details,
        }
    }
}

impl<D: Default> AnalysisResult<D> {
    /// Fixed zero-score result for an absent profile slice. No LLM call is made.
    pub fn no_data(issue: &str, recommendation: &str) -> Self {
        Self {
            score: 0,
            strengths: vec![],
            issues: vec![issue.to_string()],
            recommendations: vec![recommendation.to_string()],
            source: ScoreSource::NoData,
            error: None,
            details: D::default(),
        }
    }

    /// Degraded result for an analyzer that errored or panicked.
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            score: 0,
            strengths: vec![],
            issues: vec![format!("Analysis could not be completed: {message}")],
            recommendations: vec![],
            source: ScoreSource::Failed,
            error: Some(message),
            details: D::default(),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Lender policies and matching
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RoiRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

/// A lender's (NBFC's) eligibility thresholds. Immutable input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LenderPolicy {
    pub id: String,
    pub name: String,
    pub min_monthly_income: f64,
    pub min_cibil_score: u16,
    pub max_foir_percent: f64,
    pub roi_range: RoiRange,
    pub max_loan_amount: Option<f64>,
}

/// Ordered worst → best so decisions can be capped with `min`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityStatus {
    NotEligible,
    Borderline,
    Eligible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApprovalProbability {
    High,
    Medium,
    Low,
}

impl From<EligibilityStatus> for ApprovalProbability {
    fn from(status: EligibilityStatus) -> Self {
        match status {
            EligibilityStatus::Eligible => ApprovalProbability::High,
            EligibilityStatus::Borderline => ApprovalProbability::Medium,
            EligibilityStatus::NotEligible => ApprovalProbability::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Llm,
    RuleBased,
}

/// The decision for one lender policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub lender_id: String,
    pub lender_name: String,
    pub eligibility_status: EligibilityStatus,
    pub match_percentage: u8,
    pub strengths: Vec<String>,
    pub gaps: Vec<String>,
    pub specific_recommendations: Vec<String>,
    pub estimated_loan_amount: AmountRange,
    pub estimated_roi: RoiRange,
    pub approval_probability: ApprovalProbability,
    pub decided_by: DecisionSource,
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analyses {
    pub academic: AnalysisResult<AcademicDetails>,
    pub kyc: AnalysisResult<KycDetails>,
    pub financial: AnalysisResult<FinancialDetails>,
    pub cibil: AnalysisResult<CibilDetails>,
    pub work_experience: AnalysisResult<WorkExperienceDetails>,
    pub admission: AnalysisResult<AdmissionDetails>,
}

impl Analyses {
    pub fn scores(&self) -> CategoryScores {
        CategoryScores {
            academic: self.academic.score,
            kyc: self.kyc.score,
            financial: self.financial.score,
            cibil: self.cibil.score,
            work_experience: self.work_experience.score,
            admission: self.admission.score,
        }
    }
}

/// The six sub-analysis scores, 0 – 100 each.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub academic: u8,
    pub kyc: u8,
    pub financial: u8,
    pub cibil: u8,
    pub work_experience: u8,
    pub admission: u8,
}

/// Final output of one eligibility run. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub report_id: Uuid,
    pub student_id: String,
    pub generated_at: DateTime<Utc>,
    pub analyses: Analyses,
    pub overall_score: u8,
    pub matches: Vec<MatchResult>,
    pub recommendations: RecommendationBundle,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_percentage_prefers_reported_percentage() {
        let record = AcademicRecord {
            percentage: Some(88.0),
            cgpa: Some(7.0),
            ..Default::default()
        };
        assert_eq!(record.effective_percentage(), Some(88.0));
    }

    #[test]
    fn test_effective_percentage_converts_cgpa() {
        let record = AcademicRecord {
            cgpa: Some(8.0),
            ..Default::default()
        };
        assert_eq!(record.effective_percentage(), Some(76.0));
    }

    #[test]
    fn test_academic_records_without_figures_are_empty() {
        let records = AcademicRecords {
            class_10: Some(AcademicRecord {
                board: Some("CBSE".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(records.is_empty());
    }

    #[test]
    fn test_status_ordering_is_worst_to_best() {
        assert!(EligibilityStatus::NotEligible < EligibilityStatus::Borderline);
        assert!(EligibilityStatus::Borderline < EligibilityStatus::Eligible);
        assert_eq!(
            EligibilityStatus::Eligible.min(EligibilityStatus::Borderline),
            EligibilityStatus::Borderline
        );
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&EligibilityStatus::NotEligible).unwrap();
        assert_eq!(json, "\"not_eligible\"");
        let prob = serde_json::to_string(&ApprovalProbability::High).unwrap();
        assert_eq!(prob, "\"High\"");
    }

    #[test]
    fn test_unknown_document_kind_maps_to_other() {
        let doc: KycDocument =
            serde_json::from_str(r#"{"kind": "voter_id", "verified": true}"#).unwrap();
        assert_eq!(doc.kind, DocumentKind::Other);
    }

    #[test]
    fn test_profile_deserializes_with_missing_slices() {
        let profile: StudentProfile =
            serde_json::from_str(r#"{"student_id": "stu-1"}"#).unwrap();
        assert!(profile.co_borrowers.is_empty());
        assert!(profile.academics.is_none());
        assert!(profile.admission_letter.is_none());
    }
}
