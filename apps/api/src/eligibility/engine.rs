//! Orchestrator — runs the six sub-analyzers concurrently, aggregates their
//! scores, matches the applicant against every lender policy and assembles
//! the final `Report`.
//!
//! A failing or panicking analyzer never takes the report down with it: its
//! slot becomes a degraded `AnalysisResult::failed` with score 0.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::eligibility::analyzers::{
    academic, admission, cibil, clamp_score, financial, kyc, work_experience, AnalyzerContext,
};
use crate::eligibility::models::{
    Analyses, AnalysisResult, CategoryScores, LenderPolicy, MatchResult, Report, StudentProfile,
};
use crate::eligibility::nbfc_matcher::{self, ApplicantMetrics};
use crate::eligibility::recommendations;
use crate::errors::AppError;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::CompletionService;

/// Per-category weights of the overall score.
#[derive(Debug, Clone, Copy)]
pub struct CategoryWeights {
    pub academic: f64,
    pub kyc: f64,
    pub financial: f64,
    pub cibil: f64,
    pub work_experience: f64,
    pub admission: f64,
}

impl CategoryWeights {
    pub fn total(&self) -> f64 {
        self.academic + self.kyc + self.financial + self.cibil + self.work_experience + self.admission
    }
}

/// Must sum to 1.0.
pub const WEIGHTS: CategoryWeights = CategoryWeights {
    academic: 0.20,
    kyc: 0.15,
    financial: 0.25,
    cibil: 0.15,
    work_experience: 0.05,
    admission: 0.20,
};

pub fn overall_score(scores: &CategoryScores) -> u8 {
    let w = WEIGHTS;
    debug_assert!((w.total() - 1.0).abs() < 1e-9);
    clamp_score(
        scores.academic as f64 * w.academic
            + scores.kyc as f64 * w.kyc
            + scores.financial as f64 * w.financial
            + scores.cibil as f64 * w.cibil
            + scores.work_experience as f64 * w.work_experience
            + scores.admission as f64 * w.admission,
    )
}

/// Entry point of the eligibility pipeline. Cheap to clone; holds only the
/// shared completion client and retry policy.
#[derive(Clone)]
pub struct EligibilityEngine {
    ctx: AnalyzerContext,
}

type AnalyzerHandle<D> = JoinHandle<Result<AnalysisResult<D>, AppError>>;

impl EligibilityEngine {
    pub fn new(llm: Arc<dyn CompletionService>, retry: RetryPolicy) -> Self {
        Self {
            ctx: AnalyzerContext { llm, retry },
        }
    }

    pub async fn analyze(
        &self,
        profile: &StudentProfile,
        policies: &[LenderPolicy],
    ) -> Result<Report, AppError> {
        validate(profile, policies)?;

        info!(
            "Eligibility analysis started: student={}, policies={}",
            profile.student_id,
            policies.len()
        );

        let profile = Arc::new(profile.clone());

        let academic = self.spawn(&profile, |p, ctx| async move { academic::analyze(&p, &ctx).await });
        let kyc = self.spawn(&profile, |p, ctx| async move { kyc::analyze(&p, &ctx).await });
        let financial = self.spawn(&profile, |p, ctx| async move { financial::analyze(&p, &ctx).await });
        let cibil = self.spawn(&profile, |p, _| async move { cibil::analyze(&p).await });
        let work_experience =
            self.spawn(&profile, |p, _| async move { work_experience::analyze(&p).await });
        let admission = self.spawn(&profile, |p, ctx| async move { admission::analyze(&p, &ctx).await });

        // Every handle is awaited; one analyzer's failure never cancels the others.
        let analyses = Analyses {
            academic: settle("academic", academic).await,
            kyc: settle("kyc", kyc).await,
            financial: settle("financial", financial).await,
            cibil: settle("cibil", cibil).await,
            work_experience: settle("work_experience", work_experience).await,
            admission: settle("admission", admission).await,
        };

        let scores = analyses.scores();
        let overall = overall_score(&scores);
        let metrics = ApplicantMetrics::from_analyses(overall, &analyses);
        info!("Sub-analyses complete: {scores:?}, overall={overall}");

        let matches = self.match_lenders(metrics, scores, policies).await;
        if matches.len() != policies.len() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "matcher returned {} results for {} policies",
                matches.len(),
                policies.len()
            )));
        }

        let recommendations = recommendations::generate(&analyses, overall, &matches);
        info!(
            "Eligibility analysis finished: student={}, overall={}, eligible={}, borderline={}",
            profile.student_id, overall, recommendations.eligible_count, recommendations.borderline_count
        );

        Ok(Report {
            report_id: Uuid::new_v4(),
            student_id: profile.student_id.clone(),
            generated_at: Utc::now(),
            analyses,
            overall_score: overall,
            matches,
            recommendations,
        })
    }

    fn spawn<D, F, Fut>(&self, profile: &Arc<StudentProfile>, analyzer: F) -> AnalyzerHandle<D>
    where
        D: Send + 'static,
        F: FnOnce(Arc<StudentProfile>, AnalyzerContext) -> Fut,
        Fut: Future<Output = Result<AnalysisResult<D>, AppError>> + Send + 'static,
    {
        tokio::spawn(analyzer(profile.clone(), self.ctx.clone()))
    }

    /// Runs the matcher on its own task. If it errors or panics, every policy
    /// is decided by the rule-based procedure instead.
    async fn match_lenders(
        &self,
        metrics: ApplicantMetrics,
        scores: CategoryScores,
        policies: &[LenderPolicy],
    ) -> Vec<MatchResult> {
        let ctx = self.ctx.clone();
        let owned: Arc<Vec<LenderPolicy>> = Arc::new(policies.to_vec());
        let task_policies = owned.clone();
        let handle = tokio::spawn(async move {
            nbfc_matcher::match_lenders(&ctx, &metrics, &scores, &task_policies).await
        });

        match handle.await {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!("NBFC matcher failed ({e}), deciding all policies by rules");
                rule_based_matches(&metrics, &owned)
            }
            Err(e) => {
                warn!("NBFC matcher task failed ({e}), deciding all policies by rules");
                rule_based_matches(&metrics, &owned)
            }
        }
    }
}

fn rule_based_matches(metrics: &ApplicantMetrics, policies: &[LenderPolicy]) -> Vec<MatchResult> {
    policies
        .iter()
        .map(|policy| nbfc_matcher::rule_based_match(metrics, policy))
        .collect()
}

async fn settle<D: Default>(name: &str, handle: AnalyzerHandle<D>) -> AnalysisResult<D> {
    match handle.await {
        Ok(Ok(result)) => result,
        Ok(Err(e)) => {
            warn!("{name} analyzer failed: {e}");
            AnalysisResult::failed(e.to_string())
        }
        Err(e) => {
            warn!("{name} analyzer task failed: {e}");
            AnalysisResult::failed(format!("analyzer task failed: {e}"))
        }
    }
}

/// Structural checks only; missing profile slices are not errors.
pub fn validate(profile: &StudentProfile, policies: &[LenderPolicy]) -> Result<(), AppError> {
    if profile.student_id.trim().is_empty() {
        return Err(AppError::Validation("student_id cannot be empty".to_string()));
    }
    validate_policies(policies)
}

pub fn validate_policies(policies: &[LenderPolicy]) -> Result<(), AppError> {
    if policies.is_empty() {
        return Err(AppError::Validation(
            "at least one lender policy is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for policy in policies {
        let id = policy.id.trim();
        if id.is_empty() {
            return Err(AppError::Validation(format!(
                "lender policy '{}' has an empty id",
                policy.name
            )));
        }
        if !seen.insert(id) {
            return Err(AppError::Validation(format!("duplicate lender policy id '{id}'")));
        }

        let thresholds = [
            ("min_monthly_income", policy.min_monthly_income),
            ("max_foir_percent", policy.max_foir_percent),
            ("roi_range.min", policy.roi_range.min),
            ("roi_range.max", policy.roi_range.max),
            ("max_loan_amount", policy.max_loan_amount.unwrap_or(0.0)),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(AppError::Validation(format!(
                    "lender policy '{id}': {field} must be a non-negative number"
                )));
            }
        }
        if policy.roi_range.min > policy.roi_range.max {
            return Err(AppError::Validation(format!(
                "lender policy '{id}': roi_range.min exceeds roi_range.max"
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::eligibility::analyzers::financial::NO_CO_BORROWER_ISSUE;
    use crate::eligibility::models::{
        AcademicRecord, AcademicRecords, AdmissionLetter, CoBorrower, CoBorrowerFinancials,
        DecisionSource, DocumentKind, EligibilityStatus, KycDocument, KycRecord, KycStatus,
        RoiRange, ScoreSource, WorkExperienceEntry,
    };
    use crate::llm_client::testing::{FailingCompletion, HangingCompletion};
    use crate::llm_client::LlmError;

    struct PanickingCompletion;

    #[async_trait]
    impl CompletionService for PanickingCompletion {
        async fn invoke(&self, _prompt: &str, _timeout: Duration) -> Result<String, LlmError> {
            panic!("completion backend crashed");
        }
    }

    fn failing_engine() -> EligibilityEngine {
        EligibilityEngine::new(Arc::new(FailingCompletion::default()), RetryPolicy::default())
    }

    fn policy(id: &str) -> LenderPolicy {
        LenderPolicy {
            id: id.to_string(),
            name: format!("Lender {id}"),
            min_monthly_income: 25_000.0,
            min_cibil_score: 650,
            max_foir_percent: 60.0,
            roi_range: RoiRange {
                min: 10.5,
                max: 13.5,
            },
            max_loan_amount: Some(4_000_000.0),
        }
    }

    fn strong_profile(existing_emi: f64) -> StudentProfile {
        let record = |pct: f64| AcademicRecord {
            percentage: Some(pct),
            ..Default::default()
        };
        let verified = |kind| KycDocument {
            kind,
            verified: true,
        };
        StudentProfile {
            student_id: "stu-42".to_string(),
            name: Some("Asha".to_string()),
            academics: Some(AcademicRecords {
                class_10: Some(record(90.0)),
                class_12: Some(record(88.0)),
                graduation: Some(record(82.0)),
                ..Default::default()
            }),
            kyc: Some(KycRecord {
                status: KycStatus::Verified,
                documents: vec![
                    verified(DocumentKind::Aadhaar),
                    verified(DocumentKind::Pan),
                    verified(DocumentKind::Passport),
                ],
            }),
            co_borrowers: vec![CoBorrower {
                name: "Parent".to_string(),
                relation: "father".to_string(),
                financial: Some(CoBorrowerFinancials {
                    avg_monthly_income: 100_000.0,
                    total_existing_emi: existing_emi,
                    foir: None,
                }),
                cibil_estimate: Some(780),
            }],
            work_experience: vec![WorkExperienceEntry {
                company: "Infosys".to_string(),
                role: "Engineer".to_string(),
                duration_months: 24,
                verified: true,
            }],
            admission_letter: Some(AdmissionLetter {
                university: "TU Munich".to_string(),
                country: "Germany".to_string(),
                course: "MSc Informatics".to_string(),
                tuition_fee: Some(300_000.0),
                scholarship_amount: Some(100_000.0),
                university_ranking: Some(50),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((WEIGHTS.total() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_overall_score_bounds() {
        assert_eq!(overall_score(&CategoryScores::default()), 0);
        let perfect = CategoryScores {
            academic: 100,
            kyc: 100,
            financial: 100,
            cibil: 100,
            work_experience: 100,
            admission: 100,
        };
        assert_eq!(overall_score(&perfect), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_strong_profile_is_eligible() {
        let report = failing_engine()
            .analyze(&strong_profile(30_000.0), &[policy("nbfc-a")])
            .await
            .unwrap();

        let scores = report.analyses.scores();
        assert!(scores.academic >= 80 && scores.kyc >= 80 && scores.financial >= 80);
        assert!(scores.work_experience >= 80 && scores.admission >= 80);
        assert_eq!(report.analyses.cibil.details.average_cibil_score, 780);
        assert!((report.analyses.financial.details.foir - 30.0).abs() < 1e-9);
        assert!(report.overall_score >= 70);
        assert_eq!(report.matches[0].eligibility_status, EligibilityStatus::Eligible);
        assert!(report.matches[0].estimated_loan_amount.max > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_foir_over_policy_cap_is_not_eligible() {
        let report = failing_engine()
            .analyze(&strong_profile(72_000.0), &[policy("nbfc-a")])
            .await
            .unwrap();

        assert!(report.overall_score >= 70);
        assert_eq!(report.matches[0].eligibility_status, EligibilityStatus::NotEligible);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_co_borrower_zeroes_financial() {
        let mut profile = strong_profile(0.0);
        profile.co_borrowers.clear();
        let report = failing_engine()
            .analyze(&profile, &[policy("nbfc-a")])
            .await
            .unwrap();

        let financial = &report.analyses.financial;
        assert_eq!(financial.score, 0);
        assert!(financial.issues.iter().any(|i| i == NO_CO_BORROWER_ISSUE));
        assert!(!financial.details.has_co_borrower);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_work_experience_scores_fifty() {
        let mut profile = strong_profile(0.0);
        profile.work_experience.clear();
        let report = failing_engine()
            .analyze(&profile, &[policy("nbfc-a")])
            .await
            .unwrap();

        assert_eq!(report.analyses.work_experience.score, 50);
        assert!(!report.analyses.work_experience.details.has_experience);
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_match_per_policy_in_order() {
        let policies: Vec<LenderPolicy> = (0..7).map(|i| policy(&format!("nbfc-{i}"))).collect();
        let report = failing_engine()
            .analyze(&strong_profile(10_000.0), &policies)
            .await
            .unwrap();

        assert_eq!(report.matches.len(), policies.len());
        let ids: Vec<&str> = report.matches.iter().map(|m| m.lender_id.as_str()).collect();
        let unique: HashSet<&str> = ids.iter().copied().collect();
        assert_eq!(unique.len(), policies.len());
        assert_eq!(ids, policies.iter().map(|p| p.id.as_str()).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_llm_finishes_within_budget() {
        let retry = RetryPolicy::default();
        let engine = EligibilityEngine::new(Arc::new(HangingCompletion), retry.clone());
        let started = tokio::time::Instant::now();

        let report = engine
            .analyze(&strong_profile(20_000.0), &[policy("nbfc-a"), policy("nbfc-b")])
            .await
            .unwrap();

        // analyzers run in parallel, then the matcher: two worst-case completions
        let worst_case = |timeout: Duration| {
            timeout * (retry.max_retries + 1) + retry.total_backoff(false)
        };
        let budget = worst_case(financial::FINANCIAL_TIMEOUT)
            + worst_case(nbfc_matcher::NBFC_TIMEOUT)
            + Duration::from_secs(1);
        assert!(started.elapsed() <= budget, "took {:?}", started.elapsed());

        assert_eq!(report.analyses.academic.source, ScoreSource::RuleBased);
        assert_eq!(report.analyses.financial.source, ScoreSource::RuleBased);
        assert_eq!(report.matches.len(), 2);
        assert!(report
            .matches
            .iter()
            .all(|m| m.decided_by == DecisionSource::RuleBased));
    }

    #[tokio::test]
    async fn test_panicking_analyzers_become_failed_results() {
        let engine = EligibilityEngine::new(
            Arc::new(PanickingCompletion),
            RetryPolicy::new(0, Duration::from_millis(10)),
        );
        let report = engine
            .analyze(&strong_profile(20_000.0), &[policy("nbfc-a")])
            .await
            .unwrap();

        for (source, error) in [
            (report.analyses.academic.source, &report.analyses.academic.error),
            (report.analyses.kyc.source, &report.analyses.kyc.error),
            (report.analyses.financial.source, &report.analyses.financial.error),
            (report.analyses.admission.source, &report.analyses.admission.error),
        ] {
            assert_eq!(source, ScoreSource::Failed);
            assert!(error.is_some());
        }
        assert_eq!(report.analyses.academic.score, 0);
        // rule-based analyzers never touch the LLM
        assert_eq!(report.analyses.cibil.source, ScoreSource::RuleBased);
        assert_eq!(report.analyses.work_experience.source, ScoreSource::RuleBased);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].decided_by, DecisionSource::RuleBased);
    }

    #[test]
    fn test_validation_rejects_structural_problems() {
        let profile = strong_profile(0.0);
        assert!(validate(&profile, &[policy("a")]).is_ok());
        assert!(matches!(validate(&profile, &[]), Err(AppError::Validation(_))));

        let blank = StudentProfile {
            student_id: "  ".to_string(),
            ..Default::default()
        };
        assert!(matches!(validate(&blank, &[policy("a")]), Err(AppError::Validation(_))));

        let duplicate = [policy("a"), policy(" a ")];
        assert!(matches!(validate(&profile, &duplicate), Err(AppError::Validation(_))));

        let mut empty_id = policy("a");
        empty_id.id = String::new();
        assert!(matches!(validate(&profile, &[empty_id]), Err(AppError::Validation(_))));

        let mut negative = policy("a");
        negative.min_monthly_income = -1.0;
        assert!(matches!(validate(&profile, &[negative]), Err(AppError::Validation(_))));

        let mut inverted = policy("a");
        inverted.roi_range = RoiRange {
            min: 14.0,
            max: 9.0,
        };
        assert!(matches!(validate(&profile, &[inverted]), Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_invalid_input_is_rejected_before_any_llm_call() {
        let failing = Arc::new(FailingCompletion::default());
        let engine = EligibilityEngine::new(failing.clone(), RetryPolicy::default());
        let result = engine.analyze(&strong_profile(0.0), &[]).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
        assert_eq!(failing.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }
}
