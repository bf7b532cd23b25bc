//! NBFC Matcher — one eligibility decision per lender policy.
//!
//! Hybrid procedure:
//! 1. Ask the LLM about at most the first `MAX_POLICIES_IN_PROMPT` policies.
//! 2. Keep LLM records only for prompted policy ids (exact match, never by name).
//! 3. Decide every policy with the rule-based procedure.
//! 4. Where the LLM covered a policy, use its explanations but cap its status at
//!    the rule-based status: the LLM may be stricter than the rules, never laxer.
//!
//! The output always has exactly one `MatchResult` per input policy, in input order.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::eligibility::analyzers::AnalyzerContext;
use crate::eligibility::models::{
    AmountRange, Analyses, ApprovalProbability, CategoryScores, DecisionSource,
    EligibilityStatus, LenderPolicy, MatchResult,
};
use crate::eligibility::prompts::NBFC_MATCH_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::json::parse_json_or;
use crate::llm_client::prompts::GROUNDING_INSTRUCTION;
use crate::llm_client::complete;

pub const NBFC_TIMEOUT: Duration = Duration::from_secs(30);
/// Bounds prompt size; remaining policies are decided by rules alone.
pub const MAX_POLICIES_IN_PROMPT: usize = 5;

const ELIGIBLE_MIN_OVERALL: u8 = 70;
const BORDERLINE_MIN_OVERALL: u8 = 50;
const BORDERLINE_INCOME_SHARE: f64 = 0.8;
const BORDERLINE_CIBIL_MARGIN: u16 = 50;
/// Tenure used to turn EMI headroom into a principal estimate.
const LOAN_TENURE_MONTHS: i32 = 120;

/// The applicant figures every decision is computed from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ApplicantMetrics {
    pub overall_score: u8,
    pub total_monthly_income: f64,
    pub total_emi: f64,
    /// 0 when unknown.
    pub average_cibil: u16,
    pub foir: f64,
}

impl ApplicantMetrics {
    pub fn from_analyses(overall_score: u8, analyses: &Analyses) -> Self {
        Self {
            overall_score,
            total_monthly_income: analyses.financial.details.total_monthly_income,
            total_emi: analyses.financial.details.total_emi,
            average_cibil: analyses.cibil.details.average_cibil_score,
            foir: analyses.financial.details.foir,
        }
    }
}

/// One element of the array requested from the LLM.
#[derive(Debug, Deserialize)]
struct LlmMatch {
    lender_id: String,
    eligibility_status: String,
    match_percentage: Option<f64>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    gaps: Vec<String>,
    #[serde(default)]
    specific_recommendations: Vec<String>,
}

pub async fn match_lenders(
    ctx: &AnalyzerContext,
    metrics: &ApplicantMetrics,
    scores: &CategoryScores,
    policies: &[LenderPolicy],
) -> Result<Vec<MatchResult>, AppError> {
    let prompted = &policies[..policies.len().min(MAX_POLICIES_IN_PROMPT)];
    let prompt = build_prompt(metrics, scores, prompted)?;
    let mut llm_matches = request_llm_matches(ctx, &prompt, prompted).await;

    info!(
        "NBFC matching: {} policies, {} covered by LLM",
        policies.len(),
        llm_matches.len()
    );

    Ok(policies
        .iter()
        .map(|policy| {
            let rule = rule_based_match(metrics, policy);
            match llm_matches.remove(policy.id.trim()) {
                Some(llm) => merge(rule, llm, metrics, policy),
                None => rule,
            }
        })
        .collect())
}

async fn request_llm_matches<'p>(
    ctx: &AnalyzerContext,
    prompt: &str,
    prompted: &'p [LenderPolicy],
) -> HashMap<&'p str, LlmMatch> {
    let text = match complete(&ctx.llm, prompt, NBFC_TIMEOUT, &ctx.retry).await {
        Ok(text) => text,
        Err(e) => {
            warn!("NBFC matching: LLM unavailable ({e}), using rule-based decisions");
            return HashMap::new();
        }
    };

    // ids are compared trimmed on both sides
    let known: HashSet<&str> = prompted.iter().map(|p| p.id.trim()).collect();
    let mut matches = HashMap::new();

    for raw in parse_json_or::<Vec<Value>>(&text, Vec::new()) {
        let Ok(record) = serde_json::from_value::<LlmMatch>(raw) else {
            continue;
        };
        if parse_status(&record.eligibility_status).is_none() {
            continue;
        }
        let Some(id) = known.get(record.lender_id.trim()).copied() else {
            warn!("NBFC matching: ignoring LLM record for unknown lender '{}'", record.lender_id);
            continue;
        };
        matches.entry(id).or_insert(record);
    }

    matches
}

fn parse_status(raw: &str) -> Option<EligibilityStatus> {
    let normalized = raw.trim().to_lowercase().replace([' ', '-'], "_");
    match normalized.as_str() {
        "eligible" => Some(EligibilityStatus::Eligible),
        "borderline" => Some(EligibilityStatus::Borderline),
        "not_eligible" | "ineligible" => Some(EligibilityStatus::NotEligible),
        _ => None,
    }
}

/// The three-tier rule-based decision.
pub fn decide_status(metrics: &ApplicantMetrics, policy: &LenderPolicy) -> EligibilityStatus {
    let income = metrics.total_monthly_income;
    let cibil = metrics.average_cibil;

    let income_ok = income >= policy.min_monthly_income;
    let cibil_ok = cibil >= policy.min_cibil_score || cibil == 0;
    let foir_ok = metrics.foir <= policy.max_foir_percent;

    if income_ok && cibil_ok && foir_ok && metrics.overall_score >= ELIGIBLE_MIN_OVERALL {
        return EligibilityStatus::Eligible;
    }

    let income_near = income_ok || income >= BORDERLINE_INCOME_SHARE * policy.min_monthly_income;
    let cibil_near =
        cibil_ok || cibil >= policy.min_cibil_score.saturating_sub(BORDERLINE_CIBIL_MARGIN);
    // FOIR above the cap is disqualifying at every tier
    if income_near && cibil_near && foir_ok && metrics.overall_score >= BORDERLINE_MIN_OVERALL {
        EligibilityStatus::Borderline
    } else {
        EligibilityStatus::NotEligible
    }
}

pub fn rule_based_match(metrics: &ApplicantMetrics, policy: &LenderPolicy) -> MatchResult {
    let status = decide_status(metrics, policy);
    let mut strengths = Vec::new();
    let mut gaps = Vec::new();
    let mut recommendations = Vec::new();

    let income = metrics.total_monthly_income;
    if income >= policy.min_monthly_income {
        strengths.push(format!(
            "Monthly income ₹{income:.0} meets the ₹{:.0} minimum",
            policy.min_monthly_income
        ));
    } else {
        gaps.push(format!(
            "Monthly income ₹{income:.0} is below the ₹{:.0} minimum",
            policy.min_monthly_income
        ));
        recommendations.push("Add an earning co-borrower to raise household income".to_string());
    }

    let cibil = metrics.average_cibil;
    if cibil == 0 {
        gaps.push("CIBIL score unknown".to_string());
        recommendations.push("Provide CIBIL reports for all co-borrowers".to_string());
    } else if cibil >= policy.min_cibil_score {
        strengths.push(format!(
            "CIBIL {cibil} meets the {} minimum",
            policy.min_cibil_score
        ));
    } else {
        gaps.push(format!(
            "CIBIL {cibil} is below the {} minimum",
            policy.min_cibil_score
        ));
        recommendations.push("Improve the credit score or add a co-borrower with a higher score".to_string());
    }

    if metrics.foir <= policy.max_foir_percent {
        strengths.push(format!(
            "FOIR {:.1}% within the {:.0}% limit",
            metrics.foir, policy.max_foir_percent
        ));
    } else {
        gaps.push(format!(
            "FOIR {:.1}% exceeds the {:.0}% limit",
            metrics.foir, policy.max_foir_percent
        ));
        recommendations.push("Prepay or close existing loans to bring FOIR down".to_string());
    }

    if metrics.overall_score < ELIGIBLE_MIN_OVERALL {
        gaps.push(format!(
            "Overall profile score {} is below {ELIGIBLE_MIN_OVERALL}",
            metrics.overall_score
        ));
    }

    MatchResult {
        lender_id: policy.id.clone(),
        lender_name: policy.name.clone(),
        eligibility_status: status,
        match_percentage: match_percentage(metrics, policy),
        strengths,
        gaps,
        specific_recommendations: recommendations,
        estimated_loan_amount: loan_amount_for(status, metrics, policy),
        estimated_roi: policy.roi_range,
        approval_probability: ApprovalProbability::from(status),
        decided_by: DecisionSource::RuleBased,
    }
}

fn merge(
    rule: MatchResult,
    llm: LlmMatch,
    metrics: &ApplicantMetrics,
    policy: &LenderPolicy,
) -> MatchResult {
    let llm_status = parse_status(&llm.eligibility_status).unwrap_or(EligibilityStatus::NotEligible);
    let status = llm_status.min(rule.eligibility_status);

    let mut gaps = non_empty_or(llm.gaps, rule.gaps.clone());
    if status < llm_status {
        warn!(
            "NBFC matching: LLM rated {} as {:?}, capped to {:?} by policy thresholds",
            policy.id, llm_status, status
        );
        for gap in rule.gaps {
            if !gaps.contains(&gap) {
                gaps.push(gap);
            }
        }
    }

    MatchResult {
        lender_id: rule.lender_id,
        lender_name: rule.lender_name,
        eligibility_status: status,
        match_percentage: llm
            .match_percentage
            .filter(|pct| pct.is_finite())
            .map(|pct| pct.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(rule.match_percentage),
        strengths: non_empty_or(llm.strengths, rule.strengths),
        gaps,
        specific_recommendations: non_empty_or(
            llm.specific_recommendations,
            rule.specific_recommendations,
        ),
        estimated_loan_amount: loan_amount_for(status, metrics, policy),
        estimated_roi: policy.roi_range,
        approval_probability: ApprovalProbability::from(status),
        decided_by: DecisionSource::Llm,
    }
}

fn non_empty_or(primary: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    if primary.iter().any(|s| !s.trim().is_empty()) {
        primary
    } else {
        fallback
    }
}

/// `0.3·income + 0.3·cibil + 0.2·foir + 0.2·overall`, each component 0 – 100.
pub fn match_percentage(metrics: &ApplicantMetrics, policy: &LenderPolicy) -> u8 {
    let income_c = if policy.min_monthly_income <= 0.0 {
        100.0
    } else {
        (metrics.total_monthly_income / policy.min_monthly_income).min(1.0) * 100.0
    };
    let cibil_c = match (metrics.average_cibil, policy.min_cibil_score) {
        (0, _) => 50.0,
        (_, 0) => 100.0,
        (avg, min) => (avg as f64 / min as f64).min(1.0) * 100.0,
    };
    let foir_c = if metrics.foir <= policy.max_foir_percent {
        100.0
    } else {
        (policy.max_foir_percent.max(0.0) / metrics.foir) * 100.0
    };
    let pct = 0.3 * income_c + 0.3 * cibil_c + 0.2 * foir_c + 0.2 * metrics.overall_score as f64;
    pct.round().clamp(0.0, 100.0) as u8
}

fn loan_amount_for(
    status: EligibilityStatus,
    metrics: &ApplicantMetrics,
    policy: &LenderPolicy,
) -> AmountRange {
    if status == EligibilityStatus::Eligible {
        estimate_loan_amount(metrics, policy)
    } else {
        AmountRange::default()
    }
}

/// Principal serviceable with the EMI headroom left under the policy's FOIR cap.
/// The highest ROI gives the lower bound, the lowest ROI the upper bound.
pub fn estimate_loan_amount(metrics: &ApplicantMetrics, policy: &LenderPolicy) -> AmountRange {
    let headroom =
        metrics.total_monthly_income * policy.max_foir_percent / 100.0 - metrics.total_emi;
    if !headroom.is_finite() || headroom <= 0.0 {
        return AmountRange::default();
    }

    let cap = |amount: f64| match policy.max_loan_amount {
        Some(max) if max > 0.0 => amount.min(max),
        _ => amount,
    };
    let min = cap(principal_for_emi(headroom, policy.roi_range.max)).round();
    let max = cap(principal_for_emi(headroom, policy.roi_range.min)).round();
    AmountRange {
        min: min.min(max),
        max: min.max(max),
    }
}

fn principal_for_emi(emi: f64, annual_rate_percent: f64) -> f64 {
    let r = annual_rate_percent / 12.0 / 100.0;
    if r <= 0.0 {
        return emi * LOAN_TENURE_MONTHS as f64;
    }
    emi * (1.0 - (1.0 + r).powi(-LOAN_TENURE_MONTHS)) / r
}

fn build_prompt(
    metrics: &ApplicantMetrics,
    scores: &CategoryScores,
    prompted: &[LenderPolicy],
) -> Result<String, AppError> {
    let policies_json = serde_json::to_string_pretty(prompted)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize policies: {e}")))?;

    let cibil = if metrics.average_cibil == 0 {
        "unknown".to_string()
    } else {
        metrics.average_cibil.to_string()
    };
    let applicant_summary = format!(
        "- Overall score: {}/100\n- Scores: academic {}, kyc {}, financial {}, cibil {}, work experience {}, admission {}\n- Household monthly income: {:.0}\n- Existing EMIs: {:.0}\n- FOIR: {:.1}%\n- Average CIBIL: {}",
        metrics.overall_score,
        scores.academic,
        scores.kyc,
        scores.financial,
        scores.cibil,
        scores.work_experience,
        scores.admission,
        metrics.total_monthly_income,
        metrics.total_emi,
        metrics.foir,
        cibil
    );

    Ok(NBFC_MATCH_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{applicant_summary}", &applicant_summary)
        .replace("{policies_json}", &policies_json))
}
