//! Financial analyzer — co-borrower income, existing EMIs and FOIR.
//!
//! Totals and FOIR are computed here from the co-borrower records, never taken
//! from the LLM, and are attached to the result whatever the LLM returns.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{assess_with_llm, AnalyzerContext};
use crate::eligibility::models::{AnalysisResult, Assessment, CoBorrower, StudentProfile};
use crate::eligibility::prompts::FINANCIAL_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::{ASSESSMENT_SCHEMA, GROUNDING_INSTRUCTION};

pub const FINANCIAL_TIMEOUT: Duration = Duration::from_secs(30);

pub const NO_CO_BORROWER_ISSUE: &str = "No co-borrower added";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialDetails {
    pub has_co_borrower: bool,
    pub co_borrower_count: usize,
    pub total_monthly_income: f64,
    pub total_emi: f64,
    /// Fixed obligations to income ratio, percent.
    pub foir: f64,
    pub co_borrowers_missing_financials: Vec<String>,
}

pub async fn analyze(
    profile: &StudentProfile,
    ctx: &AnalyzerContext,
) -> Result<AnalysisResult<FinancialDetails>, AppError> {
    if profile.co_borrowers.is_empty() {
        return Ok(AnalysisResult::no_data(
            NO_CO_BORROWER_ISSUE,
            "Add a co-borrower with salary slips or ITRs",
        ));
    }

    let details = compute_totals(&profile.co_borrowers);
    let fallback = rule_based_assessment(&details);
    let prompt = build_prompt(&details, &profile.co_borrowers)?;

    let (assessment, source) =
        assess_with_llm(ctx, "financial", &prompt, FINANCIAL_TIMEOUT, fallback).await;
    Ok(AnalysisResult::from_assessment(assessment, source, details))
}

pub fn compute_totals(co_borrowers: &[CoBorrower]) -> FinancialDetails {
    let mut details = FinancialDetails {
        has_co_borrower: !co_borrowers.is_empty(),
        co_borrower_count: co_borrowers.len(),
        ..Default::default()
    };

    for co_borrower in co_borrowers {
        match &co_borrower.financial {
            Some(fin) => {
                details.total_monthly_income += fin.avg_monthly_income.max(0.0);
                details.total_emi += fin.total_existing_emi.max(0.0);
            }
            None => details
                .co_borrowers_missing_financials
                .push(co_borrower.name.clone()),
        }
    }

    details.foir = foir(details.total_emi, details.total_monthly_income);
    details
}

/// `emi / income * 100`; 0 when there is neither, 100 when there is EMI but no income.
pub fn foir(total_emi: f64, total_income: f64) -> f64 {
    if total_income > 0.0 {
        total_emi / total_income * 100.0
    } else if total_emi > 0.0 {
        100.0
    } else {
        0.0
    }
}

fn income_points(income: f64) -> u8 {
    match income {
        i if i >= 100_000.0 => 50,
        i if i >= 50_000.0 => 40,
        i if i >= 25_000.0 => 30,
        i if i >= 15_000.0 => 20,
        i if i > 0.0 => 10,
        _ => 0,
    }
}

fn foir_points(foir: f64) -> u8 {
    match foir {
        f if f <= 30.0 => 50,
        f if f <= 40.0 => 40,
        f if f <= 50.0 => 30,
        f if f <= 60.0 => 20,
        _ => 5,
    }
}

/// Income tier points plus FOIR tier points; FOIR earns nothing without income.
pub fn fallback_score(details: &FinancialDetails) -> u8 {
    if details.total_monthly_income <= 0.0 {
        return 0;
    }
    (income_points(details.total_monthly_income) + foir_points(details.foir)).min(100)
}

pub fn rule_based_assessment(details: &FinancialDetails) -> Assessment {
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if details.total_monthly_income >= 50_000.0 {
        strengths.push(format!(
            "Household monthly income of ₹{:.0}",
            details.total_monthly_income
        ));
    } else if details.total_monthly_income > 0.0 {
        issues.push(format!(
            "Household monthly income of ₹{:.0} is modest",
            details.total_monthly_income
        ));
        recommendations.push("Add an additional earning co-borrower".to_string());
    } else {
        issues.push("No verified co-borrower income".to_string());
        recommendations.push("Upload co-borrower salary slips or ITRs".to_string());
    }

    if details.total_monthly_income > 0.0 {
        if details.foir <= 40.0 {
            strengths.push(format!("Healthy FOIR of {:.1}%", details.foir));
        } else if details.foir > 60.0 {
            issues.push(format!("FOIR of {:.1}% exceeds 60%", details.foir));
            recommendations.push("Close or consolidate existing loans to reduce EMIs".to_string());
        } else {
            issues.push(format!("FOIR of {:.1}% is elevated", details.foir));
        }
    }

    for name in &details.co_borrowers_missing_financials {
        issues.push(format!("Financial documents missing for co-borrower {name}"));
    }

    Assessment {
        score: fallback_score(details),
        strengths,
        issues,
        recommendations,
    }
}

fn build_prompt(details: &FinancialDetails, co_borrowers: &[CoBorrower]) -> Result<String, AppError> {
    let co_borrowers_json = serde_json::to_string_pretty(
        &co_borrowers
            .iter()
            .map(|cb| {
                serde_json::json!({
                    "relation": cb.relation,
                    "avg_monthly_income": cb.financial.as_ref().map(|f| f.avg_monthly_income),
                    "total_existing_emi": cb.financial.as_ref().map(|f| f.total_existing_emi),
                    "foir": cb.financial.as_ref().and_then(|f| f.foir),
                    "cibil_estimate": cb.cibil_estimate,
                })
            })
            .collect::<Vec<_>>(),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize co-borrowers: {e}")))?;

    let summary = format!(
        "- Co-borrowers: {}\n- Total monthly income: {:.0}\n- Total existing EMI: {:.0}\n- FOIR: {:.1}%",
        details.co_borrower_count, details.total_monthly_income, details.total_emi, details.foir
    );

    Ok(FINANCIAL_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{summary}", &summary)
        .replace("{co_borrowers_json}", &co_borrowers_json)
        .replace("{schema}", ASSESSMENT_SCHEMA))
}
