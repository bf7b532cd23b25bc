//! Admission letter analyzer.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{assess_with_llm, AnalyzerContext};
use crate::eligibility::models::{AdmissionLetter, AnalysisResult, Assessment, StudentProfile};
use crate::eligibility::prompts::ADMISSION_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::{ASSESSMENT_SCHEMA, GROUNDING_INSTRUCTION};

pub const ADMISSION_TIMEOUT: Duration = Duration::from_secs(25);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AdmissionDetails {
    pub has_admission_letter: bool,
    pub university: Option<String>,
    pub country: Option<String>,
    pub course: Option<String>,
    pub is_conditional: bool,
    pub university_ranking: Option<u32>,
    pub tuition_fee: Option<f64>,
    pub scholarship_amount: Option<f64>,
}

pub async fn analyze(
    profile: &StudentProfile,
    ctx: &AnalyzerContext,
) -> Result<AnalysisResult<AdmissionDetails>, AppError> {
    let Some(letter) = profile.admission_letter.as_ref() else {
        return Ok(AnalysisResult::no_data(
            "No admission letter uploaded",
            "Upload the university admission letter",
        ));
    };

    let details = summarize(letter);
    let fallback = rule_based_assessment(&details);
    let prompt = ADMISSION_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{summary}", &prompt_summary(&details))
        .replace("{schema}", ASSESSMENT_SCHEMA);

    let (assessment, source) =
        assess_with_llm(ctx, "admission", &prompt, ADMISSION_TIMEOUT, fallback).await;
    Ok(AnalysisResult::from_assessment(assessment, source, details))
}

pub fn summarize(letter: &AdmissionLetter) -> AdmissionDetails {
    AdmissionDetails {
        has_admission_letter: true,
        university: Some(letter.university.clone()),
        country: Some(letter.country.clone()),
        course: Some(letter.course.clone()),
        is_conditional: letter.is_conditional,
        university_ranking: letter.university_ranking,
        tuition_fee: letter.tuition_fee,
        scholarship_amount: letter.scholarship_amount,
    }
}

/// 50 base, +20 unconditional, +15 ranked ≤ 500 (+5 more ≤ 100), +10 scholarship.
pub fn fallback_score(details: &AdmissionDetails) -> u8 {
    let mut score: u8 = 50;
    if !details.is_conditional {
        score += 20;
    }
    match details.university_ranking {
        Some(rank) if rank > 0 && rank <= 100 => score += 20,
        Some(rank) if rank > 0 && rank <= 500 => score += 15,
        _ => {}
    }
    if details.scholarship_amount.is_some_and(|amount| amount > 0.0) {
        score += 10;
    }
    score.min(100)
}

pub fn rule_based_assessment(details: &AdmissionDetails) -> Assessment {
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if details.is_conditional {
        issues.push("Admission is conditional".to_string());
        recommendations
            .push("Submit proof that the offer conditions are met to obtain an unconditional letter".to_string());
    } else {
        strengths.push("Unconditional admission offer".to_string());
    }

    match details.university_ranking {
        Some(rank) if rank > 0 && rank <= 500 => {
            strengths.push(format!("University ranked #{rank} globally"));
        }
        Some(_) => issues.push("University ranked outside the global top 500".to_string()),
        None => issues.push("University ranking not available".to_string()),
    }

    if details.scholarship_amount.is_some_and(|amount| amount > 0.0) {
        strengths.push("Scholarship awarded".to_string());
    }

    if details.tuition_fee.is_none() {
        issues.push("Tuition fee not stated on the admission letter".to_string());
        recommendations.push("Attach the university's fee structure".to_string());
    }

    Assessment {
        score: fallback_score(details),
        strengths,
        issues,
        recommendations,
    }
}

fn prompt_summary(details: &AdmissionDetails) -> String {
    let or_unknown = |value: &Option<String>| value.clone().unwrap_or_else(|| "unknown".to_string());
    format!(
        "- University: {}\n- Country: {}\n- Course: {}\n- Conditional offer: {}\n- Global ranking: {}\n- Tuition fee: {}\n- Scholarship: {}",
        or_unknown(&details.university),
        or_unknown(&details.country),
        or_unknown(&details.course),
        details.is_conditional,
        details
            .university_ranking
            .map(|r| r.to_string())
            .unwrap_or_else(|| "unknown".to_string()),
        details
            .tuition_fee
            .map(|f| format!("{f:.0}"))
            .unwrap_or_else(|| "not stated".to_string()),
        details
            .scholarship_amount
            .map(|s| format!("{s:.0}"))
            .unwrap_or_else(|| "none".to_string()),
    )
}
