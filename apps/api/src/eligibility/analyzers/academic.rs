//! Academic analyzer — class 10 / class 12 / graduation performance.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{assess_with_llm, clamp_score, AnalyzerContext};
use crate::eligibility::models::{
    AcademicRecord, AcademicRecords, AnalysisResult, Assessment, StudentProfile,
};
use crate::eligibility::prompts::ACADEMIC_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::{ASSESSMENT_SCHEMA, GROUNDING_INSTRUCTION};

pub const ACADEMIC_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcademicDetails {
    pub has_academic_records: bool,
    pub class_10_percentage: Option<f64>,
    pub class_12_percentage: Option<f64>,
    pub graduation_percentage: Option<f64>,
    pub average_percentage: Option<f64>,
    pub backlogs: u32,
    pub gap_years: u8,
}

pub async fn analyze(
    profile: &StudentProfile,
    ctx: &AnalyzerContext,
) -> Result<AnalysisResult<AcademicDetails>, AppError> {
    let Some(records) = profile.academics.as_ref().filter(|r| !r.is_empty()) else {
        return Ok(AnalysisResult::no_data(
            "No academic records uploaded",
            "Upload class 10, class 12 and graduation mark sheets",
        ));
    };

    let details = summarize(records);
    let fallback = rule_based_assessment(&details);
    let prompt = ACADEMIC_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{summary}", &prompt_summary(&details))
        .replace("{schema}", ASSESSMENT_SCHEMA);

    let (assessment, source) =
        assess_with_llm(ctx, "academic", &prompt, ACADEMIC_TIMEOUT, fallback).await;
    Ok(AnalysisResult::from_assessment(assessment, source, details))
}

pub fn summarize(records: &AcademicRecords) -> AcademicDetails {
    let pct = |r: &Option<AcademicRecord>| r.as_ref().and_then(AcademicRecord::effective_percentage);
    let class_10 = pct(&records.class_10);
    let class_12 = pct(&records.class_12);
    let graduation = pct(&records.graduation);

    let known: Vec<f64> = [class_10, class_12, graduation].into_iter().flatten().collect();
    let average = (!known.is_empty()).then(|| known.iter().sum::<f64>() / known.len() as f64);

    AcademicDetails {
        has_academic_records: !known.is_empty(),
        class_10_percentage: class_10,
        class_12_percentage: class_12,
        graduation_percentage: graduation,
        average_percentage: average,
        backlogs: records.backlogs,
        gap_years: records.gap_years.unwrap_or(0),
    }
}

/// `round((class10 + class12) / 2)`; with only one school record, that record;
/// with neither, the graduation percentage.
pub fn fallback_score(details: &AcademicDetails) -> u8 {
    match (details.class_10_percentage, details.class_12_percentage) {
        (Some(c10), Some(c12)) => clamp_score((c10 + c12) / 2.0),
        (Some(only), None) | (None, Some(only)) => clamp_score(only),
        (None, None) => details.graduation_percentage.map(clamp_score).unwrap_or(0),
    }
}

pub fn rule_based_assessment(details: &AcademicDetails) -> Assessment {
    let score = fallback_score(details);
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if score >= 75 {
        strengths.push(format!("Strong school record ({score}% average)"));
    } else if score >= 60 {
        strengths.push(format!("Consistent school record ({score}% average)"));
    } else {
        issues.push(format!(
            "School average of {score}% is below the 60% most lenders prefer"
        ));
        recommendations
            .push("Highlight entrance test scores (GRE/GMAT/IELTS) to offset marks".to_string());
    }

    match details.graduation_percentage {
        Some(grad) if grad >= 70.0 => {
            strengths.push(format!("Graduation score of {grad:.1}%"));
        }
        Some(grad) if grad < 55.0 => {
            issues.push(format!("Graduation score of {grad:.1}% is weak"));
        }
        _ => {}
    }

    if details.class_12_percentage.is_none() {
        issues.push("Class 12 marks not provided".to_string());
        recommendations.push("Upload the class 12 mark sheet".to_string());
    }

    if details.backlogs > 0 {
        issues.push(format!("{} backlog(s) on record", details.backlogs));
        recommendations.push("Attach backlog clearance certificates".to_string());
    }

    if details.gap_years > 2 {
        issues.push(format!("Education gap of {} years", details.gap_years));
        recommendations.push("Provide a gap-year justification letter".to_string());
    }

    Assessment {
        score,
        strengths,
        issues,
        recommendations,
    }
}

fn prompt_summary(details: &AcademicDetails) -> String {
    let fmt = |value: Option<f64>| {
        value
            .map(|v| format!("{v:.1}%"))
            .unwrap_or_else(|| "not provided".to_string())
    };
    format!(
        "- Class 10: {}\n- Class 12: {}\n- Graduation: {}\n- Backlogs: {}\n- Gap years: {}",
        fmt(details.class_10_percentage),
        fmt(details.class_12_percentage),
        fmt(details.graduation_percentage),
        details.backlogs,
        details.gap_years
    )
}
