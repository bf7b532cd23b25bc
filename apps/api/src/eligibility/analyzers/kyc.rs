//! KYC analyzer — identity document completeness and verification state.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{assess_with_llm, clamp_score, AnalyzerContext};
use crate::eligibility::models::{
    AnalysisResult, Assessment, KycRecord, KycStatus, StudentProfile,
    REQUIRED_KYC_DOCUMENTS,
};
use crate::eligibility::prompts::KYC_PROMPT_TEMPLATE;
use crate::errors::AppError;
use crate::llm_client::prompts::{ASSESSMENT_SCHEMA, GROUNDING_INSTRUCTION};

pub const KYC_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KycDetails {
    pub kyc_status: KycStatus,
    pub verified_documents: Vec<String>,
    pub missing_documents: Vec<String>,
    pub unverified_documents: Vec<String>,
}

pub async fn analyze(
    profile: &StudentProfile,
    ctx: &AnalyzerContext,
) -> Result<AnalysisResult<KycDetails>, AppError> {
    let Some(record) = profile.kyc.as_ref() else {
        return Ok(AnalysisResult::no_data(
            "KYC not completed",
            "Complete KYC with Aadhaar, PAN and Passport",
        ));
    };

    let details = summarize(record);
    let fallback = rule_based_assessment(&details);
    let prompt = KYC_PROMPT_TEMPLATE
        .replace("{grounding_instruction}", GROUNDING_INSTRUCTION)
        .replace("{summary}", &prompt_summary(&details))
        .replace("{schema}", ASSESSMENT_SCHEMA);

    let (assessment, source) = assess_with_llm(ctx, "kyc", &prompt, KYC_TIMEOUT, fallback).await;
    Ok(AnalysisResult::from_assessment(assessment, source, details))
}

pub fn summarize(record: &KycRecord) -> KycDetails {
    let mut details = KycDetails {
        kyc_status: record.status,
        ..Default::default()
    };

    for kind in REQUIRED_KYC_DOCUMENTS {
        let docs: Vec<_> = record.documents.iter().filter(|d| d.kind == kind).collect();
        let label = kind.label().to_string();
        if docs.is_empty() {
            details.missing_documents.push(label);
        } else if docs.iter().any(|d| d.verified) {
            details.verified_documents.push(label);
        } else {
            details.unverified_documents.push(label);
        }
    }

    details
}

/// `round(70 * verified_required / 3)` plus a status bonus (verified 30, pending 10).
pub fn fallback_score(details: &KycDetails) -> u8 {
    let doc_share = details.verified_documents.len() as f64 / REQUIRED_KYC_DOCUMENTS.len() as f64;
    let status_bonus = match details.kyc_status {
        KycStatus::Verified => 30.0,
        KycStatus::Pending => 10.0,
        KycStatus::NotStarted | KycStatus::Rejected => 0.0,
    };
    clamp_score(70.0 * doc_share + status_bonus)
}

pub fn rule_based_assessment(details: &KycDetails) -> Assessment {
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    match details.kyc_status {
        KycStatus::Verified => strengths.push("KYC verified".to_string()),
        KycStatus::Pending => issues.push("KYC verification pending".to_string()),
        KycStatus::NotStarted => {
            issues.push("KYC not started".to_string());
            recommendations.push("Start KYC verification".to_string());
        }
        KycStatus::Rejected => {
            issues.push("KYC was rejected".to_string());
            recommendations.push("Resubmit KYC with corrected documents".to_string());
        }
    }

    if details.missing_documents.is_empty() && details.unverified_documents.is_empty() {
        strengths.push("All required identity documents verified".to_string());
    }
    for doc in &details.missing_documents {
        issues.push(format!("{doc} not uploaded"));
        recommendations.push(format!("Upload {doc}"));
    }
    for doc in &details.unverified_documents {
        issues.push(format!("{doc} uploaded but not verified"));
    }

    Assessment {
        score: fallback_score(details),
        strengths,
        issues,
        recommendations,
    }
}

fn prompt_summary(details: &KycDetails) -> String {
    let list = |docs: &[String]| {
        if docs.is_empty() {
            "none".to_string()
        } else {
            docs.join(", ")
        }
    };
    format!(
        "- Status: {:?}\n- Verified: {}\n- Uploaded, unverified: {}\n- Missing: {}",
        details.kyc_status,
        list(&details.verified_documents),
        list(&details.unverified_documents),
        list(&details.missing_documents)
    )
}
