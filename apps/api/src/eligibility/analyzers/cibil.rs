//! CIBIL analyzer — tier lookup on the co-borrowers' average credit score.
//!
//! Rule-based only; a tier lookup gains nothing from an LLM call.

use serde::{Deserialize, Serialize};

use crate::eligibility::models::{AnalysisResult, Assessment, ScoreSource, StudentProfile};
use crate::errors::AppError;

/// Individual scores below this are flagged even when the average is fine.
const LOW_INDIVIDUAL_SCORE: u16 = 600;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CibilTier {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
    Critical,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CibilDetails {
    pub has_cibil_data: bool,
    /// Rounded mean of the contributing scores; 0 when unknown.
    pub average_cibil_score: u16,
    pub lowest_score: u16,
    pub highest_score: u16,
    pub contributing_co_borrowers: usize,
    pub tier: CibilTier,
}

pub async fn analyze(profile: &StudentProfile) -> Result<AnalysisResult<CibilDetails>, AppError> {
    let scores: Vec<(&str, u16)> = profile
        .co_borrowers
        .iter()
        .filter_map(|cb| cb.cibil_estimate.map(|s| (cb.name.as_str(), s)))
        .filter(|(_, s)| *s > 0)
        .collect();

    if scores.is_empty() {
        return Ok(AnalysisResult::no_data(
            "No CIBIL data available",
            "Obtain a CIBIL report for each co-borrower",
        ));
    }

    let details = summarize(&scores);
    Ok(AnalysisResult::from_assessment(
        rule_based_assessment(&details, &scores),
        ScoreSource::RuleBased,
        details,
    ))
}

fn summarize(scores: &[(&str, u16)]) -> CibilDetails {
    let total: u32 = scores.iter().map(|(_, s)| *s as u32).sum();
    let average = (total as f64 / scores.len() as f64).round() as u16;
    CibilDetails {
        has_cibil_data: true,
        average_cibil_score: average,
        lowest_score: scores.iter().map(|(_, s)| *s).min().unwrap_or(0),
        highest_score: scores.iter().map(|(_, s)| *s).max().unwrap_or(0),
        contributing_co_borrowers: scores.len(),
        tier: tier_for(average),
    }
}

pub fn tier_for(score: u16) -> CibilTier {
    match score {
        0 => CibilTier::Unknown,
        s if s >= 750 => CibilTier::Excellent,
        s if s >= 700 => CibilTier::Good,
        s if s >= 650 => CibilTier::Fair,
        s if s >= 600 => CibilTier::Poor,
        s if s >= 550 => CibilTier::VeryPoor,
        _ => CibilTier::Critical,
    }
}

/// ≥750→95, ≥700→80, ≥650→65, ≥600→45, ≥550→25, else 10.
pub fn tier_score(average: u16) -> u8 {
    match tier_for(average) {
        CibilTier::Excellent => 95,
        CibilTier::Good => 80,
        CibilTier::Fair => 65,
        CibilTier::Poor => 45,
        CibilTier::VeryPoor => 25,
        CibilTier::Critical => 10,
        CibilTier::Unknown => 0,
    }
}

fn rule_based_assessment(details: &CibilDetails, scores: &[(&str, u16)]) -> Assessment {
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();
    let avg = details.average_cibil_score;

    if avg >= 750 {
        strengths.push(format!("Excellent average CIBIL score of {avg}"));
    } else if avg >= 700 {
        strengths.push(format!("Good average CIBIL score of {avg}"));
    } else if avg >= 650 {
        issues.push(format!("Average CIBIL score of {avg} is only fair"));
        recommendations.push("Pay down credit card balances before applying".to_string());
    } else {
        issues.push(format!("Average CIBIL score of {avg} is below most lender minimums"));
        recommendations.push("Add a co-borrower with a stronger credit history".to_string());
    }

    if details.lowest_score < LOW_INDIVIDUAL_SCORE && details.contributing_co_borrowers > 1 {
        let names: Vec<&str> = scores
            .iter()
            .filter(|(_, s)| *s < LOW_INDIVIDUAL_SCORE)
            .map(|(name, _)| *name)
            .collect();
        issues.push(format!(
            "Co-borrower {} has a low individual CIBIL score ({})",
            names.join(", "),
            details.lowest_score
        ));
        recommendations.push("Review the low-scoring co-borrower's credit report for errors".to_string());
    }

    Assessment {
        score: tier_score(avg),
        strengths,
        issues,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eligibility::models::CoBorrower;

    fn profile(scores: &[Option<u16>]) -> StudentProfile {
        StudentProfile {
            student_id: "stu-1".to_string(),
            co_borrowers: scores
                .iter()
                .enumerate()
                .map(|(i, s)| CoBorrower {
                    name: format!("CB{i}"),
                    cibil_estimate: *s,
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(tier_score(750), 95);
        assert_eq!(tier_score(749), 80);
        assert_eq!(tier_score(700), 80);
        assert_eq!(tier_score(650), 65);
        assert_eq!(tier_score(600), 45);
        assert_eq!(tier_score(550), 25);
        assert_eq!(tier_score(549), 10);
    }

    #[tokio::test]
    async fn test_no_scores_returns_zero() {
        let result = analyze(&profile(&[None, None])).await.unwrap();
        assert_eq!(result.score, 0);
        assert!(!result.details.has_cibil_data);
        assert_eq!(result.issues, vec!["No CIBIL data available".to_string()]);
    }

    #[tokio::test]
    async fn test_average_lowest_highest() {
        let result = analyze(&profile(&[Some(780), None, Some(720)])).await.unwrap();
        assert!(result.details.has_cibil_data);
        assert_eq!(result.details.average_cibil_score, 750);
        assert_eq!(result.details.lowest_score, 720);
        assert_eq!(result.details.highest_score, 780);
        assert_eq!(result.score, 95);
        assert_eq!(result.source, ScoreSource::RuleBased);
    }

    #[tokio::test]
    async fn test_low_individual_score_flagged_despite_good_average() {
        let result = analyze(&profile(&[Some(850), Some(580)])).await.unwrap();
        assert_eq!(result.details.average_cibil_score, 715);
        assert_eq!(result.score, 80);
        assert!(result
            .issues
            .iter()
            .any(|i| i.contains("CB1") && i.contains("580")));
    }

    #[tokio::test]
    async fn test_single_low_score_not_flagged_as_individual() {
        let result = analyze(&profile(&[Some(580)])).await.unwrap();
        assert_eq!(result.score, 25);
        assert!(!result.issues.iter().any(|i| i.contains("individual")));
    }
}
