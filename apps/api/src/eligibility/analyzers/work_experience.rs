//! Work experience analyzer. Rule-based only.

use serde::{Deserialize, Serialize};

use crate::eligibility::models::{
    AnalysisResult, Assessment, ScoreSource, StudentProfile, WorkExperienceEntry,
};
use crate::errors::AppError;

const BASE_SCORE: u32 = 50;
const POINTS_PER_MONTH: u32 = 2;
const MAX_EXPERIENCE_POINTS: u32 = 30;
const VERIFIED_BONUS: u32 = 10;
const MAX_SCORE: u32 = 90;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkExperienceDetails {
    pub has_experience: bool,
    pub total_months: u32,
    pub entry_count: usize,
    pub verified_entries: usize,
}

pub async fn analyze(
    profile: &StudentProfile,
) -> Result<AnalysisResult<WorkExperienceDetails>, AppError> {
    let details = summarize(&profile.work_experience);
    Ok(AnalysisResult::from_assessment(
        rule_based_assessment(&details),
        ScoreSource::RuleBased,
        details,
    ))
}

pub fn summarize(entries: &[WorkExperienceEntry]) -> WorkExperienceDetails {
    WorkExperienceDetails {
        has_experience: !entries.is_empty(),
        total_months: entries
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.duration_months)),
        entry_count: entries.len(),
        verified_entries: entries.iter().filter(|e| e.verified).count(),
    }
}

/// 50 base, +2 per month capped at +30, +10 if any entry is verified, capped at 90.
pub fn score(details: &WorkExperienceDetails) -> u8 {
    let experience = details
        .total_months
        .saturating_mul(POINTS_PER_MONTH)
        .min(MAX_EXPERIENCE_POINTS);
    let verified = if details.verified_entries > 0 {
        VERIFIED_BONUS
    } else {
        0
    };
    (BASE_SCORE + experience + verified).min(MAX_SCORE) as u8
}

fn rule_based_assessment(details: &WorkExperienceDetails) -> Assessment {
    let mut strengths = Vec::new();
    let mut issues = Vec::new();
    let mut recommendations = Vec::new();

    if !details.has_experience {
        issues.push("No work experience listed".to_string());
        recommendations
            .push("Add internships or part-time roles with experience letters".to_string());
    } else {
        strengths.push(format!(
            "{} month(s) of work experience across {} role(s)",
            details.total_months, details.entry_count
        ));
        if details.verified_entries == 0 {
            issues.push("Work experience is not verified".to_string());
            recommendations.push("Upload an experience or relieving letter".to_string());
        }
    }

    Assessment {
        score: score(details),
        strengths,
        issues,
        recommendations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(months: u32, verified: bool) -> WorkExperienceEntry {
        WorkExperienceEntry {
            company: "Acme".to_string(),
            role: "Analyst".to_string(),
            duration_months: months,
            verified,
        }
    }

    #[tokio::test]
    async fn test_no_experience_scores_base() {
        let result = analyze(&StudentProfile::default()).await.unwrap();
        assert_eq!(result.score, 50);
        assert!(!result.details.has_experience);
    }

    #[test]
    fn test_months_add_two_points_each() {
        assert_eq!(score(&summarize(&[entry(6, false)])), 62);
        assert_eq!(score(&summarize(&[entry(6, false), entry(4, false)])), 70);
    }

    #[test]
    fn test_experience_points_capped_at_thirty() {
        assert_eq!(score(&summarize(&[entry(48, false)])), 80);
    }

    #[test]
    fn test_huge_durations_saturate_instead_of_overflowing() {
        let details = summarize(&[entry(u32::MAX, true), entry(1, false)]);
        assert_eq!(details.total_months, u32::MAX);
        assert_eq!(score(&details), 90);
    }

    #[test]
    fn test_verified_bonus_and_overall_cap() {
        assert_eq!(score(&summarize(&[entry(3, true)])), 66);
        assert_eq!(score(&summarize(&[entry(36, true)])), 90);
    }
}
