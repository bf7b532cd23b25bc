//! Recommendation Generator: turns scores and match results into prioritized actions.
//!
//! Pure and deterministic; no LLM involvement.

use serde::{Deserialize, Serialize};

use crate::eligibility::models::{Analyses, EligibilityStatus, MatchResult, ScoreSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStrength {
    Excellent,
    Good,
    Fair,
    NeedsImprovement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationBundle {
    pub critical_actions: Vec<String>,
    pub important_improvements: Vec<String>,
    pub overall_assessment: ProfileStrength,
    pub summary: String,
    pub eligible_count: usize,
    pub borderline_count: usize,
}

#[derive(Default)]
struct Actions {
    critical: Vec<String>,
    important: Vec<String>,
}

pub fn generate(analyses: &Analyses, overall_score: u8, matches: &[MatchResult]) -> RecommendationBundle {
    let mut actions = Actions::default();

    for (name, source) in [
        ("academic", analyses.academic.source),
        ("KYC", analyses.kyc.source),
        ("financial", analyses.financial.source),
        ("CIBIL", analyses.cibil.source),
        ("work experience", analyses.work_experience.source),
        ("admission", analyses.admission.source),
    ] {
        if source == ScoreSource::Failed {
            actions
                .important
                .push(format!("The {name} analysis could not be completed; re-run the eligibility check"));
        }
    }

    academic_actions(analyses, &mut actions);
    kyc_actions(analyses, &mut actions);
    financial_actions(analyses, &mut actions);
    cibil_actions(analyses, &mut actions);
    work_experience_actions(analyses, &mut actions);
    admission_actions(analyses, &mut actions);

    let eligible_count = count(matches, EligibilityStatus::Eligible);
    let borderline_count = count(matches, EligibilityStatus::Borderline);
    let overall_assessment = classify(eligible_count, borderline_count, overall_score);

    RecommendationBundle {
        critical_actions: actions.critical,
        important_improvements: actions.important,
        overall_assessment,
        summary: summary(overall_assessment, eligible_count, borderline_count, overall_score),
        eligible_count,
        borderline_count,
    }
}

fn count(matches: &[MatchResult], status: EligibilityStatus) -> usize {
    matches
        .iter()
        .filter(|m| m.eligibility_status == status)
        .count()
}

pub fn classify(eligible_count: usize, borderline_count: usize, overall_score: u8) -> ProfileStrength {
    if eligible_count >= 3 && overall_score >= 75 {
        ProfileStrength::Excellent
    } else if eligible_count >= 1 && overall_score >= 60 {
        ProfileStrength::Good
    } else if eligible_count + borderline_count > 0 {
        ProfileStrength::Fair
    } else {
        ProfileStrength::NeedsImprovement
    }
}

fn summary(
    strength: ProfileStrength,
    eligible_count: usize,
    borderline_count: usize,
    overall_score: u8,
) -> String {
    match strength {
        ProfileStrength::Excellent => format!(
            "Excellent profile ({overall_score}/100): eligible with {eligible_count} lenders"
        ),
        ProfileStrength::Good => format!(
            "Good profile ({overall_score}/100): eligible with {eligible_count} lender(s)"
        ),
        ProfileStrength::Fair => format!(
            "Fair profile ({overall_score}/100): {eligible_count} eligible and {borderline_count} borderline lender(s)"
        ),
        ProfileStrength::NeedsImprovement => format!(
            "Profile needs improvement ({overall_score}/100): no lender currently matches"
        ),
    }
}

fn academic_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.academic;
    if result.source == ScoreSource::Failed {
        return;
    }
    if result.score < 50 {
        actions.critical.push(format!(
            "Academic score is {}/100; add standardized test scores (GRE, GMAT, IELTS) to strengthen the file",
            result.score
        ));
    } else if result.score < 70 {
        actions
            .important
            .push("Highlight academic achievements or test scores to lift the academic profile".to_string());
    }
}

fn kyc_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.kyc;
    if result.source == ScoreSource::Failed {
        return;
    }
    if result.score < 60 {
        actions
            .critical
            .push("Complete KYC verification for Aadhaar, PAN and Passport".to_string());
    } else if result.score < 80 {
        let missing = &result.details.missing_documents;
        let unverified = &result.details.unverified_documents;
        let pending: Vec<&str> = missing.iter().chain(unverified).map(String::as_str).collect();
        if pending.is_empty() {
            actions.important.push("Finish KYC verification".to_string());
        } else {
            actions
                .important
                .push(format!("Verify remaining KYC documents: {}", pending.join(", ")));
        }
    }
}

fn financial_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.financial;
    if result.source == ScoreSource::Failed {
        return;
    }
    let details = &result.details;
    if !details.has_co_borrower {
        actions
            .critical
            .push("Add a co-borrower; lenders require one for education loans".to_string());
        return;
    }

    if details.foir > 60.0 {
        actions.critical.push(format!(
            "Reduce co-borrower FOIR from {:.1}% to below 60% by closing or prepaying existing loans",
            details.foir
        ));
    } else if details.foir > 50.0 {
        actions.important.push(format!(
            "Bring co-borrower FOIR from {:.1}% under 50% to qualify with more lenders",
            details.foir
        ));
    }

    if result.score < 50 {
        actions
            .important
            .push("Strengthen co-borrower financials with an additional earning co-borrower".to_string());
    }
}

fn cibil_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.cibil;
    if result.source == ScoreSource::Failed {
        return;
    }
    let details = &result.details;
    if !details.has_cibil_data {
        actions
            .important
            .push("Obtain CIBIL reports for all co-borrowers".to_string());
    } else if details.average_cibil_score < 650 {
        actions.critical.push(format!(
            "Average CIBIL score {} is below most lender minimums; clear overdues before applying",
            details.average_cibil_score
        ));
    } else if details.average_cibil_score < 750 {
        actions.important.push(format!(
            "Raise the average CIBIL score from {} towards 750 for better rates",
            details.average_cibil_score
        ));
    }
}

fn work_experience_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.work_experience;
    if result.source != ScoreSource::Failed && result.score < 60 {
        actions
            .important
            .push("Document internships or work experience with experience letters".to_string());
    }
}

fn admission_actions(analyses: &Analyses, actions: &mut Actions) {
    let result = &analyses.admission;
    if result.source == ScoreSource::Failed {
        return;
    }
    if result.score == 0 {
        actions
            .critical
            .push("Upload the university admission letter".to_string());
    } else if result.score < 60 {
        actions
            .important
            .push("Convert the conditional offer into an unconditional admission".to_string());
    }
}
