//! Sub-Analyzers — one per dimension of the applicant's profile.
//!
//! Every analyzer follows the same three layers:
//! 1. trivial case: the slice is absent → fixed zero-score result, no LLM call
//! 2. LLM path: deterministic prompt from a precomputed summary → `complete` → safe parse
//! 3. rule-based fallback: a pure function of the same summary, computed up front
//!
//! CIBIL and work experience skip layer 2 entirely.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::eligibility::models::{Assessment, ScoreSource};
use crate::llm_client::json::extract_json;
use crate::llm_client::retry::RetryPolicy;
use crate::llm_client::{complete, CompletionService};

pub mod academic;
pub mod admission;
pub mod cibil;
pub mod financial;
pub mod kyc;
pub mod work_experience;

/// How far a valid LLM score may drift from the rule-based score.
pub const MAX_LLM_DEVIATION: i16 = 30;

/// Everything an analyzer needs besides the profile. Cheap to clone into tasks.
#[derive(Clone)]
pub struct AnalyzerContext {
    pub llm: Arc<dyn CompletionService>,
    pub retry: RetryPolicy,
}

/// Shape requested from the LLM by every sub-analysis prompt.
#[derive(Debug, Deserialize)]
struct LlmAssessment {
    score: f64,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// Runs the LLM path and returns its grounded assessment, or `fallback` with
/// `ScoreSource::RuleBased` on any invocation, parse, or validation failure.
pub async fn assess_with_llm(
    ctx: &AnalyzerContext,
    analyzer: &str,
    prompt: &str,
    timeout: Duration,
    fallback: Assessment,
) -> (Assessment, ScoreSource) {
    debug!("{analyzer}: prompt is {} chars", prompt.len());

    let text = match complete(&ctx.llm, prompt, timeout, &ctx.retry).await {
        Ok(text) => text,
        Err(e) => {
            warn!("{analyzer}: LLM unavailable ({e}), using rule-based score");
            return (fallback, ScoreSource::RuleBased);
        }
    };

    let Some(parsed) = extract_json::<LlmAssessment>(&text) else {
        warn!("{analyzer}: LLM response was not a valid assessment, using rule-based score");
        return (fallback, ScoreSource::RuleBased);
    };

    if !parsed.score.is_finite() || !(0.0..=100.0).contains(&parsed.score) {
        warn!(
            "{analyzer}: LLM score {} out of range, using rule-based score",
            parsed.score
        );
        return (fallback, ScoreSource::RuleBased);
    }

    (ground(parsed, fallback), ScoreSource::Llm)
}

/// Anchors an LLM assessment to the rule-based one: the score is clamped to
/// within `MAX_LLM_DEVIATION` points and empty lists are filled from the fallback.
fn ground(parsed: LlmAssessment, fallback: Assessment) -> Assessment {
    let rule_score = fallback.score as i16;
    let llm_score = parsed.score.round() as i16;
    let score = llm_score.clamp(
        (rule_score - MAX_LLM_DEVIATION).max(0),
        (rule_score + MAX_LLM_DEVIATION).min(100),
    ) as u8;

    Assessment {
        score,
        strengths: non_empty_or(parsed.strengths, fallback.strengths),
        issues: non_empty_or(parsed.issues, fallback.issues),
        recommendations: non_empty_or(parsed.recommendations, fallback.recommendations),
    }
}

fn non_empty_or(primary: Vec<String>, fallback: Vec<String>) -> Vec<String> {
    let primary: Vec<String> = primary
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if primary.is_empty() {
        fallback
    } else {
        primary
    }
}

/// Rounds and clamps a raw score into 0 – 100.
pub fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return 0;
    }
    raw.round().clamp(0.0, 100.0) as u8
}
