// Shared prompt constants and prompt-building utilities.
// Each service that needs LLM calls defines its own prompts.rs alongside it.
// This file contains cross-cutting prompt fragments.

/// System prompt that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured education-loan \
    underwriting assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Common instruction appended to all scoring prompts.
pub const GROUNDING_INSTRUCTION: &str = "\
    CRITICAL: Base every statement only on the figures provided below. \
    Do NOT infer, interpolate, or invent documents, incomes, or scores. \
    If a figure is missing, say it is missing rather than guessing.";

/// Schema every sub-analysis prompt asks for.
pub const ASSESSMENT_SCHEMA: &str = r#"{
  "score": 0,
  "strengths": ["..."],
  "issues": ["..."],
  "recommendations": ["..."]
}

"score" is an integer from 0 to 100."#;
