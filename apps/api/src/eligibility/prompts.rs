// All LLM prompt constants for the eligibility pipeline.
// Reuses cross-cutting fragments from llm_client::prompts.
// Each template's first line is a stable section header; keep it unique per analyzer.

/// Academic analysis prompt.
/// Replace: {grounding_instruction}, {summary}, {schema}
pub const ACADEMIC_PROMPT_TEMPLATE: &str = r#"ACADEMIC PROFILE ASSESSMENT for an education loan applicant.

{grounding_instruction}

Academic summary:
{summary}

Score academic strength for loan underwriting: consistency across class 10, class 12 and
graduation, backlogs, and gap years. Strong and consistent records (75%+) score 80 or above.

Return a JSON object with this EXACT schema:
{schema}"#;

/// KYC analysis prompt.
/// Replace: {grounding_instruction}, {summary}, {schema}
pub const KYC_PROMPT_TEMPLATE: &str = r#"KYC STATUS ASSESSMENT for an education loan applicant.

{grounding_instruction}

KYC summary:
{summary}

Required documents are Aadhaar, PAN and Passport. Score completeness and verification state:
all three verified with a verified KYC status scores 90 or above; a rejected KYC scores below 30.

Return a JSON object with this EXACT schema:
{schema}"#;

/// Financial analysis prompt.
/// Replace: {grounding_instruction}, {summary}, {co_borrowers_json}, {schema}
pub const FINANCIAL_PROMPT_TEMPLATE: &str = r#"CO-BORROWER FINANCIAL ASSESSMENT for an education loan applicant.

{grounding_instruction}

Household totals (computed, authoritative):
{summary}

Per co-borrower figures:
{co_borrowers_json}

Score repayment capacity. FOIR (fixed obligations to income ratio) at or below 40% is healthy,
above 60% is a serious concern. Higher stable monthly income raises the score.

Return a JSON object with this EXACT schema:
{schema}"#;

/// Admission letter analysis prompt.
/// Replace: {grounding_instruction}, {summary}, {schema}
pub const ADMISSION_PROMPT_TEMPLATE: &str = r#"ADMISSION LETTER ASSESSMENT for an education loan applicant.

{grounding_instruction}

Admission summary:
{summary}

Score the admission from a lender's perspective: unconditional offers from well-ranked
universities in established study destinations score highest; conditional offers score lower.

Return a JSON object with this EXACT schema:
{schema}"#;

/// NBFC matching prompt.
/// Replace: {grounding_instruction}, {applicant_summary}, {policies_json}
pub const NBFC_MATCH_PROMPT_TEMPLATE: &str = r#"LENDER POLICY MATCHING for an education loan applicant.

{grounding_instruction}

Applicant summary:
{applicant_summary}

Lender policies:
{policies_json}

For EACH lender policy above, decide whether the applicant is eligible. Return a JSON ARRAY:
[
  {
    "lender_id": "the exact id from the policy list",
    "eligibility_status": "eligible" | "borderline" | "not_eligible",
    "match_percentage": 0,
    "strengths": ["..."],
    "gaps": ["..."],
    "specific_recommendations": ["..."]
  }
]

HARD RULES:
1. `lender_id` MUST be copied exactly from the policy list — never use the lender name
2. Income below the policy minimum, CIBIL below the policy minimum, or FOIR above the policy
   maximum can never be "eligible"
3. Return one entry per policy and no others"#;
