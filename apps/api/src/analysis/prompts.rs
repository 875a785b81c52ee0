// Prompt constants for CV-to-vacancy match analysis.
// Reuses cross-cutting fragments from llm_client::prompts.

/// Role statement prepended to the JSON-only system instruction.
pub const MATCH_SYSTEM_ROLE: &str = "You are an experienced recruiter assistant. \
    You compare a candidate's CV with a vacancy and return a structured, honest assessment.";

/// Match prompt template. Filled by `prompt_builder::build_match_prompt`.
pub const MATCH_PROMPT_TEMPLATE: &str = r#"Analyse how well the candidate's CV matches the vacancy.

Return a JSON object with this EXACT schema (no extra fields):
{
  "match_score": 0,
  "decision": "no_match",
  "summary": "",
  "strengths": [],
  "gaps": [],
  "recommendations": []
}

Field rules:
- match_score: integer from 0 to 100. Higher means a better fit.
- decision: exactly one of "strong_match", "match", "weak_match", "no_match".
- summary: one or two sentences, plain text.
- strengths: at most 8 short strings, each one reason the candidate fits.
- gaps: at most 8 short strings, each one missing or weak requirement.
- recommendations: at most 8 short strings, each one follow-up question to ask in an intake interview.

{evidence_instruction}

{language_instruction}

CV:
"""
{cv_text}
"""

VACANCY:
"""
{vacancy_text}
""""#;

pub const ANSWER_IN_DUTCH: &str = "Write summary, strengths, gaps and recommendations in Dutch. \
    Keep the JSON field names and decision values in English.";

pub const ANSWER_IN_ENGLISH: &str = "Write summary, strengths, gaps and recommendations in English.";
