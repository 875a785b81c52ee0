// Shared prompt fragments. Feature modules keep their own prompts.rs and
// compose these cross-cutting pieces into it.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with a single valid JSON object only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Keeps the model from crediting the candidate with experience the CV does not show.
pub const EVIDENCE_INSTRUCTION: &str = "\
    Base every strength and gap strictly on the CV and vacancy text provided. \
    Do NOT assume skills, years of experience, or qualifications that are not stated. \
    If the CV is silent on a requirement, treat it as a gap rather than a strength.";
