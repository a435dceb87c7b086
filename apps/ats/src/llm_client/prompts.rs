// Shared prompt fragments.
// Each module that calls the model keeps its own prompts.rs alongside it;
// this file holds only the pieces they have in common.

/// Appended to every system prompt that expects a JSON object back.
pub const JSON_ONLY_INSTRUCTION: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Evidence rule shared by the requirements pre-pass and candidate scoring.
pub const EVIDENCE_INSTRUCTION: &str = "\
    Base every judgement on concrete evidence in the supplied text. \
    Do NOT infer, interpolate, or invent details that are not written there. \
    If something cannot be found, say so rather than guessing.";

/// Joins a role description with the JSON-only rule into one system prompt.
pub fn json_system(role: &str) -> String {
    format!("{role} {JSON_ONLY_INSTRUCTION}")
}
