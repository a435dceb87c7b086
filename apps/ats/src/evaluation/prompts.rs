// Prompt templates for the evaluation module.
// Placeholders are replaced with `str::replace` before sending.

use crate::evaluation::models::JobRequirements;
use crate::llm_client::prompts::{json_system, EVIDENCE_INSTRUCTION};
use crate::rubric::Rubric;

pub fn requirements_system() -> String {
    json_system(
        "You are an expert job description analyst. \
        Condense a job description into the requirements used to screen resumes.",
    )
}

/// Replace `{job_description}` before sending.
pub const REQUIREMENTS_PROMPT_TEMPLATE: &str = r#"Analyze the following job description and extract the key requirements for efficient resume evaluation.

Return a JSON object with this EXACT schema (no extra fields):
{
  "key_skills": ["contract drafting", "PCT filings"],
  "experience_requirements": "6-10 years in legal operations or IP",
  "role_responsibilities": "Own the patent filing calendar; draft NDAs and MSAs",
  "qualifications": "LLB or LLM; IP certifications a plus"
}

Extract:
1. Key skills (both technical and soft skills)
2. Experience requirements (years and type)
3. Main role responsibilities
4. Educational / certification qualifications

Focus on the requirements that matter most when evaluating candidates.

JOB DESCRIPTION:
{job_description}"#;

pub fn evaluation_system() -> String {
    json_system(
        "You are an expert HR recruiter scoring resumes against a fixed, weighted rubric.",
    )
}

/// Replace `{evidence_instruction}`, `{rubric}`, `{requirements}`, `{schema}` and
/// `{resume_text}` before sending.
pub const EVALUATION_PROMPT_TEMPLATE: &str = r#"{evidence_instruction}

Evaluate the resume below against every rubric category.

RUBRIC (score each category from 0 up to its max score; weights are applied by the caller):
{rubric}

{requirements}
Instructions:
1. Extract the candidate's name, phone number and email. Use null for anything not found.
2. Score EVERY rubric category exactly once, keyed by its id. Scores are numbers.
3. Write a short justification citing the resume evidence behind the scores.
4. Recommend one of: "Strongly Recommended", "Recommended", "Consider", "Not Suitable".

Return a JSON object with this EXACT schema (no extra fields):
{schema}

RESUME:
{resume_text}"#;

/// One line per category: id, name, weight, range and what to look for.
pub fn render_rubric(rubric: &Rubric) -> String {
    rubric
        .categories
        .iter()
        .map(|c| {
            format!(
                "- id `{}` | {} | weight {} | score 0-{} | {}",
                c.id, c.name, c.weight, c.max_score, c.description
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn render_requirements(requirements: Option<&JobRequirements>) -> String {
    match requirements {
        Some(r) => format!(
            "JOB REQUIREMENTS:\n\
            KEY SKILLS REQUIRED: {}\n\
            EXPERIENCE REQUIREMENTS: {}\n\
            ROLE RESPONSIBILITIES: {}\n\
            QUALIFICATIONS: {}\n",
            r.key_skills.join(", "),
            r.experience_requirements,
            r.role_responsibilities,
            r.qualifications
        ),
        None => String::new(),
    }
}

/// Example reply listing every category id so the model cannot miss one.
pub fn render_schema(rubric: &Rubric) -> String {
    let scores = rubric
        .categories
        .iter()
        .map(|c| format!("    \"{}\": 0", c.id))
        .collect::<Vec<_>>()
        .join(",\n");
    format!(
        "{{\n  \"candidate_name\": \"string or null\",\n  \"email\": \"string or null\",\n  \"phone\": \"string or null\",\n  \"scores\": {{\n{scores}\n  }},\n  \"justification\": \"string\",\n  \"recommendation\": \"Recommended\"\n}}"
    )
}

pub fn build_evaluation_prompt(
    rubric: &Rubric,
    requirements: Option<&JobRequirements>,
    resume_text: &str,
) -> String {
    EVALUATION_PROMPT_TEMPLATE
        .replace("{evidence_instruction}", EVIDENCE_INSTRUCTION)
        .replace("{rubric}", &render_rubric(rubric))
        .replace("{requirements}", &render_requirements(requirements))
        .replace("{schema}", &render_schema(rubric))
        // Last, so placeholder-looking text inside a resume is left alone.
        .replace("{resume_text}", resume_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::default_rubric;

    #[test]
    fn test_prompt_lists_every_category_id() {
        let rubric = default_rubric();
        let prompt = build_evaluation_prompt(&rubric, None, "Jane Doe, patent agent");
        for c in &rubric.categories {
            assert!(prompt.contains(&format!("id `{}`", c.id)), "missing {}", c.id);
            assert!(prompt.contains(&format!("\"{}\": 0", c.id)), "schema missing {}", c.id);
        }
        assert!(prompt.ends_with("Jane Doe, patent agent"));
        assert!(!prompt.contains("JOB REQUIREMENTS"));
    }

    #[test]
    fn test_prompt_embeds_requirements_when_present() {
        let requirements = JobRequirements {
            key_skills: vec!["NDAs".to_string(), "PCT".to_string()],
            experience_requirements: "6+ years".to_string(),
            role_responsibilities: "Run filings".to_string(),
            qualifications: "LLB".to_string(),
        };
        let prompt = build_evaluation_prompt(&default_rubric(), Some(&requirements), "text");
        assert!(prompt.contains("KEY SKILLS REQUIRED: NDAs, PCT"));
        assert!(prompt.contains("QUALIFICATIONS: LLB"));
    }

    #[test]
    fn test_resume_placeholders_are_not_expanded() {
        let prompt = build_evaluation_prompt(&default_rubric(), None, "I wrote {rubric} once");
        assert!(prompt.ends_with("I wrote {rubric} once"));
    }

    #[test]
    fn test_schema_is_valid_json_shape() {
        let schema = render_schema(&default_rubric());
        let value: serde_json::Value = serde_json::from_str(&schema).unwrap();
        assert_eq!(value["scores"].as_object().unwrap().len(), 14);
    }
}
