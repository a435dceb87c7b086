use super::{Category, RecommendationThresholds, Rubric};

/// (id, column name, what the model should look for)
const LEGAL_OPS_CATEGORIES: &[(&str, &str, &str)] = &[
    (
        "core_experience_years",
        "Core Experience: 6–10 years in Legal Ops / IP / Startup-facing roles",
        "Total years of relevant experience in legal operations, intellectual property, or startup-facing legal roles; 6-10 years is ideal.",
    ),
    (
        "core_patent_filing",
        "Core Experience: Patent filing coordination (India, PCT, USPTO, EPO)",
        "Hands-on coordination of patent filings in India and via PCT, USPTO and EPO.",
    ),
    (
        "core_contracts",
        "Core Experience: Drafting & enforcing contracts (NDAs, MSAs, investor agreements)",
        "Drafting, negotiating and enforcing NDAs, MSAs and investor agreements.",
    ),
    (
        "knowledge_patent_law",
        "Specialized Knowledge: Indian + International Patent Law & PCT process",
        "Working knowledge of Indian and international patent law and the PCT process.",
    ),
    (
        "knowledge_fundraising",
        "Specialized Knowledge: Fundraising legalities (SAFE/convertible notes, investor term sheets)",
        "Familiarity with SAFEs, convertible notes and investor term sheets.",
    ),
    (
        "skills_drafting",
        "Skills: Legal drafting, research & litigation support",
        "Legal drafting, legal research and litigation support.",
    ),
    (
        "skills_organization",
        "Skills: Organizational & multitasking (repositories, audit-ready records, multiple priorities)",
        "Maintaining document repositories and audit-ready records while juggling multiple priorities.",
    ),
    (
        "fit_founders",
        "Cultural Fit: Worked closely with Founders / CXOs",
        "Evidence of working directly with founders or CXOs.",
    ),
    (
        "fit_confidentiality",
        "Cultural Fit: Confidentiality, accuracy, maturity",
        "Signals of discretion with confidential matters, accuracy and professional maturity.",
    ),
    (
        "fit_risk_balance",
        "Cultural Fit: Balancing risk governance with innovation speed",
        "Balancing legal risk governance against the speed an innovating company needs.",
    ),
    (
        "education_degree",
        "Education: LLB/LLM or paralegal/legal qualification",
        "LLB, LLM, paralegal or equivalent legal qualification.",
    ),
    (
        "education_credentials",
        "Education: Certifications, memberships, publications in IP/Patent Law",
        "Certifications, professional memberships or publications in IP or patent law.",
    ),
    (
        "bonus_vc_portfolio",
        "Bonus: Prior work with VC/PE portfolio companies / tech startups",
        "Prior work with VC/PE portfolio companies or technology startups.",
    ),
    (
        "bonus_international",
        "Bonus: International exposure (cross-border filings, global counsel coordination)",
        "Cross-border filings or coordination with counsel in other jurisdictions.",
    ),
];

/// The legal-operations / IP rubric used when no rubric file is configured.
/// Every category carries weight 1.0 and is scored out of 10.
pub fn default_rubric() -> Rubric {
    Rubric {
        categories: LEGAL_OPS_CATEGORIES
            .iter()
            .map(|(id, name, description)| Category {
                id: id.to_string(),
                name: name.to_string(),
                description: description.to_string(),
                weight: 1.0,
                max_score: 10.0,
            })
            .collect(),
        thresholds: RecommendationThresholds::default(),
    }
}
