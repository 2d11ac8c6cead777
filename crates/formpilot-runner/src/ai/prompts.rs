//! Fixed instruction prompts for the three AI collaborators.

use crate::profile::PROFILE_SLOTS;

/// Sentinel an answerer returns when the profile cannot support an answer.
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT_DATA";

const MAPPING_RULES: &str = r#"You map web form fields to a job applicant's profile.

You receive a JSON array of form fields. Each field has an "id", a "type", and whatever of "name", "label", "placeholder", "ariaLabel", "autocomplete", "context" (nearest heading), "section" and "options" the page provides. You also receive the applicant's profile.

Reply with a JSON array only. One object per field you can map:
  {"id": "<field id>", "fieldType": "<slot>", "confidence": 0.0-1.0}

Slots:
{slots}

Rules:
- Use "custom_question" for open-ended questions (motivation, cover letter, "why this company"). Put the literal question text in "question".
- For select and radio fields, also set "value" to the exact option value that matches the profile. Leave it out if nothing matches.
- Repeated sections (work experience, education) are repeater groups. Set "groupType" to "experience" or "education" and "groupIndex" to the zero-based position of the instance on the page, in visual order. Headings such as "Experience 2" belong to groupIndex 1.
- A button that adds another instance of a repeated section ("Add Experience", "+ Add another school") gets {"id": "<button id>", "action": "trigger-add", "groupType": "...", "groupIndex": <index of the instance it creates>} and no fieldType. Only add instances the profile has data for.
- Never map navigation buttons (Next, Continue, Submit) and never invent ids.
- Skip fields you cannot map. Do not explain."#;

/// Mapping prompt with the slot vocabulary filled in.
pub fn mapping_prompt() -> String {
    MAPPING_RULES.replace("{slots}", &PROFILE_SLOTS.join(", "))
}

/// Answer prompt.
pub fn answer_prompt() -> String {
    format!(
        "You answer job application questions on behalf of the applicant whose profile you are given.\n\
         Answer in the first person, in at most three sentences, using only facts from the profile.\n\
         Reply with the answer text only. If the profile does not contain enough information, \
         reply with exactly {}.",
        INSUFFICIENT_DATA
    )
}

/// Resume parsing prompt.
pub const RESUME_PROMPT: &str = r#"You extract structured data from resume text.

Reply with one JSON object and nothing else, using these keys (omit what is unknown):
  first_name, last_name, email, phone, address, city, state, postal_code, country,
  linkedin, github, website, headline, summary, years_experience,
  experience: [{title, company, location, start_date, end_date, current, description}],
  education: [{school, degree, field_of_study, start_date, end_date, gpa}],
  skills: [string]

List experience and education most recent first. Dates as YYYY-MM where possible. "current" is a boolean. All other values are strings."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_prompt_lists_slots() {
        let prompt = mapping_prompt();
        assert!(!prompt.contains("{slots}"));
        for slot in PROFILE_SLOTS {
            assert!(prompt.contains(slot), "missing slot {}", slot);
        }
        assert!(prompt.contains("trigger-add"));
        assert!(prompt.contains("custom_question"));
    }

    #[test]
    fn test_answer_prompt_names_sentinel() {
        assert!(answer_prompt().contains(INSUFFICIENT_DATA));
    }
}
