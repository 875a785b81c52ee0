//! Match prompt assembly: a bounded comparison request from a CV and a vacancy.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::analysis::normalizer::truncate_chars;
use crate::analysis::prompts::{
    ANSWER_IN_DUTCH, ANSWER_IN_ENGLISH, MATCH_PROMPT_TEMPLATE, MATCH_SYSTEM_ROLE,
};
use crate::llm_client::prompts::{EVIDENCE_INSTRUCTION, JSON_ONLY_SYSTEM};
use crate::llm_client::PromptPayload;

/// Max characters of each input text embedded in the prompt.
pub const MAX_INPUT_CHARS: usize = 4000;
const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Language of the free-text fields in the AI answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseLanguage {
    #[default]
    #[serde(rename = "nl")]
    Dutch,
    #[serde(rename = "en")]
    English,
}

impl ResponseLanguage {
    fn instruction(&self) -> &'static str {
        match self {
            ResponseLanguage::Dutch => ANSWER_IN_DUTCH,
            ResponseLanguage::English => ANSWER_IN_ENGLISH,
        }
    }
}

/// Builds the system + user prompt for one CV/vacancy comparison.
///
/// Each text is cut to `MAX_INPUT_CHARS` characters by length alone.
pub fn build_match_prompt(
    cv_text: &str,
    vacancy_text: &str,
    language: ResponseLanguage,
) -> PromptPayload {
    let system = format!("{MATCH_SYSTEM_ROLE} {JSON_ONLY_SYSTEM}");

    let cv = bounded_input(cv_text);
    let vacancy = bounded_input(vacancy_text);
    let user = fill_template(
        MATCH_PROMPT_TEMPLATE,
        &[
            ("{evidence_instruction}", EVIDENCE_INSTRUCTION),
            ("{language_instruction}", language.instruction()),
            ("{cv_text}", cv.as_ref()),
            ("{vacancy_text}", vacancy.as_ref()),
        ],
    );

    PromptPayload { system, user }
}

fn bounded_input(text: &str) -> Cow<'_, str> {
    let kept = truncate_chars(text, MAX_INPUT_CHARS);
    if kept.len() == text.len() {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(format!("{kept}{TRUNCATION_MARKER}"))
    }
}

/// Substitutes placeholders found in the template only; inserted values are
/// never re-scanned, so a CV containing `{vacancy_text}` stays literal.
fn fill_template(template: &str, slots: &[(&str, &str)]) -> String {
    let capacity = template.len() + slots.iter().map(|(_, v)| v.len()).sum::<usize>();
    let mut out = String::with_capacity(capacity);
    let mut rest = template;

    loop {
        let next = slots
            .iter()
            .filter_map(|(key, value)| rest.find(key).map(|idx| (idx, *key, *value)))
            .min_by_key(|(idx, _, _)| *idx);

        match next {
            Some((idx, key, value)) => {
                out.push_str(&rest[..idx]);
                out.push_str(value);
                rest = &rest[idx + key.len()..];
            }
            None => {
                out.push_str(rest);
                return out;
            }
        }
    }
}
