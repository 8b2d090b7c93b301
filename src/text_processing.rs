use regex::{NoExpand, Regex};
use std::collections::HashMap;

/// Applies the user's word overrides to a transcript before it is pasted.
///
/// Overrides are whole-word and case-insensitive, for names and jargon the
/// recognizer keeps getting wrong ("get hub" -> "GitHub"). Replacement text
/// is used verbatim.
pub struct TextProcessor {
    overrides: Vec<(Regex, String)>,
}

impl TextProcessor {
    pub fn new(overrides: &HashMap<String, String>) -> Self {
        let overrides = overrides
            .iter()
            .filter_map(|(word, replacement)| {
                Regex::new(&format!(r"(?i)\b{}\b", regex::escape(word)))
                    .ok()
                    .map(|re| (re, replacement.clone()))
            })
            .collect();

        Self { overrides }
    }

    pub fn apply(&self, text: &str) -> String {
        let mut result = text.to_string();
        for (re, replacement) in &self.overrides {
            result = re
                .replace_all(&result, NoExpand(replacement))
                .into_owned();
        }
        result.trim().to_string()
    }
}
