//! The memory a user describes, and the sanitizer applied to each field.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static SCRIPT_SCHEME: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern
    Regex::new(r"(?i)javascript:").unwrap()
});

static EVENT_HANDLER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern
    Regex::new(r"(?i)on\w+=").unwrap()
});

/// Strip markup and script-triggering fragments from free text.
///
/// Trims the input, drops `<` and `>`, removes `javascript:` and
/// `on<word>=` handler fragments (case-insensitive). Removal can splice new
/// fragments together, so the two patterns are applied until nothing
/// matches.
#[must_use]
pub fn sanitize_input(input: &str) -> String {
    let mut out: String = input.trim().chars().filter(|c| !matches!(c, '<' | '>')).collect();
    loop {
        let next = SCRIPT_SCHEME.replace_all(&out, "");
        let next = EVENT_HANDLER.replace_all(&next, "").into_owned();
        if next == out {
            return next.trim().to_owned();
        }
        out = next;
    }
}

/// The four fields of the memory form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryField {
    People,
    Place,
    Emotions,
    SensoryDetails,
}

impl MemoryField {
    /// Message shown when the field is left empty.
    #[must_use]
    pub const fn missing_message(self) -> &'static str {
        match self {
            Self::People => "Please describe the people involved",
            Self::Place => "Please describe the place of the memory",
            Self::Emotions => "Please describe the emotions you felt",
            Self::SensoryDetails => "Please provide some sensory details",
        }
    }
}

/// Every problem found in a memory submission.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .problems.iter().map(|(_, msg)| msg.as_str()).collect::<Vec<_>>().join("\n"))]
pub struct MemoryValidationError {
    /// Offending field and message, in form order.
    pub problems: Vec<(MemoryField, String)>,
}

/// A sanitized, validated memory description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryDescription {
    people: String,
    place: String,
    emotions: String,
    sensory_details: String,
}

impl MemoryDescription {
    /// Sensory details shorter than this are rejected as too vague.
    pub const MIN_SENSORY_DETAILS: usize = 5;

    /// Sanitize each field, then check that none is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`MemoryValidationError`] listing every empty or too-short field.
    pub fn new(
        people: &str,
        place: &str,
        emotions: &str,
        sensory_details: &str,
    ) -> Result<Self, MemoryValidationError> {
        let memory = Self {
            people: sanitize_input(people),
            place: sanitize_input(place),
            emotions: sanitize_input(emotions),
            sensory_details: sanitize_input(sensory_details),
        };

        let mut problems = Vec::new();
        for (field, value) in memory.fields() {
            if value.is_empty() {
                problems.push((field, field.missing_message().to_owned()));
            }
        }
        let details_len = memory.sensory_details.chars().count();
        if details_len > 0 && details_len < Self::MIN_SENSORY_DETAILS {
            problems.push((
                MemoryField::SensoryDetails,
                format!(
                    "Sensory details should be more descriptive (at least {} characters)",
                    Self::MIN_SENSORY_DETAILS
                ),
            ));
        }

        if problems.is_empty() {
            Ok(memory)
        } else {
            Err(MemoryValidationError { problems })
        }
    }

    /// Fields paired with their sanitized values, in form order.
    #[must_use]
    pub fn fields(&self) -> [(MemoryField, &str); 4] {
        [
            (MemoryField::People, &self.people),
            (MemoryField::Place, &self.place),
            (MemoryField::Emotions, &self.emotions),
            (MemoryField::SensoryDetails, &self.sensory_details),
        ]
    }

    #[must_use]
    pub fn people(&self) -> &str {
        &self.people
    }

    #[must_use]
    pub fn place(&self) -> &str {
        &self.place
    }

    #[must_use]
    pub fn emotions(&self) -> &str {
        &self.emotions
    }

    #[must_use]
    pub fn sensory_details(&self) -> &str {
        &self.sensory_details
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_removes_script_markup() {
        let out = sanitize_input("  <script>alert(1)</script> grandma  ");
        assert!(!out.contains('<'));
        assert!(!out.contains('>'));
        assert!(!out.contains("<script>"));
        assert!(out.ends_with("grandma"));
    }

    #[test]
    fn test_sanitize_removes_event_handlers() {
        let out = sanitize_input("img src=x onerror=alert(1) ONLOAD=go()");
        assert!(!out.to_lowercase().contains("onerror="));
        assert!(!out.to_lowercase().contains("onload="));
        assert!(out.contains("alert(1)"));
    }

    #[test]
    fn test_sanitize_removes_javascript_scheme() {
        assert_eq!(sanitize_input("JavaScript:void(0)"), "void(0)");
    }

    #[test]
    fn test_sanitize_removes_spliced_fragments() {
        // removing the inner fragment must not leave a new one behind
        assert_eq!(sanitize_input("javajavascript:script:x"), "x");
        assert_eq!(sanitize_input("oonclick=nclick=x"), "x");
    }

    #[test]
    fn test_sanitize_keeps_plain_text() {
        assert_eq!(
            sanitize_input("the smell of pine on a cold morning"),
            "the smell of pine on a cold morning"
        );
    }

    #[test]
    fn test_new_requires_every_field() {
        let err = MemoryDescription::new("", "beach", "  ", "salt air").expect_err("invalid");
        let fields: Vec<_> = err.problems.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec![MemoryField::People, MemoryField::Emotions]);
    }

    #[test]
    fn test_new_field_empty_after_sanitizing() {
        let err = MemoryDescription::new("<>", "beach", "joy", "salt air").expect_err("invalid");
        assert_eq!(err.problems.first().map(|(f, _)| *f), Some(MemoryField::People));
    }

    #[test]
    fn test_new_rejects_short_sensory_details() {
        let err = MemoryDescription::new("mom", "beach", "joy", "sun").expect_err("invalid");
        assert_eq!(err.problems.len(), 1);
        assert!(err.to_string().contains("at least 5"));
    }

    #[test]
    fn test_new_sanitizes_fields() {
        let memory =
            MemoryDescription::new(" my <b>sister</b> ", "lake", "calm", "warm water").expect("ok");
        assert_eq!(memory.people(), "my bsister/b");
    }
}
