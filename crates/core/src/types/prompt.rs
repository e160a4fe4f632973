//! Therapeutic image prompts.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::memory::MemoryDescription;

/// Error for a prompt with no content.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("generated prompt is empty")]
pub struct EmptyPrompt;

/// A non-empty, single plain-text image prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TherapeuticPrompt(String);

impl TherapeuticPrompt {
    /// Clean model output into a prompt.
    ///
    /// Trims whitespace and strips leading/trailing `"`, `'` and newline
    /// characters, which models like to wrap their answer in.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyPrompt`] if nothing is left after cleaning.
    pub fn from_generated(raw: &str) -> Result<Self, EmptyPrompt> {
        let cleaned = raw
            .trim()
            .trim_matches(|c| matches!(c, '"' | '\'' | '\n' | '\r'))
            .trim();
        if cleaned.is_empty() {
            return Err(EmptyPrompt);
        }
        Ok(Self(cleaned.to_owned()))
    }

    /// Build the instruction sent to the text model for a memory.
    #[must_use]
    pub fn instruction_for(memory: &MemoryDescription) -> String {
        format!(
            "You are an expert therapist specializing in memory work and visual therapy. \
Create a VIVID, DETAILED English prompt for generating a therapeutic image based on this memory:
People involved: {people}
Location: {place}
Emotions felt: {emotions}
Sensory details: {details}
Create a prompt that:
- Is in ENGLISH
- Uses warm, healing colors
- Includes soft, comforting lighting
- Evokes peace and emotional wellness
- Maximum 100 words
- Focuses on the therapeutic and positive aspects
Respond ONLY with the image prompt, no explanations.",
            people = memory.people(),
            place = memory.place(),
            emotions = memory.emotions(),
            details = memory.sensory_details(),
        )
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TherapeuticPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TherapeuticPrompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_generated_strips_quotes_and_newlines() {
        let prompt = TherapeuticPrompt::from_generated("\n\"A sunlit kitchen, soft glow.\"\n\n")
            .expect("non-empty");
        assert_eq!(prompt.as_str(), "A sunlit kitchen, soft glow.");

        let prompt = TherapeuticPrompt::from_generated("'''warm dusk'''").expect("non-empty");
        assert_eq!(prompt.as_str(), "warm dusk");
    }

    #[test]
    fn test_from_generated_keeps_inner_quotes() {
        let prompt =
            TherapeuticPrompt::from_generated("a sign reading \"home\" by the door").expect("ok");
        assert_eq!(prompt.as_str(), "a sign reading \"home\" by the door");
    }

    #[test]
    fn test_from_generated_rejects_blank() {
        assert_eq!(TherapeuticPrompt::from_generated(" \"\" \n"), Err(EmptyPrompt));
    }

    #[test]
    fn test_instruction_embeds_every_field() {
        let memory =
            MemoryDescription::new("grandpa", "orchard", "wonder", "ripe apples").expect("valid");
        let instruction = TherapeuticPrompt::instruction_for(&memory);
        for value in ["grandpa", "orchard", "wonder", "ripe apples", "Maximum 100 words"] {
            assert!(instruction.contains(value), "missing {value}");
        }
    }
}
