//! Request and response bodies for `models/{model}:generateContent`.

use serde::{Deserialize, Serialize};

/// Request body: a single user turn with one text part.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub contents: Vec<Content>,
}

impl GenerateRequest {
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: text.into() }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

/// Response body. Only the first candidate's first part is read.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate, if non-blank.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
            .map(|p| p.text.as_str())
            .filter(|t| !t.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let json = serde_json::to_value(GenerateRequest::from_text("Say 'OK'")).expect("json");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Say 'OK'");
    }

    #[test]
    fn test_first_text() {
        let response: GenerateResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"warm light"},{"text":"ignored"}],"role":"model"}}]}"#,
        )
        .expect("parse");
        assert_eq!(response.first_text(), Some("warm light"));
    }

    #[test]
    fn test_first_text_missing_or_blank() {
        let empty: GenerateResponse = serde_json::from_str("{}").expect("parse");
        assert_eq!(empty.first_text(), None);

        let blocked: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#).expect("parse");
        assert_eq!(blocked.first_text(), None);

        let blank: GenerateResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"  "}]}}]}"#)
                .expect("parse");
        assert_eq!(blank.first_text(), None);
    }
}
