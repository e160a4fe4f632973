//! Image backends and generated image references.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Error for an unrecognised backend selector.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown image backend: {0}")]
pub struct UnknownBackend(pub String);

/// The image-generation service picked by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ImageBackend {
    /// Hugging Face inference; tries several models in order.
    #[default]
    HuggingFace,
    /// `DeepAI` text2img.
    DeepAi,
    /// `OpenAI` images, paid with the caller's own API key.
    OpenAi,
}

impl ImageBackend {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HuggingFace => "huggingface",
            Self::DeepAi => "deepai",
            Self::OpenAi => "openai",
        }
    }

    /// Whether the caller must supply a credential for this backend.
    #[must_use]
    pub const fn requires_credential(self) -> bool {
        matches!(self, Self::OpenAi)
    }
}

impl std::fmt::Display for ImageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ImageBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "huggingface" => Ok(Self::HuggingFace),
            "deepai" => Ok(Self::DeepAi),
            "openai" => Ok(Self::OpenAi),
            _ => Err(UnknownBackend(s.to_owned())),
        }
    }
}

/// Where the generated image can be fetched from.
#[derive(Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Raw image bytes returned by the backend.
    Inline { content_type: String, bytes: Vec<u8> },
    /// A URL hosted by the backend.
    Remote(String),
}

impl ImageSource {
    /// A URL the page can put in an `<img src>`.
    ///
    /// Inline images become `data:` URLs.
    #[must_use]
    pub fn display_url(&self) -> String {
        match self {
            Self::Inline {
                content_type,
                bytes,
            } => format!("data:{content_type};base64,{}", STANDARD.encode(bytes)),
            Self::Remote(url) => url.clone(),
        }
    }
}

impl std::fmt::Debug for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline {
                content_type,
                bytes,
            } => f
                .debug_struct("Inline")
                .field("content_type", content_type)
                .field("len", &bytes.len())
                .finish(),
            Self::Remote(url) => f.debug_tuple("Remote").field(url).finish(),
        }
    }
}

/// A generated image and the backend/model that produced it.
///
/// Lives only for the response that carries it; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub source: ImageSource,
    pub backend: ImageBackend,
    pub model: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_names() {
        for backend in [ImageBackend::HuggingFace, ImageBackend::DeepAi, ImageBackend::OpenAi] {
            assert_eq!(backend.as_str().parse::<ImageBackend>(), Ok(backend));
        }
        assert!("midjourney".parse::<ImageBackend>().is_err());
    }

    #[test]
    fn test_only_openai_needs_credential() {
        assert!(ImageBackend::OpenAi.requires_credential());
        assert!(!ImageBackend::HuggingFace.requires_credential());
        assert!(!ImageBackend::DeepAi.requires_credential());
    }

    #[test]
    fn test_inline_display_url_is_data_url() {
        let source = ImageSource::Inline {
            content_type: "image/png".to_owned(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(source.display_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_debug_omits_bytes() {
        let source = ImageSource::Inline {
            content_type: "image/jpeg".to_owned(),
            bytes: vec![0; 4096],
        };
        assert!(format!("{source:?}").contains("len: 4096"));
    }
}
