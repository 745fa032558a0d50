use serde::{Deserialize, Serialize};

/// Which upstream flow serves image generation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ImageGenerationMethod {
    #[default]
    Legacy,
    ImagineWsExperimental,
}

impl ImageGenerationMethod {
    /// Unknown or empty values fall back to `Legacy`.
    pub fn resolve(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "imagine_ws_experimental" => ImageGenerationMethod::ImagineWsExperimental,
            _ => ImageGenerationMethod::Legacy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageGenerationMethod::Legacy => "legacy",
            ImageGenerationMethod::ImagineWsExperimental => "imagine_ws_experimental",
        }
    }
}

/// Caller-facing representation of a generated image.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    Url,
    #[default]
    B64Json,
}

impl ResponseFormat {
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("url") {
            ResponseFormat::Url
        } else {
            ResponseFormat::B64Json
        }
    }
}
