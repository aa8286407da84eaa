use std::sync::Arc;

use tracing::debug;

use crate::llm::{Provider, ProviderError};
use crate::model::AppAnalysis;
use crate::schema::{self, ValidationError};

/// The ways turning a store URL into an [`AppAnalysis`] can fail.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("store URL is empty")]
    EmptyUrl,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("provider returned an empty response")]
    EmptyResponse,

    #[error("no JSON object found in provider response")]
    JsonNotFound,

    #[error("provider JSON could not be parsed: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("provider JSON failed validation: {0}")]
    Validation(#[from] ValidationError),
}

impl AnalysisError {
    /// Short stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::EmptyUrl => "empty_url",
            AnalysisError::Provider(_) => "transport",
            AnalysisError::EmptyResponse => "empty_response",
            AnalysisError::JsonNotFound => "json_not_found",
            AnalysisError::Parse(_) => "parse",
            AnalysisError::Validation(_) => "validation",
        }
    }
}

pub fn build_prompt(url: &str) -> String {
    let mut result = String::with_capacity(url.len() + 2000);
    result.push_str(
        "You are a cybersecurity expert advising public officials. Your task is to assess \
         the security and trustworthiness of a mobile application from its store link.\n\n",
    );
    result.push_str("Application link: ");
    result.push_str(url);
    result.push_str(
        "\n\nUse web search to find:\n\
         1. The exact name of the application.\n\
         2. The country of origin of the developer or company.\n\
         3. The majority shareholders or parent company (e.g. Tencent, Meta).\n\
         4. Recent privacy or security incidents, if any.\n\
         5. Its general reputation.\n\n\
         Assign a trust score out of 20:\n\
         - 18-20: Very safe (open source, audited, EU based, etc.)\n\
         - 14-17: Safe (large mainstream company)\n\
         - 10-13: Caution (aggressive data collection, advertising)\n\
         - 0-9: Dangerous (malware, spyware, opaque or doubtful origin)\n\n\
         IMPORTANT: answer ONLY with a single valid JSON object, without surrounding text \
         if possible, otherwise inside one code block.\n\n\
         Expected JSON structure:\n\
         {\n\
         \x20 \"appName\": \"Application name\",\n\
         \x20 \"score\": 15,\n\
         \x20 \"riskLevel\": \"SAFE\" | \"MODERATE\" | \"HIGH\" | \"CRITICAL\",\n\
         \x20 \"countryOfOrigin\": \"Country\",\n\
         \x20 \"shareholders\": [\"Shareholder 1\", \"Shareholder 2\"],\n\
         \x20 \"positivePoints\": [\"Positive point 1\", \"Positive point 2\"],\n\
         \x20 \"negativePoints\": [\"Negative point 1\", \"Negative point 2\"],\n\
         \x20 \"summary\": \"A short summary (two sentences at most).\"\n\
         }\n",
    );
    result
}

/// Returns the first balanced `{...}` span of `text`.
///
/// Braces inside JSON string literals do not count. An opening brace that
/// never closes is skipped and the search resumes at the next one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let mut from = 0;
    while let Some(found) = text[from..].find('{') {
        let start = from + found;
        if let Some(len) = balanced_len(&text[start..]) {
            return Some(&text[start..start + len]);
        }
        from = start + 1;
    }
    None
}

/// Byte length of the object opening at the start of `text`, if it closes.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Turns raw provider text into a validated analysis.
pub fn parse_analysis(text: &str) -> Result<AppAnalysis, AnalysisError> {
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let candidate = extract_json_object(text).ok_or(AnalysisError::JsonNotFound)?;
    let raw: serde_json::Value = serde_json::from_str(candidate)?;
    Ok(schema::validate(&raw)?)
}

/// Adapter between a store URL and the external analysis provider.
#[derive(Clone)]
pub struct AppAnalyzer {
    provider: Arc<dyn Provider>,
}

impl AppAnalyzer {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub async fn analyze(&self, url: &str) -> Result<AppAnalysis, AnalysisError> {
        if url.trim().is_empty() {
            return Err(AnalysisError::EmptyUrl);
        }

        let prompt = build_prompt(url);
        debug!(provider = self.provider.name(), prompt_len = prompt.len(), "sending analysis prompt");

        let text = self.provider.generate(&prompt).await?;
        debug!(response_len = text.len(), "provider responded");

        parse_analysis(&text)
    }
}
