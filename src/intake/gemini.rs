// gemini.rs — Gemini `generateContent` client for document analysis.
//
// The artifact is sent inline (base64) together with a response schema, so the model answers
// with a single JSON object that `analysis::parse_analysis` validates.

use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config;
use crate::intake::analysis::{parse_analysis, AnalysisError, DocumentAnalyzer};
use crate::intake::types::{DocType, ExtractedFields};

pub struct GeminiAnalyzer {
    api_key: Option<String>,
    base_url: String,
    model: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl GeminiAnalyzer {
    pub fn new(api_key: Option<String>, base_url: &str, model: &str, timeout_secs: u64) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        Self {
            api_key: api_key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty()),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout_secs,
            agent,
        }
    }

    /// Client for the public endpoint (or `INVOICEEX_GEMINI_BASE_URL` when set).
    pub fn from_env(explicit_key: Option<&str>) -> Self {
        Self::with_key(resolve_api_key(explicit_key))
    }

    /// Same endpoint resolution as `from_env`, but the key is taken as given.
    pub fn with_key(api_key: Option<String>) -> Self {
        let base_url = std::env::var(config::analysis::BASE_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| config::analysis::DEFAULT_BASE_URL.to_string());
        Self::new(
            api_key,
            &base_url,
            config::analysis::MODEL,
            config::analysis::REQUEST_TIMEOUT_SECS,
        )
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }
}

/// Explicit key first, then the environment.
pub fn resolve_api_key(explicit: Option<&str>) -> Option<String> {
    if let Some(k) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(k.to_string());
    }
    config::analysis::API_KEY_ENVS
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|v| v.trim().to_string())
        .find(|v| !v.is_empty())
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase", rename_all_fields = "camelCase")]
enum Part<'a> {
    InlineData { mime_type: &'a str, data: String },
    Text(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

fn response_schema() -> Value {
    let types: Vec<&str> = DocType::ALL.iter().map(DocType::as_str).collect();
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "documentType": {
                "type": "STRING",
                "enum": types,
                "description": "The classification of the document."
            },
            "senderName": {
                "type": "STRING",
                "description": "The name of the company or person sending the document."
            },
            "senderEmail": {
                "type": "STRING",
                "description": "The email address found in the document header or contact info. If not found, infer from sender name or leave empty."
            },
            "totalAmount": {
                "type": "NUMBER",
                "description": "The final total value of the document in numbers only."
            },
            "currency": {
                "type": "STRING",
                "description": "The currency code (e.g., INR, USD). Default to INR if symbol is \u{20b9}."
            },
            "summary": {
                "type": "STRING",
                "description": "A very brief 10-word summary of what this document is for."
            }
        },
        "required": ["documentType", "senderName", "totalAmount", "currency"]
    })
}

fn instruction(file_name: &str) -> String {
    format!(
        "Analyze this document (File name: {file_name}).\n\
         Identify if it is an Invoice, Purchase Order, or Quote.\n\
         Extract the Sender Name, Sender Email, and the Total Amount.\n\
         If the value is in Rupees, ensure currency is INR."
    )
}

fn build_request<'a>(bytes: &[u8], mime_type: &'a str, file_name: &str) -> GenerateRequest<'a> {
    GenerateRequest {
        system_instruction: Content {
            parts: vec![Part::Text(config::analysis::SYSTEM_INSTRUCTION.to_string())],
        },
        contents: vec![Content {
            parts: vec![
                Part::InlineData {
                    mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(bytes),
                },
                Part::Text(instruction(file_name)),
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: response_schema(),
        },
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(body: &str) -> Result<String, AnalysisError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| AnalysisError::JsonParsing(e.to_string()))?;
    let text: String = parsed
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }
    Ok(text)
}

fn is_timeout(t: &ureq::Transport) -> bool {
    let mut source = std::error::Error::source(t);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(io.kind(), std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

fn preview(s: &str) -> String {
    s.chars().take(config::analysis::ERROR_BODY_PREVIEW_CHARS).collect()
}

impl DocumentAnalyzer for GeminiAnalyzer {
    fn analyze(&self, bytes: &[u8], mime_type: &str, file_name: &str) -> Result<ExtractedFields, AnalysisError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Err(AnalysisError::MissingCredential);
        };

        let body = serde_json::to_string(&build_request(bytes, mime_type, file_name))
            .map_err(|e| AnalysisError::Transport(format!("failed serializing request: {e}")))?;

        log::info!(
            "Analyzing {} ({} bytes, {}) with {}",
            file_name,
            bytes.len(),
            mime_type,
            self.model
        );

        let resp = self
            .agent
            .post(&self.endpoint())
            .set("x-goog-api-key", api_key)
            .set("Content-Type", "application/json")
            .send_string(&body);

        let resp = match resp {
            Ok(r) => r,
            Err(ureq::Error::Status(status, r)) => {
                let body = r.into_string().unwrap_or_default();
                return Err(AnalysisError::Status { status, body: preview(&body) });
            }
            Err(ureq::Error::Transport(t)) => {
                if is_timeout(&t) {
                    return Err(AnalysisError::Timeout(self.timeout_secs));
                }
                return Err(AnalysisError::Transport(t.to_string()));
            }
        };

        let text = resp
            .into_string()
            .map_err(|e| AnalysisError::Transport(format!("failed reading response body: {e}")))?;
        let fields = parse_analysis(&candidate_text(&text)?)?;

        log::info!(
            "Analysis result for {}: {} from {} <{}>, {} {}",
            file_name,
            fields.doc_type,
            fields.sender_name,
            fields.sender_email,
            fields.amount,
            fields.currency
        );
        Ok(fields)
    }

    fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }
}
