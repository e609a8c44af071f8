use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::config;
use crate::intake::types::{DocType, ExtractedFields};

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("API key is missing")]
    MissingCredential,

    #[error("Analysis service unreachable: {0}")]
    Transport(String),

    #[error("Analysis request timed out after {0}s")]
    Timeout(u64),

    #[error("Analysis service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Analysis service returned no content")]
    EmptyResponse,

    #[error("Analysis response is not valid JSON: {0}")]
    JsonParsing(String),

    #[error("Analysis response violates schema: {0}")]
    Schema(String),
}

/// External document classification + field extraction capability.
pub trait DocumentAnalyzer {
    fn analyze(&self, bytes: &[u8], mime_type: &str, file_name: &str) -> Result<ExtractedFields, AnalysisError>;

    /// Whether a credential is configured. Does not prove it is valid.
    fn has_credential(&self) -> bool;
}

/// Payload shape returned by the capability, before validation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    document_type: Option<String>,
    sender_name: Option<String>,
    sender_email: Option<String>,
    total_amount: Option<Value>,
    currency: Option<String>,
    summary: Option<String>,
}

/// Validate the capability's JSON text and normalize it into `ExtractedFields`.
pub fn parse_analysis(text: &str) -> Result<ExtractedFields, AnalysisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::EmptyResponse);
    }

    let value: Value = serde_json::from_str(text).map_err(|e| AnalysisError::JsonParsing(e.to_string()))?;
    if !value.is_object() {
        return Err(AnalysisError::Schema("expected a JSON object".into()));
    }
    let raw: RawAnalysis = serde_json::from_value(value).map_err(|e| AnalysisError::Schema(e.to_string()))?;

    let doc_type = match raw.document_type.as_deref().map(str::trim) {
        Some(s) => DocType::parse(s).ok_or_else(|| AnalysisError::Schema(format!("unknown documentType '{s}'")))?,
        None => return Err(AnalysisError::Schema("missing documentType".into())),
    };

    let amount = match raw.total_amount {
        None | Some(Value::Null) => 0.0,
        Some(Value::Number(n)) => n
            .as_f64()
            .ok_or_else(|| AnalysisError::Schema(format!("totalAmount out of range: {n}")))?,
        Some(other) => return Err(AnalysisError::Schema(format!("totalAmount is not a number: {other}"))),
    };
    if !amount.is_finite() || amount < 0.0 {
        return Err(AnalysisError::Schema(format!("totalAmount must be non-negative, got {amount}")));
    }

    Ok(ExtractedFields {
        doc_type,
        sender_name: or_default(raw.sender_name, config::intake::UNKNOWN_SENDER),
        sender_email: or_default(raw.sender_email, config::intake::UNKNOWN_SENDER),
        amount,
        currency: or_default(raw.currency, config::intake::DEFAULT_CURRENCY),
        summary: raw.summary.map(|s| s.trim().to_string()).unwrap_or_default(),
    })
}

fn or_default(v: Option<String>, default: &str) -> String {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}
