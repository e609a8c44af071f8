use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Document classification. Closed set: the analysis capability may only answer with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    Invoice,
    PurchaseOrder,
    Quote,
    Other,
}

impl DocType {
    pub const ALL: [DocType; 4] = [DocType::Invoice, DocType::PurchaseOrder, DocType::Quote, DocType::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocType::Invoice => "INVOICE",
            DocType::PurchaseOrder => "PURCHASE_ORDER",
            DocType::Quote => "QUOTE",
            DocType::Other => "OTHER",
        }
    }

    pub fn parse(s: &str) -> Option<DocType> {
        DocType::ALL.into_iter().find(|t| t.as_str() == s)
    }
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded file before analysis.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Normalized analysis output. Carries no identity: `id` and `processedAt` are
/// assigned when the document is accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFields {
    pub doc_type: DocType,
    pub sender_name: String,
    pub sender_email: String,
    pub amount: f64,
    pub currency: String,
    pub summary: String,
}

/// One accepted document as stored in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedRecord {
    pub id: String,
    pub file_name: String,
    pub processed_at: DateTime<Utc>,
    #[serde(rename = "type")]
    pub doc_type: DocType,
    pub sender_name: String,
    pub sender_email: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub summary: String,
}

impl ExtractedRecord {
    pub fn from_fields(id: String, file_name: String, processed_at: DateTime<Utc>, fields: ExtractedFields) -> Self {
        Self {
            id,
            file_name,
            processed_at,
            doc_type: fields.doc_type,
            sender_name: fields.sender_name,
            sender_email: fields.sender_email,
            amount: fields.amount,
            currency: fields.currency,
            summary: fields.summary,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total: usize,
    pub invoices: usize,
    pub pos: usize,
    pub quotes: usize,
    // Summed across currencies as-is; no conversion is applied.
    pub total_value: f64,
}
