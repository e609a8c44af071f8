// session.rs — Ingestion entry point and the accessors exposed to the extension.
//
// The session owns configuration and history outright and receives persistence, analysis and
// delivery as explicit dependencies. Every mutation goes through `&mut self`, so the
// dedup check and the append it guards cannot interleave with another ingestion.

use chrono::Utc;
use serde::Serialize;

use crate::config;
use crate::delivery::ArtifactSink;
use crate::intake::analysis::{AnalysisError, DocumentAnalyzer};
use crate::intake::export::{project, render_xlsx};
use crate::intake::filter::{accepts, Acceptance, FilterReason, QuerySpec};
use crate::intake::history::HistoryStore;
use crate::intake::identity::{compute_id, is_duplicate, ProcessedIds};
use crate::intake::settings::{Configuration, Setting};
use crate::intake::types::{Artifact, ExtractedRecord, HistoryStats};
use crate::storage::KvStore;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IngestOutcome {
    Accepted {
        record: ExtractedRecord,
        auto_downloaded: bool,
        message: String,
    },
    Duplicate {
        id: String,
        message: String,
    },
    FilteredOut {
        reason: FilterReason,
        message: String,
    },
    MissingCredential {
        message: String,
    },
    AnalysisFailed {
        error: String,
        message: String,
    },
}

impl IngestOutcome {
    fn duplicate(id: String, file_name: &str) -> Self {
        IngestOutcome::Duplicate {
            id,
            message: format!("File \"{file_name}\" has already been processed."),
        }
    }
}

pub struct ExportArtifact {
    pub file_name: &'static str,
    pub rows: usize,
    pub bytes: Vec<u8>,
}

pub struct IntakeSession {
    config: Configuration,
    history: HistoryStore,
    store: KvStore,
    analyzer: Box<dyn DocumentAnalyzer>,
    sink: Box<dyn ArtifactSink>,
}

impl IntakeSession {
    /// Load configuration and history from `store`, writing first-run defaults for absent keys.
    pub fn load(store: KvStore, analyzer: Box<dyn DocumentAnalyzer>, sink: Box<dyn ArtifactSink>) -> anyhow::Result<Self> {
        let (config, fresh_config) = match store.load_json::<Configuration>(config::storage::CONFIG_KEY)? {
            Some(c) => (c, false),
            None => (Configuration::default(), true),
        };
        let (history, fresh_history) = match store.load_json::<Vec<ExtractedRecord>>(config::storage::HISTORY_KEY)? {
            Some(records) => (HistoryStore::from_records(records), false),
            None => (HistoryStore::default(), true),
        };

        if history.is_empty() {
            log::info!("No stored history");
        }
        log::info!(
            "Intake session loaded: {} records, {} target emails",
            history.len(),
            config.target_emails.len()
        );

        let session = Self { config, history, store, analyzer, sink };
        if fresh_config {
            session.persist_config();
        }
        if fresh_history {
            session.persist_history();
        }
        Ok(session)
    }

    pub fn store(&self) -> &KvStore {
        &self.store
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn history(&self) -> &[ExtractedRecord] {
        self.history.records()
    }

    pub fn stats(&self) -> HistoryStats {
        self.history.stats()
    }

    pub fn senders(&self) -> Vec<String> {
        self.history.unique_senders()
    }

    pub fn processed_ids(&self) -> &ProcessedIds {
        self.history.processed_ids()
    }

    pub fn query(&self, query: &QuerySpec) -> Vec<ExtractedRecord> {
        query.apply(self.history.records())
    }

    pub fn has_credential(&self) -> bool {
        self.analyzer.has_credential()
    }

    pub fn set_analyzer(&mut self, analyzer: Box<dyn DocumentAnalyzer>) {
        self.analyzer = analyzer;
    }

    /// Run one artifact through dedup, analysis and the acceptance filter.
    pub fn ingest(&mut self, artifact: Artifact) -> IngestOutcome {
        if !self.config.gmail_sync_enabled {
            log::warn!("Gmail sync is disabled, but manual upload is permitted.");
        }

        let id = compute_id(&artifact.file_name, artifact.bytes.len());
        let processed = self.processed_ids();
        if is_duplicate(&id, processed) {
            log::info!("Skipping already processed artifact {} ({} known)", id, processed.len());
            return IngestOutcome::duplicate(id, &artifact.file_name);
        }

        let fields = match self
            .analyzer
            .analyze(&artifact.bytes, &artifact.mime_type, &artifact.file_name)
        {
            Ok(f) => f,
            Err(AnalysisError::MissingCredential) => {
                log::warn!("Analysis skipped for {}: API key is missing", artifact.file_name);
                return IngestOutcome::MissingCredential {
                    message: "API key is missing. Configure a Gemini API key to analyze documents.".to_string(),
                };
            }
            Err(e) => {
                log::error!("Analysis failed for {}: {}", artifact.file_name, e);
                return IngestOutcome::AnalysisFailed {
                    error: e.to_string(),
                    message: "Error processing file with Gemini.".to_string(),
                };
            }
        };

        if let Acceptance::Reject(reason) = accepts(&fields, &self.config) {
            log::info!(
                "Filtered {} ({} from {}): {:?}",
                artifact.file_name,
                fields.doc_type,
                fields.sender_email,
                reason
            );
            return IngestOutcome::FilteredOut {
                reason,
                message: "Document skipped based on configuration filters (Type or Sender).".to_string(),
            };
        }

        let record = ExtractedRecord::from_fields(id, artifact.file_name.clone(), Utc::now(), fields);
        if let Err(e) = self.history.append(record.clone()) {
            log::warn!("Rejected at append: {}", e);
            return IngestOutcome::duplicate(record.id, &artifact.file_name);
        }
        self.persist_history();
        log::info!("Accepted {} as {} ({} {})", record.id, record.doc_type, record.amount, record.currency);

        let mut message = "Document processed successfully.".to_string();
        let auto_downloaded = self.config.auto_download;
        if auto_downloaded {
            self.sink.deliver(&artifact.file_name, &artifact.bytes);
            message.push_str(" Auto-downloaded to disk.");
        }

        IngestOutcome::Accepted { record, auto_downloaded, message }
    }

    /// Remove a record. Unknown ids are a no-op and return false.
    pub fn delete(&mut self, id: &str) -> bool {
        let removed = self.history.delete(id);
        if removed {
            log::info!("Deleted history record {}", id);
            self.persist_history();
        } else {
            log::debug!("Delete ignored, no record {}", id);
        }
        removed
    }

    /// Render the selection as a workbook and hand it to the delivery sink.
    pub fn export(&self, query: &QuerySpec) -> anyhow::Result<ExportArtifact> {
        let records = self.query(query);
        let bytes = render_xlsx(&project(&records))?;
        log::info!("Exporting {} of {} records ({} bytes)", records.len(), self.history.len(), bytes.len());
        self.sink.deliver(config::export::FILE_NAME, &bytes);
        Ok(ExportArtifact {
            file_name: config::export::FILE_NAME,
            rows: records.len(),
            bytes,
        })
    }

    pub fn toggle(&mut self, setting: Setting) -> bool {
        let value = self.config.toggle(setting);
        log::info!("Setting {:?} -> {}", setting, value);
        self.persist_config();
        value
    }

    pub fn add_target_email(&mut self, email: &str) -> bool {
        let added = self.config.add_target_email(email);
        if added {
            self.persist_config();
        }
        added
    }

    pub fn remove_target_email(&mut self, email: &str) -> bool {
        let removed = self.config.remove_target_email(email);
        if removed {
            self.persist_config();
        }
        removed
    }

    // Write-through failures are logged; in-memory state stays authoritative for this session.
    fn persist_config(&self) {
        if let Err(e) = self.store.save_json(config::storage::CONFIG_KEY, &self.config) {
            log::error!("Failed to persist configuration: {:?}", e);
        }
    }

    fn persist_history(&self) {
        if let Err(e) = self.store.save_json(config::storage::HISTORY_KEY, self.history.records()) {
            log::error!("Failed to persist history: {:?}", e);
        }
    }
}
