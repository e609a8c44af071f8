use std::collections::BTreeSet;

use thiserror::Error;

use crate::intake::identity::ProcessedIds;
use crate::intake::types::{DocType, ExtractedRecord, HistoryStats};

#[derive(Debug, Error, PartialEq)]
#[error("record {0} is already in history")]
pub struct DuplicateRecord(pub String);

/// Accepted records, most recent first.
#[derive(Debug, Default, Clone)]
pub struct HistoryStore {
    records: Vec<ExtractedRecord>,
    // Mirrors the ids in `records`.
    ids: ProcessedIds,
}

impl HistoryStore {
    /// Build from persisted records, keeping the stored order. Later entries
    /// repeating an earlier id are dropped so the uniqueness invariant holds.
    pub fn from_records(records: Vec<ExtractedRecord>) -> Self {
        let mut ids = ProcessedIds::default();
        let mut kept = Vec::with_capacity(records.len());
        for r in records {
            if ids.insert(r.id.clone()) {
                kept.push(r);
            } else {
                log::warn!("Dropping duplicate history entry on load: {}", r.id);
            }
        }
        Self { records: kept, ids }
    }

    pub fn records(&self) -> &[ExtractedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn processed_ids(&self) -> &ProcessedIds {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn append(&mut self, record: ExtractedRecord) -> Result<(), DuplicateRecord> {
        if !self.ids.insert(record.id.clone()) {
            return Err(DuplicateRecord(record.id));
        }
        self.records.insert(0, record);
        Ok(())
    }

    /// Returns whether a record was removed. Unknown ids are a no-op.
    pub fn delete(&mut self, id: &str) -> bool {
        if !self.ids.remove(id) {
            return false;
        }
        self.records.retain(|r| r.id != id);
        true
    }

    pub fn stats(&self) -> HistoryStats {
        self.records.iter().fold(HistoryStats::default(), |mut acc, r| {
            acc.total += 1;
            match r.doc_type {
                DocType::Invoice => acc.invoices += 1,
                DocType::PurchaseOrder => acc.pos += 1,
                DocType::Quote => acc.quotes += 1,
                DocType::Other => {}
            }
            acc.total_value += r.amount;
            acc
        })
    }

    /// Distinct sender names, sorted.
    pub fn unique_senders(&self) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.sender_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    pub(crate) fn record(id: &str, doc_type: DocType, sender: &str, amount: f64) -> ExtractedRecord {
        ExtractedRecord {
            id: id.to_string(),
            file_name: id.split('-').next().unwrap_or(id).to_string(),
            processed_at: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            doc_type,
            sender_name: sender.to_string(),
            sender_email: format!("{}@example.com", sender.to_lowercase()),
            amount,
            currency: "INR".to_string(),
            summary: String::new(),
        }
    }

    fn ids(store: &HistoryStore) -> Vec<&str> {
        store.records().iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn append_is_most_recent_first() {
        let mut h = HistoryStore::default();
        h.append(record("a-1", DocType::Invoice, "A", 1.0)).unwrap();
        h.append(record("b-2", DocType::Invoice, "B", 1.0)).unwrap();
        h.append(record("c-3", DocType::Invoice, "C", 1.0)).unwrap();
        assert_eq!(ids(&h), vec!["c-3", "b-2", "a-1"]);
    }

    #[test]
    fn append_rejects_existing_id() {
        let mut h = HistoryStore::default();
        h.append(record("a-1", DocType::Invoice, "A", 1.0)).unwrap();
        let err = h.append(record("a-1", DocType::Quote, "Other", 99.0)).unwrap_err();
        assert_eq!(err, DuplicateRecord("a-1".into()));
        assert_eq!(h.len(), 1);
        assert_eq!(h.records()[0].doc_type, DocType::Invoice);
    }

    #[test]
    fn delete_removes_exactly_one() {
        let mut h = HistoryStore::default();
        h.append(record("a-1", DocType::Invoice, "A", 1.0)).unwrap();
        h.append(record("b-2", DocType::Quote, "B", 2.0)).unwrap();
        h.append(record("c-3", DocType::PurchaseOrder, "C", 3.0)).unwrap();

        assert!(h.delete("b-2"));
        assert_eq!(ids(&h), vec!["c-3", "a-1"]);

        assert!(!h.delete("missing-0"));
        assert_eq!(ids(&h), vec!["c-3", "a-1"]);
    }

    #[test]
    fn stats_counts_by_type_and_sums_all_amounts() {
        let mut h = HistoryStore::default();
        h.append(record("a-1", DocType::Invoice, "A", 100.0)).unwrap();
        h.append(record("b-2", DocType::Invoice, "B", 50.5)).unwrap();
        h.append(record("c-3", DocType::PurchaseOrder, "C", 10.0)).unwrap();
        h.append(record("d-4", DocType::Quote, "D", 0.0)).unwrap();
        let mut other = record("e-5", DocType::Other, "E", 7.0);
        other.currency = "USD".into();
        h.append(other).unwrap();

        let s = h.stats();
        assert_eq!(s.total, 5);
        assert_eq!((s.invoices, s.pos, s.quotes), (2, 1, 1));
        assert_eq!(s.total, s.invoices + s.pos + s.quotes + 1);
        let sum: f64 = h.records().iter().map(|r| r.amount).sum();
        assert!((s.total_value - sum).abs() < 1e-9);
        assert!((s.total_value - 167.5).abs() < 1e-9);
    }

    #[test]
    fn stats_of_empty_history() {
        assert_eq!(HistoryStore::default().stats(), HistoryStats::default());
    }

    #[test]
    fn unique_senders_sorted_and_deduplicated() {
        let mut h = HistoryStore::default();
        h.append(record("a-1", DocType::Invoice, "Zeta", 1.0)).unwrap();
        h.append(record("b-2", DocType::Invoice, "Acme", 1.0)).unwrap();
        h.append(record("c-3", DocType::Quote, "Zeta", 1.0)).unwrap();
        assert_eq!(h.unique_senders(), vec!["Acme".to_string(), "Zeta".to_string()]);
    }

    #[test]
    fn from_records_keeps_order_and_drops_repeats() {
        let h = HistoryStore::from_records(vec![
            record("b-2", DocType::Invoice, "B", 2.0),
            record("a-1", DocType::Invoice, "A", 1.0),
            record("b-2", DocType::Quote, "B2", 9.0),
        ]);
        assert_eq!(ids(&h), vec!["b-2", "a-1"]);
        assert_eq!(h.records()[0].doc_type, DocType::Invoice);
    }

    #[test]
    fn id_set_follows_every_mutation() {
        let mut h = HistoryStore::from_records(vec![
            record("b-2", DocType::Invoice, "B", 2.0),
            record("a-1", DocType::Invoice, "A", 1.0),
            record("b-2", DocType::Quote, "B2", 9.0),
        ]);
        assert_eq!(h.processed_ids().len(), 2);

        h.append(record("c-3", DocType::Quote, "C", 3.0)).unwrap();
        assert!(h.contains("c-3"));
        assert!(h.delete("a-1"));
        assert!(!h.contains("a-1"));
        assert!(h.append(record("a-1", DocType::Invoice, "A", 1.0)).is_ok());

        assert_eq!(h.processed_ids().len(), h.len());
        for r in h.records() {
            assert!(h.processed_ids().contains(&r.id));
        }
    }
}
