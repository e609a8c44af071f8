// filter.rs — Two unrelated filters that happen to share a name:
//
// 1. Acceptance: applied once at ingestion, decides whether an analyzed document enters history.
// 2. Query: applied at display/export time over history, never mutates it.

use anyhow::{bail, Context};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::intake::settings::Configuration;
use crate::intake::types::{DocType, ExtractedFields, ExtractedRecord};

const ALL: &str = "ALL";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterReason {
    TypeDisabled,
    SenderNotTargeted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    Accept,
    Reject(FilterReason),
}

pub fn type_allowed(doc_type: DocType, config: &Configuration) -> bool {
    // No flag covers OTHER.
    match doc_type {
        DocType::Invoice => config.process_invoices,
        DocType::PurchaseOrder => config.process_pos,
        DocType::Quote => config.process_quotes,
        DocType::Other => false,
    }
}

/// Case-insensitive substring match against the target list. Substring, not
/// equality: target "acme.com" admits both "billing@acme.com" and "ops@billing.acme.com".
pub fn sender_allowed(sender_email: &str, config: &Configuration) -> bool {
    if config.target_emails.is_empty() {
        return true;
    }
    let sender = sender_email.to_lowercase();
    config
        .target_emails
        .iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .any(|t| sender.contains(&t))
}

pub fn accepts(fields: &ExtractedFields, config: &Configuration) -> Acceptance {
    if !type_allowed(fields.doc_type, config) {
        return Acceptance::Reject(FilterReason::TypeDisabled);
    }
    if !sender_allowed(&fields.sender_email, config) {
        return Acceptance::Reject(FilterReason::SenderNotTargeted);
    }
    Acceptance::Accept
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TypeFilter {
    #[default]
    All,
    Only(DocType),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SenderFilter {
    #[default]
    All,
    Named(String),
}

/// History view selection. The default value selects everything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySpec {
    pub doc_type: TypeFilter,
    pub sender: SenderFilter,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl QuerySpec {
    /// Parse `{type, sender, startDate, endDate}`. Absent, empty or "ALL" means unconstrained.
    pub fn from_params(params: &Value) -> anyhow::Result<QuerySpec> {
        let doc_type = match constraint(params, "type")? {
            None => TypeFilter::All,
            Some(s) => {
                let s = s.trim();
                TypeFilter::Only(DocType::parse(s).with_context(|| format!("Unknown document type filter: {s}"))?)
            }
        };
        // Sender names are compared verbatim, so the raw value is kept.
        let sender = match constraint(params, "sender")? {
            None => SenderFilter::All,
            Some(s) => SenderFilter::Named(s.to_string()),
        };
        let start_date = parse_date(params, "startDate")?;
        let end_date = parse_date(params, "endDate")?;

        Ok(QuerySpec { doc_type, sender, start_date, end_date })
    }

    /// True when nothing is constrained.
    pub fn is_identity(&self) -> bool {
        *self == QuerySpec::default()
    }

    pub fn matches(&self, record: &ExtractedRecord) -> bool {
        let type_ok = match &self.doc_type {
            TypeFilter::All => true,
            TypeFilter::Only(t) => record.doc_type == *t,
        };
        let sender_ok = match &self.sender {
            SenderFilter::All => true,
            SenderFilter::Named(name) => record.sender_name == *name,
        };
        let start_ok = self
            .start_date
            .map(|d| record.processed_at >= day_start(d))
            .unwrap_or(true);
        let end_ok = self
            .end_date
            .map(|d| record.processed_at <= day_end(d))
            .unwrap_or(true);

        type_ok && sender_ok && start_ok && end_ok
    }

    /// Matching records in their stored order.
    pub fn apply(&self, records: &[ExtractedRecord]) -> Vec<ExtractedRecord> {
        records.iter().filter(|r| self.matches(r)).cloned().collect()
    }
}

/// Raw string value of `key`. Absent, null, blank and "ALL" mean unconstrained;
/// any other non-string value is an error.
fn constraint<'a>(params: &'a Value, key: &str) -> anyhow::Result<Option<&'a str>> {
    let s = match params.get(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s.as_str(),
        Some(other) => bail!("Invalid {key} (expected a string): {other}"),
    };
    match s.trim() {
        "" | ALL => Ok(None),
        _ => Ok(Some(s)),
    }
}

fn parse_date(params: &Value, key: &str) -> anyhow::Result<Option<NaiveDate>> {
    let Some(raw) = constraint(params, key)? else {
        return Ok(None);
    };
    let raw = raw.trim();
    match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        Ok(d) => Ok(Some(d)),
        Err(_) => bail!("Invalid {key} (expected YYYY-MM-DD): '{raw}'"),
    }
}

/// Local midnight of `d`.
pub fn day_start(d: NaiveDate) -> DateTime<Utc> {
    let naive = d.and_time(NaiveTime::MIN);
    local_to_utc(naive, true)
}

/// Last local millisecond of `d`.
pub fn day_end(d: NaiveDate) -> DateTime<Utc> {
    let naive = d
        .and_hms_milli_opt(23, 59, 59, 999)
        .unwrap_or_else(|| d.and_time(NaiveTime::MIN));
    local_to_utc(naive, false)
}

fn local_to_utc(naive: NaiveDateTime, earliest: bool) -> DateTime<Utc> {
    let mapped = Local.from_local_datetime(&naive);
    let picked = if earliest { mapped.earliest() } else { mapped.latest() };
    match picked {
        Some(t) => t.with_timezone(&Utc),
        // Inside a DST gap: the wall-clock time never happened locally.
        None => naive.and_utc(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::intake::history::tests::record;

    fn fields(doc_type: DocType, email: &str) -> ExtractedFields {
        ExtractedFields {
            doc_type,
            sender_name: "Acme".into(),
            sender_email: email.into(),
            amount: 1200.0,
            currency: "INR".into(),
            summary: String::new(),
        }
    }

    fn all_flag_combinations() -> Vec<Configuration> {
        let mut out = vec![];
        for bits in 0..8u8 {
            out.push(Configuration {
                process_invoices: bits & 1 != 0,
                process_pos: bits & 2 != 0,
                process_quotes: bits & 4 != 0,
                ..Configuration::default()
            });
        }
        out
    }

    #[test]
    fn other_is_never_accepted() {
        for config in all_flag_combinations() {
            assert_eq!(
                accepts(&fields(DocType::Other, "x@y.com"), &config),
                Acceptance::Reject(FilterReason::TypeDisabled)
            );
        }
    }

    #[test]
    fn each_flag_gates_its_own_type() {
        for config in all_flag_combinations() {
            assert_eq!(type_allowed(DocType::Invoice, &config), config.process_invoices);
            assert_eq!(type_allowed(DocType::PurchaseOrder, &config), config.process_pos);
            assert_eq!(type_allowed(DocType::Quote, &config), config.process_quotes);
        }
    }

    #[test]
    fn empty_target_list_allows_any_sender() {
        let config = Configuration::default();
        for email in ["a@b.com", "Unknown", ""] {
            assert_eq!(accepts(&fields(DocType::Invoice, email), &config), Acceptance::Accept);
        }
    }

    #[test]
    fn sender_match_is_case_insensitive_substring() {
        let config = Configuration {
            target_emails: vec!["Billing@Acme.com".into(), "zeta.io".into()],
            ..Configuration::default()
        };
        assert!(sender_allowed("billing@acme.com", &config));
        assert!(sender_allowed("BILLING@ACME.COM", &config));
        assert!(sender_allowed("finance@zeta.io", &config));
        assert!(!sender_allowed("billing@acme.org", &config));
        assert!(!sender_allowed("Unknown", &config));
        assert_eq!(
            accepts(&fields(DocType::Quote, "nobody@else.com"), &config),
            Acceptance::Reject(FilterReason::SenderNotTargeted)
        );
    }

    #[test]
    fn blank_targets_do_not_match_everything() {
        let config = Configuration {
            target_emails: vec!["  ".into()],
            ..Configuration::default()
        };
        assert!(!sender_allowed("anyone@anywhere.com", &config));
    }

    #[test]
    fn scenario_invoice_from_targeted_sender() {
        let config = Configuration {
            target_emails: vec!["billing@acme.com".into()],
            process_invoices: true,
            process_pos: false,
            process_quotes: false,
            ..Configuration::default()
        };
        // Contains the target verbatim once lower-cased.
        assert_eq!(
            accepts(&fields(DocType::Invoice, "Accounts.BILLING@acme.com"), &config),
            Acceptance::Accept
        );
        assert_eq!(
            accepts(&fields(DocType::PurchaseOrder, "billing@acme.com"), &config),
            Acceptance::Reject(FilterReason::TypeDisabled)
        );
    }

    fn dated(id: &str, doc_type: DocType, sender: &str, y: i32, m: u32, d: u32, h: u32) -> ExtractedRecord {
        let mut r = record(id, doc_type, sender, 1.0);
        r.processed_at = Local.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap().with_timezone(&Utc);
        r
    }

    fn sample() -> Vec<ExtractedRecord> {
        vec![
            dated("e-5", DocType::Other, "Acme", 2025, 1, 20, 9),
            dated("d-4", DocType::Invoice, "Zeta", 2025, 1, 12, 23),
            dated("c-3", DocType::Quote, "Acme", 2025, 1, 10, 0),
            dated("b-2", DocType::Invoice, "Acme", 2025, 1, 9, 23),
            dated("a-1", DocType::PurchaseOrder, "Zeta", 2025, 1, 1, 8),
        ]
    }

    fn ids(rs: &[ExtractedRecord]) -> Vec<&str> {
        rs.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn identity_query_returns_everything_in_order() {
        let records = sample();
        let query = QuerySpec::from_params(&json!({"type": "ALL", "sender": "ALL", "startDate": "", "endDate": ""})).unwrap();
        assert!(query.is_identity());
        assert_eq!(query.apply(&records), records);
        assert!(QuerySpec::from_params(&json!({})).unwrap().is_identity());
    }

    #[test]
    fn type_and_sender_match_exactly() {
        let records = sample();
        let query = QuerySpec::from_params(&json!({"type": "INVOICE", "sender": "Acme"})).unwrap();
        assert!(!query.is_identity());
        assert_eq!(ids(&query.apply(&records)), vec!["b-2"]);

        let query = QuerySpec::from_params(&json!({"type": "OTHER"})).unwrap();
        assert_eq!(ids(&query.apply(&records)), vec!["e-5"]);

        let query = QuerySpec::from_params(&json!({"sender": "acme"})).unwrap();
        assert!(query.apply(&records).is_empty());
    }

    #[test]
    fn date_bounds_cover_whole_local_days() {
        let records = sample();
        let query = QuerySpec::from_params(&json!({"startDate": "2025-01-10", "endDate": "2025-01-12"})).unwrap();
        assert_eq!(ids(&query.apply(&records)), vec!["d-4", "c-3"]);

        let open_end = QuerySpec::from_params(&json!({"startDate": "2025-01-12"})).unwrap();
        assert_eq!(ids(&open_end.apply(&records)), vec!["e-5", "d-4"]);

        let open_start = QuerySpec::from_params(&json!({"endDate": "2025-01-09"})).unwrap();
        assert_eq!(ids(&open_start.apply(&records)), vec!["b-2", "a-1"]);
    }

    #[test]
    fn query_is_repeatable_and_non_mutating() {
        let records = sample();
        let before = records.clone();
        let query = QuerySpec::from_params(&json!({"type": "INVOICE", "startDate": "2025-01-05"})).unwrap();
        let first = query.apply(&records);
        let second = query.apply(&records);
        assert_eq!(first, second);
        assert_eq!(records, before);
    }

    #[test]
    fn bad_params_are_rejected() {
        assert!(QuerySpec::from_params(&json!({"type": "RECEIPT"})).is_err());
        assert!(QuerySpec::from_params(&json!({"startDate": "01/02/2025"})).is_err());
    }

    #[test]
    fn non_string_params_are_rejected() {
        for params in [
            json!({"type": 5}),
            json!({"sender": ["Acme"]}),
            json!({"startDate": 20250101}),
            json!({"endDate": true}),
        ] {
            assert!(QuerySpec::from_params(&params).is_err(), "accepted: {params}");
        }
        assert!(QuerySpec::from_params(&json!({"type": null, "sender": null})).unwrap().is_identity());
    }

    #[test]
    fn listed_senders_select_their_records_verbatim() {
        let mut history = crate::intake::history::HistoryStore::default();
        history.append(record("a-1", DocType::Invoice, " Acme Corp ", 1.0)).unwrap();
        history.append(record("b-2", DocType::Quote, "Zeta", 2.0)).unwrap();

        let senders = history.unique_senders();
        assert_eq!(senders[0], " Acme Corp ");
        let query = QuerySpec::from_params(&json!({"sender": senders[0]})).unwrap();
        assert_eq!(query.sender, SenderFilter::Named(" Acme Corp ".into()));
        assert_eq!(ids(&query.apply(history.records())), vec!["a-1"]);

        let trimmed = QuerySpec::from_params(&json!({"sender": "Acme Corp"})).unwrap();
        assert!(trimmed.apply(history.records()).is_empty());
    }

    #[test]
    fn day_bounds_are_inclusive() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
        assert!(day_start(d) < day_end(d));
        assert_eq!((day_end(d) - day_start(d)).num_milliseconds(), 24 * 3600 * 1000 - 1);
    }
}
