use anyhow::bail;
use serde::{Deserialize, Serialize};

/// User-editable intake configuration, persisted as one JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Sender-email substrings. Empty allows every sender.
    pub target_emails: Vec<String>,
    pub process_invoices: bool,
    #[serde(rename = "processPOs")]
    pub process_pos: bool,
    pub process_quotes: bool,
    /// Informational only; nothing is fetched automatically.
    pub gmail_sync_enabled: bool,
    pub auto_download: bool,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            target_emails: vec![],
            process_invoices: true,
            process_pos: true,
            process_quotes: true,
            gmail_sync_enabled: true,
            auto_download: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    ProcessInvoices,
    ProcessPos,
    ProcessQuotes,
    GmailSyncEnabled,
    AutoDownload,
}

impl Setting {
    /// Accepts the camelCase field names used on the wire.
    pub fn parse(key: &str) -> anyhow::Result<Setting> {
        Ok(match key {
            "processInvoices" => Setting::ProcessInvoices,
            "processPOs" => Setting::ProcessPos,
            "processQuotes" => Setting::ProcessQuotes,
            "gmailSyncEnabled" => Setting::GmailSyncEnabled,
            "autoDownload" => Setting::AutoDownload,
            other => bail!("Unknown setting: {other}"),
        })
    }
}

impl Configuration {
    fn flag_mut(&mut self, setting: Setting) -> &mut bool {
        match setting {
            Setting::ProcessInvoices => &mut self.process_invoices,
            Setting::ProcessPos => &mut self.process_pos,
            Setting::ProcessQuotes => &mut self.process_quotes,
            Setting::GmailSyncEnabled => &mut self.gmail_sync_enabled,
            Setting::AutoDownload => &mut self.auto_download,
        }
    }

    /// Flip a flag and return its new value.
    pub fn toggle(&mut self, setting: Setting) -> bool {
        let flag = self.flag_mut(setting);
        *flag = !*flag;
        *flag
    }

    /// Add a target email. Blank input and exact repeats are ignored.
    pub fn add_target_email(&mut self, email: &str) -> bool {
        let email = email.trim();
        if email.is_empty() || self.target_emails.iter().any(|e| e == email) {
            return false;
        }
        self.target_emails.push(email.to_string());
        true
    }

    pub fn remove_target_email(&mut self, email: &str) -> bool {
        let before = self.target_emails.len();
        self.target_emails.retain(|e| e != email);
        self.target_emails.len() != before
    }
}
