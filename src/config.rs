// IMPORTANT:
// Keep ALL numeric values and fixed names centralized here (repo rule: no hardcoded values scattered around).

// NOTE: HOST_VERSION must stay in sync with the `version` field in Cargo.toml.
pub const HOST_VERSION: &str = "0.3.0";

pub mod logging {
    pub const LOG_DIR_REL: &str = ".invoiceex/logs";
    pub const LOG_FILE_NAME: &str = "invoiceex_host.log";

    pub const LOG_ROTATE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
    pub const LOG_ROTATE_KEEP_FILES: usize = 5;
}

pub mod native_messaging {
    // Artifacts travel base64-encoded inside the request, so this bounds upload size too.
    pub const MAX_MESSAGE_SIZE_BYTES: u32 = 64 * 1024 * 1024;
}

pub mod storage {
    pub const DATA_DIR_REL: &str = ".invoiceex/data";
    pub const DB_FILE_NAME: &str = "invoiceex.db";

    // Keys shared with the extension's previous localStorage layout.
    pub const CONFIG_KEY: &str = "app_config";
    pub const HISTORY_KEY: &str = "app_history";

    pub const PRAGMA_BUSY_TIMEOUT_MS: i64 = 2000;
}

pub mod delivery {
    pub const DOWNLOAD_DIR_REL: &str = "Downloads";

    // Upper bound on " (n)" suffixes tried before giving up on a free file name.
    pub const MAX_NAME_ATTEMPTS: u32 = 1000;
}

pub mod analysis {
    pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
    pub const BASE_URL_ENV: &str = "INVOICEEX_GEMINI_BASE_URL";
    pub const MODEL: &str = "gemini-2.5-flash";

    // Checked in order; first non-blank value wins.
    pub const API_KEY_ENVS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

    pub const REQUEST_TIMEOUT_SECS: u64 = 120;

    // Maximum bytes of an error body echoed into logs / errors.
    pub const ERROR_BODY_PREVIEW_CHARS: usize = 300;

    pub const SYSTEM_INSTRUCTION: &str =
        "You are an expert automated document processing agent. You only care about Invoices, POs, and Quotes.";
}

pub mod intake {
    pub const UNKNOWN_SENDER: &str = "Unknown";
    pub const DEFAULT_CURRENCY: &str = "INR";
    pub const ID_SEPARATOR: &str = "-";
}

pub mod export {
    pub const FILE_NAME: &str = "Smart_Invoice_Extractor_Data.xlsx";
    pub const SHEET_NAME: &str = "Extracted Data";
    pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

    pub const HEADERS: [&str; 9] = [
        "Document ID",
        "Type",
        "Sender Name",
        "Sender Email",
        "File Name",
        "Amount",
        "Currency",
        "Summary",
        "Processed Date",
    ];

    // Column widths in characters, same order as HEADERS.
    pub const COLUMN_WIDTHS: [f64; 9] = [20.0, 15.0, 25.0, 25.0, 30.0, 15.0, 10.0, 40.0, 25.0];
}
