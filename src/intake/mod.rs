// Document intake: identity, analysis, filtering, history and export.

pub mod analysis;
pub mod export;
pub mod filter;
pub mod gemini;
pub mod history;
pub mod identity;
pub mod session;
pub mod settings;
pub mod types;
