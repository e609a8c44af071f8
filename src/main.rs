mod config;
mod delivery;
mod intake;
mod logging;
mod native_messaging;
mod paths;
mod protocol;
mod storage;

use std::io::{stdin, stdout};
use std::path::PathBuf;

use anyhow::Context;
use base64::Engine;
use serde_json::Value;

use crate::delivery::DownloadFolder;
use crate::intake::filter::QuerySpec;
use crate::intake::gemini::GeminiAnalyzer;
use crate::intake::session::IntakeSession;
use crate::intake::settings::Setting;
use crate::intake::types::Artifact;
use crate::protocol::{opt_str_param, str_param};
use crate::storage::KvStore;

#[derive(Default)]
struct HostState {
    session: Option<IntakeSession>,
}

fn main() {
    if let Err(e) = real_main() {
        eprintln!("[InvoiceEx] fatal error: {e:?}");
        log::error!("Fatal error: {:?}", e);
        std::process::exit(1);
    }
}

fn real_main() -> anyhow::Result<()> {
    logging::init_logging()?;

    log::info!("=== InvoiceEx Host Started ===");
    log::info!("Waiting for messages from the extension...");

    let mut state = HostState::default();
    let mut in_stream = stdin();
    let mut out_stream = stdout();

    let mut message_count: u64 = 0;
    loop {
        let req = match native_messaging::read_message(&mut in_stream) {
            Ok(Some(r)) => r,
            Ok(None) => {
                log::info!("No more messages after {} messages, exiting", message_count);
                break;
            }
            Err(e) => {
                log::error!("Error reading message: {:?}", e);
                break;
            }
        };

        message_count += 1;
        log::info!(
            "Processing message #{}: {} (id: {})",
            message_count,
            req.method,
            req.id
        );

        let resp = handle_request(&mut state, &req.method, &req.id, &req.params).unwrap_or_else(|e| {
            log::error!("Handler error: {:?}", e);
            protocol::err(&req.id, format!("{e}"))
        });
        if let Err(e) = native_messaging::write_json(&mut out_stream, &resp) {
            log::error!("Error sending response: {:?}", e);
            break;
        }
    }

    log::info!("=== InvoiceEx Host Stopped ===");
    Ok(())
}

fn handle_request(state: &mut HostState, method: &str, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    match method {
        "hello" => handle_hello(msg_id, params),
        "init" => handle_init(state, msg_id, params),
        // Configuration
        "getConfig" => protocol::ok(msg_id, require_session(state)?.config()),
        "toggleSetting" => handle_toggle_setting(state, msg_id, params),
        "addTargetEmail" => handle_add_target_email(state, msg_id, params),
        "removeTargetEmail" => handle_remove_target_email(state, msg_id, params),
        "setApiKey" => handle_set_api_key(state, msg_id, params),
        // Intake
        "ingest" => handle_ingest(state, msg_id, params),
        // History views
        "history" => protocol::ok(msg_id, require_session(state)?.history()),
        "stats" => protocol::ok(msg_id, require_session(state)?.stats()),
        "query" => handle_query(state, msg_id, params),
        "senders" => protocol::ok(msg_id, require_session(state)?.senders()),
        "delete" => handle_delete(state, msg_id, params),
        "export" => handle_export(state, msg_id, params),
        _ => Ok(protocol::err(msg_id, format!("Unknown method: {method}"))),
    }
}

fn require_session(state: &HostState) -> anyhow::Result<&IntakeSession> {
    state.session.as_ref().context("Session not initialized. Call 'init' first.")
}

fn require_session_mut(state: &mut HostState) -> anyhow::Result<&mut IntakeSession> {
    state.session.as_mut().context("Session not initialized. Call 'init' first.")
}

fn handle_hello(msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let addon_version = opt_str_param(params, "addonVersion").unwrap_or("unknown");
    log::info!(
        "Hello from addon version {}, responding with host version {}",
        addon_version,
        config::HOST_VERSION
    );

    protocol::ok(
        msg_id,
        serde_json::json!({
            "type": "hello-response",
            "hostImpl": "rust",
            "hostVersion": config::HOST_VERSION,
            "addonVersion": addon_version
        }),
    )
}

fn dir_param(params: &Value, key: &str, default: fn() -> anyhow::Result<PathBuf>) -> anyhow::Result<PathBuf> {
    match opt_str_param(params, key).map(str::trim).filter(|s| !s.is_empty()) {
        Some(p) => Ok(PathBuf::from(p)),
        None => default(),
    }
}

fn handle_init(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let data_dir = dir_param(params, "dataDir", paths::default_data_dir)?;
    let download_dir = dir_param(params, "downloadDir", paths::default_download_dir)?;

    log::info!("Init: data dir {}", data_dir.display());
    log::info!("Init: download dir {}", download_dir.display());

    // Drop any previous session first so its connection is closed before reopening.
    state.session = None;

    let store = KvStore::open_or_create(&data_dir)?;
    let analyzer = GeminiAnalyzer::from_env(opt_str_param(params, "apiKey"));
    let session = IntakeSession::load(store, Box::new(analyzer), Box::new(DownloadFolder::new(download_dir.clone())))
        .context("failed loading stored configuration/history")?;

    let db_path = session.store().path().map(|p| p.to_string_lossy().into_owned());
    let records = session.history().len();
    let has_api_key = session.has_credential();
    if !has_api_key {
        log::warn!("No Gemini API key configured; ingestion will report a missing credential");
    }
    state.session = Some(session);

    protocol::ok(
        msg_id,
        serde_json::json!({
            "ok": true,
            "dataDir": data_dir.to_string_lossy(),
            "dbPath": db_path,
            "downloadDir": download_dir.to_string_lossy(),
            "records": records,
            "hasApiKey": has_api_key
        }),
    )
}

fn handle_toggle_setting(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let setting = Setting::parse(str_param(params, "key")?)?;
    let session = require_session_mut(state)?;
    session.toggle(setting);
    protocol::ok(msg_id, session.config())
}

fn handle_add_target_email(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let email = str_param(params, "email")?;
    let session = require_session_mut(state)?;
    let added = session.add_target_email(email);
    protocol::ok(msg_id, serde_json::json!({ "added": added, "config": session.config() }))
}

fn handle_remove_target_email(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let email = str_param(params, "email")?;
    let session = require_session_mut(state)?;
    let removed = session.remove_target_email(email);
    protocol::ok(msg_id, serde_json::json!({ "removed": removed, "config": session.config() }))
}

fn handle_set_api_key(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let key = str_param(params, "apiKey")?;
    let session = require_session_mut(state)?;
    session.set_analyzer(Box::new(GeminiAnalyzer::with_key(Some(key.to_string()))));
    let has_api_key = session.has_credential();
    log::info!("API key updated (present: {})", has_api_key);
    protocol::ok(msg_id, serde_json::json!({ "hasApiKey": has_api_key }))
}

fn handle_ingest(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let file_name = str_param(params, "fileName")?;
    let mime_type = str_param(params, "mimeType")?;
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(str_param(params, "data")?)
        .context("data parameter is not valid base64")?;
    log::info!("Ingest {} ({}, {} bytes)", file_name, mime_type, bytes.len());

    let session = require_session_mut(state)?;
    let outcome = session.ingest(Artifact {
        file_name: file_name.to_string(),
        mime_type: mime_type.to_string(),
        bytes,
    });
    protocol::ok(msg_id, outcome)
}

fn handle_query(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let query = QuerySpec::from_params(params)?;
    let records = require_session(state)?.query(&query);
    if !query.is_identity() {
        log::debug!("Query {:?} matched {} records", query, records.len());
    }
    protocol::ok(msg_id, records)
}

fn handle_delete(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let id = str_param(params, "id")?;
    let deleted = require_session_mut(state)?.delete(id);
    protocol::ok(msg_id, serde_json::json!({ "deleted": deleted }))
}

fn handle_export(state: &mut HostState, msg_id: &str, params: &Value) -> anyhow::Result<Value> {
    let query = QuerySpec::from_params(params)?;
    let export = require_session(state)?.export(&query)?;
    protocol::ok(
        msg_id,
        serde_json::json!({
            "fileName": export.file_name,
            "rows": export.rows,
            "data": base64::engine::general_purpose::STANDARD.encode(&export.bytes)
        }),
    )
}
