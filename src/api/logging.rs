use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

const DEFAULT_STREAM_LOG_PATH: &str = "/tmp/tide-debug-stream.log";
const DEBUG_STREAM_ENV: &str = "TIDE_DEBUG_STREAM";
const STREAM_LOG_PATH_ENV: &str = "TIDE_API_LOG_PATH";

pub fn debug_stream_enabled() -> bool {
    std::env::var(DEBUG_STREAM_ENV)
        .ok()
        .and_then(|v| crate::util::parse_bool_flag(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, payload: &Value) {
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message =
        format!("TIDE_API DEBUG chat_request url={request_url}\npayload:\n{formatted_payload}\n");
    emit_log_message(&message);
}

/// Malformed frames are dropped silently as far as the session is concerned;
/// the only trace they leave is here.
pub fn emit_dropped_frame(frame: &str) {
    if !debug_stream_enabled() {
        return;
    }
    let message = format!("TIDE_API WARN frame_dropped\nframe:\n{frame}\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(STREAM_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_STREAM_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_stream_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_STREAM_ENV, "1");
        assert!(debug_stream_enabled());
        std::env::set_var(DEBUG_STREAM_ENV, "TRUE");
        assert!(debug_stream_enabled());
        std::env::remove_var(DEBUG_STREAM_ENV);
        assert!(!debug_stream_enabled());
    }

    #[test]
    fn test_resolve_log_path_prefers_env_override() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(STREAM_LOG_PATH_ENV, "/tmp/test-stream.log");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/test-stream.log"));
        std::env::remove_var(STREAM_LOG_PATH_ENV);
    }
}
