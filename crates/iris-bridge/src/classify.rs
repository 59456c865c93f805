//! Exit classification for worker invocations.
//!
//! Pure functions mapping (exit status, stdout, stderr) to either the
//! worker's JSON payload or a [`BridgeError`].

use std::process::ExitStatus;

use serde_json::Value;

use crate::error::BridgeError;

/// Maximum stdout preview attached to parse failures.
const STDOUT_PREVIEW_LIMIT: usize = 500;

/// Classify a finished worker exchange.
///
/// Non-zero exit resolves to [`BridgeError::Worker`]. Zero exit resolves to
/// the parsed payload when it carries `"success": true`, to
/// [`BridgeError::Processing`] when the flag is false or absent, and to
/// [`BridgeError::Parse`] when stdout is not JSON at all.
pub(crate) fn classify_exit(
    status: ExitStatus,
    stdout: &str,
    stderr: &str,
) -> Result<Value, BridgeError> {
    if !status.success() {
        return Err(worker_failure(status.code(), stdout, stderr));
    }

    let payload: Value = match serde_json::from_str(stdout) {
        Ok(payload) => payload,
        Err(source) => {
            return Err(BridgeError::Parse {
                source,
                preview: truncate(stdout),
                stderr: stderr.to_string(),
            });
        }
    };

    if payload.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(payload)
    } else {
        let message = payload
            .get("error")
            .and_then(Value::as_str)
            .unwrap_or("worker reported a processing failure")
            .to_string();
        Err(BridgeError::Processing {
            message,
            payload,
            stderr: stderr.to_string(),
        })
    }
}

/// Build the error for a non-zero exit.
///
/// A JSON `error` field on stdout wins; otherwise fall back to the last
/// non-empty stderr line. The fallback is a best-effort heuristic: if the
/// worker interleaves several logical messages on stderr there is no
/// ordering guarantee about which one we pick up.
fn worker_failure(exit_code: Option<i32>, stdout: &str, stderr: &str) -> BridgeError {
    let payload: Option<Value> = serde_json::from_str(stdout).ok();
    let message = payload
        .as_ref()
        .and_then(|p| p.get("error"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| last_nonempty_line(stderr))
        .unwrap_or_else(|| "worker process failed".to_string());

    BridgeError::Worker {
        message,
        exit_code,
        stderr: stderr.to_string(),
        stdout: truncate(stdout),
        payload,
    }
}

fn last_nonempty_line(text: &str) -> Option<String> {
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

fn truncate(text: &str) -> String {
    text.chars().take(STDOUT_PREVIEW_LIMIT).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[cfg(unix)]
    fn exit_status(code: i32) -> ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus::from_raw(code << 8)
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_success_payload() {
        let stdout = r#"{"success": true, "resultado": {"estagio": "Estágio 2"}}"#;
        let payload = classify_exit(exit_status(0), stdout, "").unwrap();
        assert_eq!(payload["resultado"]["estagio"], "Estágio 2");
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_malformed_output_is_parse_error() {
        let long = "not json ".repeat(200);
        let err = classify_exit(exit_status(0), &long, "trace line").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ParseError);
        match err {
            BridgeError::Parse { preview, stderr, .. } => {
                assert_eq!(preview.chars().count(), 500);
                assert_eq!(stderr, "trace line");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_success_false_is_processing_error() {
        let stdout = r#"{"success": false, "error": "dados insuficientes"}"#;
        let err = classify_exit(exit_status(0), stdout, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessingError);
        assert_eq!(err.to_string(), "dados insuficientes");
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_exit_missing_success_flag_is_processing_error() {
        let err = classify_exit(exit_status(0), r#"{"resultado": 1}"#, "").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProcessingError);
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_with_json_error_field() {
        let stdout = r#"{"error": "modelo indisponível"}"#;
        let err = classify_exit(exit_status(2), stdout, "ignored").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WorkerError);
        assert_eq!(err.to_string(), "modelo indisponível");
        match err {
            BridgeError::Worker {
                exit_code, payload, ..
            } => {
                assert_eq!(exit_code, Some(2));
                assert_eq!(payload, Some(json!({"error": "modelo indisponível"})));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_falls_back_to_last_stderr_line() {
        let stderr = "Traceback (most recent call last):\n  ...\nValueError: bad input\n\n";
        let err = classify_exit(exit_status(1), "garbage", stderr).unwrap_err();
        assert_eq!(err.to_string(), "ValueError: bad input");
    }

    #[cfg(unix)]
    #[test]
    fn test_nonzero_exit_empty_streams_has_default_message() {
        let err = classify_exit(exit_status(1), "", "").unwrap_err();
        assert_eq!(err.to_string(), "worker process failed");
    }

    #[test]
    fn test_last_nonempty_line() {
        assert_eq!(last_nonempty_line("a\nb\n\n"), Some("b".to_string()));
        assert_eq!(last_nonempty_line("  \n \n"), None);
        assert_eq!(last_nonempty_line(""), None);
    }
}
