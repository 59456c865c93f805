//! End-to-end exchanges against fake shell workers.
//!
//! Each test writes a small `/bin/sh` script standing in for the Python
//! worker and drives it through `WorkerBridge::execute`.

#![cfg(unix)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use iris_bridge::{BridgeError, ErrorKind, WorkerBridge, WorkerConfig};

fn write_worker(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    path
}

fn sh_bridge(script: &Path, timeout: Duration) -> WorkerBridge {
    WorkerBridge::new(
        WorkerConfig::new()
            .with_executable("/bin/sh")
            .with_script(script)
            .with_working_dir(script.parent().unwrap())
            .with_timeout(timeout),
    )
}

#[tokio::test]
async fn test_success_reply_with_metadata() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "ok.sh",
        concat!(
            "cat >/dev/null\n",
            r#"printf '%s' '{"success": true, "resultado": {"classificacao": {"estagio": "Estágio 2"}}}'"#,
            "\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let reply = bridge
        .execute(&json!({"sdma": 18.5, "creatinina": 2.3}))
        .await
        .unwrap();

    assert_eq!(
        reply.payload["resultado"]["classificacao"]["estagio"],
        "Estágio 2"
    );
    assert!(reply.payload["metadata"]["processing_time_ms"].is_u64());
    assert!(reply.payload["metadata"]["timestamp"].is_string());
    assert!(reply.elapsed >= Duration::ZERO);
}

#[tokio::test]
async fn test_request_reaches_worker_stdin() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "echo.sh",
        concat!(
            "input=$(cat)\n",
            r#"printf '{"success": true, "echo": %s}' "$input""#,
            "\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let reply = bridge.execute(&json!({"sdma": 18.5})).await.unwrap();

    assert_eq!(reply.payload["echo"], json!({"sdma": 18.5}));
}

#[tokio::test]
async fn test_malformed_output_is_parse_error() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "garbage.sh",
        "cat >/dev/null\necho 'Loading model weights...'\n",
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let err = bridge.execute(&json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ParseError);
    let details = err.details();
    assert!(details["stdout"].as_str().unwrap().contains("Loading model"));
}

#[tokio::test]
async fn test_worker_reported_failure_is_processing_error() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "refused.sh",
        concat!(
            "cat >/dev/null\n",
            r#"printf '%s' '{"success": false, "error": "dados insuficientes"}'"#,
            "\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let err = bridge.execute(&json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ProcessingError);
    assert_eq!(err.to_string(), "dados insuficientes");
}

#[tokio::test]
async fn test_nonzero_exit_uses_last_stderr_line() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "crash.sh",
        concat!(
            "cat >/dev/null\n",
            "echo 'Traceback (most recent call last):' >&2\n",
            "echo 'ValueError: sdma out of range' >&2\n",
            "exit 3\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let err = bridge.execute(&json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WorkerError);
    assert_eq!(err.to_string(), "ValueError: sdma out of range");
    assert_eq!(err.details()["exit_code"], 3);
}

#[tokio::test]
async fn test_nonzero_exit_prefers_json_error_field() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "json_crash.sh",
        concat!(
            "cat >/dev/null\n",
            r#"printf '%s' '{"error": "modelo indisponível"}'"#,
            "\n",
            "echo 'noise on stderr' >&2\n",
            "exit 1\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let err = bridge.execute(&json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WorkerError);
    assert_eq!(err.to_string(), "modelo indisponível");
}

#[tokio::test]
async fn test_timeout_kills_the_worker() {
    let temp = TempDir::new().unwrap();
    let pid_file = temp.path().join("worker.pid");
    let script = write_worker(
        temp.path(),
        "hang.sh",
        &format!(
            "cat >/dev/null\necho $$ > {}\nexec sleep 30\n",
            pid_file.display()
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_millis(300));

    let started = Instant::now();
    let err = bridge.execute(&json!({"sdma": 18.5})).await.unwrap_err();

    // Resolves at the deadline, not when sleep would have finished.
    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(err.kind(), ErrorKind::Timeout);
    let details = err.details();
    assert_eq!(details["timeout_ms"], 300);
    assert!(details["elapsed_ms"].as_u64().unwrap() >= 300);

    // The child was killed and reaped, not left running.
    #[cfg(target_os = "linux")]
    {
        let pid: u32 = fs::read_to_string(&pid_file).unwrap().trim().parse().unwrap();
        assert!(!Path::new(&format!("/proc/{pid}")).exists());
    }
}

#[tokio::test]
async fn test_missing_executable_is_spawn_failure() {
    let temp = TempDir::new().unwrap();
    let bridge = WorkerBridge::new(
        WorkerConfig::new()
            .with_executable("/nonexistent/interpreter")
            .with_script("worker.py")
            .with_working_dir(temp.path())
            .with_timeout(Duration::from_secs(10)),
    );

    let started = Instant::now();
    let err = bridge.execute(&json!({})).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SpawnFailure);
    assert_eq!(err.details()["executable"], "/nonexistent/interpreter");
    // No deadline left ticking.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_worker_that_never_reads_stdin_is_input_write_failure() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(temp.path(), "deaf.sh", "exit 0\n");
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    // Larger than any pipe buffer, so the write cannot complete before the
    // worker exits and closes its end.
    let huge = json!({"texto_livre": "x".repeat(8 * 1024 * 1024)});
    let err = bridge.execute(&huge).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InputWriteFailure);
}

#[tokio::test]
async fn test_concurrent_executions_do_not_interfere() {
    let temp = TempDir::new().unwrap();
    let script = write_worker(
        temp.path(),
        "echo.sh",
        concat!(
            "input=$(cat)\n",
            r#"printf '{"success": true, "echo": %s}' "$input""#,
            "\n",
        ),
    );
    let bridge = sh_bridge(&script, Duration::from_secs(10));

    let (in_a, in_b, in_c) = (json!({"n": 1}), json!({"n": 2}), json!({"n": 3}));
    let (a, b, c) = tokio::join!(
        bridge.execute(&in_a),
        bridge.execute(&in_b),
        bridge.execute(&in_c),
    );

    assert_eq!(a.unwrap().payload["echo"]["n"], 1);
    assert_eq!(b.unwrap().payload["echo"]["n"], 2);
    assert_eq!(c.unwrap().payload["echo"]["n"], 3);
}

#[tokio::test]
async fn test_timeout_error_shape() {
    // Matching on the variant gives callers access to both durations.
    let temp = TempDir::new().unwrap();
    let script = write_worker(temp.path(), "hang.sh", "cat >/dev/null\nexec sleep 30\n");
    let bridge = sh_bridge(&script, Duration::from_millis(200));

    match bridge.execute(&json!({})).await.unwrap_err() {
        BridgeError::Timeout { timeout, elapsed } => {
            assert_eq!(timeout, Duration::from_millis(200));
            assert!(elapsed >= timeout);
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
