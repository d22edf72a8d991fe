//! Shell execution: spawns a fresh interpreter per script, feeds it the
//! script body on stdin, and waits for the exit status. Used both for a
//! worker's job (with the `WORKER_RANK`/`WORKER_SIZE` preamble) and for the
//! coordinator's prolog/epilog hooks (without it).

use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};

/// Default shell interpreter, overridable via `worker-core::config`.
pub const DEFAULT_SHELL: &str = "bash";

/// Spawns `script` under `shell`, exposing the worker's identity as two
/// environment assignments written ahead of the script body — matching the
/// reference implementation's `fprintf(cp, "WORKER_RANK=%d\n", rank)`
/// preamble rather than `env`/`Command::env`, so the assignments are visible
/// to the script even if it starts with a shebang reinvoking a different
/// shell that inherits stdin. Returns the still-running `Child` so a caller
/// can race `child.wait()` against a shutdown signal and `kill()` it.
pub async fn spawn_job(shell: &str, rank: u32, size: u32, script: &[u8]) -> std::io::Result<Child> {
    let mut preamble = format!("WORKER_RANK={rank}\nWORKER_SIZE={size}\n").into_bytes();
    preamble.extend_from_slice(script);
    spawn_with_stdin(shell, &preamble).await
}

/// Runs `script` under `shell` to completion. See [`spawn_job`].
pub async fn run_job(shell: &str, rank: u32, size: u32, script: &[u8]) -> std::io::Result<ExitStatus> {
    spawn_job(shell, rank, size, script).await?.wait().await
}

/// Runs a prolog/epilog script file's contents under `shell`, with no
/// identity preamble.
pub async fn run_file(shell: &str, path: &std::path::Path) -> std::io::Result<ExitStatus> {
    let body = tokio::fs::read(path).await?;
    spawn_with_stdin(shell, &body).await?.wait().await
}

async fn spawn_with_stdin(shell: &str, body: &[u8]) -> std::io::Result<Child> {
    let mut child = Command::new(shell)
        .stdin(Stdio::piped())
        .spawn()?;

    // Write and close stdin before awaiting the child so a script that reads
    // its own stdin to EOF (instead of just executing statements) doesn't
    // deadlock against a full pipe.
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(body).await?;
        drop(stdin);
    }

    Ok(child)
}

/// Extracts the low 8-bit exit code a shell reports, the way the reference
/// implementation's `WEXITSTATUS` did. On Unix `ExitStatus::code()` already
/// yields this value for a normal exit; a script killed by a signal has no
/// exit code, in which case we report `128 + signal` (the shell convention),
/// matching what `bash` itself would report to *its* parent.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_simple_script() {
        let status = run_job(DEFAULT_SHELL, 1, 3, b"exit 0\n").await.unwrap();
        assert_eq!(exit_code(status), 0);
    }

    #[tokio::test]
    async fn propagates_nonzero_exit() {
        let status = run_job(DEFAULT_SHELL, 1, 3, b"exit 7\n").await.unwrap();
        assert_eq!(exit_code(status), 7);
    }

    #[tokio::test]
    async fn exposes_rank_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.txt");
        let script = format!("echo \"$WORKER_RANK $WORKER_SIZE\" > {}\n", out.display());
        let status = run_job(DEFAULT_SHELL, 2, 3, script.as_bytes()).await.unwrap();
        assert_eq!(exit_code(status), 0);
        let contents = std::fs::read_to_string(out).unwrap();
        assert_eq!(contents.trim(), "2 3");
    }

    #[tokio::test]
    async fn runs_a_prolog_file() {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("prolog.sh");
        std::fs::write(&script_path, b"exit 3\n").unwrap();
        let status = run_file(DEFAULT_SHELL, &script_path).await.unwrap();
        assert_eq!(exit_code(status), 3);
    }
}
