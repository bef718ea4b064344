//! `ProcessBackend` — runs each capability as a child process.
//!
//! The entry reference names an executable below a fixed root directory.
//! The resolved input is written to the child's stdin as JSON; the child
//! answers on stdout with either a full [`ExecutionOutcome`] document or a
//! bare JSON output.  A non-zero exit status is a reported failure carrying
//! the child's stderr.
//!
//! The memory ceiling is handed to the child as `AGENTFLOW_MEMORY_LIMIT_MB`
//! for it (or a wrapping launcher) to enforce.  The child is killed when the
//! call is dropped, which is how the caller's timeout takes effect.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::{ExecutionBackend, ExecutionOptions, ExecutionOutcome, SandboxError};

pub const MEMORY_LIMIT_ENV: &str = "AGENTFLOW_MEMORY_LIMIT_MB";

const STDERR_LIMIT: usize = 2_000;

#[derive(Debug, Clone)]
pub struct ProcessBackend {
    root: PathBuf,
}

impl ProcessBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Map an entry reference onto an executable below the root.
    fn resolve(&self, entry_reference: &str) -> Result<PathBuf, SandboxError> {
        let relative = Path::new(entry_reference);
        let confined = !entry_reference.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !confined {
            return Err(SandboxError::Unavailable(format!(
                "entry reference '{entry_reference}' escapes the agent root"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ExecutionBackend for ProcessBackend {
    async fn execute(
        &self,
        entry_reference: &str,
        input: Value,
        options: ExecutionOptions,
    ) -> Result<ExecutionOutcome, SandboxError> {
        let program = self.resolve(entry_reference)?;
        let started = Instant::now();

        let mut child = Command::new(&program)
            .env(MEMORY_LIMIT_ENV, options.memory_limit_mb.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SandboxError::Unavailable(format!("{}: {e}", program.display())))?;

        let payload = serde_json::to_vec(&input)
            .map_err(|e| SandboxError::Failed(format!("unserializable input: {e}")))?;
        if let Some(mut stdin) = child.stdin.take() {
            // A child may exit without reading its input.
            match stdin.write_all(&payload).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {}
                Err(e) => return Err(SandboxError::Unavailable(format!("writing input: {e}"))),
            }
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| SandboxError::Unavailable(format!("waiting for agent: {e}")))?;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        debug!(entry = entry_reference, status = %output.status, elapsed_ms = elapsed, "agent exited");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail: String = stderr.trim().chars().take(STDERR_LIMIT).collect();
            return Ok(ExecutionOutcome::failed(
                format!("agent exited with {}: {detail}", output.status),
                elapsed,
            ));
        }

        let document: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| SandboxError::Failed(format!("agent wrote invalid JSON: {e}")))?;

        let outcome = match serde_json::from_value::<ExecutionOutcome>(document.clone()) {
            Ok(reported) => reported,
            Err(_) => ExecutionOutcome::succeeded(document, elapsed),
        };
        Ok(outcome)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::os::unix::fs::PermissionsExt;

    fn agent_root(name: &str, scripts: &[(&str, &str)]) -> PathBuf {
        let root = std::env::temp_dir().join(format!("agentflow-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        for (file, body) in scripts {
            let path = root.join(file);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        root
    }

    #[tokio::test]
    async fn bare_stdout_becomes_the_output() {
        let root = agent_root("echo", &[("echo", "cat")]);
        let backend = ProcessBackend::new(&root);

        let outcome = backend
            .execute("echo", json!({ "a": [1, 2] }), ExecutionOptions::default())
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.output, Some(json!({ "a": [1, 2] })));
    }

    #[tokio::test]
    async fn reported_outcomes_and_exit_codes_are_failures() {
        let root = agent_root(
            "fail",
            &[
                ("reports", r#"echo '{"success":false,"error":"bad","execution_time_ms":3}'"#),
                ("crashes", "echo oops >&2; exit 3"),
                ("memory", "printf '{\"mb\":%s}' \"$AGENTFLOW_MEMORY_LIMIT_MB\""),
            ],
        );
        let backend = ProcessBackend::new(&root);

        let reported = backend
            .execute("reports", json!({}), ExecutionOptions::default())
            .await
            .unwrap();
        assert!(!reported.success);
        assert_eq!(reported.error.as_deref(), Some("bad"));

        let crashed = backend
            .execute("crashes", json!({}), ExecutionOptions::default())
            .await
            .unwrap();
        assert!(!crashed.success);
        assert!(crashed.error.unwrap().contains("oops"));

        let options = ExecutionOptions { memory_limit_mb: 64, ..ExecutionOptions::default() };
        let memory = backend.execute("memory", json!({}), options).await.unwrap();
        assert_eq!(memory.output, Some(json!({ "mb": 64 })));
    }

    #[tokio::test]
    async fn entry_references_cannot_escape_the_root() {
        let backend = ProcessBackend::new("/nonexistent");
        for entry in ["../bin/sh", "/bin/sh", ""] {
            let err = backend
                .execute(entry, json!({}), ExecutionOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, SandboxError::Unavailable(_)), "{entry}");
        }
    }
}
