// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child process launch and stream attachment.
//!
//! The child is launched detached in its own process group with stdout and
//! stderr piped and stdin ignored. The attach task owns the `Child`: it
//! drains both streams, waits for the exit status, publishes it on the
//! watch channel, and hands exit processing back to the supervisor keyed by
//! generation so a detached child cannot write stale state.

use crate::supervisor::Supervisor;
use hive_core::event::is_stderr_noise;
use hive_core::{AgentId, Clock, StreamEvent};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;

/// Read size for stdout chunks.
const READ_CHUNK: usize = 8 * 1024;

/// Inputs for one child launch.
pub(crate) struct SpawnSpec {
    pub model: String,
    pub max_turns: u32,
    pub resume: Option<String>,
    pub skip_permissions: bool,
    pub prompt: String,
}

/// CLI argument fragments, concatenated in the contract order.
pub(crate) fn build_args(spec: &SpawnSpec) -> Vec<String> {
    let mut args = Vec::new();
    if spec.skip_permissions {
        args.push("--dangerously-skip-permissions".to_string());
    }
    args.extend([
        "--output-format".to_string(),
        "stream-json".to_string(),
        "--verbose".to_string(),
        "--max-turns".to_string(),
        spec.max_turns.to_string(),
        "--model".to_string(),
        spec.model.clone(),
    ]);
    if let Some(session) = &spec.resume {
        args.push("--resume".to_string());
        args.push(session.clone());
    }
    args.push("--print".to_string());
    args.push("--".to_string());
    args.push(spec.prompt.clone());
    args
}

/// Launch the child. Returns the handle and its pid (== process group id).
pub(crate) fn launch(
    agent_bin: &str,
    spec: &SpawnSpec,
    env: &HashMap<String, String>,
    cwd: &Path,
) -> std::io::Result<(Child, i32)> {
    let mut cmd = Command::new(agent_bin);
    cmd.args(build_args(spec))
        .env_clear()
        .envs(env)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(false);

    let child = cmd.spawn()?;
    let pid = child.id().map(|p| p as i32).unwrap_or(-1);
    Ok((child, pid))
}

/// Attach stream handlers and the exit waiter for a freshly spawned child.
///
/// Returns the exit watch receiver the caller stores in the agent's proc
/// state.
pub(crate) fn attach<C: Clock>(
    supervisor: &Supervisor<C>,
    id: &AgentId,
    generation: u64,
    mut child: Child,
) -> watch::Receiver<Option<i32>> {
    let (exit_tx, exit_rx) = watch::channel(None);
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let sup = supervisor.clone();
    let agent_id = id.clone();
    tokio::spawn(async move {
        let stdout_done = async {
            let Some(mut stdout) = stdout else { return };
            let mut buf = vec![0u8; READ_CHUNK];
            loop {
                match stdout.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]).into_owned();
                        sup.ingest_chunk(&agent_id, generation, &chunk).await;
                    }
                }
            }
        };

        let stderr_done = async {
            let Some(stderr) = stderr else { return };
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if is_stderr_noise(line.trim()) {
                    continue;
                }
                sup.record_event(&agent_id, generation, StreamEvent::Stderr { text: line });
            }
        };

        tokio::join!(stdout_done, stderr_done);

        let code = match child.wait().await {
            Ok(status) => status.code().unwrap_or(-1),
            Err(e) => {
                tracing::warn!(agent_id = %agent_id, error = %e, "child wait failed");
                -1
            }
        };
        let _ = exit_tx.send(Some(code));
        sup.handle_exit(&agent_id, generation, code).await;
    });

    exit_rx
}

#[cfg(test)]
#[path = "spawn_tests.rs"]
mod tests;
