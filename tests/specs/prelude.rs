// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the scenario specs.

use hive_core::{AgentId, AgentStatus};
use hive_store::KillSwitch;
use hive_supervisor::{Supervisor, SupervisorConfig};
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tempfile::TempDir;

/// Stub that completes one quick turn: init, one assistant message, a
/// result summary, clean exit. Arguments are appended to
/// `$HIVE_WORKSPACE/args.log` so specs can assert on the CLI contract.
pub const QUICK_STUB: &str = r#"#!/bin/sh
echo "$@" >> "$HIVE_WORKSPACE/args.log"
echo '{"type":"system","subtype":"init","session_id":"sess-spec"}'
echo '{"type":"assistant","message":{"id":"m1","content":[{"type":"text","text":"ok"}],"usage":{"input_tokens":7,"output_tokens":3}}}'
echo '{"type":"result","subtype":"success","total_cost_usd":0.001,"duration_ms":3,"num_turns":1,"usage":{"input_tokens":7,"output_tokens":3}}'
exit 0
"#;

/// Stub whose first turn lingers (so the agent sits in `running`) and
/// whose resumed turns complete quickly.
pub const LINGER_STUB: &str = r#"#!/bin/sh
echo "$@" >> "$HIVE_WORKSPACE/args.log"
echo '{"type":"system","subtype":"init","session_id":"sess-spec"}'
case "$*" in
  *--resume*)
    echo '{"type":"result","subtype":"success","num_turns":1}'
    exit 0
    ;;
  *)
    sleep 30
    exit 0
    ;;
esac
"#;

pub struct Harness {
    pub temp: TempDir,
    pub sup: Supervisor,
}

impl Harness {
    pub fn new(stub: &str) -> Self {
        Self::with_config(stub, |_| {})
    }

    pub fn with_config(stub: &str, adjust: impl FnOnce(&mut SupervisorConfig)) -> Self {
        let temp = TempDir::new().expect("tempdir");
        let stub_path = temp.path().join("stub-agent.sh");
        std::fs::write(&stub_path, stub).expect("write stub");
        std::fs::set_permissions(&stub_path, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub");

        let mut config = SupervisorConfig::under_root(temp.path().join("hive"));
        config.agent_bin = stub_path.display().to_string();
        adjust(&mut config);
        let kill = KillSwitch::new(
            temp.path().join("kill-switch.json"),
            config.state_dir.join("_kill-switch-tombstone"),
            None,
        );
        let sup = Supervisor::new(config, kill).expect("supervisor");
        Self { temp, sup }
    }

    pub async fn wait_status(&self, id: &AgentId, want: AgentStatus) {
        for _ in 0..600 {
            if self.sup.get(id).map(|a| a.status) == Some(want) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "agent never reached {want}; currently {:?}",
            self.sup.get(id).map(|a| a.status)
        );
    }

    /// Poll until the stub has been launched `want` times for this agent.
    pub async fn wait_turns(&self, id: &AgentId, want: usize) {
        for _ in 0..600 {
            if self.args_log(id).len() >= want {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("agent never reached {want} turns; args: {:?}", self.args_log(id));
    }

    /// Lines of the stub's argument log for one agent.
    pub fn args_log(&self, id: &AgentId) -> Vec<String> {
        let workspace = self.sup.get(id).expect("agent").workspace_dir;
        std::fs::read_to_string(workspace.join("args.log"))
            .unwrap_or_default()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }
}
