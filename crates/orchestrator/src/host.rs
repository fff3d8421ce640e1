// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The seam between orchestration and the supervisor.
//!
//! The orchestrator never touches processes; it asks the host which agents
//! can take work, claims delivery slots, and hands prompts over. The
//! supervisor is the production host; tests plug in fakes.

use async_trait::async_trait;
use hive_core::{Agent, AgentId, AgentStatus, Clock};
use hive_supervisor::{Supervisor, SupervisorError};
use tokio::sync::mpsc;

#[async_trait]
pub trait AgentHost: Send + Sync + 'static {
    /// Agents ready for orchestrated work (deliverable with a session).
    fn available_agents(&self) -> Vec<Agent>;

    /// Snapshot of one agent.
    fn agent(&self, id: &AgentId) -> Option<Agent>;

    /// Claim the delivery slot for an agent. A `true` return obliges the
    /// caller to call [`AgentHost::delivery_done`] on every exit path.
    fn can_deliver(&self, id: &AgentId) -> bool;

    fn delivery_done(&self, id: &AgentId);

    fn can_interrupt(&self, id: &AgentId) -> bool;

    /// Push a prompt into the agent's next turn (kills and respawns with
    /// `--resume` under the agent's lifecycle lock).
    async fn deliver(&self, id: &AgentId, prompt: &str) -> Result<(), SupervisorError>;

    /// Stream of agent ids that just became deliverable.
    fn subscribe_idle(&self) -> mpsc::UnboundedReceiver<AgentId>;

    fn is_killed(&self) -> bool;
}

#[async_trait]
impl<C: Clock> AgentHost for Supervisor<C> {
    fn available_agents(&self) -> Vec<Agent> {
        // Stalled agents stay deliverable for peer messages, but new task
        // assignments go only to settled sessions.
        self.deliverable_agents()
            .into_iter()
            .filter(|a| matches!(a.status, AgentStatus::Idle | AgentStatus::Restored))
            .collect()
    }

    fn agent(&self, id: &AgentId) -> Option<Agent> {
        self.get(id)
    }

    fn can_deliver(&self, id: &AgentId) -> bool {
        Supervisor::can_deliver(self, id)
    }

    fn delivery_done(&self, id: &AgentId) {
        Supervisor::delivery_done(self, id)
    }

    fn can_interrupt(&self, id: &AgentId) -> bool {
        Supervisor::can_interrupt(self, id)
    }

    async fn deliver(&self, id: &AgentId, prompt: &str) -> Result<(), SupervisorError> {
        self.message(id, prompt, None, None).await
    }

    fn subscribe_idle(&self) -> mpsc::UnboundedReceiver<AgentId> {
        Supervisor::subscribe_idle(self)
    }

    fn is_killed(&self) -> bool {
        self.kill_switch().is_killed()
    }
}
