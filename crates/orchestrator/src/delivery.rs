// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Auto-delivery glue: push pending messages into an agent's next turn.
//!
//! Two triggers share the host's single-flight delivery gate:
//! - a targeted post delivers immediately when the recipient is idle, or
//!   preempts a running recipient when the message is an interrupt;
//! - an idle transition, after a short settle delay, delivers the oldest
//!   unread actionable message visible to that agent.

use crate::host::AgentHost;
use hive_bus::{MessageBus, MessageQuery};
use hive_core::{AgentId, Message, MessageType};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// The running glue; dropping it does not stop the tasks. Cancel the
/// token passed to [`AutoDelivery::spawn`].
pub struct AutoDelivery {
    bus: MessageBus,
    host: Arc<dyn AgentHost>,
    settle: Duration,
}

impl AutoDelivery {
    /// Start both trigger loops.
    pub fn spawn(
        bus: MessageBus,
        host: Arc<dyn AgentHost>,
        settle_ms: u64,
        cancel: CancellationToken,
    ) -> Arc<Self> {
        let glue =
            Arc::new(Self { bus, host, settle: Duration::from_millis(settle_ms) });

        let on_post = Arc::clone(&glue);
        let post_cancel = cancel.clone();
        let mut posts = on_post.bus.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = post_cancel.cancelled() => break,
                    message = posts.recv() => {
                        let Some(message) = message else { break };
                        let glue = Arc::clone(&on_post);
                        tokio::spawn(async move { glue.handle_post(message).await });
                    }
                }
            }
        });

        let on_idle = Arc::clone(&glue);
        let mut idles = on_idle.host.subscribe_idle();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    id = idles.recv() => {
                        let Some(id) = id else { break };
                        let glue = Arc::clone(&on_idle);
                        tokio::spawn(async move { glue.handle_idle(id).await });
                    }
                }
            }
        });

        glue
    }

    /// Trigger 1: a fresh post. Broadcasts and status chatter are ignored;
    /// interrupts preempt, everything else delivers only when the
    /// recipient is idle.
    async fn handle_post(&self, message: Message) {
        let Some(to) = message.to.clone() else {
            return;
        };
        if !message.kind.is_actionable() {
            return;
        }

        if message.kind == MessageType::Interrupt && self.host.can_interrupt(&to) {
            self.bus.mark_read(&message.id, &to);
            let prompt = interrupt_prompt(&message);
            if let Err(e) = self.host.deliver(&to, &prompt).await {
                tracing::warn!(agent_id = %to, error = %e, "interrupt delivery failed");
            }
            return;
        }

        if !self.host.can_deliver(&to) {
            return; // stays unread; the idle trigger will pick it up
        }
        self.bus.mark_read(&message.id, &to);
        let prompt = delivery_prompt(&message);
        if let Err(e) = self.host.deliver(&to, &prompt).await {
            tracing::warn!(agent_id = %to, error = %e, "post delivery failed");
        }
        self.host.delivery_done(&to);
    }

    /// Trigger 2: an idle transition. Waits for the settle delay so the
    /// old process is fully gone, then delivers the oldest unread
    /// actionable message visible to this agent.
    async fn handle_idle(&self, id: AgentId) {
        tokio::time::sleep(self.settle).await;
        if self.host.is_killed() {
            return;
        }
        if !self.host.can_deliver(&id) {
            return;
        }

        let role = self.host.agent(&id).and_then(|a| a.role);
        let pending = self.bus.query(&MessageQuery {
            to: Some(id.clone()),
            unread_by: Some(id.clone()),
            agent_role: role,
            ..Default::default()
        });
        let Some(message) = pending.into_iter().find(|m| m.kind.is_actionable()) else {
            self.host.delivery_done(&id);
            return;
        };

        self.bus.mark_read(&message.id, &id);
        let prompt = delivery_prompt(&message);
        if let Err(e) = self.host.deliver(&id, &prompt).await {
            tracing::warn!(agent_id = %id, error = %e, "idle delivery failed");
        }
        self.host.delivery_done(&id);
    }
}

fn sender_label(message: &Message) -> &str {
    message.from_name.as_deref().unwrap_or_else(|| message.from.as_str())
}

fn delivery_prompt(message: &Message) -> String {
    format!("[message from {} ({})]\n\n{}", sender_label(message), message.kind, message.content)
}

fn interrupt_prompt(message: &Message) -> String {
    format!("[INTERRUPT from {}]\n\n{}", sender_label(message), message.content)
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
