// ABOUTME: Subscribes to session events, caches member joins, and notifies an external endpoint.
// ABOUTME: Outbound delivery is best-effort: failures are logged and swallowed, never retried.

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::bus::{EventBus, SessionEvent};
use crate::metrics;
use crate::store::{AppendLog, MemberRecord};

/// Deadline for a single outbound notification attempt.
const FORWARD_TIMEOUT: Duration = Duration::from_secs(10);

/// Handles unsolicited member events off the session bus.
pub struct JoinForwarder {
    members: AppendLog<MemberRecord>,
    join_url: Option<String>,
    http: reqwest::Client,
}

impl JoinForwarder {
    pub fn new(members: AppendLog<MemberRecord>, join_url: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(FORWARD_TIMEOUT)
            .build()
            .context("Failed to build forwarder HTTP client")?;
        Ok(Self {
            members,
            join_url,
            http,
        })
    }

    /// Spawn the subscriber task. Failures inside the task never reach
    /// the session context; a lagged receiver logs and keeps going.
    pub fn spawn(self, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => self.handle(event).await,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "join forwarder lagged behind session events");
                    }
                    Err(RecvError::Closed) => {
                        tracing::info!("event bus closed, join forwarder shutting down");
                        break;
                    }
                }
            }
        })
    }

    async fn handle(&self, event: SessionEvent) {
        match event {
            SessionEvent::Ready { bot_user } => {
                tracing::debug!(user = %bot_user, "forwarder observed session ready");
            }
            SessionEvent::MemberJoined { member, .. } => {
                tracing::info!(
                    username = %member.username,
                    discord_id = member.discord_id,
                    "member joined the guild"
                );
                self.members.append(member.clone());
                metrics::record_member_join();
                self.forward(&member).await;
            }
            SessionEvent::MemberLeft { member, .. } => {
                tracing::info!(
                    username = %member.username,
                    discord_id = member.discord_id,
                    "member left the guild"
                );
            }
        }
    }

    /// Best-effort POST of the join record. Never propagates failure.
    async fn forward(&self, member: &MemberRecord) {
        let Some(url) = &self.join_url else {
            tracing::warn!("no join forwarding URL configured; skipping notification");
            return;
        };

        match self.http.post(url).json(member).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!(
                    discord_id = member.discord_id,
                    "join notification delivered"
                );
            }
            Ok(response) => {
                tracing::error!(
                    status = %response.status(),
                    discord_id = member.discord_id,
                    "join notification rejected by endpoint"
                );
                metrics::record_error("forwarder_status");
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    discord_id = member.discord_id,
                    "failed to deliver join notification"
                );
                metrics::record_error("forwarder_send");
            }
        }
    }
}
