// ABOUTME: Platform-agnostic interface to the chat session and its domain error taxonomy.
// ABOUTME: Webhook units of work compose these primitives; serenity stays behind the trait.

use async_trait::async_trait;
use thiserror::Error;

/// A platform operation failed for a domain reason (a referenced entity
/// does not exist) or an underlying platform reason.
///
/// Domain variants are surfaced to HTTP callers only as fixed generic
/// messages; the detail here is for server-side logs.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("channel {0} not found")]
    ChannelNotFound(u64),
    #[error("guild {0} not found")]
    GuildNotFound(u64),
    #[error("member {0} not found")]
    MemberNotFound(u64),
    #[error("guild {0} has no text channels")]
    NoTextChannels(u64),
    #[error(transparent)]
    Platform(#[from] anyhow::Error),
}

/// The operations the session can perform against the chat platform.
///
/// Every method executes on the session's own context; callers reach
/// this trait only through a `CommandBridge` submission. Implementations
/// resolve entities before acting so absent targets map onto the
/// not-found variants rather than opaque send failures.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Send a message to a channel. Returns the new message's id.
    async fn send_message(&self, channel_id: u64, body: &str) -> Result<u64, CommandError>;

    /// Create a thread on an existing message. Returns the thread's
    /// channel id.
    async fn create_thread(
        &self,
        channel_id: u64,
        message_id: u64,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<u64, CommandError>;

    /// Post into an existing thread.
    async fn send_in_thread(&self, thread_id: u64, body: &str) -> Result<(), CommandError>;

    /// Remove a member from the configured guild with an audit reason.
    async fn kick_member(&self, user_id: u64, reason: &str) -> Result<(), CommandError>;

    /// Create a single-use invite on the configured guild's first text
    /// channel. Returns the invite URL.
    async fn create_invite(&self, max_age_secs: u32, max_uses: u8) -> Result<String, CommandError>;
}
