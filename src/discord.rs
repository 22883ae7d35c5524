// ABOUTME: Discord session runtime: owns the serenity client on a dedicated thread.
// ABOUTME: Implements ChatGateway over the Discord HTTP API and publishes gateway events to the bus.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;
use serenity::async_trait;
use serenity::builder::{CreateInvite, CreateMessage, CreateThread};
use serenity::client::{Client, Context, EventHandler};
use serenity::http::{Http, HttpError};
use serenity::model::channel::{AutoArchiveDuration, ChannelType};
use serenity::model::gateway::{GatewayIntents, Ready};
use serenity::model::guild::Member;
use serenity::model::id::{ChannelId, GuildId, MessageId, UserId};
use serenity::model::user::User;
use tokio::task::LocalSet;

use crate::bridge::{
    self, CommandBridge, CommandReceiver, SessionReadiness, COMMAND_QUEUE_DEPTH, COMMAND_TIMEOUT,
};
use crate::bus::{EventBus, SessionEvent};
use crate::config::DiscordConfig;
use crate::gateway::{ChatGateway, CommandError};
use crate::store::MemberRecord;

/// Start the Discord session on its own OS thread and return the bridge
/// handle for submitting work to it.
///
/// The thread owns a current-thread runtime and a `LocalSet`; the
/// serenity client and the bridge job pump both live there, so every
/// platform call executes on that single context. If the connection
/// fails the thread exits and the bridge is permanently unavailable;
/// submissions fail fast from then on.
pub fn spawn_session(cfg: DiscordConfig, bus: EventBus) -> Result<CommandBridge> {
    let (command_bridge, jobs) = bridge::channel(COMMAND_QUEUE_DEPTH, COMMAND_TIMEOUT);
    let readiness = command_bridge.readiness();

    std::thread::Builder::new()
        .name("discord-session".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to build discord session runtime");
                    return;
                }
            };
            let local = LocalSet::new();

            local.block_on(&rt, async move {
                if let Err(e) = run_session(cfg, bus, readiness.clone(), jobs).await {
                    tracing::error!(
                        error = %e,
                        "discord session terminated; command bridge is permanently unavailable"
                    );
                }
                readiness.set(false);
            });
        })
        .context("Failed to spawn discord session thread")?;

    Ok(command_bridge)
}

/// Connect, then run the gateway connection and the job pump until one
/// of them stops. Blocks its context for the life of the session.
async fn run_session(
    cfg: DiscordConfig,
    bus: EventBus,
    readiness: SessionReadiness,
    jobs: CommandReceiver,
) -> Result<()> {
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_MEMBERS;
    let handler = Handler {
        readiness: readiness.clone(),
        bus,
    };

    let mut client = Client::builder(&cfg.token, intents)
        .event_handler(handler)
        .await
        .context("Failed to build discord client")?;

    let gateway: Arc<dyn ChatGateway> =
        Arc::new(DiscordGateway::new(client.http.clone(), cfg.guild_id));
    let pump = tokio::task::spawn_local(jobs.drive(gateway));

    let result = client.start().await;
    pump.abort();
    result.context("Discord gateway connection closed")
}

/// Gateway event callbacks. These run on the session context and only
/// flip the readiness flag or publish to the bus, never block.
struct Handler {
    readiness: SessionReadiness,
    bus: EventBus,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, data: Ready) {
        tracing::info!(
            user = %data.user.name,
            user_id = %data.user.id,
            "discord session ready"
        );
        self.readiness.set(true);
        self.bus.publish(SessionEvent::Ready {
            bot_user: data.user.name.clone(),
        });
    }

    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        let record = MemberRecord {
            discord_id: member.user.id.get(),
            username: member.user.name.clone(),
        };
        self.bus.publish(SessionEvent::MemberJoined {
            member: record,
            at: Utc::now(),
        });
    }

    async fn guild_member_removal(
        &self,
        _ctx: Context,
        _guild_id: GuildId,
        user: User,
        _member: Option<Member>,
    ) {
        let record = MemberRecord {
            discord_id: user.id.get(),
            username: user.name.clone(),
        };
        self.bus.publish(SessionEvent::MemberLeft {
            member: record,
            at: Utc::now(),
        });
    }
}

/// ChatGateway backed by Discord's HTTP API.
///
/// Entities are resolved before acting so a missing target surfaces as
/// the matching domain failure instead of an opaque request error.
pub struct DiscordGateway {
    http: Arc<Http>,
    guild_id: GuildId,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>, guild_id: u64) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
        }
    }
}

fn is_not_found(err: &serenity::Error) -> bool {
    matches!(
        err,
        serenity::Error::Http(HttpError::UnsuccessfulRequest(resp))
            if resp.status_code.as_u16() == 404
    )
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn send_message(&self, channel_id: u64, body: &str) -> Result<u64, CommandError> {
        let channel = ChannelId::new(channel_id);
        if let Err(err) = self.http.get_channel(channel).await {
            return Err(if is_not_found(&err) {
                CommandError::ChannelNotFound(channel_id)
            } else {
                CommandError::Platform(err.into())
            });
        }

        let message = channel
            .send_message(self.http.as_ref(), CreateMessage::new().content(body))
            .await
            .map_err(|e| CommandError::Platform(e.into()))?;
        Ok(message.id.get())
    }

    async fn create_thread(
        &self,
        channel_id: u64,
        message_id: u64,
        name: &str,
        auto_archive_minutes: u16,
    ) -> Result<u64, CommandError> {
        let archive = match auto_archive_minutes {
            60 => AutoArchiveDuration::OneHour,
            4320 => AutoArchiveDuration::ThreeDays,
            10080 => AutoArchiveDuration::OneWeek,
            _ => AutoArchiveDuration::OneDay,
        };
        let thread = ChannelId::new(channel_id)
            .create_thread_from_message(
                self.http.as_ref(),
                MessageId::new(message_id),
                CreateThread::new(name).auto_archive_duration(archive),
            )
            .await
            .map_err(|e| CommandError::Platform(e.into()))?;
        Ok(thread.id.get())
    }

    async fn send_in_thread(&self, thread_id: u64, body: &str) -> Result<(), CommandError> {
        ChannelId::new(thread_id)
            .send_message(self.http.as_ref(), CreateMessage::new().content(body))
            .await
            .map_err(|e| CommandError::Platform(e.into()))?;
        Ok(())
    }

    async fn kick_member(&self, user_id: u64, reason: &str) -> Result<(), CommandError> {
        let user = UserId::new(user_id);

        if let Err(err) = self.http.get_guild(self.guild_id).await {
            return Err(if is_not_found(&err) {
                CommandError::GuildNotFound(self.guild_id.get())
            } else {
                CommandError::Platform(err.into())
            });
        }
        if let Err(err) = self.http.get_member(self.guild_id, user).await {
            return Err(if is_not_found(&err) {
                CommandError::MemberNotFound(user_id)
            } else {
                CommandError::Platform(err.into())
            });
        }

        self.guild_id
            .kick_with_reason(self.http.as_ref(), user, reason)
            .await
            .map_err(|e| CommandError::Platform(e.into()))?;
        Ok(())
    }

    async fn create_invite(&self, max_age_secs: u32, max_uses: u8) -> Result<String, CommandError> {
        let channels = match self.http.get_channels(self.guild_id).await {
            Ok(channels) => channels,
            Err(err) => {
                return Err(if is_not_found(&err) {
                    CommandError::GuildNotFound(self.guild_id.get())
                } else {
                    CommandError::Platform(err.into())
                });
            }
        };

        // First text channel, ordered the way clients display them
        let mut text_channels: Vec<_> = channels
            .into_iter()
            .filter(|c| c.kind == ChannelType::Text)
            .collect();
        text_channels.sort_by_key(|c| (c.position, c.id));
        let Some(channel) = text_channels.into_iter().next() else {
            return Err(CommandError::NoTextChannels(self.guild_id.get()));
        };

        let invite = channel
            .id
            .create_invite(
                self.http.as_ref(),
                CreateInvite::new()
                    .max_age(max_age_secs)
                    .max_uses(max_uses)
                    .unique(true),
            )
            .await
            .map_err(|e| CommandError::Platform(e.into()))?;
        Ok(invite.url())
    }
}
