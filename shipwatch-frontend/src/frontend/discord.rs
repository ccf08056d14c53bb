use anyhow::{Context as _, Result};
use async_trait::async_trait;
use serenity::all::{
    ChannelId, Context, CreateEmbed, CreateEmbedFooter, CreateMessage, EventHandler,
    GatewayIntents, Http, Message, Ready, Timestamp,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::router::CommandRouter;
use crate::notifier::{Outgoing, ShipReport};
use crate::provider::SnapshotProvider;
use crate::scheduled::{Announcer, NextRunHandle, UpdateTask};

pub fn intents() -> GatewayIntents {
    GatewayIntents::GUILD_MESSAGES | GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT
}

pub fn build_embed(report: &ShipReport) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(&report.title)
        .description(&report.description)
        .color(report.color);
    for field in &report.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    if let Some(footer) = &report.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }
    if let Some(ts) = report
        .timestamp
        .and_then(|t| Timestamp::from_unix_timestamp(t.timestamp()).ok())
    {
        embed = embed.timestamp(ts);
    }
    embed
}

pub async fn send(http: &Http, channel: ChannelId, message: Outgoing) -> Result<()> {
    let builder = match message {
        Outgoing::Embed(report) => CreateMessage::new().embed(build_embed(&report)),
        Outgoing::Text(text) => CreateMessage::new().content(text),
    };
    channel
        .send_message(http, builder)
        .await
        .with_context(|| format!("Failed to send message to channel {}", channel))?;
    Ok(())
}

/// Posts scheduled updates to one channel
pub struct ChannelAnnouncer {
    http: Arc<Http>,
    channel: ChannelId,
}

#[async_trait]
impl Announcer for ChannelAnnouncer {
    async fn announce(&self, message: Outgoing) -> Result<()> {
        send(&self.http, self.channel, message).await
    }
}

pub struct Handler {
    router: CommandRouter,
    provider: Arc<SnapshotProvider>,
    nickname: String,
    channel: ChannelId,
    interval: Duration,
    post_on_startup: bool,
    next_run: NextRunHandle,
    started: AtomicBool,
}

impl Handler {
    pub fn new(
        provider: Arc<SnapshotProvider>,
        nickname: &str,
        prefix: &str,
        channel_id: u64,
        interval: Duration,
        post_on_startup: bool,
    ) -> Self {
        let next_run = NextRunHandle::default();
        Self {
            router: CommandRouter::new(provider.clone(), nickname, prefix, next_run.clone()),
            provider,
            nickname: nickname.to_string(),
            channel: ChannelId::new(channel_id),
            interval,
            post_on_startup,
            next_run,
            started: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        tracing::info!("{} has logged in to Discord", ready.user.name);

        // Gateway reconnects fire `ready` again
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!("Update task already running");
            return;
        }

        let announcer = Arc::new(ChannelAnnouncer {
            http: ctx.http.clone(),
            channel: self.channel,
        });
        UpdateTask::new(self.provider.clone(), announcer, &self.nickname, self.interval)
            .post_on_startup(self.post_on_startup)
            .with_next_run(self.next_run.clone())
            .spawn();
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }

        let command = self.router.parse(&msg.content);
        if !command.is_command() {
            return;
        }
        tracing::info!(
            "Command '{}' from {} in {}",
            command.command_type.as_str(),
            msg.author.name,
            msg.channel_id
        );

        if let Some(ack) = CommandRouter::acknowledgement(command.command_type) {
            if let Err(e) = msg.channel_id.say(&ctx.http, ack).await {
                tracing::warn!("Failed to acknowledge command: {}", e);
            }
        }

        if let Some(reply) = self.router.respond(&command).await {
            if let Err(e) = send(&ctx.http, msg.channel_id, reply).await {
                tracing::error!("{:#}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifier::status_report;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_intents_include_message_content() {
        assert!(intents().contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents().contains(GatewayIntents::GUILD_MESSAGES));
    }

    #[test]
    fn test_build_embed_from_status() {
        let next = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        let Outgoing::Embed(report) = status_report(Some(next)) else {
            panic!("status with a schedule is an embed");
        };
        // Builders are opaque; serializing proves the fields made it in
        let json = serde_json::to_value(build_embed(&report)).unwrap();
        assert_eq!(json["title"], "🤖 Bot Status");
        assert_eq!(json["fields"][0]["value"], format!("<t:{}:R>", next.timestamp()));
    }
}
