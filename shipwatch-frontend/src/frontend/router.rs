//! Command routing shared by every chat platform
use chrono::Utc;
use std::sync::Arc;

use crate::command::{CommandType, ParsedCommand};
use crate::notifier::{
    FETCH_FAILED, FETCHING, NO_CACHED, Outgoing, ShipReport, TESTING, help_text, status_report,
    test_result,
};
use crate::provider::SnapshotProvider;
use crate::scheduled::NextRunHandle;

pub struct CommandRouter {
    provider: Arc<SnapshotProvider>,
    nickname: String,
    prefix: String,
    next_run: NextRunHandle,
}

impl CommandRouter {
    pub fn new(
        provider: Arc<SnapshotProvider>,
        nickname: &str,
        prefix: &str,
        next_run: NextRunHandle,
    ) -> Self {
        Self {
            provider,
            nickname: nickname.to_string(),
            prefix: prefix.to_string(),
            next_run,
        }
    }

    pub fn parse(&self, text: &str) -> ParsedCommand {
        ParsedCommand::parse(text, &self.prefix)
    }

    /// Sent right away, before a slow command does its work
    pub fn acknowledgement(command: CommandType) -> Option<&'static str> {
        match command {
            CommandType::Ship => Some(FETCHING),
            CommandType::Test => Some(TESTING),
            _ => None,
        }
    }

    /// Reply for a command; `None` for anything that is not one.
    pub async fn respond(&self, command: &ParsedCommand) -> Option<Outgoing> {
        let reply = match command.command_type {
            CommandType::Ship => match self.provider.current().await {
                Ok(report) => Outgoing::Embed(ShipReport::from_snapshot(
                    &report,
                    &self.nickname,
                    Utc::now(),
                )),
                Err(e) => {
                    tracing::warn!("Ship command failed: {:#}", e);
                    Outgoing::Text(FETCH_FAILED.to_string())
                }
            },
            CommandType::Last => match self.provider.last().await {
                Ok(Some(report)) => Outgoing::Embed(ShipReport::from_snapshot(
                    &report,
                    &self.nickname,
                    Utc::now(),
                )),
                Ok(None) => Outgoing::Text(NO_CACHED.to_string()),
                Err(e) => {
                    tracing::warn!("Reading cached snapshot failed: {:#}", e);
                    Outgoing::Text(NO_CACHED.to_string())
                }
            },
            CommandType::Status => status_report(*self.next_run.read().await),
            CommandType::Test => Outgoing::Text(test_result(&self.provider.check().await)),
            CommandType::Help => Outgoing::Text(help_text(&self.prefix)),
            CommandType::Unknown => return None,
        };
        Some(reply)
    }
}
