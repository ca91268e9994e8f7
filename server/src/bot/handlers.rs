//! Event Handlers
//!
//! [`Bot::handle_event`] is the single reporting boundary between inbound chat
//! events and the core services: every failure below it arrives here as an
//! error value, is logged, and is turned into reply text. Nothing escapes it.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::commands::{at_code, Command, CommandParser};
use super::custom::CustomCommands;
use super::events::{Event, MessageEvent, NoticeEvent};
use super::notify::GroupNotifier;
use crate::binding::{AccountLinker, BindError, BindOutcome};
use crate::config::Config;
use crate::console::{ChannelError, Console};
use crate::db::AccountId;
use crate::permissions::PermissionService;

const NOT_BOUND: &str = "You have no bound game account";

/// Errors surfaced by chat commands.
#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Console(#[from] ChannelError),
}

impl BotError {
    fn user_message(&self) -> String {
        match self {
            Self::Bind(e) => e.user_message(),
            Self::Database(_) => "Could not verify your permissions right now".to_string(),
            Self::Console(_) => "The game server did not accept the command".to_string(),
        }
    }

    const fn is_internal(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Bind(BindError::Storage(_)))
    }
}

/// Chat bot: routes events to the binding, permission and console services.
pub struct Bot {
    config: Arc<Config>,
    parser: CommandParser,
    linker: AccountLinker,
    permissions: PermissionService,
    console: Arc<dyn Console>,
    custom: CustomCommands,
    notifier: Option<GroupNotifier>,
}

impl Bot {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        linker: AccountLinker,
        permissions: PermissionService,
        console: Arc<dyn Console>,
        custom: CustomCommands,
        notifier: Option<GroupNotifier>,
    ) -> Self {
        let parser = CommandParser::new(&config.command_prefix, config.bot_account_id);
        Self {
            config,
            parser,
            linker,
            permissions,
            console,
            custom,
            notifier,
        }
    }

    /// Handle one inbound event. Returns the reply for the originating chat, if any.
    pub async fn handle_event(&self, event: Event) -> Option<String> {
        match event {
            Event::Message(message) => self.on_message(message).await,
            Event::Notice(notice) => {
                self.on_notice(notice).await;
                None
            }
            Event::Other => None,
        }
    }

    async fn on_message(&self, message: MessageEvent) -> Option<String> {
        let group_id = message.attributable_group()?;
        if !self.config.is_served_group(group_id) {
            return None;
        }

        let command = self.parser.parse(&message.raw_message)?;
        let in_admin_group = self.config.admin_group_id == Some(group_id);
        debug!(group_id, sender = message.user_id, ?command, "Chat command received");

        match self.run(message.user_id, in_admin_group, command).await {
            Ok(reply) => reply,
            Err(e) => Some(report(message.user_id, &e)),
        }
    }

    async fn run(
        &self,
        sender: AccountId,
        in_admin_group: bool,
        command: Command,
    ) -> Result<Option<String>, BotError> {
        let reply = match command {
            Command::Bind(name) => match self.linker.link(sender, &name).await {
                Ok(linked) => match linked.outcome {
                    BindOutcome::Unchanged { .. } => {
                        format!("You are already bound to {}", linked.profile.name)
                    }
                    _ => format!("Added {} to the allow-list", linked.profile.name),
                },
                Err(BindError::Conflict { name, owner }) => {
                    format!("Game account {name} is currently held by {}", at_code(owner))
                }
                Err(e) => return Err(e.into()),
            },
            Command::Unbind => match self.linker.unlink(sender).await? {
                Some(_) => "Your allow-list entry has been removed".to_string(),
                None => NOT_BOUND.to_string(),
            },
            Command::WhoAmI => match self.linker.lookup(sender).await? {
                Some(profile) => format!("You are bound to {} ({})", profile.name, profile.id),
                None => NOT_BOUND.to_string(),
            },
            Command::Level => {
                let level = self.permissions.get_level(sender).await?;
                format!("Your permission level is {level}")
            }
            Command::SetLevel { account_id, level } => {
                if !in_admin_group {
                    return Ok(Some(
                        "This command is only available in the admin group".to_string(),
                    ));
                }
                self.permissions.set_level(account_id, level).await?;
                info!(by = sender, account_id, level, "Permission level changed");
                format!("Permission level of {account_id} is now {level}")
            }
            Command::Custom(text) => return self.run_custom(sender, &text).await,
            Command::Usage(usage) => format!("Usage: {}{usage}", self.config.command_prefix),
        };

        Ok(Some(reply))
    }

    /// Run a configured console command. Unknown text is ignored silently.
    async fn run_custom(&self, sender: AccountId, text: &str) -> Result<Option<String>, BotError> {
        let Some(custom) = self.custom.get(text) else {
            return Ok(None);
        };

        let level = self.permissions.get_level(sender).await?;
        if level < custom.level {
            info!(sender, level, required = custom.level, "Custom command denied");
            return Ok(Some("You are not allowed to run this command".to_string()));
        }

        let response = self.console.execute(&custom.command).await?;
        Ok((!custom.silent).then_some(response))
    }

    async fn on_notice(&self, notice: NoticeEvent) {
        let Some((group_id, account_id)) = notice.member_left() else {
            return;
        };
        if group_id != self.config.game_group_id {
            return;
        }

        match self.linker.unlink(account_id).await {
            Ok(Some(game_uuid)) => {
                info!(account_id, %game_uuid, "Departed member removed from the allow-list");
            }
            Ok(None) => debug!(account_id, "Departed member had no binding"),
            Err(e) => {
                let text = format!(
                    "Could not remove the allow-list entry of {account_id}: {}",
                    report(account_id, &e.into())
                );
                self.notify(group_id, &text).await;
            }
        }
    }

    async fn notify(&self, group_id: i64, text: &str) {
        match &self.notifier {
            Some(notifier) => {
                if let Err(e) = notifier.send_group_msg(group_id, text).await {
                    error!(group_id, error = %e, "Failed to post group message");
                }
            }
            None => warn!(group_id, message = text, "No OneBot API configured, message dropped"),
        }
    }
}

/// Log a failed command and produce the text shown to the user.
fn report(account_id: AccountId, err: &BotError) -> String {
    if err.is_internal() {
        error!(account_id, error = %err, "Command failed");
    } else {
        warn!(account_id, error = %err, "Command failed");
    }
    err.user_message()
}
