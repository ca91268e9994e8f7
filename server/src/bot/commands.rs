//! Chat Command Parsing

use crate::db::AccountId;

/// Parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Bind the sender to a game account name.
    Bind(String),
    /// Remove the sender's binding.
    Unbind,
    /// Show the sender's bound game account.
    WhoAmI,
    /// Show the sender's permission level.
    Level,
    /// Set another account's permission level (admin group only).
    SetLevel { account_id: AccountId, level: i64 },
    /// Anything else after the prefix; matched against custom commands.
    Custom(String),
    /// A known command with bad arguments.
    Usage(&'static str),
}

/// Recognizes commands addressed to the bot.
#[derive(Debug, Clone)]
pub struct CommandParser {
    prefixes: Vec<String>,
}

impl CommandParser {
    /// Commands start with `prefix`, or with an at-mention of the bot if its
    /// account is known.
    #[must_use]
    pub fn new(prefix: &str, bot_account_id: Option<AccountId>) -> Self {
        let mut prefixes = Vec::with_capacity(2);
        if let Some(id) = bot_account_id {
            prefixes.push(at_code(id));
        }
        if !prefix.is_empty() {
            prefixes.push(prefix.to_string());
        }
        Self { prefixes }
    }

    /// Parse a raw message. `None` means it is not addressed to the bot.
    pub fn parse(&self, raw: &str) -> Option<Command> {
        let raw = raw.trim();
        let body = self
            .prefixes
            .iter()
            .find_map(|prefix| raw.strip_prefix(prefix.as_str()))?
            .trim();

        if body.is_empty() {
            return None;
        }

        let mut words = body.split_whitespace();
        let keyword = words.next()?.to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let command = match keyword.as_str() {
            "bind" | "myid" => match args.as_slice() {
                [name] => Command::Bind((*name).to_string()),
                _ => Command::Usage("bind <game name>"),
            },
            "unbind" if args.is_empty() => Command::Unbind,
            "whoami" if args.is_empty() => Command::WhoAmI,
            "level" if args.is_empty() => Command::Level,
            "setlevel" => match args.as_slice() {
                [account, level] => match (parse_account(account), level.parse()) {
                    (Some(account_id), Ok(level)) => Command::SetLevel { account_id, level },
                    _ => Command::Usage("setlevel <account> <level>"),
                },
                _ => Command::Usage("setlevel <account> <level>"),
            },
            _ => Command::Custom(body.to_string()),
        };

        Some(command)
    }
}

/// CQ code that mentions `account_id`.
pub fn at_code(account_id: AccountId) -> String {
    format!("[CQ:at,qq={account_id}]")
}

/// Accepts a bare account number or an at-mention of it.
fn parse_account(text: &str) -> Option<AccountId> {
    let digits = text
        .strip_prefix("[CQ:at,qq=")
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(text);
    digits.parse().ok()
}
