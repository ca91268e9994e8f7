//! Custom Console Commands
//!
//! Chat triggers mapped to fixed console commands, gated by permission level.
//!
//! ```toml
//! [commands.list]
//! level = 0
//! command = "list"
//!
//! [commands.save]
//! level = 5
//! command = "save-all"
//! silent = true
//! ```

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// One custom command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomCommand {
    /// Minimum permission level of the sender.
    #[serde(default)]
    pub level: i64,
    /// Console command to run.
    pub command: String,
    /// Do not echo the console response to the chat.
    #[serde(default)]
    pub silent: bool,
}

/// Custom commands keyed by chat trigger.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomCommands {
    #[serde(default)]
    commands: HashMap<String, CustomCommand>,
}

impl CustomCommands {
    /// Load from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read custom commands from {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Invalid custom commands in {}", path.display()))
    }

    /// Parse from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let parsed: Self = toml::from_str(content)?;
        if let Some((trigger, _)) = parsed
            .commands
            .iter()
            .find(|(_, cmd)| cmd.command.trim().is_empty())
        {
            anyhow::bail!("custom command {trigger:?} has an empty console command");
        }
        Ok(parsed)
    }

    /// Command bound to `trigger` (matched after trimming).
    pub fn get(&self, trigger: &str) -> Option<&CustomCommand> {
        self.commands.get(trigger.trim())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let commands = CustomCommands::from_toml(
            r#"
            [commands.list]
            command = "list"

            [commands."save now"]
            level = 5
            command = "save-all"
            silent = true
            "#,
        )
        .expect("Failed to parse commands");

        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands.get("list"),
            Some(&CustomCommand {
                level: 0,
                command: "list".into(),
                silent: false,
            })
        );
        let save = commands.get(" save now ").expect("Missing command");
        assert_eq!(save.level, 5);
        assert!(save.silent);
        assert!(commands.get("stop").is_none());
    }

    #[test]
    fn test_empty_file_has_no_commands() {
        let commands = CustomCommands::from_toml("").unwrap();
        assert!(commands.is_empty());
    }

    #[test]
    fn test_rejects_empty_console_command() {
        let result = CustomCommands::from_toml(
            r#"
            [commands.nothing]
            command = "  "
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_missing_console_command() {
        let result = CustomCommands::from_toml("[commands.broken]\nlevel = 1\n");
        assert!(result.is_err());
    }
}
