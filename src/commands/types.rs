//! Command descriptors: who may run what.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Permission tier required to run a command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    /// Anyone in chat.
    #[default]
    All,
    /// Subscribers.
    Sub,
    /// VIPs.
    Vip,
    /// Moderators and the broadcaster.
    Mod,
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Permission::All => "all",
            Permission::Sub => "sub",
            Permission::Vip => "vip",
            Permission::Mod => "mod",
        })
    }
}

/// The executable commands. Each maps to one handler in the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// `!join <profile>`: enter the queue.
    Join,
    /// `!leave`: leave the queue.
    Leave,
    /// `!position`: show your place.
    Position,
    /// `!queue`: show the queue.
    List,
    /// `!size`: count the queue.
    Size,
    /// `!next`: take the head of the queue.
    Next,
    /// `!remove <user|profile>`: drop someone from the queue.
    Remove,
    /// `!clear`: empty the queue.
    Clear,
    /// `!vote start [secs]` / `!vote end`.
    Vote,
    /// `!votemode`: toggle whether chat messages count as votes.
    VoteMode,
    /// `!addcom <trigger> <reply...>`: add a reply command.
    AddCommand,
    /// `!delcom <trigger>`: delete a reply command.
    DeleteCommand,
}

/// A built-in command binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandSpec {
    pub triggers: &'static [&'static str],
    pub permission: Permission,
    pub command: Command,
}

/// A reply-only command created from chat and kept in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyCommand {
    pub trigger: String,
    pub reply: String,
    #[serde(default)]
    pub permission: Permission,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Permission::Vip).unwrap(), "\"vip\"");
        let parsed: Permission = serde_json::from_str("\"mod\"").unwrap();
        assert_eq!(parsed, Permission::Mod);
    }

    #[test]
    fn reply_command_defaults_to_everyone() {
        let cmd: ReplyCommand =
            serde_json::from_str(r#"{"trigger": "discord", "reply": "discord.gg/x"}"#).unwrap();
        assert_eq!(cmd.permission, Permission::All);
    }
}
