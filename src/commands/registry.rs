//! Trigger lookup over the built-in table and the store-kept reply commands.

use tracing::info;

use super::types::{Command, CommandSpec, Permission, ReplyCommand};
use crate::store::{KeyValueStore, StoreError, get_json, set_json};

/// Store key holding the list of reply commands.
pub const REPLY_COMMANDS_KEY: &str = "commands";

/// Built-in commands, in lookup order.
pub const COMMANDS: &[CommandSpec] = &[
    spec(&["join", "signup"], Permission::All, Command::Join),
    spec(&["leave"], Permission::All, Command::Leave),
    spec(&["position", "pos"], Permission::All, Command::Position),
    spec(&["queue", "list"], Permission::All, Command::List),
    spec(&["size"], Permission::All, Command::Size),
    spec(&["next"], Permission::Mod, Command::Next),
    spec(&["remove", "kick"], Permission::Mod, Command::Remove),
    spec(&["clear"], Permission::Mod, Command::Clear),
    spec(&["vote"], Permission::Mod, Command::Vote),
    spec(&["votemode"], Permission::Mod, Command::VoteMode),
    spec(&["addcom"], Permission::Mod, Command::AddCommand),
    spec(&["delcom"], Permission::Mod, Command::DeleteCommand),
];

const fn spec(
    triggers: &'static [&'static str],
    permission: Permission,
    command: Command,
) -> CommandSpec {
    CommandSpec {
        triggers,
        permission,
        command,
    }
}

/// The built-in command bound to `trigger`.
pub fn builtin(trigger: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|spec| spec.triggers.iter().any(|t| *t == trigger))
}

/// What a trigger resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Reply(ReplyCommand),
    Builtin(&'static CommandSpec),
}

impl Resolved {
    pub fn permission(&self) -> Permission {
        match self {
            Resolved::Reply(reply) => reply.permission,
            Resolved::Builtin(spec) => spec.permission,
        }
    }
}

/// Result of `!addcom`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An existing reply command with this trigger was overwritten.
    Replaced,
    /// The trigger belongs to a built-in command.
    Builtin,
    /// The trigger is empty or has characters a trigger cannot contain.
    InvalidTrigger,
}

/// Normalises a user-supplied trigger: optional leading `!`, lower case.
pub fn normalize_trigger(raw: &str) -> Option<String> {
    let trigger = raw.strip_prefix('!').unwrap_or(raw);
    let valid = !trigger.is_empty()
        && trigger
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    valid.then(|| trigger.to_ascii_lowercase())
}

/// Command lookup for one invocation.
pub struct CommandRegistry<'a, S> {
    store: &'a S,
}

impl<'a, S: KeyValueStore> CommandRegistry<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn reply_commands(&self) -> Result<Vec<ReplyCommand>, StoreError> {
        Ok(get_json(self.store, REPLY_COMMANDS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Reply commands are searched first, then the built-in table.
    pub async fn resolve(&self, trigger: &str) -> Result<Option<Resolved>, StoreError> {
        let replies = self.reply_commands().await?;
        if let Some(reply) = replies.into_iter().find(|r| r.trigger == trigger) {
            return Ok(Some(Resolved::Reply(reply)));
        }
        Ok(builtin(trigger).map(Resolved::Builtin))
    }

    pub async fn add_reply(&self, raw_trigger: &str, reply: &str) -> Result<AddOutcome, StoreError> {
        let Some(trigger) = normalize_trigger(raw_trigger) else {
            return Ok(AddOutcome::InvalidTrigger);
        };
        if builtin(&trigger).is_some() {
            return Ok(AddOutcome::Builtin);
        }

        let mut replies = self.reply_commands().await?;
        let command = ReplyCommand {
            trigger: trigger.clone(),
            reply: reply.to_string(),
            permission: Permission::All,
        };
        let outcome = match replies.iter_mut().find(|r| r.trigger == trigger) {
            Some(existing) => {
                *existing = command;
                AddOutcome::Replaced
            }
            None => {
                replies.push(command);
                AddOutcome::Added
            }
        };
        set_json(self.store, REPLY_COMMANDS_KEY, &replies).await?;
        info!(trigger, ?outcome, "Reply command saved");
        Ok(outcome)
    }

    /// Returns whether a reply command was deleted.
    pub async fn delete_reply(&self, raw_trigger: &str) -> Result<bool, StoreError> {
        let Some(trigger) = normalize_trigger(raw_trigger) else {
            return Ok(false);
        };
        let mut replies = self.reply_commands().await?;
        let before = replies.len();
        replies.retain(|r| r.trigger != trigger);
        if replies.len() == before {
            return Ok(false);
        }
        set_json(self.store, REPLY_COMMANDS_KEY, &replies).await?;
        info!(trigger, "Reply command deleted");
        Ok(true)
    }
}
