//! Chat message → command → reply.
//!
//! One dispatcher handles one verified chat message:
//!
//! 1. Messages sent by the bot itself are ignored.
//! 2. Without a `!trigger`, the message is offered as a vote if vote mode
//!    is on, and nothing is replied.
//! 3. Messages mentioning a reserved word are ignored.
//! 4. The trigger is resolved (reply commands first, then built-ins) and
//!    the sender's badges are checked against the command's tier. Denied
//!    commands are ignored without a reply.
//! 5. The handler runs; a non-empty reply is sent to chat.
//!
//! A queue or vote lock that stays busy turns into a "try again" reply
//! rather than an error.

use thiserror::Error;
use tracing::{debug, info, warn};

use super::parser::{Invocation, mentions_reserved_word, parse_invocation};
use super::permission::Roles;
use super::registry::{AddOutcome, CommandRegistry, Resolved};
use super::types::Command;
use crate::chat::ChatSink;
use crate::helix::HelixError;
use crate::lock::{LockConfig, LockTimeout};
use crate::queue::{EnqueueOutcome, QueueError, QueueManager};
use crate::store::{KeyValueStore, StoreError};
use crate::types::UserId;
use crate::vote::{Alarm, RecordOutcome, VoteError, VoteTally, parse_window_secs};
use crate::webhooks::ChatMessageEvent;

/// Reply sent when a lock could not be acquired in time.
pub const BUSY_REPLY: &str = "The queue is busy right now, please try again in a moment.";

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("lock busy: {0}")]
    Busy(#[from] LockTimeout),

    #[error("store failure while handling command: {0}")]
    Store(#[from] StoreError),

    #[error("failed to send chat reply: {0}")]
    Chat(#[from] HelixError),
}

impl From<QueueError> for DispatchError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Busy(t) => DispatchError::Busy(t),
            QueueError::Store(s) => DispatchError::Store(s),
        }
    }
}

impl From<VoteError> for DispatchError {
    fn from(e: VoteError) -> Self {
        match e {
            VoteError::Busy(t) => DispatchError::Busy(t),
            VoteError::Store(s) => DispatchError::Store(s),
        }
    }
}

pub struct CommandDispatcher<'a, S, C, A> {
    store: &'a S,
    chat: &'a C,
    alarm: &'a A,
    lock_config: LockConfig,
    bot_user_id: Option<&'a UserId>,
}

impl<'a, S, C, A> CommandDispatcher<'a, S, C, A>
where
    S: KeyValueStore,
    C: ChatSink,
    A: Alarm,
{
    pub fn new(store: &'a S, chat: &'a C, alarm: &'a A, lock_config: LockConfig) -> Self {
        Self {
            store,
            chat,
            alarm,
            lock_config,
            bot_user_id: None,
        }
    }

    /// Ignores messages sent by `bot_user_id`, so the bot never answers
    /// its own replies.
    pub fn ignoring_sender(mut self, bot_user_id: Option<&'a UserId>) -> Self {
        self.bot_user_id = bot_user_id;
        self
    }

    /// Handles one chat message and returns the reply that was sent.
    pub async fn dispatch(&self, event: &ChatMessageEvent) -> Result<Option<String>, DispatchError> {
        if self.bot_user_id == Some(&event.chatter_user_id) {
            return Ok(None);
        }

        let Some(invocation) = parse_invocation(&event.text) else {
            self.offer_vote(event).await?;
            return Ok(None);
        };
        if mentions_reserved_word(&event.text) {
            debug!(trigger = %invocation.trigger, "Message mentions a reserved word, ignoring");
            return Ok(None);
        }

        let registry = CommandRegistry::new(self.store);
        let Some(resolved) = registry.resolve(&invocation.trigger).await? else {
            return Ok(None);
        };
        let roles = Roles::from_badges(&event.badges);
        if !roles.permits(resolved.permission()) {
            debug!(
                user = %event.chatter_user_login,
                trigger = %invocation.trigger,
                required = %resolved.permission(),
                "Permission denied"
            );
            return Ok(None);
        }

        let result = match resolved {
            Resolved::Reply(reply) => Ok(Some(reply.reply)),
            Resolved::Builtin(spec) => self.execute(spec.command, &invocation, event, roles).await,
        };
        let reply = match result {
            Ok(reply) => reply,
            Err(DispatchError::Busy(timeout)) => {
                warn!(trigger = %invocation.trigger, error = %timeout, "Command abandoned");
                Some(BUSY_REPLY.to_string())
            }
            Err(e) => return Err(e),
        };

        match reply.filter(|r| !r.trim().is_empty()) {
            Some(reply) => {
                self.chat.send_message(&reply).await?;
                info!(
                    user = %event.chatter_user_login,
                    trigger = %invocation.trigger,
                    "Command answered"
                );
                Ok(Some(reply))
            }
            None => Ok(None),
        }
    }

    async fn offer_vote(&self, event: &ChatMessageEvent) -> Result<(), DispatchError> {
        let tally = VoteTally::new(self.store, self.lock_config);
        if !tally.vote_mode().await? {
            return Ok(());
        }
        match tally.record_vote(&event.chatter_user_login, &event.text).await {
            Ok(RecordOutcome::Recorded) => {
                debug!(user = %event.chatter_user_login, "Vote recorded");
            }
            Ok(_) => {}
            Err(VoteError::Busy(timeout)) => {
                warn!(user = %event.chatter_user_login, error = %timeout, "Vote dropped");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn execute(
        &self,
        command: Command,
        invocation: &Invocation<'_>,
        event: &ChatMessageEvent,
        roles: Roles,
    ) -> Result<Option<String>, DispatchError> {
        let name = &event.chatter_user_name;
        let login = &event.chatter_user_login;
        let mut queue = QueueManager::new(self.store, self.lock_config);
        let tally = VoteTally::new(self.store, self.lock_config);

        let reply = match command {
            Command::Join => {
                let Some(profile) = invocation.first_arg() else {
                    return Ok(Some(format!("@{name} usage: !join <profile>")));
                };
                match queue.enqueue(login, profile, roles.subscriber).await? {
                    EnqueueOutcome::Added { position } => {
                        format!("@{name} joined the queue as {profile} at position {position}.")
                    }
                    EnqueueOutcome::DuplicateUser => {
                        format!("@{name} you are already in the queue.")
                    }
                    EnqueueOutcome::DuplicateProfile => {
                        format!("@{name} {profile} is already in the queue.")
                    }
                }
            }

            Command::Leave => match queue.leave(login).await? {
                Some(entry) => format!("@{name} left the queue ({}).", entry.profile),
                None => format!("@{name} you are not in the queue."),
            },

            Command::Position => match queue.position(login).await? {
                Some((entry, position)) => {
                    format!("@{name} you are #{position} in the queue as {}.", entry.profile)
                }
                None => format!("@{name} you are not in the queue."),
            },

            Command::List => {
                let entries = queue.list().await?;
                if entries.is_empty() {
                    "The queue is empty.".to_string()
                } else {
                    let listed: Vec<String> = entries
                        .iter()
                        .enumerate()
                        .map(|(i, e)| format!("{}. {}", i + 1, e.profile))
                        .collect();
                    format!("Queue: {}", listed.join(", "))
                }
            }

            Command::Size => match queue.size().await? {
                1 => "There is 1 player in the queue.".to_string(),
                n => format!("There are {n} players in the queue."),
            },

            Command::Next => match queue.dequeue().await? {
                Some(entry) => format!("Next up: {} (@{})", entry.profile, entry.user),
                None => "The queue is empty.".to_string(),
            },

            Command::Remove => {
                let Some(target) = invocation.first_arg() else {
                    return Ok(Some(format!("@{name} usage: !remove <user|profile>")));
                };
                match queue.remove(target).await? {
                    Some(entry) => {
                        format!("Removed {} (@{}) from the queue.", entry.profile, entry.user)
                    }
                    None => format!("{target} is not in the queue."),
                }
            }

            Command::Clear => {
                queue.clear().await?;
                "The queue has been cleared.".to_string()
            }

            Command::Vote => {
                let mut args = invocation.args();
                match args.next().map(str::to_ascii_lowercase).as_deref() {
                    Some("start") => {
                        let length = parse_window_secs(args.next());
                        tally.start_window(length, self.alarm).await?;
                        format!("Voting is open for {} seconds!", length.as_secs())
                    }
                    Some("end") => tally
                        .end_window()
                        .await?
                        .unwrap_or_else(|| "No vote is running.".to_string()),
                    _ => format!("@{name} usage: !vote start [seconds] | !vote end"),
                }
            }

            Command::VoteMode => {
                if tally.toggle_vote_mode().await? {
                    "Vote mode on: moves in chat count as votes.".to_string()
                } else {
                    "Vote mode off.".to_string()
                }
            }

            Command::AddCommand => {
                let Some((trigger, reply)) = split_first_word(invocation.rest) else {
                    return Ok(Some(format!("@{name} usage: !addcom <trigger> <reply>")));
                };
                let registry = CommandRegistry::new(self.store);
                let shown = trigger.trim_start_matches('!');
                match registry.add_reply(trigger, reply).await? {
                    AddOutcome::Added => format!("Command !{shown} added."),
                    AddOutcome::Replaced => format!("Command !{shown} updated."),
                    AddOutcome::Builtin => format!("@{name} !{shown} is a built-in command."),
                    AddOutcome::InvalidTrigger => format!("@{name} that is not a valid trigger."),
                }
            }

            Command::DeleteCommand => {
                let Some(trigger) = invocation.first_arg() else {
                    return Ok(Some(format!("@{name} usage: !delcom <trigger>")));
                };
                let registry = CommandRegistry::new(self.store);
                if registry.delete_reply(trigger).await? {
                    format!("Command !{} deleted.", trigger.trim_start_matches('!'))
                } else {
                    format!("@{name} no such command.")
                }
            }
        };
        Ok(Some(reply))
    }
}

/// Splits `text` into its first word and the non-empty remainder.
fn split_first_word(text: &str) -> Option<(&str, &str)> {
    let (first, rest) = text.trim().split_once(char::is_whitespace)?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some((first, rest))
}
