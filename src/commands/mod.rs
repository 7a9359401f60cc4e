//! Chat commands.
//!
//! A chat message becomes a command when it contains `!trigger`. Triggers
//! resolve first against reply-only commands kept in the store (managed
//! with `!addcom` / `!delcom`), then against the built-in table.
//!
//! # Built-in Commands
//!
//! | Trigger | Tier | Effect |
//! |---------|------|--------|
//! | `!join <profile>`, `!signup` | all | enter the queue (subscribers get priority) |
//! | `!leave` | all | leave the queue |
//! | `!position`, `!pos` | all | show your place |
//! | `!queue`, `!list` | all | list profiles in order |
//! | `!size` | all | count the queue |
//! | `!next` | mod | take the head of the queue |
//! | `!remove`, `!kick` | mod | drop a user or profile |
//! | `!clear` | mod | empty the queue |
//! | `!vote start [secs]`, `!vote end` | mod | run a poll |
//! | `!votemode` | mod | toggle whether chat moves count as votes |
//! | `!addcom`, `!delcom` | mod | manage reply commands |
//!
//! # Example
//!
//! ```
//! use en_passant::commands::{builtin, parse_invocation, Command, Permission};
//!
//! let invocation = parse_invocation("!KICK magnus").unwrap();
//! let spec = builtin(&invocation.trigger).unwrap();
//! assert_eq!(spec.command, Command::Remove);
//! assert_eq!(spec.permission, Permission::Mod);
//! ```

mod dispatcher;
mod parser;
mod permission;
mod registry;
mod types;

pub use dispatcher::{BUSY_REPLY, CommandDispatcher, DispatchError};
pub use parser::{Invocation, mentions_reserved_word, parse_invocation};
pub use permission::Roles;
pub use registry::{
    AddOutcome, COMMANDS, CommandRegistry, REPLY_COMMANDS_KEY, Resolved, builtin, normalize_trigger,
};
pub use types::{Command, CommandSpec, Permission, ReplyCommand};
