//! Time-boxed chat polls.
//!
//! A moderator opens a voting window; while it is open, chat messages that
//! look like a chess move are recorded per voter (last vote wins). When the
//! window closes, either by command or because its [`Alarm`] fired, the
//! votes are tallied into a ranked summary and cleared.
//!
//! # Module Structure
//!
//! - [`tally`]: store-backed vote records and the window lifecycle
//! - [`alarm`]: the timer seam that closes a window after its duration
//! - [`closer`]: background task that reacts to fired alarms

pub mod alarm;
pub mod closer;
pub mod tally;

pub use alarm::{Alarm, AlarmFired, ChannelAlarm};
pub use closer::run_vote_closer;
pub use tally::{
    DEFAULT_WINDOW_SECS, RecordOutcome, VoteError, VoteTally, format_summary, is_plausible_move,
    parse_window_secs, rank_votes,
};
