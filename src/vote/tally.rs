//! Store-backed vote records.
//!
//! All vote state lives in the key/value store so that any invocation can
//! record a vote or close the window:
//!
//! | key               | value                                   |
//! |-------------------|-----------------------------------------|
//! | `vote_toggle`     | whether plain chat messages count as votes |
//! | `voting_open`     | whether a window is accepting votes     |
//! | `voting_deadline` | when the open window is due to close    |
//! | `votes`           | map of voter → latest move text         |
//!
//! Every read-modify-write of these keys runs under [`LockName::Votes`].

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info};

use super::alarm::Alarm;
use crate::lock::{AdvisoryLock, LockConfig, LockError, LockName, LockTimeout};
use crate::store::{KeyValueStore, StoreError, get_json, set_json};

pub const VOTE_TOGGLE_KEY: &str = "vote_toggle";
pub const VOTING_OPEN_KEY: &str = "voting_open";
pub const VOTING_DEADLINE_KEY: &str = "voting_deadline";
pub const VOTES_KEY: &str = "votes";

/// Window length used when none (or garbage) is given.
pub const DEFAULT_WINDOW_SECS: u64 = 30;

/// Longest window a poll may run.
pub const MAX_WINDOW_SECS: u64 = 3600;

/// How many distinct answers the summary aims to show; ties at the last
/// place are all kept.
const SUMMARY_PLACES: usize = 3;

type VoteRecord = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum VoteError {
    #[error("votes are busy: {0}")]
    Busy(#[from] LockTimeout),

    #[error("vote store failure: {0}")]
    Store(#[from] StoreError),
}

impl From<LockError> for VoteError {
    fn from(e: LockError) -> Self {
        match e {
            LockError::Timeout(t) => VoteError::Busy(t),
            LockError::Store(s) => VoteError::Store(s),
        }
    }
}

/// What happened to a submitted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// No window is open.
    WindowClosed,
    /// The text does not mention a board square.
    NotAMove,
}

/// Parses the window length argument of `!vote start`.
///
/// Missing, non-numeric and zero values fall back to
/// [`DEFAULT_WINDOW_SECS`]; longer windows are capped at
/// [`MAX_WINDOW_SECS`].
pub fn parse_window_secs(arg: Option<&str>) -> Duration {
    let secs = arg
        .and_then(|a| a.trim().parse::<u64>().ok())
        .filter(|&s| s > 0)
        .unwrap_or(DEFAULT_WINDOW_SECS)
        .min(MAX_WINDOW_SECS);
    Duration::from_secs(secs)
}

/// Coarse legality check: the text contains a square such as `e4`.
pub fn is_plausible_move(text: &str) -> bool {
    text.as_bytes().windows(2).any(|pair| {
        matches!(pair[0].to_ascii_lowercase(), b'a'..=b'h') && matches!(pair[1], b'1'..=b'8')
    })
}

/// Groups votes by exact text and ranks them by count, then text.
///
/// Keeps every answer whose count reaches the count of the third-placed
/// answer, so a tie at the cutoff is never truncated.
pub fn rank_votes<'v>(votes: impl IntoIterator<Item = &'v String>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for text in votes {
        *counts.entry(text.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(text, count)| (text.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    let Some(cutoff) = ranked
        .get(SUMMARY_PLACES - 1)
        .or(ranked.last())
        .map(|(_, count)| *count)
    else {
        return ranked;
    };
    ranked.retain(|(_, count)| *count >= cutoff);
    ranked
}

pub fn format_summary(ranked: &[(String, usize)]) -> String {
    if ranked.is_empty() {
        return "Voting closed: no votes were cast.".to_string();
    }
    let parts: Vec<String> = ranked
        .iter()
        .map(|(text, count)| {
            let noun = if *count == 1 { "vote" } else { "votes" };
            format!("{text} ({count} {noun})")
        })
        .collect();
    format!("Voting closed: {}", parts.join(", "))
}

/// Vote operations for one invocation.
pub struct VoteTally<'a, S> {
    store: &'a S,
    lock: AdvisoryLock<'a, S>,
}

impl<'a, S: KeyValueStore> VoteTally<'a, S> {
    pub fn new(store: &'a S, lock_config: LockConfig) -> Self {
        Self {
            store,
            lock: AdvisoryLock::new(store, lock_config),
        }
    }

    /// Whether non-command chat messages are offered as votes.
    pub async fn vote_mode(&self) -> Result<bool, VoteError> {
        Ok(get_json(self.store, VOTE_TOGGLE_KEY).await?.unwrap_or(false))
    }

    /// Flips vote mode and returns the new setting.
    pub async fn toggle_vote_mode(&self) -> Result<bool, VoteError> {
        let store = self.store;
        let enabled = self
            .lock
            .with_lock::<_, VoteError, _, _>(LockName::Votes, || async move {
                let current: bool = get_json(store, VOTE_TOGGLE_KEY).await?.unwrap_or(false);
                set_json(store, VOTE_TOGGLE_KEY, &!current).await?;
                Ok(!current)
            })
            .await?;
        info!(enabled, "Vote mode toggled");
        Ok(enabled)
    }

    pub async fn is_open(&self) -> Result<bool, VoteError> {
        Ok(get_json(self.store, VOTING_OPEN_KEY).await?.unwrap_or(false))
    }

    /// Records `text` as `voter`'s vote, replacing any earlier one.
    pub async fn record_vote(&self, voter: &str, text: &str) -> Result<RecordOutcome, VoteError> {
        let text = text.trim();
        if !is_plausible_move(text) {
            return Ok(RecordOutcome::NotAMove);
        }

        let store = self.store;
        let outcome = self
            .lock
            .with_lock::<_, VoteError, _, _>(LockName::Votes, || async move {
                let open: bool = get_json(store, VOTING_OPEN_KEY).await?.unwrap_or(false);
                if !open {
                    return Ok(RecordOutcome::WindowClosed);
                }
                let mut votes: VoteRecord = get_json(store, VOTES_KEY).await?.unwrap_or_default();
                votes.insert(voter.to_string(), text.to_string());
                set_json(store, VOTES_KEY, &votes).await?;
                Ok(RecordOutcome::Recorded)
            })
            .await?;

        debug!(voter, text, ?outcome, "Vote submitted");
        Ok(outcome)
    }

    /// Clears earlier votes, opens the window and schedules its closure.
    ///
    /// Returns the deadline handed to `alarm`.
    pub async fn start_window<A: Alarm>(
        &self,
        length: Duration,
        alarm: &A,
    ) -> Result<DateTime<Utc>, VoteError> {
        let length = length.min(Duration::from_secs(MAX_WINDOW_SECS));
        let deadline = Utc::now() + length;
        let store = self.store;
        self.lock
            .with_lock::<_, VoteError, _, _>(LockName::Votes, || async move {
                set_json(store, VOTES_KEY, &VoteRecord::new()).await?;
                set_json(store, VOTING_DEADLINE_KEY, &deadline).await?;
                set_json(store, VOTING_OPEN_KEY, &true).await?;
                Ok(())
            })
            .await?;

        alarm.schedule(length, deadline);
        info!(secs = length.as_secs(), %deadline, "Voting window opened");
        Ok(deadline)
    }

    /// Closes the open window and returns the ranked summary, or `None` if
    /// no window was open.
    pub async fn end_window(&self) -> Result<Option<String>, VoteError> {
        self.close(None).await
    }

    /// Closes the window only if it is still the one due at `deadline`.
    ///
    /// An alarm for a window that was ended early and then reopened must
    /// not close the new window.
    pub async fn end_scheduled_window(
        &self,
        deadline: DateTime<Utc>,
    ) -> Result<Option<String>, VoteError> {
        self.close(Some(deadline)).await
    }

    async fn close(&self, expected: Option<DateTime<Utc>>) -> Result<Option<String>, VoteError> {
        let store = self.store;
        let summary = self
            .lock
            .with_lock::<_, VoteError, _, _>(LockName::Votes, || async move {
                let open: bool = get_json(store, VOTING_OPEN_KEY).await?.unwrap_or(false);
                if !open {
                    return Ok(None);
                }
                if let Some(expected) = expected {
                    let current: Option<DateTime<Utc>> =
                        get_json(store, VOTING_DEADLINE_KEY).await?;
                    if current != Some(expected) {
                        debug!(%expected, ?current, "Ignoring alarm for a superseded window");
                        return Ok(None);
                    }
                }

                let votes: VoteRecord = get_json(store, VOTES_KEY).await?.unwrap_or_default();
                set_json(store, VOTING_OPEN_KEY, &false).await?;
                set_json(store, VOTES_KEY, &VoteRecord::new()).await?;
                store.delete(VOTING_DEADLINE_KEY).await?;

                let ranked = rank_votes(votes.values());
                info!(voters = votes.len(), answers = ranked.len(), "Voting window closed");
                Ok(Some(format_summary(&ranked)))
            })
            .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_utils::RecordingAlarm;
    use proptest::prelude::*;

    fn tally(store: &MemoryStore) -> VoteTally<'_, MemoryStore> {
        VoteTally::new(store, LockConfig::DEFAULT)
    }

    fn strings(votes: &[&str]) -> Vec<String> {
        votes.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn window_length_defaults() {
        assert_eq!(parse_window_secs(None), Duration::from_secs(30));
        assert_eq!(parse_window_secs(Some("soon")), Duration::from_secs(30));
        assert_eq!(parse_window_secs(Some("0")), Duration::from_secs(30));
        assert_eq!(parse_window_secs(Some("45")), Duration::from_secs(45));
        assert_eq!(parse_window_secs(Some("99999")), Duration::from_secs(3600));
    }

    #[test]
    fn move_heuristic() {
        assert!(is_plausible_move("e4"));
        assert!(is_plausible_move("Nf3"));
        assert!(is_plausible_move("I think E5 is best"));
        assert!(!is_plausible_move("hello"));
        assert!(!is_plausible_move("i9"));
        assert!(!is_plausible_move(""));
    }

    #[test]
    fn tie_at_cutoff_keeps_every_tied_answer() {
        // Four voters, three distinct answers counted 2, 1, 1.
        let votes = strings(&["e4", "e4", "d4", "c4"]);
        let ranked = rank_votes(&votes);
        assert_eq!(
            ranked,
            vec![
                ("e4".to_string(), 2),
                ("c4".to_string(), 1),
                ("d4".to_string(), 1)
            ]
        );
    }

    #[test]
    fn tie_below_third_place_is_kept() {
        let votes = strings(&["e4", "e4", "e4", "d4", "d4", "c4", "f4", "g4"]);
        let ranked = rank_votes(&votes);
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0], ("e4".to_string(), 3));
        assert_eq!(ranked[1], ("d4".to_string(), 2));
    }

    #[test]
    fn answers_below_cutoff_are_dropped() {
        let votes = strings(&["e4", "e4", "e4", "d4", "d4", "c4", "c4", "f4"]);
        let ranked = rank_votes(&votes);
        assert_eq!(
            ranked.iter().map(|(t, _)| t.as_str()).collect::<Vec<_>>(),
            vec!["e4", "c4", "d4"]
        );
    }

    #[test]
    fn summary_wording() {
        assert_eq!(format_summary(&[]), "Voting closed: no votes were cast.");
        assert_eq!(
            format_summary(&[("e4".to_string(), 2), ("d4".to_string(), 1)]),
            "Voting closed: e4 (2 votes), d4 (1 vote)"
        );
    }

    #[tokio::test]
    async fn votes_rejected_while_closed() {
        let store = MemoryStore::new();
        let outcome = tally(&store).record_vote("alice", "e4").await.unwrap();
        assert_eq!(outcome, RecordOutcome::WindowClosed);
        assert_eq!(store.peek(VOTES_KEY).await, None);
    }

    #[tokio::test]
    async fn full_window_lifecycle() {
        let store = MemoryStore::new();
        let alarm = RecordingAlarm::default();
        let tally = tally(&store);

        let deadline = tally
            .start_window(Duration::from_secs(30), &alarm)
            .await
            .unwrap();
        assert_eq!(alarm.scheduled(), vec![(Duration::from_secs(30), deadline)]);

        for (voter, text) in [("a", "e4"), ("b", "e4"), ("c", "d4"), ("d", "c4")] {
            assert_eq!(tally.record_vote(voter, text).await.unwrap(), RecordOutcome::Recorded);
        }
        assert_eq!(tally.record_vote("e", "gg").await.unwrap(), RecordOutcome::NotAMove);

        let summary = tally.end_window().await.unwrap().unwrap();
        assert_eq!(summary, "Voting closed: e4 (2 votes), c4 (1 vote), d4 (1 vote)");

        assert!(!tally.is_open().await.unwrap());
        assert_eq!(store.peek(VOTES_KEY).await, Some(serde_json::json!({})));
        assert_eq!(tally.end_window().await.unwrap(), None);
    }

    #[tokio::test]
    async fn later_vote_replaces_earlier() {
        let store = MemoryStore::new();
        let tally = tally(&store);
        tally
            .start_window(Duration::from_secs(30), &RecordingAlarm::default())
            .await
            .unwrap();

        tally.record_vote("alice", "e4").await.unwrap();
        tally.record_vote("alice", "d4").await.unwrap();

        let summary = tally.end_window().await.unwrap().unwrap();
        assert_eq!(summary, "Voting closed: d4 (1 vote)");
    }

    #[tokio::test]
    async fn starting_a_window_clears_old_votes() {
        let store = MemoryStore::new();
        let alarm = RecordingAlarm::default();
        let tally = tally(&store);

        tally.start_window(Duration::from_secs(30), &alarm).await.unwrap();
        tally.record_vote("alice", "e4").await.unwrap();
        tally.start_window(Duration::from_secs(30), &alarm).await.unwrap();

        assert_eq!(store.peek(VOTES_KEY).await, Some(serde_json::json!({})));
    }

    #[tokio::test]
    async fn stale_alarm_does_not_close_new_window() {
        let store = MemoryStore::new();
        let alarm = RecordingAlarm::default();
        let tally = tally(&store);

        let first = tally.start_window(Duration::from_secs(30), &alarm).await.unwrap();
        tally.end_window().await.unwrap();
        let second = tally.start_window(Duration::from_secs(60), &alarm).await.unwrap();
        assert_ne!(first, second);

        assert_eq!(tally.end_scheduled_window(first).await.unwrap(), None);
        assert!(tally.is_open().await.unwrap());

        assert!(tally.end_scheduled_window(second).await.unwrap().is_some());
        assert!(!tally.is_open().await.unwrap());
    }

    #[tokio::test]
    async fn toggle_flips_vote_mode() {
        let store = MemoryStore::new();
        let tally = tally(&store);
        assert!(!tally.vote_mode().await.unwrap());
        assert!(tally.toggle_vote_mode().await.unwrap());
        assert!(tally.vote_mode().await.unwrap());
        assert!(!tally.toggle_vote_mode().await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn held_votes_lock_reports_busy() {
        let store = MemoryStore::new();
        store.set(LockName::Votes.key(), serde_json::json!(true)).await.unwrap();
        let err = tally(&store).toggle_vote_mode().await.unwrap_err();
        assert!(matches!(err, VoteError::Busy(_)));
    }

    proptest! {
        #[test]
        fn ranking_is_ordered_and_keeps_top_answer(
            votes in prop::collection::vec("[a-c][1-3]", 1..40)
        ) {
            let ranked = rank_votes(&votes);
            prop_assert!(!ranked.is_empty());
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].1 >= pair[1].1);
            }
            let mut counts: HashMap<&String, usize> = HashMap::new();
            for v in &votes {
                *counts.entry(v).or_default() += 1;
            }
            let max = counts.values().copied().max().unwrap_or(0);
            prop_assert_eq!(ranked[0].1, max);
            // At most two answers strictly above the last kept count.
            let last = ranked[ranked.len() - 1].1;
            prop_assert!(ranked.iter().filter(|(_, c)| *c > last).count() < SUMMARY_PLACES);
        }
    }
}
