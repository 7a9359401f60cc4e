//! Queue entries and ordering rules.

use serde::{Deserialize, Serialize};

/// One viewer waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    /// Chat login of the viewer.
    pub user: String,

    /// The viewer's profile on the chess site they want to play on.
    pub profile: String,

    /// Subscribers are placed ahead of everyone without priority.
    pub priority: bool,
}

impl QueueEntry {
    pub fn new(user: impl Into<String>, profile: impl Into<String>, priority: bool) -> Self {
        Self {
            user: user.into(),
            profile: profile.into(),
            priority,
        }
    }

    /// True if `identifier` names this entry's user or profile.
    pub fn matches(&self, identifier: &str) -> bool {
        self.user.eq_ignore_ascii_case(identifier) || self.profile.eq_ignore_ascii_case(identifier)
    }
}

/// Result of trying to add an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Added at this 1-based position.
    Added { position: usize },
    /// The user already has an entry.
    DuplicateUser,
    /// Someone already queued with this profile.
    DuplicateProfile,
}

/// The ordered queue as persisted: a single JSON array.
///
/// Users and profiles are unique (ASCII case-insensitively), and every
/// priority entry precedes every non-priority entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Queue {
    entries: Vec<QueueEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds an entry unless its user or profile is already queued.
    ///
    /// Priority entries go after the last existing priority entry;
    /// everything else goes to the tail.
    pub fn enqueue(&mut self, entry: QueueEntry) -> EnqueueOutcome {
        if self
            .entries
            .iter()
            .any(|e| e.user.eq_ignore_ascii_case(&entry.user))
        {
            return EnqueueOutcome::DuplicateUser;
        }
        if self
            .entries
            .iter()
            .any(|e| e.profile.eq_ignore_ascii_case(&entry.profile))
        {
            return EnqueueOutcome::DuplicateProfile;
        }

        let index = if entry.priority {
            self.priority_len()
        } else {
            self.entries.len()
        };
        self.entries.insert(index, entry);
        EnqueueOutcome::Added {
            position: index + 1,
        }
    }

    /// Removes and returns the head.
    pub fn dequeue(&mut self) -> Option<QueueEntry> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    /// Finds `user` and its 1-based position.
    pub fn position(&self, user: &str) -> Option<(&QueueEntry, usize)> {
        self.entries
            .iter()
            .enumerate()
            .find(|(_, e)| e.user.eq_ignore_ascii_case(user))
            .map(|(i, e)| (e, i + 1))
    }

    /// Removes the entry whose user or profile is `identifier`.
    pub fn remove(&mut self, identifier: &str) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|e| e.matches(identifier))?;
        Some(self.entries.remove(index))
    }

    /// Removes `user`'s own entry, ignoring profile names.
    pub fn remove_user(&mut self, user: &str) -> Option<QueueEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| e.user.eq_ignore_ascii_case(user))?;
        Some(self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Length of the priority prefix.
    fn priority_len(&self) -> usize {
        self.entries
            .iter()
            .position(|e| !e.priority)
            .unwrap_or(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn queue_of(entries: &[(&str, &str, bool)]) -> Queue {
        let mut queue = Queue::new();
        for (user, profile, priority) in entries {
            queue.enqueue(QueueEntry::new(*user, *profile, *priority));
        }
        queue
    }

    fn users(queue: &Queue) -> Vec<&str> {
        queue.entries().iter().map(|e| e.user.as_str()).collect()
    }

    #[test]
    fn non_priority_appends_to_tail() {
        let mut queue = queue_of(&[("u1", "p1", false)]);
        let outcome = queue.enqueue(QueueEntry::new("u2", "p2", false));

        assert_eq!(outcome, EnqueueOutcome::Added { position: 2 });
        assert_eq!(users(&queue), ["u1", "u2"]);
    }

    #[test]
    fn priority_entry_jumps_non_priority() {
        let mut queue = queue_of(&[("u1", "p1", false)]);
        let outcome = queue.enqueue(QueueEntry::new("u2", "p2", true));

        assert_eq!(outcome, EnqueueOutcome::Added { position: 1 });
        assert_eq!(
            queue.entries(),
            [
                QueueEntry::new("u2", "p2", true),
                QueueEntry::new("u1", "p1", false)
            ]
        );
    }

    #[test]
    fn priority_entries_keep_insertion_order() {
        let mut queue = queue_of(&[("a", "pa", true), ("b", "pb", false), ("c", "pc", false)]);
        let outcome = queue.enqueue(QueueEntry::new("d", "pd", true));

        assert_eq!(outcome, EnqueueOutcome::Added { position: 2 });
        assert_eq!(users(&queue), ["a", "d", "b", "c"]);
    }

    #[test]
    fn priority_into_all_priority_queue_appends() {
        let mut queue = queue_of(&[("a", "pa", true)]);
        assert_eq!(
            queue.enqueue(QueueEntry::new("b", "pb", true)),
            EnqueueOutcome::Added { position: 2 }
        );
    }

    #[test]
    fn duplicate_user_rejected_before_profile() {
        let mut queue = queue_of(&[("u1", "p1", false)]);

        assert_eq!(
            queue.enqueue(QueueEntry::new("u1", "p1", false)),
            EnqueueOutcome::DuplicateUser
        );
        assert_eq!(
            queue.enqueue(QueueEntry::new("U1", "other", true)),
            EnqueueOutcome::DuplicateUser
        );
        assert_eq!(
            queue.enqueue(QueueEntry::new("u2", "P1", false)),
            EnqueueOutcome::DuplicateProfile
        );
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn dequeue_empty_returns_none() {
        let mut queue = Queue::new();
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn dequeue_returns_head() {
        let mut queue = queue_of(&[("u1", "p1", false), ("u2", "p2", true)]);
        assert_eq!(queue.dequeue().map(|e| e.user), Some("u2".to_string()));
        assert_eq!(users(&queue), ["u1"]);
    }

    #[test]
    fn remove_by_user_or_profile() {
        let mut queue = queue_of(&[("u1", "p1", false), ("u2", "p2", false)]);

        assert_eq!(queue.remove("p2").map(|e| e.user), Some("u2".to_string()));
        assert_eq!(queue.remove("U1").map(|e| e.profile), Some("p1".to_string()));
        assert_eq!(queue.remove("u1"), None);
        assert!(queue.is_empty());
    }

    #[test]
    fn remove_user_skips_profiles() {
        let mut queue = queue_of(&[("u1", "u2", false), ("u2", "p2", false)]);

        assert_eq!(queue.remove_user("U2").map(|e| e.profile), Some("p2".to_string()));
        assert_eq!(queue.remove_user("u2"), None);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn position_is_one_based() {
        let queue = queue_of(&[("u1", "p1", false), ("u2", "p2", false)]);
        let (entry, position) = queue.position("u2").unwrap();
        assert_eq!(entry.profile, "p2");
        assert_eq!(position, 2);
        assert!(queue.position("nobody").is_none());
    }

    #[test]
    fn persists_as_plain_array() {
        let queue = queue_of(&[("u1", "p1", true)]);
        let json = serde_json::to_value(&queue).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{"user": "u1", "profile": "p1", "priority": true}])
        );
    }

    fn arb_entry() -> impl Strategy<Value = QueueEntry> {
        ("[a-d]", "[w-z]", any::<bool>()).prop_map(|(u, p, pri)| QueueEntry::new(u, p, pri))
    }

    proptest! {
        /// Uniqueness and the priority prefix hold after any enqueue sequence.
        #[test]
        fn enqueue_preserves_invariants(entries in prop::collection::vec(arb_entry(), 0..20)) {
            let mut queue = Queue::new();
            for entry in entries {
                queue.enqueue(entry);
            }

            let list = queue.entries();
            for (i, a) in list.iter().enumerate() {
                for b in &list[i + 1..] {
                    prop_assert!(!a.user.eq_ignore_ascii_case(&b.user));
                    prop_assert!(!a.profile.eq_ignore_ascii_case(&b.profile));
                }
            }

            let first_plain = list.iter().position(|e| !e.priority).unwrap_or(list.len());
            prop_assert!(list[first_plain..].iter().all(|e| !e.priority));
        }

        /// The reported position agrees with the resulting order.
        #[test]
        fn added_position_matches_order(
            entries in prop::collection::vec(arb_entry(), 0..12),
            extra in arb_entry(),
        ) {
            let mut queue = Queue::new();
            for entry in entries {
                queue.enqueue(entry);
            }

            if let EnqueueOutcome::Added { position } = queue.enqueue(extra.clone()) {
                prop_assert_eq!(&queue.entries()[position - 1], &extra);
                let (_, found) = queue.position(&extra.user).unwrap();
                prop_assert_eq!(found, position);
            }
        }
    }
}
