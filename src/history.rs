//! Input snapshot history: linear undo/redo over (file-set, prompt) pairs.
//!
//! The history is a plain ordered sequence of snapshots plus a cursor.
//! Committing while the cursor is behind the tail truncates the forward
//! branch first — there is no branching history. Undo and redo move the
//! cursor and return the snapshot at the new position; at either end they
//! are no-ops returning the current snapshot.
//!
//! Replay (undo/redo) must not itself re-enter the history: instead of a
//! shared reentrancy flag, every mutation carries an explicit [`EditSource`]
//! and the history layer ignores `Replay`-sourced records.
//!
//! Structural edits commit immediately; free-text prompt edits are debounced
//! through [`PromptDebouncer`], an explicit cancellable pending commit owned
//! by the caller's edit loop. The history itself is not persisted across
//! process restarts.

use std::time::{Duration, Instant};

use crate::types::{InputSnapshot, PROMPT_DEBOUNCE_MS};

/// Origin of a mutation reaching the history layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditSource {
    /// A committed user edit: recorded.
    UserEdit,
    /// State restoration during undo/redo: never recorded.
    Replay,
}

/// Ordered snapshot sequence with a cursor. The cursor is always a valid
/// index into the sequence.
#[derive(Debug, Clone)]
pub struct InputSnapshotHistory {
    snapshots: Vec<InputSnapshot>,
    cursor: usize,
}

impl InputSnapshotHistory {
    /// Create a history seeded with a single initial snapshot at cursor 0.
    #[must_use]
    pub fn new(initial: InputSnapshot) -> Self {
        Self {
            snapshots: vec![initial],
            cursor: 0,
        }
    }

    /// Record a snapshot.
    ///
    /// `Replay`-sourced records are ignored. For user edits, any snapshots
    /// ahead of the cursor are discarded before the new snapshot is appended
    /// and the cursor advances to the new tail.
    pub fn record(&mut self, snapshot: InputSnapshot, source: EditSource) {
        if source == EditSource::Replay {
            return;
        }
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
    }

    /// Step the cursor back and return the snapshot there. No-op at the
    /// start; returns the current snapshot either way.
    pub fn undo(&mut self) -> &InputSnapshot {
        if self.cursor > 0 {
            self.cursor -= 1;
        }
        &self.snapshots[self.cursor]
    }

    /// Step the cursor forward and return the snapshot there. No-op at the
    /// tail; returns the current snapshot either way.
    pub fn redo(&mut self) -> &InputSnapshot {
        if self.cursor + 1 < self.snapshots.len() {
            self.cursor += 1;
        }
        &self.snapshots[self.cursor]
    }

    /// Snapshot at the cursor.
    #[must_use]
    pub fn current(&self) -> &InputSnapshot {
        &self.snapshots[self.cursor]
    }

    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Replace the entire history with a single initial snapshot at
    /// cursor 0 (new-project reset).
    pub fn reset(&mut self, initial: InputSnapshot) {
        self.snapshots = vec![initial];
        self.cursor = 0;
    }

    /// Number of retained snapshots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        // A history always holds at least its initial snapshot.
        false
    }

    /// Current cursor position.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }
}

impl Default for InputSnapshotHistory {
    fn default() -> Self {
        Self::new(InputSnapshot::default())
    }
}

/// Pending debounced prompt commit.
#[derive(Debug, Clone)]
struct PendingCommit {
    snapshot: InputSnapshot,
    due: Instant,
}

/// Explicit cancellable scheduled commit for free-text prompt edits.
///
/// At most one commit is pending at a time: each qualifying edit replaces
/// the previous pending commit and restarts the quiet-period deadline, so a
/// burst of keystrokes collapses into one history entry. The owner polls
/// [`take_due`](Self::take_due) (or selects on [`deadline`](Self::deadline))
/// and records the snapshot it yields; structural edits call
/// [`cancel`](Self::cancel) because their own immediate snapshot already
/// carries the current prompt text.
#[derive(Debug, Clone)]
pub struct PromptDebouncer {
    window: Duration,
    pending: Option<PendingCommit>,
}

impl PromptDebouncer {
    /// Debouncer with the standard 1000 ms quiet period.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(Duration::from_millis(PROMPT_DEBOUNCE_MS))
    }

    /// Debouncer with a custom quiet period.
    #[must_use]
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            pending: None,
        }
    }

    /// Schedule a commit of `snapshot` for `now + window`, replacing any
    /// pending commit.
    pub fn schedule(&mut self, snapshot: InputSnapshot, now: Instant) {
        self.pending = Some(PendingCommit {
            snapshot,
            due: now + self.window,
        });
    }

    /// Drop the pending commit, if any.
    pub fn cancel(&mut self) {
        self.pending = None;
    }

    /// Take the pending snapshot if its quiet period has elapsed at `now`.
    pub fn take_due(&mut self, now: Instant) -> Option<InputSnapshot> {
        if self.pending.as_ref().is_some_and(|p| now >= p.due) {
            self.pending.take().map(|p| p.snapshot)
        } else {
            None
        }
    }

    /// Take the pending snapshot immediately, regardless of its deadline.
    pub fn flush(&mut self) -> Option<InputSnapshot> {
        self.pending.take().map(|p| p.snapshot)
    }

    /// Deadline of the pending commit, if one exists.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.pending.as_ref().map(|p| p.due)
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Default for PromptDebouncer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InputFile;

    fn snap(prompt: &str) -> InputSnapshot {
        InputSnapshot::new(vec![], prompt)
    }

    #[test]
    fn undo_then_redo_restores_pre_undo_snapshot() {
        let mut history = InputSnapshotHistory::new(snap(""));
        history.record(snap("a"), EditSource::UserEdit);
        history.record(snap("ab"), EditSource::UserEdit);

        let before = history.current().clone();
        history.undo();
        assert_eq!(history.current().prompt, "a");
        let restored = history.redo().clone();
        assert_eq!(restored, before);
    }

    #[test]
    fn undo_at_start_is_noop_returning_current() {
        let mut history = InputSnapshotHistory::new(snap("init"));
        let current = history.undo().clone();
        assert_eq!(current.prompt, "init");
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn redo_at_tail_is_noop() {
        let mut history = InputSnapshotHistory::new(snap("init"));
        history.record(snap("x"), EditSource::UserEdit);
        let current = history.redo().clone();
        assert_eq!(current.prompt, "x");
        assert_eq!(history.cursor(), 1);
    }

    #[test]
    fn commit_after_undo_truncates_forward_branch() {
        let mut history = InputSnapshotHistory::new(snap(""));
        history.record(snap("a"), EditSource::UserEdit);
        history.record(snap("b"), EditSource::UserEdit);
        history.undo();
        history.undo();
        assert_eq!(history.current().prompt, "");

        history.record(snap("c"), EditSource::UserEdit);
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        // The discarded branch is unreachable even via repeated redo.
        assert_eq!(history.redo().prompt, "c");
    }

    #[test]
    fn replay_sourced_records_are_ignored() {
        let mut history = InputSnapshotHistory::new(snap(""));
        history.record(snap("a"), EditSource::UserEdit);
        history.record(snap("restored"), EditSource::Replay);
        assert_eq!(history.len(), 2);
        assert_eq!(history.current().prompt, "a");
    }

    #[test]
    fn reset_replaces_history_with_single_snapshot() {
        let mut history = InputSnapshotHistory::new(snap(""));
        history.record(snap("a"), EditSource::UserEdit);
        history.record(snap("b"), EditSource::UserEdit);
        history.reset(snap("fresh"));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert_eq!(history.current().prompt, "fresh");
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn structural_snapshots_capture_file_sets() {
        let mut history = InputSnapshotHistory::new(snap(""));
        let file = InputFile::new("a.txt", "alpha");
        history.record(
            InputSnapshot::new(vec![file.clone()], ""),
            EditSource::UserEdit,
        );
        history.record(InputSnapshot::new(vec![], ""), EditSource::UserEdit);

        let undone = history.undo().clone();
        assert_eq!(undone.files, vec![file]);
    }

    #[test]
    fn debouncer_fires_only_after_quiet_period() {
        let mut debouncer = PromptDebouncer::with_window(Duration::from_millis(1000));
        let t0 = Instant::now();
        debouncer.schedule(snap("hel"), t0);

        assert!(debouncer.take_due(t0 + Duration::from_millis(500)).is_none());
        let committed = debouncer.take_due(t0 + Duration::from_millis(1000)).unwrap();
        assert_eq!(committed.prompt, "hel");
        assert!(!debouncer.has_pending());
    }

    #[test]
    fn later_edit_restarts_the_window() {
        let mut debouncer = PromptDebouncer::with_window(Duration::from_millis(1000));
        let t0 = Instant::now();
        debouncer.schedule(snap("hel"), t0);
        debouncer.schedule(snap("hello"), t0 + Duration::from_millis(900));

        // Original deadline passes without a commit.
        assert!(debouncer.take_due(t0 + Duration::from_millis(1000)).is_none());
        let committed = debouncer.take_due(t0 + Duration::from_millis(1900)).unwrap();
        assert_eq!(committed.prompt, "hello");
    }

    #[test]
    fn cancel_drops_pending_commit() {
        let mut debouncer = PromptDebouncer::with_window(Duration::from_millis(1000));
        let t0 = Instant::now();
        debouncer.schedule(snap("typing"), t0);
        debouncer.cancel();
        assert!(debouncer.take_due(t0 + Duration::from_secs(10)).is_none());
    }

    #[test]
    fn flush_commits_immediately() {
        let mut debouncer = PromptDebouncer::with_window(Duration::from_millis(1000));
        debouncer.schedule(snap("now"), Instant::now());
        assert_eq!(debouncer.flush().unwrap().prompt, "now");
        assert!(debouncer.flush().is_none());
    }
}
