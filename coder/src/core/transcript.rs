//! Append-only conversation history and the bounded replay window.

use serde::{Deserialize, Serialize};

use crate::core::types::TranscriptEntry;

/// How much history is replayed into each prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContextWindow {
    /// Replay every entry.
    Unbounded,
    /// Replay only the most recent `n` entries.
    LastEntries(usize),
}

impl ContextWindow {
    /// `0` means unbounded, matching the `history_window` config convention.
    pub fn from_limit(limit: usize) -> Self {
        if limit == 0 {
            Self::Unbounded
        } else {
            Self::LastEntries(limit)
        }
    }
}

/// Complete history of one agent run. Entries are never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(TranscriptEntry::assistant(content));
    }

    pub fn push_tool(&mut self, content: impl Into<String>) {
        self.push(TranscriptEntry::tool(content));
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    /// The tail of the history selected by `window`.
    pub fn window(&self, window: ContextWindow) -> &[TranscriptEntry] {
        match window {
            ContextWindow::Unbounded => &self.entries,
            ContextWindow::LastEntries(n) => {
                let start = self.entries.len().saturating_sub(n);
                &self.entries[start..]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Role;

    fn transcript_with(n: usize) -> Transcript {
        let mut transcript = Transcript::new();
        for i in 0..n {
            transcript.push_assistant(format!("a{i}"));
            transcript.push_tool(format!("t{i}"));
        }
        transcript
    }

    #[test]
    fn window_keeps_most_recent_entries() {
        let transcript = transcript_with(5);
        let tail = transcript.window(ContextWindow::LastEntries(3));
        let contents: Vec<&str> = tail.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(contents, vec!["t3", "a4", "t4"]);
        assert_eq!(transcript.len(), 10);
    }

    #[test]
    fn window_larger_than_history_returns_everything() {
        let transcript = transcript_with(1);
        assert_eq!(transcript.window(ContextWindow::LastEntries(40)).len(), 2);
        assert_eq!(transcript.window(ContextWindow::Unbounded).len(), 2);
    }

    #[test]
    fn zero_limit_means_unbounded() {
        assert_eq!(ContextWindow::from_limit(0), ContextWindow::Unbounded);
        assert_eq!(ContextWindow::from_limit(6), ContextWindow::LastEntries(6));
    }

    #[test]
    fn entries_keep_roles() {
        let transcript = transcript_with(1);
        assert_eq!(transcript.entries()[0].role, Role::Assistant);
        assert_eq!(transcript.entries()[1].label(), "TOOL_RESULT");
    }
}
