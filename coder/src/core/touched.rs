//! Bounded, de-duplicated record of recently written paths.

use std::collections::VecDeque;

/// Most-recent-last list of workspace-relative paths.
#[derive(Debug, Clone)]
pub struct TouchedFiles {
    paths: VecDeque<String>,
    capacity: usize,
}

impl Default for TouchedFiles {
    fn default() -> Self {
        Self::new(20)
    }
}

impl TouchedFiles {
    pub fn new(capacity: usize) -> Self {
        Self {
            paths: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Move `path` to the most recent position, evicting the oldest when full.
    ///
    /// Spellings of one relative path (`src/a.py`, `./src/a.py`,
    /// `src//a.py`) share a single entry.
    pub fn record(&mut self, path: &str) {
        let path = normalize(path);
        if path.is_empty() {
            return;
        }
        self.paths.retain(|existing| *existing != path);
        self.paths.push_back(path);
        while self.paths.len() > self.capacity {
            self.paths.pop_front();
        }
    }

    /// Paths from most to least recent.
    pub fn recent(&self) -> impl Iterator<Item = &str> {
        self.paths.iter().rev().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Drop empty and `.` segments; `..` folds into a preceding named segment.
fn normalize(path: &str) -> String {
    let path = path.trim();
    let mut parts: Vec<&str> = Vec::new();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|last| *last != "..") => {
                parts.pop();
            }
            part => parts.push(part),
        }
    }
    let joined = parts.join("/");
    if path.starts_with('/') && !joined.is_empty() {
        format!("/{joined}")
    } else {
        joined
    }
}
