//! In-memory task bookkeeping owned by a single agent run.
//!
//! Every operation returns a human-readable string for the model. Failures
//! (bad id, unknown id, invalid status or priority) are `ERROR:`-prefixed
//! strings rather than `Err`, matching the tool boundary contract.

use std::collections::BTreeMap;

use crate::core::types::{StatusCounts, Task, TaskPriority, TaskStatus};

/// Ordered task collection with a monotonic id counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskManager {
    tasks: BTreeMap<u64, Task>,
    next_id: u64,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl TaskManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a task and return its id. Ids start at 1 and are never reused.
    pub fn insert(&mut self, description: &str, priority: TaskPriority) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(
            id,
            Task {
                id,
                description: description.trim().to_string(),
                status: TaskStatus::Pending,
                priority,
            },
        );
        id
    }

    pub fn create(&mut self, description: &str, priority: &str) -> String {
        if description.trim().is_empty() {
            return "ERROR: Task description must not be empty".to_string();
        }
        let Some(priority) = TaskPriority::parse(priority.trim()) else {
            return format!("ERROR: Invalid priority '{priority}'. Use: low, medium, high");
        };
        let id = self.insert(description, priority);
        format!("Created task #{id}: {}", description.trim())
    }

    pub fn list(&self) -> String {
        if self.tasks.is_empty() {
            return "No tasks created yet".to_string();
        }
        let mut lines: Vec<String> = self
            .tasks
            .values()
            .map(|task| {
                format!(
                    "#{}: {} [{}] ({})",
                    task.id, task.description, task.status, task.priority
                )
            })
            .collect();
        let counts = self.counts();
        lines.push(String::new());
        lines.push(format!(
            "Summary: {} pending, {} in progress, {} completed",
            counts.pending, counts.in_progress, counts.completed
        ));
        lines.join("\n")
    }

    pub fn complete(&mut self, task_id: &str) -> String {
        let task = match self.lookup_mut(task_id) {
            Ok(task) => task,
            Err(message) => return message,
        };
        task.status = TaskStatus::Completed;
        format!("Completed task #{}: {}", task.id, task.description)
    }

    pub fn update(&mut self, task_id: &str, status: &str) -> String {
        let Some(new_status) = TaskStatus::parse(status.trim()) else {
            return format!(
                "ERROR: Invalid status '{status}'. Use: pending, in_progress, completed"
            );
        };
        let task = match self.lookup_mut(task_id) {
            Ok(task) => task,
            Err(message) => return message,
        };
        let old_status = task.status;
        task.status = new_status;
        format!(
            "Updated task #{} from '{}' to '{}'",
            task.id, old_status, new_status
        )
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.get(&id)
    }

    /// Tasks in id order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for task in self.tasks.values() {
            match task.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::InProgress => counts.in_progress += 1,
                TaskStatus::Completed => counts.completed += 1,
            }
        }
        counts
    }

    /// Open tasks, highest priority first, then in-progress before pending, then by id.
    pub fn next_priorities(&self, limit: usize) -> Vec<&Task> {
        let mut open: Vec<&Task> = self
            .tasks
            .values()
            .filter(|task| task.status.is_open())
            .collect();
        open.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.status.cmp(&a.status))
                .then_with(|| a.id.cmp(&b.id))
        });
        open.truncate(limit);
        open
    }

    fn lookup_mut(&mut self, task_id: &str) -> Result<&mut Task, String> {
        let id = parse_task_id(task_id)?;
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| format!("ERROR: Task #{id} not found"))
    }
}

fn parse_task_id(raw: &str) -> Result<u64, String> {
    raw.trim()
        .trim_start_matches('#')
        .parse::<u64>()
        .map_err(|_| format!("ERROR: Invalid task ID '{raw}'. Use a number."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_sequential_despite_interleaved_updates() {
        let mut manager = TaskManager::new();
        let mut ids = Vec::new();
        for n in 0..5 {
            ids.push(manager.insert(&format!("task {n}"), TaskPriority::Medium));
            manager.complete("1");
            manager.update(&n.to_string(), "in_progress");
            manager.update("99", "pending");
        }
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        let stored: Vec<u64> = manager.tasks().map(|task| task.id).collect();
        assert_eq!(stored, ids);
    }

    #[test]
    fn create_reports_id_and_description() {
        let mut manager = TaskManager::new();
        assert_eq!(manager.create("Set up schema", "high"), "Created task #1: Set up schema");
        assert_eq!(manager.create("Write tests", "medium"), "Created task #2: Write tests");
        assert_eq!(manager.get(1).map(|task| task.priority), Some(TaskPriority::High));
    }

    #[test]
    fn create_rejects_unknown_priority_without_consuming_an_id() {
        let mut manager = TaskManager::new();
        let message = manager.create("x", "urgent");
        assert!(message.starts_with("ERROR: Invalid priority 'urgent'"), "{message}");
        assert_eq!(manager.create("y", "low"), "Created task #1: y");
    }

    #[test]
    fn list_on_empty_manager() {
        assert_eq!(TaskManager::new().list(), "No tasks created yet");
    }

    #[test]
    fn list_includes_status_summary() {
        let mut manager = TaskManager::new();
        manager.create("a", "low");
        manager.create("b", "medium");
        manager.create("c", "high");
        manager.update("2", "in_progress");
        manager.complete("3");
        let listing = manager.list();
        assert!(listing.contains("#1: a [pending] (low)"), "{listing}");
        assert!(listing.contains("#2: b [in_progress] (medium)"), "{listing}");
        assert!(
            listing.ends_with("Summary: 1 pending, 1 in progress, 1 completed"),
            "{listing}"
        );
    }

    #[test]
    fn update_validates_status_and_id() {
        let mut manager = TaskManager::new();
        manager.create("a", "medium");
        assert_eq!(
            manager.update("1", "done"),
            "ERROR: Invalid status 'done'. Use: pending, in_progress, completed"
        );
        assert_eq!(manager.update("7", "pending"), "ERROR: Task #7 not found");
        assert_eq!(
            manager.update("one", "pending"),
            "ERROR: Invalid task ID 'one'. Use a number."
        );
        assert_eq!(
            manager.update("#1", "in_progress"),
            "Updated task #1 from 'pending' to 'in_progress'"
        );
    }

    #[test]
    fn complete_reports_missing_task() {
        let mut manager = TaskManager::new();
        assert_eq!(manager.complete("1"), "ERROR: Task #1 not found");
    }

    #[test]
    fn next_priorities_orders_by_priority_then_id() {
        let mut manager = TaskManager::new();
        manager.create("low one", "low");
        manager.create("high one", "high");
        manager.create("medium one", "medium");
        manager.create("high two", "high");
        manager.complete("4");
        let ids: Vec<u64> = manager
            .next_priorities(5)
            .into_iter()
            .map(|task| task.id)
            .collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(manager.next_priorities(1).len(), 1);
    }
}
