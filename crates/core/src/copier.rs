//! Execution of the session's resource copies.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::CopyTask;

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("Destination already exists (two resources flatten to the same name): {}", .dest.display())]
    DuplicateDestination { dest: PathBuf },
}

/// Copy tasks accumulated while walking one document, deduplicated and in
/// first-seen order.
#[derive(Debug, Default)]
pub struct PendingCopies {
    tasks: Vec<CopyTask>,
    seen: HashSet<CopyTask>,
}

/// What happened when the pending copies ran
#[derive(Debug)]
pub struct CopyOutcome {
    /// Source paths copied, in task order
    pub copied: Vec<PathBuf>,
    /// Source paths that failed, with the underlying error
    pub failures: Vec<(PathBuf, std::io::Error)>,
}

impl PendingCopies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task; an exact repeat of an earlier task is dropped.
    pub fn push(&mut self, task: CopyTask) {
        if self.seen.insert(task.clone()) {
            self.tasks.push(task);
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Run every task. A destination that already exists aborts the
    /// session; a copy that fails for any other reason is recorded and
    /// execution continues.
    pub fn execute(self) -> Result<CopyOutcome, CopyError> {
        let mut copied = Vec::new();
        let mut failures = Vec::new();

        for task in self.tasks {
            if task.dest.exists() {
                return Err(CopyError::DuplicateDestination { dest: task.dest });
            }
            match fs::copy(&task.source, &task.dest) {
                Ok(_) => copied.push(task.source),
                Err(error) => failures.push((task.source, error)),
            }
        }

        Ok(CopyOutcome { copied, failures })
    }
}
