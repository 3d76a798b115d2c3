use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Serialize)]
pub struct FailedItem {
    pub id: String,
    pub reason: String,
}

/// Outcome of a batch refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedItem>,
    pub skipped: usize,
    pub pruned: usize,
    /// Detail records written; fnpack repositories can yield several each.
    pub records_written: usize,
}

impl BatchReport {
    pub fn record_failure(&mut self, id: impl Into<String>, reason: impl ToString) {
        self.failed.push(FailedItem {
            id: id.into(),
            reason: reason.to_string(),
        });
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} succeeded, {} failed, {} skipped, {} pruned, {} records written",
            self.succeeded,
            self.total,
            self.failed.len(),
            self.skipped,
            self.pruned,
            self.records_written
        )
    }
}
