//! Recent operation results.
//!
//! Every remote operation leaves an [`OperationResult`] behind so the fleet
//! can ask later how it went. Only the newest entries are kept.

use std::collections::VecDeque;

use chrono::Utc;
use hashfleet_core::OperationResult;
use parking_lot::Mutex;

/// Default number of results kept.
pub const DEFAULT_OPERATION_CAPACITY: usize = 50;

/// A bounded, thread-safe log of operation results.
#[derive(Debug)]
pub struct OperationResultSet {
    capacity: usize,
    items: Mutex<VecDeque<OperationResult>>,
}

impl Default for OperationResultSet {
    fn default() -> Self {
        Self::new(DEFAULT_OPERATION_CAPACITY)
    }
}

impl OperationResultSet {
    /// A log keeping at most `capacity` results (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record an outcome stamped with the current time and return it.
    pub fn record(
        &self,
        operation: impl Into<String>,
        state_code: u16,
        description: impl Into<String>,
    ) -> OperationResult {
        let result = OperationResult {
            timestamp: Utc::now().timestamp_millis(),
            operation: operation.into(),
            state_code,
            description: description.into(),
        };
        self.push(result.clone());
        result
    }

    /// Append a result, evicting the oldest when full.
    pub fn push(&self, result: OperationResult) {
        let mut items = self.items.lock();
        if items.len() == self.capacity {
            items.pop_front();
        }
        tracing::debug!(
            operation = %result.operation,
            state_code = result.state_code,
            "Operation recorded"
        );
        items.push_back(result);
    }

    /// Results with a timestamp strictly after `after` (unix ms), oldest first.
    #[must_use]
    pub fn after(&self, after: i64) -> Vec<OperationResult> {
        self.items
            .lock()
            .iter()
            .filter(|r| r.timestamp > after)
            .cloned()
            .collect()
    }

    /// Number of results held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// Check if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
