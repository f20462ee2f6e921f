//! Concurrent batch execution of machine actions.
//!
//! A batch run partitions queued (machine, action, options) entries into
//! groups keyed by provider signature. A provider backend is not assumed
//! to be reentrant, so entries sharing a signature run sequentially, in
//! enqueue order, on one worker; distinct signatures run concurrently,
//! one OS thread each. Failures are aggregated and reported only after
//! every worker has finished, so a failure in one group never hides
//! results from another.

use std::sync::Arc;
use std::thread;

use serde_json::Value;

use crate::error::{BatchError, BatchFailure, CoreError, Result};
use crate::machine::Machine;

/// Queues machine actions and runs them with provider-grouped
/// concurrency.
///
/// Each [`run`](Self::run) is a one-shot execution of the currently
/// queued entries; nothing is retried automatically. Re-enqueue to
/// retry.
pub struct BatchExecutor {
    entries: Vec<BatchEntry>,
    allow_parallel: bool,
}

struct BatchEntry {
    machine: Arc<Machine>,
    action: String,
    options: Option<Value>,
}

impl BatchEntry {
    /// Grouping signature: entries with the same provider backend and
    /// options are not safe to drive concurrently.
    fn signature(&self) -> String {
        format!(
            "{}:{}",
            self.machine.provider_name(),
            self.machine.provider_options()
        )
    }
}

struct BatchGroup {
    signature: String,
    entries: Vec<BatchEntry>,
}

impl BatchExecutor {
    /// Creates an executor.
    ///
    /// With `allow_parallel` set to `false` every group runs on the
    /// calling thread, one group after another; ordering guarantees are
    /// unchanged.
    #[must_use]
    pub fn new(allow_parallel: bool) -> Self {
        Self {
            entries: Vec::new(),
            allow_parallel,
        }
    }

    /// Queues an action against a machine.
    ///
    /// Entries are never deduplicated: the same machine may be queued
    /// any number of times and every entry executes, in enqueue order
    /// within its group.
    pub fn enqueue(&mut self, machine: Arc<Machine>, action: impl Into<String>, options: Option<Value>) {
        let action = action.into();
        tracing::debug!(machine = %machine.name(), action = %action, "queued batch action");
        self.entries.push(BatchEntry {
            machine,
            action,
            options,
        });
    }

    /// Number of queued entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Runs every queued entry and blocks until all workers finish.
    ///
    /// A failed entry aborts the remaining entries of its own group;
    /// other groups always run to completion. After all workers
    /// converge, failures are surfaced as one [`BatchError`] identifying
    /// every failed (machine, action) pair.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Batch`] if any entry failed.
    pub fn run(&mut self) -> Result<()> {
        let entries = std::mem::take(&mut self.entries);
        if entries.is_empty() {
            return Ok(());
        }

        let groups = Self::partition(entries);
        tracing::debug!(groups = groups.len(), "starting batch run");

        let mut failures = Vec::new();
        if self.allow_parallel && groups.len() > 1 {
            thread::scope(|scope| {
                let mut workers = Vec::with_capacity(groups.len());
                for group in groups {
                    let label = group.signature.clone();
                    workers.push((label, scope.spawn(move || Self::run_group(group))));
                }
                for (label, worker) in workers {
                    match worker.join() {
                        Ok(mut group_failures) => failures.append(&mut group_failures),
                        Err(_) => failures.push(BatchFailure {
                            machine: label,
                            action: "<worker>".to_string(),
                            error: CoreError::Machine("batch worker panicked".to_string()),
                        }),
                    }
                }
            });
        } else {
            for group in groups {
                failures.extend(Self::run_group(group));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError::new(failures).into())
        }
    }

    /// Groups entries by provider signature, keeping enqueue order both
    /// across groups (first-seen) and within each group.
    fn partition(entries: Vec<BatchEntry>) -> Vec<BatchGroup> {
        let mut groups: Vec<BatchGroup> = Vec::new();
        for entry in entries {
            let signature = entry.signature();
            match groups.iter_mut().find(|group| group.signature == signature) {
                Some(group) => group.entries.push(entry),
                None => groups.push(BatchGroup {
                    signature,
                    entries: vec![entry],
                }),
            }
        }
        groups
    }

    fn run_group(group: BatchGroup) -> Vec<BatchFailure> {
        tracing::debug!(
            signature = %group.signature,
            entries = group.entries.len(),
            "batch worker started"
        );

        let mut failures = Vec::new();
        for entry in group.entries {
            match entry.machine.action(&entry.action, entry.options) {
                Ok(_) => {}
                Err(error) => {
                    tracing::error!(
                        machine = %entry.machine.name(),
                        action = %entry.action,
                        %error,
                        "batch action failed; skipping the rest of this group"
                    );
                    failures.push(BatchFailure {
                        machine: entry.machine.name().to_string(),
                        action: entry.action,
                        error,
                    });
                    break;
                }
            }
        }
        failures
    }
}

impl Default for BatchExecutor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl std::fmt::Debug for BatchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecutor")
            .field("entries", &self.entries.len())
            .field("allow_parallel", &self.allow_parallel)
            .finish()
    }
}
