//! Periodic, read-only dump of the unread counts for humans reading logs.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::models::{derive_status, Aggregate};
use crate::store::AggregateStore;
use crate::supervisor::ConnectionState;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Report {
    /// One line per conversation with anything unread, sorted by ID
    pub lines: Vec<String>,
    /// Conversations holding a negative counter
    pub inconsistent: Vec<String>,
    pub total: usize,
}

/// Build the report for one snapshot.
pub fn build_report(aggregate: &Aggregate) -> Report {
    let mut ids: Vec<&String> = aggregate.keys().collect();
    ids.sort();

    let mut report = Report {
        total: aggregate.len(),
        ..Default::default()
    };
    for id in ids {
        let counters = &aggregate[id];
        if counters.has_negative() {
            report.inconsistent.push(id.clone());
        }
        if counters.is_zero() {
            continue;
        }
        report.lines.push(format!("{}, channel: {}", counters, id));
    }
    report
}

/// Log one report. Negative counters are surfaced as warnings.
pub fn log_report(aggregate: &Aggregate, state: ConnectionState) {
    let report = build_report(aggregate);
    for line in &report.lines {
        debug!("{}", line);
    }
    for id in &report.inconsistent {
        warn!(
            conversation = %id,
            counters = %aggregate[id],
            "Negative unread count, server totals and membership disagree"
        );
    }
    info!(
        state = %state,
        conversations = report.total,
        unread = report.lines.len(),
        status = %derive_status(aggregate.values()),
        "Unread summary"
    );
}

/// Spawn the reporter: first report after `initial_delay`, then every
/// `interval` until cancelled.
pub fn spawn_reporter(
    store: AggregateStore,
    state: watch::Receiver<ConnectionState>,
    initial_delay: Duration,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(initial_delay) => {}
        }

        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    let current = *state.borrow();
                    log_report(&store.snapshot(), current);
                }
            }
        }
        debug!("Reporter stopped");
    })
}
