//! Connection lifecycle: sync, stream, back off, repeat.
//!
//! ```text
//! Idle -> Syncing -> Streaming -> Backoff -> Syncing -> ...
//!            |                       ^
//!            +-------- failure ------+
//! ```
//!
//! Cancellation is observed while syncing, while streaming and while
//! waiting. When it arrives during streaming the live connection is closed
//! and the listener task is awaited before `run` returns.

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backoff::Backoff;
use crate::classifier::EventClassifier;
use crate::error::StreamError;
use crate::models::StatusSink;
use crate::store::{AggregateStore, SnapshotProvider, SnapshotReconciler};
use crate::stream::{EventStream, StreamConnector};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Idle,
    Syncing,
    Streaming,
    Backoff,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Syncing => "syncing",
            ConnectionState::Streaming => "streaming",
            ConnectionState::Backoff => "backoff",
        };
        f.write_str(name)
    }
}

/// How a listener task ended.
#[derive(Debug)]
pub enum ListenOutcome {
    /// The peer closed the stream
    Closed,
    /// The stream broke
    Failed(StreamError),
    /// We were asked to stop and closed the stream ourselves
    Cancelled,
}

pub struct Supervisor<P: ?Sized, C> {
    reconciler: SnapshotReconciler<P>,
    connector: C,
    store: AggregateStore,
    classifier: EventClassifier,
    sink: Arc<dyn StatusSink>,
    backoff: Backoff,
    state_tx: watch::Sender<ConnectionState>,
}

impl<P, C> Supervisor<P, C>
where
    P: SnapshotProvider + ?Sized + 'static,
    C: StreamConnector + 'static,
{
    pub fn new(
        reconciler: SnapshotReconciler<P>,
        connector: C,
        store: AggregateStore,
        user_id: impl Into<String>,
        sink: Arc<dyn StatusSink>,
    ) -> Self {
        let classifier = EventClassifier::new(store.clone(), user_id, sink.clone());
        let (state_tx, _) = watch::channel(ConnectionState::Idle);
        Self {
            reconciler,
            connector,
            store,
            classifier,
            sink,
            backoff: Backoff::default(),
            state_tx,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state_tx.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Connection state changed");
        }
    }

    /// Run until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) {
        info!("Supervisor started");

        while !cancel.is_cancelled() {
            self.set_state(ConnectionState::Syncing);

            let synced = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.reconciler.reconcile(&self.store) => result,
            };
            if let Err(e) = synced {
                error!(error = %e, "Could not sync unread counts");
                if !self.wait_backoff(&cancel).await {
                    break;
                }
                continue;
            }
            // Status reflects the reconciled state even if the stream never comes up
            self.sink.publish(self.store.status());

            let connected = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.connector.connect() => result,
            };
            let stream = match connected {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "WebSocket connect failed");
                    if !self.wait_backoff(&cancel).await {
                        break;
                    }
                    continue;
                }
            };

            self.backoff.reset();
            self.set_state(ConnectionState::Streaming);

            let connection = cancel.child_token();
            let mut listener = tokio::spawn(listen(
                stream,
                self.classifier.clone(),
                connection.clone(),
            ));

            let finished = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = &mut listener => Some(result),
            };
            let outcome = match finished {
                Some(result) => result,
                None => {
                    info!("Cancelled, closing websocket");
                    connection.cancel();
                    listener.await
                }
            };

            match outcome {
                Ok(ListenOutcome::Cancelled) => {
                    debug!("Listener stopped");
                    break;
                }
                Ok(ListenOutcome::Closed) => warn!("Disconnected from websocket"),
                Ok(ListenOutcome::Failed(e)) => error!(error = %e, "WebSocket listen failed"),
                Err(e) => error!(error = %e, "Listener task failed"),
            }

            if !self.wait_backoff(&cancel).await {
                break;
            }
        }

        self.set_state(ConnectionState::Idle);
        info!("Supervisor stopped");
    }

    /// Sleep for the next backoff duration. Returns false if cancelled.
    async fn wait_backoff(&mut self, cancel: &CancellationToken) -> bool {
        self.set_state(ConnectionState::Backoff);
        let wait = self.backoff.next_wait(&mut rand::thread_rng());
        info!(wait = ?wait, "Reconnecting");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(wait) => true,
        }
    }
}

/// Feed one connection's events to the classifier until it ends.
///
/// The stream is always closed before returning, so the caller only has to
/// await the task.
pub async fn listen<S: EventStream>(
    mut stream: S,
    classifier: EventClassifier,
    cancel: CancellationToken,
) -> ListenOutcome {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            next = stream.next_event() => Some(next),
        };

        match next {
            None => {
                stream.close().await;
                return ListenOutcome::Cancelled;
            }
            Some(Some(Ok(event))) => {
                classifier.handle(event);
            }
            Some(Some(Err(e))) => {
                stream.close().await;
                return ListenOutcome::Failed(e);
            }
            Some(None) => {
                stream.close().await;
                return ListenOutcome::Closed;
            }
        }
    }
}
