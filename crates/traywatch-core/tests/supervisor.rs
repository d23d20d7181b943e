//! Full connection lifecycle against fake collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_util::sync::CancellationToken;

use traywatch_core::events::{ChannelsViewedEvent, Post, PostedEvent, StreamEvent};
use traywatch_core::models::{Conversation, Membership, Team};
use traywatch_core::store::{SnapshotProvider, SnapshotReconciler};
use traywatch_core::stream::{EventStream, StreamConnector};
use traywatch_core::supervisor::{ConnectionState, Supervisor};
use traywatch_core::{ApiError, AggregateStore, ConversationKind, StatusLevel, StatusSink, StreamError};

/// Serves one channel with two unread messages. The first `failures` calls
/// fail.
struct FakeProvider {
    failures: AtomicUsize,
    calls: AtomicUsize,
}

impl FakeProvider {
    fn failing(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotProvider for FakeProvider {
    async fn list_conversations(
        &self,
        _team_id: &str,
        _user_id: &str,
    ) -> Result<Vec<Conversation>, ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ApiError::Status {
                status: 503,
                path: "/channels".to_string(),
                body: String::new(),
            });
        }
        Ok(vec![Conversation {
            id: "town".to_string(),
            kind: ConversationKind::Channel,
            total_messages: 3,
            total_root_messages: 3,
        }])
    }

    async fn list_memberships(
        &self,
        _user_id: &str,
        _team_id: &str,
    ) -> Result<Vec<Membership>, ApiError> {
        Ok(vec![Membership {
            conversation_id: "town".to_string(),
            seen_messages: 1,
            seen_root_messages: 1,
            mention_count: 0,
        }])
    }
}

struct FakeStream {
    events: mpsc::UnboundedReceiver<Result<StreamEvent, StreamError>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl EventStream for FakeStream {
    async fn next_event(&mut self) -> Option<Result<StreamEvent, StreamError>> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.events.close();
    }
}

/// Hands out queued streams. The first `failures` handshakes fail; with
/// nothing queued, connecting never finishes.
#[derive(Clone, Default)]
struct FakeConnector {
    streams: Arc<Mutex<VecDeque<FakeStream>>>,
    connects: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl FakeConnector {
    /// Queue a stream; returns the sender that feeds it and its close counter.
    /// Dropping the sender ends the stream cleanly.
    fn push_stream(
        &self,
    ) -> (
        mpsc::UnboundedSender<Result<StreamEvent, StreamError>>,
        Arc<AtomicUsize>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let closes = Arc::new(AtomicUsize::new(0));
        self.streams.lock().push_back(FakeStream {
            events: rx,
            closes: closes.clone(),
        });
        (tx, closes)
    }

    fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StreamConnector for FakeConnector {
    type Stream = FakeStream;

    async fn connect(&self) -> Result<FakeStream, StreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(WsError::ConnectionClosed.into());
        }
        let next = self.streams.lock().pop_front();
        match next {
            Some(stream) => Ok(stream),
            None => std::future::pending().await,
        }
    }
}

struct Harness {
    provider: Arc<FakeProvider>,
    connector: FakeConnector,
    store: AggregateStore,
    status: watch::Receiver<StatusLevel>,
    state: watch::Receiver<ConnectionState>,
    cancel: CancellationToken,
    handle: tokio::task::JoinHandle<()>,
}

fn start(provider: Arc<FakeProvider>, connector: FakeConnector, store: AggregateStore) -> Harness {
    let team = Team {
        id: "t1".to_string(),
        name: "main".to_string(),
        display_name: "Main".to_string(),
    };
    let reconciler = SnapshotReconciler::new(provider.clone(), "me", vec![team]);
    let (status_tx, status) = watch::channel(StatusLevel::Quiet);
    let sink: Arc<dyn StatusSink> = Arc::new(status_tx);

    let supervisor = Supervisor::new(reconciler, connector.clone(), store.clone(), "me", sink);
    let state = supervisor.subscribe_state();
    let cancel = CancellationToken::new();
    let handle = tokio::spawn(supervisor.run(cancel.clone()));

    Harness {
        provider,
        connector,
        store,
        status,
        state,
        cancel,
        handle,
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}

fn direct_post(conversation_id: &str) -> StreamEvent {
    StreamEvent::Posted(PostedEvent {
        conversation_id: conversation_id.to_string(),
        kind: ConversationKind::Direct,
        post: Post {
            id: "p1".to_string(),
            channel_id: conversation_id.to_string(),
            ..Default::default()
        },
        mentions: Vec::new(),
    })
}

#[tokio::test(start_paused = true)]
async fn test_events_update_status_until_cancelled() {
    let connector = FakeConnector::default();
    let (events, closes) = connector.push_stream();
    let h = start(FakeProvider::failing(0), connector, AggregateStore::new());

    wait_until(|| *h.state.borrow() == ConnectionState::Streaming).await;
    assert_eq!(*h.status.borrow(), StatusLevel::Attention);
    assert_eq!(h.store.get("town").map(|c| c.channel_unread), Some(2));

    events.send(Ok(direct_post("dm1"))).unwrap();
    wait_until(|| *h.status.borrow() == StatusLevel::Urgent).await;
    assert_eq!(h.store.get("dm1").map(|c| c.direct_unread), Some(1));

    events
        .send(Ok(StreamEvent::ChannelsViewed(ChannelsViewedEvent {
            conversation_ids: vec!["dm1".to_string(), "town".to_string()],
        })))
        .unwrap();
    wait_until(|| *h.status.borrow() == StatusLevel::Quiet).await;

    h.cancel.cancel();
    h.handle.await.unwrap();
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    assert_eq!(*h.state.borrow(), ConnectionState::Idle);
    assert_eq!(h.connector.connects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_sync_failures_back_off_and_keep_store() {
    let store = AggregateStore::new();
    store.apply_post("old", ConversationKind::Group, false, false);

    let connector = FakeConnector::default();
    let (_events, _closes) = connector.push_stream();
    let started = Instant::now();
    let h = start(FakeProvider::failing(2), connector, store);

    wait_until(|| *h.state.borrow() == ConnectionState::Backoff).await;
    assert_eq!(h.store.get("old").map(|c| c.group_unread), Some(1));

    wait_until(|| *h.state.borrow() == ConnectionState::Streaming).await;
    let elapsed = started.elapsed();
    // Two waits: [2, 2.2) then [4, 4.4)
    assert!(elapsed >= Duration::from_secs(6), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(6700), "elapsed {:?}", elapsed);
    assert_eq!(h.provider.calls(), 3);
    assert!(h.store.get("old").is_none());
    assert!(h.store.get("town").is_some());

    h.cancel.cancel();
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stream_close_triggers_resync() {
    let connector = FakeConnector::default();
    let (first, first_closes) = connector.push_stream();
    let (_second, second_closes) = connector.push_stream();
    let h = start(FakeProvider::failing(0), connector, AggregateStore::new());

    wait_until(|| *h.state.borrow() == ConnectionState::Streaming).await;
    first.send(Ok(direct_post("dm1"))).unwrap();
    wait_until(|| h.store.get("dm1").is_some()).await;

    drop(first);
    wait_until(|| h.connector.connects() == 2 && *h.state.borrow() == ConnectionState::Streaming)
        .await;
    assert_eq!(first_closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.calls(), 2);
    // The resync replaced the live update
    assert!(h.store.get("dm1").is_none());
    assert_eq!(*h.status.borrow(), StatusLevel::Attention);

    h.cancel.cancel();
    h.handle.await.unwrap();
    assert_eq!(second_closes.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_exits_promptly() {
    let h = start(
        FakeProvider::failing(usize::MAX),
        FakeConnector::default(),
        AggregateStore::new(),
    );

    wait_until(|| *h.state.borrow() == ConnectionState::Backoff).await;
    h.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), h.handle)
        .await
        .expect("supervisor did not stop")
        .unwrap();
    assert_eq!(*h.state.borrow(), ConnectionState::Idle);
    assert_eq!(h.provider.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_connecting() {
    let h = start(
        FakeProvider::failing(0),
        FakeConnector::default(),
        AggregateStore::new(),
    );

    wait_until(|| h.connector.connects() == 1).await;
    assert_eq!(*h.status.borrow(), StatusLevel::Attention);
    h.cancel.cancel();
    h.handle.await.unwrap();
    assert_eq!(*h.state.borrow(), ConnectionState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_failure_backs_off_and_resyncs() {
    let connector = FakeConnector::default();
    connector.fail_next(1);
    let (_events, _closes) = connector.push_stream();
    let started = Instant::now();
    let h = start(FakeProvider::failing(0), connector, AggregateStore::new());

    wait_until(|| *h.state.borrow() == ConnectionState::Backoff).await;
    assert_eq!(h.connector.connects(), 1);
    assert_eq!(h.provider.calls(), 1);

    wait_until(|| *h.state.borrow() == ConnectionState::Streaming).await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(2300), "elapsed {:?}", elapsed);
    assert_eq!(h.connector.connects(), 2);
    assert_eq!(h.provider.calls(), 2);

    h.cancel.cancel();
    h.handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_stream_error_closes_and_resyncs() {
    let connector = FakeConnector::default();
    let (first, first_closes) = connector.push_stream();
    let (_second, second_closes) = connector.push_stream();
    let h = start(FakeProvider::failing(0), connector, AggregateStore::new());

    wait_until(|| *h.state.borrow() == ConnectionState::Streaming).await;
    first.send(Err(WsError::ConnectionClosed.into())).unwrap();

    wait_until(|| *h.state.borrow() == ConnectionState::Backoff).await;
    assert_eq!(first_closes.load(Ordering::SeqCst), 1);

    wait_until(|| h.connector.connects() == 2 && *h.state.borrow() == ConnectionState::Streaming)
        .await;
    assert_eq!(first_closes.load(Ordering::SeqCst), 1);
    assert_eq!(h.provider.calls(), 2);

    h.cancel.cancel();
    h.handle.await.unwrap();
    assert_eq!(second_closes.load(Ordering::SeqCst), 1);
}
