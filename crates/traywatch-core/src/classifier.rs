use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::events::{ChannelsViewedEvent, PostedEvent, StreamEvent};
use crate::models::StatusSink;
use crate::store::AggregateStore;

/// What the classifier did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The store changed and the status was republished
    Applied,
    /// A malformed or system event was dropped without touching the store
    Dropped,
    /// Not an event kind we track
    Ignored,
}

/// Applies decoded stream events to the aggregate store and republishes the
/// status after every change.
#[derive(Clone)]
pub struct EventClassifier {
    store: AggregateStore,
    user_id: String,
    sink: Arc<dyn StatusSink>,
}

impl EventClassifier {
    pub fn new(store: AggregateStore, user_id: impl Into<String>, sink: Arc<dyn StatusSink>) -> Self {
        Self {
            store,
            user_id: user_id.into(),
            sink,
        }
    }

    pub fn handle(&self, event: StreamEvent) -> Outcome {
        let outcome = match event {
            StreamEvent::Posted(posted) => self.handle_posted(posted),
            StreamEvent::ChannelsViewed(viewed) => self.handle_viewed(viewed),
            StreamEvent::Malformed { kind, reason } => {
                warn!(event = %kind, reason = %reason, "Dropping malformed event");
                Outcome::Dropped
            }
            StreamEvent::Unrecognized { kind } => {
                trace!(event = ?kind, "Ignoring event");
                Outcome::Ignored
            }
        };

        if outcome == Outcome::Applied {
            // Mutation lock is already released here
            self.sink.publish(self.store.status());
        }
        outcome
    }

    fn handle_posted(&self, event: PostedEvent) -> Outcome {
        if event.post.is_system() {
            debug!(
                conversation = %event.conversation_id,
                post_type = %event.post.post_type,
                "Skipping system message"
            );
            return Outcome::Dropped;
        }

        let is_mentioned = event.mentions_user(&self.user_id);
        if is_mentioned {
            debug!(conversation = %event.conversation_id, "Post mentions us");
        }
        self.store.apply_post(
            &event.conversation_id,
            event.kind,
            event.is_reply(),
            is_mentioned,
        );
        Outcome::Applied
    }

    fn handle_viewed(&self, event: ChannelsViewedEvent) -> Outcome {
        self.store.apply_viewed(&event.conversation_ids);
        Outcome::Applied
    }
}
