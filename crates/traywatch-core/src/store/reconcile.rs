//! Full resync of unread counts from server totals.
//!
//! Counters are recomputed from absolute numbers (channel totals against the
//! user's last-seen counts), so a reconnect never depends on the events that
//! were missed while the stream was down.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::AggregateStore;
use crate::error::{ApiError, ReconcileError};
use crate::models::{Aggregate, Conversation, ConversationCounters, Membership, Team};

/// One-shot bulk queries used for reconciliation.
#[async_trait]
pub trait SnapshotProvider: Send + Sync {
    async fn list_conversations(
        &self,
        team_id: &str,
        user_id: &str,
    ) -> Result<Vec<Conversation>, ApiError>;

    async fn list_memberships(
        &self,
        user_id: &str,
        team_id: &str,
    ) -> Result<Vec<Membership>, ApiError>;
}

/// Counters for one conversation from its totals and the user's membership.
///
/// The mention count is the server's own figure, taken verbatim. Whether it
/// includes mentions of other users depends on the server; it is not
/// corrected here.
pub fn compute_counters(
    conversation: &Conversation,
    membership: &Membership,
) -> ConversationCounters {
    let replies_total = conversation.total_messages - conversation.total_root_messages;
    let replies_seen = membership.seen_messages - membership.seen_root_messages;
    let unread_total = conversation.total_messages - membership.seen_messages;

    let mut counters = ConversationCounters {
        reply_unread: replies_total - replies_seen,
        mention_unread: membership.mention_count,
        ..Default::default()
    };
    counters.add_unread(conversation.kind, unread_total);
    counters
}

/// Fold one team's conversations and memberships into `into`.
///
/// Memberships without a matching conversation are skipped, and so are
/// conversations the user is not a member of.
pub fn compute_aggregate(
    conversations: &[Conversation],
    memberships: &[Membership],
    into: &mut Aggregate,
) {
    let by_id: HashMap<&str, &Conversation> = conversations
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect();

    for membership in memberships {
        let Some(conversation) = by_id.get(membership.conversation_id.as_str()) else {
            continue;
        };
        into.insert(
            conversation.id.clone(),
            compute_counters(conversation, membership),
        );
    }
}

/// Pulls a complete snapshot for every team of the user and replaces the
/// store in one step.
pub struct SnapshotReconciler<P: ?Sized> {
    provider: Arc<P>,
    user_id: String,
    teams: Vec<Team>,
}

impl<P: SnapshotProvider + ?Sized> SnapshotReconciler<P> {
    pub fn new(provider: Arc<P>, user_id: impl Into<String>, teams: Vec<Team>) -> Self {
        Self {
            provider,
            user_id: user_id.into(),
            teams,
        }
    }

    /// Build a fresh aggregate without touching any store.
    pub async fn fetch(&self) -> Result<Aggregate, ReconcileError> {
        let mut fresh = Aggregate::new();

        for team in &self.teams {
            let conversations = self
                .provider
                .list_conversations(&team.id, &self.user_id)
                .await
                .map_err(|source| ReconcileError::Conversations {
                    team: team_label(team),
                    source,
                })?;

            let memberships = self
                .provider
                .list_memberships(&self.user_id, &team.id)
                .await
                .map_err(|source| ReconcileError::Memberships {
                    team: team_label(team),
                    source,
                })?;

            debug!(
                team = %team_label(team),
                conversations = conversations.len(),
                memberships = memberships.len(),
                "Fetched team snapshot"
            );
            compute_aggregate(&conversations, &memberships, &mut fresh);
        }

        Ok(fresh)
    }

    /// Fetch everything, then replace the store. On any failure the store
    /// keeps its previous contents.
    pub async fn reconcile(&self, store: &AggregateStore) -> Result<usize, ReconcileError> {
        let fresh = self.fetch().await?;
        let count = fresh.len();
        store.replace_all(fresh);
        info!(conversations = count, teams = self.teams.len(), "Synced unread counts");
        Ok(count)
    }
}

fn team_label(team: &Team) -> String {
    if team.name.is_empty() {
        team.id.clone()
    } else {
        team.name.clone()
    }
}
