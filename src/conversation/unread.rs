//! Unread counts for the viewer's inbox.
//!
//! A message is unread when it is not deleted, was not sent by the viewer
//! and was created after the viewer's read marker for that conversation.
//! A viewer who never opened a conversation has every such message unread.

use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;

use crate::conversation::model::{Conversation, ConversationSummary, Message, UnreadEntry};
use crate::conversation::service::ConversationStore;
use crate::utils::error::CustomError;

pub fn compute_unread_count(
    conversation: &Conversation,
    messages: &[Message],
    viewer_id: &ObjectId,
) -> usize {
    let Some(participant) = conversation.participant(viewer_id) else {
        return 0;
    };
    let read_up_to = participant.last_read_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);

    messages
        .iter()
        .filter(|m| {
            m.conversation_id == conversation.id
                && !m.is_deleted
                && m.sender_id != *viewer_id
                && m.created_at > read_up_to
        })
        .count()
}

pub fn compute_global_unread(summaries: &[ConversationSummary]) -> usize {
    summaries.iter().map(|s| s.unread_count).sum()
}

pub fn summarize(
    conversation: Conversation,
    messages: &[Message],
    viewer_id: &ObjectId,
) -> ConversationSummary {
    let unread_count = compute_unread_count(&conversation, messages, viewer_id);
    let last_message = messages
        .iter()
        .filter(|m| m.conversation_id == conversation.id && !m.is_deleted)
        .max_by_key(|m| m.created_at)
        .cloned();

    ConversationSummary {
        conversation,
        last_message,
        unread_count,
    }
}

/// Fetch the viewer's conversations and derive their summaries,
/// most recent activity first
pub async fn load_inbox<S: ConversationStore + ?Sized>(
    store: &S,
    viewer_id: &ObjectId,
) -> Result<Vec<ConversationSummary>, CustomError> {
    let conversations = store.conversations_for(viewer_id).await?;
    let ids: Vec<ObjectId> = conversations.iter().map(|c| c.id).collect();
    let mut messages = store.live_messages_for(&ids).await?;

    let mut summaries: Vec<ConversationSummary> = conversations
        .into_iter()
        .map(|conversation| {
            let messages = messages.remove(&conversation.id).unwrap_or_default();
            summarize(conversation, &messages, viewer_id)
        })
        .collect();

    summaries.sort_by(|a, b| b.last_activity().cmp(&a.last_activity()));
    Ok(summaries)
}

/// Move the viewer's read marker to now. Marking twice is harmless.
pub async fn mark_conversation_read<S: ConversationStore + ?Sized>(
    store: &S,
    conversation_id: &ObjectId,
    viewer_id: &ObjectId,
) -> Result<DateTime<Utc>, CustomError> {
    let conversation = store
        .find_conversation(conversation_id)
        .await?
        .ok_or_else(|| CustomError::NotFoundError("Conversation not found".to_string()))?;

    if conversation.participant(viewer_id).is_none() {
        return Err(CustomError::ForbiddenError(
            "Not a participant of this conversation".to_string(),
        ));
    }

    let now = Utc::now();
    store.set_last_read(conversation_id, viewer_id, now).await?;
    Ok(now)
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackerState {
    Loading,
    Ready {
        summaries: Vec<ConversationSummary>,
        /// Last refresh failed; counts may lag until the next one succeeds
        stale: bool,
    },
}

/// Live unread state for one connected viewer.
///
/// Refreshes are numbered when they start. A result is applied only if
/// it is newer than the last applied one, so a slow fetch resolving after
/// a faster, later one is dropped.
#[derive(Debug)]
pub struct UnreadTracker {
    viewer_id: ObjectId,
    latest_started: u64,
    latest_applied: u64,
    state: TrackerState,
}

impl UnreadTracker {
    pub fn new(viewer_id: ObjectId) -> Self {
        UnreadTracker {
            viewer_id,
            latest_started: 0,
            latest_applied: 0,
            state: TrackerState::Loading,
        }
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn begin_refresh(&mut self) -> u64 {
        self.latest_started += 1;
        self.latest_started
    }

    /// Apply the outcome of refresh `generation`. Returns whether the
    /// visible state changed.
    pub fn complete(
        &mut self,
        generation: u64,
        result: Result<Vec<ConversationSummary>, CustomError>,
    ) -> bool {
        if generation <= self.latest_applied {
            log::debug!(
                "Dropping unread refresh {} for {}; {} already applied",
                generation,
                self.viewer_id,
                self.latest_applied
            );
            return false;
        }
        self.latest_applied = generation;

        match result {
            Ok(summaries) => {
                self.state = TrackerState::Ready {
                    summaries,
                    stale: false,
                };
            }
            Err(e) => {
                log::warn!("Unread refresh failed for {}: {}", self.viewer_id, e);
                let summaries = match std::mem::replace(&mut self.state, TrackerState::Loading) {
                    TrackerState::Loading => Vec::new(),
                    TrackerState::Ready { summaries, .. } => summaries,
                };
                self.state = TrackerState::Ready {
                    summaries,
                    stale: true,
                };
            }
        }
        true
    }

    /// Reflect an acknowledged mark-read right away, before the re-fetch lands.
    ///
    /// Refreshes started before the ack may have read the old marker, so
    /// they are fenced off; only a refresh begun after this call applies.
    pub fn mark_read_locally(&mut self, conversation_id: &ObjectId, at: DateTime<Utc>) -> bool {
        let TrackerState::Ready { summaries, .. } = &mut self.state else {
            return false;
        };
        self.latest_applied = self.latest_started;
        let viewer_id = self.viewer_id;
        match summaries
            .iter_mut()
            .find(|s| s.conversation.id == *conversation_id)
        {
            Some(summary) => {
                if let Some(me) = summary.conversation.participant_mut(&viewer_id) {
                    me.last_read_at = Some(at);
                }
                let changed = summary.unread_count != 0;
                summary.unread_count = 0;
                changed
            }
            None => false,
        }
    }

    /// `None` while the first fetch is still in flight
    pub fn total(&self) -> Option<usize> {
        match &self.state {
            TrackerState::Loading => None,
            TrackerState::Ready { summaries, .. } => Some(compute_global_unread(summaries)),
        }
    }

    pub fn entries(&self) -> Vec<UnreadEntry> {
        match &self.state {
            TrackerState::Loading => Vec::new(),
            TrackerState::Ready { summaries, .. } => summaries
                .iter()
                .map(|s| UnreadEntry {
                    conversation_id: s.conversation.id,
                    unread_count: s.unread_count,
                })
                .collect(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self.state, TrackerState::Ready { stale: true, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::{ConversationType, Participant};
    use crate::conversation::service::tests::InMemoryConversations;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn conversation(viewer: ObjectId, other: ObjectId, last_read: Option<DateTime<Utc>>) -> Conversation {
        Conversation {
            id: ObjectId::new(),
            conversation_type: ConversationType::Dm,
            name: None,
            participants: vec![
                Participant {
                    user_id: viewer,
                    joined_at: t0() - Duration::days(1),
                    last_read_at: last_read,
                    is_admin: false,
                },
                Participant {
                    user_id: other,
                    joined_at: t0() - Duration::days(1),
                    last_read_at: None,
                    is_admin: false,
                },
            ],
            created_at: t0() - Duration::days(1),
            updated_at: t0() - Duration::days(1),
        }
    }

    fn message(conversation: &Conversation, sender: ObjectId, at: DateTime<Utc>) -> Message {
        Message {
            id: ObjectId::new(),
            conversation_id: conversation.id,
            sender_id: sender,
            content: "hey".to_string(),
            created_at: at,
            edited_at: None,
            is_deleted: false,
        }
    }

    fn summary_with(unread: usize) -> ConversationSummary {
        let c = conversation(ObjectId::new(), ObjectId::new(), None);
        ConversationSummary {
            conversation: c,
            last_message: None,
            unread_count: unread,
        }
    }

    #[test]
    fn counts_only_messages_after_read_marker() {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, Some(t0()));
        let messages = vec![
            message(&c, them, t0() - Duration::seconds(1)),
            message(&c, them, t0() + Duration::seconds(1)),
            message(&c, them, t0() + Duration::seconds(2)),
        ];

        assert_eq!(compute_unread_count(&c, &messages, &me), 2);
    }

    #[test]
    fn own_messages_are_never_unread() {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, Some(t0()));
        let messages = vec![
            message(&c, me, t0() + Duration::seconds(1)),
            message(&c, them, t0() + Duration::seconds(2)),
        ];

        assert_eq!(compute_unread_count(&c, &messages, &me), 1);
    }

    #[test]
    fn deleted_messages_and_never_read_conversations() {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, None);
        let mut gone = message(&c, them, t0() - Duration::days(300));
        gone.is_deleted = true;
        let messages = vec![
            gone,
            message(&c, them, t0() - Duration::days(200)),
            message(&c, them, t0()),
        ];

        assert_eq!(compute_unread_count(&c, &messages, &me), 2);
        // outsiders have nothing unread
        assert_eq!(compute_unread_count(&c, &messages, &ObjectId::new()), 0);
    }

    #[test]
    fn global_total_is_the_sum() {
        let summaries = vec![summary_with(2), summary_with(0), summary_with(5)];
        assert_eq!(compute_global_unread(&summaries), 7);
        assert_eq!(compute_global_unread(&[]), 0);
    }

    #[test]
    fn summary_skips_deleted_last_message() {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, Some(t0()));
        let kept = message(&c, them, t0() + Duration::seconds(1));
        let mut removed = message(&c, them, t0() + Duration::seconds(2));
        removed.is_deleted = true;

        let summary = summarize(c, &[kept.clone(), removed], &me);
        assert_eq!(summary.last_message, Some(kept));
        assert_eq!(summary.unread_count, 1);
    }

    #[actix_web::test]
    async fn marking_read_twice_stays_at_zero() {
        let store = InMemoryConversations::default();
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, Some(t0()));
        store
            .push_message(message(&c, them, t0() + Duration::seconds(5)))
            .await;
        store.insert(c.clone()).await;

        let before = load_inbox(&store, &me).await.unwrap();
        assert_eq!(compute_global_unread(&before), 1);

        for _ in 0..2 {
            mark_conversation_read(&store, &c.id, &me).await.unwrap();
            let inbox = load_inbox(&store, &me).await.unwrap();
            assert_eq!(inbox[0].unread_count, 0);
            assert_eq!(compute_global_unread(&inbox), 0);
        }
    }

    #[actix_web::test]
    async fn outsiders_cannot_mark_read() {
        let store = InMemoryConversations::default();
        let c = conversation(ObjectId::new(), ObjectId::new(), None);
        store.insert(c.clone()).await;

        let result = mark_conversation_read(&store, &c.id, &ObjectId::new()).await;
        assert!(matches!(result, Err(CustomError::ForbiddenError(_))));

        let missing = mark_conversation_read(&store, &ObjectId::new(), &ObjectId::new()).await;
        assert!(matches!(missing, Err(CustomError::NotFoundError(_))));
    }

    #[actix_web::test]
    async fn inbox_is_ordered_by_latest_activity() {
        let store = InMemoryConversations::default();
        let me = ObjectId::new();
        let older = conversation(me, ObjectId::new(), None);
        let newer = conversation(me, ObjectId::new(), None);
        store
            .push_message(message(&older, older.participants[1].user_id, t0()))
            .await;
        store
            .push_message(message(&newer, newer.participants[1].user_id, t0() + Duration::hours(1)))
            .await;
        store.insert(older.clone()).await;
        store.insert(newer.clone()).await;

        let inbox = load_inbox(&store, &me).await.unwrap();
        let order: Vec<_> = inbox.iter().map(|s| s.conversation.id).collect();
        assert_eq!(order, vec![newer.id, older.id]);
    }

    #[test]
    fn tracker_drops_results_older_than_the_applied_one() {
        let mut tracker = UnreadTracker::new(ObjectId::new());
        assert_eq!(tracker.total(), None);

        let slow = tracker.begin_refresh();
        let fast = tracker.begin_refresh();

        assert!(tracker.complete(fast, Ok(vec![summary_with(3)])));
        assert_eq!(tracker.total(), Some(3));

        assert!(!tracker.complete(slow, Ok(vec![summary_with(9)])));
        assert_eq!(tracker.total(), Some(3));
    }

    #[test]
    fn tracker_degrades_to_zero_then_stale() {
        let mut tracker = UnreadTracker::new(ObjectId::new());

        let first = tracker.begin_refresh();
        tracker.complete(first, Err(CustomError::InternalServerError("down".into())));
        assert_eq!(tracker.total(), Some(0));
        assert!(tracker.is_stale());

        let second = tracker.begin_refresh();
        tracker.complete(second, Ok(vec![summary_with(4)]));
        assert!(!tracker.is_stale());

        let third = tracker.begin_refresh();
        tracker.complete(third, Err(CustomError::InternalServerError("down".into())));
        assert_eq!(tracker.total(), Some(4));
        assert!(tracker.is_stale());
    }

    #[test]
    fn local_mark_read_zeroes_one_conversation() {
        let me = ObjectId::new();
        let a = ConversationSummary {
            conversation: conversation(me, ObjectId::new(), None),
            last_message: None,
            unread_count: 2,
        };
        let b = ConversationSummary {
            conversation: conversation(me, ObjectId::new(), None),
            last_message: None,
            unread_count: 5,
        };
        let a_id = a.conversation.id;
        let mut tracker = UnreadTracker::new(me);
        let generation = tracker.begin_refresh();
        tracker.complete(generation, Ok(vec![a, b]));

        assert!(tracker.mark_read_locally(&a_id, t0()));
        assert_eq!(tracker.total(), Some(5));
        assert!(!tracker.mark_read_locally(&a_id, t0()));

        let entries = tracker.entries();
        assert_eq!(entries[0].conversation_id, a_id);
        assert_eq!(entries[0].unread_count, 0);
    }

    #[actix_web::test]
    async fn store_outage_keeps_last_counts_marked_stale() {
        let store = InMemoryConversations::default();
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, None);
        store.push_message(message(&c, them, t0())).await;
        store.insert(c).await;

        let mut tracker = UnreadTracker::new(me);
        let first = tracker.begin_refresh();
        tracker.complete(first, load_inbox(&store, &me).await);
        assert_eq!(tracker.total(), Some(1));

        *store.fail_reads.write().await = true;
        let second = tracker.begin_refresh();
        let result = load_inbox(&store, &me).await;
        assert!(result.is_err());
        tracker.complete(second, result);

        assert_eq!(tracker.total(), Some(1));
        assert!(tracker.is_stale());
        assert!(matches!(tracker.state(), TrackerState::Ready { stale: true, .. }));
    }

    #[test]
    fn refresh_in_flight_cannot_undo_local_mark_read() {
        let me = ObjectId::new();
        let c = conversation(me, ObjectId::new(), None);
        let c_id = c.id;
        let unread = |n| {
            vec![ConversationSummary {
                conversation: c.clone(),
                last_message: None,
                unread_count: n,
            }]
        };
        let mut tracker = UnreadTracker::new(me);

        let first = tracker.begin_refresh();
        tracker.complete(first, Ok(unread(3)));
        assert_eq!(tracker.total(), Some(3));

        // a message event started a fetch before the ack arrived
        let in_flight = tracker.begin_refresh();
        assert!(tracker.mark_read_locally(&c_id, t0()));
        assert_eq!(tracker.total(), Some(0));

        assert!(!tracker.complete(in_flight, Ok(unread(3))));
        assert_eq!(tracker.total(), Some(0));

        // the fetch triggered by the read-marker event is applied
        let after_ack = tracker.begin_refresh();
        assert!(tracker.complete(after_ack, Ok(unread(1))));
        assert_eq!(tracker.total(), Some(1));
    }

    #[test]
    fn summary_ignores_messages_of_other_conversations() {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let c = conversation(me, them, Some(t0()));
        let other = conversation(me, them, Some(t0()));
        let own = message(&c, them, t0() + Duration::seconds(1));
        let stray = message(&other, them, t0() + Duration::seconds(9));

        let summary = summarize(c, &[own.clone(), stray], &me);
        assert_eq!(summary.last_message, Some(own));
        assert_eq!(summary.unread_count, 1);
    }

    #[actix_web::test]
    async fn inbox_loads_messages_in_one_query() {
        let store = InMemoryConversations::default();
        let me = ObjectId::new();
        for _ in 0..3 {
            let c = conversation(me, ObjectId::new(), None);
            store
                .push_message(message(&c, c.participants[1].user_id, t0()))
                .await;
            store.insert(c).await;
        }

        let inbox = load_inbox(&store, &me).await.unwrap();
        assert_eq!(compute_global_unread(&inbox), 3);
        assert_eq!(
            store.message_queries.load(std::sync::atomic::Ordering::SeqCst),
            1
        );
    }
}
