use actix::prelude::*;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::conversation::service::ConversationStore;
use crate::conversation::unread::{UnreadTracker, load_inbox, mark_conversation_read};
use crate::realtime::hub::{FeedHub, Publish};
use crate::realtime::model::{FeedEvent, ServerMessage};
use crate::realtime::subscription::Subscription;

/// Message for whoever renders the counts (the WebSocket session)
#[derive(Message, Debug, Clone, PartialEq)]
#[rtype(result = "()")]
pub struct Push(pub ServerMessage);

/// Re-fetch the counts now
#[derive(Message)]
#[rtype(result = "()")]
pub struct Refresh;

/// Move the viewer's read marker of a conversation to now
#[derive(Message)]
#[rtype(result = "()")]
pub struct MarkRead {
    pub conversation_id: ObjectId,
}

/// Stop the feed; pending fetches are abandoned
#[derive(Message)]
#[rtype(result = "()")]
pub struct Close;

/// Live unread counter for one viewer.
///
/// Fetches once on start, then again on every feed event for the viewer.
/// Fetches run as actor futures, so results arriving after the feed
/// stopped are never applied.
pub struct UnreadFeed {
    viewer_id: ObjectId,
    hub: Addr<FeedHub>,
    store: Arc<dyn ConversationStore>,
    out: Recipient<Push>,
    tracker: UnreadTracker,
    subscription: Option<Subscription>,
}

impl UnreadFeed {
    pub fn new(
        viewer_id: ObjectId,
        hub: Addr<FeedHub>,
        store: Arc<dyn ConversationStore>,
        out: Recipient<Push>,
    ) -> Self {
        UnreadFeed {
            viewer_id,
            hub,
            store,
            out,
            tracker: UnreadTracker::new(viewer_id),
            subscription: None,
        }
    }

    fn refresh(&mut self, ctx: &mut Context<Self>) {
        let generation = self.tracker.begin_refresh();
        let store = self.store.clone();
        let viewer_id = self.viewer_id;

        let fetch = async move { load_inbox(store.as_ref(), &viewer_id).await };
        ctx.spawn(fetch.into_actor(self).map(move |result, act, _| {
            if act.tracker.complete(generation, result) {
                act.push_counts();
            }
        }));
    }

    fn mark_read(&mut self, conversation_id: ObjectId, ctx: &mut Context<Self>) {
        let store = self.store.clone();
        let viewer_id = self.viewer_id;
        let request =
            async move { mark_conversation_read(store.as_ref(), &conversation_id, &viewer_id).await };

        ctx.spawn(request.into_actor(self).map(move |result, act, _| match result {
            Ok(at) => {
                act.tracker.mark_read_locally(&conversation_id, at);
                act.push_counts();
                act.push(ServerMessage::MarkedRead {
                    conversation_id: conversation_id.to_hex(),
                });
                // Every tab of this viewer re-fetches, this one included
                act.hub.do_send(Publish(FeedEvent::ParticipantUpdated {
                    conversation_id,
                    user_id: act.viewer_id,
                }));
            }
            Err(e) => {
                log::warn!("Mark read failed for {}: {}", act.viewer_id, e);
                act.push(ServerMessage::Error {
                    message: e.to_string(),
                });
            }
        }));
    }

    fn push_counts(&self) {
        let message = match self.tracker.total() {
            None => ServerMessage::Loading,
            Some(total) => ServerMessage::Unread {
                total,
                conversations: self.tracker.entries().into_iter().map(Into::into).collect(),
                stale: self.tracker.is_stale(),
            },
        };
        self.push(message);
    }

    fn push(&self, message: ServerMessage) {
        self.out.do_send(Push(message));
    }
}

impl Actor for UnreadFeed {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.subscription = Some(Subscription::open(
            self.hub.clone(),
            self.viewer_id,
            ctx.address().recipient(),
        ));
        self.push_counts();
        self.refresh(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(subscription) = self.subscription.take() {
            log::debug!("Releasing feed subscription {}", subscription.id());
        }
        Running::Stop
    }
}

/// Feed event for this viewer: counts may have moved
impl Handler<FeedEvent> for UnreadFeed {
    type Result = ();

    fn handle(&mut self, msg: FeedEvent, ctx: &mut Self::Context) {
        log::debug!(
            "Refreshing unread counts of {} after event on conversation {}",
            self.viewer_id,
            msg.conversation_id()
        );
        self.refresh(ctx);
    }
}

impl Handler<Refresh> for UnreadFeed {
    type Result = ();

    fn handle(&mut self, _: Refresh, ctx: &mut Self::Context) {
        self.refresh(ctx);
    }
}

impl Handler<MarkRead> for UnreadFeed {
    type Result = ();

    fn handle(&mut self, msg: MarkRead, ctx: &mut Self::Context) {
        self.mark_read(msg.conversation_id, ctx);
    }
}

impl Handler<Close> for UnreadFeed {
    type Result = ();

    fn handle(&mut self, _: Close, ctx: &mut Self::Context) {
        ctx.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::model::{Conversation, ConversationType, Message, Participant};
    use crate::conversation::service::tests::InMemoryConversations;
    use crate::realtime::hub::SubscriberCount;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    /// Stands in for the WebSocket session
    struct Screen {
        pushes: Arc<Mutex<Vec<ServerMessage>>>,
    }

    impl Actor for Screen {
        type Context = Context<Self>;
    }

    impl Handler<Push> for Screen {
        type Result = ();

        fn handle(&mut self, msg: Push, _: &mut Context<Self>) {
            self.pushes.lock().unwrap().push(msg.0);
        }
    }

    fn dm(me: ObjectId, them: ObjectId) -> Conversation {
        let at = Utc::now() - Duration::hours(1);
        let participant = |user_id, last_read_at| Participant {
            user_id,
            joined_at: at,
            last_read_at,
            is_admin: false,
        };
        Conversation {
            id: ObjectId::new(),
            conversation_type: ConversationType::Dm,
            name: None,
            participants: vec![participant(me, Some(at)), participant(them, None)],
            created_at: at,
            updated_at: at,
        }
    }

    fn message_from(conversation: &Conversation, sender: ObjectId) -> Message {
        Message {
            id: ObjectId::new(),
            conversation_id: conversation.id,
            sender_id: sender,
            content: "ping".to_string(),
            created_at: Utc::now(),
            edited_at: None,
            is_deleted: false,
        }
    }

    fn totals(pushes: &Arc<Mutex<Vec<ServerMessage>>>) -> Vec<usize> {
        pushes
            .lock()
            .unwrap()
            .iter()
            .filter_map(|m| match m {
                ServerMessage::Unread { total, .. } => Some(*total),
                _ => None,
            })
            .collect()
    }

    /// Poll until `done` holds; fetches resolve on the actor's own schedule
    async fn wait_until(done: impl Fn() -> bool) {
        for _ in 0..200 {
            if done() {
                return;
            }
            actix::clock::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("condition not reached in time");
    }

    struct Setup {
        hub: Addr<FeedHub>,
        store: Arc<InMemoryConversations>,
        feed: Addr<UnreadFeed>,
        pushes: Arc<Mutex<Vec<ServerMessage>>>,
        me: ObjectId,
        them: ObjectId,
        conversation: Conversation,
    }

    async fn start_feed() -> Setup {
        let (me, them) = (ObjectId::new(), ObjectId::new());
        let conversation = dm(me, them);
        let store = Arc::new(InMemoryConversations::default());
        store.push_message(message_from(&conversation, them)).await;
        store.insert(conversation.clone()).await;

        let hub = FeedHub::new().start();
        let pushes = Arc::new(Mutex::new(Vec::new()));
        let screen = Screen {
            pushes: pushes.clone(),
        }
        .start();
        let shared: Arc<dyn ConversationStore> = store.clone();
        let feed = UnreadFeed::new(me, hub.clone(), shared, screen.recipient()).start();

        Setup {
            hub,
            store,
            feed,
            pushes,
            me,
            them,
            conversation,
        }
    }

    #[actix_web::test]
    async fn shows_loading_then_initial_counts() {
        let setup = start_feed().await;
        let pushes = setup.pushes.clone();

        wait_until(|| !totals(&pushes).is_empty()).await;
        assert_eq!(pushes.lock().unwrap()[0], ServerMessage::Loading);
        assert_eq!(totals(&pushes), vec![1]);
    }

    #[actix_web::test]
    async fn new_message_event_triggers_a_refetch() {
        let setup = start_feed().await;
        let pushes = setup.pushes.clone();
        wait_until(|| totals(&pushes).len() == 1).await;

        setup
            .store
            .push_message(message_from(&setup.conversation, setup.them))
            .await;
        setup.hub.do_send(Publish(FeedEvent::MessageInserted {
            conversation_id: setup.conversation.id,
            participant_ids: setup.conversation.participant_ids(),
        }));

        wait_until(|| totals(&pushes).len() == 2).await;
        assert_eq!(totals(&pushes), vec![1, 2]);
    }

    #[actix_web::test]
    async fn mark_read_zeroes_the_badge() {
        let setup = start_feed().await;
        let pushes = setup.pushes.clone();
        wait_until(|| totals(&pushes).len() == 1).await;

        setup.feed.do_send(MarkRead {
            conversation_id: setup.conversation.id,
        });

        wait_until(|| {
            pushes
                .lock()
                .unwrap()
                .iter()
                .any(|m| matches!(m, ServerMessage::MarkedRead { .. }))
        })
        .await;
        assert_eq!(totals(&pushes)[1], 0);
        let inbox = load_inbox(setup.store.as_ref(), &setup.me).await.unwrap();
        assert_eq!(inbox[0].unread_count, 0);
    }

    #[actix_web::test]
    async fn closed_feed_releases_subscription_and_stays_quiet() {
        let setup = start_feed().await;
        let pushes = setup.pushes.clone();
        wait_until(|| totals(&pushes).len() == 1).await;

        setup.feed.do_send(Close);
        wait_until(|| !setup.feed.connected()).await;
        // the guard's Unsubscribe is queued before this count request
        let count = setup
            .hub
            .send(SubscriberCount { viewer_id: None })
            .await
            .unwrap();
        assert_eq!(count, 0);

        setup.hub.do_send(Publish(FeedEvent::ParticipantUpdated {
            conversation_id: setup.conversation.id,
            user_id: setup.me,
        }));
        setup.feed.do_send(Refresh);
        actix::clock::sleep(std::time::Duration::from_millis(30)).await;
        assert_eq!(totals(&pushes).len(), 1);
    }
}
