use crate::realtime::model::FeedEvent;
use actix::prelude::*;
use mongodb::bson::oid::ObjectId;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

pub type SubscriptionId = Uuid;

/// Register a recipient for the viewer's feed events
#[derive(Message)]
#[rtype(result = "()")]
pub struct Subscribe {
    pub subscription_id: SubscriptionId,
    pub viewer_id: ObjectId,
    pub recipient: Recipient<FeedEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Unsubscribe {
    pub subscription_id: SubscriptionId,
}

/// Fan an event out to every subscription in its audience
#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish(pub FeedEvent);

/// Number of live subscriptions, for one viewer or overall
#[derive(Message)]
#[rtype(result = "usize")]
pub struct SubscriberCount {
    pub viewer_id: Option<ObjectId>,
}

struct SubscriberInfo {
    viewer_id: ObjectId,
    recipient: Recipient<FeedEvent>,
}

/// Feed hub actor - routes inbox events to subscribed sessions.
/// Events are not stored; a new subscriber only sees what is published
/// after it joined.
pub struct FeedHub {
    /// Map of subscription_id -> subscriber
    subscriptions: HashMap<SubscriptionId, SubscriberInfo>,
    /// Map of viewer_id -> their subscription ids (one per tab/device)
    by_viewer: HashMap<ObjectId, HashSet<SubscriptionId>>,
}

impl FeedHub {
    pub fn new() -> Self {
        FeedHub {
            subscriptions: HashMap::new(),
            by_viewer: HashMap::new(),
        }
    }

    fn remove(&mut self, subscription_id: &SubscriptionId) -> bool {
        let Some(info) = self.subscriptions.remove(subscription_id) else {
            return false;
        };
        if let Some(ids) = self.by_viewer.get_mut(&info.viewer_id) {
            ids.remove(subscription_id);
            if ids.is_empty() {
                self.by_viewer.remove(&info.viewer_id);
            }
        }
        true
    }
}

impl Default for FeedHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Actor for FeedHub {
    type Context = Context<Self>;
}

impl Handler<Subscribe> for FeedHub {
    type Result = ();

    fn handle(&mut self, msg: Subscribe, _: &mut Context<Self>) {
        log::info!(
            "Viewer {} subscribed to inbox feed ({})",
            msg.viewer_id,
            msg.subscription_id
        );

        self.by_viewer
            .entry(msg.viewer_id)
            .or_default()
            .insert(msg.subscription_id);
        self.subscriptions.insert(
            msg.subscription_id,
            SubscriberInfo {
                viewer_id: msg.viewer_id,
                recipient: msg.recipient,
            },
        );
    }
}

impl Handler<Unsubscribe> for FeedHub {
    type Result = ();

    fn handle(&mut self, msg: Unsubscribe, _: &mut Context<Self>) {
        if self.remove(&msg.subscription_id) {
            log::info!("Subscription {} released", msg.subscription_id);
        }
    }
}

impl Handler<Publish> for FeedHub {
    type Result = ();

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) {
        let event = msg.0;
        let mut closed = Vec::new();

        for user_id in event.audience() {
            let Some(ids) = self.by_viewer.get(&user_id) else {
                continue;
            };
            for id in ids {
                if let Some(info) = self.subscriptions.get(id) {
                    match info.recipient.try_send(event.clone()) {
                        Ok(()) => {}
                        Err(SendError::Full(_)) => {
                            log::warn!("Feed mailbox full for subscription {}; event dropped", id);
                        }
                        Err(SendError::Closed(_)) => closed.push(*id),
                    }
                }
            }
        }

        // Sessions that died without unsubscribing
        for id in closed {
            log::warn!("Dropping closed subscription {}", id);
            self.remove(&id);
        }
    }
}

impl Handler<SubscriberCount> for FeedHub {
    type Result = usize;

    fn handle(&mut self, msg: SubscriberCount, _: &mut Context<Self>) -> usize {
        match msg.viewer_id {
            Some(viewer_id) => self.by_viewer.get(&viewer_id).map_or(0, |ids| ids.len()),
            None => self.subscriptions.len(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Actor that records every event it receives
    pub(crate) struct Recorder {
        pub seen: Arc<Mutex<Vec<FeedEvent>>>,
    }

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<FeedEvent> for Recorder {
        type Result = ();

        fn handle(&mut self, msg: FeedEvent, _: &mut Context<Self>) {
            self.seen.lock().unwrap().push(msg);
        }
    }

    pub(crate) fn recorder() -> (Addr<Recorder>, Arc<Mutex<Vec<FeedEvent>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let addr = Recorder { seen: seen.clone() }.start();
        (addr, seen)
    }

    /// Answered only after every earlier message to the recorder
    #[derive(Message)]
    #[rtype(result = "()")]
    pub(crate) struct Flush;

    impl Handler<Flush> for Recorder {
        type Result = ();

        fn handle(&mut self, _: Flush, _: &mut Context<Self>) {}
    }

    /// Round-trip through the hub, then through each recorder, so every event
    /// published before the call has been delivered
    pub(crate) async fn settle(hub: &Addr<FeedHub>, recorders: &[&Addr<Recorder>]) {
        hub.send(SubscriberCount { viewer_id: None }).await.unwrap();
        for recorder in recorders {
            recorder.send(Flush).await.unwrap();
        }
    }

    #[actix_web::test]
    async fn routes_message_events_to_participants_only() {
        let hub = FeedHub::new().start();
        let (alice, alice_seen) = recorder();
        let (bob, bob_seen) = recorder();
        let (alice_id, bob_id) = (ObjectId::new(), ObjectId::new());

        hub.do_send(Subscribe {
            subscription_id: Uuid::new_v4(),
            viewer_id: alice_id,
            recipient: alice.clone().recipient(),
        });
        hub.do_send(Subscribe {
            subscription_id: Uuid::new_v4(),
            viewer_id: bob_id,
            recipient: bob.clone().recipient(),
        });

        let event = FeedEvent::MessageInserted {
            conversation_id: ObjectId::new(),
            participant_ids: vec![alice_id, ObjectId::new()],
        };
        hub.do_send(Publish(event.clone()));
        settle(&hub, &[&alice, &bob]).await;

        assert_eq!(*alice_seen.lock().unwrap(), vec![event]);
        assert!(bob_seen.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn every_tab_of_a_viewer_gets_read_marker_updates() {
        let hub = FeedHub::new().start();
        let viewer = ObjectId::new();
        let (tab_a, seen_a) = recorder();
        let (tab_b, seen_b) = recorder();

        for tab in [tab_a.clone().recipient(), tab_b.clone().recipient()] {
            hub.do_send(Subscribe {
                subscription_id: Uuid::new_v4(),
                viewer_id: viewer,
                recipient: tab,
            });
        }
        let count = hub
            .send(SubscriberCount {
                viewer_id: Some(viewer),
            })
            .await
            .unwrap();
        assert_eq!(count, 2);

        hub.do_send(Publish(FeedEvent::ParticipantUpdated {
            conversation_id: ObjectId::new(),
            user_id: viewer,
        }));
        settle(&hub, &[&tab_a, &tab_b]).await;

        assert_eq!(seen_a.lock().unwrap().len(), 1);
        assert_eq!(seen_b.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn unsubscribe_stops_delivery() {
        let hub = FeedHub::new().start();
        let viewer = ObjectId::new();
        let (tab, seen) = recorder();
        let id = Uuid::new_v4();

        hub.do_send(Subscribe {
            subscription_id: id,
            viewer_id: viewer,
            recipient: tab.clone().recipient(),
        });
        hub.do_send(Unsubscribe {
            subscription_id: id,
        });
        hub.do_send(Publish(FeedEvent::ParticipantUpdated {
            conversation_id: ObjectId::new(),
            user_id: viewer,
        }));
        settle(&hub, &[&tab]).await;

        assert!(seen.lock().unwrap().is_empty());
        let count = hub.send(SubscriberCount { viewer_id: None }).await.unwrap();
        assert_eq!(count, 0);
    }
}
