use actix::{Addr, Recipient};
use mongodb::bson::oid::ObjectId;
use uuid::Uuid;

use crate::realtime::hub::{FeedHub, Subscribe, SubscriptionId, Unsubscribe};
use crate::realtime::model::FeedEvent;

/// Handle on a live feed subscription.
///
/// The hub entry is released when the handle is dropped, whichever way
/// its owner goes away.
pub struct Subscription {
    id: SubscriptionId,
    hub: Addr<FeedHub>,
}

impl Subscription {
    /// Register with the hub. Subscribe and the eventual Unsubscribe go
    /// through the same mailbox, so they are handled in order.
    pub fn open(hub: Addr<FeedHub>, viewer_id: ObjectId, recipient: Recipient<FeedEvent>) -> Self {
        let id = Uuid::new_v4();
        hub.do_send(Subscribe {
            subscription_id: id,
            viewer_id,
            recipient,
        });
        Subscription { id, hub }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.do_send(Unsubscribe {
            subscription_id: self.id,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realtime::hub::tests::{recorder, settle};
    use crate::realtime::hub::{Publish, SubscriberCount};
    use actix::Actor;

    #[actix_web::test]
    async fn dropping_the_handle_unsubscribes() {
        let hub = FeedHub::new().start();
        let viewer = ObjectId::new();
        let (tab, seen) = recorder();

        let subscription = Subscription::open(hub.clone(), viewer, tab.clone().recipient());
        let count = hub
            .send(SubscriberCount {
                viewer_id: Some(viewer),
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        drop(subscription);
        hub.do_send(Publish(FeedEvent::ParticipantUpdated {
            conversation_id: ObjectId::new(),
            user_id: viewer,
        }));
        settle(&hub, &[&tab]).await;

        assert!(seen.lock().unwrap().is_empty());
        let count = hub.send(SubscriberCount { viewer_id: None }).await.unwrap();
        assert_eq!(count, 0);
    }

    #[actix_web::test]
    async fn resubscribing_does_not_duplicate_delivery() {
        let hub = FeedHub::new().start();
        let viewer = ObjectId::new();
        let (tab, seen) = recorder();

        let first = Subscription::open(hub.clone(), viewer, tab.clone().recipient());
        drop(first);
        let _second = Subscription::open(hub.clone(), viewer, tab.clone().recipient());

        hub.do_send(Publish(FeedEvent::MessageInserted {
            conversation_id: ObjectId::new(),
            participant_ids: vec![viewer],
        }));
        settle(&hub, &[&tab]).await;

        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[actix_web::test]
    async fn handle_is_released_on_early_return() {
        fn fails_after_subscribing(hub: &Addr<FeedHub>, viewer: ObjectId, r: Recipient<FeedEvent>) -> Result<(), String> {
            let _subscription = Subscription::open(hub.clone(), viewer, r);
            Err("setup failed".to_string())
        }

        let hub = FeedHub::new().start();
        let (tab, _) = recorder();
        assert!(fails_after_subscribing(&hub, ObjectId::new(), tab.recipient()).is_err());

        let count = hub.send(SubscriberCount { viewer_id: None }).await.unwrap();
        assert_eq!(count, 0);
    }
}
