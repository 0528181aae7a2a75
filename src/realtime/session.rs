use actix::{Actor, ActorContext, Addr, AsyncContext, Handler, Running, StreamHandler};
use actix_web_actors::ws;
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::conversation::service::ConversationStore;
use crate::realtime::feed::{Close, MarkRead, Push, Refresh, UnreadFeed};
use crate::realtime::hub::FeedHub;
use crate::realtime::model::{ClientMessage, ServerMessage};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// WebSocket session of one viewer's unread badge.
///
/// Owns an `UnreadFeed` that does the fetching and forwards its pushes
/// to the socket; the feed is closed with the session.
pub struct UnreadSession {
    pub session_id: String,
    pub viewer_id: ObjectId,
    hub: Addr<FeedHub>,
    store: Arc<dyn ConversationStore>,
    feed: Option<Addr<UnreadFeed>>,
    last_heartbeat: Instant,
}

impl UnreadSession {
    pub fn new(viewer_id: ObjectId, hub: Addr<FeedHub>, store: Arc<dyn ConversationStore>) -> Self {
        UnreadSession {
            session_id: Uuid::new_v4().to_string(),
            viewer_id,
            hub,
            store,
            feed: None,
            last_heartbeat: Instant::now(),
        }
    }

    /// Start heartbeat process
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.last_heartbeat) > CLIENT_TIMEOUT {
                log::warn!("Unread feed heartbeat timeout for {}, disconnecting", act.viewer_id);
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    /// Handle incoming client message
    fn handle_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match msg {
            ClientMessage::MarkRead { conversation_id } => {
                match ObjectId::parse_str(&conversation_id) {
                    Ok(conversation_id) => {
                        if let Some(feed) = &self.feed {
                            feed.do_send(MarkRead { conversation_id });
                        }
                    }
                    Err(_) => self.send_message(
                        &ServerMessage::Error {
                            message: "Invalid conversation ID".to_string(),
                        },
                        ctx,
                    ),
                }
            }
            ClientMessage::Refresh => {
                if let Some(feed) = &self.feed {
                    feed.do_send(Refresh);
                }
            }
            ClientMessage::Ping => self.send_message(&ServerMessage::Pong, ctx),
        }
    }

    /// Send message to WebSocket client
    fn send_message(&self, msg: &ServerMessage, ctx: &mut ws::WebsocketContext<Self>) {
        match serde_json::to_string(msg) {
            Ok(json) => ctx.text(json),
            Err(e) => log::error!("Failed to serialize unread message: {}", e),
        }
    }
}

impl Actor for UnreadSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.start_heartbeat(ctx);

        self.send_message(
            &ServerMessage::Connected {
                user_id: self.viewer_id.to_hex(),
                session_id: self.session_id.clone(),
            },
            ctx,
        );

        let feed = UnreadFeed::new(
            self.viewer_id,
            self.hub.clone(),
            self.store.clone(),
            ctx.address().recipient(),
        );
        self.feed = Some(feed.start());
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        log::info!("Unread session {} stopping", self.session_id);
        if let Some(feed) = self.feed.take() {
            feed.do_send(Close);
        }
        Running::Stop
    }
}

/// Counts or acks coming from the feed
impl Handler<Push> for UnreadSession {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        self.send_message(&msg.0, ctx);
    }
}

/// Handler for WebSocket messages
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for UnreadSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.last_heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.last_heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.last_heartbeat = Instant::now();

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(client_msg) => {
                        self.handle_message(client_msg, ctx);
                    }
                    Err(e) => {
                        log::warn!("Failed to parse WebSocket message: {}", e);
                        self.send_message(
                            &ServerMessage::Error {
                                message: format!("Invalid message format: {}", e),
                            },
                            ctx,
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                log::warn!("Binary messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                log::info!("WebSocket close: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(e) => {
                // Push channel errors leave the badge stale rather than crashing
                log::warn!("Unread feed protocol error for {}: {}", self.viewer_id, e);
                ctx.stop();
            }
        }
    }
}
