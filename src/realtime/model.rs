use actix::Message;
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::conversation::model::UnreadEntry;

/// Change pushed to subscribers of the inbox feed
#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum FeedEvent {
    /// A message was inserted into a conversation
    MessageInserted {
        conversation_id: ObjectId,
        participant_ids: Vec<ObjectId>,
    },
    /// A message was soft-deleted; unread counts may drop
    MessageRemoved {
        conversation_id: ObjectId,
        participant_ids: Vec<ObjectId>,
    },
    /// A participant's read marker (or other participant field) changed
    ParticipantUpdated {
        conversation_id: ObjectId,
        user_id: ObjectId,
    },
}

impl FeedEvent {
    /// Users whose subscriptions receive this event
    pub fn audience(&self) -> Vec<ObjectId> {
        match self {
            FeedEvent::MessageInserted {
                participant_ids, ..
            }
            | FeedEvent::MessageRemoved {
                participant_ids, ..
            } => participant_ids.clone(),
            FeedEvent::ParticipantUpdated { user_id, .. } => vec![*user_id],
        }
    }

    pub fn conversation_id(&self) -> ObjectId {
        match self {
            FeedEvent::MessageInserted {
                conversation_id, ..
            }
            | FeedEvent::MessageRemoved {
                conversation_id, ..
            }
            | FeedEvent::ParticipantUpdated {
                conversation_id, ..
            } => *conversation_id,
        }
    }
}

/// WebSocket message from client
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Move the read marker of a conversation to now
    MarkRead { conversation_id: String },
    /// Re-fetch the counts
    Refresh,
    /// Ping to keep connection alive
    Ping,
}

/// WebSocket message to client
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Connection established
    Connected { user_id: String, session_id: String },
    /// First fetch still running
    Loading,
    /// Current unread counts
    Unread {
        total: usize,
        conversations: Vec<UnreadEntryPayload>,
        stale: bool,
    },
    /// A mark-read request was acknowledged
    MarkedRead { conversation_id: String },
    /// Error message
    Error { message: String },
    /// Pong response
    Pong,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UnreadEntryPayload {
    pub conversation_id: String,
    pub unread_count: usize,
}

impl From<UnreadEntry> for UnreadEntryPayload {
    fn from(entry: UnreadEntry) -> Self {
        UnreadEntryPayload {
            conversation_id: entry.conversation_id.to_hex(),
            unread_count: entry.unread_count,
        }
    }
}
