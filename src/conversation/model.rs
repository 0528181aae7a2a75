use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    Dm,
    Group,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Participant {
    pub user_id: ObjectId,
    pub joined_at: DateTime<Utc>,
    /// `None` until the participant opens the conversation for the first time
    #[serde(default)]
    pub last_read_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    /// Only meaningful for groups
    pub name: Option<String>,
    pub participants: Vec<Participant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn participant(&self, user_id: &ObjectId) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == *user_id)
    }

    pub fn participant_mut(&mut self, user_id: &ObjectId) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == *user_id)
    }

    pub fn participant_ids(&self) -> Vec<ObjectId> {
        self.participants.iter().map(|p| p.user_id).collect()
    }

    pub fn is_admin(&self, user_id: &ObjectId) -> bool {
        self.participant(user_id).is_some_and(|p| p.is_admin)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    #[serde(rename = "_id")]
    pub id: ObjectId,
    pub conversation_id: ObjectId,
    pub sender_id: ObjectId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_deleted: bool,
}

/// A conversation as the viewer's inbox shows it
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ConversationSummary {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub last_message: Option<Message>,
    pub unread_count: usize,
}

impl ConversationSummary {
    /// Time of the latest activity, used to order the inbox
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map(|m| m.created_at)
            .unwrap_or(self.conversation.updated_at)
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct UnreadEntry {
    pub conversation_id: ObjectId,
    pub unread_count: usize,
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    #[serde(rename = "type")]
    pub conversation_type: ConversationType,
    pub name: Option<String>,
    pub participants: Vec<String>,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}
