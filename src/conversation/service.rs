use crate::conversation::model::{Conversation, ConversationType, Message, Participant};
use crate::utils::error::CustomError;
use crate::utils::model::Viewer;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, to_bson};
use mongodb::{Client, Collection};

/// Read side of the inbox plus the read-marker write.
///
/// The unread counter only talks to this trait, so it can run against
/// MongoDB in the server and against memory in tests.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn conversations_for(&self, user_id: &ObjectId) -> Result<Vec<Conversation>, CustomError>;

    async fn find_conversation(
        &self,
        conversation_id: &ObjectId,
    ) -> Result<Option<Conversation>, CustomError>;

    /// Messages of a conversation, oldest first, deleted ones included
    async fn messages_for(&self, conversation_id: &ObjectId) -> Result<Vec<Message>, CustomError>;

    /// Non-deleted messages of several conversations in one query,
    /// grouped by conversation, oldest first
    async fn live_messages_for(
        &self,
        conversation_ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, Vec<Message>>, CustomError>;

    async fn set_last_read(
        &self,
        conversation_id: &ObjectId,
        user_id: &ObjectId,
        at: DateTime<Utc>,
    ) -> Result<(), CustomError>;
}

/// Group messages by conversation, each group sorted by creation time
pub fn group_by_conversation(messages: Vec<Message>) -> HashMap<ObjectId, Vec<Message>> {
    let mut grouped: HashMap<ObjectId, Vec<Message>> = HashMap::new();
    for message in messages {
        grouped.entry(message.conversation_id).or_default().push(message);
    }
    for group in grouped.values_mut() {
        group.sort_by_key(|m| m.created_at);
    }
    grouped
}

/// Validate and build a new conversation. The creator is always a
/// participant; in groups the creator is also admin.
pub fn new_conversation(
    creator: &Viewer,
    conversation_type: ConversationType,
    name: Option<String>,
    others: Vec<ObjectId>,
) -> Result<Conversation, CustomError> {
    let mut members: Vec<ObjectId> = Vec::with_capacity(others.len());
    for id in others {
        if id != creator.user_id && !members.contains(&id) {
            members.push(id);
        }
    }

    let name = match conversation_type {
        ConversationType::Dm => {
            if members.len() != 1 {
                return Err(CustomError::ValidationError(
                    "A direct conversation needs exactly one other participant".to_string(),
                ));
            }
            None
        }
        ConversationType::Group => {
            let name = name.map(|n| n.trim().to_string()).unwrap_or_default();
            if name.is_empty() {
                return Err(CustomError::ValidationError(
                    "A group conversation needs a name".to_string(),
                ));
            }
            if members.is_empty() {
                return Err(CustomError::ValidationError(
                    "A group conversation needs at least one other participant".to_string(),
                ));
            }
            Some(name)
        }
    };

    let now = Utc::now();
    let mut participants = vec![Participant {
        user_id: creator.user_id,
        joined_at: now,
        last_read_at: Some(now),
        is_admin: conversation_type == ConversationType::Group,
    }];
    participants.extend(members.into_iter().map(|user_id| Participant {
        user_id,
        joined_at: now,
        last_read_at: None,
        is_admin: false,
    }));

    Ok(Conversation {
        id: ObjectId::new(),
        conversation_type,
        name,
        participants,
        created_at: now,
        updated_at: now,
    })
}

pub struct ConversationService {
    conversations: Collection<Conversation>,
    messages: Collection<Message>,
}

impl ConversationService {
    pub fn new(client: &Client, database_name: &str) -> Self {
        let db = client.database(database_name);
        ConversationService {
            conversations: db.collection::<Conversation>("conversations"),
            messages: db.collection::<Message>("messages"),
        }
    }

    pub async fn create_conversation(&self, conversation: Conversation) -> Result<Conversation, CustomError> {
        self.conversations
            .insert_one(&conversation)
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to create conversation: {}", e))
            })?;

        log::info!(
            "Conversation {} created with {} participants",
            conversation.id,
            conversation.participants.len()
        );
        Ok(conversation)
    }

    /// Load a conversation the viewer takes part in
    pub async fn conversation_for_participant(
        &self,
        conversation_id: &ObjectId,
        viewer: &Viewer,
    ) -> Result<Conversation, CustomError> {
        let conversation = self
            .find_conversation(conversation_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Conversation not found".to_string()))?;

        if conversation.participant(&viewer.user_id).is_none() {
            return Err(CustomError::ForbiddenError(
                "Not a participant of this conversation".to_string(),
            ));
        }
        Ok(conversation)
    }

    pub async fn send_message(
        &self,
        conversation: &Conversation,
        viewer: &Viewer,
        content: String,
    ) -> Result<Message, CustomError> {
        let message = Message {
            id: ObjectId::new(),
            conversation_id: conversation.id,
            sender_id: viewer.user_id,
            content,
            created_at: Utc::now(),
            edited_at: None,
            is_deleted: false,
        };

        self.messages.insert_one(&message).await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to send message: {}", e))
        })?;

        self.conversations
            .update_one(
                doc! { "_id": conversation.id },
                doc! { "$set": { "updated_at": to_bson(&message.created_at)? } },
            )
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to touch conversation: {}", e))
            })?;

        Ok(message)
    }

    /// Only the sender may edit
    pub async fn edit_message(
        &self,
        conversation_id: &ObjectId,
        message_id: &ObjectId,
        viewer: &Viewer,
        content: String,
    ) -> Result<(), CustomError> {
        let result = self
            .messages
            .update_one(
                doc! {
                    "_id": message_id,
                    "conversation_id": conversation_id,
                    "sender_id": viewer.user_id,
                    "is_deleted": false
                },
                doc! {
                    "$set": {
                        "content": content,
                        "edited_at": to_bson(&Utc::now())?
                    }
                },
            )
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to edit message: {}", e))
            })?;

        if result.matched_count == 0 {
            return Err(CustomError::NotFoundError(
                "Message not found or not authorized".to_string(),
            ));
        }
        Ok(())
    }

    /// Soft delete by the sender or a conversation admin
    pub async fn delete_message(
        &self,
        conversation: &Conversation,
        message_id: &ObjectId,
        viewer: &Viewer,
    ) -> Result<(), CustomError> {
        let filter = if conversation.is_admin(&viewer.user_id) {
            doc! { "_id": message_id, "conversation_id": conversation.id }
        } else {
            doc! {
                "_id": message_id,
                "conversation_id": conversation.id,
                "sender_id": viewer.user_id
            }
        };

        let result = self
            .messages
            .update_one(filter, doc! { "$set": { "is_deleted": true } })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to delete message: {}", e))
            })?;

        if result.matched_count == 0 {
            return Err(CustomError::NotFoundError(
                "Message not found or not authorized".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for ConversationService {
    async fn conversations_for(&self, user_id: &ObjectId) -> Result<Vec<Conversation>, CustomError> {
        let cursor = self
            .conversations
            .find(doc! { "participants.user_id": user_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch conversations: {}", e))
            })?;

        cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect conversations: {}", e))
        })
    }

    async fn find_conversation(
        &self,
        conversation_id: &ObjectId,
    ) -> Result<Option<Conversation>, CustomError> {
        self.conversations
            .find_one(doc! { "_id": conversation_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch conversation: {}", e))
            })
    }

    async fn messages_for(&self, conversation_id: &ObjectId) -> Result<Vec<Message>, CustomError> {
        let cursor = self
            .messages
            .find(doc! { "conversation_id": conversation_id })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch messages: {}", e))
            })?;

        let mut messages: Vec<Message> = cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect messages: {}", e))
        })?;

        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn live_messages_for(
        &self,
        conversation_ids: &[ObjectId],
    ) -> Result<HashMap<ObjectId, Vec<Message>>, CustomError> {
        if conversation_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let cursor = self
            .messages
            .find(doc! {
                "conversation_id": { "$in": conversation_ids.to_vec() },
                "is_deleted": false
            })
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to fetch messages: {}", e))
            })?;

        let messages: Vec<Message> = cursor.try_collect().await.map_err(|e| {
            CustomError::InternalServerError(format!("Failed to collect messages: {}", e))
        })?;

        Ok(group_by_conversation(messages))
    }

    async fn set_last_read(
        &self,
        conversation_id: &ObjectId,
        user_id: &ObjectId,
        at: DateTime<Utc>,
    ) -> Result<(), CustomError> {
        let result = self
            .conversations
            .update_one(
                doc! { "_id": conversation_id, "participants.user_id": user_id },
                doc! { "$set": { "participants.$.last_read_at": to_bson(&at)? } },
            )
            .await
            .map_err(|e| {
                CustomError::InternalServerError(format!("Failed to mark conversation read: {}", e))
            })?;

        if result.matched_count == 0 {
            return Err(CustomError::NotFoundError(
                "Conversation not found or not a participant".to_string(),
            ));
        }
        Ok(())
    }
}
