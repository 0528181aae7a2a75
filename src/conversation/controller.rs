use crate::conversation::model::{CreateConversationRequest, SendMessageRequest};
use crate::conversation::service::{ConversationService, ConversationStore, new_conversation};
use crate::conversation::unread::{compute_global_unread, load_inbox, mark_conversation_read};
use crate::realtime::hub::{FeedHub, Publish};
use crate::realtime::model::FeedEvent;
use crate::utils::error::CustomError;
use crate::utils::helpers::{parse_object_id, service_name};
use crate::utils::model::Viewer;
use actix::Addr;
use actix_web::{HttpResponse, web};
use serde_json::json;

/// POST /conversations
pub async fn create_conversation(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    body: web::Json<CreateConversationRequest>,
) -> Result<HttpResponse, CustomError> {
    let body = body.into_inner();
    let others = body
        .participants
        .iter()
        .map(|raw| parse_object_id(raw, "participant"))
        .collect::<Result<Vec<_>, _>>()?;

    let conversation = new_conversation(&viewer, body.conversation_type, body.name, others)?;
    let conversation = conversation_service.create_conversation(conversation).await?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Conversation created successfully",
        "httpStatusCode": 201,
        "service": service_name(),
        "data": conversation
    })))
}

/// The viewer's inbox with per-conversation unread counts
/// GET /conversations
pub async fn list_conversations(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
) -> Result<HttpResponse, CustomError> {
    let summaries = load_inbox(conversation_service.get_ref(), &viewer.user_id).await?;
    let total_unread = compute_global_unread(&summaries);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Conversations retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": summaries.len(),
        "total_unread": total_unread,
        "data": summaries
    })))
}

/// GET /conversations/unread
pub async fn get_unread_counts(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
) -> Result<HttpResponse, CustomError> {
    let summaries = load_inbox(conversation_service.get_ref(), &viewer.user_id).await?;
    let conversations: Vec<_> = summaries
        .iter()
        .map(|s| {
            json!({
                "conversation_id": s.conversation.id.to_hex(),
                "unread_count": s.unread_count
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Unread counts retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "total": compute_global_unread(&summaries),
        "conversations": conversations
    })))
}

/// POST /conversations/{conversation_id}/read
pub async fn mark_read(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    hub: web::Data<Addr<FeedHub>>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let conversation_id = parse_object_id(&path.into_inner(), "conversation")?;

    let read_at =
        mark_conversation_read(conversation_service.get_ref(), &conversation_id, &viewer.user_id)
            .await?;

    hub.do_send(Publish(FeedEvent::ParticipantUpdated {
        conversation_id,
        user_id: viewer.user_id,
    }));

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Conversation marked as read",
        "httpStatusCode": 200,
        "service": service_name(),
        "last_read_at": read_at,
        "unread_count": 0
    })))
}

/// GET /conversations/{conversation_id}/messages
pub async fn get_messages(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let conversation_id = parse_object_id(&path.into_inner(), "conversation")?;
    conversation_service
        .conversation_for_participant(&conversation_id, &viewer)
        .await?;

    let messages: Vec<_> = conversation_service
        .messages_for(&conversation_id)
        .await?
        .into_iter()
        .filter(|m| !m.is_deleted)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Messages retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "count": messages.len(),
        "data": messages
    })))
}

/// POST /conversations/{conversation_id}/messages
pub async fn send_message(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    hub: web::Data<Addr<FeedHub>>,
    path: web::Path<String>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, CustomError> {
    let conversation_id = parse_object_id(&path.into_inner(), "conversation")?;

    if body.content.trim().is_empty() {
        return Err(CustomError::BadRequestError(
            "Message content cannot be empty".to_string(),
        ));
    }

    let conversation = conversation_service
        .conversation_for_participant(&conversation_id, &viewer)
        .await?;
    let message = conversation_service
        .send_message(&conversation, &viewer, body.content.trim().to_string())
        .await?;

    hub.do_send(Publish(FeedEvent::MessageInserted {
        conversation_id,
        participant_ids: conversation.participant_ids(),
    }));

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Message sent successfully",
        "httpStatusCode": 201,
        "service": service_name(),
        "data": message
    })))
}

/// PUT /conversations/{conversation_id}/messages/{message_id}
pub async fn edit_message(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    path: web::Path<(String, String)>,
    body: web::Json<SendMessageRequest>,
) -> Result<HttpResponse, CustomError> {
    let (raw_conversation, raw_message) = path.into_inner();
    let conversation_id = parse_object_id(&raw_conversation, "conversation")?;
    let message_id = parse_object_id(&raw_message, "message")?;

    if body.content.trim().is_empty() {
        return Err(CustomError::BadRequestError(
            "Message content cannot be empty".to_string(),
        ));
    }

    conversation_service
        .edit_message(&conversation_id, &message_id, &viewer, body.content.trim().to_string())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Message updated successfully",
        "httpStatusCode": 200,
        "service": service_name()
    })))
}

/// DELETE /conversations/{conversation_id}/messages/{message_id}
pub async fn delete_message(
    viewer: Viewer,
    conversation_service: web::Data<ConversationService>,
    hub: web::Data<Addr<FeedHub>>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, CustomError> {
    let (raw_conversation, raw_message) = path.into_inner();
    let conversation_id = parse_object_id(&raw_conversation, "conversation")?;
    let message_id = parse_object_id(&raw_message, "message")?;

    let conversation = conversation_service
        .conversation_for_participant(&conversation_id, &viewer)
        .await?;
    conversation_service
        .delete_message(&conversation, &message_id, &viewer)
        .await?;

    hub.do_send(Publish(FeedEvent::MessageRemoved {
        conversation_id,
        participant_ids: conversation.participant_ids(),
    }));

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Message deleted successfully",
        "httpStatusCode": 200,
        "service": service_name()
    })))
}
