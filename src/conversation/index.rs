use super::controller::{
    create_conversation, delete_message, edit_message, get_messages, get_unread_counts,
    list_conversations, mark_read, send_message,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn conversation_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/conversations")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("", web::post().to(create_conversation))
            .route("", web::get().to(list_conversations))
            .route("/unread", web::get().to(get_unread_counts))
            .route("/{conversation_id}/read", web::post().to(mark_read))
            .route("/{conversation_id}/messages", web::get().to(get_messages))
            .route("/{conversation_id}/messages", web::post().to(send_message))
            .route(
                "/{conversation_id}/messages/{message_id}",
                web::put().to(edit_message),
            )
            .route(
                "/{conversation_id}/messages/{message_id}",
                web::delete().to(delete_message),
            ),
    );
}
