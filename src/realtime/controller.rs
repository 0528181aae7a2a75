use actix::Addr;
use actix_web::{HttpRequest, HttpResponse, web};
use actix_web_actors::ws;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::RedisService;
use crate::conversation::service::{ConversationService, ConversationStore};
use crate::middleware::auth::decode_claims;
use crate::realtime::hub::FeedHub;
use crate::realtime::session::UnreadSession;
use crate::utils::error::CustomError;
use crate::utils::helpers::parse_object_id;

#[derive(serde::Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

/// Live unread counter over WebSocket, token in query parameter
/// (browsers cannot set headers on the upgrade request)
/// GET /ws/unread?token=<jwt_token>
pub async fn ws_unread(
    req: HttpRequest,
    stream: web::Payload,
    hub: web::Data<Addr<FeedHub>>,
    conversation_service: web::Data<ConversationService>,
    config: web::Data<AppConfig>,
    redis_service: Option<web::Data<RedisService>>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse, actix_web::Error> {
    let claims = decode_claims(&query.token, &config.jwt_secret)?;

    if let Some(redis) = redis_service {
        match redis.is_token_revoked(&query.token).await {
            Ok(true) => {
                return Err(CustomError::UnauthorizedError("Session revoked".to_string()).into());
            }
            Ok(false) => {}
            Err(e) => log::warn!("Token revocation check failed: {}", e),
        }
    }

    let viewer_id = parse_object_id(&claims.id, "user")
        .map_err(|_| CustomError::UnauthorizedError("Invalid user in token".to_string()))?;

    log::info!("Unread feed connection request from user: {}", viewer_id);

    let store: Arc<dyn ConversationStore> = conversation_service.into_inner();
    let session = UnreadSession::new(viewer_id, hub.get_ref().clone(), store);

    ws::start(session, &req, stream)
}
