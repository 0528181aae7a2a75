use crate::database::RedisService;
use crate::middleware::auth::Claims;
use crate::utils::error::CustomError;
use crate::utils::helpers::service_name;
use crate::utils::model::Viewer;
use actix_web::{HttpMessage, HttpRequest, HttpResponse, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde_json::json;

/// Who the presented token belongs to
/// GET /auth/user/me
pub async fn current_user(viewer: Viewer) -> Result<HttpResponse, CustomError> {
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Current user retrieved successfully",
        "httpStatusCode": 200,
        "service": service_name(),
        "data": {
            "id": viewer.user_id.to_hex(),
            "name": viewer.display_name,
            "avatar": viewer.avatar,
            "role": viewer.role
        }
    })))
}

/// Revoke the presented token until it expires
/// POST /auth/user/logout
pub async fn logout_user(
    req: HttpRequest,
    credentials: BearerAuth,
    redis_service: Option<web::Data<RedisService>>,
) -> Result<HttpResponse, CustomError> {
    let exp = req
        .extensions()
        .get::<Claims>()
        .map(|claims| claims.exp)
        .ok_or_else(|| CustomError::UnauthorizedError("Not authenticated".to_string()))?;

    let redis_service = redis_service.ok_or_else(|| {
        CustomError::InternalServerError("Session store is not available".to_string())
    })?;

    let now = chrono::Utc::now().timestamp().max(0) as usize;
    let remaining = exp.saturating_sub(now).max(1) as u64;

    redis_service
        .revoke_token(credentials.token(), remaining)
        .await
        .map_err(CustomError::InternalServerError)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully",
        "httpStatusCode": 200,
        "service": service_name()
    })))
}
