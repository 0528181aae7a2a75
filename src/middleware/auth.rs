use crate::config::AppConfig;
use crate::database::RedisService;
use crate::utils::error::CustomError;
use crate::utils::helpers::parse_object_id;
use crate::utils::model::{Role, Viewer};
use actix_web::{Error, FromRequest, HttpMessage, HttpRequest, dev::Payload, dev::ServiceRequest, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use std::future::{Ready, ready};

/// Claims of tokens issued by the identity provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub role: Role,
    pub exp: usize,
}

fn jwt_secret(req: &ServiceRequest) -> String {
    req.app_data::<web::Data<AppConfig>>()
        .map(|config| config.jwt_secret.clone())
        .unwrap_or_else(|| std::env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string()))
}

/// Decode and validate a bearer token
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, CustomError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| CustomError::UnauthorizedError("Invalid token".to_string()))
}

/// Verify JWT token and reject tokens revoked in Redis
pub async fn verify_token(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (Error, ServiceRequest)> {
    let token = credentials.token();

    let claims = match decode_claims(token, &jwt_secret(&req)) {
        Ok(claims) => claims,
        Err(e) => return Err((e.into(), req)),
    };

    let redis_service = match req.app_data::<web::Data<RedisService>>() {
        Some(service) => service,
        None => {
            // Without Redis, just validate JWT (fallback mode)
            req.extensions_mut().insert(claims);
            return Ok(req);
        }
    };

    match redis_service.is_token_revoked(token).await {
        Ok(true) => Err((
            CustomError::UnauthorizedError("Session revoked".to_string()).into(),
            req,
        )),
        Ok(false) => {
            req.extensions_mut().insert(claims);
            Ok(req)
        }
        Err(e) => {
            // Redis error - fall back to JWT validation alone
            log::warn!("Token revocation check failed: {}", e);
            req.extensions_mut().insert(claims);
            Ok(req)
        }
    }
}

/// Build the viewer context from verified claims
pub fn viewer_from_claims(claims: &Claims) -> Result<Viewer, CustomError> {
    let user_id = parse_object_id(&claims.id, "user")
        .map_err(|_| CustomError::UnauthorizedError("Invalid user id in token".to_string()))?;

    Ok(Viewer {
        user_id,
        display_name: claims.name.clone(),
        avatar: claims.avatar.clone(),
        role: claims.role,
    })
}

/// Available on routes wrapped with `verify_token`
impl FromRequest for Viewer {
    type Error = CustomError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let result = req
            .extensions()
            .get::<Claims>()
            .ok_or_else(|| CustomError::UnauthorizedError("Not authenticated".to_string()))
            .and_then(viewer_from_claims);
        ready(result)
    }
}
