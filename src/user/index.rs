use super::controller::{current_user, logout_user};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth/user")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("/me", web::get().to(current_user))
            .route("/logout", web::post().to(logout_user)),
    );
}
