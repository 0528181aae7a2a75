use super::controller::{get_reactions, toggle_reaction};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn reaction_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/reactions")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("", web::post().to(toggle_reaction))
            .route("/{target_id}", web::get().to(get_reactions)),
    );
}
