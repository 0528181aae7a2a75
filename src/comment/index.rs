use super::controller::{
    create_comment, delete_comment, get_comment, get_comment_count, get_post_comments,
    get_post_thread, update_comment,
};
use crate::middleware::auth::verify_token;
use actix_web::web;
use actix_web_httpauth::middleware::HttpAuthentication;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/comments")
            .wrap(HttpAuthentication::bearer(verify_token))
            .route("", web::post().to(create_comment))
            .route("/post/{post_id}", web::get().to(get_post_comments))
            .route("/post/{post_id}/thread", web::get().to(get_post_thread))
            .route("/count/{post_id}", web::get().to(get_comment_count))
            .route("/{comment_id}", web::get().to(get_comment))
            .route("/{comment_id}", web::put().to(update_comment))
            .route("/{comment_id}", web::delete().to(delete_comment)),
    );
}
