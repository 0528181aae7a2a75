use super::controller::ws_unread;
use actix_web::web;

pub fn realtime_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/ws").route("/unread", web::get().to(ws_unread)));
}
