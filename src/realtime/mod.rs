pub mod controller;
pub mod feed;
pub mod hub;
pub mod index;
pub mod model;
pub mod session;
pub mod subscription;
