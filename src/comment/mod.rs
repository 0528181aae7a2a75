pub mod controller;
pub mod index;
pub mod model;
pub mod reply;
pub mod service;
pub mod tree;
