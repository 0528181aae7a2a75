pub mod controller;
pub mod index;
pub mod model;
pub mod optimistic;
pub mod service;
