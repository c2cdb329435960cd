pub mod auth;
pub mod game;
pub mod geo;
pub mod subscription;
pub mod support;
