//! HTTP route handlers.

pub mod albums;
pub mod auth;
pub mod events;
pub mod health;
pub mod images;
pub mod openapi;
pub mod public;
pub mod uploads;
