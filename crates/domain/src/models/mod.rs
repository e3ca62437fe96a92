//! Domain models for Bulletin.

pub mod album;
pub mod event;
pub mod image;
pub mod user;

pub use album::Album;
pub use event::Event;
pub use image::Image;
pub use user::{AuthenticatedUser, User};
