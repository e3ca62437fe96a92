//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

pub mod album;
pub mod event;
pub mod image;
pub mod user;

pub use album::AlbumEntity;
pub use event::EventEntity;
pub use image::ImageEntity;
pub use user::UserEntity;
