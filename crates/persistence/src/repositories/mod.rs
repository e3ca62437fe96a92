//! Repository implementations for database operations.

pub mod album;
pub mod event;
pub mod image;
pub mod user;

pub use album::AlbumRepository;
pub use event::EventRepository;
pub use image::ImageRepository;
pub use user::UserRepository;
