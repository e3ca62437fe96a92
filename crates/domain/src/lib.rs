//! Domain layer for the Bulletin backend.
//!
//! This crate contains:
//! - Domain models (User, Event, Album, Image) and their request/response DTOs
//! - Service traits for the external identity provider and object storage

pub mod models;
pub mod services;
