//! Shared utilities and common types for the Bulletin backend.
//!
//! This crate provides functionality used across all other crates:
//! - Request validators (usernames, passwords, dates, URLs)
//! - Slug generation
//! - Offset pagination
//! - Identity provider access token verification

pub mod jwt;
pub mod pagination;
pub mod slug;
pub mod validation;
