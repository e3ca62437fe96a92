//! Bulletin API: multi-tenant events and gallery CMS over HTTP.

pub mod app;
pub mod config;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
pub mod services;
