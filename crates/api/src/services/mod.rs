//! External service integrations.

pub mod images;
pub mod supabase_auth;
pub mod supabase_storage;
pub mod token_verifier;

pub use supabase_auth::SupabaseAuthClient;
pub use supabase_storage::SupabaseStorageClient;
pub use token_verifier::{AccessTokenVerifier, TokenError};
