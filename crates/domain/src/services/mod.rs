//! Domain services for Bulletin.
//!
//! Abstractions over the external providers the API delegates to.

pub mod identity;
pub mod storage;

pub use identity::{
    IdentityError, IdentityProvider, InMemoryIdentityProvider, ProviderSession, ProviderUser,
    SignInOutcome, SignUpOutcome,
};
pub use storage::{InMemoryStorage, ObjectStorage, StorageError, StoredObject};
