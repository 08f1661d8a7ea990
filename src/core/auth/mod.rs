pub mod auth_models;
pub mod auth_service;
pub mod credential_cache;

pub use auth_models::{
    AccountIdentity, AuthStatusReport, CachedAccount, DeviceCodeResponse, DeviceFlow,
    PollOutcome, TokenGrant,
};
pub use auth_service::{AuthError, AuthService, IdentityProvider, ProviderError, TokenSource};
pub use credential_cache::{CacheError, CacheSession, CredentialStore};
