pub mod file_credential_store;
pub mod microsoft_identity;

pub use file_credential_store::FileCredentialStore;
pub use microsoft_identity::MicrosoftIdentityProvider;
