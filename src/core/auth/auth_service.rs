// Token acquisition - core business logic for getting a bearer token.
//
// Two phases:
// 1. SILENT: reuse a still-valid cached access token, or renew it with the
//    account's refresh token. No user involvement.
// 2. INTERACTIVE: start a device-code grant, hand the code/URL to the caller,
//    and poll the provider until the user approves, the code expires, or the
//    provider reports a failure.
//
// `get_access_token` runs both phases and may block for minutes while the user
// signs in elsewhere. Request paths must use `check_status` / `silent_token`,
// which never wait on the user: they start (or poll once) a device flow and
// return immediately.

use super::auth_models::{
    AccessToken, AuthStatusReport, CachedAccount, DeviceCodeResponse, DeviceFlow, PollOutcome,
    TokenGrant,
};
use super::credential_cache::{CacheError, CacheSession, CredentialStore};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Extra wait added each time the provider answers `slow_down` (RFC 8628 §3.5).
const SLOW_DOWN_STEP_SECS: u64 = 5;

/// Upper bound on a single blocking sign-in, whatever lifetime the provider claims.
const MAX_FLOW_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Account key used when the provider does not identify the signed-in user.
const DEFAULT_ACCOUNT_ID: &str = "default";

// ============================================================================
// ERRORS
// ============================================================================

/// Failure reported by an identity provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{error}: {description}")]
    Rejected { error: String, description: String },

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Failed to create device flow: {0}")]
    DeviceFlowInit(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Sign-in required: go to {verification_uri} and enter code {user_code}")]
    InteractionRequired {
        verification_uri: String,
        user_code: String,
    },
}

fn device_code_expired() -> AuthError {
    warn!("Device code expired before sign-in completed");
    AuthError::Authentication("The device code expired before sign-in was completed.".to_string())
}

impl AuthError {
    fn interaction_required(flow: &DeviceFlow) -> Self {
        AuthError::InteractionRequired {
            verification_uri: flow.verification_uri.clone(),
            user_code: flow.user_code.clone(),
        }
    }
}

// ============================================================================
// PORTS
// ============================================================================

/// The remote identity provider: token endpoint and device-authorization endpoint.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchanges a refresh token for a new access token.
    async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant, ProviderError>;

    /// Requests a new device-code grant.
    async fn start_device_flow(&self, scopes: &[String])
        -> Result<DeviceCodeResponse, ProviderError>;

    /// Polls the token endpoint once with a device code.
    async fn poll_device_flow(&self, device_code: &str) -> Result<PollOutcome, ProviderError>;
}

/// Anything that can hand out a bearer token without waiting on the user.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;
}

#[async_trait]
impl<T: TokenSource + ?Sized> TokenSource for Arc<T> {
    async fn access_token(&self) -> Result<String, AuthError> {
        (**self).access_token().await
    }
}

// ============================================================================
// SERVICE
// ============================================================================

pub struct AuthService<P: IdentityProvider, S: CredentialStore> {
    provider: P,
    scopes: Vec<String>,
    session: Mutex<CacheSession<S>>,
    /// Device flow started by a non-blocking call, waiting for the user.
    pending: Mutex<Option<DeviceFlow>>,
}

impl<P: IdentityProvider, S: CredentialStore> AuthService<P, S> {
    pub fn new(provider: P, session: CacheSession<S>, scopes: Vec<String>) -> Self {
        Self {
            provider,
            scopes,
            session: Mutex::new(session),
            pending: Mutex::new(None),
        }
    }

    /// Returns an access token, signing the user in interactively if needed.
    ///
    /// `on_device_flow` receives the verification URL and user code before polling
    /// starts. This can block until the device code expires, so only call it where
    /// that is acceptable (e.g. a one-shot CLI login).
    pub async fn get_access_token<F>(&self, on_device_flow: F) -> Result<String, AuthError>
    where
        F: FnOnce(&DeviceFlow) + Send,
    {
        if let Some(token) = self.cached_token().await {
            return Ok(token.token);
        }
        if let Some(token) = self.renew_silently().await {
            return Ok(token.token);
        }

        let flow = match self.take_pending().await {
            Some(flow) => {
                debug!("Resuming device flow started by an earlier status check");
                flow
            }
            None => self.initiate_device_flow().await?,
        };

        on_device_flow(&flow);
        let token = self.complete_device_flow(&flow).await?;
        Ok(token.token)
    }

    /// Non-blocking token lookup for request paths. Fails with
    /// `InteractionRequired` instead of waiting for the user.
    pub async fn silent_token(&self) -> Result<String, AuthError> {
        self.resolve_without_waiting().await.map(|token| token.token)
    }

    /// Reports whether the user is authorized, starting a device flow if not.
    /// Never waits on the user; at most a few bounded provider round-trips.
    pub async fn check_status(&self) -> AuthStatusReport {
        match self.resolve_without_waiting().await {
            Ok(token) => AuthStatusReport::ok(format!("Authorized ({})", token.account_id)),
            Err(AuthError::InteractionRequired {
                verification_uri,
                user_code,
            }) => AuthStatusReport::needs_auth(verification_uri, user_code),
            Err(e) => {
                warn!("Authorization status check failed: {}", e);
                AuthStatusReport::error(e.to_string())
            }
        }
    }

    /// Requests a new device-code grant from the provider.
    pub async fn initiate_device_flow(&self) -> Result<DeviceFlow, AuthError> {
        let response = self
            .provider
            .start_device_flow(&self.scopes)
            .await
            .map_err(|e| match e {
                ProviderError::Network(msg) => AuthError::Network(msg),
                ProviderError::Rejected { description, .. } => AuthError::DeviceFlowInit(description),
            })?;

        let flow =
            DeviceFlow::from_response(response, Utc::now()).map_err(AuthError::DeviceFlowInit)?;

        info!(
            verification_uri = %flow.verification_uri,
            expires_at = %flow.expires_at,
            interval_secs = flow.interval_secs,
            "Device flow started"
        );
        Ok(flow)
    }

    /// Polls until the grant completes. Returns on approval, expiry, or failure.
    /// Never polls after the device code's deadline.
    pub async fn complete_device_flow(&self, flow: &DeviceFlow) -> Result<AccessToken, AuthError> {
        let mut interval = flow.interval_secs;
        let remaining = (flow.expires_at - Utc::now()).to_std().unwrap_or_default();
        let deadline = Instant::now() + remaining.min(MAX_FLOW_WAIT);

        loop {
            if Instant::now() >= deadline {
                return Err(device_code_expired());
            }

            let next_poll = Instant::now()
                .checked_add(Duration::from_secs(interval))
                .map_or(deadline, |at| at.min(deadline));
            sleep_until(next_poll).await;
            if Instant::now() >= deadline {
                return Err(device_code_expired());
            }

            match self.poll(flow).await? {
                PollOutcome::Pending => debug!("Authorization pending"),
                PollOutcome::SlowDown => {
                    interval = interval.saturating_add(SLOW_DOWN_STEP_SECS);
                    debug!(interval_secs = interval, "Provider asked to slow down");
                }
                PollOutcome::Granted(grant) => {
                    info!("Device flow authorized");
                    return Ok(self.store_grant(grant, None).await);
                }
                PollOutcome::Failed { error, description } => {
                    warn!(error = %error, "Device flow ended without authorization");
                    return Err(AuthError::Authentication(description));
                }
            }
        }
    }

    /// Drops any in-progress device flow. Returns whether one existed.
    pub async fn cancel_pending(&self) -> bool {
        self.pending.lock().await.take().is_some()
    }

    pub async fn accounts(&self) -> Vec<CachedAccount> {
        self.session.lock().await.cache().accounts().cloned().collect()
    }

    pub async fn sign_out(&self, home_account_id: &str) -> bool {
        let mut session = self.session.lock().await;
        let Some(username) = session
            .cache()
            .account(home_account_id)
            .map(|a| a.username.clone().unwrap_or_default())
        else {
            debug!(account = %home_account_id, "No such account to sign out");
            return false;
        };
        session.cache_mut().remove_account(home_account_id);
        info!(account = %home_account_id, username = %username, "Signed out");
        true
    }

    /// Writes the credential cache if it changed.
    pub async fn flush(&self) -> Result<bool, AuthError> {
        Ok(self.session.lock().await.save_if_changed()?)
    }

    /// Releases the service, flushing the credential cache.
    pub fn close(self) -> Result<bool, AuthError> {
        Ok(self.session.into_inner().close()?)
    }

    // ------------------------------------------------------------------------
    // internals
    // ------------------------------------------------------------------------

    async fn resolve_without_waiting(&self) -> Result<AccessToken, AuthError> {
        if let Some(token) = self.cached_token().await {
            return Ok(token);
        }
        if let Some(token) = self.poll_pending_once().await? {
            return Ok(token);
        }
        if let Some(token) = self.renew_silently().await {
            return Ok(token);
        }

        let flow = self.initiate_device_flow().await?;
        let err = AuthError::interaction_required(&flow);
        *self.pending.lock().await = Some(flow);
        Err(err)
    }

    async fn cached_token(&self) -> Option<AccessToken> {
        let session = self.session.lock().await;
        let account = session.cache().first_account()?;
        let token = account.current_access_token(Utc::now())?;
        debug!(account = %account.home_account_id, "Using cached access token");
        Some(token)
    }

    async fn renew_silently(&self) -> Option<AccessToken> {
        let account = {
            let session = self.session.lock().await;
            if session.cache().is_empty() {
                debug!("No cached accounts; skipping silent renewal");
                return None;
            }
            session.cache().first_account().cloned()?
        };
        let Some(refresh_token) = account.refresh_token.as_deref() else {
            debug!(account = %account.home_account_id, "No refresh token cached");
            return None;
        };

        match self.provider.refresh(refresh_token, &self.scopes).await {
            Ok(grant) => {
                info!(account = %account.home_account_id, "Access token renewed silently");
                Some(self.store_grant(grant, Some(&account)).await)
            }
            Err(e) => {
                warn!(account = %account.home_account_id, "Silent token renewal failed: {}", e);
                None
            }
        }
    }

    /// Polls the remembered device flow exactly once.
    async fn poll_pending_once(&self) -> Result<Option<AccessToken>, AuthError> {
        let Some(flow) = self.pending.lock().await.clone() else {
            return Ok(None);
        };
        if flow.is_expired(Utc::now()) {
            debug!("Discarding expired device flow");
            self.cancel_pending().await;
            return Ok(None);
        }

        match self.poll(&flow).await {
            Ok(PollOutcome::Granted(grant)) => {
                info!("Device flow authorized");
                self.cancel_pending().await;
                Ok(Some(self.store_grant(grant, None).await))
            }
            Ok(PollOutcome::Pending) | Ok(PollOutcome::SlowDown) => {
                Err(AuthError::interaction_required(&flow))
            }
            Ok(PollOutcome::Failed { error, description }) => {
                warn!(error = %error, "Pending device flow failed: {}", description);
                self.cancel_pending().await;
                Ok(None)
            }
            Err(AuthError::Authentication(description)) => {
                warn!("Pending device flow rejected: {}", description);
                self.cancel_pending().await;
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn take_pending(&self) -> Option<DeviceFlow> {
        let flow = self.pending.lock().await.take()?;
        if flow.is_expired(Utc::now()) {
            return None;
        }
        Some(flow)
    }

    async fn poll(&self, flow: &DeviceFlow) -> Result<PollOutcome, AuthError> {
        self.provider
            .poll_device_flow(&flow.device_code)
            .await
            .map_err(|e| match e {
                ProviderError::Network(msg) => AuthError::Network(msg),
                ProviderError::Rejected { description, .. } => AuthError::Authentication(description),
            })
    }

    /// Writes a grant into the cache (marking it dirty) and returns the new token.
    async fn store_grant(&self, grant: TokenGrant, previous: Option<&CachedAccount>) -> AccessToken {
        let now = Utc::now();
        let expires_at = ChronoDuration::try_seconds(grant.expires_in)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .unwrap_or_else(|| {
                // Unusable lifetime: hand the token out once, renew on the next call.
                warn!(expires_in = grant.expires_in, "Token lifetime out of range");
                now
            });

        let (home_account_id, username) = match grant.account {
            Some(identity) => (identity.home_account_id, identity.username),
            None => previous
                .map(|a| (a.home_account_id.clone(), a.username.clone()))
                .unwrap_or_else(|| (DEFAULT_ACCOUNT_ID.to_string(), None)),
        };
        let username = username.or_else(|| previous.and_then(|a| a.username.clone()));
        // Providers do not always rotate refresh tokens; keep the old one if so.
        let refresh_token = grant
            .refresh_token
            .or_else(|| previous.and_then(|a| a.refresh_token.clone()));
        let scopes = if grant.scopes.is_empty() {
            self.scopes.clone()
        } else {
            grant.scopes
        };

        let account = CachedAccount {
            home_account_id: home_account_id.clone(),
            username,
            refresh_token,
            access_token: Some(grant.access_token.clone()),
            access_token_expires_at: Some(expires_at),
            scopes,
        };
        self.session.lock().await.cache_mut().upsert_account(account);

        AccessToken {
            token: grant.access_token,
            expires_at,
            account_id: home_account_id,
        }
    }
}

#[async_trait]
impl<P: IdentityProvider, S: CredentialStore> TokenSource for AuthService<P, S> {
    async fn access_token(&self) -> Result<String, AuthError> {
        self.silent_token().await
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::auth_models::{AccountIdentity, AuthStatus};
    use crate::core::auth::credential_cache::tests::{sample_account, MemoryStore};
    use crate::core::auth::credential_cache::CredentialCache;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct MockState {
        refresh_token: Option<String>,
        refresh_expires_in: Option<i64>,
        device_response: StdMutex<Option<DeviceCodeResponse>>,
        device_network_error: bool,
        poll_script: StdMutex<VecDeque<PollOutcome>>,
        refresh_calls: AtomicUsize,
        start_calls: AtomicUsize,
        poll_calls: AtomicUsize,
    }

    #[derive(Clone)]
    struct MockProvider {
        state: Arc<MockState>,
    }

    impl MockProvider {
        fn new(state: MockState) -> Self {
            Self {
                state: Arc::new(state),
            }
        }

        fn script(&self, outcomes: Vec<PollOutcome>) {
            self.state.poll_script.lock().unwrap().extend(outcomes);
        }
    }

    #[async_trait]
    impl IdentityProvider for MockProvider {
        async fn refresh(
            &self,
            _refresh_token: &str,
            _scopes: &[String],
        ) -> Result<TokenGrant, ProviderError> {
            self.state.refresh_calls.fetch_add(1, Ordering::SeqCst);
            match &self.state.refresh_token {
                Some(token) => {
                    let mut renewed = grant(token);
                    if let Some(expires_in) = self.state.refresh_expires_in {
                        renewed.expires_in = expires_in;
                    }
                    Ok(renewed)
                }
                None => Err(ProviderError::Rejected {
                    error: "invalid_grant".to_string(),
                    description: "Refresh token revoked".to_string(),
                }),
            }
        }

        async fn start_device_flow(
            &self,
            _scopes: &[String],
        ) -> Result<DeviceCodeResponse, ProviderError> {
            self.state.start_calls.fetch_add(1, Ordering::SeqCst);
            if self.state.device_network_error {
                return Err(ProviderError::Network("connection reset".to_string()));
            }
            Ok(self
                .state
                .device_response
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(device_response))
        }

        async fn poll_device_flow(&self, _device_code: &str) -> Result<PollOutcome, ProviderError> {
            self.state.poll_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .state
                .poll_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PollOutcome::Pending))
        }
    }

    fn grant(token: &str) -> TokenGrant {
        TokenGrant {
            access_token: token.to_string(),
            refresh_token: Some(format!("{}-refresh", token)),
            expires_in: 3600,
            scopes: vec![],
            account: Some(AccountIdentity {
                home_account_id: "uid.tid".to_string(),
                username: Some("me@example.com".to_string()),
            }),
        }
    }

    fn device_response() -> DeviceCodeResponse {
        DeviceCodeResponse {
            device_code: Some("device-code".to_string()),
            user_code: Some("ABC123".to_string()),
            verification_uri: Some("https://example/activate".to_string()),
            interval: Some(0),
            expires_in: Some(900),
            ..Default::default()
        }
    }

    fn service_with(
        provider: MockProvider,
        store: MemoryStore,
    ) -> AuthService<MockProvider, MemoryStore> {
        let session = CacheSession::open(store).unwrap();
        AuthService::new(provider, session, vec!["Files.Read.All".to_string()])
    }

    async fn dirty(service: &AuthService<MockProvider, MemoryStore>) -> bool {
        service.session.lock().await.cache().has_state_changed()
    }

    fn store_with_account(account: CachedAccount) -> MemoryStore {
        let mut cache = CredentialCache::default();
        cache.upsert_account(account);
        MemoryStore::with_bytes(&cache.to_bytes().unwrap())
    }

    #[tokio::test]
    async fn test_empty_cache_goes_straight_to_device_flow() {
        let provider = MockProvider::new(MockState::default());
        provider.script(vec![PollOutcome::Pending, PollOutcome::Granted(grant("fresh"))]);
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let mut shown = None;
        let token = service
            .get_access_token(|flow| {
                shown = Some((flow.user_code.clone(), flow.verification_uri.clone()));
            })
            .await
            .unwrap();

        assert_eq!(token, "fresh");
        assert_eq!(
            shown,
            Some(("ABC123".to_string(), "https://example/activate".to_string()))
        );
        assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.start_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 2);
        assert!(dirty(&service).await);
    }

    #[tokio::test]
    async fn test_expired_account_is_renewed_silently_and_saved() {
        let mut account = sample_account("uid.tid");
        account.access_token_expires_at = Some(Utc::now() - ChronoDuration::hours(1));
        let store = store_with_account(account);

        let provider = MockProvider::new(MockState {
            refresh_token: Some("renewed".to_string()),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, store.clone());

        let token = service
            .get_access_token(|_| panic!("silent renewal should not need a device flow"))
            .await
            .unwrap();

        assert_eq!(token, "renewed");
        assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.start_calls.load(Ordering::SeqCst), 0);
        assert!(dirty(&service).await);

        assert!(service.flush().await.unwrap());
        assert_eq!(store.write_count(), 1);

        let saved = CredentialCache::from_bytes(&store.contents().unwrap()).unwrap();
        let saved_account = saved.account("uid.tid").unwrap();
        assert_eq!(saved_account.access_token.as_deref(), Some("renewed"));
        assert!(saved_account.access_token_expires_at.unwrap() > Utc::now());
        assert_eq!(saved_account.refresh_token.as_deref(), Some("renewed-refresh"));
    }

    #[tokio::test]
    async fn test_unrepresentable_token_lifetime_is_used_once_then_renewed() {
        for expires_in in [i64::MAX, i64::MIN] {
            let mut account = sample_account("uid.tid");
            account.access_token_expires_at = Some(Utc::now() - ChronoDuration::hours(1));
            let provider = MockProvider::new(MockState {
                refresh_token: Some("renewed".to_string()),
                refresh_expires_in: Some(expires_in),
                ..Default::default()
            });
            let state = provider.state.clone();
            let store = store_with_account(account);
            let service = service_with(provider, store.clone());

            let token = service.get_access_token(|_| {}).await.unwrap();
            assert_eq!(token, "renewed");

            assert!(service.flush().await.unwrap());
            let saved = CredentialCache::from_bytes(&store.contents().unwrap()).unwrap();
            let expires_at = saved
                .account("uid.tid")
                .and_then(|a| a.access_token_expires_at)
                .unwrap();
            assert!(expires_at <= Utc::now());

            // The stored token is already stale, so the next call renews again.
            assert_eq!(service.silent_token().await.unwrap(), "renewed");
            assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 2);
        }
    }

    #[tokio::test]
    async fn test_valid_cached_token_needs_no_network() {
        let store = store_with_account(sample_account("uid.tid"));
        let provider = MockProvider::new(MockState::default());
        let state = provider.state.clone();
        let service = service_with(provider, store);

        let token = service.get_access_token(|_| {}).await.unwrap();

        assert_eq!(token, "access-uid.tid");
        assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.start_calls.load(Ordering::SeqCst), 0);
        assert!(!dirty(&service).await);
    }

    #[tokio::test]
    async fn test_missing_user_code_fails_before_polling() {
        let provider = MockProvider::new(MockState {
            device_response: StdMutex::new(Some(DeviceCodeResponse {
                device_code: Some("device-code".to_string()),
                verification_uri: Some("https://example/activate".to_string()),
                ..Default::default()
            })),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let mut observed = false;
        let result = service.get_access_token(|_| observed = true).await;

        assert!(matches!(result, Err(AuthError::DeviceFlowInit(_))));
        assert!(!observed);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unrepresentable_device_code_lifetime_fails_before_polling() {
        let provider = MockProvider::new(MockState {
            device_response: StdMutex::new(Some(DeviceCodeResponse {
                expires_in: Some(u64::MAX),
                ..device_response()
            })),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let result = service.get_access_token(|_| {}).await;

        assert!(matches!(result, Err(AuthError::DeviceFlowInit(_))));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.check_status().await.status, AuthStatus::Error);
    }

    #[tokio::test]
    async fn test_denied_flow_reports_provider_description() {
        let provider = MockProvider::new(MockState::default());
        provider.script(vec![PollOutcome::Failed {
            error: "access_denied".to_string(),
            description: "The user declined the request".to_string(),
        }]);
        let service = service_with(provider, MemoryStore::default());

        let err = service.get_access_token(|_| {}).await.unwrap_err();

        match err {
            AuthError::Authentication(description) => {
                assert_eq!(description, "The user declined the request")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(!dirty(&service).await);
    }

    #[tokio::test]
    async fn test_expired_device_code_stops_without_polling() {
        let provider = MockProvider::new(MockState {
            device_response: StdMutex::new(Some(DeviceCodeResponse {
                expires_in: Some(0),
                ..device_response()
            })),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let result = service.get_access_token(|_| {}).await;

        assert!(matches!(result, Err(AuthError::Authentication(_))));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_down_keeps_polling() {
        let provider = MockProvider::new(MockState::default());
        provider.script(vec![
            PollOutcome::SlowDown,
            PollOutcome::Pending,
            PollOutcome::Granted(grant("late")),
        ]);
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let token = service.get_access_token(|_| {}).await.unwrap();

        assert_eq!(token, "late");
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_at_device_code_deadline() {
        let provider = MockProvider::new(MockState {
            device_response: StdMutex::new(Some(DeviceCodeResponse {
                interval: Some(4),
                expires_in: Some(10),
                ..device_response()
            })),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let started = Instant::now();
        let result = service.get_access_token(|_| {}).await;

        // Polls at 4s and 8s; the third wait is cut short by the 10s deadline.
        assert!(matches!(result, Err(AuthError::Authentication(_))));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 2);
        assert!(started.elapsed() <= Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_longer_than_lifetime_never_polls() {
        let provider = MockProvider::new(MockState {
            device_response: StdMutex::new(Some(DeviceCodeResponse {
                interval: Some(30),
                expires_in: Some(10),
                ..device_response()
            })),
            ..Default::default()
        });
        let state = provider.state.clone();
        let service = service_with(provider, MemoryStore::default());

        let started = Instant::now();
        let result = service.get_access_token(|_| {}).await;

        assert!(matches!(result, Err(AuthError::Authentication(_))));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);
        assert!(started.elapsed() < Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_check_status_never_polls_to_completion() {
        let provider = MockProvider::new(MockState::default());
        let state = provider.state.clone();
        let service = service_with(provider.clone(), MemoryStore::default());

        // First call only starts the flow.
        let report = service.check_status().await;
        assert_eq!(report.status, AuthStatus::NeedsAuth);
        assert_eq!(report.user_code.as_deref(), Some("ABC123"));
        assert_eq!(
            report.verification_uri.as_deref(),
            Some("https://example/activate")
        );
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 0);

        // User has not approved yet: one poll, same code, no new flow.
        let report = service.check_status().await;
        assert_eq!(report.status, AuthStatus::NeedsAuth);
        assert_eq!(report.user_code.as_deref(), Some("ABC123"));
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 1);
        assert_eq!(state.start_calls.load(Ordering::SeqCst), 1);

        // User approved in the meantime.
        provider.script(vec![PollOutcome::Granted(grant("approved"))]);
        let report = service.check_status().await;
        assert_eq!(report.status, AuthStatus::Ok);
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 2);

        // Token is now cached; no more network.
        assert_eq!(service.silent_token().await.unwrap(), "approved");
        assert_eq!(state.poll_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_check_status_reports_network_errors() {
        let provider = MockProvider::new(MockState {
            device_network_error: true,
            ..Default::default()
        });
        let service = service_with(provider, MemoryStore::default());

        let report = service.check_status().await;

        assert_eq!(report.status, AuthStatus::Error);
        assert!(report.message.contains("connection reset"));
    }

    #[tokio::test]
    async fn test_silent_token_requires_interaction_when_refresh_fails() {
        let mut account = sample_account("uid.tid");
        account.access_token = None;
        let provider = MockProvider::new(MockState::default());
        let state = provider.state.clone();
        let service = service_with(provider, store_with_account(account));

        let err = service.silent_token().await.unwrap_err();

        assert!(matches!(err, AuthError::InteractionRequired { .. }));
        assert_eq!(state.refresh_calls.load(Ordering::SeqCst), 1);
        assert!(service.cancel_pending().await);
        assert!(!service.cancel_pending().await);
    }

    #[tokio::test]
    async fn test_login_resumes_flow_started_by_status_check() {
        let provider = MockProvider::new(MockState::default());
        let state = provider.state.clone();
        let service = service_with(provider.clone(), MemoryStore::default());

        let report = service.check_status().await;
        assert_eq!(report.status, AuthStatus::NeedsAuth);

        provider.script(vec![PollOutcome::Granted(grant("resumed"))]);
        let token = service.get_access_token(|_| {}).await.unwrap();

        assert_eq!(token, "resumed");
        assert_eq!(state.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sign_out_marks_cache_dirty() {
        let store = store_with_account(sample_account("uid.tid"));
        let service = service_with(MockProvider::new(MockState::default()), store.clone());

        assert!(service.sign_out("uid.tid").await);
        assert!(!service.sign_out("uid.tid").await);
        assert!(service.accounts().await.is_empty());

        assert!(service.close().unwrap());
        assert_eq!(store.write_count(), 1);
    }
}
