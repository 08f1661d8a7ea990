use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access tokens this close to expiry are treated as already expired.
const EXPIRY_BUFFER_MINUTES: i64 = 5;

/// Poll interval used when the provider does not send one (RFC 8628 default).
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Device codes without an explicit lifetime are assumed to last 15 minutes.
const DEFAULT_DEVICE_CODE_LIFETIME_SECS: u64 = 900;

/// One signed-in account as stored in the credential cache.
///
/// The refresh token is the durable part. The access token rides along so that a
/// restart within its lifetime does not need a network round-trip, but it is always
/// re-derivable from the refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedAccount {
    pub home_account_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub access_token_expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl CachedAccount {
    /// Returns the cached access token if it is still usable at `now`.
    pub fn current_access_token(&self, now: DateTime<Utc>) -> Option<AccessToken> {
        let token = self.access_token.as_ref()?;
        let expires_at = self.access_token_expires_at?;
        if expires_at - Duration::minutes(EXPIRY_BUFFER_MINUTES) <= now {
            return None;
        }
        Some(AccessToken {
            token: token.clone(),
            expires_at,
            account_id: self.home_account_id.clone(),
        })
    }

    pub fn display_name(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.home_account_id)
    }
}

/// A bearer credential handed to callers. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub account_id: String,
}

/// Who a token grant belongs to, when the provider tells us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub home_account_id: String,
    pub username: Option<String>,
}

/// A successful response from the provider's token endpoint.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    pub scopes: Vec<String>,
    pub account: Option<AccountIdentity>,
}

/// Raw device-authorization response. Every field is optional here so that a
/// malformed response can be reported as a flow-start failure instead of a parse error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceCodeResponse {
    #[serde(default)]
    pub device_code: Option<String>,
    #[serde(default)]
    pub user_code: Option<String>,
    #[serde(default)]
    pub verification_uri: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// An in-progress interactive grant. Lives in memory only.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceFlow {
    #[serde(skip_serializing)]
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub message: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub interval_secs: u64,
}

impl DeviceFlow {
    /// Builds a flow from the provider response, or returns the reason it is unusable.
    pub fn from_response(response: DeviceCodeResponse, now: DateTime<Utc>) -> Result<Self, String> {
        let reason = || {
            response
                .error_description
                .clone()
                .or_else(|| response.error.clone())
                .unwrap_or_else(|| "Failed to create device flow. Check app registration.".to_string())
        };

        let (Some(user_code), Some(device_code), Some(verification_uri)) = (
            response.user_code.clone(),
            response.device_code.clone(),
            response.verification_uri.clone(),
        ) else {
            return Err(reason());
        };

        let lifetime = response
            .expires_in
            .unwrap_or(DEFAULT_DEVICE_CODE_LIFETIME_SECS);
        let Some(expires_at) = i64::try_from(lifetime)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|ttl| now.checked_add_signed(ttl))
        else {
            return Err(format!("Device code lifetime out of range: {}s", lifetime));
        };

        Ok(Self {
            device_code,
            user_code,
            verification_uri,
            message: response.message,
            expires_at,
            interval_secs: response.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Result of a single poll of the token endpoint with a device code.
#[derive(Debug, Clone)]
pub enum PollOutcome {
    Pending,
    SlowDown,
    Granted(TokenGrant),
    Failed { error: String, description: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStatus {
    Ok,
    NeedsAuth,
    Error,
}

/// Caller-facing answer to "is the user authorized".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatusReport {
    pub status: AuthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_code: Option<String>,
}

impl AuthStatusReport {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Ok,
            message: message.into(),
            verification_uri: None,
            user_code: None,
        }
    }

    pub fn needs_auth(verification_uri: String, user_code: String) -> Self {
        Self {
            status: AuthStatus::NeedsAuth,
            message: format!(
                "Go to {} and enter code: {}. Retry once you have signed in.",
                verification_uri, user_code
            ),
            verification_uri: Some(verification_uri),
            user_code: Some(user_code),
        }
    }

    /// Not authorized, with no device code to hand out.
    pub fn sign_in_required(message: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::NeedsAuth,
            message: message.into(),
            verification_uri: None,
            user_code: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AuthStatus::Error,
            message: message.into(),
            verification_uri: None,
            user_code: None,
        }
    }
}
