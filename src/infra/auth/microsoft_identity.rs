use crate::core::auth::{
    AccountIdentity, DeviceCodeResponse, IdentityProvider, PollOutcome, ProviderError, TokenGrant,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";

/// Longest slice of an unparseable response body kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Microsoft identity platform (v2.0 endpoints) for a public client.
pub struct MicrosoftIdentityProvider {
    client: Client,
    client_id: String,
    authority: String,
}

impl MicrosoftIdentityProvider {
    pub fn new(
        client_id: String,
        authority: String,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            client_id,
            authority: authority.trim_end_matches('/').to_string(),
        })
    }

    fn token_url(&self) -> String {
        format!("{}/oauth2/v2.0/token", self.authority)
    }

    fn device_code_url(&self) -> String {
        format!("{}/oauth2/v2.0/devicecode", self.authority)
    }

    /// Posts a form and returns the response body. The endpoints answer errors
    /// (including "authorization_pending") with 4xx and a JSON body, so the status
    /// code alone is not inspected here.
    async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(url)
            .form(form)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        debug!(status = status.as_u16(), url = %url, "Identity provider responded");
        Ok(body)
    }
}

#[async_trait]
impl IdentityProvider for MicrosoftIdentityProvider {
    async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[String],
    ) -> Result<TokenGrant, ProviderError> {
        let scope = scopes.join(" ");
        let body = self
            .post_form(
                &self.token_url(),
                &[
                    ("grant_type", "refresh_token"),
                    ("client_id", &self.client_id),
                    ("refresh_token", refresh_token),
                    ("scope", &scope),
                ],
            )
            .await?;

        match classify(parse_json(&body)?) {
            PollOutcome::Granted(grant) => Ok(grant),
            PollOutcome::Failed { error, description } => {
                Err(ProviderError::Rejected { error, description })
            }
            PollOutcome::Pending | PollOutcome::SlowDown => Err(ProviderError::Rejected {
                error: "invalid_response".to_string(),
                description: "Unexpected pending state on refresh".to_string(),
            }),
        }
    }

    async fn start_device_flow(
        &self,
        scopes: &[String],
    ) -> Result<DeviceCodeResponse, ProviderError> {
        let scope = scopes.join(" ");
        let body = self
            .post_form(
                &self.device_code_url(),
                &[("client_id", &self.client_id), ("scope", &scope)],
            )
            .await?;

        parse_json(&body)
    }

    async fn poll_device_flow(&self, device_code: &str) -> Result<PollOutcome, ProviderError> {
        let body = self
            .post_form(
                &self.token_url(),
                &[
                    ("grant_type", DEVICE_CODE_GRANT),
                    ("client_id", &self.client_id),
                    ("device_code", device_code),
                ],
            )
            .await?;

        Ok(classify(parse_json(&body)?))
    }
}

// ============================================================================
// RESPONSE PARSING
// ============================================================================

/// Token endpoint response: either the token fields or the error fields are set.
#[derive(Debug, Default, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    oid: Option<String>,
    #[serde(default)]
    tid: Option<String>,
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
}

fn parse_json<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|_| ProviderError::Rejected {
        error: "invalid_response".to_string(),
        description: format!(
            "Unexpected response from identity provider: {}",
            body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>()
        ),
    })
}

fn classify(response: TokenResponse) -> PollOutcome {
    if let Some(error) = response.error {
        return match error.as_str() {
            "authorization_pending" => PollOutcome::Pending,
            "slow_down" => PollOutcome::SlowDown,
            _ => PollOutcome::Failed {
                description: response.error_description.unwrap_or_else(|| error.clone()),
                error,
            },
        };
    }

    let Some(access_token) = response.access_token else {
        return PollOutcome::Failed {
            error: "invalid_response".to_string(),
            description: "Token response did not contain an access token".to_string(),
        };
    };

    PollOutcome::Granted(TokenGrant {
        access_token,
        refresh_token: response.refresh_token,
        expires_in: response.expires_in.unwrap_or(3600),
        scopes: response
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default(),
        account: response.id_token.as_deref().and_then(account_from_id_token),
    })
}

/// Reads the account identity from an ID token's claims. The signature is not
/// checked; the token came straight from the token endpoint over TLS.
fn account_from_id_token(id_token: &str) -> Option<AccountIdentity> {
    let payload = id_token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes).ok()?;

    let home_account_id = match (claims.oid, claims.tid) {
        (Some(oid), Some(tid)) => format!("{}.{}", oid, tid),
        (Some(oid), None) => oid,
        (None, _) => claims.sub?,
    };

    Some(AccountIdentity {
        home_account_id,
        username: claims.preferred_username,
    })
}
