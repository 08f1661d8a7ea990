use super::{AppAuth, AuthSession};
use crate::core::auth::auth_models::AuthStatus;
use crate::core::auth::{AuthService, AuthStatusReport, CredentialStore, IdentityProvider};
use anyhow::{bail, Result};
use chrono::Utc;

pub async fn login(session: &AuthSession) -> Result<()> {
    session.sign_in().await?;

    match session.auth().accounts().await.first() {
        Some(account) => println!("Signed in as {}", account.display_name()),
        None => println!("Signed in."),
    }
    Ok(())
}

pub async fn status(auth: &AppAuth) -> Result<()> {
    let report = status_report(auth).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Authorization status for a single CLI run. A device code started here would
/// be forgotten when the process exits, so it is dropped and the user is sent
/// to `login`, which waits for the sign-in to finish.
pub(crate) async fn status_report<P, S>(auth: &AuthService<P, S>) -> AuthStatusReport
where
    P: IdentityProvider,
    S: CredentialStore,
{
    let report = auth.check_status().await;
    if report.status != AuthStatus::NeedsAuth {
        return report;
    }

    auth.cancel_pending().await;
    AuthStatusReport::sign_in_required("Not signed in. Run `notes-assistant login` to sign in.")
}

pub async fn accounts(auth: &AppAuth) -> Result<()> {
    let accounts = auth.accounts().await;
    if accounts.is_empty() {
        println!("No cached accounts. Run `notes-assistant login` to sign in.");
        return Ok(());
    }

    let now = Utc::now();
    for account in accounts {
        let token = match account.current_access_token(now) {
            Some(token) => format!(
                "token valid until {}",
                token.expires_at.format("%Y-%m-%d %H:%M UTC")
            ),
            None if account.refresh_token.is_some() => "token expired, can renew".to_string(),
            None => "sign-in required".to_string(),
        };
        println!(
            "{}  {}  [{}]",
            account.home_account_id,
            account.display_name(),
            token
        );
    }
    Ok(())
}

pub async fn logout(auth: &AppAuth, account: &str) -> Result<()> {
    if !auth.sign_out(account).await {
        bail!("No cached account with id {}", account);
    }
    println!("Signed out {}", account);
    Ok(())
}
