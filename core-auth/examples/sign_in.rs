//! Interactive sign-in against a real Cognito domain.
//!
//! ```text
//! COGNITO_DOMAIN=auth.example.com \
//! COGNITO_CLIENT_ID=... \
//! COGNITO_REDIRECT_URI=http://localhost:3000/callback \
//! cargo run -p core-auth --example sign_in
//! ```
//!
//! Open the printed URL, sign in, then paste the URL the browser was
//! redirected to.

use anyhow::Context;
use bridge_desktop::{FileSecureStore, ReqwestHttpClient};
use core_auth::{AuthManager, CallbackOutcome, OAuthConfig};
use core_runtime::config::CoreConfig;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use std::io::BufRead;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_filter("core_auth=debug,info"),
    )?;

    let config = CoreConfig::builder()
        .http_client(Arc::new(ReqwestHttpClient::new()))
        .secure_store(Arc::new(FileSecureStore::new()))
        .build()?;
    let manager = AuthManager::new(&config, OAuthConfig::from_env()?)?;

    let mut events = manager.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            println!("[event] {}", event.description());
        }
    });

    if let Some(token) = manager.accessor().get_access_token().await? {
        println!("Already signed in ({} byte access token)", token.len());
        return Ok(());
    }

    println!("Open this URL to sign in:\n\n  {}\n", manager.begin_sign_in().await?);
    println!("Paste the redirect URL:");

    let redirect = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line).map(|_| line)
    })
    .await?
    .context("failed to read redirect URL")?;

    match manager.handle_redirect(redirect.trim()).await? {
        CallbackOutcome::SignedIn(session) => {
            println!("Signed in; access token expires at {}", session.expires_at)
        }
        CallbackOutcome::AlreadyHandled => println!("Redirect already handled"),
    }

    Ok(())
}
