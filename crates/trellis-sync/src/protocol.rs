//! Push and pull of account tokens.
//!
//! Each server call runs under a per-attempt timeout. Transport failures
//! and timeouts are retried up to `SyncConfig::retries` times with a fixed
//! backoff; refusals and missing tokens are not.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, info, warn};

use trellis_core::{verify, SignedClaim};
use trellis_store::{EntityRef, Store};

use crate::error::{Result, SyncError};
use crate::server::{PullOutcome, PushOutcome, TokenServer};

/// Configuration for push/pull behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Timeout for a single server call.
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retries: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Run `op` with the configured timeout and retry policy.
pub async fn with_retry<F, Fut, T>(config: &SyncConfig, what: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = config.retries + 1;
    let mut attempt = 1;
    loop {
        let error = match tokio::time::timeout(config.timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(e)) => e,
            Err(_) => SyncError::Timeout(format!("{what} after {:?}", config.timeout)),
        };

        if !error.is_retryable() || attempt >= attempts {
            return Err(error);
        }
        warn!(attempt, attempts, error = %error, "{what} failed, retrying");
        tokio::time::sleep(config.backoff).await;
        attempt += 1;
    }
}

/// Push the stored token of an account to the server.
///
/// A `Conflict` outcome is returned, not raised; the local record is left
/// unchanged either way.
pub async fn push_account<S, T>(
    store: &S,
    server: &T,
    account: &EntityRef,
    config: &SyncConfig,
) -> Result<PushOutcome>
where
    S: Store + ?Sized,
    T: TokenServer + ?Sized,
{
    let signed = store.get(account).await?;
    let token = signed.token();

    let outcome = with_retry(config, "push", || server.push(token)).await?;
    match &outcome {
        PushOutcome::Ack => info!(%account, jti = %signed.jti(), "pushed account"),
        PushOutcome::Conflict { reason } => warn!(%account, %reason, "server refused account"),
    }
    Ok(outcome)
}

/// Pull an account token from the server and store it.
///
/// The account must already exist locally (its public key is looked up
/// from the stored record). The pulled token must be signed by the
/// account's operator and describe the same account, and it must not be
/// older than the local record; otherwise nothing is written.
pub async fn pull_account<S, T>(
    store: &S,
    server: &T,
    account: &EntityRef,
    config: &SyncConfig,
) -> Result<SignedClaim>
where
    S: Store + ?Sized,
    T: TokenServer + ?Sized,
{
    let operator = account
        .parent()
        .ok_or_else(|| SyncError::UnexpectedToken(format!("{account} is not an account")))?;
    let operator_key = store.get(&operator).await?.subject();
    let local = store.get(account).await?;
    let key = local.subject();

    let outcome = with_retry(config, "pull", || server.pull(&key)).await?;
    let token = match outcome {
        PullOutcome::Token(token) => token,
        PullOutcome::NotFound => return Err(SyncError::NotFound(key.encode())),
    };

    let pulled = verify(&token, &operator_key)?;
    if pulled.subject() != key || pulled.kind() != local.kind() {
        return Err(SyncError::UnexpectedToken(format!(
            "server returned a {} claim for {}",
            pulled.kind(),
            pulled.subject()
        )));
    }

    if pulled.jti() == local.jti() {
        debug!(%account, "account already up to date");
        return Ok(pulled);
    }
    if pulled.claim().iat < local.claim().iat {
        warn!(
            %account,
            pulled = pulled.claim().iat,
            local = local.claim().iat,
            "refusing older pulled token"
        );
        return Err(SyncError::Stale {
            entity: account.to_string(),
            pulled: pulled.claim().iat,
            local: local.claim().iat,
        });
    }

    store.put(account, &pulled).await?;
    info!(%account, jti = %pulled.jti(), "pulled account");
    Ok(pulled)
}
