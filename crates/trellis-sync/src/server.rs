//! Token server abstraction.
//!
//! A token server holds the latest account tokens of an operator so that
//! message-bus servers can look them up. This crate only moves token text;
//! the transport behind a [`TokenServer`] is up to the implementation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use trellis_core::{PublicKey, SignedClaim};

use crate::error::{Result, SyncError};

/// Server answer to a push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    /// The token was accepted.
    Ack,
    /// The token was refused; the server keeps what it had.
    Conflict { reason: String },
}

/// Server answer to a pull.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    Token(String),
    NotFound,
}

/// Remote token server.
///
/// Errors are reserved for transport failures; refusals are outcomes.
#[async_trait]
pub trait TokenServer: Send + Sync {
    /// Publish a token.
    async fn push(&self, token: &str) -> Result<PushOutcome>;

    /// Fetch the token whose subject is `key`.
    async fn pull(&self, key: &PublicKey) -> Result<PullOutcome>;
}

/// In-memory token server for tests.
///
/// Accepts only tokens with a valid signature, optionally only from a
/// given operator, and refuses tokens older than the one it holds.
/// Failures and delays can be injected to exercise retry handling.
#[derive(Default)]
pub struct MemoryTokenServer {
    tokens: RwLock<HashMap<PublicKey, SignedClaim>>,
    operator: Option<PublicKey>,
    failures: AtomicUsize,
    delay: RwLock<Option<Duration>>,
    calls: AtomicUsize,
}

impl MemoryTokenServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept only tokens issued by `operator`.
    pub fn for_operator(operator: PublicKey) -> Self {
        Self {
            operator: Some(operator),
            ..Self::default()
        }
    }

    /// Fail the next `n` calls with a transport error.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    /// Delay every call by `delay`.
    pub async fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.write().await = delay;
    }

    /// Number of push and pull calls received, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Store a token directly, bypassing checks.
    pub async fn insert(&self, signed: SignedClaim) {
        self.tokens.write().await.insert(signed.subject(), signed);
    }

    async fn enter(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.read().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let injected = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if injected.is_ok() {
            return Err(SyncError::Transport("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenServer for MemoryTokenServer {
    async fn push(&self, token: &str) -> Result<PushOutcome> {
        self.enter().await?;

        let signed = match SignedClaim::decode(token) {
            Ok(signed) => signed,
            Err(e) => {
                return Ok(PushOutcome::Conflict {
                    reason: e.to_string(),
                })
            }
        };
        if let Some(operator) = &self.operator {
            if signed.issuer() != *operator {
                return Ok(PushOutcome::Conflict {
                    reason: format!("not issued by operator {operator}"),
                });
            }
        }

        let mut tokens = self.tokens.write().await;
        if let Some(current) = tokens.get(&signed.subject()) {
            if current.claim().iat > signed.claim().iat {
                return Ok(PushOutcome::Conflict {
                    reason: "server holds a newer token".into(),
                });
            }
        }
        tokens.insert(signed.subject(), signed);
        Ok(PushOutcome::Ack)
    }

    async fn pull(&self, key: &PublicKey) -> Result<PullOutcome> {
        self.enter().await?;
        let tokens = self.tokens.read().await;
        Ok(match tokens.get(key) {
            Some(signed) => PullOutcome::Token(signed.token().to_string()),
            None => PullOutcome::NotFound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_core::{ClaimBuilder, KeyPair, Role};

    fn account_token(op: &KeyPair, account: &KeyPair, iat: i64) -> SignedClaim {
        ClaimBuilder::account(account.public_key(), "A")
            .sign(op, iat)
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_then_pull() {
        let op = KeyPair::generate(Role::Operator);
        let account = KeyPair::generate(Role::Account);
        let server = MemoryTokenServer::for_operator(op.public_key());
        let signed = account_token(&op, &account, 10);

        assert_eq!(server.push(signed.token()).await.unwrap(), PushOutcome::Ack);
        assert_eq!(
            server.pull(&account.public_key()).await.unwrap(),
            PullOutcome::Token(signed.token().to_string())
        );
    }

    #[tokio::test]
    async fn test_pull_unknown() {
        let server = MemoryTokenServer::new();
        let key = KeyPair::generate(Role::Account).public_key();
        assert_eq!(server.pull(&key).await.unwrap(), PullOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_stale_push_conflicts() {
        let op = KeyPair::generate(Role::Operator);
        let account = KeyPair::generate(Role::Account);
        let server = MemoryTokenServer::new();

        server.push(account_token(&op, &account, 20).token()).await.unwrap();
        let outcome = server
            .push(account_token(&op, &account, 10).token())
            .await
            .unwrap();
        assert!(matches!(outcome, PushOutcome::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_foreign_operator_conflicts() {
        let op = KeyPair::generate(Role::Operator);
        let other = KeyPair::generate(Role::Operator);
        let account = KeyPair::generate(Role::Account);
        let server = MemoryTokenServer::for_operator(op.public_key());

        let outcome = server
            .push(account_token(&other, &account, 1).token())
            .await
            .unwrap();
        assert!(matches!(outcome, PushOutcome::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let server = MemoryTokenServer::new();
        let key = KeyPair::generate(Role::Account).public_key();
        server.fail_next(1);

        assert!(matches!(
            server.pull(&key).await,
            Err(SyncError::Transport(_))
        ));
        assert!(server.pull(&key).await.is_ok());
        assert_eq!(server.calls(), 2);
    }
}
