//! Per-client token session
//!
//! One access token and one refresh token, owned by a single client. Reads
//! take a short read lock and clone; the callback swaps the whole pair under
//! the write lock, so concurrent callbacks never leave a mixed pair behind.

use std::time::SystemTime;

use tokio::sync::RwLock;
use tracing::debug;

use crate::token::{Token, TokenPair};

/// Token holder shared between the authenticator and the callback handler.
#[derive(Debug, Default)]
pub struct ClientSession {
    tokens: RwLock<TokenPair>,
}

impl ClientSession {
    /// Empty session: both tokens unset, so the first request is challenged.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(tokens),
        }
    }

    pub async fn access_token(&self) -> Token {
        self.tokens.read().await.access.clone()
    }

    pub async fn refresh_token(&self) -> Token {
        self.tokens.read().await.refresh.clone()
    }

    pub async fn snapshot(&self) -> TokenPair {
        self.tokens.read().await.clone()
    }

    /// Whether the held access token is still unexpired.
    pub async fn is_authorized(&self) -> bool {
        !self.tokens.read().await.access.is_expired()
    }

    /// Replace both tokens in one step.
    pub async fn install(&self, tokens: TokenPair) {
        let now = SystemTime::now();
        debug!(
            access_expires_in_secs = tokens.access.expires_in(now).as_secs(),
            refresh_expires_in_secs = tokens.refresh.expires_in(now).as_secs(),
            "installing token pair"
        );
        *self.tokens.write().await = tokens;
    }
}
