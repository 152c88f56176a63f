//! Bearer tokens and their validity windows
//!
//! A `Token` is never mutated: a successful code exchange produces a fresh
//! `TokenPair` that replaces the previous one wholesale. Instants are
//! wall-clock (`SystemTime`) because the provider hands out offsets relative
//! to the exchange response.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;

use crate::exchange::{TokenGrant, TokenGrants};

/// A bearer credential with a readiness and an expiry instant.
///
/// `ready <= expires` is expected but not enforced.
#[derive(Debug, Clone)]
pub struct Token {
    value: Secret<String>,
    ready: SystemTime,
    expires: SystemTime,
}

impl Token {
    pub fn new(value: impl Into<String>, ready: SystemTime, expires: SystemTime) -> Self {
        Self {
            value: Secret::new(value.into()),
            ready,
            expires,
        }
    }

    /// Placeholder held before the first exchange. Already expired.
    pub fn unset() -> Self {
        Self::new(String::new(), UNIX_EPOCH, UNIX_EPOCH)
    }

    /// Anchor a provider grant's second offsets at `now`.
    pub fn from_grant(grant: &TokenGrant, now: SystemTime) -> Self {
        Self {
            value: grant.value.clone(),
            ready: offset(now, grant.ready_in),
            expires: offset(now, grant.expires),
        }
    }

    /// The raw credential. Do not log it.
    pub fn value(&self) -> &str {
        self.value.expose()
    }

    pub fn ready(&self) -> SystemTime {
        self.ready
    }

    pub fn expires(&self) -> SystemTime {
        self.expires
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready_at(SystemTime::now())
    }

    pub fn is_ready_at(&self, now: SystemTime) -> bool {
        now > self.ready
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }

    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.expires
    }

    /// Time left before expiry, zero once expired.
    pub fn expires_in(&self, now: SystemTime) -> Duration {
        self.expires.duration_since(now).unwrap_or_default()
    }
}

/// Access and refresh token, always replaced together.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: Token,
    pub refresh: Token,
}

impl TokenPair {
    pub fn unset() -> Self {
        Self {
            access: Token::unset(),
            refresh: Token::unset(),
        }
    }

    /// Build both tokens from one exchange response, sharing the same `now`.
    pub fn from_grants(grants: &TokenGrants, now: SystemTime) -> Self {
        Self {
            access: Token::from_grant(&grants.access_token, now),
            refresh: Token::from_grant(&grants.refresh_token, now),
        }
    }
}

impl Default for TokenPair {
    fn default() -> Self {
        Self::unset()
    }
}

/// `now + secs`, saturating at `now` when the offset is unrepresentable.
fn offset(now: SystemTime, secs: i64) -> SystemTime {
    let delta = Duration::from_secs(secs.unsigned_abs());
    let shifted = if secs >= 0 {
        now.checked_add(delta)
    } else {
        now.checked_sub(delta)
    };
    shifted.unwrap_or(now)
}
