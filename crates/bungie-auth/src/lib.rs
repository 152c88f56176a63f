//! Bungie.net OAuth authorization-code flow
//!
//! Holds the token lifecycle and the provider-facing half of the two-phase
//! authentication protocol. The HTTP surface that drives it (challenge
//! redirects and the callback endpoint) lives in the gateway service.
//!
//! Flow:
//! 1. `authorize::challenge_url()` builds the provider redirect, carrying the
//!    caller's absolute URL as `state`
//! 2. The provider calls back with `code` and the echoed `state`
//! 3. `exchange::exchange_code()` trades the code for a `TokenGrants`
//! 4. `TokenPair::from_grants()` anchors the grant offsets at `now`
//! 5. `ClientSession::install()` swaps the pair in as one unit

pub mod authorize;
pub mod constants;
pub mod error;
pub mod exchange;
pub mod provider;
pub mod session;
pub mod token;

pub use authorize::{challenge_url, resume_url};
pub use constants::*;
pub use error::{Error, Result};
pub use exchange::{CodeExchangeRequest, CodeExchangeResponse, TokenGrant, TokenGrants, exchange_code};
pub use provider::ProviderConfig;
pub use session::ClientSession;
pub use token::{Token, TokenPair};
