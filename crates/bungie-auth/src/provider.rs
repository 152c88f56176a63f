//! Provider configuration injected into the authenticator and callback

use common::Secret;
use url::Url;

use crate::constants::{AUTHORIZE_ENDPOINT, TOKEN_ENDPOINT};

/// Static, per-client provider settings.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Authorization endpoint, including any fixed query (e.g. `client_id`)
    pub authorize_url: Url,
    /// Token endpoint the authorization code is exchanged at
    pub token_url: String,
    /// Application API key sent as `X-API-Key`
    pub api_key: Secret<String>,
}

impl ProviderConfig {
    /// Settings pointing at the public Bungie.net endpoints.
    pub fn bungie(api_key: Secret<String>) -> Result<Self, url::ParseError> {
        Ok(Self {
            authorize_url: Url::parse(AUTHORIZE_ENDPOINT)?,
            token_url: TOKEN_ENDPOINT.to_string(),
            api_key,
        })
    }
}
