//! Authorization code exchange
//!
//! POSTs the code to the platform token endpoint and validates both the HTTP
//! status and the platform's own `ErrorCode` envelope. The platform answers
//! with offsets in seconds; turning them into instants is left to the caller
//! (`TokenPair::from_grants`) so that both tokens share one `now`.

use common::Secret;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::constants::{API_KEY_HEADER, SUCCESS_ERROR_CODE};
use crate::error::{Error, Result};

/// Body of the code exchange request: `{"Code": "..."}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeExchangeRequest<'a> {
    pub code: &'a str,
}

/// Platform response envelope for the code exchange.
///
/// `ErrorStatus` and `Message` are diagnostics only; success is decided by
/// `ErrorCode` alone.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CodeExchangeResponse {
    pub error_code: i64,
    #[serde(default)]
    pub error_status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub response: Option<TokenGrants>,
}

/// The two grants carried by a successful exchange.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenGrants {
    pub access_token: TokenGrant,
    pub refresh_token: TokenGrant,
}

/// One token as issued: value plus readiness/expiry offsets in seconds.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TokenGrant {
    pub value: Secret<String>,
    pub ready_in: i64,
    pub expires: i64,
}

/// Exchange an authorization code for an access/refresh grant pair.
///
/// Fails on encoding, request construction, transport, non-200 status,
/// undecodable body, or a non-success `ErrorCode`. No retries.
#[instrument(skip_all, fields(endpoint = %endpoint))]
pub async fn exchange_code(
    client: &reqwest::Client,
    endpoint: &str,
    api_key: &str,
    code: &str,
) -> Result<TokenGrants> {
    let body = serde_json::to_vec(&CodeExchangeRequest { code })
        .map_err(|e| Error::Encode(e.to_string()))?;

    let request = client
        .post(endpoint)
        .header(CONTENT_TYPE, "application/json")
        .header(API_KEY_HEADER, api_key)
        .body(body)
        .build()
        .map_err(|e| Error::Request(e.to_string()))?;

    let response = client
        .execute(request)
        .await
        .map_err(|e| Error::Http(e.to_string()))?;

    let status = response.status();
    if status != StatusCode::OK {
        return Err(Error::Status(status.as_u16()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Error::Decode(e.to_string()))?;
    let decoded: CodeExchangeResponse =
        serde_json::from_slice(&bytes).map_err(|e| Error::Decode(e.to_string()))?;

    if decoded.error_code != SUCCESS_ERROR_CODE {
        return Err(Error::Provider(format!("{decoded:?}")));
    }

    match decoded.response {
        Some(grants) => {
            debug!(
                access_expires_in = grants.access_token.expires,
                refresh_expires_in = grants.refresh_token.expires,
                "code exchange accepted"
            );
            Ok(grants)
        }
        None => Err(Error::Provider(format!("{decoded:?}"))),
    }
}
