//! Provider callback: code exchange and resume
//!
//! Validates the callback query, trades the code for a token pair, installs
//! the pair, and sends the browser back to the URL carried in `state`. The
//! pair swap is the only state change and happens after every check passed.

use std::sync::Arc;
use std::time::{Instant, SystemTime};

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bungie_auth::{CODE_PARAM, ClientSession, ProviderConfig, STATE_PARAM, TokenPair, exchange_code};
use percent_encoding::{CONTROLS, utf8_percent_encode};
use tracing::{info, instrument, warn};

use crate::error::CallbackError;
use crate::metrics;

/// Everything the callback needs: the session it fills, provider settings,
/// and the outbound transport.
#[derive(Clone)]
pub struct CallbackState {
    pub session: Arc<ClientSession>,
    pub provider: Arc<ProviderConfig>,
    pub client: reqwest::Client,
}

/// GET <callback_path>?code=...&state=...
///
/// Always answers with exactly one response: 303 to `state` on success,
/// plain-text 500 otherwise.
pub async fn handle_callback(State(state): State<CallbackState>, uri: Uri) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let started = Instant::now();

    match complete_exchange(&state, &uri, &request_id).await {
        Ok(location) => {
            metrics::record_exchange("success", started.elapsed().as_secs_f64());
            (StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response()
        }
        Err(e) => {
            metrics::record_exchange(e.kind(), started.elapsed().as_secs_f64());
            warn!(request_id = %request_id, kind = e.kind(), error = %e, "token exchange failed");
            e.into_response()
        }
    }
}

#[instrument(skip_all, fields(request_id = %request_id))]
async fn complete_exchange(
    state: &CallbackState,
    uri: &Uri,
    request_id: &str,
) -> Result<HeaderValue, CallbackError> {
    let mut codes = Vec::new();
    let mut states = Vec::new();
    for (key, value) in url::form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes()) {
        if key == CODE_PARAM {
            codes.push(value.into_owned());
        } else if key == STATE_PARAM {
            states.push(value.into_owned());
        }
    }

    let code = single(codes, CODE_PARAM, uri)?;
    let resume = single(states, STATE_PARAM, uri)?;
    let location = redirect_location(&resume).ok_or_else(|| CallbackError::Invalid {
        param: STATE_PARAM,
        url: uri.to_string(),
    })?;
    if !(resume.starts_with("https://") || resume.starts_with("http://")) {
        warn!(resume = %resume, "state is not an absolute URL, redirecting verbatim");
    }

    let grants = exchange_code(
        &state.client,
        &state.provider.token_url,
        state.provider.api_key.expose(),
        &code,
    )
    .await?;

    state
        .session
        .install(TokenPair::from_grants(&grants, SystemTime::now()))
        .await;

    info!(resume = %resume, "token pair installed, resuming");
    Ok(location)
}

/// `Location` value for `resume`: non-ASCII is percent-encoded, existing
/// escapes are kept. `None` if it contains control characters.
fn redirect_location(resume: &str) -> Option<HeaderValue> {
    if resume.chars().any(|c| c.is_ascii_control()) {
        return None;
    }
    HeaderValue::from_str(&utf8_percent_encode(resume, CONTROLS).to_string()).ok()
}

/// Exactly one value for `param`, or the matching callback error.
fn single(mut values: Vec<String>, param: &'static str, uri: &Uri) -> Result<String, CallbackError> {
    match values.len() {
        0 => Err(CallbackError::Missing {
            param,
            url: uri.to_string(),
        }),
        1 => Ok(values.remove(0)),
        _ => Err(CallbackError::Duplicate {
            param,
            url: uri.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use bungie_auth::Token;
    use common::Secret;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tower::ServiceExt;
    use url::Url;

    const SUCCESS: &str = r#"{
        "ErrorCode": 1,
        "ErrorStatus": "Success",
        "Response": {
            "AccessToken": {"Value": "abc", "ReadyIn": 0, "Expires": 3600},
            "RefreshToken": {"Value": "xyz", "ReadyIn": 0, "Expires": 7776000}
        }
    }"#;

    /// Mock token endpoint answering every POST with `status` + `body`.
    /// Returns its URL and a hit counter.
    async fn start_provider(status: u16, body: &'static str) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let app = axum::Router::new().fallback(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (StatusCode::from_u16(status).unwrap(), body)
                }
            });
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}/token"), hits)
    }

    fn callback_state(token_url: String, session: Arc<ClientSession>) -> CallbackState {
        CallbackState {
            session,
            provider: Arc::new(ProviderConfig {
                authorize_url: Url::parse("https://www.bungie.net/en/OAuth/Authorize").unwrap(),
                token_url,
                api_key: Secret::new("test-key".into()),
            }),
            client: reqwest::Client::new(),
        }
    }

    async fn call(state: CallbackState, uri: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        let app = axum::Router::new()
            .route("/oauth/callback", axum::routing::get(handle_callback))
            .with_state(state);
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, headers, String::from_utf8_lossy(&body).to_string())
    }

    #[tokio::test]
    async fn success_installs_tokens_and_redirects_to_state() {
        let (token_url, hits) = start_provider(200, SUCCESS).await;
        let session = Arc::new(ClientSession::new());
        let before = SystemTime::now();

        let (status, headers, _) = call(
            callback_state(token_url, session.clone()),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2Fhome",
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "https://example.com/home");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let after = SystemTime::now();
        let tokens = session.snapshot().await;
        assert_eq!(tokens.access.value(), "abc");
        assert!(tokens.access.expires() >= before + Duration::from_secs(3600));
        assert!(tokens.access.expires() <= after + Duration::from_secs(3600));
        assert_eq!(tokens.refresh.value(), "xyz");
        assert!(tokens.refresh.expires() >= before + Duration::from_secs(7_776_000));
        assert!(tokens.refresh.expires() <= after + Duration::from_secs(7_776_000));
        assert!(session.is_authorized().await);
    }

    #[tokio::test]
    async fn missing_code_fails_without_calling_provider() {
        let (token_url, hits) = start_provider(200, SUCCESS).await;
        let (status, headers, body) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
        assert!(body.starts_with("no 'code' in request: /oauth/callback?state="), "got: {body}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_code_fails_without_calling_provider() {
        let (token_url, hits) = start_provider(200, SUCCESS).await;
        let (status, _, body) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?code=A&code=B&state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("multiple 'code' in request:"), "got: {body}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_or_duplicate_state_fails_without_calling_provider() {
        let (token_url, hits) = start_provider(200, SUCCESS).await;
        let session = Arc::new(ClientSession::new());

        let (status, _, body) = call(
            callback_state(token_url.clone(), session.clone()),
            "/oauth/callback?code=CODE",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("no 'state' in request:"), "got: {body}");

        let (status, _, body) = call(
            callback_state(token_url, session),
            "/oauth/callback?code=CODE&state=a&state=b",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("multiple 'state' in request:"), "got: {body}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unredirectable_state_fails_before_exchange() {
        let (token_url, hits) = start_provider(200, SUCCESS).await;
        let (status, _, body) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2F%0Aevil",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("invalid 'state' in request:"), "got: {body}");
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn provider_error_code_leaves_tokens_untouched() {
        let (token_url, hits) = start_provider(
            200,
            r#"{"ErrorCode": 2110, "ErrorStatus": "AuthorizationCodeInvalid", "Message": "bad code"}"#,
        )
        .await;
        let now = SystemTime::now();
        let session = Arc::new(ClientSession::with_tokens(TokenPair {
            access: Token::new("old-access", now, now + Duration::from_secs(60)),
            refresh: Token::new("old-refresh", now, now + Duration::from_secs(120)),
        }));

        let (status, _, body) = call(
            callback_state(token_url, session.clone()),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("bad message:"), "got: {body}");
        assert!(body.contains("AuthorizationCodeInvalid"), "got: {body}");
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let tokens = session.snapshot().await;
        assert_eq!(tokens.access.value(), "old-access");
        assert_eq!(tokens.refresh.value(), "old-refresh");
    }

    #[tokio::test]
    async fn non_200_from_provider_reports_status() {
        let (token_url, _hits) = start_provider(401, "unauthorized").await;
        let session = Arc::new(ClientSession::new());
        let (status, _, body) = call(
            callback_state(token_url, session.clone()),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "bad response: 401");
        assert!(!session.is_authorized().await);
    }

    #[tokio::test]
    async fn undecodable_provider_body_is_500() {
        let (token_url, _hits) = start_provider(200, "not json").await;
        let (status, _, body) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("invalid token response:"), "got: {body}");
    }

    #[tokio::test]
    async fn unreachable_provider_is_500() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (status, _, body) = call(
            callback_state(format!("http://{addr}/token"), Arc::new(ClientSession::new())),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("token request failed:"), "got: {body}");
    }

    #[tokio::test]
    async fn relative_state_is_redirected_verbatim() {
        let (token_url, _hits) = start_provider(200, SUCCESS).await;
        let (status, headers, _) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?code=CODE&state=%2Fvault",
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "/vault");
    }

    #[tokio::test]
    async fn non_ascii_state_is_percent_encoded() {
        let (token_url, _hits) = start_provider(200, SUCCESS).await;
        let (status, headers, _) = call(
            callback_state(token_url, Arc::new(ClientSession::new())),
            "/oauth/callback?code=CODE&state=https%3A%2F%2Fexample.com%2Fcaf%C3%A9%3Fq%3Da%2520b",
        )
        .await;

        assert_eq!(status, StatusCode::SEE_OTHER);
        assert_eq!(headers[header::LOCATION], "https://example.com/caf%C3%A9?q=a%20b");
    }
}
