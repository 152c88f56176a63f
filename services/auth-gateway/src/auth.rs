//! Protected-route guard
//!
//! Lets a request through while the session's access token is unexpired.
//! Otherwise the browser is sent to the provider's authorization endpoint
//! with the request's absolute URL as `state`, to be resumed by the callback.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::{HeaderMap, Uri, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use bungie_auth::{ClientSession, challenge_url, resume_url};
use tracing::{debug, info};
use url::Url;

use crate::metrics;

/// Decision for one protected request.
#[derive(Debug)]
pub enum Authentication {
    /// Access token is valid; serve the request.
    Granted,
    /// No valid token; the caller must answer with this redirect instead.
    Challenge(Challenge),
}

/// 303 redirect to the provider's authorization endpoint.
#[derive(Debug)]
pub struct Challenge {
    location: Url,
}

impl Challenge {
    pub fn location(&self) -> &Url {
        &self.location
    }
}

impl IntoResponse for Challenge {
    fn into_response(self) -> Response {
        Redirect::to(self.location.as_str()).into_response()
    }
}

#[derive(Clone)]
pub struct Authenticator {
    session: Arc<ClientSession>,
    authorize_url: Url,
}

impl Authenticator {
    pub fn new(session: Arc<ClientSession>, authorize_url: Url) -> Self {
        Self {
            session,
            authorize_url,
        }
    }

    /// Decide whether the request for `uri` may proceed.
    ///
    /// Takes the URI and headers rather than the request so the future stays
    /// `Send` while the body is held by the middleware. Reads the access token
    /// only; the refresh token is never consulted.
    pub async fn authenticate(&self, uri: &Uri, headers: &HeaderMap) -> Authentication {
        if self.session.is_authorized().await {
            metrics::record_auth(true);
            return Authentication::Granted;
        }

        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or_default();
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let resume = resume_url(host, path);
        let location = challenge_url(&self.authorize_url, &resume);

        metrics::record_auth(false);
        info!(resume = %resume, "access token expired, redirecting to provider");
        Authentication::Challenge(Challenge { location })
    }
}

/// Middleware applying the `Authenticator` in front of protected routes.
pub async fn require_token(
    State(auth): State<Authenticator>,
    request: Request,
    next: Next,
) -> Response {
    let decision = auth.authenticate(request.uri(), request.headers()).await;
    match decision {
        Authentication::Granted => next.run(request).await,
        Authentication::Challenge(challenge) => {
            debug!(location = %challenge.location(), "challenge issued");
            challenge.into_response()
        }
    }
}
