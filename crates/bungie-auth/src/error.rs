//! Error types for the code exchange

/// Errors from exchanging an authorization code with the provider.
///
/// Every variant is terminal for the exchange: nothing is retried and no
/// token is installed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to encode token request: {0}")]
    Encode(String),

    #[error("failed to build token request: {0}")]
    Request(String),

    #[error("token request failed: {0}")]
    Http(String),

    #[error("bad response: {0}")]
    Status(u16),

    #[error("invalid token response: {0}")]
    Decode(String),

    #[error("bad message: {0}")]
    Provider(String),
}

impl Error {
    /// Short label for metrics and structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Encode(_) => "encode",
            Error::Request(_) => "request",
            Error::Http(_) => "transport",
            Error::Status(_) => "status",
            Error::Decode(_) => "decode",
            Error::Provider(_) => "provider",
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
