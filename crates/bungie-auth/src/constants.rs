//! Bungie.net platform constants
//!
//! Defaults for the public endpoints. Both URLs can be overridden through
//! configuration; the API key never has a default.

/// Authorization endpoint the browser is sent to when no valid token is held
pub const AUTHORIZE_ENDPOINT: &str = "https://www.bungie.net/en/OAuth/Authorize";

/// Token endpoint for authorization code exchange
pub const TOKEN_ENDPOINT: &str = "https://www.bungie.net/Platform/App/GetAccessTokensFromCode/";

/// Header carrying the application's API key on every platform call
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Query parameter used to round-trip the resume URL through the provider
pub const STATE_PARAM: &str = "state";

/// Query parameter carrying the authorization code on the callback
pub const CODE_PARAM: &str = "code";

/// `ErrorCode` value the platform returns for a successful call
pub const SUCCESS_ERROR_CODE: i64 = 1;
