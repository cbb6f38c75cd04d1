// crates/cosmos-sidecar-client/src/auth.rs
// ============================================================================
// Module: Cosmos Request Authorization
// Description: Master-key signing and Entra ID token resolution.
// Purpose: Produce the `authorization` header for gateway requests.
// Dependencies: hmac, sha2, base64, time, reqwest, tokio
// ============================================================================

//! ## Overview
//! Cosmos DB accepts two authorization schemes:
//! - master key: an HMAC-SHA256 signature over the verb, resource type,
//!   resource link and request date, keyed with the decoded account key;
//! - Entra ID: a bearer token for the account scope.
//!
//! Both are rendered as `type=..&ver=1.0&sig=..` and percent-encoded.
//! Token credentials resolve from the environment: a static token in
//! `AZURE_COSMOS_ACCESS_TOKEN`, or the client-credentials flow using
//! `AZURE_TENANT_ID`, `AZURE_CLIENT_ID`, and `AZURE_CLIENT_SECRET`.
//! Tokens are cached and refreshed ahead of expiry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use cosmos_sidecar_config::AuthMode;
use cosmos_sidecar_config::CosmosConfig;
use hmac::Hmac;
use hmac::Mac;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use time::OffsetDateTime;
use time::UtcOffset;
use time::macros::format_description;
use tokio::sync::Mutex;
use tracing::debug;
use url::Url;
use url::form_urlencoded;

use crate::client::read_response_body_with_limit;
use crate::error::CosmosError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Static bearer token variable.
pub const ACCESS_TOKEN_ENV_VAR: &str = "AZURE_COSMOS_ACCESS_TOKEN";
/// Tenant identifier variable for the client-credentials flow.
pub const TENANT_ID_ENV_VAR: &str = "AZURE_TENANT_ID";
/// Application identifier variable for the client-credentials flow.
pub const CLIENT_ID_ENV_VAR: &str = "AZURE_CLIENT_ID";
/// Application secret variable for the client-credentials flow.
pub const CLIENT_SECRET_ENV_VAR: &str = "AZURE_CLIENT_SECRET";
/// Authority host override variable.
pub const AUTHORITY_HOST_ENV_VAR: &str = "AZURE_AUTHORITY_HOST";
/// Public-cloud authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com/";
/// Tokens are refreshed this long before they expire.
pub const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);
/// Maximum token endpoint response size in bytes.
const MAX_TOKEN_RESPONSE_BYTES: usize = 64 * 1024;

/// HMAC-SHA256 keyed with the account key.
type HmacSha256 = Hmac<Sha256>;

// ============================================================================
// SECTION: Signing Helpers
// ============================================================================

/// Formats a timestamp as the RFC 1123 value expected in `x-ms-date`.
#[must_use]
pub fn rfc1123_date(at: OffsetDateTime) -> String {
    let format = format_description!(
        "[weekday repr:short], [day] [month repr:short] [year] [hour]:[minute]:[second] GMT"
    );
    at.to_offset(UtcOffset::UTC).format(&format).unwrap_or_default()
}

/// Computes the percent-encoded master-key authorization token.
///
/// # Errors
///
/// Returns [`CosmosError::Credential`] when the key cannot seed the MAC.
pub fn master_key_signature(
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
    key: &[u8],
) -> Result<String, CosmosError> {
    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_ascii_lowercase(),
        resource_type.to_ascii_lowercase(),
        resource_link,
        date.to_ascii_lowercase()
    );
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| CosmosError::Credential("account key rejected by hmac".to_string()))?;
    mac.update(payload.as_bytes());
    let signature = BASE64.encode(mac.finalize().into_bytes());
    Ok(encode_token("master", &signature))
}

/// Renders and percent-encodes an authorization token.
fn encode_token(kind: &str, signature: &str) -> String {
    let raw = format!("type={kind}&ver=1.0&sig={signature}");
    form_urlencoded::byte_serialize(raw.as_bytes()).collect()
}

// ============================================================================
// SECTION: Credential
// ============================================================================

/// Request credential selected from configuration.
#[derive(Clone)]
pub enum Credential {
    /// Decoded account key.
    MasterKey(Arc<[u8]>),
    /// Entra ID token source.
    Token(Arc<TokenCredential>),
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MasterKey(_) => f.write_str("Credential::MasterKey(<redacted>)"),
            Self::Token(token) => f.debug_tuple("Credential::Token").field(token).finish(),
        }
    }
}

impl Credential {
    /// Builds the credential for the configured auth mode.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError`] when the key is missing or malformed, or no
    /// token source is available.
    pub fn from_config(config: &CosmosConfig, http: &reqwest::Client) -> Result<Self, CosmosError> {
        match config.auth.mode {
            AuthMode::Key => {
                let key = config.key.as_deref().map(str::trim).unwrap_or_default();
                Self::master_key(key)
            }
            AuthMode::DefaultAzureCredential => {
                let endpoint = config
                    .endpoint_url()
                    .map_err(|err| CosmosError::Config(err.to_string()))?;
                let token =
                    TokenCredential::from_env(|name| env::var(name).ok(), &endpoint, http.clone())?;
                Ok(Self::Token(Arc::new(token)))
            }
        }
    }

    /// Builds a master-key credential from the base64 account key.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Credential`] when the key is empty or not base64.
    pub fn master_key(key: &str) -> Result<Self, CosmosError> {
        if key.is_empty() {
            return Err(CosmosError::Credential("account key is empty".to_string()));
        }
        let decoded = BASE64
            .decode(key)
            .map_err(|_| CosmosError::Credential("account key must be base64".to_string()))?;
        Ok(Self::MasterKey(decoded.into()))
    }

    /// Produces the `authorization` header value for one request.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Credential`] when signing fails or no token can
    /// be obtained.
    pub async fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String, CosmosError> {
        match self {
            Self::MasterKey(key) => {
                master_key_signature(verb, resource_type, resource_link, date, key)
            }
            Self::Token(token) => {
                let bearer = token.token().await?;
                Ok(encode_token("aad", &bearer))
            }
        }
    }
}

// ============================================================================
// SECTION: Token Credential
// ============================================================================

/// Where tokens come from.
enum TokenSource {
    /// Pre-issued token supplied by the environment.
    Static(String),
    /// Client-credentials grant against the authority.
    ClientSecret {
        /// Token endpoint URL.
        token_url: Url,
        /// Application identifier.
        client_id: String,
        /// Application secret.
        client_secret: String,
        /// Requested scope.
        scope: String,
    },
}

/// Cached bearer token.
struct CachedToken {
    /// Token value.
    token: String,
    /// Instant after which the token is refreshed; `None` never expires.
    refresh_at: Option<Instant>,
}

/// Token endpoint response body.
#[derive(Deserialize)]
struct TokenResponse {
    /// Issued access token.
    access_token: String,
    /// Lifetime in seconds, as a number or a numeric string.
    #[serde(default)]
    expires_in: Option<Value>,
}

/// Entra ID bearer token provider with caching.
pub struct TokenCredential {
    /// Token source.
    source: TokenSource,
    /// HTTP client for token requests.
    http: reqwest::Client,
    /// Last issued token.
    cache: Mutex<Option<CachedToken>>,
}

impl fmt::Debug for TokenCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            TokenSource::Static(_) => "static",
            TokenSource::ClientSecret {
                ..
            } => "client_secret",
        };
        f.debug_struct("TokenCredential").field("source", &source).finish_non_exhaustive()
    }
}

impl TokenCredential {
    /// Resolves a token source from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Credential`] when no source is configured or the
    /// authority host is invalid.
    pub fn from_env(
        lookup: impl Fn(&str) -> Option<String>,
        endpoint: &Url,
        http: reqwest::Client,
    ) -> Result<Self, CosmosError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        if let Some(token) = non_empty(ACCESS_TOKEN_ENV_VAR) {
            return Ok(Self::new(TokenSource::Static(token.trim().to_string()), http));
        }
        let (Some(tenant_id), Some(client_id), Some(client_secret)) = (
            non_empty(TENANT_ID_ENV_VAR),
            non_empty(CLIENT_ID_ENV_VAR),
            non_empty(CLIENT_SECRET_ENV_VAR),
        ) else {
            return Err(CosmosError::Credential(format!(
                "no token source: set {ACCESS_TOKEN_ENV_VAR} or {TENANT_ID_ENV_VAR}, \
                 {CLIENT_ID_ENV_VAR} and {CLIENT_SECRET_ENV_VAR}"
            )));
        };
        let authority = non_empty(AUTHORITY_HOST_ENV_VAR)
            .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string());
        let mut token_url = Url::parse(authority.trim())
            .map_err(|err| CosmosError::Credential(format!("invalid authority host: {err}")))?;
        token_url
            .path_segments_mut()
            .map_err(|()| CosmosError::Credential("authority host cannot be a base".to_string()))?
            .pop_if_empty()
            .extend([tenant_id.trim(), "oauth2", "v2.0", "token"]);
        let scope = account_scope(endpoint)?;
        Ok(Self::new(
            TokenSource::ClientSecret {
                token_url,
                client_id,
                client_secret,
                scope,
            },
            http,
        ))
    }

    /// Wraps a source with an empty cache.
    fn new(source: TokenSource, http: reqwest::Client) -> Self {
        Self {
            source,
            http,
            cache: Mutex::new(None),
        }
    }

    /// Returns a valid bearer token, fetching a new one when needed.
    ///
    /// # Errors
    ///
    /// Returns [`CosmosError::Credential`] when the token endpoint fails.
    pub async fn token(&self) -> Result<String, CosmosError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            let fresh = cached.refresh_at.is_none_or(|refresh_at| Instant::now() < refresh_at);
            if fresh {
                return Ok(cached.token.clone());
            }
        }
        let fetched = self.fetch().await?;
        let token = fetched.token.clone();
        *cache = Some(fetched);
        Ok(token)
    }

    /// Obtains a token from the configured source.
    async fn fetch(&self) -> Result<CachedToken, CosmosError> {
        match &self.source {
            TokenSource::Static(token) => Ok(CachedToken {
                token: token.clone(),
                refresh_at: None,
            }),
            TokenSource::ClientSecret {
                token_url,
                client_id,
                client_secret,
                scope,
            } => {
                debug!(token_url = %token_url, "requesting entra id token");
                let body = form_urlencoded::Serializer::new(String::new())
                    .append_pair("grant_type", "client_credentials")
                    .append_pair("client_id", client_id)
                    .append_pair("client_secret", client_secret)
                    .append_pair("scope", scope)
                    .finish();
                let response = self
                    .http
                    .post(token_url.clone())
                    .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(body)
                    .send()
                    .await
                    .map_err(|err| CosmosError::Credential(format!("token request failed: {err}")))?;
                let status = response.status();
                let bytes = read_response_body_with_limit(response, MAX_TOKEN_RESPONSE_BYTES)
                    .await
                    .map_err(|err| CosmosError::Credential(format!("token read failed: {err}")))?;
                if !status.is_success() {
                    return Err(CosmosError::Credential(format!(
                        "token endpoint returned {}",
                        status.as_u16()
                    )));
                }
                let parsed: TokenResponse = serde_json::from_slice(&bytes).map_err(|err| {
                    CosmosError::Credential(format!("invalid token response: {err}"))
                })?;
                let lifetime = parsed.expires_in.as_ref().and_then(parse_lifetime_secs);
                Ok(CachedToken {
                    token: parsed.access_token,
                    refresh_at: refresh_deadline(Instant::now(), lifetime),
                })
            }
        }
    }
}

/// Picks when a freshly issued token should be replaced.
///
/// Tokens are refreshed [`TOKEN_REFRESH_MARGIN`] before expiry; lifetimes
/// shorter than the margin refresh at half-life. No lifetime means the token
/// is kept until the process exits.
fn refresh_deadline(issued_at: Instant, lifetime_secs: Option<u64>) -> Option<Instant> {
    let lifetime = Duration::from_secs(lifetime_secs?);
    let usable = if lifetime > TOKEN_REFRESH_MARGIN {
        lifetime.saturating_sub(TOKEN_REFRESH_MARGIN)
    } else {
        lifetime / 2
    };
    issued_at.checked_add(usable)
}

/// Returns the `.default` scope for the account host.
fn account_scope(endpoint: &Url) -> Result<String, CosmosError> {
    let host = endpoint
        .host_str()
        .ok_or_else(|| CosmosError::Config("endpoint has no host".to_string()))?;
    Ok(format!("{}://{host}/.default", endpoint.scheme()))
}

/// Reads a token lifetime encoded as a number or numeric string.
fn parse_lifetime_secs(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
