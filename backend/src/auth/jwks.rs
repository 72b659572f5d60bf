use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use axum::http::HeaderMap;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::{Mutex, RwLock};

use super::{AuthError, ClaimSet, IdentityProvider, Principal};

/// JWKS key set response.
#[derive(Debug, Deserialize)]
struct JwksResponse {
    keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    #[allow(dead_code)]
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OidcConfig {
    #[serde(default)]
    issuer: Option<String>,
    jwks_uri: String,
}

/// Unknown kids refetch the key set at most this often.
const MIN_REFETCH_INTERVAL: Duration = Duration::from_secs(30);

/// Validates bearer JWTs issued by an OIDC authority.
///
/// Keys are fetched from the authority's discovery document at startup and
/// cached by `kid`; an unknown `kid` triggers a refetch, rate limited by
/// [`MIN_REFETCH_INTERVAL`].
pub struct JwksClient {
    http_client: Client,
    jwks_uri: String,
    keys: Arc<RwLock<HashMap<String, DecodingKey>>>,
    last_refetch: Mutex<Option<Instant>>,
    issuer: String,
    audience: Option<String>,
}

impl JwksClient {
    pub async fn new(authority: &str, audience: Option<String>) -> Result<Self, AuthError> {
        let http_client = Client::new();
        let authority = authority.trim_end_matches('/');

        // Fetch OIDC configuration to get JWKS URI
        let config_url = format!("{}/.well-known/openid-configuration", authority);
        let config: OidcConfig = http_client
            .get(&config_url)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let client = Self {
            http_client,
            jwks_uri: config.jwks_uri,
            keys: Arc::new(RwLock::new(HashMap::new())),
            last_refetch: Mutex::new(None),
            issuer: config.issuer.unwrap_or_else(|| authority.to_string()),
            audience,
        };

        client.refresh_keys().await?;

        Ok(client)
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    async fn refresh_keys(&self) -> Result<(), AuthError> {
        tracing::info!("Fetching JWKS from {}", self.jwks_uri);

        let response: JwksResponse = self
            .http_client
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?
            .json()
            .await
            .map_err(|e| AuthError::JwksFetchError(e.to_string()))?;

        let mut keys = self.keys.write().await;
        keys.clear();

        for jwk in response.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if let (Some(n), Some(e)) = (&jwk.n, &jwk.e) {
                match DecodingKey::from_rsa_components(n, e) {
                    Ok(key) => {
                        keys.insert(jwk.kid.clone(), key);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse RSA key {}: {}", jwk.kid, e);
                    }
                }
            }
        }

        tracing::info!("Loaded {} JWKS keys", keys.len());
        Ok(())
    }

    async fn cached_key(&self, kid: &str) -> Option<DecodingKey> {
        self.keys.read().await.get(kid).cloned()
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, AuthError> {
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }

        // Keys rotate; refetch before giving up, but not for every bogus kid.
        let mut last_refetch = self.last_refetch.lock().await;
        if let Some(key) = self.cached_key(kid).await {
            return Ok(key);
        }
        if let Some(at) = *last_refetch {
            if at.elapsed() < MIN_REFETCH_INTERVAL {
                tracing::debug!("Unknown kid {}, refetched recently", kid);
                return Err(AuthError::KeyNotFound(kid.to_string()));
            }
        }
        *last_refetch = Some(Instant::now());
        self.refresh_keys().await?;
        self.cached_key(kid)
            .await
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        match &self.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        validation
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub(crate) fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidFormat)?;

    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::InvalidFormat)
}

#[async_trait]
impl IdentityProvider for JwksClient {
    fn name(&self) -> &'static str {
        "oidc"
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let token = bearer_token(headers)?;

        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        let kid = header
            .kid
            .ok_or_else(|| AuthError::InvalidToken("Missing kid in token header".to_string()))?;

        let key = self.key_for(&kid).await?;

        let token_data = decode::<Map<String, Value>>(token, &key, &self.validation())
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        Ok(Principal::new(ClaimSet::from_json(&token_data.claims)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::AUTHORIZATION;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, value.parse().unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction_valid() {
        let headers = headers_with_auth("Bearer eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.test");
        assert_eq!(
            bearer_token(&headers).unwrap(),
            "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.test"
        );
    }

    #[test]
    fn test_bearer_token_missing_header() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
    }

    #[test]
    fn test_bearer_token_basic_auth_rejected() {
        let headers = headers_with_auth("Basic dXNlcjpwYXNz");
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));
    }

    #[test]
    fn test_bearer_token_empty_rejected() {
        let headers = headers_with_auth("Bearer   ");
        assert!(matches!(bearer_token(&headers), Err(AuthError::InvalidFormat)));
    }
}
