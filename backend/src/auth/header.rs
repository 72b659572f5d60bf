use async_trait::async_trait;
use axum::http::HeaderMap;

use super::{AuthError, ClaimSet, IdentityProvider, Principal};

pub const USER_ID_HEADER: &str = "x-test-user-id";
pub const USER_NAME_HEADER: &str = "x-test-user-name";
pub const USER_EMAIL_HEADER: &str = "x-test-user-email";
/// Comma-separated role names.
pub const USER_ROLES_HEADER: &str = "x-test-user-roles";

const DEFAULT_NAME: &str = "Test User";
const DEFAULT_EMAIL: &str = "test.user@contoso.com";

/// Trusts `X-Test-User-*` headers as the caller's claims.
///
/// For local development and automated checks only; configuration refuses
/// it in production.
#[derive(Debug, Default, Clone)]
pub struct HeaderIdentityProvider;

impl HeaderIdentityProvider {
    pub fn new() -> Self {
        Self
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl IdentityProvider for HeaderIdentityProvider {
    fn name(&self) -> &'static str {
        "header"
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<Principal, AuthError> {
        let user_id = header(headers, USER_ID_HEADER).ok_or(AuthError::MissingTestUser)?;

        let mut claims = ClaimSet::new()
            .with("oid", user_id)
            .with("name", header(headers, USER_NAME_HEADER).unwrap_or(DEFAULT_NAME))
            .with(
                "preferred_username",
                header(headers, USER_EMAIL_HEADER).unwrap_or(DEFAULT_EMAIL),
            );

        if let Some(roles) = header(headers, USER_ROLES_HEADER) {
            for role in roles.split(',') {
                claims.insert("roles", role.trim());
            }
        }

        Ok(Principal::new(claims))
    }
}
