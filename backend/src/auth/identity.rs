//! Maps a verified claim set to the caller identity the service works with.
//!
//! Providers disagree on claim names (OIDC `sub`/`roles`, Entra `oid` and
//! schema URIs, Cognito `cognito:groups`). Every accepted shape is listed
//! here once, so handlers never branch on the provider.

use super::{AuthError, ClaimSet};

/// Claims holding the stable external id, in priority order.
pub const EXTERNAL_ID_CLAIMS: &[&str] = &[
    "oid",
    "http://schemas.microsoft.com/identity/claims/objectidentifier",
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier",
    "sub",
];

pub const DISPLAY_NAME_CLAIM: &str = "name";

/// Claims a provider uses for the identity's login name.
pub const IDENTITY_NAME_CLAIMS: &[&str] = &[
    "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/name",
    "unique_name",
    "cognito:username",
    "username",
];

pub const EMAIL_CLAIM: &str = "preferred_username";

/// Role-shaped claims.
pub const ROLE_CLAIMS: &[&str] = &[
    "role",
    "roles",
    "http://schemas.microsoft.com/ws/2008/06/identity/claims/role",
    "cognito:groups",
];

/// Role names that grant moderation rights (case-insensitive).
pub const ADMIN_ROLES: &[&str] = &["KudosAdmin", "Admin"];

pub const UNKNOWN_USER: &str = "Unknown User";

/// Who is calling, as far as the kudos service cares.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub external_id: String,
    pub display_name: String,
    /// Empty when the provider supplies none.
    pub email: String,
    pub is_admin: bool,
}

/// True if any role names a recognized admin role.
pub fn is_admin_role<'a>(roles: impl IntoIterator<Item = &'a str>) -> bool {
    roles.into_iter().any(|role| {
        let role = role.trim();
        ADMIN_ROLES.iter().any(|admin| admin.eq_ignore_ascii_case(role))
    })
}

pub fn has_admin_role(claims: &ClaimSet) -> bool {
    is_admin_role(claims.values_of(ROLE_CLAIMS))
}

/// Resolve the caller identity. Fails when no external id claim is present.
pub fn resolve(claims: &ClaimSet) -> Result<Identity, AuthError> {
    let external_id = claims
        .first_of(EXTERNAL_ID_CLAIMS)
        .ok_or(AuthError::MissingIdentity)?
        .to_string();

    let display_name = claims
        .first(DISPLAY_NAME_CLAIM)
        .or_else(|| claims.first_of(IDENTITY_NAME_CLAIMS))
        .unwrap_or(UNKNOWN_USER)
        .to_string();

    let email = claims.first(EMAIL_CLAIM).unwrap_or_default().to_string();

    Ok(Identity {
        external_id,
        display_name,
        email,
        is_admin: has_admin_role(claims),
    })
}
