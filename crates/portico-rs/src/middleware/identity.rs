//! Identity claim forwarding for proxied requests.
//!
//! Token verification belongs to the authentication collaborator: by the
//! time a request reaches the core, a principal (if any) is already
//! established and stored in the request extensions as
//! [`AuthenticatedUser`]. The core only forwards its claims to the
//! upstream as headers, overwriting any client-supplied values.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Authenticated principal established by the authentication collaborator.
///
/// `user_id` holds the name-identifier claim; `subject` holds `sub` and is
/// used as the fallback for `X-User-Id`. Roles preserve their order of
/// occurrence in the token.
///
/// # Examples
///
/// ```
/// use portico_rs::middleware::identity::AuthenticatedUser;
/// use reqwest::header::HeaderMap;
///
/// let user = AuthenticatedUser {
///     user_id: Some("u-42".to_string()),
///     subject: None,
///     tenant_id: Some("acme".to_string()),
///     email: None,
///     roles: vec!["admin".to_string(), "ops".to_string()],
/// };
///
/// let mut headers = HeaderMap::new();
/// user.apply_headers(&mut headers);
/// assert_eq!(headers.get("x-user-id").unwrap(), "u-42");
/// assert_eq!(headers.get("x-user-roles").unwrap(), "admin,ops");
/// assert!(headers.get("x-user-email").is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AuthenticatedUser {
    /// Name-identifier claim, preferred source for `X-User-Id`.
    pub user_id: Option<String>,
    /// `sub` claim, fallback source for `X-User-Id`.
    pub subject: Option<String>,
    pub tenant_id: Option<String>,
    pub email: Option<String>,
    pub roles: Vec<String>,
}

impl AuthenticatedUser {
    /// Overwrites the identity headers on an upstream request.
    ///
    /// Headers are inserted, not appended, so client-supplied identity
    /// headers can never leak through. Absent claims yield absent headers.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        Self::set(
            headers,
            USER_ID_HEADER,
            self.user_id.as_deref().or(self.subject.as_deref()),
        );
        Self::set(headers, TENANT_ID_HEADER, self.tenant_id.as_deref());
        Self::set(headers, USER_EMAIL_HEADER, self.email.as_deref());
        if self.roles.is_empty() {
            headers.remove(USER_ROLES_HEADER);
        } else {
            Self::set(headers, USER_ROLES_HEADER, Some(&self.roles.join(",")));
        }
    }

    fn set(headers: &mut HeaderMap, name: &'static str, value: Option<&str>) {
        match value {
            Some(value) => {
                if let Ok(header_value) = HeaderValue::from_str(value) {
                    headers.insert(HeaderName::from_static(name), header_value);
                }
            }
            None => {
                headers.remove(name);
            }
        }
    }
}
