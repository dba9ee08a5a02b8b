//! Authentication and authorization.
//!
//! Shopfront does not manage users itself. In `auth-proxy` mode, a trusted
//! reverse proxy in front of Shopfront authenticates the user and passes the
//! username and permissions via headers. Machine clients can use the shared
//! trusted external key instead.

use std::{collections::BTreeSet, fmt};

use base64::Engine as _;
use hyper::HeaderMap;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::prelude::*;


/// Header that trusted machine clients use to send the shared key.
pub(crate) const TRUSTED_EXTERNAL_KEY_HEADER: &str = "x-shopfront-trusted-external-key";


/// Authentification and authorization
#[derive(Debug, Clone, confique::Config)]
pub(crate) struct AuthConfig {
    /// The mode of authentication:
    ///
    /// - "none": every request is anonymous. Only requests carrying the trusted
    ///   external key have any permissions.
    /// - "auth-proxy": a reverse proxy authenticates every request and passes
    ///   the user information via the headers configured below. Make sure
    ///   the proxy removes these headers from incoming requests!
    #[config(default = "none")]
    pub(crate) mode: AuthMode,

    /// The header containing the unique username of the current user, base64
    /// encoded (so that it can contain arbitrary UTF-8).
    #[config(default = "x-shopfront-user")]
    pub(crate) user_header: String,

    /// The header containing a comma-separated list of permission codes of
    /// the current user, e.g. "MANAGE_TRANSLATIONS, MANAGE_APPS".
    #[config(default = "x-shopfront-permissions")]
    pub(crate) permissions_header: String,

    /// Users with this code in their permission list hold all permissions.
    #[config(default = "SUPERUSER")]
    pub(crate) superuser_permission: String,

    /// A shared secret for **trusted** external applications. Send this
    /// value as the `x-shopfront-trusted-external-key` header to get all
    /// permissions without a user. This should be hard to guess and kept
    /// secret. Only send it over encrypted channels.
    pub(crate) trusted_external_key: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub(crate) enum AuthMode {
    None,
    AuthProxy,
}

impl AuthConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.user_header.eq_ignore_ascii_case(&self.permissions_header) {
            bail!("'auth.user_header' and 'auth.permissions_header' must be different headers");
        }
        if let Some(key) = &self.trusted_external_key {
            if key.expose_secret().len() < 16 {
                bail!("'auth.trusted_external_key' is too short (at least 16 characters required)");
            }
        }

        Ok(())
    }
}


/// Capabilities a caller can hold. The GraphQL API checks these before
/// touching any data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum Permission {
    ManageTranslations,
    ManageApps,
}

impl Permission {
    pub(crate) const ALL: &'static [Self] = &[Self::ManageTranslations, Self::ManageApps];

    pub(crate) fn code(self) -> &'static str {
        match self {
            Self::ManageTranslations => "MANAGE_TRANSLATIONS",
            Self::ManageApps => "MANAGE_APPS",
        }
    }

    pub(crate) fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.code() == code)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}


/// An authenticated user as reported by the auth proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct User {
    pub(crate) username: String,
    pub(crate) permissions: BTreeSet<Permission>,
    pub(crate) is_superuser: bool,
}

/// Who is sending the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AuthContext {
    Anonymous,
    TrustedExternal,
    User(User),
}

impl AuthContext {
    pub(crate) fn from_headers(headers: &HeaderMap, auth_config: &AuthConfig) -> Self {
        if let Some(given_key) = headers.get(TRUSTED_EXTERNAL_KEY_HEADER) {
            match &auth_config.trusted_external_key {
                Some(trusted_key) if trusted_key.expose_secret().as_bytes() == given_key.as_bytes() => {
                    return Self::TrustedExternal;
                }
                _ => debug!("Request carries invalid trusted external key, ignoring it"),
            }
        }

        match auth_config.mode {
            AuthMode::None => Self::Anonymous,
            AuthMode::AuthProxy => User::from_auth_headers(headers, auth_config)
                .map_or(Self::Anonymous, Self::User),
        }
    }

    /// Returns an `AuthToken` if the caller holds `permission`.
    pub(crate) fn required_permission(&self, permission: Permission) -> Option<AuthToken> {
        let allowed = match self {
            Self::Anonymous => false,
            Self::TrustedExternal => true,
            Self::User(user) => user.is_superuser || user.permissions.contains(&permission),
        };
        AuthToken::some_if(allowed)
    }

    pub(crate) fn username(&self) -> Option<&str> {
        match self {
            Self::User(user) => Some(&user.username),
            _ => None,
        }
    }
}

impl User {
    /// Reads the user from the auth headers. Returns `None` if the user
    /// header is missing or broken, which treats the request as anonymous.
    fn from_auth_headers(headers: &HeaderMap, auth_config: &AuthConfig) -> Option<Self> {
        let header_name = &auth_config.user_header;
        let raw = headers.get(header_name)?;
        let username = base64::engine::general_purpose::STANDARD.decode(raw.as_bytes())
            .map_err(|e| warn!("header '{header_name}' is set but not valid base64: {e}"))
            .ok()?
            .pipe(String::from_utf8)
            .map_err(|e| warn!("header '{header_name}' is set but decoded base64 is not UTF8: {e}"))
            .ok()?;

        if username.trim().is_empty() {
            warn!("header '{header_name}' is set but empty, treating request as anonymous");
            return None;
        }

        let mut permissions = BTreeSet::new();
        let mut is_superuser = false;
        let permission_codes = headers.get(&auth_config.permissions_header)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        for code in permission_codes.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if code == auth_config.superuser_permission {
                is_superuser = true;
            } else if let Some(permission) = Permission::from_code(code) {
                permissions.insert(permission);
            } else {
                debug!("Ignoring unknown permission code '{code}' of user '{username}'");
            }
        }

        Some(Self { username, permissions, is_superuser })
    }
}


/// A token proving that the caller holds a permission. Can only be created
/// via `AuthContext::required_permission`, and is required to get database
/// access in the API.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AuthToken(());

impl AuthToken {
    fn some_if(v: bool) -> Option<Self> {
        if v { Some(Self(())) } else { None }
    }
}


#[cfg(test)]
mod tests {
    use base64::Engine as _;
    use hyper::header::HeaderValue;
    use secrecy::SecretString;

    use super::*;

    fn config(mode: AuthMode) -> AuthConfig {
        AuthConfig {
            mode,
            user_header: "x-shopfront-user".into(),
            permissions_header: "x-shopfront-permissions".into(),
            superuser_permission: "SUPERUSER".into(),
            trusted_external_key: Some(SecretString::from("correct-horse-battery-staple")),
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn encode(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s)
    }

    #[test]
    fn user_from_proxy_headers() {
        let name = encode("Jürgen");
        let h = headers(&[
            ("x-shopfront-user", &name),
            ("x-shopfront-permissions", "MANAGE_APPS, FLY_TO_MOON,,"),
        ]);

        let auth = AuthContext::from_headers(&h, &config(AuthMode::AuthProxy));
        let AuthContext::User(user) = &auth else {
            panic!("expected user, got {auth:?}");
        };
        assert_eq!(user.username, "Jürgen");
        assert_eq!(user.permissions, BTreeSet::from([Permission::ManageApps]));
        assert!(!user.is_superuser);
        assert!(auth.required_permission(Permission::ManageApps).is_some());
        assert!(auth.required_permission(Permission::ManageTranslations).is_none());
    }

    #[test]
    fn superuser_holds_everything() {
        let name = encode("admin");
        let h = headers(&[("x-shopfront-user", &name), ("x-shopfront-permissions", "SUPERUSER")]);
        let auth = AuthContext::from_headers(&h, &config(AuthMode::AuthProxy));
        for p in Permission::ALL {
            assert!(auth.required_permission(*p).is_some());
        }
    }

    #[test]
    fn proxy_headers_ignored_without_proxy_mode() {
        let name = encode("admin");
        let h = headers(&[("x-shopfront-user", &name), ("x-shopfront-permissions", "SUPERUSER")]);
        let auth = AuthContext::from_headers(&h, &config(AuthMode::None));
        assert_eq!(auth, AuthContext::Anonymous);
        assert!(auth.required_permission(Permission::ManageApps).is_none());
    }

    #[test]
    fn broken_user_header_is_anonymous() {
        for value in ["not base64!", ""] {
            let h = headers(&[("x-shopfront-user", value), ("x-shopfront-permissions", "SUPERUSER")]);
            let auth = AuthContext::from_headers(&h, &config(AuthMode::AuthProxy));
            assert_eq!(auth, AuthContext::Anonymous, "header value '{value}'");
        }
    }

    #[test]
    fn trusted_external_key() {
        let h = headers(&[(TRUSTED_EXTERNAL_KEY_HEADER, "correct-horse-battery-staple")]);
        let auth = AuthContext::from_headers(&h, &config(AuthMode::None));
        assert_eq!(auth, AuthContext::TrustedExternal);
        assert!(auth.required_permission(Permission::ManageTranslations).is_some());

        let h = headers(&[(TRUSTED_EXTERNAL_KEY_HEADER, "wrong")]);
        let auth = AuthContext::from_headers(&h, &config(AuthMode::None));
        assert_eq!(auth, AuthContext::Anonymous);
    }

    #[test]
    fn permission_codes() {
        for p in Permission::ALL {
            assert_eq!(Permission::from_code(p.code()), Some(*p));
        }
        assert_eq!(Permission::from_code("manage_apps"), None);
    }
}
