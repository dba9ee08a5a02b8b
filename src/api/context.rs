use std::sync::Arc;

use crate::{
    api::err::{ApiResult, not_authorized},
    auth::{AuthContext, AuthToken, Permission},
    config::Config,
    db::Transaction,
};


/// The context that is accessible to every resolver in our API.
pub(crate) struct Context {
    pub(crate) db: Transaction,
    pub(crate) auth: AuthContext,
    pub(crate) config: Arc<Config>,
}

impl juniper::Context for Context {}

impl Context {
    /// Returns a connection to the DB. Requires an auth token to prove the
    /// endpoint somehow handled authorization.
    pub(crate) fn db(&self, _: AuthToken) -> &Transaction {
        &self.db
    }

    /// Checks that the caller holds `permission`. Every resolver calls this
    /// before touching the database.
    pub(crate) fn require_permission(&self, permission: Permission) -> ApiResult<AuthToken> {
        self.auth.required_permission(permission).ok_or_else(|| match self.auth.username() {
            Some(username) => not_authorized!(
                key = "permission.missing",
                "user '{}' lacks the {} permission",
                username,
                permission,
            ),
            None => not_authorized!(
                key = "permission.not-logged-in",
                "{} permission required, but request is not authenticated",
                permission,
            ),
        })
    }
}
