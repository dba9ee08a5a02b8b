use juniper::graphql_object;

use crate::{
    api::{Context, Id, err::ApiResult},
    auth::Permission,
    db::{Transaction, util::FromDb},
    model::Key,
};
use super::webhook::Webhook;


/// A third party integration that owns webhooks.
pub(crate) struct App {
    key: Key,
    name: String,
    is_active: bool,
}

impl FromDb for App {
    const COLUMNS: &'static str = "id, name, is_active";

    fn from_row(row: &tokio_postgres::Row) -> Self {
        Self {
            key: row.get("id"),
            name: row.get("name"),
            is_active: row.get("is_active"),
        }
    }
}

#[graphql_object(Context = Context)]
impl App {
    fn id(&self) -> Id {
        Id::new("App", self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn is_active(&self) -> bool {
        self.is_active
    }

    /// All webhooks of this app.
    async fn webhooks(&self, context: &Context) -> ApiResult<Vec<Webhook>> {
        let token = context.require_permission(Permission::ManageApps)?;
        Webhook::load_for_app(self.key, context.db(token)).await
    }
}

impl App {
    pub(crate) async fn load_by_key(key: Key, db: &Transaction) -> ApiResult<Option<Self>> {
        let query = format!("select {} from apps where id = $1", Self::COLUMNS);
        let app = db.query_opt_mapped(&query, &[&key]).await?;
        Ok(app)
    }
}
