use juniper::graphql_object;

use super::{
    Context,
    Id,
    err::ApiResult,
    model::{
        translatable::{TranslatableItem, TranslatableItemConnection, TranslatableKind},
        webhook::Webhook,
    },
    pagination::PageArgs,
};


/// The root query object.
pub(crate) struct Query;

#[graphql_object(Context = Context)]
impl Query {
    /// Returns a list of all translatable items of a given kind. Requires the
    /// `MANAGE_TRANSLATIONS` permission.
    async fn translations(
        kind: TranslatableKind,
        first: Option<i32>,
        after: Option<String>,
        last: Option<i32>,
        before: Option<String>,
        context: &Context,
    ) -> ApiResult<TranslatableItemConnection> {
        let args = PageArgs { first, after, last, before };
        TranslatableItem::load_page(kind, args, context).await
    }

    /// Looks up a translatable item by its ID. Returns `null` if the ID refers
    /// to an item of another kind or to nothing at all. Requires the
    /// `MANAGE_TRANSLATIONS` permission.
    async fn translation(
        id: Id,
        kind: TranslatableKind,
        context: &Context,
    ) -> ApiResult<Option<TranslatableItem>> {
        TranslatableItem::load_by_id(id, kind, context).await
    }

    /// Looks up a webhook by its ID. Requires the `MANAGE_APPS` permission.
    async fn webhook(id: Id, context: &Context) -> ApiResult<Option<Webhook>> {
        Webhook::load_by_id(id, context).await
    }
}
