//! Definition of the GraphQL API.

use std::{mem, sync::Arc};

use juniper::{EmptyMutation, EmptySubscription, http::GraphQLBatchRequest};

use crate::{
    auth::AuthContext,
    config::Config,
    db::{DbConnection, Transaction},
    prelude::*,
};
use self::query::Query;

pub(crate) mod err;
pub(crate) mod model;

mod context;
mod id;
mod pagination;
mod query;


pub(crate) use self::{
    context::Context,
    id::Id,
};


/// Creates and returns the API root node.
pub(crate) fn root_node() -> RootNode {
    RootNode::new(Query, EmptyMutation::new(), EmptySubscription::new())
}

/// Type of our API root node.
pub(crate) type RootNode = juniper::RootNode<
    'static,
    Query,
    EmptyMutation<Context>,
    EmptySubscription<Context>,
>;

/// The serialized result of executing one (possibly batched) API request.
pub(crate) struct ApiResponse {
    pub(crate) body: Vec<u8>,

    /// `false` if any of the requests failed to execute as a whole (e.g.
    /// because it could not be parsed or validated). Field errors don't count.
    pub(crate) is_ok: bool,

    pub(crate) num_queries: u32,
}

/// Executes the given request inside a new read-only transaction on
/// `connection`.
pub(crate) async fn execute(
    request: &GraphQLBatchRequest,
    root: &RootNode,
    connection: &mut DbConnection,
    auth: AuthContext,
    config: Arc<Config>,
) -> Result<ApiResponse> {
    let tx = connection.build_transaction()
        .read_only(true)
        .start()
        .await
        .context("failed to start transaction for API request")?;

    // Juniper does not support contexts with a lifetime parameter, but the
    // transaction borrows from the connection. So we pretend the lifetime is
    // `'static` and make sure the transaction does not outlive this function:
    // it is kept in an `Arc`, which we check to be the only remaining handle
    // before committing below. `Arc` only hands out shared references, so no
    // resolver can move the transaction out.
    //
    // `connection` must not be touched until the transaction is gone.
    type PgTx<'a> = deadpool_postgres::Transaction<'a>;
    let tx = unsafe {
        let static_tx = mem::transmute::<PgTx<'_>, PgTx<'static>>(tx);
        Arc::new(static_tx)
    };

    let context = Context {
        db: Transaction::new(Arc::clone(&tx)),
        auth,
        config,
    };
    let response = request.execute(root, &context).await;
    let num_queries = context.db.num_queries();
    drop(context);

    match Arc::try_unwrap(tx) {
        Err(_) => {
            // Some resolver stored a handle of the transaction somewhere. That
            // is a bug on our side and continuing would mean UB once this
            // function returns. Panicking only ends this task, so we have to
            // stop the whole process.
            error!("FATAL BUG: API handler kept reference to transaction. Ending process.");
            std::process::abort();
        }
        Ok(tx) => tx.commit().await.context("failed to commit transaction for API request")?,
    }

    Ok(ApiResponse {
        is_ok: response.is_ok(),
        body: serde_json::to_vec(&response).context("failed to serialize API response")?,
        num_queries,
    })
}


#[cfg(test)]
mod schema_tests {
    use super::root_node;

    #[test]
    fn schema_contains_all_types() {
        let sdl = root_node().as_sdl();

        for kind in [
            "Product", "Collection", "Category", "Attribute", "AttributeValue",
            "ProductVariant", "Page", "ShippingMethod", "Sale", "Voucher", "MenuItem",
        ] {
            assert!(sdl.contains(&format!("type {kind}TranslatableContent ")), "{kind}");
            assert!(sdl.contains(&format!("type {kind}Translation ")), "{kind}");
        }

        for expected in [
            "union TranslatableItem",
            "enum TranslatableKinds",
            "VARIANT",
            "MENU_ITEM",
            "type TranslatableItemConnection",
            "type Webhook ",
            "type WebhookEventAsync ",
            "type WebhookEventSync ",
            "enum WebhookEventTypeEnum",
            "enum WebhookEventTypeAsyncEnum",
            "enum WebhookEventTypeSyncEnum",
            "syncEvents",
            "asyncEvents",
            "Use `asyncEvents` or `syncEvents` instead.",
        ] {
            assert!(sdl.contains(expected), "schema lacks '{expected}'");
        }
    }
}
