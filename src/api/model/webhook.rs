use juniper::graphql_object;

use crate::{
    api::{Context, Id, err::{ApiResult, internal_server_error}},
    auth::Permission,
    db::{Transaction, util::FromDb},
    model::{
        Key,
        event_type::{
            EventClass, WebhookEventAsyncType, WebhookEventSyncType, WebhookEventType, classify,
        },
    },
    prelude::*,
};
use super::app::App;


pub(crate) struct Webhook {
    pub(crate) key: Key,
    app_key: Key,
    name: String,
    target_url: String,
    is_active: bool,
    secret_key: Option<String>,
    /// Raw event types of all events, ordered by event ID.
    events: Vec<String>,
}

impl FromDb for Webhook {
    const COLUMNS: &'static str = "id, app_id, name, target_url, is_active, secret_key, \
        array(\
            select event_type from webhook_events \
            where webhook_id = webhooks.id \
            order by webhook_events.id\
        ) as events";

    fn from_row(row: &tokio_postgres::Row) -> Self {
        Self {
            key: row.get("id"),
            app_key: row.get("app_id"),
            name: row.get("name"),
            target_url: row.get("target_url"),
            is_active: row.get("is_active"),
            secret_key: row.get("secret_key"),
            events: row.get("events"),
        }
    }
}

#[graphql_object(Context = Context)]
impl Webhook {
    fn id(&self) -> Id {
        Id::new(Self::TYPE_NAME, self.key)
    }

    fn name(&self) -> &str {
        &self.name
    }

    /// List of all webhook events.
    #[graphql(deprecated = "Use `asyncEvents` or `syncEvents` instead.")]
    fn events(&self) -> Vec<WebhookEvent> {
        self.events.iter()
            .map(|event_type| WebhookEvent { event_type: event_type.clone() })
            .collect()
    }

    /// List of synchronous webhook events.
    fn sync_events(&self) -> Vec<WebhookEventSync> {
        of_class(&self.events, EventClass::Sync)
            .map(|event_type| WebhookEventSync { event_type })
            .collect()
    }

    /// List of asynchronous webhook events.
    fn async_events(&self) -> Vec<WebhookEventAsync> {
        of_class(&self.events, EventClass::Async)
            .map(|event_type| WebhookEventAsync { event_type })
            .collect()
    }

    async fn app(&self, context: &Context) -> ApiResult<App> {
        let token = context.require_permission(Permission::ManageApps)?;
        App::load_by_key(self.app_key, context.db(token)).await?
            .ok_or_else(|| internal_server_error!("app {} of webhook {} is missing", self.app_key, self.key))
    }

    fn target_url(&self) -> &str {
        &self.target_url
    }

    /// Informs if webhook is activated.
    fn is_active(&self) -> bool {
        self.is_active
    }

    /// Used to create a hash signature with each payload.
    fn secret_key(&self) -> Option<&str> {
        self.secret_key.as_deref()
    }
}

impl Webhook {
    pub(crate) const TYPE_NAME: &'static str = "Webhook";

    /// Loads the webhook with the given ID, or `None` if the ID does not refer
    /// to an existing webhook.
    pub(crate) async fn load_by_id(id: Id, context: &Context) -> ApiResult<Option<Self>> {
        let token = context.require_permission(Permission::ManageApps)?;
        let Some(key) = id.decode()?.key_for(Self::TYPE_NAME) else {
            return Ok(None);
        };

        let query = format!("select {} from webhooks where id = $1", Self::COLUMNS);
        let webhook = context.db(token).query_opt_mapped(&query, &[&key]).await?;
        Ok(webhook)
    }

    pub(crate) async fn load_for_app(app: Key, db: &Transaction) -> ApiResult<Vec<Self>> {
        let query = format!("select {} from webhooks where app_id = $1 order by id", Self::COLUMNS);
        let webhooks = db.query_mapped(&query, dbargs![&app]).await?;
        Ok(webhooks)
    }
}

/// Keeps only the event types of the given class, in their original order.
/// Unknown event types are in neither class.
fn of_class(events: &[String], class: EventClass) -> impl Iterator<Item = String> + '_ {
    events.iter().filter(move |raw| classify(raw) == Some(class)).cloned()
}


// ===== Events ================================================================================

pub(crate) struct WebhookEvent {
    event_type: String,
}

#[graphql_object(Context = Context)]
impl WebhookEvent {
    /// Display name of the event.
    fn name(&self) -> &str {
        WebhookEventType::display_name(&self.event_type)
    }

    /// Internal name of the event type.
    fn event_type(&self) -> ApiResult<WebhookEventType> {
        WebhookEventType::from_raw(&self.event_type)
            .ok_or_else(|| unknown_event_type(&self.event_type))
    }
}

pub(crate) struct WebhookEventAsync {
    event_type: String,
}

#[graphql_object(Context = Context)]
impl WebhookEventAsync {
    /// Display name of the event.
    fn name(&self) -> &str {
        WebhookEventAsyncType::display_name(&self.event_type)
    }

    /// Internal name of the event type.
    fn event_type(&self) -> ApiResult<WebhookEventAsyncType> {
        WebhookEventAsyncType::from_raw(&self.event_type)
            .ok_or_else(|| unknown_event_type(&self.event_type))
    }
}

pub(crate) struct WebhookEventSync {
    event_type: String,
}

#[graphql_object(Context = Context)]
impl WebhookEventSync {
    /// Display name of the event. Looked up in the asynchronous label table,
    /// so known synchronous types show their raw name.
    fn name(&self) -> &str {
        WebhookEventAsyncType::display_name(&self.event_type)
    }

    /// Internal name of the event type.
    fn event_type(&self) -> ApiResult<WebhookEventSyncType> {
        WebhookEventSyncType::from_raw(&self.event_type)
            .ok_or_else(|| unknown_event_type(&self.event_type))
    }
}

fn unknown_event_type(raw: &str) -> crate::api::err::ApiError {
    warn!("Webhook event with unknown type '{raw}' in database");
    internal_server_error!("unknown webhook event type '{}'", raw)
}


#[cfg(test)]
mod tests {
    use super::*;

    fn raw(types: &[&str]) -> Vec<String> {
        types.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn partition_keeps_order() {
        let events = raw(&[
            "payment_capture",
            "order_created",
            "mystery_event",
            "checkout_filter_shipping_methods",
            "translation_updated",
        ]);

        assert_eq!(
            of_class(&events, EventClass::Async).collect::<Vec<_>>(),
            raw(&["order_created", "translation_updated"]),
        );
        assert_eq!(
            of_class(&events, EventClass::Sync).collect::<Vec<_>>(),
            raw(&["payment_capture", "checkout_filter_shipping_methods"]),
        );
    }

    #[test]
    fn names() {
        let event = WebhookEvent { event_type: "order_fully_paid".into() };
        assert_eq!(event.name(), "Order paid");
        assert_eq!(event.event_type().unwrap(), WebhookEventType::OrderFullyPaid);

        let event = WebhookEventSync { event_type: "payment_list_gateways".into() };
        assert_eq!(event.name(), "payment_list_gateways");
        assert_eq!(event.event_type().unwrap(), WebhookEventSyncType::PaymentListGateways);

        let event = WebhookEventAsync { event_type: "fulfillment_canceled".into() };
        assert_eq!(event.name(), "Fulfillment cancelled");
    }

    #[test]
    fn unknown_types() {
        let event = WebhookEvent { event_type: "mystery_event".into() };
        assert_eq!(event.name(), "mystery_event");
        assert!(event.event_type().is_err());

        // A sync type is unknown in the async table.
        let event = WebhookEventAsync { event_type: "payment_void".into() };
        assert_eq!(event.name(), "payment_void");
        assert!(event.event_type().is_err());
    }
}
