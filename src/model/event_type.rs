//! The fixed sets of webhook event types and their human readable labels.
//!
//! Webhook events are stored with their raw `event_type` string. Every known
//! type is either asynchronous (fire and forget notifications) or synchronous
//! (the webhook's response is used to answer the request that triggered it).
//! Both sets are defined below in one macro invocation, which also emits the
//! combined type used by the deprecated `Webhook.events` field.

use juniper::GraphQLEnum;


/// Whether an event type belongs to the asynchronous or synchronous set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EventClass {
    Async,
    Sync,
}

// Emits `WebhookEventAsyncType`, `WebhookEventSyncType` and the combined
// `WebhookEventType`. Synchronous labels are only reachable through the
// combined type.
macro_rules! define_event_types {
    (
        async { $( $avariant:ident = $araw:literal => $alabel:literal, )+ }
        sync { $( $svariant:ident = $sraw:literal => $slabel:literal, )+ }
    ) => {
        /// Enum determining type of your webhook.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLEnum)]
        #[graphql(name = "WebhookEventTypeAsyncEnum")]
        pub(crate) enum WebhookEventAsyncType {
            $( $avariant, )+
        }

        impl WebhookEventAsyncType {
            pub(crate) const ALL: &'static [Self] = &[$( Self::$avariant, )+];

            pub(crate) fn as_str(self) -> &'static str {
                match self {
                    $( Self::$avariant => $araw, )+
                }
            }

            pub(crate) fn label(self) -> &'static str {
                match self {
                    $( Self::$avariant => $alabel, )+
                }
            }

            pub(crate) fn from_raw(raw: &str) -> Option<Self> {
                match raw {
                    $( $araw => Some(Self::$avariant), )+
                    _ => None,
                }
            }
        }

        /// Enum determining type of your webhook.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLEnum)]
        #[graphql(name = "WebhookEventTypeSyncEnum")]
        pub(crate) enum WebhookEventSyncType {
            $( $svariant, )+
        }

        impl WebhookEventSyncType {
            pub(crate) const ALL: &'static [Self] = &[$( Self::$svariant, )+];

            pub(crate) fn as_str(self) -> &'static str {
                match self {
                    $( Self::$svariant => $sraw, )+
                }
            }

            pub(crate) fn from_raw(raw: &str) -> Option<Self> {
                match raw {
                    $( $sraw => Some(Self::$svariant), )+
                    _ => None,
                }
            }
        }

        /// Enum determining type of your webhook.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, GraphQLEnum)]
        #[graphql(name = "WebhookEventTypeEnum")]
        pub(crate) enum WebhookEventType {
            $( $avariant, )+
            $( $svariant, )+
        }

        impl WebhookEventType {
            pub(crate) fn as_str(self) -> &'static str {
                match self {
                    $( Self::$avariant => $araw, )+
                    $( Self::$svariant => $sraw, )+
                }
            }

            pub(crate) fn label(self) -> &'static str {
                match self {
                    $( Self::$avariant => $alabel, )+
                    $( Self::$svariant => $slabel, )+
                }
            }

            pub(crate) fn from_raw(raw: &str) -> Option<Self> {
                match raw {
                    $( $araw => Some(Self::$avariant), )+
                    $( $sraw => Some(Self::$svariant), )+
                    _ => None,
                }
            }

            pub(crate) fn class(self) -> EventClass {
                match self {
                    $( Self::$avariant => EventClass::Async, )+
                    $( Self::$svariant => EventClass::Sync, )+
                }
            }
        }
    };
}

define_event_types! {
    async {
        AnyEvents = "any_events" => "Any events",
        OrderCreated = "order_created" => "Order created",
        OrderConfirmed = "order_confirmed" => "Order confirmed",
        OrderFullyPaid = "order_fully_paid" => "Order paid",
        OrderUpdated = "order_updated" => "Order updated",
        OrderCancelled = "order_cancelled" => "Order cancelled",
        OrderFulfilled = "order_fulfilled" => "Order fulfilled",
        DraftOrderCreated = "draft_order_created" => "Draft order created",
        DraftOrderUpdated = "draft_order_updated" => "Draft order updated",
        DraftOrderDeleted = "draft_order_deleted" => "Draft order deleted",
        SaleCreated = "sale_created" => "Sale created",
        SaleUpdated = "sale_updated" => "Sale updated",
        SaleDeleted = "sale_deleted" => "Sale deleted",
        InvoiceRequested = "invoice_requested" => "Invoice requested",
        InvoiceDeleted = "invoice_deleted" => "Invoice deleted",
        InvoiceSent = "invoice_sent" => "Invoice sent",
        CustomerCreated = "customer_created" => "Customer created",
        CustomerUpdated = "customer_updated" => "Customer updated",
        CollectionCreated = "collection_created" => "Collection created",
        CollectionUpdated = "collection_updated" => "Collection updated",
        CollectionDeleted = "collection_deleted" => "Collection deleted",
        ProductCreated = "product_created" => "Product created",
        ProductUpdated = "product_updated" => "Product updated",
        ProductDeleted = "product_deleted" => "Product deleted",
        ProductVariantCreated = "product_variant_created" => "Product variant created",
        ProductVariantUpdated = "product_variant_updated" => "Product variant updated",
        ProductVariantDeleted = "product_variant_deleted" => "Product variant deleted",
        ProductVariantOutOfStock = "product_variant_out_of_stock" => "Product variant stock changed",
        ProductVariantBackInStock = "product_variant_back_in_stock" => "Product variant back in stock",
        CheckoutCreated = "checkout_created" => "Checkout created",
        CheckoutUpdated = "checkout_updated" => "Checkout updated",
        FulfillmentCreated = "fulfillment_created" => "Fulfillment created",
        FulfillmentCanceled = "fulfillment_canceled" => "Fulfillment cancelled",
        NotifyUser = "notify_user" => "Notify user",
        PageCreated = "page_created" => "Page Created",
        PageUpdated = "page_updated" => "Page Updated",
        PageDeleted = "page_deleted" => "Page Deleted",
        TranslationCreated = "translation_created" => "Create translation",
        TranslationUpdated = "translation_updated" => "Update translation",
    }
    sync {
        PaymentListGateways = "payment_list_gateways" => "List payment gateways",
        PaymentAuthorize = "payment_authorize" => "Authorize payment",
        PaymentCapture = "payment_capture" => "Capture payment",
        PaymentRefund = "payment_refund" => "Refund payment",
        PaymentVoid = "payment_void" => "Void payment",
        PaymentConfirm = "payment_confirm" => "Confirm payment",
        PaymentProcess = "payment_process" => "Process payment",
        ShippingListMethodsForCheckout = "shipping_list_methods_for_checkout"
            => "Shipping list methods for checkout",
        CheckoutFilterShippingMethods = "checkout_filter_shipping_methods"
            => "Filter shipping methods for checkout",
        OrderFilterShippingMethods = "order_filter_shipping_methods"
            => "Filter shipping methods for order",
    }
}

impl WebhookEventType {
    /// Display name for a raw event type string: its label, or the raw string
    /// itself if the type is unknown.
    pub(crate) fn display_name(raw: &str) -> &str {
        match Self::from_raw(raw) {
            Some(ty) => ty.label(),
            None => raw,
        }
    }
}

impl WebhookEventAsyncType {
    /// Like [`WebhookEventType::display_name`], but only considers
    /// asynchronous labels.
    pub(crate) fn display_name(raw: &str) -> &str {
        match Self::from_raw(raw) {
            Some(ty) => ty.label(),
            None => raw,
        }
    }
}

/// Returns the class of the raw event type, or `None` if it's not a known
/// event type at all.
pub(crate) fn classify(raw: &str) -> Option<EventClass> {
    WebhookEventType::from_raw(raw).map(WebhookEventType::class)
}


#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use super::*;

    #[test]
    fn sets_are_disjoint() {
        let async_raw = WebhookEventAsyncType::ALL.iter()
            .map(|t| t.as_str())
            .collect::<HashSet<_>>();
        let sync_raw = WebhookEventSyncType::ALL.iter()
            .map(|t| t.as_str())
            .collect::<HashSet<_>>();

        assert_eq!(async_raw.len(), WebhookEventAsyncType::ALL.len());
        assert_eq!(sync_raw.len(), WebhookEventSyncType::ALL.len());
        assert!(async_raw.is_disjoint(&sync_raw));
    }

    #[test]
    fn classify_matches_sets() {
        for ty in WebhookEventAsyncType::ALL {
            assert_eq!(classify(ty.as_str()), Some(EventClass::Async));
            assert_eq!(WebhookEventSyncType::from_raw(ty.as_str()), None);
        }
        for ty in WebhookEventSyncType::ALL {
            assert_eq!(classify(ty.as_str()), Some(EventClass::Sync));
            assert_eq!(WebhookEventAsyncType::from_raw(ty.as_str()), None);
        }
        assert_eq!(classify("carrier_pigeon_sent"), None);
    }

    #[test]
    fn raw_round_trip() {
        for ty in WebhookEventAsyncType::ALL {
            assert_eq!(WebhookEventAsyncType::from_raw(ty.as_str()), Some(*ty));
            assert_eq!(WebhookEventType::from_raw(ty.as_str()).map(|t| t.as_str()), Some(ty.as_str()));
        }
        for ty in WebhookEventSyncType::ALL {
            assert_eq!(WebhookEventSyncType::from_raw(ty.as_str()), Some(*ty));
            assert_eq!(WebhookEventType::from_raw(ty.as_str()).map(|t| t.as_str()), Some(ty.as_str()));
        }
    }

    #[test]
    fn display_names() {
        assert_eq!(WebhookEventType::display_name("order_created"), "Order created");
        assert_eq!(WebhookEventType::display_name("payment_capture"), "Capture payment");
        assert_eq!(WebhookEventAsyncType::display_name("order_fully_paid"), "Order paid");

        // The asynchronous table does not know synchronous types.
        assert_eq!(WebhookEventAsyncType::display_name("payment_void"), "payment_void");
    }

    #[test]
    fn display_name_falls_back_to_raw() {
        for raw in ["", "unknown_event", "ORDER_CREATED", "order created"] {
            assert_eq!(WebhookEventType::display_name(raw), raw);
            assert_eq!(WebhookEventAsyncType::display_name(raw), raw);
        }
    }
}
