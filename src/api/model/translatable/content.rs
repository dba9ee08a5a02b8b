//! The eleven translatable content types and their translation types.
//!
//! All of them look the same: a row of the source table with its translatable
//! fields, and a `translation(languageCode)` field that loads the matching
//! row from the translation table. So they are generated by one macro.

use juniper::graphql_object;

use crate::{
    api::{Context, Id, err::{ApiResult, invalid_input}},
    auth::Permission,
    db::util::FromDb,
    model::{Key, LanguageCode},
};
use super::{Translatable, TranslatableItem, TranslatableKind};


macro_rules! translatable_content {
    ($(
        $kind:ident => $content:ident, $translation:ident {
            translations: $table:literal via $fk:literal,
            fields: { $( $field:ident: $ty:ty, )+ },
        }
    )+) => {$(
        pub(crate) struct $content {
            pub(crate) key: Key,
            $( pub(crate) $field: $ty, )+
        }

        impl FromDb for $content {
            const COLUMNS: &'static str = concat!("id" $(, ", ", stringify!($field) )+);

            fn from_row(row: &tokio_postgres::Row) -> Self {
                Self {
                    key: row.get("id"),
                    $( $field: row.get(stringify!($field)), )+
                }
            }
        }

        impl Translatable for $content {
            const KIND: TranslatableKind = TranslatableKind::$kind;
        }

        impl From<$content> for TranslatableItem {
            fn from(src: $content) -> Self {
                Self::$kind(src)
            }
        }

        #[graphql_object(Context = Context)]
        impl $content {
            fn id(&self) -> Id {
                Id::new(Self::KIND.type_name(), self.key)
            }

            $(
                fn $field(&self) -> $ty {
                    self.$field.clone()
                }
            )+

            /// Returns the translation of this item for the given language, or
            /// `null` if there is none.
            async fn translation(
                &self,
                language_code: String,
                context: &Context,
            ) -> ApiResult<Option<$translation>> {
                let token = context.require_permission(Permission::ManageTranslations)?;
                let language = parse_language_code(&language_code)?;

                let query = format!(
                    "select {} from {} where {} = $1 and language_code = $2",
                    $translation::COLUMNS,
                    $table,
                    $fk,
                );
                let translation = context.db(token)
                    .query_opt_mapped::<$translation>(&query, &[&self.key, &language.as_str()])
                    .await?;
                Ok(translation)
            }
        }

        #[cfg(test)]
        impl $content {
            pub(crate) fn dummy(key: u64) -> Self {
                Self {
                    key: Key(key),
                    $( $field: Default::default(), )+
                }
            }
        }

        pub(crate) struct $translation {
            key: Key,
            language: String,
            $( $field: Option<String>, )+
        }

        impl FromDb for $translation {
            const COLUMNS: &'static str
                = concat!("id, language_code" $(, ", ", stringify!($field) )+);

            fn from_row(row: &tokio_postgres::Row) -> Self {
                Self {
                    key: row.get("id"),
                    language: row.get("language_code"),
                    $( $field: row.get(stringify!($field)), )+
                }
            }
        }

        #[graphql_object(Context = Context)]
        impl $translation {
            fn id(&self) -> Id {
                Id::new(stringify!($translation), self.key)
            }

            /// The normalized language code of this translation, e.g. `pt-BR`.
            fn language(&self) -> &str {
                &self.language
            }

            $(
                fn $field(&self) -> Option<&str> {
                    self.$field.as_deref()
                }
            )+
        }
    )+};
}

fn parse_language_code(raw: &str) -> ApiResult<LanguageCode> {
    raw.parse().map_err(|e| invalid_input!(key = "language-code.invalid", "{}", e))
}


translatable_content! {
    Product => ProductTranslatableContent, ProductTranslation {
        translations: "product_translations" via "product_id",
        fields: {
            name: String,
            description: Option<String>,
            seo_title: Option<String>,
            seo_description: Option<String>,
        },
    }
    Collection => CollectionTranslatableContent, CollectionTranslation {
        translations: "collection_translations" via "collection_id",
        fields: {
            name: String,
            description: Option<String>,
            seo_title: Option<String>,
            seo_description: Option<String>,
        },
    }
    Category => CategoryTranslatableContent, CategoryTranslation {
        translations: "category_translations" via "category_id",
        fields: {
            name: String,
            description: Option<String>,
            seo_title: Option<String>,
            seo_description: Option<String>,
        },
    }
    Attribute => AttributeTranslatableContent, AttributeTranslation {
        translations: "attribute_translations" via "attribute_id",
        fields: {
            name: String,
        },
    }
    AttributeValue => AttributeValueTranslatableContent, AttributeValueTranslation {
        translations: "attribute_value_translations" via "attribute_value_id",
        fields: {
            name: String,
            rich_text: Option<String>,
        },
    }
    ProductVariant => ProductVariantTranslatableContent, ProductVariantTranslation {
        translations: "product_variant_translations" via "product_variant_id",
        fields: {
            name: String,
        },
    }
    Page => PageTranslatableContent, PageTranslation {
        translations: "page_translations" via "page_id",
        fields: {
            title: String,
            content: Option<String>,
            seo_title: Option<String>,
            seo_description: Option<String>,
        },
    }
    ShippingMethod => ShippingMethodTranslatableContent, ShippingMethodTranslation {
        translations: "shipping_method_translations" via "shipping_method_id",
        fields: {
            name: String,
            description: Option<String>,
        },
    }
    Sale => SaleTranslatableContent, SaleTranslation {
        translations: "sale_translations" via "sale_id",
        fields: {
            name: String,
        },
    }
    Voucher => VoucherTranslatableContent, VoucherTranslation {
        translations: "voucher_translations" via "voucher_id",
        fields: {
            name: Option<String>,
        },
    }
    MenuItem => MenuItemTranslatableContent, MenuItemTranslation {
        translations: "menu_item_translations" via "menu_item_id",
        fields: {
            name: String,
        },
    }
}
